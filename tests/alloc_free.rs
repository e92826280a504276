//! Allocation-free tick path tests.
//!
//! These tests verify that `Scheduler::step()` and `Psg::render()` do not
//! allocate once a session is running. They play the fixture files to the
//! end so every channel retires and the end marker is reached.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use psg_engine::{Frame, NoPacing, NullSink, Psg, Scheduler, NTSC_CLOCK};
use psg_formats::{load_psgs, Validation};
use psg_ir::StreamSet;
use std::fs;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/psgs")
}

fn load(name: &str) -> StreamSet {
    let data = fs::read(fixtures_dir().join(name)).unwrap();
    load_psgs(&data, Validation::Strict).unwrap()
}

/// Step a whole session, aborting on any heap allocation.
fn assert_session_alloc_free(set: StreamSet) {
    let mut sched = Scheduler::new(set, NullSink, NoPacing);
    sched.start();

    assert_no_alloc(|| while sched.step().is_some() {});
    assert!(sched.is_finished());
}

/// Step a session through the emulator, rendering a tick of audio per step.
fn assert_render_alloc_free(set: StreamSet, frames_per_tick: usize) {
    let mut sched = Scheduler::new(set, Psg::new(NTSC_CLOCK, 44_100), NoPacing);
    let mut buf = vec![Frame::silence(); frames_per_tick];
    sched.start();

    assert_no_alloc(|| {
        while let Some(report) = sched.step() {
            if report.finished {
                break;
            }
            sched.sink_mut().render(&mut buf);
        }
    });
    assert!(sched.sink().is_silent());
}

#[test]
fn scenario_step_alloc_free() {
    assert_session_alloc_free(load("scenario.psgs"));
}

#[test]
fn jingle_step_alloc_free() {
    assert_session_alloc_free(load("jingle.psgs"));
}

#[test]
fn jingle_render_alloc_free() {
    assert_render_alloc_free(load("jingle.psgs"), 735);
}
