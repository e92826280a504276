//! psgseq: play, trace, or render PSG event streams.
//!
//! Usage:
//!   psgseq song.psgs
//!   psgseq rom_table.bin --raw-channels 4 --wav out.wav
//!   psgseq song.psgs --trace

mod cli;

use clap::Parser;
use cli::Args;
use psg_master::{Controller, ControllerError, PlayerConfig};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), ControllerError> {
    let mut config = PlayerConfig::load_or_default(&args.config);
    if let Some(us) = args.tick_us {
        config.tick_period_us = us.max(1);
    }

    let mut ctrl = Controller::new(config);
    ctrl.load_file(&args.path, args.raw_channels)?;

    if let Some(set) = ctrl.streams() {
        println!("Channels: {}", set.len());
        for (idx, stream) in set.channels().iter().enumerate() {
            let marker = if stream.is_terminal() { " (end)" } else { "" };
            println!(
                "  {:>2} {:<8} {:>5} events{}",
                idx,
                stream.name.as_str(),
                stream.records().len(),
                marker
            );
        }
        match set.end_tick() {
            Some(end) => println!("End tick: {}", end),
            None => println!("End tick: none"),
        }
        println!();
    }

    if args.trace {
        print_trace(&ctrl)
    } else if let Some(wav) = &args.wav {
        render_to_wav(&ctrl, wav, args.max_seconds)
    } else {
        play_audio(&mut ctrl)
    }
}

fn print_trace(ctrl: &Controller) -> Result<(), ControllerError> {
    let (entries, summary) = ctrl.trace()?;
    for entry in &entries {
        println!("{:5}  ch{}  {}", entry.tick, entry.channel, entry.payload);
    }
    println!();
    println!(
        "{:?} at tick {} ({} events)",
        summary.outcome, summary.final_tick, summary.events_fired
    );
    Ok(())
}

fn play_audio(ctrl: &mut Controller) -> Result<(), ControllerError> {
    ctrl.play()?;
    println!("Playing...");

    while ctrl.is_playing() {
        if let Some(tick) = ctrl.current_tick() {
            print!("\rTick: {:5}", tick);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    ctrl.stop()?;

    println!("\rDone.       ");
    Ok(())
}

fn render_to_wav(
    ctrl: &Controller,
    path: &std::path::Path,
    max_seconds: u32,
) -> Result<(), ControllerError> {
    println!("Rendering to {} at {} Hz...", path.display(), ctrl.config().sample_rate);

    let wav = ctrl.render_to_wav(max_seconds)?;
    println!("Rendered {} bytes", wav.len());

    std::fs::write(path, &wav).map_err(|source| ControllerError::Write {
        path: path.display().to_string(),
        source,
    })?;

    println!("Done.");
    Ok(())
}
