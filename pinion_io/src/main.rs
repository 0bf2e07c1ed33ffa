//! # Pinion I/O Binary
//!
//! Demo and inspection tool for the Pinion runtime: loads a board file,
//! creates every point on the mock provider, prints the description
//! tree, and optionally runs a blink demo or watches input events.
//!
//! # Usage
//!
//! ```bash
//! # Describe a board
//! pinion_io --config board.toml
//!
//! # Blink an output 10 times with a 500 ms delay
//! pinion_io --config board.toml --blink led-green --delay-ms 500 --count 10
//!
//! # Watch input events until Ctrl-C
//! pinion_io --config board.toml --watch
//!
//! # Verbose logging
//! pinion_io --config board.toml -v
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use pinion_common::config::BoardConfig;
use pinion_common::digital::{DigitalState, IoType, TimeUnit};
use pinion_io::context::Context;
use pinion_io::io::{DigitalInput, DigitalOutput, Io};
use pinion_io::providers::mock::MockPlugin;

/// Pinion I/O - hardware abstraction with pluggable providers
#[derive(Parser, Debug)]
#[command(name = "pinion_io")]
#[command(version)]
#[command(about = "I/O context and registry with pluggable provider architecture")]
#[command(long_about = None)]
struct Args {
    /// Path to the board configuration file.
    #[arg(short, long, default_value = "board.toml")]
    config: PathBuf,

    /// Blink the output with this id, then exit.
    #[arg(long, value_name = "ID")]
    blink: Option<String>,

    /// Blink delay in milliseconds.
    #[arg(long, default_value_t = 500)]
    delay_ms: u32,

    /// Blink transition count.
    #[arg(long, default_value_t = 10)]
    count: u32,

    /// Watch input state changes until Ctrl-C.
    #[arg(short, long)]
    watch: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("pinion_io failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("Pinion I/O v{} starting...", env!("CARGO_PKG_VERSION"));

    let board_text = std::fs::read_to_string(&args.config)
        .map_err(|e| format!("failed to read board file {:?}: {e}", args.config))?;
    let board = BoardConfig::from_toml(&board_text)?;

    let context = Context::new();
    let plugin = MockPlugin::new();
    context.attach(&plugin)?;
    context.initialize()?;

    // Create every point in the board file.
    let mut inputs: Vec<Arc<DigitalInput>> = Vec::new();
    for (group_key, point) in board.all_points() {
        match point.io_type {
            IoType::Output => {
                let config = point.to_output_config(group_key);
                info!("creating output '{}' on address {}", config.id, config.address);
                context.create_output(config)?;
            }
            IoType::Input => {
                let config = point.to_input_config(group_key);
                info!("creating input '{}' on address {}", config.id, config.address);
                inputs.push(context.create_input(config)?);
            }
        }
    }

    print!("{}", context.describe());

    if let Some(blink_id) = &args.blink {
        let output = context.registry().get::<DigitalOutput>(blink_id)?;
        info!(
            "blinking '{blink_id}': {} transitions, {} ms delay",
            args.count, args.delay_ms
        );
        output.blink(
            args.delay_ms,
            args.count,
            TimeUnit::Milliseconds,
            DigitalState::High,
            None,
        )?;
    }

    if args.watch {
        for input in &inputs {
            let id = input.id().to_string();
            input.add_listener(move |event| {
                info!("input '{id}' changed to {}", event.state);
            });
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            flag.store(false, Ordering::SeqCst);
        })?;

        info!("watching {} inputs, Ctrl-C to stop", inputs.len());
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    context.shutdown();
    info!("Pinion I/O shutdown complete");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
