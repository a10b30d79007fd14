//! Sprinkler head controller binary.
//!
//! Reads operator actions from stdin, one JSON object per line, e.g.
//! `{"action": "add", "x": 410, "y": 220}` or `{"action": "run"}`.
use clap::Parser;
use sprinkler::components::prelude::*;
use sprinkler::devices::hardware::serial::{LineTransport, SerialLink};
use sprinkler::devices::software::recording::RecordingTransport;
use sprinkler::utils::logging;
use tokio::io::BufReader;

/// Arguments required for starting the program from the command line.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the config file for the Sprinkler Head Component.
    #[arg(short, long)]
    filepath: String,
    /// Log the servo commands instead of opening the serial port.
    #[arg(long)]
    dry_run: bool,
}

async fn drive<T: LineTransport>(
    config: SprinklerHeadConfig,
    transport: T,
) -> Result<(), ControllerError> {
    let mut head = SprinklerHead::new(config, transport);
    let stdin = BufReader::new(tokio::io::stdin());
    SprinklerHeadController::start(&mut head, stdin).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let args = Args::parse();
    let config = SprinklerHeadConfig::from_file(&args.filepath)?;

    if args.dry_run {
        tracing::info!("dry run, servo commands are not sent");
        drive(config, RecordingTransport::new()).await?;
    } else {
        // Without the head there is nothing to control.
        let link = SerialLink::open(config.serial())?;
        drive(config, link).await?;
    }
    Ok(())
}
