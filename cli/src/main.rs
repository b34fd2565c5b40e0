mod shell;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;

use tokio_serial::SerialPortBuilderExt;

use orp::client::{Framing, Session};
use orp::protocol::ProtocolVersion;


/// Command-line client for the Octave Resource Protocol
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    device: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 9600, value_parser = parse_baud)]
    baud: u32,

    /// Wrap packets in AT+ORP commands instead of HDLC frames
    #[arg(long)]
    at: bool,
}

const BAUD_RATES: &[u32] = &[9600, 38400, 57600, 115200, 460800, 921600];

fn parse_baud(s: &str) -> Result<u32, String> {
    let baud: u32 = s.parse().map_err(|_| format!("invalid baud rate: {s}"))?;

    if BAUD_RATES.contains(&baud) {
        Ok(baud)
    } else {
        Err(format!("unsupported baud rate {baud} (expected one of {BAUD_RATES:?})"))
    }
}

/* The USB-to-serial converter will fail to send the first packet after a
 * period of inactivity (USB suspend). Rather than changing the USB behavior,
 * keep sending a preamble character so the bus never suspends; anything under
 * 5 seconds works.
 */
const KEEPALIVE_PERIOD: Duration = Duration::from_secs(3);

fn prompt() {
    print!("\norp > ");
    let _ = std::io::stdout().flush();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let port = tokio_serial::new(&args.device, args.baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .open_native_async()
        .with_context(|| format!("failed to open {}", args.device))?;

    let framing = if args.at { Framing::At } else { Framing::Hdlc };
    let mut session = Session::new(port, framing, ProtocolVersion::V2);

    println!("ORP Serial Client - \"help\" for help, \"quit\" to exit");
    println!("using device: {}, baud: {}", args.device, args.baud);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                if !shell::dispatch(&mut session, line.trim()).await {
                    println!("Exiting");
                    break;
                }
                prompt();
            },
            event = timeout(KEEPALIVE_PERIOD, session.recv()) => {
                match event {
                    Ok(Ok(Some(event))) => {
                        shell::print_event(&event);
                        prompt();
                    },
                    Ok(Ok(None)) => {
                        println!("Transport closed. Exiting");
                        break;
                    },
                    Ok(Err(e)) => {
                        tracing::warn!("receive failed: {e}");
                    },
                    Err(_) => {
                        // idle; tickle the transport so it stays awake
                        session.keepalive().await?;
                    },
                }
            },
        }
    }

    Ok(())
}
