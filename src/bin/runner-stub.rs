//! Stub step runner for integration testing
//!
//! Connects back to the port in `GAUGE_INTERNAL_PORT` and then behaves
//! according to `--mode`:
//!
//! - `obey`: exit cleanly on the first kill request
//! - `ignore`: read and discard every message, never exit on its own
//! - `exit`: exit cleanly right after connecting
//! - `silent`: never connect, sleep
//! - `crash`: exit with status 3 without connecting
//!
//! Every mode writes its PID to `runner-stub.pid` in the working directory
//! and prints a `ready` line to stdout.

use clap::{Parser, ValueEnum};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;
use steprun_runner::launcher::GAUGE_INTERNAL_PORT_ENV;
use steprun_runner::message::{MessageType, decode_message};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Obey,
    Ignore,
    Exit,
    Silent,
    Crash,
}

#[derive(Parser)]
#[command(name = "runner-stub", about = "Stub step runner for testing")]
struct Args {
    #[arg(long, value_enum, default_value_t = Mode::Obey)]
    mode: Mode,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    std::fs::write("runner-stub.pid", std::process::id().to_string())?;
    println!("ready");
    eprintln!("runner-stub mode {:?}", args.mode);
    std::io::stdout().flush()?;

    match args.mode {
        Mode::Crash => std::process::exit(3),
        Mode::Silent => sleep_forever(),
        Mode::Obey | Mode::Ignore | Mode::Exit => {}
    }

    let port: u16 = std::env::var(GAUGE_INTERNAL_PORT_ENV)?.trim().parse()?;
    let stream = TcpStream::connect(("127.0.0.1", port))?;

    if matches!(args.mode, Mode::Exit) {
        return Ok(());
    }

    for line in BufReader::new(stream).lines() {
        let line = line?;
        let Ok(message) = decode_message(&line) else {
            eprintln!("runner-stub: undecodable message {line:?}");
            continue;
        };
        if matches!(args.mode, Mode::Obey) && message.message_type == MessageType::KillProcessRequest
        {
            println!("stopping");
            return Ok(());
        }
    }

    // Connection closed without a kill request being honoured
    sleep_forever()
}

fn sleep_forever() -> ! {
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
