use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uart_engine::config::{Config, ConfigLoader};
use uart_engine::{
    available_ports, logging, timeout_from_millis, PlatformReactor, PortEngine, PortError,
    PortInfo, ReactorAdapter, ReadCompletion, WriteCompletion,
};

#[derive(Parser, Debug)]
#[command(
    name = "uart-exerciser",
    version,
    about = "Exercise a serial port through the asynchronous UART engine.",
    long_about = "Lists serial ports, or opens one, writes a burst of bytes and issues a series of reads, driving every transfer through the platform reactor the way an embedding event loop would."
)]
struct Cli {
    /// Configuration file to use instead of the usual search.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial ports present on this system.
    List {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Open a port, write a burst, then read from it.
    Exercise {
        /// Port name or alias; defaults to the testing port, then the first port found.
        port: Option<String>,

        /// Number of 'a' bytes to write.
        #[arg(long, default_value_t = 100)]
        bytes: usize,

        /// Number of reads to issue after the write.
        #[arg(long, default_value_t = 10)]
        reads: usize,

        /// Timeout for each read in milliseconds; negative waits forever.
        #[arg(long, default_value_t = 1000, allow_negative_numbers = true)]
        timeout_ms: i64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let loader = match cli.config {
        Some(ref path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config = loader.into_config();
    logging::init(&config.logging)?;

    match cli.command {
        Command::List { json } => list(json),
        Command::Exercise {
            port,
            bytes,
            reads,
            timeout_ms,
        } => exercise(&config, port, bytes, reads, timeout_ms),
    }
}

fn list(json: bool) -> Result<(), Box<dyn Error>> {
    let ports = available_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports detected");
    }
    for port in &ports {
        print_port(port);
    }
    Ok(())
}

fn print_port(port: &PortInfo) {
    println!("Name: {}", port.name);
    println!("Description: {}", port.description);
    println!("Manufacturer: {}", port.manufacturer);
    println!("Serial number: {}", port.serial_number);
    println!("vid: 0x{:04x}", port.vid);
    println!("pid: 0x{:04x}", port.pid);
    println!("---");
}

fn pick_port(config: &Config, requested: Option<String>) -> Result<String, Box<dyn Error>> {
    if let Some(name) = requested.or_else(|| config.testing.port.clone()) {
        return Ok(config.serial.resolve_port(&name));
    }
    available_ports()?
        .into_iter()
        .next()
        .map(|port| port.name)
        .ok_or_else(|| "No serial ports detected".into())
}

/// Run the engine until the current request in each direction is finished.
fn drive(engine: &mut PortEngine, reactor: &mut PlatformReactor) -> Result<(), PortError> {
    while engine.has_pending_write() || engine.has_pending_read() {
        reactor.run_once(engine, None)?;
    }
    Ok(())
}

fn exercise(
    config: &Config,
    port: Option<String>,
    bytes: usize,
    reads: usize,
    timeout_ms: i64,
) -> Result<(), Box<dyn Error>> {
    let name = pick_port(config, port)?;
    let uart = config.serial.uart_config()?.with_active(false);

    let writes: Arc<Mutex<Vec<WriteCompletion>>> = Arc::default();
    let received: Arc<Mutex<Vec<ReadCompletion>>> = Arc::default();
    let (w, r) = (Arc::clone(&writes), Arc::clone(&received));
    let mut engine = PortEngine::new(move |c| w.lock().push(c), move |c| r.lock().push(c));
    let mut reactor = PlatformReactor::default();

    info!("Opening {}", name);
    engine.open(&name, &uart)?;

    let started = Instant::now();
    engine.write(vec![b'a'; bytes], None);
    drive(&mut engine, &mut reactor)?;
    for completion in writes.lock().drain(..) {
        let n = completion.result?;
        println!("Wrote {} bytes in {:?}", n, started.elapsed());
    }

    let timeout = timeout_from_millis(timeout_ms);
    for i in 0..reads {
        engine.read(timeout);
        drive(&mut engine, &mut reactor)?;
        for completion in received.lock().drain(..) {
            match completion {
                Ok(data) => println!("Read {}: {} bytes", i, data.len()),
                Err(e) => {
                    warn!("Read {} failed: {}", i, e);
                    return Err(e.into());
                }
            }
        }
    }

    engine.close()?;
    println!("Done");
    Ok(())
}
