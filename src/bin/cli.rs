//! Serialbridge CLI - Command-line interface
//!
//! Lists ports, opens a session on a real or simulated device, pipes stdin
//! lines to it and prints what comes back.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serialbridge_core::cli::{format_baud_rates, format_entry, format_ports, OutputFormat};
use serialbridge_core::config::{available_baud_rates, seconds, DEFAULT_BAUD_RATE};
use serialbridge_core::core::transport::SerialPortEnumerator;
use serialbridge_core::{
    AppConfig, BaudRate, CliResult, ConnectionSession, ExitCodes, LineTerminator, PortDescriptor,
    PortRegistry, PortSelector, Providers, SessionError, SessionEvent, Simulator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};

/// Line ending style
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineEnding {
    /// LF only (Unix)
    Lf,
    /// CR only
    Cr,
    /// CR+LF (Windows)
    Crlf,
    /// No line ending
    None,
}

impl From<LineEnding> for LineTerminator {
    fn from(eol: LineEnding) -> Self {
        match eol {
            LineEnding::Lf => Self::Lf,
            LineEnding::Cr => Self::Cr,
            LineEnding::Crlf => Self::CrLf,
            LineEnding::None => Self::None,
        }
    }
}

/// Serialbridge CLI
#[derive(Parser, Debug)]
#[command(
    name = "serialbridge",
    version,
    about = "Line-oriented serial sessions with background port discovery",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Configuration file (defaults to the per-user config)
    #[arg(long, global = true, env = "SERIALBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Keep polling and print the list whenever it changes
        #[arg(short, long)]
        watch: bool,

        /// Poll interval in seconds
        #[arg(short, long, default_value = "1.0", value_parser = parse_seconds)]
        interval: Duration,
    },

    /// Show the offered baud rates
    BaudRates {
        /// Non-standard rate to include
        #[arg(long)]
        custom: Option<u32>,
    },

    /// Connect to a serial port
    Connect {
        /// Port name (e.g. ttyUSB0, COM3)
        #[arg(short, long, conflicts_with = "serial_number")]
        port: Option<String>,

        /// USB serial number of the adapter
        #[arg(short, long)]
        serial_number: Option<String>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Line ending appended to every sent line
        #[arg(long, value_enum)]
        eol: Option<LineEnding>,

        /// Send command, print replies and exit
        #[arg(short = 'c', long)]
        command: Option<String>,

        /// Exit after timeout (seconds)
        #[arg(long, value_parser = parse_seconds)]
        timeout: Option<Duration>,
    },

    /// Run a session against a simulated device
    Simulate {
        /// Lines the device emits after opening
        #[arg(short, long, default_value = "5")]
        lines: usize,

        /// Echo every sent line back
        #[arg(short, long)]
        echo: bool,

        /// Exit after timeout (seconds)
        #[arg(long, value_parser = parse_seconds)]
        timeout: Option<Duration>,
    },
}

/// How long command mode waits for replies when no timeout is given
const COMMAND_REPLY_WINDOW: Duration = Duration::from_secs(2);

/// Floor for `list-ports --watch`
const MIN_WATCH_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(ExitCodes::CONFIG_ERROR);
        }
    };

    let logging = serialbridge_core::logging::init(&config.logging, cli.verbose, cli.quiet);
    match logging.as_ref().and_then(|guard| guard.log_dir()) {
        Some(dir) => info!(
            "Starting serialbridge v{} (logs in {})",
            serialbridge_core::VERSION,
            dir.display()
        ),
        None => info!("Starting serialbridge v{}", serialbridge_core::VERSION),
    }

    let result = match run(&cli, &config).await {
        Ok(()) => CliResult::success(),
        Err(e) => match e.downcast_ref::<SessionError>() {
            Some(session_error) => CliResult::from(session_error),
            None => CliResult::error(ExitCodes::ERROR, format!("{:#}", e)),
        },
    };

    if let Some(msg) = result.message() {
        if !result.is_success() {
            eprintln!("Error: {}", msg);
        }
    }
    result.to_exit_code()
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    let loaded = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    loaded.map_err(|e| anyhow::anyhow!("cannot load configuration: {}", e))
}

async fn run(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    match &cli.command {
        Commands::ListPorts { watch, interval } => list_ports(cli, *watch, *interval).await,
        Commands::BaudRates { custom } => baud_rates(cli, config, *custom),
        Commands::Connect {
            port,
            serial_number,
            baud,
            eol,
            command,
            timeout,
        } => {
            let selector = match (port, serial_number) {
                (Some(name), _) => Some(PortSelector::name(name)),
                (None, Some(sn)) => Some(PortSelector::serial_number(sn)),
                (None, None) => None,
            };
            let mut session_config = config.connection_config(selector)?;
            if let Some(baud) = baud {
                session_config.baud_rate = BaudRate::new(*baud)?;
            }
            if let Some(eol) = eol {
                session_config.line_terminator = (*eol).into();
            }
            session_config.auto_connect = false;

            let session = ConnectionSession::new(session_config, Providers::system()).await?;
            run_session(cli, &session, command.as_deref(), *timeout).await
        }
        Commands::Simulate {
            lines,
            echo,
            timeout,
        } => simulate(cli, config, *lines, *echo, *timeout).await,
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|e| format!("{}", e))?;
    seconds(secs).map_err(|e| e.to_string())
}

async fn list_ports(cli: &Cli, watch: bool, interval: Duration) -> anyhow::Result<()> {
    let registry = PortRegistry::new(Arc::new(SerialPortEnumerator));
    let mut shown = registry.refresh()?;
    println!("{}", format_ports(&shown, cli.format));

    if !watch {
        return Ok(());
    }

    let mut ports = registry.subscribe();
    let (failed_tx, mut failed_rx) = oneshot::channel();
    registry.start(interval.max(MIN_WATCH_INTERVAL), move |err| {
        let _ = failed_tx.send(err);
    });

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            err = &mut failed_rx => {
                break match err {
                    Ok(err) => Err(SessionError::EnumerationFailed(err).into()),
                    Err(_) => Ok(()),
                };
            }
            changed = ports.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let latest = ports.borrow_and_update().clone();
                if latest != shown {
                    if cli.format == OutputFormat::Text && !cli.quiet {
                        println!("--");
                    }
                    println!("{}", format_ports(&latest, cli.format));
                    shown = latest;
                }
            }
        }
    };

    registry.join().await?;
    outcome
}

fn baud_rates(cli: &Cli, config: &AppConfig, custom: Option<u32>) -> anyhow::Result<()> {
    let current = match custom {
        Some(rate) => BaudRate::new(rate)?,
        None => BaudRate::new(config.connection.baud_rate).context("invalid baud rate in config")?,
    };
    let rates = available_baud_rates(current);
    println!("{}", format_baud_rates(&rates, DEFAULT_BAUD_RATE, cli.format));
    Ok(())
}

async fn simulate(
    cli: &Cli,
    config: &AppConfig,
    lines: usize,
    echo: bool,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let port = PortDescriptor::new("sim0").with_serial_number("SIM0001");
    let sim = Simulator::new(vec![port.clone()]);

    let mut session_config = config.connection_config(Some(PortSelector::from(&port)))?;
    session_config.auto_connect = false;
    let session = ConnectionSession::new(session_config, sim.providers()).await?;

    let device = sim
        .devices
        .device(&serialbridge_core::Platform::current().device_address(&port));
    device.set_echo(echo);
    for n in 1..=lines {
        device.push_line(&format!("sample {}", n));
    }

    let timeout = timeout.or_else(|| (!echo).then_some(Duration::from_secs(1)));
    run_session(cli, &session, None, timeout).await
}

/// Connect, pump stdin to the device and print the output log until EOF,
/// Ctrl-C, timeout or the stream ending.
async fn run_session(
    cli: &Cli,
    session: &ConnectionSession,
    command: Option<&str>,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    session.retain_view();
    let mut events = session.subscribe();
    session.connect().await?;

    if !cli.quiet {
        if let Some(port) = session.active_port().await {
            eprintln!("Connected to {}. Press Ctrl+C to exit.", port);
        }
    }

    let mut printed = 0;
    let outcome = pump(cli, session, &mut events, &mut printed, command, timeout).await;
    print_new_entries(cli, session, &mut printed);

    session.release_view().await?;
    session.close().await?;
    if !cli.quiet {
        eprintln!("Disconnected.");
    }
    outcome
}

async fn pump(
    cli: &Cli,
    session: &ConnectionSession,
    events: &mut broadcast::Receiver<SessionEvent>,
    printed: &mut usize,
    command: Option<&str>,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = command.is_none();

    let deadline = match command {
        Some(cmd) => {
            session.send(cmd).await?;
            Some(timeout.unwrap_or(COMMAND_REPLY_WINDOW))
        }
        None => timeout,
    };
    let sleep = tokio::time::sleep(deadline.unwrap_or(Duration::MAX));
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            _ = &mut sleep, if deadline.is_some() => return Ok(()),
            line = stdin.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if let Err(e) = session.send(line.trim_end()).await {
                        warn!("Send failed: {}", e);
                    }
                    print_new_entries(cli, session, printed);
                }
                None => {
                    stdin_open = false;
                    if deadline.is_none() {
                        return Ok(());
                    }
                }
            },
            event = events.recv() => match event {
                Ok(SessionEvent::LineReceived(_)) => print_new_entries(cli, session, printed),
                Ok(SessionEvent::StreamEnded { error }) => {
                    print_new_entries(cli, session, printed);
                    anyhow::bail!("stream ended: {}", error);
                }
                Ok(SessionEvent::DeviceLost { port }) => {
                    anyhow::bail!("device {} disconnected", port);
                }
                Ok(SessionEvent::Closed) | Err(broadcast::error::RecvError::Closed) => return Ok(()),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} session events", skipped);
                    print_new_entries(cli, session, printed);
                }
            },
        }
    }
}

fn print_new_entries(cli: &Cli, session: &ConnectionSession, printed: &mut usize) {
    let entries = session.output().entries_since(*printed);
    *printed += entries.len();
    for entry in entries {
        println!("{}", format_entry(&entry, cli.format, cli.verbose));
    }
}
