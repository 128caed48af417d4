use clap::Parser;
use hostscheck::config::{Config, Settings};
use hostscheck::report::OutputFormat;
use hostscheck::{check_hosts, CheckError, TlsProber};
use std::io;
use std::path::PathBuf;
use std::process::exit;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Verifies that the IP-to-hostname mappings of a hosts file still serve
/// their hostnames over TLS.
#[derive(Parser, Debug)]
#[command(name = "hostscheck", version, author, about, long_about = None)]
struct Cli {
    /// Hosts file to check [default: /etc/hosts]
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Timeout in seconds for both the connection and the handshake [default: 5]
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Max number of concurrent probes [default: 2]
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Port to dial on every address [default: 443]
    #[arg(long)]
    port: Option<u16>,

    /// Output format: text, json [default: text]
    #[arg(short, long)]
    output: Option<OutputFormat>,

    /// Exit code to use when at least one mismatch is found [default: 0]
    #[arg(long)]
    exit_code: Option<i32>,

    /// Enable verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Load settings from a TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    example_config: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings, CheckError> {
        let file = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::empty(),
        };
        let flags = Config {
            path: self.path.clone(),
            timeout: self.timeout,
            threads: self.threads,
            port: self.port,
            output: self.output,
            exit_code: self.exit_code,
            debug: self.debug.then_some(true),
        };
        Ok(file.merge_with(flags).resolve()?)
    }
}

fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.example_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(1);
        }
    };
    init_logging(settings.debug);
    debug!(?settings, "starting");

    let prober = match TlsProber::new(settings.timeout, settings.port) {
        Ok(prober) => prober,
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, aborting probes");
            interrupt.cancel();
        }
    });

    match check_hosts(&settings, prober, io::stdout(), cancel).await {
        Ok(summary) if summary.mismatches > 0 => exit(settings.exit_code),
        Ok(_) => exit(0),
        Err(CheckError::Interrupted) => {
            eprintln!("Error: interrupted");
            exit(130);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(1);
        }
    }
}
