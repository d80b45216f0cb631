//! hubgate - a TLS-terminating front-end for NMDC hubs

use std::path::PathBuf;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use hubgate::error::Result;
use hubgate::{Config, HubNetwork, Proxy};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        print_version();
        return Ok(());
    }

    // Initialize logging
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let mut config = if let Some(path) = &args.config {
        Config::load(path)?
    } else {
        Config::default()
    };
    args.apply(&mut config);

    info!("hubgate v{} starting...", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let proxy = Proxy::new(config)?;
        proxy.run().await?;

        tokio::signal::ctrl_c().await?;
        info!("Shutting down...");

        proxy.close();
        proxy.wait().await;
        Ok::<(), hubgate::Error>(())
    })?;

    info!("Goodbye!");
    Ok(())
}

/// Command line arguments
struct Args {
    config: Option<PathBuf>,
    hosts: Vec<String>,
    hub: Option<String>,
    hub_net: Option<HubNetwork>,
    wait_ms: Option<i64>,
    cert: Option<PathBuf>,
    key: Option<PathBuf>,
    buffer_kb: Option<usize>,
    no_ip: bool,
    log_errors: bool,
    metrics: Option<String>,
    version: bool,
}

impl Args {
    fn parse() -> Self {
        let argv: Vec<String> = std::env::args().collect();
        let mut args = Args {
            config: None,
            hosts: Vec::new(),
            hub: None,
            hub_net: None,
            wait_ms: None,
            cert: None,
            key: None,
            buffer_kb: None,
            no_ip: false,
            log_errors: false,
            metrics: None,
            version: false,
        };

        let mut i = 1;
        while i < argv.len() {
            let take_value = |i: &mut usize| -> Option<String> {
                if *i + 1 < argv.len() {
                    *i += 1;
                    Some(argv[*i].clone())
                } else {
                    None
                }
            };

            match argv[i].as_str() {
                "-c" | "--config" => args.config = take_value(&mut i).map(PathBuf::from),
                "--host" => {
                    if let Some(v) = take_value(&mut i) {
                        args.hosts.push(v);
                    }
                }
                "--hub" => args.hub = take_value(&mut i),
                "--hub-net" => {
                    args.hub_net = take_value(&mut i).and_then(|v| match v.parse() {
                        Ok(net) => Some(net),
                        Err(e) => {
                            eprintln!("{}", e);
                            std::process::exit(2);
                        }
                    });
                }
                "--wait" => args.wait_ms = take_value(&mut i).and_then(|v| v.parse().ok()),
                "--cert" => args.cert = take_value(&mut i).map(PathBuf::from),
                "--key" => args.key = take_value(&mut i).map(PathBuf::from),
                "--buffer" => args.buffer_kb = take_value(&mut i).and_then(|v| v.parse().ok()),
                "--no-ip" => args.no_ip = true,
                "--log-errors" => args.log_errors = true,
                "--metrics" => args.metrics = take_value(&mut i),
                "-v" | "--version" => args.version = true,
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    print_help();
                    std::process::exit(2);
                }
            }
            i += 1;
        }

        args
    }

    /// Flags override values from the config file.
    fn apply(&self, config: &mut Config) {
        if !self.hosts.is_empty() {
            config.hosts = self.hosts.clone();
        }
        if let Some(hub) = &self.hub {
            config.hub_addr = hub.clone();
        }
        if let Some(net) = self.hub_net {
            config.hub_network = net;
        }
        if let Some(wait) = self.wait_ms {
            config.detect_wait_ms = wait;
        }
        if let Some(cert) = &self.cert {
            config.cert = Some(cert.clone());
        }
        if let Some(key) = &self.key {
            config.key = Some(key.clone());
        }
        if let Some(buffer) = self.buffer_kb {
            config.buffer_kb = buffer;
        }
        if self.no_ip {
            config.no_send_ip = true;
        }
        if self.log_errors {
            config.log_errors = true;
        }
        if let Some(metrics) = &self.metrics {
            config.metrics = Some(metrics.clone());
        }
    }
}

fn print_help() {
    println!(
        r#"hubgate - a TLS-terminating front-end for NMDC hubs

USAGE:
    hubgate [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to JSON configuration file
    --host <ADDR>           Address to listen on (repeatable)
    --hub <ADDR>            Hub address to connect to (default 127.0.0.1:411)
    --hub-net <NET>         Hub network: tcp4, tcp6, tcp or unix (default tcp4)
    --wait <MS>             Protocol detection window in ms; 0 disables (default 650)
    --cert <FILE>           TLS certificate file (PEM)
    --key <FILE>            TLS private key file (PEM)
    --buffer <KB>           Relay buffer size in KiB (default 10)
    --no-ip                 Don't announce the client IP to the hub
    --log-errors            Log accept and connection errors
    --metrics <ADDR>        Serve Prometheus metrics on this address
    -v, --version           Print version information
    -h, --help              Print help information

EXAMPLES:
    hubgate --host 0.0.0.0:411 --hub 127.0.0.1:4111
    hubgate --cert hub.cert --key hub.key --metrics 127.0.0.1:9090
    hubgate -c hubgate.json --log-errors
"#
    );
}

fn print_version() {
    println!("hubgate v{}", env!("CARGO_PKG_VERSION"));
    println!("A TLS-terminating front-end for NMDC hubs");
}
