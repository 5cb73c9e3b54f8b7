use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use firedoc_host::bridge::HostBridge;
use firedoc_host::config::Config;
use firedoc_host::dialog::DialogProvider;
use firedoc_host::guard::{AppMode, NavigationGuard};
use firedoc_host::service::HostFileService;
use firedoc_host::window::HeadlessWindow;
use firedoc_host::ws;
use firedoc_vfs::LocalFs;
use tokio::net::TcpListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("firedoc-host - privileged host for the FireDoc PDF viewer");
    println!();
    println!("USAGE:");
    println!("    firedoc-host [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -p, --port PORT      Bridge port (overrides config)");
    println!("    -c, --config FILE    Config file to load");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version");
    println!();
    println!("CONFIG:");
    println!("    {}", Config::default_config_path().display());
}

#[derive(Debug, Default)]
struct Args {
    port: Option<u16>,
    config: Option<PathBuf>,
}

enum Command {
    Run(Args),
    Help,
    Version,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-v" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--port" | "-p" => {
                let value = iter.next().context("--port needs a value")?;
                parsed.port = Some(value.parse().with_context(|| format!("invalid port {value:?}"))?);
            }
            "--config" | "-c" => {
                let value = iter.next().context("--config needs a value")?;
                parsed.config = Some(PathBuf::from(value));
            }
            other => bail!("unknown argument {other:?} (try --help)"),
        }
    }
    Ok(Command::Run(parsed))
}

#[cfg(feature = "native-dialogs")]
fn dialogs() -> Arc<dyn DialogProvider> {
    Arc::new(firedoc_host::dialog::NativeDialogs::new())
}

#[cfg(not(feature = "native-dialogs"))]
fn dialogs() -> Arc<dyn DialogProvider> {
    Arc::new(firedoc_host::dialog::ConsoleDialogs::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging (tracing)
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&args)? {
        Command::Version => {
            println!("firedoc-host {VERSION}");
            return Ok(());
        }
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Run(args) => args,
    };

    // === LOAD CONFIGURATION ===
    let mut config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => {
            Config::create_default_if_missing();
            Config::load()
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    if !listener.local_addr()?.ip().is_loopback() {
        tracing::warn!(addr = %addr, "Bridge is reachable beyond loopback");
    }

    let service = Arc::new(
        HostFileService::new(Arc::new(LocalFs::new()), dialogs()).with_chunk_cap(config.chunk_cap()),
    );
    let window = Arc::new(HeadlessWindow::new(AppMode::Home));
    let guard = Arc::new(NavigationGuard::new(AppMode::Home));
    let bridge = Arc::new(HostBridge::new(service, guard, window.clone()));

    tracing::info!(
        version = VERSION,
        chunk_cap = config.chunk_cap(),
        "firedoc host starting"
    );

    tokio::select! {
        result = ws::serve(listener, bridge) => result?,
        () = window.wait_closed() => tracing::info!("Window closed, shutting down"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }

    Ok(())
}
