use clap::Parser;
use rendezvous::config::{self, Config};
use rendezvous::hub::Hub;
use rendezvous::lifecycle;
use rendezvous::shutdown::ShutdownManager;
use rendezvous::transport::connection_table::ConnectionTable;
use rendezvous::transport::websocket::SignalingServer;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;

#[derive(Parser, Debug)]
#[command(name = "rendezvousd")]
#[command(about = "Wallet rendezvous and WebRTC signaling daemon", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override server.listen_address
    #[arg(long)]
    listen_addr: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_config {
        let config = Config::default();
        match config.save_to_file(&args.config) {
            Ok(_) => {
                println!("✅ Generated default config at: {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("❌ Failed to generate config: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut config = match Config::load_or_create(&args.config) {
        Ok(cfg) => {
            println!("✓ Loaded configuration from {}", args.config);
            cfg
        }
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(addr) = args.listen_addr {
        config.server.listen_address = addr;
    }

    let _log_guard = setup_logging(&config.logging, args.verbose);

    let mut shutdown_manager = ShutdownManager::new();
    let shutdown_token = shutdown_manager.token();

    let listen_addr = config.server.full_listen_address();

    let version = env!("CARGO_PKG_VERSION");
    let revision = option_env!("BUILD_REVISION").unwrap_or("unknown");
    let build_date = option_env!("BUILD_DATE").unwrap_or("unknown");

    println!("\n🚀 Rendezvous Signaling Daemon v{} ({})", version, revision);
    println!("  └─ Build: {}", build_date);
    println!("═══════════════════════════════════════════════════════");
    println!();
    println!("⚙️  Session");
    println!(
        "  └─ Max inactive time: {:?}",
        config.session.max_inactive_time()
    );
    println!(
        "  └─ Cleanup interval: {:?}",
        config.session.cleanup_interval()
    );
    println!("  └─ Allowed origins: {:?}", config.cors.allow_origins);
    println!();

    let connections = Arc::new(ConnectionTable::new());
    let hub = Arc::new(Hub::new(connections.clone()));

    let sweeper = lifecycle::spawn_sweeper(
        hub.clone(),
        config.session.cleanup_interval(),
        config.session.max_inactive_time(),
        shutdown_token.clone(),
    );
    shutdown_manager.register_task(sweeper);
    println!("  ✅ Session sweeper started");

    let server = match SignalingServer::bind(
        &listen_addr,
        hub,
        connections,
        config.cors.clone(),
        config.socket.clone(),
    )
    .await
    {
        Ok(server) => server,
        Err(e) => {
            eprintln!("  ❌ Failed to start signaling server: {}", e);
            eprintln!("     (Port may already be in use)");
            std::process::exit(1);
        }
    };

    match server.local_addr() {
        Ok(addr) => {
            println!("  ✅ Signaling server listening on {}", addr);
            println!("  └─ Health check: http://{}/health", addr);
        }
        Err(_) => println!("  ✅ Signaling server listening on {}", listen_addr),
    }
    println!();

    let server_token = shutdown_token.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(server_token).await {
            tracing::error!("Signaling server error: {}", e);
        }
    });
    shutdown_manager.register_task(server_handle);

    shutdown_manager.wait_for_shutdown().await;
}

fn setup_logging(config: &config::LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

    let level = if verbose { "trace" } else { &config.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard) = match file_appender(config) {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };
    let to_file = guard.is_some();

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.format == "json" {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        let compact = fmt::layer()
            .with_writer(writer)
            .with_ansi(!to_file)
            .with_target(false)
            .compact();
        if !to_file && under_journald() {
            compact.without_time().boxed()
        } else {
            compact.with_timer(HostClock::local()).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
    guard
}

/// Daily-rolling appender when `logging.output = "file"`.
fn file_appender(config: &config::LoggingConfig) -> Option<RollingFileAppender> {
    if config.output != "file" {
        return None;
    }
    let path = Path::new(&config.file_path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "rendezvous.log".into());
    Some(tracing_appender::rolling::daily(dir, file_name))
}

// journald stamps time and host itself
fn under_journald() -> bool {
    std::env::var_os("JOURNAL_STREAM").is_some() || std::env::var_os("INVOCATION_ID").is_some()
}

/// `2025-12-10T18:09:43.150Z relay1`
struct HostClock {
    host: String,
}

impl HostClock {
    fn local() -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let host = match host.split_once('.') {
            Some((short, _)) => short.to_string(),
            None => host,
        };
        Self { host }
    }
}

impl tracing_subscriber::fmt::time::FormatTime for HostClock {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "{} {}", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"), self.host)
    }
}
