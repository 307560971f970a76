//! # Remito CLI
//!
//! Bootstrap for the print dispatch server.
//!
//! ## Usage
//!
//! ```bash
//! # Serve on the default port, preferring the vendor-integrated printer
//! remito serve
//!
//! # Prefer the USB thermal printer on a custom address
//! remito serve --listen 0.0.0.0:9100 --backend thermal
//! ```

use clap::{Parser, Subcommand};

use remito::{
    backend::{BackendKind, IntegratedBackend, PrinterBackend, SpoolerBackend, ThermalBackend},
    dispatch::Dispatcher,
    server::{serve, ServerConfig},
    RemitoError,
};

/// Remito - receipt print dispatch server
#[derive(Parser, Debug)]
#[command(name = "remito")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept print requests over HTTP and dispatch them to a printer
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,

        /// Preferred backend (thermal, spooler, or integrated)
        #[arg(long, default_value = "integrated")]
        backend: BackendKind,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remito=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), RemitoError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, backend } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve_command(listen, backend))
        }
    }
}

async fn serve_command(listen: String, preferred: BackendKind) -> Result<(), RemitoError> {
    // One instance per kind, constructed once for the process lifetime.
    // Spooler and integrated probe their hosts during construction.
    let mut thermal = ThermalBackend::new();
    let spooler = SpoolerBackend::new();
    let integrated = IntegratedBackend::new();

    // Connect the preferred backend eagerly so availability shows up in
    // the logs at startup rather than on the first request.
    let ready = match preferred {
        BackendKind::Thermal => thermal.connect(),
        BackendKind::Spooler => spooler.is_ready(),
        BackendKind::Integrated => integrated.is_ready(),
    };
    if ready {
        tracing::info!(backend = %preferred, "preferred backend ready");
    } else {
        tracing::warn!(backend = %preferred, "preferred backend not ready, fallback chain will cover it");
    }

    let backends: Vec<Box<dyn PrinterBackend>> = vec![
        Box::new(thermal),
        Box::new(spooler),
        Box::new(integrated),
    ];

    let config = ServerConfig {
        listen_addr: listen,
        preferred,
    };

    serve(config, Dispatcher::new(backends)).await
}
