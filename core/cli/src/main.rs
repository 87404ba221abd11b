use clap::Parser;
use common::error::IngestError;
use server::DestinationService;
use std::net::TcpListener;
use std::sync::Arc;
use time::macros::format_description;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use warehouse::ConnectionFactory;

/// `destination [--port N]` (spec.md §6.4).
#[derive(Parser)]
#[command(name = "destination")]
struct Cli {
    #[arg(long, default_value_t = 50052)]
    port: u16,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let time_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:2]");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_timer(fmt::time::LocalTime::new(time_format))
                .with_target(false)
                .with_level(true)
                .with_thread_names(false)
                .with_line_number(false)
                .with_file(false)
                .with_span_events(fmt::format::FmtSpan::NONE)
                .compact(),
        )
        .with(filter)
        .init();
}

fn motherduck_host() -> String {
    std::env::var("motherduck_host").unwrap_or_else(|_| "api.motherduck.com".to_string())
}

/// MUST be disabled (i.e. host check skipped) by default (spec.md §6.5).
fn host_check_disabled() -> bool {
    std::env::var("motherduck_disable_host_check")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true)
}

/// Probes that the warehouse engine can load its MotherDuck extension
/// before we start accepting traffic (spec.md §6.4's "extension install
/// failure" exit condition).
fn bootstrap_warehouse_extension() -> Result<(), IngestError> {
    let con = duckdb::Connection::open_in_memory()
        .map_err(|err| IngestError::warehouse(format!("Failed to open bootstrap connection: {err}")))?;
    con.execute("INSTALL motherduck", [])
        .map_err(|err| IngestError::warehouse(format!("Failed to install motherduck extension: {err}")))?;
    con.execute("LOAD motherduck", [])
        .map_err(|err| IngestError::warehouse(format!("Failed to load motherduck extension: {err}")))?;
    Ok(())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    tracing::info!(
        host = %motherduck_host(),
        host_check_disabled = host_check_disabled(),
        "starting destination server"
    );

    if let Err(err) = bootstrap_warehouse_extension() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }

    let listener = match TcpListener::bind(("0.0.0.0", cli.port)) {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Error: failed to bind 0.0.0.0:{}: {err}", cli.port);
            std::process::exit(1);
        }
    };

    // `ConnectionFactory` is the process-singleton warehouse handle (spec
    // §4.9); `DestinationService` wires it to the ingestion pipeline. The
    // RPC transport that would route requests into it is out of scope
    // (spec.md §1) — this binary only proves the port is live.
    let factory = Arc::new(ConnectionFactory::new());
    let _service = DestinationService::new(factory);

    tracing::info!(port = cli.port, "destination server listening");
    for stream in listener.incoming() {
        match stream {
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "health check accept failed"),
        }
    }
}
