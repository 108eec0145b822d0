//! Prometheus exporter for Prusa printer telemetry.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

use prusa_exporter::config::{LogFormat, Overrides};
use prusa_exporter::{ExporterConfig, HttpServer, PrinterCollector, TelemetryClient, describe};

/// Prometheus exporter for Prusa printer telemetry.
#[derive(Parser, Debug)]
#[command(name = "prusa-exporter")]
#[command(about = "Export Prusa printer telemetry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Printer hostname (overrides config).
    #[arg(long, env = "PRINTER_HOSTNAME")]
    hostname: Option<String>,

    /// Metrics port (overrides the port of the listen address).
    #[arg(long, env = "METRICS_PORT")]
    port: Option<u16>,

    /// HTTP listen address (overrides config and port).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    config.apply_overrides(Overrides {
        hostname: args.hostname,
        port: args.port,
        listen: args.listen,
        log_level: args.log_level,
    })?;
    config.validate()?;

    // Initialize logging
    let log_level = config.logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("prusa_exporter={}", log_level).parse()?)
        .add_directive(format!("hyper={}", Level::WARN).parse()?)
        .add_directive(format!("reqwest={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        printer = %config.printer.hostname,
        "Starting Prusa Prometheus Exporter"
    );

    for family in describe() {
        debug!(
            family = family.name,
            family_type = family.family_type.as_str(),
            unit = family.unit.map(|u| u.as_str()).unwrap_or(""),
            labels = ?family.label_names,
            "Exporting metric family"
        );
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create the collector
    let client = TelemetryClient::new(&config.printer.hostname)?;
    info!(url = %client.url(), "Polling printer telemetry on each scrape");
    let collector = Arc::new(PrinterCollector::new(
        client,
        config.prometheus.prefix.clone(),
    ));

    let http_server = HttpServer::new(
        collector.clone(),
        config.listen_addr()?,
        config.prometheus.path.clone(),
    );

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for the server to drain
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = collector.stats();
    info!(
        scrapes = stats.scrapes,
        printer_unavailable = stats.printer_unavailable,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
