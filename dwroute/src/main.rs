use clap::Parser;
use dwroute::{Application, Config, telemetry};
use tokio::signal;
use tracing::{info, warn};

/// Resolves on Ctrl+C or SIGTERM. A listener that cannot be installed never fires; the other
/// one still can.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!(signal = received, "Draining route engine");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The stats sync client is built without a bundled crypto provider
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = dwroute::config::Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("{}: configuration is valid.", args.config);
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    info!(
        config = %args.config,
        stats_sync = config.stats_sync.enabled,
        metrics = config.enable_metrics,
        groups = config.group_ratios.len(),
        "Starting route engine"
    );

    Application::new(config).await?.serve(shutdown_signal()).await
}
