//! GovWatch daemon — entry point for running a governance watcher node.

use std::sync::Arc;

use clap::Parser;

use govwatch_node::{
    serve_admin, FileDirectory, GovNode, NodeConfig, WebhookNotifier,
};

#[derive(Parser)]
#[command(name = "govwatch-daemon", about = "GovWatch governance monitoring daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./govwatch.toml")]
    config: String,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT/SIGTERM.
    Run,
    /// Validate the configuration file and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    govwatch_utils::init_tracing();

    let cli = Cli::parse();
    let config = NodeConfig::from_toml_file(&cli.config)?;

    match cli.command {
        Command::CheckConfig => {
            config.validate()?;
            println!(
                "{}: ok ({} chains, {} providers)",
                cli.config,
                config.chains.len(),
                config.providers.len()
            );
            Ok(())
        }
        Command::Run => run(config).await,
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    if config.notifier.webhook_url.is_empty() {
        anyhow::bail!("notifier.webhook_url must be configured");
    }
    let directory = Arc::new(FileDirectory::new(config.subscribers_file.clone()));
    let notifier = Arc::new(WebhookNotifier::new(config.notifier.webhook_url.clone())?);

    let admin_port = config.admin_port;
    let mut node = GovNode::new(config, directory, notifier)?;
    let shutdown = Arc::clone(&node.shutdown);
    node.start();
    tracing::info!("GovWatch node started");

    if admin_port != 0 {
        let admin = node.admin();
        let shutdown_for_admin = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Err(e) = serve_admin(admin, admin_port, shutdown_for_admin).await {
                tracing::error!(error = %e, "admin server failed");
            }
        });
    }

    shutdown.wait_for_signal().await;
    node.stop().await;
    tracing::info!("GovWatch node stopped");
    Ok(())
}
