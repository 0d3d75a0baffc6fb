use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use twet::app::AppContext;
use twet::cli::commands::{self, TimelineOptions};
use twet::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.debug {
        EnvFilter::new("twet=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut ctx = AppContext::with_workers(cli.config_dir.as_deref(), cli.workers)?;

    match cli.command {
        Commands::Timeline {
            duration,
            source,
            dry_run,
            raw,
            reverse,
            mode,
        } => {
            let opts = TimelineOptions {
                duration,
                source,
                dry_run,
                raw,
                reverse,
                mode,
            };
            commands::timeline(&mut ctx, &opts).await?;
        }
        Commands::Tweet { words } => {
            commands::tweet(&ctx, &words).await?;
        }
        Commands::Following { raw } => {
            commands::following(&ctx, raw)?;
        }
    }

    Ok(())
}
