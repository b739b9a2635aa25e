mod cli;

use mediaforged::{config, context::AppContext, scanner};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mf_metadata::RefreshOptions;
use std::path::{Path, PathBuf};

async fn refresh(
    paths: Vec<PathBuf>,
    force: bool,
    concurrency: Option<usize>,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let roots = if paths.is_empty() {
        config.library.paths.clone()
    } else {
        paths
    };
    if roots.is_empty() {
        anyhow::bail!("No library paths given on the command line or in the config");
    }
    let concurrency = concurrency.unwrap_or(config.library.concurrency);

    let ctx = AppContext::build(config)?;
    let items = scanner::scan_library(&roots)?;

    let options = RefreshOptions {
        force,
        ..Default::default()
    };
    let cancel = options.cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling refresh");
            cancel.cancel();
        }
    });

    tracing::info!(items = items.len(), concurrency, force, "Starting refresh");
    let (items, summary) = ctx
        .orchestrator
        .refresh_library(items, concurrency, &options)
        .await;

    println!("{summary}");

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&items)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;
        println!("Wrote {} items to {}", items.len(), path.display());
    }

    if summary.errored_items > 0 {
        anyhow::bail!("{} item(s) stopped on an unexpected error", summary.errored_items);
    }
    Ok(())
}

fn validate_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let warnings = config.validate();

    if warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

fn list_providers(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = AppContext::build(config)?;

    let pools = ctx.orchestrator.pools();
    for provider in ctx.orchestrator.registry().ordered() {
        print!("{:<16} priority={:<7} version={}", provider.name(), provider.priority().to_string(), provider.version());
        if let Some(pool) = provider.resource_pool() {
            print!(" pool={pool}");
            if let Some(capacity) = pools.capacity(pool) {
                print!(" capacity={capacity}");
            }
        }
        println!();
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediaforged=debug,mf_metadata=debug,mf_core=debug".to_string()
        } else {
            "mediaforged=info,mf_metadata=info,mf_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Refresh {
            paths,
            force,
            concurrency,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(refresh(paths, force, concurrency, output, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Providers => list_providers(cli.config.as_deref()),
        Commands::Version => {
            println!("mediaforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
