use clap::Parser;
use evcollect::cli;
use evcollect::collector::{self, Collector, RunStatus};
use evcollect::fetcher::HttpFetcher;
use evcollect::store::StoreClient;
use evcollect::target::{Inventory, TargetSelector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    colog::init();

    let args = cli::Args::parse();
    let run_id = ulid::Ulid::new();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let status = runtime.block_on(run(&args, run_id))?;
    collector::shutdown(runtime, &status);

    match status {
        RunStatus::NothingToProfile => {
            log::error!("No targets to profile, run {} ends", run_id);
            std::process::exit(1);
        }
        RunStatus::Completed {
            dispatched,
            processed,
            cancelled,
        } => {
            log::info!(
                "Run {} is all done: {} targets dispatched, {} processed{}",
                run_id,
                dispatched,
                processed,
                if cancelled { " (cancelled)" } else { "" }
            );
        }
    }

    Ok(())
}

async fn run(args: &cli::Args, run_id: ulid::Ulid) -> anyhow::Result<RunStatus> {
    let config = args.config()?;
    let selection = args.selection()?;

    log::info!(
        "Starting run {} (store: {}, workers: {}, target timeout: {:?})",
        run_id,
        config.store_url,
        config.workers,
        config.target_timeout
    );

    let inventory = Inventory::load(&args.inventory)?;
    if inventory.is_empty() {
        log::warn!("Inventory {} lists no targets", args.inventory.display());
    } else {
        log::info!(
            "Loaded {} targets from {}",
            inventory.len(),
            args.inventory.display()
        );
    }

    let targets = inventory.select(&selection)?;

    let collector = Collector::new(
        &config,
        Arc::new(HttpFetcher::new(&config)),
        Arc::new(StoreClient::new(&config)),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling in-flight targets");
            on_signal.cancel();
        }
    });

    Ok(collector.run(targets, cancel).await)
}
