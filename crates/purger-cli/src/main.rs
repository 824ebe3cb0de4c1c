mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};

use purger_core::domain::{
    DeletionResult, EngineEvent, MediaView, MonthKey, ReviewError, SessionId, SessionState,
};
use purger_core::impls::{AdScript, InMemoryMediaLibrary, ScriptedAdGateway};
use purger_core::{EngineBuilder, EngineHandle, load_catalog, load_configuration};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Walk a synthetic photo library month by month and clean it up.
#[derive(Parser, Debug)]
#[command(name = "purger", version, about)]
struct Cli {
    /// First month of the library, YYYY-MM.
    #[arg(long, default_value = "2025-01")]
    start: String,

    /// Number of months in the library.
    #[arg(long, default_value_t = 3)]
    months: u32,

    /// Assets per month.
    #[arg(long, default_value_t = 12)]
    per_month: u32,

    /// Every Nth asset is a video (0 = photos only).
    #[arg(long, default_value_t = 5)]
    video_every: u32,

    /// Mark every Nth asset for deletion (0 = keep everything).
    #[arg(long, default_value_t = 4)]
    delete_every: usize,

    /// Reveals between interstitials; overrides the config file.
    #[arg(long)]
    threshold: Option<u32>,

    /// Prefetch window span; overrides the config file.
    #[arg(long)]
    window: Option<usize>,

    /// Skip ads entirely.
    #[arg(long)]
    ad_free: bool,

    /// Make the library ask for confirmation before the first deletion.
    #[arg(long)]
    confirm: bool,

    /// Print one JSON object per cleaned month.
    #[arg(long)]
    json: bool,

    /// Config file (default: ./Purger.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_month(s: &str) -> Result<MonthKey> {
    let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .with_context(|| format!("invalid month {s:?}, expected YYYY-MM"))?;
    MonthKey::new(date.year(), date.month())
        .ok_or_else(|| anyhow!("invalid month {s:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger("warn");

    let mut config = load_configuration(cli.config.as_deref()).context("loading configuration")?;
    if let Some(threshold) = cli.threshold {
        config.ad_threshold = threshold;
    }
    if let Some(window) = cli.window {
        config.window_span = window;
    }

    let start = parse_month(&cli.start)?;
    let mut library = InMemoryMediaLibrary::synthetic(start, cli.months, cli.per_month, cli.video_every);
    if cli.confirm {
        library = library.with_confirmations(1);
    }
    let ads = ScriptedAdGateway::new(AdScript::DismissImmediately);
    ads.set_ad_free(cli.ad_free);

    let handle = EngineBuilder::new(Arc::new(library.clone()), Arc::new(ads.clone()))
        .config(config)
        .build()?
        .spawn();

    let catalog = load_catalog(&library).await.map_err(|e| anyhow!(e.user_facing_message()))?;
    info!(months = catalog.buckets().len(), "catalog ready");

    let mut events = handle.subscribe();
    let mut totals = (0usize, 0u64);
    let mut next = catalog.first().cloned();

    while let Some(bucket) = next {
        let month = bucket.month();
        let snapshot = handle.select_month(bucket).await?;
        let generation = snapshot
            .generation
            .ok_or_else(|| anyhow!("engine did not open {month}"))?;

        review_month(&handle, cli.delete_every).await?;

        if let Some(result) = finish_month(&handle, &mut events, generation).await? {
            totals.0 += result.total_deleted();
            totals.1 += result.total_bytes;
            report(&result, cli.json)?;
        } else if !cli.json {
            println!("{}: nothing to delete", month.label());
        }

        next = catalog.next_after(month).cloned();
    }

    if !cli.json {
        println!(
            "done: {} items removed, {} freed, {} ads shown",
            totals.0,
            purger_core::domain::human_bytes(totals.1),
            ads.presentations()
        );
    }
    handle.shutdown().await;
    Ok(())
}

/// Decide every asset of the open month.
async fn review_month(handle: &EngineHandle, delete_every: usize) -> Result<()> {
    loop {
        let snapshot = handle
            .wait_for(STEP_TIMEOUT, |s| match s.session_state() {
                SessionState::Reviewing => !matches!(s.media, MediaView::Loading { .. }),
                SessionState::AdPause => false,
                SessionState::Exhausted | SessionState::Idle => true,
            })
            .await
            .ok_or_else(|| anyhow!("timed out waiting for the next asset"))?;

        if snapshot.session_state() != SessionState::Reviewing {
            return Ok(());
        }
        if let MediaView::Unavailable { asset, reason } = &snapshot.media {
            warn!(asset = %asset.id, reason = %reason, "deciding without a preview");
        }

        let index = snapshot.position.map(|p| p.index).unwrap_or_default();
        let result = if delete_every > 0 && index % delete_every == 0 {
            handle.delete().await
        } else {
            handle.keep().await
        };
        match result {
            Ok(_) | Err(ReviewError::Rejected(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }
}

/// Wait for this month's deletion to settle. `None` when nothing was marked.
async fn finish_month(
    handle: &EngineHandle,
    events: &mut broadcast::Receiver<EngineEvent>,
    generation: SessionId,
) -> Result<Option<DeletionResult>> {
    loop {
        let event = tokio::time::timeout(STEP_TIMEOUT, events.recv())
            .await
            .context("timed out waiting for the deletion")??;
        if event.generation() != Some(generation) {
            continue;
        }
        match event {
            EngineEvent::Deleted { result, .. } => return Ok(Some(result)),
            EngineEvent::Notice(notice) if notice.auto_advance => return Ok(None),
            EngineEvent::Notice(notice) if notice.error == ReviewError::DeleteNeedsConfirmation => {
                info!("confirming deletion");
                handle.commit_deletion().await?;
            }
            EngineEvent::Notice(notice) if notice.blocking => {
                bail!(notice.error.user_facing_message());
            }
            EngineEvent::Notice(notice) => {
                warn!(error = %notice.error, "{}", notice.error.user_facing_message());
            }
        }
    }
}

fn report(result: &DeletionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!(
            "{}: deleted {} photos and {} videos ({})",
            result.month.label(),
            result.photos_deleted,
            result.videos_deleted,
            result.human_size()
        );
    }
    Ok(())
}
