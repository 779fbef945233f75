//! jma-enrich - Audio Feature Enrichment
//!
//! Looks up every upstream track's ISRC in MusicBrainz, fetches the
//! recording's AcousticBrainz low-level descriptors, and stores both.
//! Safe to re-run: cached lookups skip the network and features upsert.
//!
//! Set `JMA_VERIFY_ONLY=1` to print the verification report without
//! enriching anything.

use anyhow::{Context, Result};
use jma_enrich::db::report::build_report;
use jma_enrich::{Dispatcher, EnrichConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERIFY_ONLY_ENV: &str = "JMA_VERIFY_ONLY";
const REPORT_SAMPLE_LIMIT: i64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let config = EnrichConfig::resolve().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting jma-enrich (Audio Feature Enrichment)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());

    let pool = jma_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    jma_enrich::db::init_tables(&pool).await?;

    let verify_only = std::env::var(VERIFY_ONLY_ENV)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    if !verify_only {
        let tracks = jma_enrich::db::tracks::load_tracks(&pool).await?;
        info!(tracks = tracks.len(), "Loaded upstream tracks");

        let dispatcher = Dispatcher::from_config(&config, pool.clone()).await?;

        let cancel = CancellationToken::new();
        let ctrl_c_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current batch");
                ctrl_c_token.cancel();
            }
        });

        let summary = dispatcher.run(&tracks, &cancel).await?;
        let stats = summary.stats;

        info!(
            attempted = stats.attempted,
            cache_hits = stats.cache_hits,
            resolved = stats.resolved,
            matched = stats.feature_matched,
            not_resolved = stats.not_resolved,
            features_missing = stats.features_missing,
            failed = stats.failed_after_retry,
            skipped = stats.skipped,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Enrichment summary"
        );
        info!("{}", stats.display_string());

        if summary.cancelled {
            warn!(
                batches_completed = summary.batches_completed,
                batches_total = summary.batches_total,
                "Run interrupted; re-run to continue where it stopped"
            );
        }
    }

    let report = build_report(&pool, REPORT_SAMPLE_LIMIT).await?;
    println!("{}", report);

    Ok(())
}
