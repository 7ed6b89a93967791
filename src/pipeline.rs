//! Run orchestration.
//!
//! Listing first (fatal on failure), then one detail fetch + extraction per
//! identifier on a bounded pool of tokio tasks. Results are put back into
//! listing order before anything is assembled.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geojson::FeatureCollection;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::Settings;
use crate::detail::fetch_detail;
use crate::error::{Skip, SkipReport, TfrError};
use crate::extract::{Extraction, extract_notices};
use crate::feature::assemble;
use crate::fetch::HttpClient;
use crate::listing::resolve_notices;
use crate::record::{ListedNotice, NoticeRecord};

/// What a full extraction run produced.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Identifiers returned by the listing.
    pub listed: usize,
    /// Identifiers whose detail document was fetched and parsed.
    pub documents: usize,
    /// Reconciled notices, in listing order.
    pub records: Vec<NoticeRecord>,
    pub skips: SkipReport,
}

impl PipelineReport {
    pub fn feature_collection(&self) -> FeatureCollection {
        assemble(&self.records)
    }

    pub fn log_summary(&self, features: usize) {
        for (kind, count) in self.skips.iter() {
            warn!(kind, count, "Skipped");
        }
        info!(
            listed = self.listed,
            documents = self.documents,
            records = self.records.len(),
            skipped = self.skips.total(),
            features,
            "Run complete"
        );
    }
}

/// Listing → detail → extraction for every active notice.
pub async fn collect_records<C: HttpClient + 'static>(
    client: Arc<C>,
    settings: &Settings,
) -> Result<PipelineReport, TfrError> {
    let listed = resolve_notices(client.as_ref(), settings).await?;
    let mut report = PipelineReport {
        listed: listed.len(),
        ..PipelineReport::default()
    };

    let outcomes = run_pool(client, settings, listed, |client, settings, notice| async move {
        process_notice(client.as_ref(), &settings, &notice).await
    })
    .await;

    for (notice, outcome) in outcomes {
        match outcome.and_then(|extractions| extractions) {
            Err(skip) => {
                warn!(notam = %notice.id, reason = %skip, "Identifier skipped");
                report.skips.record(&skip);
            }
            Ok(extractions) => {
                report.documents += 1;
                for extraction in extractions {
                    match extraction {
                        Ok(record) => report.records.push(record),
                        Err(skip) => report.skips.record(&skip),
                    }
                }
            }
        }
    }

    Ok(report)
}

/// Full run: collect, then assemble the FeatureCollection.
pub async fn build_feature_collection<C: HttpClient + 'static>(
    client: Arc<C>,
    settings: &Settings,
) -> Result<(FeatureCollection, PipelineReport), TfrError> {
    let report = collect_records(client, settings).await?;
    let collection = report.feature_collection();
    report.log_summary(collection.features.len());
    Ok((collection, report))
}

async fn process_notice<C: HttpClient + ?Sized>(
    client: &C,
    settings: &Settings,
    notice: &ListedNotice,
) -> Result<Vec<Extraction>, Skip> {
    let body = fetch_detail(client, settings, &notice.id).await?;
    let xml = String::from_utf8_lossy(&body);
    let extractions = extract_notices(&xml, Some(notice), &settings.defaults)?;
    debug!(notices = extractions.len(), "Detail document extracted");
    Ok(extractions)
}

/// Outcome of archiving one raw detail document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Saved(PathBuf),
    AlreadyPresent(PathBuf),
    Skipped(Skip),
    WriteFailed(String),
}

#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub listed: usize,
    pub saved: usize,
    pub already_present: usize,
    pub write_failures: usize,
    pub skips: SkipReport,
}

/// Downloads each listed notice's raw XML to `<dir>/detail_<id>.xml`.
/// Existing files are left alone and not re-fetched.
pub async fn archive_documents<C: HttpClient + 'static>(
    client: Arc<C>,
    settings: &Settings,
    dir: &Path,
) -> Result<ArchiveReport, TfrError> {
    tokio::fs::create_dir_all(dir).await?;
    let listed = resolve_notices(client.as_ref(), settings).await?;
    let mut report = ArchiveReport {
        listed: listed.len(),
        ..ArchiveReport::default()
    };

    let dir = Arc::new(dir.to_path_buf());
    let outcomes = run_pool(client, settings, listed, move |client, settings, notice| {
        let dir = Arc::clone(&dir);
        async move { archive_one(client.as_ref(), &settings, &notice, &dir).await }
    })
    .await;

    for (notice, outcome) in outcomes {
        match outcome.unwrap_or_else(ArchiveOutcome::Skipped) {
            ArchiveOutcome::Saved(path) => {
                info!(notam = %notice.id, path = %path.display(), "Saved detail document");
                report.saved += 1;
            }
            ArchiveOutcome::AlreadyPresent(path) => {
                info!(notam = %notice.id, path = %path.display(), "Already archived, skipping");
                report.already_present += 1;
            }
            ArchiveOutcome::Skipped(skip) => {
                warn!(notam = %notice.id, reason = %skip, "Identifier skipped");
                report.skips.record(&skip);
            }
            ArchiveOutcome::WriteFailed(message) => {
                error!(notam = %notice.id, error = %message, "Could not write detail document");
                report.write_failures += 1;
            }
        }
    }

    info!(
        listed = report.listed,
        saved = report.saved,
        already_present = report.already_present,
        skipped = report.skips.total(),
        write_failures = report.write_failures,
        "Archive complete"
    );
    Ok(report)
}

async fn archive_one<C: HttpClient + ?Sized>(
    client: &C,
    settings: &Settings,
    notice: &ListedNotice,
    dir: &Path,
) -> ArchiveOutcome {
    let path = dir.join(format!("detail_{}.xml", notice.id));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return ArchiveOutcome::AlreadyPresent(path);
    }

    match fetch_detail(client, settings, &notice.id).await {
        Err(skip) => ArchiveOutcome::Skipped(skip),
        Ok(body) => match tokio::fs::write(&path, &body).await {
            Ok(()) => ArchiveOutcome::Saved(path),
            Err(e) => ArchiveOutcome::WriteFailed(e.to_string()),
        },
    }
}

/// Runs `work` once per notice on at most `settings.concurrency` concurrent
/// tasks and returns the results in listing order. A task that panics is
/// reported as [`Skip::TaskFailed`] for its notice.
async fn run_pool<C, T, F, Fut>(
    client: Arc<C>,
    settings: &Settings,
    notices: Vec<ListedNotice>,
    work: F,
) -> Vec<(ListedNotice, Result<T, Skip>)>
where
    C: HttpClient + 'static,
    T: Send + 'static,
    F: Fn(Arc<C>, Arc<Settings>, ListedNotice) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let settings = Arc::new(settings.clone());
    let mut tasks = Vec::with_capacity(notices.len());

    for (index, notice) in notices.into_iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let span = tracing::info_span!("process_notice", notam = %notice.id, index);
        let job = work(Arc::clone(&client), Arc::clone(&settings), notice.clone());

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire_owned().await.ok();
                job.await
            }
            .instrument(span),
        );
        tasks.push((notice, task));
    }

    // Awaited in spawn order, so results come back in listing order.
    let mut results = Vec::with_capacity(tasks.len());
    for (notice, task) in tasks {
        let result = task.await.map_err(|e| {
            error!(notam = %notice.id, error = %e, "Notice task failed");
            Skip::TaskFailed(e.to_string())
        });
        results.push((notice, result));
    }
    results
}
