//! Migration orchestrator
//!
//! [`Migrator`] runs one configured task on a single background worker. Work
//! is split across submodules by stage:
//! - [`inventory`] - diagnostics, project creation and the inventory listings
//! - [`export`] - filtered downloads and tag removal
//! - [`import`] - source validation, project resolution and publishing
//! - [`outputs`] - reports and appended log files
//!
//! The owner polls [`Migrator::is_done`] and reads the shared [`TaskLog`] while
//! the worker runs. [`Migrator::abort`] is cooperative: the worker stops at the
//! next checkpoint between stages or items, never in the middle of a request.

mod export;
mod import;
mod inventory;
mod outputs;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::client::SiteClient;
use crate::config::Config;
use crate::endpoints::SiteUrl;
use crate::error::{Error, Result};
use crate::remap::{NoOpRemapper, ReferenceRemapper};
use crate::reports::{JsonReportWriter, ReportWriter};
use crate::task_log::TaskLog;
use crate::types::MigrationResults;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One migration task (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Migrator {
    /// Immutable settings for this run
    config: Arc<Config>,
    /// Parsed content URL
    site: SiteUrl,
    /// Status and error log shared with the worker
    log: TaskLog,
    /// Cancelled by [`Migrator::abort`]
    cancel: CancellationToken,
    /// Set when the worker finished, failed, panicked or was aborted
    done: Arc<AtomicBool>,
    /// Claimed by the first [`Migrator::start`] or [`Migrator::run`]
    started: Arc<AtomicBool>,
    /// Worker spawned by [`Migrator::start`]
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Published when the worker finishes
    results: Arc<Mutex<MigrationResults>>,
    /// Rewrites workbook references before import
    remapper: Arc<dyn ReferenceRemapper>,
    /// Writes inventory and manual-steps reports
    reports: Arc<dyn ReportWriter>,
}

/// Sets the done flag when dropped, including during a panic unwind
struct DoneGuard(Arc<AtomicBool>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Migrator {
    /// Create a migrator for `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings and
    /// [`Error::UnrecognizedUrlFormat`] when the content URL cannot be parsed.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let site = SiteUrl::parse(&config.server.content_url)?;
        let log = TaskLog::new(config.verbose_log);
        Ok(Self {
            config: Arc::new(config),
            site,
            log,
            cancel: CancellationToken::new(),
            done: Arc::new(AtomicBool::new(false)),
            started: Arc::new(AtomicBool::new(false)),
            worker: Arc::new(Mutex::new(None)),
            results: Arc::new(Mutex::new(MigrationResults::default())),
            remapper: Arc::new(NoOpRemapper),
            reports: Arc::new(JsonReportWriter),
        })
    }

    /// Use `remapper` for workbooks imported with reference remapping
    pub fn with_remapper(mut self, remapper: Arc<dyn ReferenceRemapper>) -> Self {
        self.remapper = remapper;
        self
    }

    /// Use `reports` for the inventory and manual-steps files
    pub fn with_report_writer(mut self, reports: Arc<dyn ReportWriter>) -> Self {
        self.reports = reports;
        self
    }

    /// Settings this migrator was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared status and error log
    pub fn log(&self) -> &TaskLog {
        &self.log
    }

    /// Mark the task as started; only the first caller across all clones wins
    fn claim(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Other("task already started".into()));
        }
        Ok(())
    }

    /// Spawn the worker on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the task was already started or run.
    pub fn start(&self) -> Result<()> {
        self.claim()?;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let _done = DoneGuard(Arc::clone(&this.done));
            if AssertUnwindSafe(this.run_worker()).catch_unwind().await.is_err() {
                tracing::error!("migration worker panicked");
                this.log.add_error("Task worker panicked");
            }
        });
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        tracing::info!(url = %self.config.server.content_url, "migration task started");
        Ok(())
    }

    /// Run the task on the calling task and return its results
    ///
    /// Task errors do not escape: they are written to the error log, and
    /// whatever was gathered before the failure is still returned and persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the task was already started or run.
    pub async fn run(&self) -> Result<MigrationResults> {
        self.claim()?;
        Ok(self.run_worker().await)
    }

    async fn run_worker(&self) -> MigrationResults {
        let _done = DoneGuard(Arc::clone(&self.done));
        let mut worker = Worker {
            config: Arc::clone(&self.config),
            site: self.site.clone(),
            log: self.log.clone(),
            cancel: self.cancel.clone(),
            remapper: Arc::clone(&self.remapper),
            reports: Arc::clone(&self.reports),
            results: MigrationResults::default(),
            project_cache: HashMap::new(),
        };

        match worker.execute().await {
            Ok(()) => worker.log.add_status_header("Task complete"),
            Err(Error::Aborted) => worker.log.add_status("Task aborted"),
            Err(e) => worker.log.record_error("Error executing tasks", &e),
        }
        worker.write_outputs().await;

        tracing::info!(
            errors = worker.log.error_count(),
            exported = worker.results.exported.len(),
            published = worker.results.published.len(),
            "migration task finished"
        );
        let results = worker.results;
        *self.results.lock().unwrap_or_else(PoisonError::into_inner) = results.clone();
        results
    }

    /// Ask the worker to stop at its next checkpoint and mark the task done
    ///
    /// A request already in flight is not interrupted.
    pub fn abort(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("migration task abort requested");
            self.log.add_status("Abort requested");
        }
        self.cancel.cancel();
        self.done.store(true, Ordering::SeqCst);
    }

    /// Whether the task is finished or aborted
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Whether [`Migrator::abort`] was called
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Snapshot of the status log
    pub fn status_text(&self) -> String {
        self.log.status_text()
    }

    /// Snapshot of the error log
    pub fn error_text(&self) -> String {
        self.log.error_text()
    }

    /// Number of errors logged so far
    pub fn error_count(&self) -> usize {
        self.log.error_count()
    }

    /// Results of the last finished run (empty until then)
    pub fn results(&self) -> MigrationResults {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait for the worker spawned by [`Migrator::start`] and return its results
    pub async fn wait(&self) -> MigrationResults {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "migration worker did not complete");
            self.log.add_error(format!("Task worker did not complete: {e}"));
        }
        self.results()
    }
}

/// State of one run, owned by the worker
pub(crate) struct Worker {
    config: Arc<Config>,
    site: SiteUrl,
    log: TaskLog,
    cancel: CancellationToken,
    remapper: Arc<dyn ReferenceRemapper>,
    reports: Arc<dyn ReportWriter>,
    results: MigrationResults,
    /// Import project name -> resolved id, `None` when it could not be resolved
    project_cache: HashMap<String, Option<String>>,
}

impl Worker {
    /// Every stage in order; returns early on abort or a fatal failure
    async fn execute(&mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let task = &config.task;
        self.log.add_status_header("Starting task");

        if let Some(import) = &task.import {
            import::validate_source(import)?;
        }
        checkpoint(&self.cancel)?;

        let mut client = SiteClient::new(self.site.clone(), &config.request, self.log.clone())?;
        let signed_in = client
            .sign_in(&config.server.username, &config.server.password)
            .await
            .and_then(|ok| {
                ok.then_some(()).ok_or_else(|| Error::Authentication {
                    reason: "no user id returned".into(),
                })
            });
        if let Err(e) = signed_in {
            self.log.add_status("Sign-in failed");
            return Err(e);
        }
        checkpoint(&self.cancel)?;

        self.run_diagnostics(&client, &task.diagnostic_requests).await;
        if let Some(name) = &task.create_project {
            self.create_configured_project(&client, name).await;
        }
        checkpoint(&self.cancel)?;

        if task.needs_projects() {
            self.fetch_projects(&client).await;
            checkpoint(&self.cancel)?;
        }
        if task.list_groups {
            self.fetch_groups(&client).await?;
            checkpoint(&self.cancel)?;
        }
        if task.list_users {
            self.fetch_users(&client).await;
            checkpoint(&self.cancel)?;
        }
        if task.site_info {
            self.fetch_site_info(&client).await;
            checkpoint(&self.cancel)?;
        }

        if let Some(export) = &task.export {
            self.export(&client, export).await?;
            checkpoint(&self.cancel)?;
        }

        self.inventory_content(&client).await?;
        checkpoint(&self.cancel)?;

        if let Some(import) = &task.import {
            self.import(&client, import).await?;
        }
        Ok(())
    }
}

/// [`Error::Aborted`] once the run was cancelled
fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Aborted)
    } else {
        Ok(())
    }
}
