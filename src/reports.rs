//! Inventory and manual-steps reports

use crate::error::Result;
use crate::types::{ManualAction, MigrationResults};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

/// Writes the reports requested in [`crate::config::OutputConfig`]
#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Write everything the run listed, exported and published
    async fn write_inventory(&self, path: &Path, results: &MigrationResults) -> Result<()>;

    /// Write the steps a person has to finish by hand
    async fn write_manual_steps(&self, path: &Path, actions: &[ManualAction]) -> Result<()>;
}

/// Writes reports as pretty-printed JSON
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonReportWriter;

impl JsonReportWriter {
    async fn write_json<T: Serialize + Sync + ?Sized>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut text = serde_json::to_string_pretty(value)?;
        text.push('\n');
        tokio::fs::write(path, text).await?;
        Ok(())
    }
}

#[async_trait]
impl ReportWriter for JsonReportWriter {
    async fn write_inventory(&self, path: &Path, results: &MigrationResults) -> Result<()> {
        Self::write_json(path, results).await
    }

    async fn write_manual_steps(&self, path: &Path, actions: &[ManualAction]) -> Result<()> {
        Self::write_json(path, actions).await
    }
}
