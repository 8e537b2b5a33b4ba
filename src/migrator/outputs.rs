//! Reports and appended log files written at the end of a run.

use crate::error::Result;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::Worker;

impl Worker {
    /// Write every output configured for this run; failures are logged
    pub(super) async fn write_outputs(&mut self) {
        let output = self.config.output.clone();

        if let Some(path) = &output.inventory_file {
            match self.reports.write_inventory(path, &self.results).await {
                Ok(()) => {
                    self.log
                        .add_status(format!("Inventory written to {}", path.display()));
                    self.results.inventory_report = Some(path.clone());
                }
                Err(e) => self.log.record_error("Inventory report", &e),
            }
        }

        if let Some(path) = &output.manual_steps_file {
            match self
                .reports
                .write_manual_steps(path, &self.results.manual_actions)
                .await
            {
                Ok(()) => {
                    self.log.add_status(format!(
                        "{} manual steps written to {}",
                        self.results.manual_actions.len(),
                        path.display()
                    ));
                    self.results.manual_steps_report = Some(path.clone());
                }
                Err(e) => self.log.record_error("Manual steps report", &e),
            }
        }

        if let Some(path) = &output.log_file
            && let Err(e) = append_to_file(path, &self.log.status_text()).await
        {
            self.log.record_error("Log file", &e);
        }

        if let Some(path) = &output.errors_file {
            let errors = self.log.error_text();
            if !errors.is_empty()
                && let Err(e) = append_to_file(path, &errors).await
            {
                tracing::error!(path = %path.display(), error = %e, "failed to append error log");
            }
        }
    }
}

/// Append `text` to `path`, creating the file and its parent directories
async fn append_to_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
