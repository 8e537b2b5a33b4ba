//! Datasource reference remapping for imported workbooks
//!
//! Workbooks exported from one site embed references to datasources on that
//! site. Before such a workbook is published elsewhere, a [`ReferenceRemapper`]
//! can rewrite those references to point at the target site. The engine only
//! decides when to call it; how references are rewritten is up to the
//! implementation.

use crate::endpoints::SiteUrl;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Rewrites embedded references in a workbook file
///
/// # Examples
///
/// ```
/// use site_migrate::endpoints::SiteUrl;
/// use site_migrate::remap::{NoOpRemapper, ReferenceRemapper};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> site_migrate::Result<()> {
/// let target = SiteUrl::parse("https://reports.example.com/#/site/sales/workbooks")?;
/// let remapper = NoOpRemapper;
/// let path = remapper
///     .remap(Path::new("in/Sales.twb"), Path::new("in/_remapTempspace"), &target)
///     .await?;
/// assert_eq!(path, Path::new("in/Sales.twb"));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ReferenceRemapper: Send + Sync {
    /// Produce a publishable copy of `source` whose references point at `target`
    ///
    /// # Arguments
    ///
    /// * `source` - Workbook file found in the import directory
    /// * `workspace` - Scratch directory the remapper may write into; it exists
    ///   when this is called
    /// * `target` - Site the workbook is about to be published to
    ///
    /// # Returns
    ///
    /// The file to upload. Returning `source` itself means nothing changed.
    async fn remap(&self, source: &Path, workspace: &Path, target: &SiteUrl) -> Result<PathBuf>;

    /// Name used in log messages
    fn name(&self) -> &'static str;
}

/// Remapper that publishes files unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRemapper;

#[async_trait]
impl ReferenceRemapper for NoOpRemapper {
    async fn remap(&self, source: &Path, _workspace: &Path, _target: &SiteUrl) -> Result<PathBuf> {
        Ok(source.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
