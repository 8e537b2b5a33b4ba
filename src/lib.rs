//! # site-migrate
//!
//! Content migration engine for session-authenticated, paginated REST content
//! servers hosting workbooks and datasources.
//!
//! ## Design Philosophy
//!
//! site-migrate is designed to be:
//! - **Partial-failure tolerant** - A failed page, download, upload or tag removal is logged and skipped
//! - **Poll-friendly** - One background worker per task; owners poll a done flag and read the log
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Pluggable** - Reference remapping and report writing sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use site_migrate::{Config, ExportConfig, Migrator, TaskConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut export = ExportConfig::new("/srv/exports");
//!     export.tag = Some("migrate".to_string());
//!     export.remove_tag_after_export = true;
//!
//!     let mut config = Config::new(
//!         "https://reports.example.com/#/site/sales/workbooks",
//!         "admin",
//!         "secret",
//!     );
//!     config.task = TaskConfig::export(export);
//!
//!     let migrator = Migrator::new(config)?;
//!     migrator.start()?;
//!     while !migrator.is_done() {
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//!     let results = migrator.wait().await;
//!
//!     println!("{}", migrator.status_text());
//!     println!("exported {} items", results.exported.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Site-bound HTTP client
pub mod client;
/// Configuration types
pub mod config;
/// Database credentials for published content
pub mod credentials;
/// Content downloads
pub mod download;
/// Content URL parsing and endpoint templates
pub mod endpoints;
/// Error types
pub mod error;
/// Project and tag filters
pub mod filters;
/// Migration orchestrator
pub mod migrator;
/// Paginated listings
pub mod pagination;
/// Response record decoders
pub mod records;
/// Reference remapping for imported workbooks
pub mod remap;
/// Inventory and manual-steps reports
pub mod reports;
/// Authenticated sessions
pub mod session;
/// Tag removal
pub mod tags;
/// Shared status and error log
pub mod task_log;
/// Core types
pub mod types;
/// Chunked uploads
pub mod upload;
/// File-name helpers
pub mod utils;
/// XML documents
pub mod xml;

// Re-export commonly used types
pub use client::SiteClient;
pub use config::{
    Config, ExportConfig, ImportConfig, OutputConfig, ProjectCreationPolicy, RequestConfig,
    ServerConfig, TaskConfig, UploadConfig, derive_key,
};
pub use credentials::{Credential, CredentialStore};
pub use endpoints::{Endpoint, EndpointBuilder, SiteUrl};
pub use error::{Error, Result, UploadPhase};
pub use migrator::Migrator;
pub use remap::{NoOpRemapper, ReferenceRemapper};
pub use reports::{JsonReportWriter, ReportWriter};
pub use session::Session;
pub use task_log::{StatusLevel, TaskLog};
pub use types::{
    Connection, ContentItem, ContentKind, ExportedContent, FilterCriteria, Group, ManualAction,
    MigrationResults, Project, PublishedContent, SiteInfo, User,
};
