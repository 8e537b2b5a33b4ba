//! Configuration types for site-migrate

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{path::PathBuf, time::Duration};

/// Default maximum upload chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 8_000_000;

/// Server connection and credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Content URL as copied from a browser, e.g. `https://host/#/site/alpha/workbooks`
    pub content_url: String,

    /// Sign-in user name
    pub username: String,

    /// Sign-in password (never written by [`Config::encode`])
    #[serde(default, skip_serializing)]
    pub password: String,
}

/// Request plumbing: API version, page size and timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestConfig {
    /// REST API version used in every URL (default: "2.0")
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Page size for paginated listings (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Timeout for metadata calls such as listings and sign-in (default: 120 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata_timeout: Duration,

    /// Timeout for content downloads and upload transfers (default: 15 minutes)
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    pub transfer_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            page_size: default_page_size(),
            metadata_timeout: default_metadata_timeout(),
            transfer_timeout: default_transfer_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Chunked upload settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum bytes per appended chunk (default: 8,000,000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between chunks, for throttling (default: none)
    #[serde(default, with = "millis_serde")]
    pub chunk_delay: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay: Duration::ZERO,
        }
    }
}

/// What a migration run does
///
/// Inventory flags, an optional export and an optional import can be combined
/// in one task. Steps run in a fixed order regardless of how they are combined.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    /// List projects
    #[serde(default)]
    pub list_projects: bool,

    /// List groups together with their members
    #[serde(default)]
    pub list_groups: bool,

    /// List users
    #[serde(default)]
    pub list_users: bool,

    /// Fetch site information
    #[serde(default)]
    pub site_info: bool,

    /// List datasources
    #[serde(default)]
    pub list_datasources: bool,

    /// List workbooks owned by the signed-in user
    #[serde(default)]
    pub list_workbooks: bool,

    /// Fetch connections for every listed workbook
    #[serde(default)]
    pub workbook_connections: bool,

    /// Fetch connections for every listed datasource
    #[serde(default)]
    pub datasource_connections: bool,

    /// Create a project with this name after sign-in
    #[serde(default)]
    pub create_project: Option<String>,

    /// GET URL templates issued after sign-in and logged (placeholders: `{{siteId}}`, `{{userId}}`)
    #[serde(default)]
    pub diagnostic_requests: Vec<String>,

    /// Export settings, if this task exports content
    #[serde(default)]
    pub export: Option<ExportConfig>,

    /// Import settings, if this task imports content
    #[serde(default)]
    pub import: Option<ImportConfig>,
}

impl TaskConfig {
    /// A read-only snapshot of everything on the site
    pub fn inventory() -> Self {
        Self {
            list_projects: true,
            list_groups: true,
            list_users: true,
            site_info: true,
            list_datasources: true,
            list_workbooks: true,
            workbook_connections: true,
            ..Default::default()
        }
    }

    /// Download content matching `export`'s filters
    pub fn export(export: ExportConfig) -> Self {
        Self {
            export: Some(export),
            ..Default::default()
        }
    }

    /// Publish content found under `import`'s source directory
    pub fn import(import: ImportConfig) -> Self {
        Self {
            import: Some(import),
            ..Default::default()
        }
    }

    /// Whether any step needs the project list
    pub(crate) fn needs_projects(&self) -> bool {
        self.list_projects
            || self.import.is_some()
            || self
                .export
                .as_ref()
                .is_some_and(|e| e.into_project_directories || e.project_name.is_some())
    }
}

/// Export settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root directory; content lands in `datasources/` and `workbooks/` below it
    pub destination: PathBuf,

    /// Export datasources (default: true)
    #[serde(default = "default_true")]
    pub datasources: bool,

    /// Export workbooks (default: true)
    #[serde(default = "default_true")]
    pub workbooks: bool,

    /// Only export content in the project with this name
    #[serde(default)]
    pub project_name: Option<String>,

    /// Only export content carrying this tag
    #[serde(default)]
    pub tag: Option<String>,

    /// Remove `tag` from each item after it was downloaded
    #[serde(default)]
    pub remove_tag_after_export: bool,

    /// Place downloads in one sub-directory per project
    #[serde(default)]
    pub into_project_directories: bool,
}

impl ExportConfig {
    /// Export everything into `destination`
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            datasources: true,
            workbooks: true,
            project_name: None,
            tag: None,
            remove_tag_after_export: false,
            into_project_directories: false,
        }
    }
}

/// How to handle files whose project does not exist on the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreationPolicy {
    /// Try to create the missing project
    #[serde(default = "default_true")]
    pub attempt_create: bool,

    /// Publish into the default project if the project is still missing
    #[serde(default = "default_true")]
    pub use_default_if_missing: bool,
}

impl Default for ProjectCreationPolicy {
    fn default() -> Self {
        Self {
            attempt_create: true,
            use_default_if_missing: true,
        }
    }
}

/// Import settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Directory holding `datasources/` and `workbooks/`, each with optional per-project sub-directories
    pub source: PathBuf,

    /// Publish datasources (default: true)
    #[serde(default = "default_true")]
    pub datasources: bool,

    /// Publish workbooks (default: true)
    #[serde(default = "default_true")]
    pub workbooks: bool,

    /// Rewrite datasource references inside workbooks before publishing
    #[serde(default)]
    pub remap_references: bool,

    /// Missing-project handling
    #[serde(default)]
    pub projects: ProjectCreationPolicy,

    /// XML file of database credentials to attach to published content
    #[serde(default)]
    pub db_credentials_file: Option<PathBuf>,
}

impl ImportConfig {
    /// Import both datasources and workbooks from `source`
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            datasources: true,
            workbooks: true,
            remap_references: false,
            projects: ProjectCreationPolicy::default(),
            db_credentials_file: None,
        }
    }
}

/// Files written at the end of a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Inventory report
    #[serde(default)]
    pub inventory_file: Option<PathBuf>,

    /// Steps a person has to finish by hand after an import
    #[serde(default)]
    pub manual_steps_file: Option<PathBuf>,

    /// Status log, appended
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Error log, appended only when errors occurred
    #[serde(default)]
    pub errors_file: Option<PathBuf>,
}

/// Main configuration for a migration run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Server and credentials
    pub server: ServerConfig,

    /// Request settings
    #[serde(default)]
    pub request: RequestConfig,

    /// Upload settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// What to do
    #[serde(default)]
    pub task: TaskConfig,

    /// Output artifacts
    #[serde(default)]
    pub output: OutputConfig,

    /// Include verbose entries in the status log
    #[serde(default)]
    pub verbose_log: bool,
}

impl Config {
    /// Configuration for `content_url` with default settings and an empty task
    pub fn new(
        content_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: ServerConfig {
                content_url: content_url.into(),
                username: username.into(),
                password: password.into(),
            },
            request: RequestConfig::default(),
            upload: UploadConfig::default(),
            task: TaskConfig::default(),
            output: OutputConfig::default(),
            verbose_log: false,
        }
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.server.content_url.trim().is_empty() {
            return Err(Error::config("server.content_url", "content URL is empty"));
        }
        if self.server.username.trim().is_empty() {
            return Err(Error::config("server.username", "user name is empty"));
        }
        if self.request.page_size == 0 {
            return Err(Error::config("request.page_size", "page size must be > 0"));
        }
        if self.upload.chunk_size == 0 {
            return Err(Error::config("upload.chunk_size", "chunk size must be > 0"));
        }
        if let Some(export) = &self.task.export
            && export.destination.as_os_str().is_empty()
        {
            return Err(Error::config(
                "task.export.destination",
                "export destination is empty",
            ));
        }
        if let Some(import) = &self.task.import
            && import.source.as_os_str().is_empty()
        {
            return Err(Error::config("task.import.source", "import source is empty"));
        }
        Ok(())
    }

    /// Serialize settings for the persistence layer (the password is omitted)
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore settings written by [`Config::encode`]
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Derive a 256-bit settings key from an explicit context string
///
/// The result depends only on `context`, so callers choose what binds the key
/// (a user name, a machine id, a file path) and pass it in.
pub fn derive_key(context: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"site-migrate/settings-key/v1\0");
    hasher.update(context.as_bytes());
    hasher.finalize().into()
}

fn default_api_version() -> String {
    "2.0".to_string()
}

fn default_page_size() -> u32 {
    1000
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_user_agent() -> String {
    format!("site-migrate/{}", env!("CARGO_PKG_VERSION"))
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
