//! Import: source validation, project resolution and publishing.
//!
//! The source directory holds `datasources/` and `workbooks/`. Files directly
//! inside a kind directory are published to the default project; files in
//! `<kind>/<project name>/` are published to that project.

use crate::client::SiteClient;
use crate::config::ImportConfig;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::task_log::StatusLevel;
use crate::types::{ContentKind, ManualAction, PublishedContent};
use crate::upload::{PublishFileType, PublishTarget, upload_file};
use std::path::{Path, PathBuf};

use super::{Worker, checkpoint};

/// Name of the project content lands in when none is given
pub(crate) const DEFAULT_PROJECT: &str = "Default";

/// Scratch directory for reference remapping, below the import source
pub(crate) const REMAP_WORKSPACE: &str = "_remapTempspace";

/// A file found in the import source
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ImportFile {
    pub(crate) path: PathBuf,
    /// Sub-directory name, `None` for files directly in the kind directory
    pub(crate) project: Option<String>,
}

/// Check that `import.source` has a directory for every enabled kind
pub(crate) fn validate_source(import: &ImportConfig) -> Result<()> {
    if !import.source.is_dir() {
        return Err(Error::DirectoryValidation {
            path: import.source.clone(),
            reason: "not a directory".into(),
        });
    }
    for (kind, enabled) in enabled_kinds(import) {
        let dir = import.source.join(kind.collection());
        if enabled && !dir.is_dir() {
            return Err(Error::DirectoryValidation {
                path: import.source.clone(),
                reason: format!("missing {}/ sub-directory", kind.collection()),
            });
        }
    }
    Ok(())
}

fn enabled_kinds(import: &ImportConfig) -> [(ContentKind, bool); 2] {
    [
        (ContentKind::Datasource, import.datasources),
        (ContentKind::Workbook, import.workbooks),
    ]
}

/// Files directly in `dir` and one level below it, sorted by path
pub(crate) async fn scan_kind_directory(dir: &Path) -> Result<Vec<ImportFile>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;
        if file_type.is_file() {
            files.push(ImportFile {
                path,
                project: None,
            });
        } else if file_type.is_dir() {
            let project = entry.file_name().to_string_lossy().into_owned();
            let mut inner = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = inner.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    files.push(ImportFile {
                        path: entry.path(),
                        project: Some(project.clone()),
                    });
                }
            }
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

impl Worker {
    /// Publish every file below the import source
    pub(super) async fn import(
        &mut self,
        client: &SiteClient,
        import: &ImportConfig,
    ) -> Result<()> {
        self.log.add_status_header("Importing content");
        let credentials = self.load_credentials(import).await;
        for (kind, enabled) in enabled_kinds(import) {
            if !enabled {
                continue;
            }
            checkpoint(&self.cancel)?;
            let dir = import.source.join(kind.collection());
            let files = scan_kind_directory(&dir).await?;
            self.log.add_status(format!(
                "{} files found in {}",
                files.len(),
                dir.display()
            ));
            for file in files {
                checkpoint(&self.cancel)?;
                self.import_file(client, import, credentials.as_ref(), kind, &file)
                    .await;
            }
        }

        if import.remap_references {
            let workspace = import.source.join(REMAP_WORKSPACE);
            if let Err(e) = tokio::fs::remove_dir_all(&workspace).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(
                    path = %workspace.display(),
                    error = %e,
                    "failed to remove remap workspace"
                );
            }
        }
        Ok(())
    }

    /// Credentials to attach while publishing; a file that cannot be loaded is
    /// logged and the import carries on without credentials
    async fn load_credentials(&self, import: &ImportConfig) -> Option<CredentialStore> {
        let path = import.db_credentials_file.as_ref()?;
        match CredentialStore::load(path).await {
            Ok(store) => {
                self.log.add_status(format!(
                    "Loaded {} database credentials from {}",
                    store.len(),
                    path.display()
                ));
                Some(store)
            }
            Err(e) => {
                self.log.record_error(
                    &format!("Loading database credentials file '{}'", path.display()),
                    &e,
                );
                None
            }
        }
    }

    /// Publish one file; every failure is logged and skips only this file
    async fn import_file(
        &mut self,
        client: &SiteClient,
        import: &ImportConfig,
        credentials: Option<&CredentialStore>,
        kind: ContentKind,
        file: &ImportFile,
    ) {
        let Some(file_type) = PublishFileType::from_path(&file.path).filter(|t| t.kind() == kind)
        else {
            self.log.add_status(format!(
                "Skipping {}: not a {kind} file",
                file.path.display()
            ));
            return;
        };
        let Some(name) = file
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
        else {
            return;
        };
        let Some(project_id) = self.resolve_project(client, import, file.project.as_deref()).await
        else {
            self.log.add_error(format!(
                "No target project for {}; not published",
                file.path.display()
            ));
            return;
        };

        let upload_path = if import.remap_references && kind == ContentKind::Workbook {
            match self.remap(&import.source, &file.path).await {
                Ok(path) => path,
                Err(e) => {
                    self.log
                        .record_error(&format!("Remap {}", file.path.display()), &e);
                    return;
                }
            }
        } else {
            file.path.clone()
        };

        let project_name = file.project.as_deref().unwrap_or(DEFAULT_PROJECT);
        let credential = credentials.and_then(|store| store.find(kind, project_name, &name));
        if credential.is_some() {
            self.log.add_status_at(
                format!("Attaching database credentials to {kind} {name}"),
                StatusLevel::Verbose,
            );
        }
        let target = PublishTarget {
            name: name.clone(),
            project_id: project_id.clone(),
            file_type,
            show_tabs: false,
            credentials: credential.cloned(),
        };
        self.log.add_status(format!("Publishing {kind} {name}"));
        match upload_file(client, &self.config.upload, &upload_path, &target).await {
            Ok(id) => {
                self.log
                    .add_status(format!("Published {kind} {name} as {id}"));
                self.results.published.push(PublishedContent {
                    kind,
                    id,
                    name,
                    project_id,
                    source: file.path.clone(),
                });
            }
            Err(e) => self.log.record_error(&format!("Publish {name}"), &e),
        }
    }

    async fn remap(&self, source: &Path, file: &Path) -> Result<PathBuf> {
        let workspace = source.join(REMAP_WORKSPACE);
        tokio::fs::create_dir_all(&workspace).await?;
        self.log.add_status_at(
            format!("Remapping {} with {}", file.display(), self.remapper.name()),
            StatusLevel::Verbose,
        );
        self.remapper.remap(file, &workspace, &self.site).await
    }

    /// Project id for a sub-directory name, `None` meaning the default project
    ///
    /// A name not on the server goes through the creation policy once; the
    /// outcome is cached for the rest of the run.
    async fn resolve_project(
        &mut self,
        client: &SiteClient,
        import: &ImportConfig,
        name: Option<&str>,
    ) -> Option<String> {
        let name = name.unwrap_or(DEFAULT_PROJECT);
        if let Some(cached) = self.project_cache.get(name) {
            return cached.clone();
        }

        let mut resolved = self.project_id(name);
        if resolved.is_none() && name != DEFAULT_PROJECT {
            resolved = self.resolve_missing_project(client, import, name).await;
        }
        if resolved.is_none() {
            self.log
                .add_error(format!("Project '{name}' not found on the server"));
        }
        self.project_cache.insert(name.to_string(), resolved.clone());
        resolved
    }

    async fn resolve_missing_project(
        &mut self,
        client: &SiteClient,
        import: &ImportConfig,
        name: &str,
    ) -> Option<String> {
        let policy = import.projects;
        if policy.attempt_create {
            match client.create_project(name, "").await {
                Ok(project) => {
                    self.log
                        .add_status(format!("Created project {} ({})", project.name, project.id));
                    let id = project.id.clone();
                    self.results.projects.get_or_insert_with(Vec::new).push(project);
                    return Some(id);
                }
                Err(e) => self
                    .log
                    .record_error(&format!("Create project '{name}'"), &e),
            }
        }
        if policy.use_default_if_missing
            && let Some(default_id) = self.project_id(DEFAULT_PROJECT)
        {
            self.log.add_status(format!(
                "Project '{name}' is missing; publishing its content to {DEFAULT_PROJECT}"
            ));
            self.results.manual_actions.push(ManualAction {
                kind: None,
                name: name.to_string(),
                reason: format!(
                    "Project was missing on the server; its content was published to {DEFAULT_PROJECT} and must be moved by hand"
                ),
            });
            return Some(default_id);
        }
        None
    }

    fn project_id(&self, name: &str) -> Option<String> {
        self.results
            .projects
            .iter()
            .flatten()
            .find(|p| p.name == name)
            .map(|p| p.id.clone())
    }
}
