//! Filtered downloads and tag removal.

use crate::client::SiteClient;
use crate::config::ExportConfig;
use crate::download::{ContentTypeMap, download_content};
use crate::endpoints::Endpoint;
use crate::error::Result;
use crate::filters::{apply_filters, tag_to_remove};
use crate::tags::remove_tag_from_items;
use crate::types::{ContentItem, ContentKind, ExportedContent, FilterCriteria};
use crate::utils::{ProjectDirectories, safe_file_name, unique_base_name};
use std::path::Path;

use super::inventory::content_slot;
use super::{Worker, checkpoint};

impl Worker {
    /// Export datasources, then workbooks
    pub(super) async fn export(
        &mut self,
        client: &SiteClient,
        export: &ExportConfig,
    ) -> Result<()> {
        self.log.add_status_header("Exporting content");
        let Some(criteria) = self.export_criteria(export) else {
            return Ok(());
        };

        let directories = export
            .into_project_directories
            .then(|| ProjectDirectories::new(self.results.projects.as_deref().unwrap_or_default()));

        for (kind, enabled) in [
            (ContentKind::Datasource, export.datasources),
            (ContentKind::Workbook, export.workbooks),
        ] {
            if !enabled {
                continue;
            }
            checkpoint(&self.cancel)?;
            let items = self.content_list(client, kind).await;
            let selected = apply_filters(&items, &criteria, &self.log);
            self.log.add_status(format!(
                "Exporting {} of {} {}",
                selected.len(),
                items.len(),
                kind.collection()
            ));

            let destination = export.destination.join(kind.collection());
            let mut exported = Vec::new();
            for item in selected {
                checkpoint(&self.cancel)?;
                let directory = match &directories {
                    Some(dirs) => dirs.directory_for(&destination, &item, &self.log),
                    None => destination.clone(),
                };
                match export_item(client, &item, &directory).await {
                    Ok(path) => {
                        self.log.add_status(format!(
                            "Exported {} {} to {}",
                            kind,
                            item.name(),
                            path.display()
                        ));
                        self.results.exported.push(ExportedContent {
                            kind,
                            id: item.id().to_string(),
                            name: item.name().to_string(),
                            path,
                        });
                        exported.push(item);
                    }
                    Err(e) => self.log.record_error(item.name(), &e),
                }
            }

            if let Some(tag) = tag_to_remove(&criteria)
                && !exported.is_empty()
            {
                checkpoint(&self.cancel)?;
                remove_tag_from_items(client, &mut exported, tag).await;
                self.sync_items(kind, &exported);
            }
        }
        Ok(())
    }

    /// Filters for this export, or `None` when the project filter names an unknown project
    fn export_criteria(&self, export: &ExportConfig) -> Option<FilterCriteria> {
        let project_name = export
            .project_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let project_id = match project_name {
            None => None,
            Some(name) => {
                let found = self
                    .results
                    .projects
                    .iter()
                    .flatten()
                    .find(|p| p.name == name)
                    .map(|p| p.id.clone());
                match found {
                    Some(id) => Some(id),
                    None => {
                        self.log.add_error(format!(
                            "Project filter '{name}' matches no project; export skipped"
                        ));
                        return None;
                    }
                }
            }
        };
        Some(FilterCriteria {
            project_id,
            tag: export.tag.clone(),
            delete_tag_after_match: export.remove_tag_after_export,
        })
    }

    /// Replace listed items of `kind` with their updated copies
    fn sync_items(&mut self, kind: ContentKind, updated: &[ContentItem]) {
        let Some(list) = content_slot(&mut self.results, kind).as_mut() else {
            return;
        };
        for item in updated {
            if let Some(slot) = list.iter_mut().find(|listed| listed.id() == item.id()) {
                *slot = item.clone();
            }
        }
    }
}

/// Download one item under a name that collides with nothing in `directory`
async fn export_item(
    client: &SiteClient,
    item: &ContentItem,
    directory: &Path,
) -> Result<std::path::PathBuf> {
    let kind = item.kind();
    let types = ContentTypeMap::for_kind(kind);
    let endpoint = match kind {
        ContentKind::Workbook => Endpoint::WorkbookContent,
        ContentKind::Datasource => Endpoint::DatasourceContent,
    };
    let url = client.url(endpoint, &[("itemId", item.id())])?;
    let base = unique_base_name(directory, &safe_file_name(item.name()), &types.extensions())?;
    download_content(client, &url, directory, &base, &types).await
}
