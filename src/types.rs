//! Core types for site-migrate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The two kinds of publishable content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A workbook (`.twb` / `.twbx`)
    Workbook,
    /// A published data source (`.tds` / `.tdsx`)
    Datasource,
}

impl ContentKind {
    /// REST collection name, also used as the local directory name
    pub fn collection(&self) -> &'static str {
        match self {
            ContentKind::Workbook => "workbooks",
            ContentKind::Datasource => "datasources",
        }
    }

    /// XML element name of one record
    pub fn element(&self) -> &'static str {
        match self {
            ContentKind::Workbook => "workbook",
            ContentKind::Datasource => "datasource",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.element())
    }
}

/// A database connection embedded in a workbook or datasource
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection id
    pub id: String,
    /// Connection type (e.g., "sqlserver", "excel-direct")
    pub connection_type: String,
    /// Database server address
    pub server_address: Option<String>,
    /// Database server port
    pub server_port: Option<String>,
    /// Database user name
    pub user_name: Option<String>,
}

/// A workbook or datasource as known to the server
///
/// Identity fields are fixed at construction. Tags and connections are
/// enrichments applied after the fact through a crate-private editor that only the
/// orchestration layer can obtain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContentItem {
    kind: ContentKind,
    id: String,
    name: String,
    project_id: Option<String>,
    project_name: Option<String>,
    owner_id: Option<String>,
    content_url: Option<String>,
    show_tabs: bool,
    tags: Vec<String>,
    connections: Option<Vec<Connection>>,
}

impl ContentItem {
    /// Create an item with no project, owner or tags
    pub fn new(kind: ContentKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
            project_id: None,
            project_name: None,
            owner_id: None,
            content_url: None,
            show_tabs: false,
            tags: Vec::new(),
            connections: None,
        }
    }

    /// Set the owning project
    pub fn with_project(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.project_id = Some(id.into());
        self.project_name = name;
        self
    }

    /// Set the owner
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Set the tags, dropping duplicates but keeping first-seen order
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.clear();
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Set the content URL (workbooks only)
    pub fn with_content_url(mut self, content_url: impl Into<String>) -> Self {
        self.content_url = Some(content_url.into());
        self
    }

    /// Set whether views are shown as tabs (workbooks only)
    pub fn with_show_tabs(mut self, show_tabs: bool) -> Self {
        self.show_tabs = show_tabs;
        self
    }

    /// Content kind
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Server id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning project id
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Owning project name, when the listing included it
    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    /// Owner user id
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    /// URL segment of a workbook
    pub fn content_url(&self) -> Option<&str> {
        self.content_url.as_deref()
    }

    /// Whether a workbook shows its views as tabs
    pub fn show_tabs(&self) -> bool {
        self.show_tabs
    }

    /// Tags in server order
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Exact, case-sensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Connections, once they have been downloaded
    pub fn connections(&self) -> Option<&[Connection]> {
        self.connections.as_deref()
    }

    pub(crate) fn editor(&mut self) -> ContentEditor<'_> {
        ContentEditor { item: self }
    }
}

/// Mutable access to the enrichable parts of a [`ContentItem`]
pub(crate) struct ContentEditor<'a> {
    item: &'a mut ContentItem,
}

impl ContentEditor<'_> {
    pub(crate) fn set_connections(&mut self, connections: Vec<Connection>) {
        self.item.connections = Some(connections);
    }

    /// Returns whether the tag was present
    pub(crate) fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.item.tags.len();
        self.item.tags.retain(|t| t != tag);
        self.item.tags.len() != before
    }
}

/// A project on the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: String,
    /// Project name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Parent project, for nested projects
    pub parent_project_id: Option<String>,
}

/// A site user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: String,
    /// Login name
    pub name: String,
    /// Site role (e.g., "Interactor", "SiteAdministrator")
    pub site_role: Option<String>,
}

/// A group and the members fetched for it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group id
    pub id: String,
    /// Group name
    pub name: String,
    /// Members, appended after the group itself was listed
    #[serde(default)]
    pub members: Vec<User>,
}

/// Information about the signed-in site
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    /// Site id
    pub id: String,
    /// Display name
    pub name: String,
    /// URL segment (empty for the default site)
    pub content_url: String,
    /// Administration mode
    pub admin_mode: Option<String>,
    /// Site state (e.g., "Active")
    pub state: Option<String>,
}

/// Filters applied to a content list before export
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Keep only content in this project
    pub project_id: Option<String>,
    /// Keep only content carrying this tag
    pub tag: Option<String>,
    /// Remove `tag` from each item once it was exported
    pub delete_tag_after_match: bool,
}

/// A downloaded item
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportedContent {
    /// Content kind
    pub kind: ContentKind,
    /// Server id
    pub id: String,
    /// Display name
    pub name: String,
    /// Where the file was written
    pub path: PathBuf,
}

/// A published item
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishedContent {
    /// Content kind
    pub kind: ContentKind,
    /// Id assigned by the server
    pub id: String,
    /// Published name
    pub name: String,
    /// Target project
    pub project_id: String,
    /// File that was published
    pub source: PathBuf,
}

/// Something a person has to finish after the run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManualAction {
    /// Content kind, when the action concerns one item
    pub kind: Option<ContentKind>,
    /// Item or project name
    pub name: String,
    /// What needs to be done and why
    pub reason: String,
}

/// Everything a migration run produced
#[derive(Clone, Debug, Default, Serialize)]
pub struct MigrationResults {
    /// Site information
    pub site: Option<SiteInfo>,
    /// Projects, when listed
    pub projects: Option<Vec<Project>>,
    /// Groups with members, when listed
    pub groups: Option<Vec<Group>>,
    /// Users, when listed
    pub users: Option<Vec<User>>,
    /// Datasources, when listed or exported (unfiltered)
    pub datasources: Option<Vec<ContentItem>>,
    /// Workbooks, when listed or exported (unfiltered)
    pub workbooks: Option<Vec<ContentItem>>,
    /// Downloaded files
    pub exported: Vec<ExportedContent>,
    /// Published files
    pub published: Vec<PublishedContent>,
    /// Follow-up work for a person
    pub manual_actions: Vec<ManualAction>,
    /// Where the inventory report was written
    pub inventory_report: Option<PathBuf>,
    /// Where the manual-steps report was written
    pub manual_steps_report: Option<PathBuf>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_keep_first_seen_order_without_duplicates() {
        let item = ContentItem::new(ContentKind::Workbook, "1", "Sales")
            .with_tags(["b", "a", "b", "c"]);
        assert_eq!(item.tags(), ["b", "a", "c"]);
        assert!(item.has_tag("a"));
        assert!(!item.has_tag("A"));
    }

    #[test]
    fn editor_enriches_without_touching_identity() {
        let mut item = ContentItem::new(ContentKind::Datasource, "ds-1", "Orders")
            .with_tags(["export", "keep"]);

        let mut editor = item.editor();
        assert!(editor.remove_tag("export"));
        assert!(!editor.remove_tag("export"));
        editor.set_connections(vec![Connection {
            id: "c1".into(),
            connection_type: "postgres".into(),
            server_address: Some("db.local".into()),
            server_port: Some("5432".into()),
            user_name: None,
        }]);

        assert_eq!(item.id(), "ds-1");
        assert_eq!(item.name(), "Orders");
        assert_eq!(item.tags(), ["keep"]);
        assert_eq!(item.connections().map(<[Connection]>::len), Some(1));
    }

    #[test]
    fn kind_names_match_wire_collections() {
        assert_eq!(ContentKind::Workbook.collection(), "workbooks");
        assert_eq!(ContentKind::Datasource.element(), "datasource");
        assert_eq!(
            serde_json::to_string(&ContentKind::Datasource).unwrap(),
            "\"datasource\""
        );
    }
}
