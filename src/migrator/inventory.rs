//! Diagnostics, project creation and inventory listings.

use crate::client::SiteClient;
use crate::endpoints::Endpoint;
use crate::error::{Error, Result};
use crate::pagination::{ListRequest, fetch_all};
use crate::task_log::StatusLevel;
use crate::types::{ContentItem, ContentKind, Group, MigrationResults, Project, User};
use reqwest::Method;
use std::sync::Arc;

use super::{Worker, checkpoint};

impl Worker {
    /// Issue each configured diagnostic GET and log what came back
    ///
    /// Failures are logged; none of them stops the task.
    pub(super) async fn run_diagnostics(&self, client: &SiteClient, templates: &[String]) {
        for (i, template) in templates.iter().enumerate() {
            let name = format!("diagnostic-{}", i + 1);
            let outcome = async {
                let url = client.url_from_template(&name, template)?;
                let request = client.signed(Method::GET, &url)?;
                let response = client.send(request, &url).await?;
                let status = response.status().as_u16();
                let body = response.text().await?;
                Ok::<_, Error>((url, status, body))
            }
            .await;
            match outcome {
                Ok((url, status, body)) => {
                    self.log
                        .add_status(format!("Diagnostic request {url}: status {status}"));
                    self.log.add_status_at(body, StatusLevel::Debug);
                }
                Err(e) => self.log.record_error(&name, &e),
            }
        }
    }

    /// Create the project named in the task; failure is logged
    pub(super) async fn create_configured_project(&mut self, client: &SiteClient, name: &str) {
        match client.create_project(name, "").await {
            Ok(project) => {
                self.log
                    .add_status(format!("Created project {} ({})", project.name, project.id));
                if let Some(projects) = self.results.projects.as_mut() {
                    projects.push(project);
                }
            }
            Err(e) => self
                .log
                .record_error(&format!("Create project '{name}'"), &e),
        }
    }

    pub(super) async fn fetch_projects(&mut self, client: &SiteClient) {
        self.log.add_status_header("Projects");
        let request = ListRequest::new(Endpoint::Projects, "projects", "project");
        let projects: Vec<Project> = fetch_all(client, &request).await;
        self.log.add_status(format!("{} projects", projects.len()));
        self.results.projects = Some(projects);
    }

    /// List groups, then the members of each group
    pub(super) async fn fetch_groups(&mut self, client: &SiteClient) -> Result<()> {
        self.log.add_status_header("Groups");
        let request = ListRequest::new(Endpoint::Groups, "groups", "group");
        let mut groups: Vec<Group> = fetch_all(client, &request).await;
        for group in groups.iter_mut() {
            checkpoint(&self.cancel)?;
            let group_id = group.id.clone();
            let members = ListRequest::new(Endpoint::GroupMembers, "users", "user")
                .param("groupId", &group_id);
            group.members = fetch_all::<User>(client, &members).await;
            self.log.add_status_at(
                format!("Group {}: {} members", group.name, group.members.len()),
                StatusLevel::Verbose,
            );
        }
        self.log.add_status(format!("{} groups", groups.len()));
        self.results.groups = Some(groups);
        Ok(())
    }

    pub(super) async fn fetch_users(&mut self, client: &SiteClient) {
        self.log.add_status_header("Users");
        let request = ListRequest::new(Endpoint::Users, "users", "user");
        let users: Vec<User> = fetch_all(client, &request).await;
        self.log.add_status(format!("{} users", users.len()));
        self.results.users = Some(users);
    }

    pub(super) async fn fetch_site_info(&mut self, client: &SiteClient) {
        match client.site_info().await {
            Ok(site) => {
                self.log
                    .add_status(format!("Site {} ({})", site.name, site.id));
                self.results.site = Some(site);
            }
            Err(e) => self.log.record_error("Site info", &e),
        }
    }

    /// The unfiltered list of `kind`, fetched once per run
    pub(super) async fn content_list(
        &mut self,
        client: &SiteClient,
        kind: ContentKind,
    ) -> Vec<ContentItem> {
        if let Some(items) = content_slot(&mut self.results, kind) {
            return items.clone();
        }
        self.log.add_status_header(format!("Listing {}", kind.collection()));
        let request = match kind {
            ContentKind::Workbook => {
                ListRequest::new(Endpoint::WorkbooksForUser, "workbooks", "workbook")
            }
            ContentKind::Datasource => {
                ListRequest::new(Endpoint::Datasources, "datasources", "datasource")
            }
        };
        let items: Vec<ContentItem> = fetch_all(client, &request).await;
        self.log
            .add_status(format!("{} {}", items.len(), kind.collection()));
        content_slot(&mut self.results, kind).insert(items).clone()
    }

    /// Datasource and workbook listings, with connections when requested
    pub(super) async fn inventory_content(&mut self, client: &SiteClient) -> Result<()> {
        let config = Arc::clone(&self.config);
        let task = &config.task;
        let kinds = [
            (
                ContentKind::Datasource,
                task.list_datasources,
                task.datasource_connections,
            ),
            (
                ContentKind::Workbook,
                task.list_workbooks,
                task.workbook_connections,
            ),
        ];
        for (kind, list, connections) in kinds {
            if !list {
                continue;
            }
            self.content_list(client, kind).await;
            checkpoint(&self.cancel)?;
            if connections {
                self.enrich_connections(client, kind).await?;
            }
        }
        Ok(())
    }

    /// Attach connections to every listed item of `kind`
    async fn enrich_connections(&mut self, client: &SiteClient, kind: ContentKind) -> Result<()> {
        let Some(mut items) = content_slot(&mut self.results, kind).take() else {
            return Ok(());
        };
        let mut outcome = Ok(());
        for item in items.iter_mut() {
            if let Err(e) = checkpoint(&self.cancel) {
                outcome = Err(e);
                break;
            }
            match client.connections(kind, item.id()).await {
                Ok(connections) => {
                    self.log.add_status_at(
                        format!("{} {}: {} connections", kind, item.name(), connections.len()),
                        StatusLevel::Verbose,
                    );
                    item.editor().set_connections(connections);
                }
                Err(e) => self
                    .log
                    .record_error(&format!("Connections of {kind} {}", item.name()), &e),
            }
        }
        *content_slot(&mut self.results, kind) = Some(items);
        outcome
    }
}

/// The results field holding the list of `kind`
pub(super) fn content_slot(
    results: &mut MigrationResults,
    kind: ContentKind,
) -> &mut Option<Vec<ContentItem>> {
    match kind {
        ContentKind::Workbook => &mut results.workbooks,
        ContentKind::Datasource => &mut results.datasources,
    }
}
