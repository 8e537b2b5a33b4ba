//! Content URL parsing and REST endpoint templates
//!
//! Templates are relative to `{server}/api/{version}/` and name their
//! parameters as `{{name}}`. [`EndpointBuilder::build`] fails if any marker is
//! left after substitution.

use crate::error::{Error, Result};

/// Opening marker of an unsubstituted placeholder
const PLACEHOLDER_MARKER: &str = "{{";

/// Which URL shape a content URL used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlFlavor {
    /// `/t/<site>/…`
    SitePath,
    /// `/#/site/<site>/…`
    FragmentSite,
    /// `/#/…` on the default site
    FragmentDefault,
}

/// A parsed content URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteUrl {
    /// Lowercased scheme, `http` or `https`
    pub protocol: String,
    /// Host, with the port when one was given
    pub server_name: String,
    /// Site URL segment; empty for the default site
    pub site_segment: String,
    /// The URL shape that was recognised
    pub flavor: UrlFlavor,
}

impl SiteUrl {
    /// Parse a content URL as copied from a browser
    ///
    /// ```
    /// use site_migrate::endpoints::SiteUrl;
    ///
    /// let site = SiteUrl::parse("https://tableau.example.com/#/site/alpha/workbooks").unwrap();
    /// assert_eq!(site.site_segment, "alpha");
    /// assert_eq!(site.server_base(), "https://tableau.example.com");
    /// ```
    pub fn parse(content_url: &str) -> Result<Self> {
        let unrecognized = || Error::UnrecognizedUrlFormat {
            url: content_url.to_string(),
        };

        let url = url::Url::parse(content_url.trim()).map_err(|_| unrecognized())?;
        let protocol = url.scheme().to_ascii_lowercase();
        if protocol != "http" && protocol != "https" {
            return Err(unrecognized());
        }
        let host = url.host_str().ok_or_else(unrecognized)?;
        let server_name = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let path: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
        let (site_segment, flavor) = match path.as_slice() {
            ["t", site, ..] => (site.to_string(), UrlFlavor::SitePath),
            [] => {
                let fragment = url.fragment().ok_or_else(unrecognized)?;
                let parts: Vec<&str> = fragment.split('/').filter(|s| !s.is_empty()).collect();
                match parts.as_slice() {
                    ["site", site, ..] => (site.to_string(), UrlFlavor::FragmentSite),
                    // `/#/site/` with an empty segment names the default site
                    ["site"] if fragment.starts_with("/site/") => {
                        (String::new(), UrlFlavor::FragmentSite)
                    }
                    ["site"] => return Err(unrecognized()),
                    _ if fragment.starts_with('/') || fragment.is_empty() => {
                        (String::new(), UrlFlavor::FragmentDefault)
                    }
                    _ => return Err(unrecognized()),
                }
            }
            _ => return Err(unrecognized()),
        };

        Ok(Self {
            protocol,
            server_name,
            site_segment,
            flavor,
        })
    }

    /// `scheme://host[:port]`
    pub fn server_base(&self) -> String {
        format!("{}://{}", self.protocol, self.server_name)
    }

    /// Whether this is the server's default site
    pub fn is_default_site(&self) -> bool {
        self.site_segment.is_empty()
    }
}

/// Named REST endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Sign in
    SignIn,
    /// Site information
    SiteInfo,
    /// Workbooks owned by a user, paged
    WorkbooksForUser,
    /// Datasources, paged
    Datasources,
    /// Projects, paged
    Projects,
    /// Groups, paged
    Groups,
    /// Users, paged
    Users,
    /// Members of one group, paged
    GroupMembers,
    /// Connections of one workbook
    WorkbookConnections,
    /// Connections of one datasource
    DatasourceConnections,
    /// Workbook content
    WorkbookContent,
    /// Datasource content
    DatasourceContent,
    /// Open an upload session
    InitiateUpload,
    /// Append a chunk to an upload session
    AppendUpload,
    /// Publish an upload session as a workbook
    FinalizeWorkbook,
    /// Publish an upload session as a datasource
    FinalizeDatasource,
    /// Create a project
    CreateProject,
    /// Remove a tag from a workbook
    DeleteWorkbookTag,
    /// Remove a tag from a datasource
    DeleteDatasourceTag,
}

impl Endpoint {
    /// Name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::SignIn => "sign-in",
            Endpoint::SiteInfo => "site-info",
            Endpoint::WorkbooksForUser => "workbooks-list",
            Endpoint::Datasources => "datasources-list",
            Endpoint::Projects => "projects-list",
            Endpoint::Groups => "groups-list",
            Endpoint::Users => "users-list",
            Endpoint::GroupMembers => "group-members-list",
            Endpoint::WorkbookConnections => "workbook-connections",
            Endpoint::DatasourceConnections => "datasource-connections",
            Endpoint::WorkbookContent => "workbook-content",
            Endpoint::DatasourceContent => "datasource-content",
            Endpoint::InitiateUpload => "upload-initiate",
            Endpoint::AppendUpload => "upload-append",
            Endpoint::FinalizeWorkbook => "workbook-publish",
            Endpoint::FinalizeDatasource => "datasource-publish",
            Endpoint::CreateProject => "project-create",
            Endpoint::DeleteWorkbookTag => "workbook-tag-delete",
            Endpoint::DeleteDatasourceTag => "datasource-tag-delete",
        }
    }

    /// Path and query, relative to the API root
    pub fn template(&self) -> &'static str {
        match self {
            Endpoint::SignIn => "auth/signin",
            Endpoint::SiteInfo => "sites/{{siteId}}",
            Endpoint::WorkbooksForUser => {
                "sites/{{siteId}}/users/{{userId}}/workbooks?pageSize={{pageSize}}&pageNumber={{pageNumber}}"
            }
            Endpoint::Datasources => {
                "sites/{{siteId}}/datasources?pageSize={{pageSize}}&pageNumber={{pageNumber}}"
            }
            Endpoint::Projects => {
                "sites/{{siteId}}/projects?pageSize={{pageSize}}&pageNumber={{pageNumber}}"
            }
            Endpoint::Groups => {
                "sites/{{siteId}}/groups?pageSize={{pageSize}}&pageNumber={{pageNumber}}"
            }
            Endpoint::Users => {
                "sites/{{siteId}}/users?pageSize={{pageSize}}&pageNumber={{pageNumber}}"
            }
            Endpoint::GroupMembers => {
                "sites/{{siteId}}/groups/{{groupId}}/users?pageSize={{pageSize}}&pageNumber={{pageNumber}}"
            }
            Endpoint::WorkbookConnections => "sites/{{siteId}}/workbooks/{{itemId}}/connections",
            Endpoint::DatasourceConnections => {
                "sites/{{siteId}}/datasources/{{itemId}}/connections"
            }
            Endpoint::WorkbookContent => "sites/{{siteId}}/workbooks/{{itemId}}/content",
            Endpoint::DatasourceContent => "sites/{{siteId}}/datasources/{{itemId}}/content",
            Endpoint::InitiateUpload => "sites/{{siteId}}/fileUploads",
            Endpoint::AppendUpload => "sites/{{siteId}}/fileUploads/{{uploadSessionId}}",
            Endpoint::FinalizeWorkbook => {
                "sites/{{siteId}}/workbooks?uploadSessionId={{uploadSessionId}}&workbookType={{fileType}}&overwrite=true"
            }
            Endpoint::FinalizeDatasource => {
                "sites/{{siteId}}/datasources?uploadSessionId={{uploadSessionId}}&datasourceType={{fileType}}&overwrite=true"
            }
            Endpoint::CreateProject => "sites/{{siteId}}/projects",
            Endpoint::DeleteWorkbookTag => "sites/{{siteId}}/workbooks/{{itemId}}/tags/{{tag}}",
            Endpoint::DeleteDatasourceTag => {
                "sites/{{siteId}}/datasources/{{itemId}}/tags/{{tag}}"
            }
        }
    }
}

/// Builds request URLs for one server and API version
#[derive(Clone, Debug)]
pub struct EndpointBuilder {
    api_root: String,
}

impl EndpointBuilder {
    /// Builder for `site`'s server using REST API `api_version`
    pub fn new(site: &SiteUrl, api_version: &str) -> Self {
        Self {
            api_root: format!("{}/api/{}/", site.server_base(), api_version),
        }
    }

    /// `{server}/api/{version}/`
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Substitute `params` into `endpoint`'s template
    pub fn build(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> Result<String> {
        self.build_template(endpoint.name(), endpoint.template(), params)
    }

    /// Substitute `params` into an ad-hoc template
    ///
    /// Templates starting with `http://` or `https://` are used as absolute
    /// URLs; anything else is relative to the API root.
    pub fn build_template(
        &self,
        name: &str,
        template: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let mut url = if template.starts_with("http://") || template.starts_with("https://") {
            template.to_string()
        } else {
            format!("{}{}", self.api_root, template.trim_start_matches('/'))
        };
        for (key, value) in params {
            let marker = format!("{{{{{key}}}}}");
            url = url.replace(&marker, &urlencoding::encode(value));
        }
        if url.contains(PLACEHOLDER_MARKER) {
            return Err(Error::TemplateIncomplete {
                endpoint: name.to_string(),
                url,
            });
        }
        Ok(url)
    }
}
