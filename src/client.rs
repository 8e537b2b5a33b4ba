//! HTTP client bound to one site and, after sign-in, one session

use crate::config::RequestConfig;
use crate::endpoints::{Endpoint, EndpointBuilder, SiteUrl};
use crate::error::{Error, Result};
use crate::records::FromRecord;
use crate::session::{AUTH_HEADER, Session, sign_in_body};
use crate::task_log::{StatusLevel, TaskLog};
use crate::types::{Connection, ContentKind, Project, SiteInfo};
use crate::xml::{self, XmlElement, parse_document};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 2048;

/// REST client for one site
///
/// Every request after sign-in goes through [`SiteClient::signed`], which
/// refuses to build a request while no session exists.
pub struct SiteClient {
    http: reqwest::Client,
    site: SiteUrl,
    endpoints: EndpointBuilder,
    session: Option<Session>,
    log: TaskLog,
    page_size: u32,
    metadata_timeout: Duration,
    transfer_timeout: Duration,
}

impl SiteClient {
    /// Create an unauthenticated client for `site`
    pub fn new(site: SiteUrl, request: &RequestConfig, log: TaskLog) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&request.user_agent)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        let endpoints = EndpointBuilder::new(&site, &request.api_version);
        Ok(Self {
            http,
            site,
            endpoints,
            session: None,
            log,
            page_size: request.page_size,
            metadata_timeout: request.metadata_timeout,
            transfer_timeout: request.transfer_timeout,
        })
    }

    /// The parsed content URL
    pub fn site(&self) -> &SiteUrl {
        &self.site
    }

    /// Endpoint builder for this server
    pub fn endpoints(&self) -> &EndpointBuilder {
        &self.endpoints
    }

    /// Log shared with the run that owns this client
    pub fn log(&self) -> &TaskLog {
        &self.log
    }

    /// Page size for listings
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Timeout for content transfers
    pub fn transfer_timeout(&self) -> Duration {
        self.transfer_timeout
    }

    /// Whether sign-in has succeeded
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_authenticated)
    }

    /// The current session, or [`Error::NotSignedIn`]
    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotSignedIn)
    }

    /// Sign in and keep the session
    ///
    /// Returns `Ok(false)` when the server answered without a user id; that
    /// counts as a failed sign-in. HTTP failures and malformed responses are
    /// returned as [`Error::Authentication`].
    pub async fn sign_in(&mut self, username: &str, password: &str) -> Result<bool> {
        if self.session.is_some() {
            return Err(Error::Authentication {
                reason: "a session is already established".into(),
            });
        }
        let url = self.endpoints.build(Endpoint::SignIn, &[])?;
        self.log
            .add_status(format!("Signing in as {username} to {url}"));

        let response = self
            .http
            .post(&url)
            .timeout(self.metadata_timeout)
            .header(CONTENT_TYPE, "application/xml")
            .body(sign_in_body(username, password, &self.site.site_segment))
            .send()
            .await
            .map_err(|e| Error::Authentication {
                reason: format!("sign-in request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                reason: format!("server returned {}: {}", status.as_u16(), truncate(body)),
            });
        }
        let bytes = response.bytes().await.map_err(|e| Error::Authentication {
            reason: format!("failed to read sign-in response: {e}"),
        })?;
        let document = parse_document(&bytes).map_err(|e| Error::Authentication {
            reason: e.to_string(),
        })?;

        match Session::from_sign_in(&self.site, &document)? {
            Some(session) => {
                self.log.add_status_at(
                    format!(
                        "Signed in: site id {}, user id {}",
                        session.site_id(),
                        session.user_id()
                    ),
                    StatusLevel::Verbose,
                );
                self.session = Some(session);
                Ok(true)
            }
            None => {
                self.log
                    .add_status("No user id returned from sign-in request");
                Ok(false)
            }
        }
    }

    /// Build `endpoint`'s URL; `siteId` and `userId` come from the session
    pub fn url(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> Result<String> {
        let session = self.session()?;
        let mut all = vec![("siteId", session.site_id()), ("userId", session.user_id())];
        all.extend_from_slice(params);
        self.endpoints.build(endpoint, &all)
    }

    /// Build an ad-hoc URL template; `siteId` and `userId` come from the session
    pub fn url_from_template(&self, name: &str, template: &str) -> Result<String> {
        let session = self.session()?;
        self.endpoints.build_template(
            name,
            template,
            &[("siteId", session.site_id()), ("userId", session.user_id())],
        )
    }

    /// A request carrying the auth header and the metadata timeout
    pub(crate) fn signed(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let session = self.session()?;
        self.log
            .add_status_at(format!("Web request: {method} {url}"), StatusLevel::Debug);
        Ok(self
            .http
            .request(method, url)
            .timeout(self.metadata_timeout)
            .header(AUTH_HEADER, session.auth_token()))
    }

    /// Send a request; non-success statuses become [`Error::RequestFailed`]
    pub(crate) async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = status.as_u16(), "request failed");
            return Err(Error::RequestFailed {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate(body),
            });
        }
        Ok(response)
    }

    /// Signed GET returning the parsed response document
    pub(crate) async fn get_document(&self, url: &str) -> Result<XmlElement> {
        let request = self.signed(Method::GET, url)?;
        let response = self.send(request, url).await?;
        let bytes = response.bytes().await?;
        parse_document(&bytes)
    }

    /// Signed POST of an XML body returning the parsed response document
    pub(crate) async fn post_document(&self, url: &str, body: String) -> Result<XmlElement> {
        let request = self
            .signed(Method::POST, url)?
            .header(CONTENT_TYPE, "application/xml")
            .body(body);
        let response = self.send(request, url).await?;
        let bytes = response.bytes().await?;
        parse_document(&bytes)
    }

    /// Fetch information about the signed-in site
    pub async fn site_info(&self) -> Result<SiteInfo> {
        let url = self.url(Endpoint::SiteInfo, &[])?;
        let document = self.get_document(&url).await?;
        let site = document
            .find("site")
            .ok_or_else(|| Error::InvalidResponse("site info response has no site".into()))?;
        SiteInfo::from_record(site)
    }

    /// Create a project and return it as the server recorded it
    pub async fn create_project(&self, name: &str, description: &str) -> Result<Project> {
        let url = self.url(Endpoint::CreateProject, &[])?;
        let body = xml::ts_request(&xml::empty_element(
            "project",
            &[("name", name), ("description", description)],
        ));
        let document = self.post_document(&url, body).await?;
        let project = document.find("project").ok_or_else(|| {
            Error::InvalidResponse("create project response has no project".into())
        })?;
        Project::from_record(project)
    }

    /// Fetch the connections of one workbook or datasource
    ///
    /// Records that fail to decode are logged and skipped.
    pub async fn connections(&self, kind: ContentKind, item_id: &str) -> Result<Vec<Connection>> {
        let endpoint = match kind {
            ContentKind::Workbook => Endpoint::WorkbookConnections,
            ContentKind::Datasource => Endpoint::DatasourceConnections,
        };
        let url = self.url(endpoint, &[("itemId", item_id)])?;
        let document = self.get_document(&url).await?;
        let mut connections = Vec::new();
        if let Some(list) = document.find("connections") {
            for element in list.children_named("connection") {
                match Connection::from_record(element) {
                    Ok(connection) => connections.push(connection),
                    Err(e) => self
                        .log
                        .record_error(&format!("connection of {kind} {item_id}"), &e),
                }
            }
        }
        Ok(connections)
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
