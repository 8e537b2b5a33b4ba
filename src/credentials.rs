//! Database credentials attached to published content
//!
//! A credentials file lists one `<credential>` per item to publish:
//!
//! ```xml
//! <credentials>
//!   <credential contentType="datasource" contentProjectName="Finance"
//!               contentName="Orders" dbUser="report" dbPassword="secret"
//!               credentialIsEmbedded="true"/>
//! </credentials>
//! ```
//!
//! Items are matched by kind, project name and content name (the file name
//! without extension). Matching is exact.

use crate::error::{Error, Result};
use crate::types::ContentKind;
use crate::xml::{self, XmlElement, parse_document};
use std::fmt;
use std::path::Path;

/// One database login for a published item
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Database user name
    pub name: String,
    /// Database password
    pub password: String,
    /// Store the credential with the content instead of prompting viewers
    pub embedded: bool,
}

impl Credential {
    /// A credential for `name` / `password`
    pub fn new(name: impl Into<String>, password: impl Into<String>, embedded: bool) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            embedded,
        }
    }

    /// `<connectionCredentials …/>` for a publish request
    pub(crate) fn to_element(&self) -> String {
        let embed = if self.embedded { "true" } else { "false" };
        xml::empty_element(
            "connectionCredentials",
            &[
                ("name", &self.name),
                ("password", &self.password),
                ("embed", embed),
            ],
        )
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("embedded", &self.embedded)
            .finish()
    }
}

#[derive(Clone, Debug)]
struct Entry {
    kind: ContentKind,
    project: String,
    content: String,
    credential: Credential,
}

/// Credentials keyed by kind, project and content name
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    entries: Vec<Entry>,
}

impl CredentialStore {
    /// Read a credentials file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read, and
    /// [`Error::InvalidResponse`] or [`Error::RecordParse`] when it is malformed.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::parse(&bytes)
    }

    /// Parse the contents of a credentials file
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let root = parse_document(xml)?;
        let entries = root
            .children_named("credential")
            .map(entry_from_element)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Add a credential
    pub fn insert(
        &mut self,
        kind: ContentKind,
        project: impl Into<String>,
        content: impl Into<String>,
        credential: Credential,
    ) {
        self.entries.push(Entry {
            kind,
            project: project.into(),
            content: content.into(),
            credential,
        });
    }

    /// Credential for `content` of `kind` in `project`; the first match wins
    pub fn find(&self, kind: ContentKind, project: &str, content: &str) -> Option<&Credential> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.project == project && e.content == content)
            .map(|e| &e.credential)
    }

    /// Number of credentials
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no credentials
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_from_element(element: &XmlElement) -> Result<Entry> {
    let kind = match element.required_attr("contentType", "credential")? {
        "workbook" => ContentKind::Workbook,
        "datasource" => ContentKind::Datasource,
        other => {
            return Err(Error::record("credential", format!("unknown contentType '{other}'")));
        }
    };
    Ok(Entry {
        kind,
        project: element
            .required_attr("contentProjectName", "credential")?
            .to_string(),
        content: element.required_attr("contentName", "credential")?.to_string(),
        credential: Credential {
            name: element.required_attr("dbUser", "credential")?.to_string(),
            password: element.attr("dbPassword").unwrap_or_default().to_string(),
            embedded: element.attr("credentialIsEmbedded") == Some("true"),
        },
    })
}
