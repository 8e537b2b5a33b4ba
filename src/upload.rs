//! Chunked upload sessions
//!
//! Publishing a file is a three-step handshake: open an upload session, append
//! the file in chunks, then finalize the session as a workbook or datasource.
//! [`ChunkedUpload`] enforces the order of those steps and the byte accounting;
//! [`upload_file`] drives it for one file on disk.
//!
//! A failed step abandons the upload. Nothing is retried: a session left open on
//! the server expires there.

use crate::client::SiteClient;
use crate::config::UploadConfig;
use crate::credentials::Credential;
use crate::endpoints::Endpoint;
use crate::error::{Error, Result, UploadPhase};
use crate::task_log::StatusLevel;
use crate::types::ContentKind;
use crate::xml::{self, parse_document};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Where an upload is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    /// Nothing sent yet
    Idle,
    /// Session open, no bytes appended
    Initiated,
    /// At least one chunk appended
    Appending,
    /// Published
    Finalized,
    /// A request failed; the upload is abandoned
    Failed,
}

/// Server-side upload session and how much of the file it has received
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSession {
    /// Id assigned by the server
    pub session_id: String,
    /// Bytes appended so far
    pub bytes_sent: u64,
    /// Size of the file being uploaded
    pub total_bytes: u64,
    /// Largest chunk accepted by [`ChunkedUpload::append_chunk`]
    pub chunk_size: usize,
}

impl UploadSession {
    /// Whether every byte has been appended
    pub fn is_complete(&self) -> bool {
        self.bytes_sent == self.total_bytes
    }
}

/// File formats that can be published
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishFileType {
    /// Workbook
    Twb,
    /// Packaged workbook
    Twbx,
    /// Datasource
    Tds,
    /// Packaged datasource
    Tdsx,
    /// Data extract
    Tde,
}

impl PublishFileType {
    /// Type for a file's extension, if it is publishable
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "twb" => Some(Self::Twb),
            "twbx" => Some(Self::Twbx),
            "tds" => Some(Self::Tds),
            "tdsx" => Some(Self::Tdsx),
            "tde" => Some(Self::Tde),
            _ => None,
        }
    }

    /// Content kind this format publishes as
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Twb | Self::Twbx => ContentKind::Workbook,
            Self::Tds | Self::Tdsx | Self::Tde => ContentKind::Datasource,
        }
    }

    /// Value of the `workbookType` / `datasourceType` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twb => "twb",
            Self::Twbx => "twbx",
            Self::Tds => "tds",
            Self::Tdsx => "tdsx",
            Self::Tde => "tde",
        }
    }
}

/// What to publish an upload session as
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishTarget {
    /// Name on the server
    pub name: String,
    /// Target project id
    pub project_id: String,
    /// File format
    pub file_type: PublishFileType,
    /// Show workbook views as tabs
    pub show_tabs: bool,
    /// Database login stored with the published item
    pub credentials: Option<Credential>,
}

/// One chunked upload, driven step by step
pub struct ChunkedUpload<'a> {
    client: &'a SiteClient,
    chunk_size: usize,
    state: UploadState,
    session: Option<UploadSession>,
}

impl<'a> ChunkedUpload<'a> {
    /// A new upload accepting chunks of at most `chunk_size` bytes
    pub fn new(client: &'a SiteClient, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size,
            state: UploadState::Idle,
            session: None,
        }
    }

    /// Current state
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// The open session, until it is finalized
    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    fn session_id(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.session_id.clone())
    }

    fn protocol_error(&self, phase: UploadPhase, reason: impl Into<String>) -> Error {
        Error::UploadProtocol {
            phase,
            session_id: self.session_id(),
            reason: reason.into(),
        }
    }

    fn fail(&mut self, phase: UploadPhase, cause: Error) -> Error {
        self.state = UploadState::Failed;
        self.protocol_error(phase, cause.to_string())
    }

    /// Open an upload session for `total_bytes`
    pub async fn initiate(&mut self, total_bytes: u64) -> Result<&UploadSession> {
        if self.state != UploadState::Idle {
            return Err(self.protocol_error(UploadPhase::Initiate, "upload already started"));
        }
        match self.request_session().await {
            Ok(session_id) => {
                self.client.log().add_status_at(
                    format!("Upload session {session_id} opened for {total_bytes} bytes"),
                    StatusLevel::Debug,
                );
                self.state = UploadState::Initiated;
                Ok(self.session.insert(UploadSession {
                    session_id,
                    bytes_sent: 0,
                    total_bytes,
                    chunk_size: self.chunk_size,
                }))
            }
            Err(e) => Err(self.fail(UploadPhase::Initiate, e)),
        }
    }

    async fn request_session(&self) -> Result<String> {
        let url = self.client.url(Endpoint::InitiateUpload, &[])?;
        let request = self.client.signed(Method::POST, &url)?;
        let response = self.client.send(request, &url).await?;
        let document = parse_document(&response.bytes().await?)?;
        document
            .find("fileUpload")
            .and_then(|f| f.attr("uploadSessionId"))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("no uploadSessionId in response".into()))
    }

    /// Append one chunk
    ///
    /// Chunks larger than the configured chunk size, empty chunks and chunks
    /// running past the declared total are rejected before any request is made.
    pub async fn append_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.len() > self.chunk_size {
            return Err(Error::ChunkTooLarge {
                size: chunk.len(),
                max: self.chunk_size,
            });
        }
        if !matches!(self.state, UploadState::Initiated | UploadState::Appending) {
            return Err(self.protocol_error(UploadPhase::Append, "no open upload session"));
        }
        let Some(session) = self.session.as_ref() else {
            return Err(self.protocol_error(UploadPhase::Append, "no open upload session"));
        };
        if chunk.is_empty() {
            return Err(self.protocol_error(UploadPhase::Append, "empty chunk"));
        }
        let after = session.bytes_sent + chunk.len() as u64;
        if after > session.total_bytes {
            return Err(self.protocol_error(
                UploadPhase::Append,
                format!(
                    "chunk would bring the upload to {after} of {} bytes",
                    session.total_bytes
                ),
            ));
        }

        let session_id = session.session_id.clone();
        match self.send_chunk(&session_id, chunk).await {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.bytes_sent = after;
                }
                self.state = UploadState::Appending;
                Ok(())
            }
            Err(e) => Err(self.fail(UploadPhase::Append, e)),
        }
    }

    async fn send_chunk(&self, session_id: &str, chunk: &[u8]) -> Result<()> {
        let url = self
            .client
            .url(Endpoint::AppendUpload, &[("uploadSessionId", session_id)])?;
        let boundary = new_boundary();
        let request = self
            .client
            .signed(Method::PUT, &url)?
            .timeout(self.client.transfer_timeout())
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
            .body(multipart_mixed(&boundary, "", Some(chunk)));
        self.client.send(request, &url).await?;
        Ok(())
    }

    /// Publish the session; valid only once every byte has been appended
    ///
    /// Returns the id of the published item. If this fails the session is left
    /// orphaned on the server, which is logged.
    pub async fn finalize(&mut self, target: &PublishTarget) -> Result<String> {
        if !matches!(self.state, UploadState::Initiated | UploadState::Appending) {
            return Err(self.protocol_error(UploadPhase::Finalize, "no open upload session"));
        }
        let Some(session) = self.session.as_ref() else {
            return Err(self.protocol_error(UploadPhase::Finalize, "no open upload session"));
        };
        if !session.is_complete() {
            return Err(self.protocol_error(
                UploadPhase::Finalize,
                format!(
                    "only {} of {} bytes were sent",
                    session.bytes_sent, session.total_bytes
                ),
            ));
        }

        let session_id = session.session_id.clone();
        match self.publish(&session_id, target).await {
            Ok(id) => {
                self.state = UploadState::Finalized;
                self.session = None;
                Ok(id)
            }
            Err(e) => {
                self.client.log().add_error(format!(
                    "Upload session {session_id} orphaned: finalize of '{}' failed",
                    target.name
                ));
                Err(self.fail(UploadPhase::Finalize, e))
            }
        }
    }

    async fn publish(&self, session_id: &str, target: &PublishTarget) -> Result<String> {
        let kind = target.file_type.kind();
        let endpoint = match kind {
            ContentKind::Workbook => Endpoint::FinalizeWorkbook,
            ContentKind::Datasource => Endpoint::FinalizeDatasource,
        };
        let url = self.client.url(
            endpoint,
            &[
                ("uploadSessionId", session_id),
                ("fileType", target.file_type.as_str()),
            ],
        )?;
        let boundary = new_boundary();
        let request = self
            .client
            .signed(Method::POST, &url)?
            .timeout(self.client.transfer_timeout())
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
            .body(multipart_mixed(&boundary, &publish_payload(target), None));
        let response = self.client.send(request, &url).await?;
        let document = parse_document(&response.bytes().await?)?;
        document
            .find(kind.element())
            .and_then(|e| e.attr("id"))
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse(format!("publish response has no {kind} id")))
    }
}

/// Upload the file at `path` and publish it as `target`; returns the published id
pub async fn upload_file(
    client: &SiteClient,
    config: &UploadConfig,
    path: &Path,
    target: &PublishTarget,
) -> Result<String> {
    let total_bytes = tokio::fs::metadata(path).await?.len();
    let mut file = tokio::fs::File::open(path).await?;
    let mut upload = ChunkedUpload::new(client, config.chunk_size);
    upload.initiate(total_bytes).await?;

    let mut buffer = vec![0u8; config.chunk_size];
    let mut chunks = 0u32;
    loop {
        let filled = fill_buffer(&mut file, &mut buffer).await?;
        if filled == 0 {
            break;
        }
        if chunks > 0 && !config.chunk_delay.is_zero() {
            tokio::time::sleep(config.chunk_delay).await;
        }
        upload.append_chunk(&buffer[..filled]).await?;
        chunks += 1;
        client.log().add_status_at(
            format!(
                "{}: chunk {chunks} sent ({} of {total_bytes} bytes)",
                target.name,
                upload.session().map_or(0, |s| s.bytes_sent)
            ),
            StatusLevel::Debug,
        );
    }

    upload.finalize(target).await
}

async fn fill_buffer(file: &mut tokio::fs::File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

fn new_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// `request_payload` part, optionally followed by a `tableau_file` part
fn multipart_mixed(boundary: &str, payload: &str, file: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + file.map_or(0, <[u8]>::len) + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: name=\"request_payload\"\r\nContent-Type: text/xml\r\n\r\n{payload}\r\n"
        )
        .as_bytes(),
    );
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: name=\"tableau_file\"; filename=\"file\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn publish_payload(target: &PublishTarget) -> String {
    let mut inner = target
        .credentials
        .as_ref()
        .map(Credential::to_element)
        .unwrap_or_default();
    inner.push_str(&xml::empty_element("project", &[("id", &target.project_id)]));
    let item = match target.file_type.kind() {
        ContentKind::Workbook => {
            let show_tabs = if target.show_tabs { "true" } else { "false" };
            xml::element(
                "workbook",
                &[("name", &target.name), ("showTabs", show_tabs)],
                &inner,
            )
        }
        ContentKind::Datasource => xml::element("datasource", &[("name", &target.name)], &inner),
    };
    xml::ts_request(&item)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_types_follow_extensions() {
        assert_eq!(
            PublishFileType::from_path(Path::new("a/Sales.TWBX")),
            Some(PublishFileType::Twbx)
        );
        assert_eq!(
            PublishFileType::from_path(Path::new("Orders.tds")).map(|t| t.kind()),
            Some(ContentKind::Datasource)
        );
        assert_eq!(PublishFileType::from_path(Path::new("notes.txt")), None);
        assert_eq!(PublishFileType::from_path(Path::new("README")), None);
    }

    #[test]
    fn multipart_body_has_both_parts() {
        let body = multipart_mixed("BOUND", "<x/>", Some(b"DATA"));
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--BOUND\r\nContent-Disposition: name=\"request_payload\""));
        assert!(text.contains("\r\n\r\n<x/>\r\n--BOUND\r\n"));
        assert!(text.contains("name=\"tableau_file\"; filename=\"file\""));
        assert!(text.contains("\r\n\r\nDATA\r\n"));
        assert!(text.ends_with("--BOUND--\r\n"));
    }

    #[test]
    fn multipart_body_without_file_has_only_payload() {
        let text = String::from_utf8(multipart_mixed("B", "<p/>", None)).unwrap();
        assert!(!text.contains("tableau_file"));
        assert_eq!(text.matches("--B").count(), 2);
    }

    #[test]
    fn boundaries_are_random_alphanumerics() {
        let a = new_boundary();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, new_boundary());
    }

    #[test]
    fn publish_payload_names_project() {
        let payload = publish_payload(&PublishTarget {
            name: "Sales & Ops".into(),
            project_id: "p1".into(),
            file_type: PublishFileType::Twbx,
            show_tabs: false,
            credentials: None,
        });
        assert_eq!(
            payload,
            "<tsRequest><workbook name=\"Sales &amp; Ops\" showTabs=\"false\"><project id=\"p1\"/></workbook></tsRequest>"
        );

        let payload = publish_payload(&PublishTarget {
            name: "Orders".into(),
            project_id: "p2".into(),
            file_type: PublishFileType::Tdsx,
            show_tabs: false,
            credentials: None,
        });
        assert!(payload.starts_with("<tsRequest><datasource name=\"Orders\">"));
    }

    #[test]
    fn publish_payload_carries_credentials_before_project() {
        let payload = publish_payload(&PublishTarget {
            name: "Orders".into(),
            project_id: "p2".into(),
            file_type: PublishFileType::Tds,
            show_tabs: false,
            credentials: Some(Credential::new("report", "pw", true)),
        });
        assert_eq!(
            payload,
            "<tsRequest><datasource name=\"Orders\"><connectionCredentials name=\"report\" password=\"pw\" embed=\"true\"/><project id=\"p2\"/></datasource></tsRequest>"
        );
    }

    #[test]
    fn session_is_complete_only_when_all_bytes_sent() {
        let mut session = UploadSession {
            session_id: "s".into(),
            bytes_sent: 5,
            total_bytes: 10,
            chunk_size: 5,
        };
        assert!(!session.is_complete());
        session.bytes_sent = 10;
        assert!(session.is_complete());
    }
}
