//! Content downloads
//!
//! A download streams into `<base>.tmp` in the destination directory, picks the
//! final extension from the response content type and renames the temp file.
//! An existing target is never overwritten.

use crate::client::SiteClient;
use crate::error::{Error, Result};
use crate::task_log::StatusLevel;
use crate::types::ContentKind;
use crate::utils::safe_file_name;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// Whether a download is a packaged archive or a single XML file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Packaging {
    Packaged,
    SingleFile,
}

/// Content types the server answers downloads with
const CONTENT_TYPES: &[(&str, Packaging)] = &[
    ("application/octet-stream", Packaging::Packaged),
    ("application/zip", Packaging::Packaged),
    ("application/xml", Packaging::SingleFile),
    ("text/xml", Packaging::SingleFile),
];

/// File extensions for one content kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentTypeMap {
    packaged: &'static str,
    single_file: &'static str,
}

impl ContentTypeMap {
    /// `.tdsx` / `.tds`
    pub const DATASOURCE: ContentTypeMap = ContentTypeMap {
        packaged: "tdsx",
        single_file: "tds",
    };

    /// `.twbx` / `.twb`
    pub const WORKBOOK: ContentTypeMap = ContentTypeMap {
        packaged: "twbx",
        single_file: "twb",
    };

    /// Map for `kind`
    pub fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Workbook => Self::WORKBOOK,
            ContentKind::Datasource => Self::DATASOURCE,
        }
    }

    /// Extension (without dot) for a response content type
    ///
    /// Parameters such as `charset` are ignored. Unknown or missing types are
    /// treated as packaged.
    pub fn extension(&self, content_type: Option<&str>) -> &'static str {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let packaging = CONTENT_TYPES
            .iter()
            .find(|(known, _)| *known == mime)
            .map(|(_, packaging)| *packaging)
            .unwrap_or(Packaging::Packaged);
        match packaging {
            Packaging::Packaged => self.packaged,
            Packaging::SingleFile => self.single_file,
        }
    }

    /// Every extension this map can produce
    pub fn extensions(&self) -> [&'static str; 2] {
        [self.packaged, self.single_file]
    }
}

/// Download `url` into `directory` as `<base_name>.<ext>` and return the final path
///
/// `base_name` is made file-system safe first. Timing is written to the status
/// log; on failure the elapsed time is logged as an error and the temp file is
/// removed.
pub async fn download_content(
    client: &SiteClient,
    url: &str,
    directory: &Path,
    base_name: &str,
    types: &ContentTypeMap,
) -> Result<PathBuf> {
    let log = client.log();
    let started = Instant::now();
    log.add_status_at(format!("Attempting file download: {url}"), StatusLevel::Debug);

    match download_inner(client, url, directory, base_name, types).await {
        Ok(path) => {
            log.add_status_at(
                format!(
                    "Download success duration {:.1} seconds. {url}",
                    started.elapsed().as_secs_f64()
                ),
                StatusLevel::Verbose,
            );
            Ok(path)
        }
        Err(e) => {
            log.add_error(format!(
                "Download failed after {:.1} seconds. {url}",
                started.elapsed().as_secs_f64()
            ));
            Err(match e {
                e @ Error::Download { .. } => e,
                other => Error::Download {
                    name: base_name.to_string(),
                    reason: other.to_string(),
                },
            })
        }
    }
}

async fn download_inner(
    client: &SiteClient,
    url: &str,
    directory: &Path,
    base_name: &str,
    types: &ContentTypeMap,
) -> Result<PathBuf> {
    let base = safe_file_name(base_name);
    tokio::fs::create_dir_all(directory).await?;
    let temp_path = directory.join(format!("{base}.tmp"));

    let request = client
        .signed(Method::GET, url)?
        .timeout(client.transfer_timeout());
    let mut response = client.send(request, url).await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let written: Result<()> = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok::<(), Error>(())
    }
    .await;
    if let Err(e) = written {
        remove_temp(&temp_path).await;
        return Err(e);
    }

    let extension = types.extension(content_type.as_deref());
    let final_path = directory.join(format!("{base}.{extension}"));
    if tokio::fs::try_exists(&final_path).await.unwrap_or(true) {
        remove_temp(&temp_path).await;
        return Err(Error::Download {
            name: base_name.to_string(),
            reason: format!("{} already exists", final_path.display()),
        });
    }
    if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
        remove_temp(&temp_path).await;
        return Err(e.into());
    }
    Ok(final_path)
}

async fn remove_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_datasource_type_maps_to_tds() {
        let map = ContentTypeMap::DATASOURCE;
        assert_eq!(map.extension(Some("application/xml")), "tds");
        assert_eq!(map.extension(Some("text/xml; charset=utf-8")), "tds");
    }

    #[test]
    fn packaged_datasource_type_maps_to_tdsx() {
        let map = ContentTypeMap::DATASOURCE;
        assert_eq!(map.extension(Some("application/octet-stream")), "tdsx");
        assert_eq!(map.extension(Some("Application/Octet-Stream")), "tdsx");
    }

    #[test]
    fn workbook_types() {
        let map = ContentTypeMap::for_kind(ContentKind::Workbook);
        assert_eq!(map.extension(Some("application/xml")), "twb");
        assert_eq!(map.extension(Some("application/octet-stream")), "twbx");
    }

    #[test]
    fn unknown_or_missing_type_is_packaged() {
        let map = ContentTypeMap::WORKBOOK;
        assert_eq!(map.extension(None), "twbx");
        assert_eq!(map.extension(Some("application/x-unknown")), "twbx");
        assert_eq!(map.extensions(), ["twbx", "twb"]);
    }
}
