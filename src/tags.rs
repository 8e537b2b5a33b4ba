//! Server-side tag removal

use crate::client::SiteClient;
use crate::endpoints::Endpoint;
use crate::error::{Error, Result};
use crate::task_log::StatusLevel;
use crate::types::{ContentItem, ContentKind};
use reqwest::Method;

/// Remove `tag` from one item on the server
pub async fn remove_tag(
    client: &SiteClient,
    kind: ContentKind,
    item_id: &str,
    tag: &str,
) -> Result<()> {
    let endpoint = match kind {
        ContentKind::Workbook => Endpoint::DeleteWorkbookTag,
        ContentKind::Datasource => Endpoint::DeleteDatasourceTag,
    };
    let tag_error = |reason: String| Error::TagMutation {
        item_id: item_id.to_string(),
        tag: tag.to_string(),
        reason,
    };

    let url = client
        .url(endpoint, &[("itemId", item_id), ("tag", tag)])
        .map_err(|e| tag_error(e.to_string()))?;
    let request = client
        .signed(Method::DELETE, &url)
        .map_err(|e| tag_error(e.to_string()))?;
    client
        .send(request, &url)
        .await
        .map_err(|e| tag_error(e.to_string()))?;
    Ok(())
}

/// Remove `tag` from each item, one request per item
///
/// Failures are logged and do not stop the remaining items. Items whose tag
/// was removed also lose it locally. Returns how many removals succeeded.
pub(crate) async fn remove_tag_from_items(
    client: &SiteClient,
    items: &mut [ContentItem],
    tag: &str,
) -> usize {
    let log = client.log();
    let mut removed = 0;
    for item in items.iter_mut() {
        match remove_tag(client, item.kind(), item.id(), tag).await {
            Ok(()) => {
                item.editor().remove_tag(tag);
                removed += 1;
                log.add_status_at(
                    format!("Removed tag '{tag}' from {} {}", item.kind(), item.name()),
                    StatusLevel::Verbose,
                );
            }
            Err(e) => log.record_error(item.name(), &e),
        }
    }
    log.add_status(format!(
        "Removed tag '{tag}' from {removed} of {} items",
        items.len()
    ));
    removed
}
