//! Paginated listing of server collections
//!
//! Page 1 is fetched first; its pagination summary fixes how many pages the
//! listing has. Pages 2..N follow in order. A failed page contributes nothing
//! and the loop moves on, a record that fails to decode is skipped. Both are
//! logged.

use crate::client::SiteClient;
use crate::endpoints::Endpoint;
use crate::error::{Error, Result};
use crate::records::FromRecord;
use crate::task_log::StatusLevel;

/// Progress through one paginated listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationState {
    /// Page to request next (one-based)
    pub page_number: u32,
    /// Items per page
    pub page_size: u32,
    /// Total items reported by the first successful page
    pub total_available: Option<u64>,
}

impl PaginationState {
    /// State before the first request
    pub fn new(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
            total_available: None,
        }
    }

    /// Number of pages to request; 1 until a summary has been seen
    pub fn total_pages(&self) -> u32 {
        match self.total_available {
            None => 1,
            Some(total) => {
                let pages = total.div_ceil(u64::from(self.page_size));
                u32::try_from(pages).unwrap_or(u32::MAX).max(1)
            }
        }
    }

    /// Record the first page's summary; later summaries are ignored
    pub fn record_summary(&mut self, total_available: u64, page_size: Option<u32>) {
        if self.total_available.is_some() {
            return;
        }
        self.total_available = Some(total_available);
        if let Some(size) = page_size.filter(|s| *s > 0) {
            self.page_size = size;
        }
    }
}

/// What to list and where its records sit in the response
#[derive(Clone, Debug)]
pub struct ListRequest<'a> {
    /// Paged endpoint
    pub endpoint: Endpoint,
    /// Template parameters besides site, user and paging
    pub params: Vec<(&'a str, &'a str)>,
    /// Element holding the records (e.g., "workbooks")
    pub collection: &'a str,
    /// Element name of one record (e.g., "workbook")
    pub item: &'a str,
}

impl<'a> ListRequest<'a> {
    /// A listing without extra parameters
    pub fn new(endpoint: Endpoint, collection: &'a str, item: &'a str) -> Self {
        Self {
            endpoint,
            params: Vec::new(),
            collection,
            item,
        }
    }

    /// Add a template parameter
    pub fn param(mut self, key: &'a str, value: &'a str) -> Self {
        self.params.push((key, value));
        self
    }
}

struct Page<T> {
    records: Vec<Result<T>>,
    total_available: Option<u64>,
    page_size: Option<u32>,
}

/// Fetch every page of a listing and return the decoded records in server order
pub async fn fetch_all<T: FromRecord>(client: &SiteClient, request: &ListRequest<'_>) -> Vec<T> {
    let log = client.log();
    let mut state = PaginationState::new(client.page_size());
    let mut items = Vec::new();

    while state.page_number <= state.total_pages() {
        match fetch_page::<T>(client, request, &state).await {
            Ok(page) => {
                match page.total_available {
                    Some(total) => state.record_summary(total, page.page_size),
                    None if state.total_available.is_none() => log.add_status_at(
                        format!("No pagination summary for {}", request.collection),
                        StatusLevel::Verbose,
                    ),
                    None => {}
                }
                for record in page.records {
                    match record {
                        Ok(item) => items.push(item),
                        Err(e) => log.record_error(
                            &format!("{} page {}", request.collection, state.page_number),
                            &e,
                        ),
                    }
                }
            }
            Err(e) => {
                let error = Error::PageFetch {
                    collection: request.collection.to_string(),
                    page: state.page_number,
                    source: Box::new(e),
                };
                log.record_error(request.endpoint.name(), &error);
            }
        }
        log.add_status_at(
            format!(
                "{}: page {} of {}, {} so far",
                request.collection,
                state.page_number,
                state.total_pages(),
                items.len()
            ),
            StatusLevel::Verbose,
        );
        state.page_number += 1;
    }

    items
}

async fn fetch_page<T: FromRecord>(
    client: &SiteClient,
    request: &ListRequest<'_>,
    state: &PaginationState,
) -> Result<Page<T>> {
    let page_size = state.page_size.to_string();
    let page_number = state.page_number.to_string();
    let mut params: Vec<(&str, &str)> = request.params.iter().copied().collect();
    params.push(("pageSize", &page_size));
    params.push(("pageNumber", &page_number));

    let url = client.url(request.endpoint, &params)?;
    let document = client.get_document(&url).await?;

    let pagination = document.find("pagination");
    let total_available = pagination
        .and_then(|p| p.attr("totalAvailable"))
        .and_then(|v| v.parse().ok());
    let page_size = pagination
        .and_then(|p| p.attr("pageSize"))
        .and_then(|v| v.parse().ok());
    let records = document
        .find(request.collection)
        .map(|list| list.children_named(request.item).map(T::from_record).collect())
        .unwrap_or_default();

    Ok(Page {
        records,
        total_available,
        page_size,
    })
}
