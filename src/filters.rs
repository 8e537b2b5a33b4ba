//! Content filters applied before export
//!
//! A filter with no value (absent, empty or blank) passes its input through
//! unchanged. A filter with a value keeps only matching items, which may be
//! none at all. Inputs are never modified; order is preserved.

use crate::task_log::{StatusLevel, TaskLog};
use crate::types::{ContentItem, FilterCriteria};

fn effective(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Keep items in `project_id`; identity when no project is given
pub fn filter_by_project(
    items: &[ContentItem],
    project_id: Option<&str>,
    log: &TaskLog,
) -> Vec<ContentItem> {
    let Some(project_id) = effective(project_id) else {
        log.add_status_at(
            format!("No project filter: {} items", items.len()),
            StatusLevel::Verbose,
        );
        return items.to_vec();
    };
    let kept: Vec<ContentItem> = items
        .iter()
        .filter(|item| item.project_id() == Some(project_id))
        .cloned()
        .collect();
    log.add_status_at(
        format!(
            "Project filter {project_id}: {} before, {} after",
            items.len(),
            kept.len()
        ),
        StatusLevel::Verbose,
    );
    kept
}

/// Keep items tagged `tag` (exact, case-sensitive); identity when no tag is given
pub fn filter_by_tag(items: &[ContentItem], tag: Option<&str>, log: &TaskLog) -> Vec<ContentItem> {
    let Some(tag) = effective(tag) else {
        log.add_status_at(
            format!("No tag filter: {} items", items.len()),
            StatusLevel::Verbose,
        );
        return items.to_vec();
    };
    let kept: Vec<ContentItem> = items
        .iter()
        .filter(|item| item.has_tag(tag))
        .cloned()
        .collect();
    log.add_status_at(
        format!("Tag filter '{tag}': {} before, {} after", items.len(), kept.len()),
        StatusLevel::Verbose,
    );
    kept
}

/// Project filter, then tag filter
pub fn apply_filters(
    items: &[ContentItem],
    criteria: &FilterCriteria,
    log: &TaskLog,
) -> Vec<ContentItem> {
    let by_project = filter_by_project(items, criteria.project_id.as_deref(), log);
    filter_by_tag(&by_project, criteria.tag.as_deref(), log)
}

/// The tag to remove after export, if removal was requested and a tag filter is active
pub fn tag_to_remove(criteria: &FilterCriteria) -> Option<&str> {
    if criteria.delete_tag_after_match {
        effective(criteria.tag.as_deref())
    } else {
        None
    }
}
