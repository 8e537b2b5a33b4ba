//! File-name helpers for exported content

use crate::error::{Error, Result};
use crate::task_log::TaskLog;
use crate::types::{ContentItem, Project};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Maximum number of numbered alternatives tried by [`unique_base_name`]
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Characters that cannot appear in file names on common file systems
const UNSAFE_CHARACTERS: &[(char, &str)] = &[
    ('\\', "-SLASH-"),
    ('/', "-SLASH-"),
    ('$', "-DOLLAR-"),
    ('*', "STAR"),
    ('?', "-QQQ-"),
    ('%', "-PERCENT-"),
    (':', "-COLON-"),
    ('|', "-PIPE-"),
    ('"', "-QUOTE-"),
    ('>', "-GT-"),
    ('<', "-LT-"),
];

/// Replace characters that are not allowed in file names
///
/// ```
/// use site_migrate::utils::safe_file_name;
///
/// assert_eq!(safe_file_name("Q3: a/b"), "Q3-COLON- a-SLASH-b");
/// ```
pub fn safe_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match UNSAFE_CHARACTERS.iter().find(|(unsafe_char, _)| *unsafe_char == c) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// A base name such that no `<base>.<ext>` or `<base>.tmp` exists in `directory`
///
/// Tries `base`, then `base (1)`, `base (2)` and so on.
pub fn unique_base_name(directory: &Path, base: &str, extensions: &[&str]) -> Result<String> {
    let taken = |candidate: &str| {
        extensions
            .iter()
            .chain(std::iter::once(&"tmp"))
            .any(|ext| directory.join(format!("{candidate}.{ext}")).exists())
    };

    if !taken(base) {
        return Ok(base.to_string());
    }
    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = format!("{base} ({i})");
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::Download {
        name: base.to_string(),
        reason: format!(
            "could not find a free file name in {} after {MAX_RENAME_ATTEMPTS} attempts",
            directory.display()
        ),
    })
}

/// Maps content items to per-project directories
#[derive(Clone, Debug, Default)]
pub struct ProjectDirectories {
    names: HashMap<String, String>,
}

impl ProjectDirectories {
    /// Index `projects` by id
    pub fn new(projects: &[Project]) -> Self {
        Self {
            names: projects
                .iter()
                .map(|p| (p.id.clone(), p.name.clone()))
                .collect(),
        }
    }

    /// `base/<project name>` for `item`, or `base` when its project is unknown
    pub fn directory_for(&self, base: &Path, item: &ContentItem, log: &TaskLog) -> PathBuf {
        let name = item
            .project_id()
            .and_then(|id| self.names.get(id))
            .map(String::as_str)
            .or(item.project_name());
        match name {
            Some(name) => base.join(safe_file_name(name)),
            None => {
                log.add_error(format!(
                    "Project not found with id {} for {}",
                    item.project_id().unwrap_or("<none>"),
                    item.name()
                ));
                base.to_path_buf()
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn safe_file_name_replaces_every_reserved_character() {
        assert_eq!(
            safe_file_name(r#"a\b/c$d*e?f%g:h|i"j>k<l"#),
            "a-SLASH-b-SLASH-c-DOLLAR-dSTARe-QQQ-f-PERCENT-g-COLON-h-PIPE-i-QUOTE-j-GT-k-LT-l"
        );
        assert_eq!(safe_file_name("Plain name.v2"), "Plain name.v2");
    }

    #[test]
    fn unique_base_name_returns_base_when_free() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            unique_base_name(dir.path(), "Sales", &["twbx", "twb"]).unwrap(),
            "Sales"
        );
    }

    #[test]
    fn unique_base_name_skips_names_taken_by_any_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Sales.twb"), "x").unwrap();
        fs::write(dir.path().join("Sales (1).twbx"), "x").unwrap();
        fs::write(dir.path().join("Sales (2).tmp"), "x").unwrap();
        assert_eq!(
            unique_base_name(dir.path(), "Sales", &["twbx", "twb"]).unwrap(),
            "Sales (3)"
        );
    }

    #[test]
    fn project_directories_use_project_names() {
        let log = TaskLog::default();
        let dirs = ProjectDirectories::new(&[Project {
            id: "p1".into(),
            name: "Finance/EMEA".into(),
            description: None,
            parent_project_id: None,
        }]);
        let item = ContentItem::new(ContentKind::Workbook, "w1", "Sales").with_project("p1", None);
        assert_eq!(
            dirs.directory_for(Path::new("/out"), &item, &log),
            PathBuf::from("/out/Finance-SLASH-EMEA")
        );
        assert_eq!(log.error_count(), 0);
    }

    #[test]
    fn unknown_project_falls_back_to_base_and_logs() {
        let log = TaskLog::default();
        let dirs = ProjectDirectories::default();
        let item = ContentItem::new(ContentKind::Workbook, "w1", "Sales").with_project("p9", None);
        assert_eq!(
            dirs.directory_for(Path::new("/out"), &item, &log),
            PathBuf::from("/out")
        );
        assert_eq!(log.error_count(), 1);
    }
}
