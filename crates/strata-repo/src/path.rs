//! Canonical node paths for repository elements.
//!
//! A directory's logical path is `/` for the root and `/a/b` below it. An
//! element lives at its directory path plus its name plus the extension of
//! its kind, so elements of different kinds may share a name in one folder.

use strata_store::validate_node_name;
use strata_types::ElementKind;

use crate::error::{RepoResult, RepositoryError};

/// Logical path of the root directory.
pub const ROOT_PATH: &str = "/";

/// Node name of an element: its name plus the kind's extension.
pub fn node_name(name: &str, kind: &ElementKind) -> String {
    format!("{name}{}", kind.extension())
}

/// Canonical path of an element.
///
/// ```
/// use strata_repo::path::resolve_path;
/// use strata_types::ElementKind;
///
/// assert_eq!(resolve_path("/", "load", &ElementKind::Transformation), "/load.ktr");
/// assert_eq!(resolve_path("/etl/daily", "run", &ElementKind::Job), "/etl/daily/run.kjb");
/// ```
pub fn resolve_path(directory: &str, name: &str, kind: &ElementKind) -> String {
    join(&normalize_directory(directory), &node_name(name, kind))
}

/// Path without the leading `/`; empty for the root.
pub fn relative_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Strip the kind's extension from a node name.
///
/// Returns `None` if the node does not belong to `kind`.
pub fn split_object_name<'a>(node_name: &'a str, kind: &ElementKind) -> Option<&'a str> {
    node_name
        .strip_suffix(kind.extension())
        .filter(|name| !name.is_empty())
}

/// Append one segment to a directory path.
pub fn join(directory: &str, segment: &str) -> String {
    if directory == ROOT_PATH || directory.is_empty() {
        format!("/{segment}")
    } else {
        format!("{}/{segment}", directory.trim_end_matches('/'))
    }
}

/// Canonical form of a directory path: leading `/`, no empty segments, no
/// trailing `/` except for the root.
pub fn normalize_directory(path: &str) -> String {
    let segments: Vec<&str> = segments(path).collect();
    format!("/{}", segments.join("/"))
}

/// Non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Parent directory of a path, or `None` for the root.
pub fn parent_path(path: &str) -> Option<String> {
    let normalized = normalize_directory(path);
    if normalized == ROOT_PATH {
        return None;
    }
    match normalized.rfind('/') {
        Some(0) | None => Some(ROOT_PATH.to_string()),
        Some(pos) => Some(normalized[..pos].to_string()),
    }
}

/// Validate a folder or element name.
pub fn validate_name(name: &str) -> RepoResult<()> {
    validate_node_name(name).map_err(|e| match e {
        strata_store::StoreError::InvalidName { name, reason } => {
            RepositoryError::InvalidName { name, reason }
        }
        other => RepositoryError::InvalidName {
            name: name.to_string(),
            reason: other.to_string(),
        },
    })
}
