//! Names of the properties the repository keeps on its own nodes.
//!
//! Every reserved name contains `:`, which user attribute codes may not.

pub(crate) const NAME: &str = "strata:name";
pub(crate) const DESCRIPTION: &str = "strata:description";
pub(crate) const KIND: &str = "strata:kind";
pub(crate) const COMMENT: &str = "strata:comment";
pub(crate) const AUTHOR: &str = "strata:author";
pub(crate) const DELETED: &str = "strata:deleted";
pub(crate) const PAYLOAD: &str = "strata:payload";

pub(crate) const LOCK_OBJECT: &str = "strata:lock.object";
pub(crate) const LOCK_LOGIN: &str = "strata:lock.login";
pub(crate) const LOCK_DISPLAY_NAME: &str = "strata:lock.displayName";
pub(crate) const LOCK_MESSAGE: &str = "strata:lock.message";
pub(crate) const LOCK_DATE: &str = "strata:lock.date";
pub(crate) const LOCK_PATH: &str = "strata:lock.path";

pub(crate) const RELATION_PARENT: &str = "strata:relation.parent";
pub(crate) const RELATION_CHILD: &str = "strata:relation.child";

/// Namespace marker of reserved property names.
pub(crate) const RESERVED_MARKER: char = ':';

pub(crate) fn is_reserved(key: &str) -> bool {
    key.contains(RESERVED_MARKER)
}
