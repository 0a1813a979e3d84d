//! Mapping of ref names onto directories below a target root.
//!
//! Hierarchical refs become nested directories (`feature/x` -> `feature/x`).
//! Within each component every byte outside `[A-Za-z0-9._~-]` is
//! percent-encoded, and a leading `.` is encoded as `%2E`, so a component can
//! never be `.`, `..` or a hidden directory. The mapping is injective and
//! [`restore_ref_name`] reverses it.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use crate::refs::RefName;

/// Returns the relative directory for `name`.
pub fn sanitize_ref_name(name: &RefName) -> PathBuf {
    name.components().map(encode_component).collect()
}

fn encode_component(component: &str) -> String {
    let encoded = urlencoding::encode(component);
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded.into_owned(),
    }
}

/// Recovers the ref name from a path produced by [`sanitize_ref_name`].
///
/// Returns `None` for paths that could not have been produced by it.
pub fn restore_ref_name(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        let decoded: Cow<'_, str> = urlencoding::decode(part.to_str()?).ok()?;
        parts.push(decoded.into_owned());
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
