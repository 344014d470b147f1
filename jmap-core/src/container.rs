use crate::error::{JmapError, Result};

/// A named grouping of records (a mailbox, an address book, a calendar) that
/// may carry a well-known role.
pub trait Container {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn role(&self) -> Option<&str>;
}

/// Pick the container for a well-known role.
///
/// An exact role match wins. Accounts without role metadata fall back to the
/// first container whose name contains `name` case-insensitively. An empty
/// `name` never matches by name.
pub fn find_container<'a, C: Container>(
    containers: &'a [C],
    role: &str,
    name: &str,
) -> Result<&'a C> {
    if let Some(found) = containers.iter().find(|c| c.role() == Some(role)) {
        return Ok(found);
    }

    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Err(JmapError::configuration(role, name));
    }
    containers
        .iter()
        .find(|c| c.name().to_lowercase().contains(&needle))
        .ok_or_else(|| JmapError::configuration(role, name))
}
