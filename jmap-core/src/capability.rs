use indexmap::IndexSet;
use serde::Serialize;

pub const CORE: &str = "urn:ietf:params:jmap:core";
pub const MAIL: &str = "urn:ietf:params:jmap:mail";
pub const SUBMISSION: &str = "urn:ietf:params:jmap:submission";
pub const CONTACTS: &str = "urn:ietf:params:jmap:contacts";
pub const CALENDARS: &str = "urn:ietf:params:jmap:calendars";

/// Vendor namespaces predating the IETF contacts/calendars drafts.
pub const FASTMAIL_CONTACTS: &str = "https://www.fastmail.com/dev/contacts";
pub const FASTMAIL_CALENDARS: &str = "https://www.fastmail.com/dev/calendars";

/// The `using` declaration of a request. Always contains the core capability;
/// keeps insertion order and drops duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet(IndexSet<String>);

impl CapabilitySet {
    pub fn new() -> Self {
        let mut set = IndexSet::new();
        set.insert(CORE.to_string());
        CapabilitySet(set)
    }

    pub fn insert(&mut self, capability: impl Into<String>) -> bool {
        self.0.insert(capability.into())
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Into<String>> Extend<S> for CapabilitySet {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        for capability in iter {
            self.insert(capability);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_always_present() {
        let set = CapabilitySet::new();
        assert!(set.contains(CORE));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insertion_order_and_dedup() {
        let mut set = CapabilitySet::new();
        set.extend([MAIL, SUBMISSION, MAIL, CORE]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![CORE, MAIL, SUBMISSION]);
    }

    #[test]
    fn test_serializes_as_array() {
        let mut set = CapabilitySet::new();
        set.insert(MAIL);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!([CORE, MAIL]));
    }
}
