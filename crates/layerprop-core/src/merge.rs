//! Priority merging of property sources
//!
//! Every source carries an integer priority; a smaller number takes
//! precedence. When two sources share the winning priority, the one
//! registered later wins. Merging is total and pure.

use std::borrow::Cow;

use indexmap::IndexMap;

use crate::reader::RawProperty;

/// One reader's batch of entries, tagged with its priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySource {
    /// Reader name, kept for source tracking
    pub name: String,
    pub priority: i32,
    pub entries: Vec<RawProperty>,
}

impl PropertySource {
    pub fn new(name: impl Into<String>, priority: i32, entries: Vec<RawProperty>) -> Self {
        Self {
            name: name.into(),
            priority,
            entries,
        }
    }
}

/// The winning raw entry for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedProperty {
    /// Normalized key
    pub key: String,
    pub raw_value: String,
    /// Priority of the source the value came from
    pub priority: i32,
    pub resolvable: bool,
    /// Name of the source the value came from
    pub source: String,
}

/// Merged properties keyed by normalized key, in first-seen order
pub type MergedTable = IndexMap<String, MergedProperty>;

/// Normalize a key for the given case mode
pub fn normalize_key(key: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(key)
    } else {
        Cow::Owned(key.to_lowercase())
    }
}

/// Merge sources in registration order.
///
/// A later entry replaces the incumbent when its priority is lower or equal,
/// so among equal priorities the last registered entry wins. Replacing an
/// entry keeps the key's original position in the table.
pub fn merge(sources: &[PropertySource], case_sensitive: bool) -> MergedTable {
    let mut table = MergedTable::new();

    for source in sources {
        for entry in &source.entries {
            let key = normalize_key(&entry.key, case_sensitive).into_owned();

            let replace = table
                .get(&key)
                .is_none_or(|incumbent| source.priority <= incumbent.priority);

            if replace {
                table.insert(
                    key.clone(),
                    MergedProperty {
                        key,
                        raw_value: entry.value.clone(),
                        priority: source.priority,
                        resolvable: entry.resolvable,
                        source: source.name.clone(),
                    },
                );
            }
        }
    }

    log::debug!(
        "Merged {} sources into {} distinct keys",
        sources.len(),
        table.len()
    );

    table
}
