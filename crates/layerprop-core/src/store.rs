//! Build pipeline and the resolved property store
//!
//! [`build`] reads every registered source, merges them by priority, expands
//! placeholders and hands back an immutable [`PropertyStore`].

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result, UnresolvedPlaceholder};
use crate::interpolation::Syntax;
use crate::merge::{merge, normalize_key, PropertySource};
use crate::properties;
use crate::reader::Reader;
use crate::resolver::resolve;

/// Priority used when a registration does not name one
pub const DEFAULT_PRIORITY: i32 = 10000;
/// Conventional priority for environment variables
pub const ENV_PRIORITY: i32 = 1000;
/// Conventional priority for explicit overrides (e.g. command-line values)
pub const OVERRIDE_PRIORITY: i32 = 100;
/// Separator used by the list accessors
pub const DEFAULT_LIST_SEPARATOR: &str = ",";

/// Options for building a [`PropertyStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Placeholder start delimiter
    pub start_delimiter: String,
    /// Placeholder end delimiter
    pub end_delimiter: String,
    /// Separates a key from its default value. Empty disables defaults.
    pub default_value_separator: String,
    /// Keep unresolvable placeholders as text instead of failing the build
    pub ignore_unresolvable_placeholders: bool,
    /// When false, keys are lower-cased at merge and at lookup
    pub case_sensitive: bool,
    /// Priority for registrations without an explicit one
    pub default_priority: i32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            start_delimiter: "${".to_string(),
            end_delimiter: "}".to_string(),
            default_value_separator: ":".to_string(),
            ignore_unresolvable_placeholders: false,
            case_sensitive: true,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl BuildOptions {
    pub fn with_start_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.start_delimiter = delimiter.into();
        self
    }

    pub fn with_end_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.end_delimiter = delimiter.into();
        self
    }

    pub fn with_default_value_separator(mut self, separator: impl Into<String>) -> Self {
        self.default_value_separator = separator.into();
        self
    }

    pub fn with_ignore_unresolvable_placeholders(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable_placeholders = ignore;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    /// The placeholder syntax described by these options
    pub fn syntax(&self) -> Syntax {
        Syntax::new(
            self.start_delimiter.clone(),
            self.end_delimiter.clone(),
            self.default_value_separator.clone(),
        )
    }

    /// Check that the options can be used for a build
    pub fn validate(&self) -> Result<()> {
        self.syntax()
            .validate()
            .map_err(|e| e.with_help("Placeholder delimiters must be non-empty strings"))
    }
}

/// A reader registered for a build, with an optional explicit priority
pub struct SourceRegistration {
    reader: Box<dyn Reader>,
    priority: Option<i32>,
}

impl SourceRegistration {
    /// Register a reader at the build's default priority
    pub fn new(reader: impl Reader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            priority: None,
        }
    }

    /// Register a reader at an explicit priority (lower wins)
    pub fn with_priority(reader: impl Reader + 'static, priority: i32) -> Self {
        Self {
            reader: Box::new(reader),
            priority: Some(priority),
        }
    }

    pub fn reader(&self) -> &dyn Reader {
        self.reader.as_ref()
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }
}

impl fmt::Debug for SourceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistration")
            .field("reader", &self.reader.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Read, merge and resolve the registered sources.
///
/// Registration order matters: among sources with the same priority the one
/// registered last wins. The build is all or nothing; any reader failure or
/// (unless ignored) any unresolvable placeholder fails it.
///
/// # Examples
///
/// ```ignore
/// use layerprop_core::{build, BuildOptions, EnvReader, FileReader, SourceRegistration, ENV_PRIORITY};
///
/// let store = build(
///     &[
///         SourceRegistration::new(FileReader::new("app.properties")),
///         SourceRegistration::with_priority(EnvReader::dotted(), ENV_PRIORITY),
///     ],
///     &BuildOptions::default(),
/// )?;
/// let port = store.get_i32("server.port")?;
/// ```
pub fn build(registrations: &[SourceRegistration], options: &BuildOptions) -> Result<PropertyStore> {
    options.validate()?;

    let mut sources = Vec::with_capacity(registrations.len());
    for registration in registrations {
        let name = registration.reader.name();
        let entries = registration.reader.read()?;
        let priority = registration.priority.unwrap_or(options.default_priority);
        log::trace!(
            "Read {} entries from '{}' (priority {})",
            entries.len(),
            name,
            priority
        );
        sources.push(PropertySource::new(name, priority, entries));
    }

    let table = merge(&sources, options.case_sensitive);
    let resolution = resolve(
        &table,
        &options.syntax(),
        options.ignore_unresolvable_placeholders,
        options.case_sensitive,
    )?;

    let source_map = table
        .into_iter()
        .map(|(key, property)| (key, property.source))
        .collect();

    Ok(PropertyStore {
        values: Arc::new(resolution.values),
        source_map: Arc::new(source_map),
        unresolved: Arc::new(resolution.unresolved),
        case_sensitive: options.case_sensitive,
    })
}

/// The resolved, immutable key/value store
///
/// Cloning is cheap; clones share the same data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyStore {
    values: Arc<IndexMap<String, String>>,
    /// Name of the winning source per key
    source_map: Arc<IndexMap<String, String>>,
    unresolved: Arc<Vec<UnresolvedPlaceholder>>,
    case_sensitive: bool,
}

impl PropertyStore {
    /// Same as [`build`]
    pub fn build(registrations: &[SourceRegistration], options: &BuildOptions) -> Result<Self> {
        build(registrations, options)
    }

    fn lookup_key<'k>(&self, key: &'k str) -> Cow<'k, str> {
        normalize_key(key, self.case_sensitive)
    }

    /// Get the resolved value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(self.lookup_key(key).as_ref())
            .map(String::as_str)
    }

    /// Get the resolved value of a key, or `default` if it is absent
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Parse the value of a key with [`FromStr`]. Works for any type
    /// implementing it, including user enums.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|value| parse_value(key, value))
            .transpose()
    }

    /// Parse the value of a key, or return `default` if it is absent
    pub fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    pub fn get_i32(&self, key: &str) -> Result<Option<i32>> {
        self.get_parsed(key)
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get_parsed(key)
    }

    pub fn get_f32(&self, key: &str) -> Result<Option<f32>> {
        self.get_parsed(key)
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.get_parsed(key)
    }

    /// Get a boolean value. Only `true` and `false` are accepted, in any case.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        if value.eq_ignore_ascii_case("true") {
            Ok(Some(true))
        } else if value.eq_ignore_ascii_case("false") {
            Ok(Some(false))
        } else {
            Err(Error::value_parse(key, "bool", value)
                .with_help("Only \"true\" or \"false\" are allowed (case-insensitive)"))
        }
    }

    /// Split a value on [`DEFAULT_LIST_SEPARATOR`]
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get_list_with(key, DEFAULT_LIST_SEPARATOR)
    }

    /// Split a value on `separator`.
    ///
    /// Items are not trimmed. Trailing empty items are dropped, and an absent
    /// key or empty value gives an empty list.
    pub fn get_list_with(&self, key: &str, separator: &str) -> Vec<String> {
        let Some(value) = self.get(key) else {
            return Vec::new();
        };
        let mut items: Vec<String> = if separator.is_empty() {
            vec![value.to_string()]
        } else {
            value.split(separator).map(str::to_string).collect()
        };
        while items.last().is_some_and(|item| item.is_empty()) {
            items.pop();
        }
        items
    }

    /// Split a value on [`DEFAULT_LIST_SEPARATOR`] and parse every item
    pub fn get_list_parsed<T: FromStr>(&self, key: &str) -> Result<Vec<T>> {
        self.get_list(key)
            .iter()
            .map(|item| parse_value(key, item))
            .collect()
    }

    /// Name of the source the value of a key came from
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.source_map
            .get(self.lookup_key(key).as_ref())
            .map(String::as_str)
    }

    /// Winning source name for every key
    pub fn dump_sources(&self) -> &IndexMap<String, String> {
        &self.source_map
    }

    /// Placeholders kept as text because the build ignored unresolvable ones
    pub fn unresolved(&self) -> &[UnresolvedPlaceholder] {
        &self.unresolved
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All resolved properties, in merge order
    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.values
    }

    /// Export as a flat JSON object
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self.values.as_ref()).map_err(|e| Error::parse(e.to_string()))
    }

    /// Export as a flat YAML mapping
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self.values.as_ref()).map_err(|e| Error::parse(e.to_string()))
    }

    /// Export as `.properties` text
    pub fn to_properties(&self) -> String {
        properties::write(self.iter())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::value_parse(key, short_type_name::<T>(), value))
}

/// `core::primitive::i32` → `i32`, `my_crate::Mode` → `Mode`
fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
