//! Property readers
//!
//! A reader produces an ordered batch of raw key/value pairs from one place
//! (a file, the environment, an in-memory map). Readers do no merging and no
//! placeholder expansion; that happens once all batches are collected.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SourceLocation};
use crate::properties;
use crate::value::Value;

/// A raw property as produced by a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub key: String,
    pub value: String,
    /// Whether placeholders inside `value` are expanded. Non-resolvable
    /// values are stored verbatim but can still be referenced.
    pub resolvable: bool,
}

impl RawProperty {
    /// Create a property whose value takes part in placeholder expansion
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            resolvable: true,
        }
    }

    /// Create a property whose value is kept verbatim
    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            resolvable: false,
        }
    }
}

/// Trait for reader implementations
pub trait Reader: Send + Sync {
    /// Read every entry of this source, in source order
    fn read(&self) -> Result<Vec<RawProperty>>;

    /// Human-readable name, used for source tracking and logging
    fn name(&self) -> String;
}

/// In-memory properties, kept in insertion order
#[derive(Debug, Clone, Default)]
pub struct MapReader {
    name: String,
    entries: Vec<RawProperty>,
}

impl MapReader {
    /// Create an empty reader named "map"
    pub fn new() -> Self {
        Self::named("map")
    }

    /// Create an empty reader with a custom name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a resolvable entry
    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(RawProperty::new(key, value));
        self
    }

    /// Add an entry whose value is never expanded
    pub fn add_literal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(RawProperty::literal(key, value));
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapReader {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(MapReader::new(), |reader, (k, v)| reader.add(k, v))
    }
}

impl Reader for MapReader {
    fn read(&self) -> Result<Vec<RawProperty>> {
        Ok(self.entries.clone())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Environment variables as properties
///
/// Values are non-resolvable by default: an environment value that happens
/// to contain `${...}` is kept as is.
#[derive(Debug, Clone)]
pub struct EnvReader {
    /// Fixed variables; `None` reads the process environment on each `read`
    vars: Option<Vec<(String, String)>>,
    replacements: Vec<(String, String)>,
    lowercase: bool,
    resolvable: bool,
}

impl Default for EnvReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvReader {
    /// Read the process environment with keys unchanged
    pub fn new() -> Self {
        Self {
            vars: None,
            replacements: Vec::new(),
            lowercase: false,
            resolvable: false,
        }
    }

    /// Read a fixed set of variables instead of the process environment
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Self::new()
        }
    }

    /// Process environment with property-style keys: `DATABASE_HOST` → `database.host`
    pub fn dotted() -> Self {
        Self::new().into_dotted()
    }

    /// Apply the property-style key mapping to this reader
    pub fn into_dotted(self) -> Self {
        self.lowercase(true).replace("_", ".")
    }

    /// Replace `from` with `to` in every key. Replacements apply in the order added.
    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replacements.push((from.into(), to.into()));
        self
    }

    /// Lower-case every key before replacements are applied
    pub fn lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    /// Whether placeholders inside environment values are expanded
    pub fn resolvable(mut self, resolvable: bool) -> Self {
        self.resolvable = resolvable;
        self
    }

    fn map_key(&self, key: &str) -> String {
        let mut key = if self.lowercase {
            key.to_lowercase()
        } else {
            key.to_string()
        };
        for (from, to) in &self.replacements {
            key = key.replace(from.as_str(), to);
        }
        key
    }
}

impl Reader for EnvReader {
    fn read(&self) -> Result<Vec<RawProperty>> {
        let mut vars = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        };
        // The process environment has no stable order
        vars.sort();

        Ok(vars
            .into_iter()
            .map(|(key, value)| RawProperty {
                key: self.map_key(&key),
                value,
                resolvable: self.resolvable,
            })
            .collect())
    }

    fn name(&self) -> String {
        if self.lowercase || !self.replacements.is_empty() {
            "env (mapped)".to_string()
        } else {
            "env".to_string()
        }
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `key=value` properties text
    Properties,
    /// YAML document, flattened to dotted keys
    Yaml,
    /// JSON document, flattened to dotted keys
    Json,
}

impl FileFormat {
    /// Detect the format from the file extension. Unknown extensions are
    /// read as properties.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Properties,
        }
    }

    /// Display name of the format
    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Properties => "properties",
            FileFormat::Yaml => "YAML",
            FileFormat::Json => "JSON",
        }
    }

    /// Parse file content into raw properties
    pub fn parse(&self, content: &str, file: &str) -> Result<Vec<RawProperty>> {
        let entries = match self {
            FileFormat::Properties => properties::parse(content).map_err(|e| {
                Error::parse(e.message).with_source_location(SourceLocation {
                    file: file.to_string(),
                    line: Some(e.line),
                    column: None,
                })
            })?,
            FileFormat::Yaml => {
                let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
                    let location = e.location();
                    Error::parse(e.to_string()).with_source_location(SourceLocation {
                        file: file.to_string(),
                        line: location.as_ref().map(|l| l.line()),
                        column: location.as_ref().map(|l| l.column()),
                    })
                })?;
                let value = Value::from_yaml(document).map_err(|e| {
                    e.with_source_location(SourceLocation {
                        file: file.to_string(),
                        line: None,
                        column: None,
                    })
                })?;
                flatten_document(value, file)?
            }
            FileFormat::Json => {
                let document: serde_json::Value = serde_json::from_str(content).map_err(|e| {
                    Error::parse(e.to_string()).with_source_location(SourceLocation {
                        file: file.to_string(),
                        line: Some(e.line()),
                        column: Some(e.column()),
                    })
                })?;
                flatten_document(Value::from_json(document), file)?
            }
        };

        Ok(entries
            .into_iter()
            .map(|(key, value)| RawProperty::new(key, value))
            .collect())
    }
}

fn flatten_document(value: Value, file: &str) -> Result<Vec<(String, String)>> {
    match value {
        // An empty YAML document
        Value::Null => Ok(Vec::new()),
        Value::Mapping(_) => Ok(value.flatten()),
        other => Err(Error::parse(format!(
            "Document root must be a mapping, found {}",
            other.type_name()
        ))
        .with_source_location(SourceLocation {
            file: file.to_string(),
            line: None,
            column: None,
        })),
    }
}

/// Reads a properties, YAML or JSON file
///
/// # Examples
///
/// ```ignore
/// use layerprop_core::FileReader;
///
/// let base = FileReader::new("config/app.properties");
/// let local = FileReader::new("config/local.yaml").optional(true);
/// ```
#[derive(Debug, Clone)]
pub struct FileReader {
    path: PathBuf,
    format: FileFormat,
    optional: bool,
}

impl FileReader {
    /// Create a reader for a required file, detecting the format from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            format: FileFormat::from_path(&path),
            path,
            optional: false,
        }
    }

    /// Create a reader from a resource string; a leading `file:` prefix is ignored
    pub fn from_resource(resource: &str) -> Self {
        Self::new(resource.strip_prefix("file:").unwrap_or(resource))
    }

    /// Whether a missing file yields no entries instead of an error
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Override the detected format
    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    /// The file this reader reads
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a missing file is tolerated
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The format the file is parsed as
    pub fn file_format(&self) -> FileFormat {
        self.format
    }
}

impl Reader for FileReader {
    fn read(&self) -> Result<Vec<RawProperty>> {
        let display = self.path.display().to_string();

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.optional {
                    log::trace!("Optional source '{}' not found, skipping", display);
                    return Ok(Vec::new());
                }
                return Err(Error::source_unavailable(display, e.to_string()));
            }
            Err(e) => return Err(Error::io(display, e.to_string())),
        };

        self.format.parse(&content, &display)
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A simple function-based reader
pub struct FnReader<F>
where
    F: Fn() -> Result<Vec<RawProperty>> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnReader<F>
where
    F: Fn() -> Result<Vec<RawProperty>> + Send + Sync,
{
    /// Create a new function-based reader
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Reader for FnReader<F>
where
    F: Fn() -> Result<Vec<RawProperty>> + Send + Sync,
{
    fn read(&self) -> Result<Vec<RawProperty>> {
        (self.func)()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
