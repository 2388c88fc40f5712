//! layerprop-core: layered properties with placeholder resolution
//!
//! This crate reads key/value properties from several prioritized sources,
//! merges them into one flat namespace (the lowest priority number wins) and
//! expands `${...}` placeholders, including nested ones, with cycle detection.
//!
//! # Example
//!
//! ```rust
//! use layerprop_core::{build, BuildOptions, MapReader, SourceRegistration};
//!
//! let defaults = MapReader::named("defaults")
//!     .add("db.host", "localhost")
//!     .add("db.url", "jdbc://${db.host}:${db.port:5432}/app");
//! let overrides = MapReader::named("overrides").add("db.host", "db.internal");
//!
//! let store = build(
//!     &[
//!         SourceRegistration::with_priority(defaults, 100),
//!         SourceRegistration::with_priority(overrides, 10),
//!     ],
//!     &BuildOptions::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(store.get("db.url"), Some("jdbc://db.internal:5432/app"));
//! assert_eq!(store.source_of("db.host"), Some("overrides"));
//! ```

pub mod error;
pub mod interpolation;
pub mod merge;
pub mod properties;
pub mod reader;
pub mod resolver;
pub mod value;

mod store;

pub use error::{Error, ErrorKind, Result, UnresolvedPlaceholder, UnresolvedReason};
pub use interpolation::Syntax;
pub use reader::{EnvReader, FileFormat, FileReader, FnReader, MapReader, RawProperty, Reader};
pub use store::{
    build, BuildOptions, PropertyStore, SourceRegistration, DEFAULT_LIST_SEPARATOR,
    DEFAULT_PRIORITY, ENV_PRIORITY, OVERRIDE_PRIORITY,
};
pub use value::Value;
