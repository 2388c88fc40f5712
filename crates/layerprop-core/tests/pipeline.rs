//! End-to-end builds: files, environment and in-memory sources through
//! merge, resolution and the accessors.

use std::path::PathBuf;

use layerprop_core::{
    build, BuildOptions, EnvReader, ErrorKind, FileReader, MapReader, PropertyStore,
    SourceRegistration, UnresolvedReason, DEFAULT_PRIORITY, ENV_PRIORITY, OVERRIDE_PRIORITY,
};
use pretty_assertions::assert_eq;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn build_default(registrations: &[SourceRegistration]) -> PropertyStore {
    build(registrations, &BuildOptions::default()).unwrap()
}

#[test]
fn test_lowest_priority_wins_and_ties_go_to_last_registered() {
    let store = build_default(&[
        SourceRegistration::with_priority(MapReader::named("first").add("k", "first"), 50),
        SourceRegistration::with_priority(MapReader::named("second").add("k", "second"), 100),
        SourceRegistration::with_priority(MapReader::named("third").add("k", "third"), 50),
    ]);

    assert_eq!(store.get("k"), Some("third"));
    assert_eq!(store.source_of("k"), Some("third"));
}

#[test]
fn test_files_at_default_priority_later_overrides_earlier() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_file(
        &dir,
        "base.properties",
        "keyOne=firstvalue\nname=base\ndb.url=jdbc://${db.host}/${db.name:app}\ndb.host=localhost\n",
    );
    let local = write_file(&dir, "local.yaml", "name: local\ndb:\n  host: db.internal\n");

    let store = build_default(&[
        SourceRegistration::new(FileReader::new(&base)),
        SourceRegistration::new(FileReader::new(&local)),
    ]);

    assert_eq!(store.get("keyOne"), Some("firstvalue"));
    assert_eq!(store.get("name"), Some("local"));
    assert_eq!(store.get("db.url"), Some("jdbc://db.internal/app"));
    assert_eq!(store.source_of("db.url"), Some("base.properties"));
    assert_eq!(store.source_of("db.host"), Some("local.yaml"));
}

#[test]
fn test_custom_priority_beats_default() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(&dir, "app.json", r#"{"key": "file"}"#);

    let store = build_default(&[
        SourceRegistration::with_priority(MapReader::new().add("key", "customReader"), 0),
        SourceRegistration::new(FileReader::from_resource(&format!(
            "file:{}",
            file.display()
        ))),
    ]);

    assert_eq!(store.get("key"), Some("customReader"));
}

#[test]
fn test_missing_optional_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();

    let store = build_default(&[
        SourceRegistration::new(MapReader::new().add("key", "value")),
        SourceRegistration::new(FileReader::new(dir.path().join("nope.properties")).optional(true)),
    ]);

    assert_eq!(store.get("key"), Some("value"));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_missing_required_file_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let err = build(
        &[SourceRegistration::new(FileReader::new(
            dir.path().join("nope.properties"),
        ))],
        &BuildOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::SourceUnavailable { .. }));
}

#[test]
fn test_nested_placeholders_across_sources() {
    let store = build_default(&[
        SourceRegistration::with_priority(MapReader::new().add("key1", "V"), 10),
        SourceRegistration::with_priority(MapReader::new().add("key2", "${${key3}}__${key1}"), 0),
        SourceRegistration::with_priority(MapReader::new().add("key3", "key1"), 0),
    ]);

    assert_eq!(store.get("key2"), Some("V__V"));
}

#[test]
fn test_substituted_text_is_rescanned_across_sources() {
    let store = build_default(&[
        SourceRegistration::with_priority(MapReader::new().add("open", "$"), 10),
        SourceRegistration::with_priority(
            MapReader::new()
                .add("k", "missing.key:fallback")
                .add("joined", "${open}{target}")
                .add("split", "${${k}}"),
            0,
        ),
        SourceRegistration::new(MapReader::new().add("target", "T")),
    ]);

    assert_eq!(store.get("joined"), Some("T"));
    assert_eq!(store.get("split"), Some("fallback"));
}

#[test]
fn test_json_file_numbers_keep_their_text() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        &dir,
        "versions.json",
        r#"{"app": {"version": 1.10, "build": 18446744073709551615}, "label": "v${app.version}"}"#,
    );

    let store = build_default(&[SourceRegistration::new(FileReader::new(&file))]);

    assert_eq!(store.get("app.version"), Some("1.10"));
    assert_eq!(store.get("app.build"), Some("18446744073709551615"));
    assert_eq!(store.get("label"), Some("v1.10"));
}

#[test]
fn test_custom_delimiters() {
    let options = BuildOptions::default()
        .with_start_delimiter("((")
        .with_end_delimiter("))");

    let store = build(
        &[
            SourceRegistration::new(
                MapReader::new()
                    .add("key1", "value1")
                    .add("key2", "((((key3))))__((key1))")
                    .add("literal", "${key1}"),
            ),
            SourceRegistration::new(MapReader::new().add("key3", "key1")),
        ],
        &options,
    )
    .unwrap();

    assert_eq!(store.get("key2"), Some("value1__value1"));
    assert_eq!(store.get("literal"), Some("${key1}"));
}

#[test]
fn test_ignore_unresolvable_placeholders() {
    let registrations = [
        SourceRegistration::new(MapReader::new().add("key2", "${${key3}}__${key1}")),
        SourceRegistration::new(MapReader::new().add("key3", "key1")),
    ];

    let store = build(
        &registrations,
        &BuildOptions::default().with_ignore_unresolvable_placeholders(true),
    )
    .unwrap();
    assert_eq!(store.get("key2"), Some("${key1}__${key1}"));

    let err = build(&registrations, &BuildOptions::default()).unwrap_err();
    assert!(err.to_string().contains("key: [key2] placeholder: [${key1}]"));
}

#[test]
fn test_cycle_fails_without_hanging() {
    let registrations = [SourceRegistration::new(
        MapReader::new().add("a", "${b}").add("b", "${a}"),
    )];

    let err = build(&registrations, &BuildOptions::default()).unwrap_err();
    assert!(err
        .unresolved()
        .iter()
        .all(|u| matches!(u.reason, UnresolvedReason::Circular { .. })));

    let store = build(
        &registrations,
        &BuildOptions::default().with_ignore_unresolvable_placeholders(true),
    )
    .unwrap();
    assert_eq!(store.get("a"), Some("${b}"));
    assert_eq!(store.get("b"), Some("${a}"));
}

#[test]
fn test_case_insensitive_keys_collide_across_sources() {
    let options = BuildOptions::default().with_case_sensitive(false);

    let store = build(
        &[
            SourceRegistration::with_priority(MapReader::named("upper").add("Key.One", "upper"), 5),
            SourceRegistration::with_priority(MapReader::named("lower").add("key.one", "lower"), 5),
            SourceRegistration::new(MapReader::new().add("ref", "${KEY.ONE}")),
        ],
        &options,
    )
    .unwrap();

    assert_eq!(store.get("KEY.one"), Some("lower"));
    assert_eq!(store.get("ref"), Some("lower"));
    assert_eq!(store.source_of("key.ONE"), Some("lower"));
}

#[test]
fn test_environment_layering() {
    let env = || {
        EnvReader::from_vars(vec![
            ("DB_HOST", "env-host"),
            ("DB_PASSWORD", "p${ss}word"),
        ])
    };

    let store = build_default(&[
        SourceRegistration::new(
            MapReader::named("defaults")
                .add("db.host", "localhost")
                .add("db.user", "admin")
                .add("dsn", "${db.user}:${db.password}@${db.host}"),
        ),
        SourceRegistration::with_priority(env(), ENV_PRIORITY),
        SourceRegistration::with_priority(env().into_dotted(), ENV_PRIORITY),
        SourceRegistration::with_priority(
            MapReader::named("overrides").add("db.user", "root"),
            OVERRIDE_PRIORITY,
        ),
    ]);

    // Environment values are kept verbatim even though they look like placeholders
    assert_eq!(store.get("DB_PASSWORD"), Some("p${ss}word"));
    assert_eq!(store.get("dsn"), Some("root:p${ss}word@env-host"));
    assert_eq!(store.source_of("db.host"), Some("env (mapped)"));
    assert_eq!(store.source_of("DB_HOST"), Some("env"));
    assert!(OVERRIDE_PRIORITY < ENV_PRIORITY && ENV_PRIORITY < DEFAULT_PRIORITY);
}

#[test]
fn test_build_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        &dir,
        "app.properties",
        "a=${b}-${c:none}\nb=${d}\nd=deep\nlist=1,2,3\n",
    );
    let registrations = [SourceRegistration::new(FileReader::new(&file))];

    let first = build_default(&registrations);
    let second = build_default(&registrations);

    assert_eq!(first, second);
    assert_eq!(first.to_properties(), second.to_properties());
    assert_eq!(first.get("a"), Some("deep-none"));
}

#[test]
fn test_typed_accessors_after_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        &dir,
        "server.yaml",
        "server:\n  port: ${base.port}\n  debug: 'TRUE'\n  hosts: a.example.com,b.example.com\nbase:\n  port: 8080\n",
    );

    let store = build_default(&[SourceRegistration::new(FileReader::new(&file))]);

    assert_eq!(store.get_i32("server.port").unwrap(), Some(8080));
    assert_eq!(store.get_bool("server.debug").unwrap(), Some(true));
    assert_eq!(
        store.get_list("server.hosts"),
        vec!["a.example.com", "b.example.com"]
    );
}

#[test]
fn test_properties_export_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_file(
        &dir,
        "source.properties",
        "greeting=hello ${name}\nname=world\npath=C:\\\\temp\nmulti=a\\nb\n",
    );

    let store = build_default(&[SourceRegistration::new(FileReader::new(&source))]);
    let exported = write_file(&dir, "exported.properties", &store.to_properties());
    let reloaded = build_default(&[SourceRegistration::new(FileReader::new(&exported))]);

    assert_eq!(reloaded.as_map(), store.as_map());
    assert_eq!(reloaded.get("greeting"), Some("hello world"));
    assert_eq!(reloaded.get("path"), Some("C:\\temp"));
}
