//! Settings error-message and charm-metadata integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use relation_core::{
    settings, AgentSettings, CharmDirReader, CharmReader, Endpoint, Role, Scope, SettingsError,
};

// ---------------------------------------------------------------------------
// 1. Settings load errors
// ---------------------------------------------------------------------------

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("agent.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = settings::load_at(file.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("agent.yaml"));
}

#[test]
fn missing_settings_mention_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = settings::load_at(&dir.path().join("agent.yaml")).unwrap_err();
    assert!(err.to_string().contains("settings not found"));
}

// ---------------------------------------------------------------------------
// 2. Atomic save
// ---------------------------------------------------------------------------

#[test]
fn save_writes_yaml_and_cleans_tmp() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("agent.yaml");
    let settings = AgentSettings::new("mysql/0", dir.path().join("data"));

    settings::save_at(file.path(), &settings).expect("save");

    file.assert(predicate::str::contains("unit: mysql/0"));
    dir.child("agent.yaml.tmp").assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 3. Charm directory reader
// ---------------------------------------------------------------------------

#[test]
fn subordinate_charm_container_endpoint_is_implemented() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("metadata.yaml")
        .write_str(
            "name: logger\nsubordinate: true\nrequires:\n  host:\n    interface: juju-info\n    scope: container\n",
        )
        .expect("write");

    let meta = CharmDirReader::new(dir.path()).read().expect("read");
    assert!(meta.subordinate);

    let host = Endpoint {
        application_name: "logger".into(),
        name: "host".into(),
        interface: "juju-info".into(),
        role: Role::Requirer,
        scope: Scope::Container,
    };
    assert!(host.implemented_by(&meta));
}
