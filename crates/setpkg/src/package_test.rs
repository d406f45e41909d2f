// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::*;
use crate::error::Error;

fn write_pkg(dir: &Path, name: &str, content: &str) -> PathBuf {
    let file = dir.join(format!("{name}.pkg"));
    std::fs::write(&file, content).unwrap();
    file
}

fn load(dir: &Path, name: &str, requested: Option<&str>) -> crate::Result<Package> {
    let env = Environ::new();
    Descriptor::load(&dir.join(format!("{name}.pkg")))?.resolve(requested, &env)
}

const NUKE: &str = "\
# [main]
# executable-path = Nuke
# version-regex = (\\d+)\\.(\\d+)v(\\d+)
# default-version = 6.1v2
#
# [aliases]
# 6.0 = 6.0v6
# 6.1 = 6.1v2
#
# [versions]
# 6.1v2 =
# 6.0v6 =
#
# [requires]
# 6.* = python-2.5
#
# [subs]
# * = djv
#
# [system-aliases]
# 6 = 6.0

set NUKE_VER $VERSION
";

#[rstest]
fn test_request_splitting() {
    assert_eq!(split_request("nuke"), ("nuke", None));
    assert_eq!(split_request("nuke-6.0v6"), ("nuke", Some("6.0v6")));
    // only the first dash separates name and version
    assert_eq!(split_request("my-pkg-1.0"), ("my", Some("pkg-1.0")));
    assert_eq!(join_name("nuke", "6.0v6"), "nuke-6.0v6");
}

#[rstest]
fn test_sole_version_is_the_default() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "solo", "# [versions]\n# 1.0 =\n");
    let pkg = load(tmp.path(), "solo", None).unwrap();
    assert_eq!(pkg.version, "1.0");
    assert!(!pkg.explicit_version());
}

#[rstest]
fn test_header_default_version_is_used() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let pkg = load(tmp.path(), "nuke", None).unwrap();
    assert_eq!(pkg.version, "6.1v2");
    assert_eq!(pkg.origname(), "nuke");
    assert_eq!(pkg.fullname(), "nuke-6.1v2");
}

#[rstest]
fn test_environment_override_beats_header_default() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let env: Environ = [(
        "SETPKG_NUKE_DEFAULT_VERSION".to_string(),
        "6.0v6".to_string(),
    )]
    .into_iter()
    .collect();
    let pkg = Descriptor::load(&tmp.path().join("nuke.pkg"))
        .unwrap()
        .resolve(None, &env)
        .unwrap();
    assert_eq!(pkg.version, "6.0v6");
}

#[rstest]
fn test_explicit_request_beats_everything() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let pkg = load(tmp.path(), "nuke", Some("6.0v6")).unwrap();
    assert_eq!(pkg.version, "6.0v6");
    assert!(pkg.explicit_version());
    assert_eq!(pkg.origname(), "nuke-6.0v6");
}

#[rstest]
fn test_alias_resolves_to_concrete_version() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let pkg = load(tmp.path(), "nuke", Some("6.0")).unwrap();
    assert_eq!(pkg.version, "6.0v6");
}

#[rstest]
fn test_alias_chains_expand_and_bad_aliases_drop() {
    let tmp = TempDir::new().unwrap();
    write_pkg(
        tmp.path(),
        "app",
        "\
# [aliases]
# latest = stable
# stable = 2.0
# broken = nowhere
# loop_a = loop_b
# loop_b = loop_a
#
# [versions]
# 1.0 =
# 2.0 =
# [main]
# default-version = 2.0
",
    );
    let descriptor = Descriptor::load(&tmp.path().join("app.pkg")).unwrap();
    assert_eq!(descriptor.aliases.get("latest").map(String::as_str), Some("2.0"));
    assert_eq!(descriptor.aliases.get("stable").map(String::as_str), Some("2.0"));
    assert!(!descriptor.aliases.contains_key("broken"));
    assert!(!descriptor.aliases.contains_key("loop_a"));
    assert!(!descriptor.aliases.contains_key("loop_b"));
}

#[rstest]
fn test_invalid_version_lists_choices() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let err = load(tmp.path(), "nuke", Some("9.9v9")).unwrap_err();
    match err {
        Error::InvalidVersion {
            package,
            version,
            choices,
        } => {
            assert_eq!(package, "nuke");
            assert_eq!(version, "9.9v9");
            assert!(choices.contains(&"6.0v6".to_string()));
            assert!(choices.contains(&"6.0".to_string()), "aliases are listed too");
        }
        other => panic!("expected InvalidVersion, got {other:?}"),
    }
}

#[rstest]
fn test_missing_versions_section_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "bad", "# [main]\n# default-version = 1.0\n");
    let err = Descriptor::load(&tmp.path().join("bad.pkg")).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[rstest]
fn test_no_default_with_multiple_versions_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "multi", "# [versions]\n# 1.0 =\n# 2.0 =\n");
    let err = load(tmp.path(), "multi", None).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

#[rstest]
fn test_malformed_version_tokens_are_dropped() {
    let tmp = TempDir::new().unwrap();
    write_pkg(
        tmp.path(),
        "app",
        "# [versions]\n# good-1.0 =\n# bad token! =\n",
    );
    let descriptor = Descriptor::load(&tmp.path().join("app.pkg")).unwrap();
    assert_eq!(descriptor.versions, vec!["good-1.0".to_string()]);
}

#[rstest]
fn test_versions_sort_component_wise() {
    let tmp = TempDir::new().unwrap();
    write_pkg(
        tmp.path(),
        "app",
        "# [versions]\n# 1.10 =\n# 1.9 =\n# 1.2 =\n# [main]\n# default-version = 1.10\n",
    );
    let descriptor = Descriptor::load(&tmp.path().join("app.pkg")).unwrap();
    assert_eq!(descriptor.versions, vec!["1.2", "1.9", "1.10"]);
}

#[rstest]
fn test_requires_collects_every_matching_glob_in_order() {
    let tmp = TempDir::new().unwrap();
    write_pkg(
        tmp.path(),
        "app",
        "\
# [main]
# default-version = 6.0
# [versions]
# 5.0 =
# 6.0 =
# [requires]
# 6.* = python-2.5, qt
# 5.* = python-2.4
# * = common
",
    );
    let pkg = load(tmp.path(), "app", None).unwrap();
    let requires: Vec<String> = pkg.requires().iter().map(|r| r.to_string()).collect();
    assert_eq!(requires, vec!["python-2.5", "qt", "common"]);
    let pinned = &pkg.requires()[0];
    assert_eq!(pinned.name, "python");
    assert_eq!(pinned.version.as_deref(), Some("2.5"));
}

#[rstest]
fn test_versions_from_regex_accepts_undeclared_versions() {
    let tmp = TempDir::new().unwrap();
    write_pkg(
        tmp.path(),
        "app",
        "\
# [main]
# version-regex = (\\d+)\\.(\\d+)
# versions-from-regex = true
# default-version = 1.0
# [versions]
# 1.0 =
",
    );
    let pkg = load(tmp.path(), "app", Some("3.7")).unwrap();
    assert_eq!(pkg.version, "3.7");
    assert_eq!(
        pkg.version_parts,
        Some(vec!["3".to_string(), "7".to_string()])
    );

    // without the opt-in, the same request fails
    write_pkg(
        tmp.path(),
        "strict",
        "\
# [main]
# version-regex = (\\d+)\\.(\\d+)
# default-version = 1.0
# [versions]
# 1.0 =
",
    );
    assert!(matches!(
        load(tmp.path(), "strict", Some("3.7")),
        Err(Error::InvalidVersion { .. })
    ));
}

#[rstest]
fn test_version_parts_from_regex() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let pkg = load(tmp.path(), "nuke", Some("6.0v6")).unwrap();
    assert_eq!(
        pkg.version_parts,
        Some(vec!["6".to_string(), "0".to_string(), "6".to_string()])
    );
}

#[rstest]
fn test_executable_defaults_to_short_name() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "plain", "# [versions]\n# 1.0 =\n");
    let descriptor = Descriptor::load(&tmp.path().join("plain.pkg")).unwrap();
    assert_eq!(descriptor.executable(), "plain");

    write_pkg(tmp.path(), "nuke", NUKE);
    let descriptor = Descriptor::load(&tmp.path().join("nuke.pkg")).unwrap();
    assert_eq!(descriptor.executable(), "Nuke");
}

#[rstest]
fn test_system_aliases_expand_through_version_aliases() {
    let tmp = TempDir::new().unwrap();
    write_pkg(tmp.path(), "nuke", NUKE);
    let descriptor = Descriptor::load(&tmp.path().join("nuke.pkg")).unwrap();
    assert_eq!(
        descriptor.system_aliases(),
        vec![("nuke6".to_string(), "nuke-6.0v6".to_string())]
    );
}

#[rstest]
fn test_content_hash_tracks_file_content() {
    let tmp = TempDir::new().unwrap();
    let file = write_pkg(tmp.path(), "app", "# [versions]\n# 1.0 =\n");
    let first = Descriptor::load(&file).unwrap().hash;
    std::fs::write(&file, "# [versions]\n# 1.0 =\n\nset FOO bar\n").unwrap();
    let second = Descriptor::load(&file).unwrap().hash;
    assert_ne!(first, second);
}

#[rstest]
fn test_default_version_may_be_an_alias() {
    let tmp = TempDir::new().unwrap();
    write_pkg(
        tmp.path(),
        "app",
        "\
# [main]
# default-version = latest
# [aliases]
# latest = 2.0
# [versions]
# 1.0 =
# 2.0 =
",
    );
    let pkg = load(tmp.path(), "app", None).unwrap();
    assert_eq!(pkg.version, "2.0");
}
