// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

#[rstest]
#[case("bash", Some(Shell::Bash))]
#[case("/bin/bash", Some(Shell::Bash))]
#[case("sh", Some(Shell::Bash))]
#[case("tcsh", Some(Shell::Tcsh))]
#[case("-csh", Some(Shell::Tcsh))]
#[case("/usr/bin/csh", Some(Shell::Tcsh))]
#[case("DOS", Some(Shell::WinCmd))]
#[case("fish", None)]
fn test_shell_resolution(#[case] name: &str, #[case] expected: Option<Shell>) {
    assert_eq!(Shell::from_name(name), expected);
}

#[rstest]
fn test_bash_formatting() {
    assert_eq!(
        Shell::Bash.set_var("FOO", "bar baz"),
        "export FOO=\"bar baz\";"
    );
    assert_eq!(Shell::Bash.unset_var("FOO"), "unset FOO;");
    // functions survive into subshells where plain aliases would not
    let alias = Shell::Bash.alias("nuke6", "setpkg nuke-6.0v6");
    assert!(alias.contains("nuke6() { setpkg nuke-6.0v6; };"));
    assert!(alias.contains("export -f nuke6;"));
}

#[rstest]
fn test_tcsh_formatting() {
    assert_eq!(Shell::Tcsh.set_var("FOO", "bar"), "setenv FOO \"bar\";");
    assert_eq!(Shell::Tcsh.unset_var("FOO"), "unsetenv FOO;");
    assert_eq!(
        Shell::Tcsh.alias("pkgs", "pkg list"),
        "alias pkgs 'pkg list';"
    );
}

#[rstest]
fn test_wincmd_converts_path_separators() {
    assert_eq!(
        Shell::WinCmd.set_var("APP", "C:/apps/nuke"),
        "set APP=C:\\apps\\nuke\n"
    );
}

#[rstest]
fn test_format_changes_emits_sets_then_unsets() {
    let mut changes = EnvChanges::default();
    changes.changed.insert("B".into(), "2".into());
    changes.changed.insert("A".into(), "1".into());
    changes.removed.push("GONE".into());

    let script = Shell::Bash.format_changes(&changes);
    let lines: Vec<&str> = script.lines().collect();
    assert_eq!(
        lines,
        vec![
            "export A=\"1\";",
            "export B=\"2\";",
            "unset GONE;",
        ]
    );
}
