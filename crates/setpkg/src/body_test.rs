// Copyright (c) Contributors to the setpkg project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

#[rstest]
fn test_parse_full_directive_set() {
    let program = Program::parse(
        "\
# body comment
set NUKE_VER $VERSION

prepend PATH ./bin
append NUKE_PATH /shared/gizmos
pop PATH /stale/entry
unset SCRATCH
pkg djv-0.8
log loaded $NAME
",
    )
    .unwrap();

    assert_eq!(
        program.directives,
        vec![
            Directive::Set {
                var: "NUKE_VER".into(),
                value: "$VERSION".into()
            },
            Directive::Prepend {
                var: "PATH".into(),
                value: "./bin".into()
            },
            Directive::Append {
                var: "NUKE_PATH".into(),
                value: "/shared/gizmos".into()
            },
            Directive::Pop {
                var: "PATH".into(),
                value: "/stale/entry".into()
            },
            Directive::Unset {
                var: "SCRATCH".into()
            },
            Directive::SubPkg {
                request: "djv-0.8".into()
            },
            Directive::Log {
                message: "loaded $NAME".into()
            },
        ]
    );
}

#[rstest]
fn test_blank_lines_and_comments_are_skipped() {
    let program = Program::parse("\n# nothing\n\n").unwrap();
    assert!(program.directives.is_empty());
}

#[rstest]
fn test_set_with_empty_value_is_allowed() {
    let program = Program::parse("set EMPTY\n").unwrap();
    assert_eq!(
        program.directives,
        vec![Directive::Set {
            var: "EMPTY".into(),
            value: String::new()
        }]
    );
}

#[rstest]
fn test_values_may_contain_spaces() {
    let program = Program::parse("set GREETING hello there\n").unwrap();
    assert_eq!(
        program.directives,
        vec![Directive::Set {
            var: "GREETING".into(),
            value: "hello there".into()
        }]
    );
}

#[rstest]
#[case("frobnicate PATH /x\n", "unknown directive")]
#[case("prepend PATH\n", "requires a value")]
#[case("pkg\n", "requires a package name")]
#[case("set\n", "requires a variable name")]
fn test_parse_errors(#[case] source: &str, #[case] needle: &str) {
    let err = Program::parse(source).unwrap_err();
    assert!(err.contains(needle), "{err:?} should mention {needle:?}");
    assert!(err.contains("line 1"));
}

#[rstest]
fn test_self_assignment_is_detected() {
    let assign = Directive::Set {
        var: "PATH".into(),
        value: "$PATH".into(),
    };
    assert!(assign.is_self_assign());
    let braced = Directive::Set {
        var: "PATH".into(),
        value: "${PATH}".into(),
    };
    assert!(braced.is_self_assign());
    let real = Directive::Set {
        var: "PATH".into(),
        value: "$OTHER".into(),
    };
    assert!(!real.is_self_assign());
}
