//! Unit tests for the command seam.

use super::*;
use rstest::rstest;

#[rstest]
#[case(Some(0), true)]
#[case(Some(1), false)]
#[case(None, false)]
fn is_success_requires_zero_exit(#[case] code: Option<i32>, #[case] expected: bool) {
    let output = CommandOutput {
        code,
        stdout: String::new(),
        stderr: String::new(),
    };
    assert_eq!(output.is_success(), expected);
}

#[test]
fn status_text_reports_unknown_without_code() {
    assert_eq!(status_text(None), "unknown");
    assert_eq!(status_text(Some(128)), "128");
}

#[test]
fn process_runner_reports_spawn_failure() {
    let err = ProcessCommandRunner
        .run("berth-definitely-missing-binary", &[])
        .expect_err("missing binary should fail to spawn");
    let CommandError::Spawn { program, .. } = err;
    assert_eq!(program, "berth-definitely-missing-binary");
}
