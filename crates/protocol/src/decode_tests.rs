// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::ErrorKind;

#[test]
fn decodes_submit_with_quoted_payload() {
    let action =
        decode(r#"submit --kind=build --payload="a b" --required-capabilities=build,linux --max-attempts=2"#, "op")
            .unwrap();
    match action.verb {
        Verb::Submit { spec } => {
            assert_eq!(spec.kind, "build");
            assert_eq!(spec.payload, "a b");
            assert_eq!(spec.required_capabilities.len(), 2);
            assert_eq!(spec.max_attempts, Some(2));
            assert_eq!(spec.deadline_ms, None);
        }
        other => panic!("expected Submit, got {other:?}"),
    }
}

#[test]
fn resolves_known_alias() {
    let action = decode("run --kind=build", "op").unwrap();
    assert_eq!(action.verb.name(), "submit");
}

#[test]
fn ambiguous_alias_is_invalid_syntax() {
    let err = decode("close ins-abc", "op").unwrap_err();
    assert_eq!(err.source.kind, ErrorKind::InvalidSyntax);
}

#[test]
fn unknown_verb_is_invalid_syntax() {
    let err = decode("frobnicate", "op").unwrap_err();
    assert_eq!(err.source.kind, ErrorKind::InvalidSyntax);
}

#[test]
fn empty_line_is_invalid_syntax() {
    let err = decode("   ", "op").unwrap_err();
    assert_eq!(err.source.kind, ErrorKind::InvalidSyntax);
}

#[test]
fn missing_required_flag_is_invalid_argument() {
    let err = decode("submit --payload=x", "op").unwrap_err();
    assert_eq!(err.source.kind, ErrorKind::InvalidArgument);
}

#[test]
fn malformed_numeric_flag_is_invalid_argument() {
    let err = decode("heartbeat ins-abc --load=not-a-number", "op").unwrap_err();
    assert_eq!(err.source.kind, ErrorKind::InvalidArgument);
}

#[test]
fn status_with_both_selectors_is_invalid_argument() {
    let err = decode("status --instance=ins-abc --task=tsk-xyz", "op").unwrap_err();
    assert_eq!(err.source.kind, ErrorKind::InvalidArgument);
}

#[test]
fn status_with_no_selector_defaults_to_all() {
    let action = decode("status", "op").unwrap();
    match action.verb {
        Verb::Status { selector } => assert_eq!(selector, Selector::All),
        other => panic!("expected Status, got {other:?}"),
    }
}

#[test]
fn terminate_defaults_to_graceful_mode() {
    let action = decode("terminate ins-abc", "op").unwrap();
    match action.verb {
        Verb::Terminate { mode, .. } => assert_eq!(mode, TerminationMode::Graceful),
        other => panic!("expected Terminate, got {other:?}"),
    }
}

#[test]
fn complete_with_failed_outcome_carries_message() {
    let action = decode(r#"complete tsk-abc --outcome="failed:disk full""#, "op").unwrap();
    match action.verb {
        Verb::Complete { outcome, .. } => {
            assert_eq!(outcome, TaskOutcome::Failed("disk full".to_string()))
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[test]
fn help_with_no_argument_has_no_verb() {
    let action = decode("help", "op").unwrap();
    match action.verb {
        Verb::Help { verb } => assert_eq!(verb, None),
        other => panic!("expected Help, got {other:?}"),
    }
}

#[test]
fn help_with_argument_names_the_verb() {
    let action = decode("help launch", "op").unwrap();
    match action.verb {
        Verb::Help { verb } => assert_eq!(verb, Some("launch".to_string())),
        other => panic!("expected Help, got {other:?}"),
    }
}
