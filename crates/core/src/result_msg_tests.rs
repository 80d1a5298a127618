// SPDX-License-Identifier: MIT

use super::*;
use crate::error::ErrorKind;

#[test]
fn partial_results_are_not_terminal() {
    let msg = ResultMsg::partial(CorrelationId::new(), "still going", vec![], 0);
    assert!(!msg.is_terminal());
    assert!(!msg.is_error());
}

#[test]
fn ok_and_error_are_terminal() {
    let ok = ResultMsg::ok(CorrelationId::new(), "done", vec![], 0);
    assert!(ok.is_terminal());
    let err = ResultMsg::error(CorrelationId::new(), FleetError::not_found("nope"), 0);
    assert!(err.is_terminal());
    assert!(err.is_error());
}

#[test]
fn error_result_inherits_fields_and_message() {
    let error = FleetError::unsatisfiable("no instance").with_field("unmet", "gpu");
    let msg = ResultMsg::error(CorrelationId::new(), error, 0);
    assert_eq!(msg.message, "no instance");
    assert_eq!(msg.fields, vec![("unmet".to_string(), "gpu".to_string())]);
    match msg.status {
        Status::Error(e) => assert_eq!(e.kind, ErrorKind::Unsatisfiable),
        _ => panic!("expected Error status"),
    }
}
