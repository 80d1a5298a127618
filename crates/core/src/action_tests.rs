// SPDX-License-Identifier: MIT

use super::*;
use std::str::FromStr;

#[test]
fn verb_name_matches_canonical_set() {
    let verb = Verb::Subscribe;
    assert!(CANONICAL_VERBS.contains(&verb.name()));
}

#[test]
fn termination_mode_parses_known_values_only() {
    assert_eq!(TerminationMode::from_str("graceful").unwrap(), TerminationMode::Graceful);
    assert_eq!(TerminationMode::from_str("force").unwrap(), TerminationMode::Force);
    assert!(TerminationMode::from_str("nuke").is_err());
}

#[test]
fn new_action_generates_unique_correlation_id() {
    let a = Action::new("operator", Verb::Subscribe);
    let b = Action::new("operator", Verb::Subscribe);
    assert_ne!(a.correlation_id, b.correlation_id);
}
