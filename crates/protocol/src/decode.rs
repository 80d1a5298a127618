// SPDX-License-Identifier: MIT

//! Decoding a wire line into a typed [`fleet_core::Action`] (§4.5).

use crate::alias;
use crate::error::DecodeError;
use crate::lexer::{self, Word};
use fleet_core::{
    Action, FleetError, InstanceId, Selector, Tags, TaskId, TaskOutcome, TaskSpec,
    TerminationMode, Verb,
};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Decode a single line from `issuer` into an [`Action`].
///
/// Never panics. Every failure mode — malformed quoting, an unknown verb,
/// a verb resolving to more than one canonical candidate, a missing or
/// malformed flag — comes back as a [`DecodeError`] carrying the offset
/// of the token responsible.
pub fn decode(line: &str, issuer: impl Into<String>) -> Result<Action, DecodeError> {
    let words = lexer::lex(line)
        .map_err(|e| DecodeError::new(e.offset, FleetError::invalid_syntax(e.message)))?;

    let mut iter = words.into_iter();
    let verb_word = iter
        .next()
        .ok_or_else(|| DecodeError::new(0, FleetError::invalid_syntax("empty command")))?;

    let candidates = alias::resolve(&verb_word.text).ok_or_else(|| {
        DecodeError::new(
            verb_word.offset,
            FleetError::invalid_syntax(format!("unknown verb: {}", verb_word.text)),
        )
    })?;
    if candidates.len() > 1 {
        return Err(DecodeError::new(
            verb_word.offset,
            FleetError::new(
                fleet_core::ErrorKind::InvalidSyntax,
                format!("ambiguous command {:?}: could mean {:?}", verb_word.text, candidates),
            ),
        ));
    }
    let canonical = candidates[0];

    let rest: Vec<Word> = iter.collect();
    let (positionals, flags) = split_args(rest)?;
    let at = verb_word.offset;

    let verb = match canonical {
        "launch" => decode_launch(&flags, at)?,
        "terminate" => decode_terminate(&positionals, &flags, at)?,
        "submit" => decode_submit(&flags, at)?,
        "cancel" => decode_cancel(&positionals, at)?,
        "status" => decode_status(&flags, at)?,
        "heartbeat" => decode_heartbeat(&positionals, &flags, at)?,
        "complete" => decode_complete(&positionals, &flags, at)?,
        "subscribe" => Verb::Subscribe,
        "help" => Verb::Help { verb: positionals.first().map(|w| w.text.clone()) },
        other => {
            return Err(DecodeError::new(
                at,
                FleetError::internal(format!("unreachable canonical verb: {other}")),
            ))
        }
    };

    Ok(Action::new(issuer, verb))
}

struct Flags(HashMap<String, (String, usize)>);

impl Flags {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|(v, _)| v.as_str())
    }

    fn offset_or(&self, key: &str, fallback: usize) -> usize {
        self.0.get(key).map(|(_, o)| *o).unwrap_or(fallback)
    }

    fn require<'a>(&'a self, key: &str, at: usize) -> Result<&'a str, DecodeError> {
        self.get(key).ok_or_else(|| {
            DecodeError::new(at, FleetError::invalid_argument(format!("missing required flag --{key}")))
        })
    }
}

/// Split the words following the verb into positionals and `--key=value`
/// (or bare boolean `--key`) flags. A bare flag's value is `"true"`.
fn split_args(words: Vec<Word>) -> Result<(Vec<Word>, Flags), DecodeError> {
    let mut positionals = Vec::new();
    let mut flags = HashMap::new();
    for word in words {
        if let Some(rest) = word.text.strip_prefix("--") {
            if rest.is_empty() {
                return Err(DecodeError::new(
                    word.offset,
                    FleetError::invalid_syntax("bare `--` is not a valid flag"),
                ));
            }
            match rest.split_once('=') {
                Some((key, value)) => {
                    flags.insert(key.to_string(), (value.to_string(), word.offset));
                }
                None => {
                    flags.insert(rest.to_string(), ("true".to_string(), word.offset));
                }
            }
        } else {
            positionals.push(word);
        }
    }
    Ok((positionals, Flags(flags)))
}

fn split_csv(s: &str) -> BTreeSet<String> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn require_positional<'a>(positionals: &'a [Word], what: &str, at: usize) -> Result<&'a Word, DecodeError> {
    positionals
        .first()
        .ok_or_else(|| DecodeError::new(at, FleetError::invalid_argument(format!("missing {what}"))))
}

fn parse_flag<T: FromStr>(flags: &Flags, key: &str, at: usize) -> Result<T, DecodeError> {
    let raw = flags.require(key, at)?;
    raw.parse::<T>().map_err(|_| {
        DecodeError::new(
            flags.offset_or(key, at),
            FleetError::invalid_argument(format!("flag --{key} has invalid value: {raw}")),
        )
    })
}

fn decode_launch(flags: &Flags, at: usize) -> Result<Verb, DecodeError> {
    let capabilities = flags.get("capabilities").map(split_csv).unwrap_or_default().into_iter().collect();
    let tags = Tags {
        color: flags.get("color").map(str::to_string),
        branch: flags.get("branch").map(str::to_string),
    };
    let source_ref = flags.require("source-ref", at)?.to_string();
    Ok(Verb::Launch { capabilities, tags, source_ref })
}

fn decode_terminate(positionals: &[Word], flags: &Flags, at: usize) -> Result<Verb, DecodeError> {
    let id_word = require_positional(positionals, "instance id", at)?;
    let mode = match flags.get("mode") {
        Some(raw) => TerminationMode::from_str(raw).map_err(|msg| {
            DecodeError::new(flags.offset_or("mode", at), FleetError::invalid_argument(msg))
        })?,
        None => TerminationMode::Graceful,
    };
    Ok(Verb::Terminate { instance_id: InstanceId::from_string(&id_word.text), mode })
}

fn decode_submit(flags: &Flags, at: usize) -> Result<Verb, DecodeError> {
    let kind = flags.require("kind", at)?.to_string();
    let payload = flags.get("payload").unwrap_or("").to_string();
    let required_capabilities = flags.get("required-capabilities").map(split_csv).unwrap_or_default();
    let max_attempts = match flags.get("max-attempts") {
        Some(_) => Some(parse_flag::<u32>(flags, "max-attempts", at)?),
        None => None,
    };
    let deadline_ms = match flags.get("deadline-ms") {
        Some(_) => Some(parse_flag::<u64>(flags, "deadline-ms", at)?),
        None => None,
    };
    Ok(Verb::Submit { spec: TaskSpec { kind, payload, required_capabilities, max_attempts, deadline_ms } })
}

fn decode_cancel(positionals: &[Word], at: usize) -> Result<Verb, DecodeError> {
    let id_word = require_positional(positionals, "task id", at)?;
    Ok(Verb::Cancel { task_id: TaskId::from_string(&id_word.text) })
}

fn decode_status(flags: &Flags, at: usize) -> Result<Verb, DecodeError> {
    let instance = flags.get("instance");
    let task = flags.get("task");
    let selector = match (instance, task) {
        (Some(_), Some(_)) => {
            return Err(DecodeError::new(
                at,
                FleetError::invalid_argument("status accepts at most one of --instance or --task"),
            ))
        }
        (Some(id), None) => Selector::Instance(id.to_string()),
        (None, Some(id)) => Selector::Task(id.to_string()),
        (None, None) => Selector::All,
    };
    Ok(Verb::Status { selector })
}

fn decode_heartbeat(positionals: &[Word], flags: &Flags, at: usize) -> Result<Verb, DecodeError> {
    let id_word = require_positional(positionals, "instance id", at)?;
    let observed_load = parse_flag::<u32>(flags, "load", at)?;
    let progress = flags.get("progress").map(str::to_string);
    Ok(Verb::Heartbeat {
        instance_id: InstanceId::from_string(&id_word.text),
        observed_load,
        progress,
    })
}

fn decode_complete(positionals: &[Word], flags: &Flags, at: usize) -> Result<Verb, DecodeError> {
    let id_word = require_positional(positionals, "task id", at)?;
    let raw = flags.require("outcome", at)?;
    let outcome = match raw.split_once(':') {
        Some(("failed", message)) => TaskOutcome::Failed(message.to_string()),
        _ if raw == "completed" => TaskOutcome::Completed,
        _ if raw == "failed" => TaskOutcome::Failed(String::new()),
        _ => {
            return Err(DecodeError::new(
                flags.offset_or("outcome", at),
                FleetError::invalid_argument(format!("unknown outcome: {raw}")),
            ))
        }
    };
    Ok(Verb::Complete { task_id: TaskId::from_string(&id_word.text), outcome })
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
