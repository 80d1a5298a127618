// SPDX-License-Identifier: MIT

//! Encoding typed values back onto the wire (§4.5).
//!
//! `encode_action` is the inverse of [`crate::decode::decode`], used both
//! to relay actions across the file-drop transport and to exercise the
//! round-trip law `decode(encode(decode(line))) == decode(line)`.
//! `encode_result`/`encode_event` render the reply and notification sides.

use fleet_core::{Action, Event, ResultMsg, Selector, Status, TaskOutcome, Verb};

/// Quote `s` if it contains whitespace or a quote character, escaping
/// embedded double quotes and backslashes.
fn quote_if_needed(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\') {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for ch in s.chars() {
            if ch == '"' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push('"');
        out
    } else {
        s.to_string()
    }
}

fn flag(key: &str, value: &str) -> String {
    format!("--{key}={}", quote_if_needed(value))
}

/// Render an [`Action`] back onto the wire, dropping the correlation id and
/// issuer — those are transport-level metadata, not part of the command text.
pub fn encode_action(action: &Action) -> String {
    let mut parts = vec![action.verb.name().to_string()];
    match &action.verb {
        Verb::Launch { capabilities, tags, source_ref } => {
            if !capabilities.is_empty() {
                parts.push(flag("capabilities", &capabilities.join(",")));
            }
            if let Some(color) = &tags.color {
                parts.push(flag("color", color));
            }
            if let Some(branch) = &tags.branch {
                parts.push(flag("branch", branch));
            }
            parts.push(flag("source-ref", source_ref));
        }
        Verb::Terminate { instance_id, mode } => {
            parts.push(instance_id.as_str().to_string());
            parts.push(flag("mode", &mode.to_string()));
        }
        Verb::Submit { spec } => {
            parts.push(flag("kind", &spec.kind));
            parts.push(flag("payload", &spec.payload));
            if !spec.required_capabilities.is_empty() {
                let joined = spec.required_capabilities.iter().cloned().collect::<Vec<_>>().join(",");
                parts.push(flag("required-capabilities", &joined));
            }
            if let Some(max_attempts) = spec.max_attempts {
                parts.push(flag("max-attempts", &max_attempts.to_string()));
            }
            if let Some(deadline_ms) = spec.deadline_ms {
                parts.push(flag("deadline-ms", &deadline_ms.to_string()));
            }
        }
        Verb::Cancel { task_id } => {
            parts.push(task_id.as_str().to_string());
        }
        Verb::Status { selector } => match selector {
            Selector::All => {}
            Selector::Instance(id) => parts.push(flag("instance", id)),
            Selector::Task(id) => parts.push(flag("task", id)),
        },
        Verb::Heartbeat { instance_id, observed_load, progress } => {
            parts.push(instance_id.as_str().to_string());
            parts.push(flag("load", &observed_load.to_string()));
            if let Some(progress) = progress {
                parts.push(flag("progress", progress));
            }
        }
        Verb::Complete { task_id, outcome } => {
            parts.push(task_id.as_str().to_string());
            let rendered = match outcome {
                TaskOutcome::Completed => "completed".to_string(),
                TaskOutcome::Failed(message) if message.is_empty() => "failed".to_string(),
                TaskOutcome::Failed(message) => format!("failed:{message}"),
            };
            parts.push(flag("outcome", &rendered));
        }
        Verb::Subscribe => {}
        Verb::Help { verb } => {
            if let Some(verb) = verb {
                parts.push(verb.clone());
            }
        }
    }
    parts.join(" ")
}

fn encode_fields(fields: &[(String, String)]) -> String {
    fields.iter().map(|(k, v)| format!(" {k}={}", quote_if_needed(v))).collect()
}

/// Render a [`ResultMsg`] as a single `OK`/`ERR`/`PARTIAL` reply line.
pub fn encode_result(msg: &ResultMsg) -> String {
    match &msg.status {
        Status::Ok => {
            format!("OK {} {}{}", msg.correlation_id, quote_if_needed(&msg.message), encode_fields(&msg.fields))
        }
        Status::Partial => {
            format!(
                "PARTIAL {} {}{}",
                msg.correlation_id,
                quote_if_needed(&msg.message),
                encode_fields(&msg.fields)
            )
        }
        Status::Error(error) => {
            format!(
                "ERR {} {} {}{}",
                msg.correlation_id,
                error.kind,
                quote_if_needed(&msg.message),
                encode_fields(&msg.fields)
            )
        }
    }
}

/// Render an [`Event`] as a single `EVENT` notification line.
pub fn encode_event(event: &Event) -> String {
    let mut line = format!("EVENT {} {}{}", event.kind, quote_if_needed(&event.subject), encode_fields(&event.fields));
    if let Some(correlation_id) = &event.correlation_id {
        line.push_str(&format!(" correlation={correlation_id}"));
    }
    line
}

#[cfg(test)]
#[path = "encode_tests.rs"]
mod tests;
