// SPDX-License-Identifier: MIT

//! Configuration loading: `FLEET_*` environment variables override a
//! TOML file, which overrides the schema defaults in
//! `fleet_core::config`. Any key present in the file or environment
//! that isn't in `OPTION_KEYS` is a startup error — typos should fail
//! loudly, not silently apply a default.

use fleet_core::config::parse_duration;
use fleet_core::{FleetError, IsolationMode, Options, TagsUniqueness, TransportKind, OPTION_KEYS};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// `fleet.max-instances` -> `FLEET_FLEET_MAX_INSTANCES`.
fn env_var_name(key: &str) -> String {
    format!("FLEET_{}", key.to_uppercase().replace(['.', '-'], "_"))
}

fn flatten_toml(value: &toml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (k, v) in table {
                let key = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                flatten_toml(v, &key, out);
            }
        }
        toml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        toml::Value::Integer(i) => {
            out.insert(prefix.to_string(), i.to_string());
        }
        toml::Value::Boolean(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Load options from (in increasing priority) the defaults, an optional
/// TOML file at `config_path`, then `FLEET_*` environment variables.
pub fn load(config_path: Option<&Path>) -> Result<Options, FleetError> {
    let mut raw: HashMap<String, String> = HashMap::new();

    if let Some(path) = config_path {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FleetError::invalid_argument(format!("reading config file: {e}")))?;
        let value: toml::Value = toml::from_str(&text)
            .map_err(|e| FleetError::invalid_argument(format!("parsing config file: {e}")))?;
        flatten_toml(&value, "", &mut raw);
    }

    for key in OPTION_KEYS {
        if let Ok(val) = std::env::var(env_var_name(key)) {
            raw.insert(key.to_string(), val);
        }
    }

    for key in raw.keys() {
        if !OPTION_KEYS.contains(&key.as_str()) {
            return Err(FleetError::invalid_argument(format!("unknown configuration key: {key}")));
        }
    }

    build(raw)
}

fn parse_required<T, E: std::fmt::Display>(
    raw: &HashMap<String, String>,
    key: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, FleetError> {
    let value = raw
        .get(key)
        .ok_or_else(|| FleetError::invalid_argument(format!("missing required option: {key}")))?;
    parse(value).map_err(|e| FleetError::invalid_argument(format!("{key}: {e}")))
}

fn parse_optional<T, E: std::fmt::Display>(
    raw: &HashMap<String, String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, FleetError> {
    match raw.get(key) {
        Some(value) => parse(value).map_err(|e| FleetError::invalid_argument(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

fn build(raw: HashMap<String, String>) -> Result<Options, FleetError> {
    let defaults = Options::defaults();

    Ok(Options {
        fleet_max_instances: parse_optional(
            &raw,
            "fleet.max-instances",
            defaults.fleet_max_instances,
            |s| s.parse::<u32>(),
        )?,
        task_default_max_attempts: parse_optional(
            &raw,
            "task.default-max-attempts",
            defaults.task_default_max_attempts,
            |s| s.parse::<u32>(),
        )?,
        task_per_instance_cap: parse_optional(
            &raw,
            "task.per-instance-cap",
            defaults.task_per_instance_cap,
            |s| s.parse::<u32>(),
        )?,
        task_unsatisfiable_wait: parse_optional(
            &raw,
            "task.unsatisfiable-wait",
            defaults.task_unsatisfiable_wait,
            |s| parse_duration(s),
        )?,
        health_fresh_window: parse_optional(
            &raw,
            "health.fresh-window",
            defaults.health_fresh_window,
            |s| parse_duration(s),
        )?,
        health_stale_window: parse_optional(
            &raw,
            "health.stale-window",
            defaults.health_stale_window,
            |s| parse_duration(s),
        )?,
        health_probe_interval: parse_optional(
            &raw,
            "health.probe-interval",
            defaults.health_probe_interval,
            |s| parse_duration(s),
        )?,
        health_probe_deadline: parse_optional(
            &raw,
            "health.probe-deadline",
            defaults.health_probe_deadline,
            |s| parse_duration(s),
        )?,
        health_recovery_grace: parse_optional(
            &raw,
            "health.recovery-grace",
            defaults.health_recovery_grace,
            |s| parse_duration(s),
        )?,
        workspace_root: parse_required(&raw, "workspace.root", |s| {
            Ok::<PathBuf, std::convert::Infallible>(PathBuf::from(s))
        })?,
        workspace_isolation: parse_optional(
            &raw,
            "workspace.isolation",
            defaults.workspace_isolation,
            |s| s.parse::<IsolationMode>(),
        )?,
        workspace_retain_on_failure: parse_optional(
            &raw,
            "workspace.retain-on-failure",
            defaults.workspace_retain_on_failure,
            |s| s.parse::<bool>(),
        )?,
        transport_kind: parse_optional(&raw, "transport.kind", defaults.transport_kind, |s| {
            s.parse::<TransportKind>()
        })?,
        transport_file_inbox: optional_path(&raw, "transport.file.inbox"),
        transport_file_outbox: optional_path(&raw, "transport.file.outbox"),
        transport_file_events: optional_path(&raw, "transport.file.events"),
        journal_path: parse_required(&raw, "journal.path", |s| {
            Ok::<PathBuf, std::convert::Infallible>(PathBuf::from(s))
        })?,
        tags_uniqueness: parse_optional(
            &raw,
            "tags.uniqueness",
            defaults.tags_uniqueness,
            |s| s.parse::<TagsUniqueness>(),
        )?,
    })
}

fn optional_path(raw: &HashMap<String, String>, key: &str) -> Option<PathBuf> {
    raw.get(key).map(PathBuf::from)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
