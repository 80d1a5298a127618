// SPDX-License-Identifier: MIT

//! The controller: a single-writer reconciliation loop owning
//! `FleetState`. Every mutation goes through `apply_action` or
//! `apply_health_tick`, both journaled before being applied, so a crash
//! mid-handling can always be replayed to the same outcome.

use crate::distributor;
use crate::health::{self, HealthVerdict};
use crate::state::FleetState;
use crate::storage::{Recovered, Snapshot, Wal};
use crate::transport::TransportAdapter;
use crate::workspace_manager::{WorkspaceManager, WorkspaceReleaseMode};
use fleet_core::{
    Clock, Event, EventKind, FleetError, Instance, InstanceId, InstanceState, Options, ResultMsg,
    Selector, Task, TaskOutcome, TaskState, TerminationMode, Verb, Workspace, WorkspaceId,
};
use fleet_core::{Action, CorrelationId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot after this many processed journal entries, then truncate the
/// journal to just the un-snapshotted tail.
const SNAPSHOT_EVERY: u64 = 500;

/// Everything one `apply_action` call needs besides the state itself.
pub struct ApplyContext<'a> {
    pub now_ms: u64,
    pub opts: &'a Options,
}

/// Apply one decoded action to `state`, returning the reply to send the
/// issuer plus any events to publish. Infallible in the sense that
/// every branch produces a `ResultMsg` — domain errors become
/// `Status::Error`, they never short-circuit the call.
pub fn apply_action(
    state: &mut FleetState,
    action: &Action,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    let cid = action.correlation_id;
    match &action.verb {
        Verb::Launch { capabilities, tags, source_ref } => {
            apply_launch(state, cid, capabilities, tags, source_ref, ctx)
        }
        Verb::Terminate { instance_id, mode } => {
            apply_terminate(state, cid, *instance_id, *mode, ctx)
        }
        Verb::Submit { spec } => apply_submit(state, cid, spec.clone(), ctx),
        Verb::Cancel { task_id } => apply_cancel(state, cid, *task_id, ctx),
        Verb::Status { selector } => apply_status(state, cid, selector, ctx),
        Verb::Heartbeat { instance_id, observed_load, progress } => {
            apply_heartbeat(state, cid, *instance_id, *observed_load, progress.clone(), ctx)
        }
        Verb::Complete { task_id, outcome } => {
            apply_complete(state, cid, *task_id, outcome.clone(), ctx)
        }
        Verb::Subscribe => (ResultMsg::ok(cid, "subscribed", vec![], ctx.now_ms), vec![]),
        Verb::Help { verb } => (ResultMsg::ok(cid, help_text(verb.as_deref()), vec![], ctx.now_ms), vec![]),
    }
}

fn help_text(verb: Option<&str>) -> String {
    match verb {
        Some(v) => format!("{v}: see protocol reference for arguments"),
        None => "available verbs: launch terminate submit cancel status heartbeat complete subscribe help".to_string(),
    }
}

fn tag_conflict(state: &FleetState, tags: &fleet_core::Tags, opts: &Options) -> Option<String> {
    use fleet_core::TagsUniqueness;
    if tags.is_empty() {
        return None;
    }
    match opts.tags_uniqueness {
        TagsUniqueness::None => None,
        TagsUniqueness::Color => {
            let color = tags.color.as_deref()?;
            state
                .live_tags()
                .any(|t| t.color.as_deref() == Some(color))
                .then(|| format!("color {color} already in use"))
        }
        TagsUniqueness::Branch => {
            let branch = tags.branch.as_deref()?;
            state
                .live_tags()
                .any(|t| t.branch.as_deref() == Some(branch))
                .then(|| format!("branch {branch} already in use"))
        }
        TagsUniqueness::All => state
            .live_tags()
            .any(|t| t == tags)
            .then(|| "identical tag set already in use".to_string()),
    }
}

fn apply_launch(
    state: &mut FleetState,
    cid: CorrelationId,
    capabilities: &[String],
    tags: &fleet_core::Tags,
    source_ref: &str,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    if state.instances.len() as u32 >= ctx.opts.fleet_max_instances {
        let err = FleetError::exhausted("fleet is at fleet.max-instances capacity");
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    }
    if let Some(reason) = tag_conflict(state, tags, ctx.opts) {
        let err = FleetError::conflict(reason);
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    }

    let workspace_id = fleet_core::WorkspaceId::new();
    let instance_id = fleet_core::InstanceId::new();

    let workspace = Workspace {
        id: workspace_id,
        root: ctx.opts.workspace_root.join(workspace_id.suffix()),
        source_ref: source_ref.to_string(),
        isolation: ctx.opts.workspace_isolation,
        owner: Some(instance_id),
        created_at_ms: ctx.now_ms,
    };

    let instance = Instance {
        id: instance_id,
        workspace_id: Some(workspace_id),
        capabilities: capabilities.iter().cloned().collect(),
        tags: tags.clone(),
        state: InstanceState::Starting,
        last_heartbeat_ms: ctx.now_ms,
        current_load: 0,
        declared_capacity: ctx.opts.task_per_instance_cap,
        consecutive_probe_failures: 0,
        last_assigned_at_ms: 0,
        created_at_ms: ctx.now_ms,
        source_ref: source_ref.to_string(),
        lost_since_ms: None,
    };

    state.workspaces.insert(workspace_id, workspace);
    state.instances.insert(instance_id, instance);

    let event = Event::new(EventKind::InstanceStateChanged, instance_id.to_string(), ctx.now_ms)
        .with_field("state", "starting")
        .with_correlation(cid);

    (
        ResultMsg::ok(cid, "instance launching", vec![("instance_id".into(), instance_id.to_string())], ctx.now_ms),
        vec![event],
    )
}

fn apply_terminate(
    state: &mut FleetState,
    cid: CorrelationId,
    instance_id: fleet_core::InstanceId,
    mode: TerminationMode,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    let Some(instance) = state.instances.get_mut(&instance_id) else {
        let err = FleetError::not_found(format!("no such instance: {instance_id}"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    };
    if instance.state.is_terminal() {
        let err = FleetError::conflict(format!("instance {instance_id} already terminated"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    }

    let mut events = Vec::new();

    match mode {
        // Force releases the workspace immediately: there is nothing to
        // drain, so the instance finalizes to `terminated` in this same
        // call (§4.1).
        TerminationMode::Force => {
            let workspace_id = instance.workspace_id;
            instance.state = InstanceState::Terminated;
            events.push(
                Event::new(EventKind::InstanceStateChanged, instance_id.to_string(), ctx.now_ms)
                    .with_field("state", InstanceState::Terminated.to_string())
                    .with_correlation(cid),
            );
            for task in state.tasks.values_mut().filter(|t| t.owner == Some(instance_id)) {
                if !task.state.is_terminal() {
                    task.state = TaskState::Pending;
                    task.owner = None;
                    events.push(
                        Event::new(EventKind::TaskNoEligibleInstance, task.id.to_string(), ctx.now_ms)
                            .with_field("reason", "owning instance force-terminated"),
                    );
                }
            }
            if let Some(workspace_id) = workspace_id {
                events.push(workspace_released_event(
                    workspace_id,
                    instance_id,
                    ctx.now_ms,
                    WorkspaceReleaseMode::Prune,
                ));
            }
            events.extend(redispatch_pending(state, ctx));
        }
        // Graceful lets in-flight tasks finish; the instance only
        // finalizes once none remain (`maybe_finalize_drain`, driven from
        // `apply_complete`/`apply_cancel`).
        TerminationMode::Graceful => {
            instance.state = InstanceState::Draining;
            events.push(
                Event::new(EventKind::InstanceStateChanged, instance_id.to_string(), ctx.now_ms)
                    .with_field("state", InstanceState::Draining.to_string())
                    .with_correlation(cid),
            );
            events.extend(maybe_finalize_drain(state, instance_id, ctx));
        }
    }

    (ResultMsg::ok(cid, "termination requested", vec![], ctx.now_ms), events)
}

fn owned_nonterminal_count(state: &FleetState, instance_id: InstanceId) -> usize {
    state.tasks.values().filter(|t| t.owner == Some(instance_id) && !t.state.is_terminal()).count()
}

fn workspace_released_event(
    workspace_id: WorkspaceId,
    instance_id: InstanceId,
    now_ms: u64,
    mode: WorkspaceReleaseMode,
) -> Event {
    Event::new(EventKind::WorkspaceReleased, workspace_id.to_string(), now_ms)
        .with_field("instance_id", instance_id.to_string())
        .with_field("release_mode", mode.to_string())
}

/// Finalize a `draining` instance once it has no more in-flight tasks
/// (§4.1 graceful termination). Called whenever a task owned by a
/// draining instance reaches a terminal state.
fn maybe_finalize_drain(state: &mut FleetState, instance_id: InstanceId, ctx: &ApplyContext) -> Vec<Event> {
    let Some(instance) = state.instances.get(&instance_id) else { return vec![] };
    if instance.state != InstanceState::Draining || owned_nonterminal_count(state, instance_id) > 0 {
        return vec![];
    }
    let workspace_id = instance.workspace_id;

    if let Some(instance) = state.instances.get_mut(&instance_id) {
        instance.state = InstanceState::Terminated;
    }
    let mut events = vec![Event::new(
        EventKind::InstanceStateChanged,
        instance_id.to_string(),
        ctx.now_ms,
    )
    .with_field("state", InstanceState::Terminated.to_string())];
    if let Some(workspace_id) = workspace_id {
        events.push(workspace_released_event(
            workspace_id,
            instance_id,
            ctx.now_ms,
            WorkspaceReleaseMode::Prune,
        ));
    }
    events
}

fn apply_submit(
    state: &mut FleetState,
    cid: CorrelationId,
    spec: fleet_core::TaskSpec,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    let task = Task::new(
        fleet_core::TaskId::new(),
        spec,
        ctx.opts.task_default_max_attempts,
        ctx.now_ms,
    );
    let task_id = task.id;
    state.tasks.insert(task.id, task);

    let (_, mut events) = try_dispatch(state, task_id, ctx);
    events.insert(
        0,
        Event::new(EventKind::TaskAssigned, task_id.to_string(), ctx.now_ms)
            .with_correlation(cid)
            .with_field("submitted", "true"),
    );
    (
        ResultMsg::ok(cid, "task submitted", vec![("task_id".into(), task_id.to_string())], ctx.now_ms),
        events,
    )
}

/// Try to assign a pending task to an eligible instance. Called right
/// after `submit`, whenever a task is returned to `pending`
/// (reassignment-on-loss, cancellation of a different task freeing
/// capacity, etc), and from the per-tick resweep (`redispatch_pending`).
///
/// A task that finds no capable instance anywhere in the fleet is kept
/// `pending` and reported via `task.no-eligible-instance`, not failed
/// outright — it only becomes `unsatisfiable` once it has sat unmet for
/// `task.unsatisfiable-wait` (§4.2).
fn try_dispatch(state: &mut FleetState, task_id: fleet_core::TaskId, ctx: &ApplyContext) -> (Option<()>, Vec<Event>) {
    let Some(task) = state.tasks.get(&task_id) else { return (None, vec![]) };
    if task.state != TaskState::Pending {
        return (None, vec![]);
    }
    let deadline_passed = task.deadline_passed(ctx.now_ms);
    let attempts_exhausted = task.attempts_exhausted();
    let required = task.required_capabilities.clone();
    let kind = task.kind.clone();
    let created_at_ms = task.created_at_ms;

    if deadline_passed {
        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.state = TaskState::Failed;
        }
        return (
            None,
            vec![Event::new(EventKind::TaskDeadlineExpired, task_id.to_string(), ctx.now_ms)],
        );
    }
    if attempts_exhausted {
        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.state = TaskState::Failed;
        }
        return (
            None,
            vec![Event::new(EventKind::TaskFailed, task_id.to_string(), ctx.now_ms)
                .with_field("reason", "attempts exhausted")],
        );
    }

    let decision = distributor::assign(
        &kind,
        &required,
        state.instances.values(),
        ctx.opts.task_per_instance_cap,
        |k, instance_id| state.failure_rate_for_kind(instance_id, k, distributor::FAILURE_RATE_WINDOW),
    );

    match decision {
        Ok(instance_id) => {
            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.record_dispatch(instance_id, ctx.now_ms);
            }
            if let Some(instance) = state.instances.get_mut(&instance_id) {
                instance.current_load += 1;
                instance.last_assigned_at_ms = ctx.now_ms;
            }
            (
                Some(()),
                vec![Event::new(EventKind::TaskAssigned, task_id.to_string(), ctx.now_ms)
                    .with_field("instance_id", instance_id.to_string())],
            )
        }
        Err(err) => {
            let waited_long_enough =
                ctx.now_ms.saturating_sub(created_at_ms) >= ctx.opts.task_unsatisfiable_wait.as_millis() as u64;
            if err.kind == fleet_core::ErrorKind::Unsatisfiable && waited_long_enough {
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.state = TaskState::Failed;
                }
                let event = err
                    .fields
                    .iter()
                    .fold(Event::new(EventKind::TaskUnsatisfiable, task_id.to_string(), ctx.now_ms), |e, (k, v)| {
                        e.with_field(k.clone(), v.clone())
                    })
                    .with_field("reason", err.message);
                (None, vec![event])
            } else {
                let event = err
                    .fields
                    .iter()
                    .fold(
                        Event::new(EventKind::TaskNoEligibleInstance, task_id.to_string(), ctx.now_ms),
                        |e, (k, v)| e.with_field(k.clone(), v.clone()),
                    )
                    .with_field("reason", err.message);
                (None, vec![event])
            }
        }
    }
}

/// Re-sweep every `pending` task and retry dispatch (§4.2: "retries on
/// the next tick or on any event that could change eligibility"). A
/// task launched before any instance was healthy, or one left pending
/// by a capacity shortage, gets another chance each time this runs.
fn redispatch_pending(state: &mut FleetState, ctx: &ApplyContext) -> Vec<Event> {
    let pending_ids: Vec<fleet_core::TaskId> = state
        .tasks
        .values()
        .filter(|t| t.state == TaskState::Pending)
        .map(|t| t.id)
        .collect();

    let mut events = Vec::new();
    for task_id in pending_ids {
        let (_, dispatch_events) = try_dispatch(state, task_id, ctx);
        events.extend(dispatch_events);
    }
    events
}

fn apply_cancel(
    state: &mut FleetState,
    cid: CorrelationId,
    task_id: fleet_core::TaskId,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    let Some(task) = state.tasks.get_mut(&task_id) else {
        let err = FleetError::not_found(format!("no such task: {task_id}"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    };
    if task.state.is_terminal() {
        let err = FleetError::cancelled(format!("task {task_id} already in a terminal state"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    }
    let had_owner = task.owner;
    task.state = TaskState::Cancelled;
    task.finalize_current_attempt(TaskOutcome::Failed("cancelled".to_string()), ctx.now_ms);

    if let Some(instance_id) = had_owner {
        if let Some(instance) = state.instances.get_mut(&instance_id) {
            instance.current_load = instance.current_load.saturating_sub(1);
        }
    }

    let mut events = vec![Event::new(EventKind::TaskCancelled, task_id.to_string(), ctx.now_ms).with_correlation(cid)];
    if let Some(instance_id) = had_owner {
        events.extend(maybe_finalize_drain(state, instance_id, ctx));
    }
    (ResultMsg::ok(cid, "task cancelled", vec![], ctx.now_ms), events)
}

fn apply_status(
    state: &FleetState,
    cid: CorrelationId,
    selector: &Selector,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    match selector {
        Selector::All => {
            let fields = vec![
                ("instances".into(), state.instances.len().to_string()),
                ("tasks".into(), state.tasks.len().to_string()),
            ];
            (ResultMsg::ok(cid, "fleet status", fields, ctx.now_ms), vec![])
        }
        Selector::Instance(id) => match state.instances.get(id.as_str()) {
            Some(instance) => (
                ResultMsg::ok(
                    cid,
                    "instance status",
                    vec![
                        ("state".into(), instance.state.to_string()),
                        ("load".into(), instance.current_load.to_string()),
                    ],
                    ctx.now_ms,
                ),
                vec![],
            ),
            None => (
                ResultMsg::error(cid, FleetError::not_found(format!("no such instance: {id}")), ctx.now_ms),
                vec![],
            ),
        },
        Selector::Task(id) => match state.tasks.get(id.as_str()) {
            Some(task) => (
                ResultMsg::ok(cid, "task status", vec![("state".into(), task.state.to_string())], ctx.now_ms),
                vec![],
            ),
            None => (
                ResultMsg::error(cid, FleetError::not_found(format!("no such task: {id}")), ctx.now_ms),
                vec![],
            ),
        },
    }
}

fn apply_heartbeat(
    state: &mut FleetState,
    cid: CorrelationId,
    instance_id: fleet_core::InstanceId,
    observed_load: u32,
    _progress: Option<String>,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    let Some(instance) = state.instances.get_mut(&instance_id) else {
        let err = FleetError::not_found(format!("no such instance: {instance_id}"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    };
    instance.last_heartbeat_ms = ctx.now_ms;
    instance.current_load = observed_load;
    instance.consecutive_probe_failures = 0;

    let mut events = Vec::new();
    if matches!(instance.state, InstanceState::Starting | InstanceState::Degraded) {
        instance.state = InstanceState::Healthy;
        instance.lost_since_ms = None;
        events.push(
            Event::new(EventKind::InstanceStateChanged, instance_id.to_string(), ctx.now_ms)
                .with_field("state", "healthy"),
        );
        // A newly-healthy instance can change eligibility for tasks that
        // were stuck pending for lack of a capable instance.
        events.extend(redispatch_pending(state, ctx));
    }

    (ResultMsg::ok(cid, "heartbeat recorded", vec![], ctx.now_ms), events)
}

fn apply_complete(
    state: &mut FleetState,
    cid: CorrelationId,
    task_id: fleet_core::TaskId,
    outcome: TaskOutcome,
    ctx: &ApplyContext,
) -> (ResultMsg, Vec<Event>) {
    let Some(task) = state.tasks.get_mut(&task_id) else {
        let err = FleetError::not_found(format!("no such task: {task_id}"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    };
    if task.state.is_terminal() {
        let err = FleetError::conflict(format!("task {task_id} already in a terminal state"));
        return (ResultMsg::error(cid, err, ctx.now_ms), vec![]);
    }

    let owner = task.owner;
    task.finalize_current_attempt(outcome.clone(), ctx.now_ms);

    if let Some(owner) = owner {
        if let Some(instance) = state.instances.get_mut(&owner) {
            instance.current_load = instance.current_load.saturating_sub(1);
        }
    }

    let mut events = Vec::new();
    match outcome {
        TaskOutcome::Completed => {
            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.state = TaskState::Completed;
            }
            events.push(Event::new(EventKind::TaskCompleted, task_id.to_string(), ctx.now_ms).with_correlation(cid));
        }
        TaskOutcome::Failed(reason) => {
            let retry = state.tasks.get(&task_id).is_some_and(|t| !t.attempts_exhausted());
            if retry {
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.state = TaskState::Pending;
                    task.owner = None;
                }
                let (_, dispatch_events) = try_dispatch(state, task_id, ctx);
                events.extend(dispatch_events);
            } else {
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.state = TaskState::Failed;
                }
                events.push(
                    Event::new(EventKind::TaskFailed, task_id.to_string(), ctx.now_ms)
                        .with_correlation(cid)
                        .with_field("reason", reason),
                );
            }
        }
    }

    if let Some(owner) = owner {
        events.extend(maybe_finalize_drain(state, owner, ctx));
    }

    (ResultMsg::ok(cid, "completion recorded", vec![], ctx.now_ms), events)
}

/// Walk every non-terminal instance and reclassify it from the age of
/// its last heartbeat (§4.4). A sustained `lost` verdict escalates to
/// `terminating` once `health.recovery-grace` has elapsed — that is
/// also when owned tasks move back to `pending` for reassignment.
/// `terminating` instances (force-terminate already finalizes
/// immediately, so only the escalation path lands here) advance to
/// `terminated` and release their workspace on the following tick.
/// Finishes with a fleet-wide resweep of every still-`pending` task, so
/// a task left unplaceable by an earlier branch gets one more chance
/// the moment this tick's transitions might have changed eligibility.
pub fn apply_health_tick(state: &mut FleetState, ctx: &ApplyContext) -> Vec<Event> {
    let mut events = Vec::new();
    let nonterminal_ids: Vec<fleet_core::InstanceId> = state
        .instances
        .values()
        .filter(|i| !i.state.is_terminal())
        .map(|i| i.id)
        .collect();

    for instance_id in nonterminal_ids {
        let Some((verdict, current, workspace_id, lost_since_ms)) =
            state.instances.get(&instance_id).map(|instance| {
                let age_ms = ctx.now_ms.saturating_sub(instance.last_heartbeat_ms);
                (health::classify(age_ms, ctx.opts), instance.state, instance.workspace_id, instance.lost_since_ms)
            })
        else {
            continue;
        };

        let lost_elapsed_ms = if verdict == HealthVerdict::Lost {
            let since = lost_since_ms.unwrap_or(ctx.now_ms);
            if let Some(instance) = state.instances.get_mut(&instance_id) {
                instance.lost_since_ms = Some(since);
            }
            Some(ctx.now_ms.saturating_sub(since))
        } else {
            if let Some(instance) = state.instances.get_mut(&instance_id) {
                instance.lost_since_ms = None;
            }
            None
        };

        let next = health::next_state(current, verdict, lost_elapsed_ms, ctx.opts.health_recovery_grace);
        if next == current {
            continue;
        }

        if let Some(instance) = state.instances.get_mut(&instance_id) {
            instance.state = next;
            if verdict == HealthVerdict::Stale {
                instance.consecutive_probe_failures += 1;
            }
        }
        events.push(
            Event::new(EventKind::HealthTransition, instance_id.to_string(), ctx.now_ms)
                .with_field("from", current.to_string())
                .with_field("to", next.to_string()),
        );

        if next == InstanceState::Terminating {
            for task in state.tasks.values_mut().filter(|t| t.owner == Some(instance_id)) {
                if !task.state.is_terminal() {
                    task.state = TaskState::Pending;
                    task.owner = None;
                }
            }
        }

        if next == InstanceState::Terminated {
            let mode = if ctx.opts.workspace_retain_on_failure {
                WorkspaceReleaseMode::Retain
            } else {
                WorkspaceReleaseMode::Prune
            };
            if let Some(workspace_id) = workspace_id {
                events.push(workspace_released_event(workspace_id, instance_id, ctx.now_ms, mode));
            }
        }
    }

    events.extend(redispatch_pending(state, ctx));
    events
}

/// Owns the materialized state and drives the action/health loop.
pub struct Controller<C: Clock> {
    pub state: FleetState,
    pub wal: Wal,
    pub opts: Options,
    pub clock: C,
    pub workspace_manager: Arc<dyn WorkspaceManager>,
    pub transport: Arc<dyn TransportAdapter>,
    pub snapshot_path: PathBuf,
    last_snapshot_seq: u64,
}

impl<C: Clock> Controller<C> {
    pub fn from_recovery(
        recovered: Recovered,
        opts: Options,
        clock: C,
        workspace_manager: Arc<dyn WorkspaceManager>,
        transport: Arc<dyn TransportAdapter>,
        snapshot_path: PathBuf,
    ) -> Self {
        let mut state = recovered.state;
        let now_ms = clock.epoch_ms();
        for entry in &recovered.unapplied {
            let ctx = ApplyContext { now_ms, opts: &opts };
            let (_, _events) = apply_action(&mut state, &entry.action, &ctx);
        }
        let last_snapshot_seq = recovered.wal.processed_seq();
        Self {
            state,
            wal: recovered.wal,
            opts,
            clock,
            workspace_manager,
            transport,
            snapshot_path,
            last_snapshot_seq,
        }
    }

    /// Run forever: take the next inbound action, journal it, apply it,
    /// reply, publish events, and provision/clean up workspaces for any
    /// instance whose state changed as a side effect.
    pub async fn run(&mut self) {
        let mut health_tick = tokio::time::interval(self.opts.health_probe_interval);
        loop {
            tokio::select! {
                inbound = self.transport.receive() => {
                    let Some(inbound) = inbound else { break };
                    self.handle_inbound(inbound).await;
                }
                _ = health_tick.tick() => {
                    self.handle_health_tick().await;
                }
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: crate::transport::Inbound) {
        let now_ms = self.clock.epoch_ms();
        if let Err(e) = self.wal.append(&inbound.action, now_ms) {
            warn!(error = %e, "failed to journal action");
        }
        if self.wal.needs_flush() {
            let _ = self.wal.flush();
        }

        let ctx = ApplyContext { now_ms, opts: &self.opts };
        let (result, events) = apply_action(&mut self.state, &inbound.action, &ctx);
        self.wal.mark_processed(self.wal.write_seq());

        info!(verb = inbound.action.verb.name(), status = ?result.status, "action applied");
        self.transport.reply(&inbound.reply_token, &result).await;
        self.publish_events(&events).await;

        if let Verb::Launch { .. } = &inbound.action.verb {
            self.provision_newest_workspace().await;
        }

        self.maybe_snapshot(now_ms);
    }

    /// Publish every event and, for any `workspace.released`, run the
    /// matching filesystem cleanup — shared by the action path (force
    /// terminate, graceful drain completion) and the health-tick path
    /// (lost-instance escalation), which both now produce this event.
    async fn publish_events(&mut self, events: &[Event]) {
        for event in events {
            self.transport.publish(event).await;
            if event.kind == EventKind::WorkspaceReleased {
                let mode = event
                    .fields
                    .iter()
                    .find(|(k, _)| k == "release_mode")
                    .map(|(_, v)| v.as_str());
                let mode = if mode == Some("retain") { WorkspaceReleaseMode::Retain } else { WorkspaceReleaseMode::Prune };
                self.cleanup_released_workspace(&event.subject, mode).await;
            }
        }
    }

    /// Snapshot and truncate the journal once enough entries have been
    /// processed since the last one, so the journal replayed on restart
    /// stays bounded.
    fn maybe_snapshot(&mut self, now_ms: u64) {
        let processed = self.wal.processed_seq();
        if processed < self.last_snapshot_seq + SNAPSHOT_EVERY {
            return;
        }
        let snapshot = Snapshot::new(processed, self.state.clone(), now_ms);
        if let Err(e) = snapshot.save(&self.snapshot_path) {
            warn!(error = %e, "failed to save snapshot");
            return;
        }
        if let Err(e) = self.wal.truncate_before(processed + 1) {
            warn!(error = %e, "failed to truncate journal after snapshot");
            return;
        }
        self.last_snapshot_seq = processed;
    }

    async fn handle_health_tick(&mut self) {
        let now_ms = self.clock.epoch_ms();
        let ctx = ApplyContext { now_ms, opts: &self.opts };
        let events = apply_health_tick(&mut self.state, &ctx);
        self.publish_events(&events).await;
    }

    async fn provision_newest_workspace(&mut self) {
        let Some(workspace) = self
            .state
            .workspaces
            .values()
            .max_by_key(|w| w.created_at_ms)
            .cloned()
        else {
            return;
        };
        match self.workspace_manager.provision(&workspace).await {
            Ok(()) => {}
            Err(e) => {
                warn!(workspace_id = %workspace.id, error = %e, "workspace provisioning failed");
                if let Some(owner) = workspace.owner {
                    if let Some(instance) = self.state.instances.get_mut(&owner) {
                        instance.state = InstanceState::Terminated;
                    }
                }
            }
        }
    }

    async fn cleanup_released_workspace(&mut self, workspace_id: &str, mode: WorkspaceReleaseMode) {
        let Some(workspace) = self.state.workspaces.get(workspace_id).cloned() else {
            return;
        };
        self.workspace_manager.release(&workspace, mode).await;
        if mode == WorkspaceReleaseMode::Prune {
            self.state.workspaces.remove(&workspace.id);
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
