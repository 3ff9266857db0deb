//! Migration orchestrator: moves routers between agents.
//!
//! Given the agent list from the control plane, the orchestrator works
//! out which routers must move:
//! 1. `migrate`: everything on dead agents goes to live ones
//! 2. `evacuate`: everything on one host goes to the other live hosts
//! 3. `rebalance`: routers flow from the busiest to the idlest agent
//!
//! Each move is detach, optional drain wait, attach, with a listing
//! after each step to confirm the control plane did what it said. A
//! router that fails to land after being detached is put back on its
//! source agent so a later run can find it again.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use l3ha_core::control_plane::schedulable_router_ids;
use l3ha_core::{Agent, ControlPlane, L3_AGENT_TYPE, PortQuery};
use l3ha_placement::{AgentPicker, PickerConfig, PickerError, RouterFilter};

use crate::error::{MigrateError, MigrateResult};
use crate::retry::{RetryPolicy, WaitError};

/// How long `migrate` keeps re-checking dead agents before acting.
pub const DEFAULT_TAKEOVER_DELAY: Duration = Duration::from_secs(45);

/// Everything a run needs to know up front.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Agent type whose routers are managed.
    pub agent_type: String,
    pub picker: PickerConfig,
    pub filter: RouterFilter,
    /// Bounds the drain wait and the wait-for-router poll.
    pub drain: RetryPolicy,
    /// Re-listing of agents before `migrate` acts, unless `now` is set.
    pub takeover: RetryPolicy,
    /// Log moves instead of performing them.
    pub noop: bool,
    /// After attaching, wait for ports and floating IPs to be ACTIVE.
    pub wait_for_router: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            agent_type: L3_AGENT_TYPE.to_string(),
            picker: PickerConfig::default(),
            filter: RouterFilter::All,
            drain: RetryPolicy::default(),
            takeover: RetryPolicy::fixed(DEFAULT_TAKEOVER_DELAY.as_secs() as u32, Duration::from_secs(1)),
            noop: false,
            wait_for_router: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Work done, or nothing to do.
    Success,
    /// The run could not proceed.
    Failure,
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunStatus,
    pub moved: usize,
    pub failed: usize,
    /// Routers left in place because no destination was available.
    pub skipped: usize,
    /// Routers detached and then hosted by no agent at all. These need
    /// scheduling by hand.
    pub orphaned: Vec<String>,
}

impl RunReport {
    fn success() -> Self {
        Self {
            status: RunStatus::Success,
            moved: 0,
            failed: 0,
            skipped: 0,
            orphaned: Vec::new(),
        }
    }

    fn failure() -> Self {
        Self {
            status: RunStatus::Failure,
            ..Self::success()
        }
    }

    /// Process exit code: 0 on success, 1 on failure.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
        }
    }

    fn record_failure(&mut self, router_id: &str, error: &MigrateError) {
        self.failed += 1;
        if matches!(error, MigrateError::Stranded { .. }) {
            self.orphaned.push(router_id.to_string());
        }
    }

    fn log_orphans(&self) {
        if !self.orphaned.is_empty() {
            error!(routers = ?self.orphaned, "routers are not hosted by any agent");
        }
    }

    fn absorb(&mut self, other: RunReport) {
        self.moved += other.moved;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.orphaned.extend(other.orphaned);
        if other.status == RunStatus::Failure {
            self.status = RunStatus::Failure;
        }
    }
}

/// How a batch treats each router before moving it.
#[derive(Debug, Clone, Copy)]
struct BatchMode {
    drain: bool,
    log_floating_ips: bool,
}

pub struct MigrationOrchestrator<'a, C: ControlPlane + ?Sized> {
    control_plane: &'a C,
    settings: MigrationSettings,
    picker: AgentPicker,
}

impl<'a, C: ControlPlane + ?Sized> MigrationOrchestrator<'a, C> {
    pub fn new(control_plane: &'a C, settings: MigrationSettings) -> Self {
        let picker = settings.picker.build();
        Self {
            control_plane,
            settings,
            picker,
        }
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Move every router off dead agents onto live ones.
    ///
    /// With `now` unset, the dead agents are watched for the takeover
    /// delay first and nothing moves if one of them comes back. Each
    /// router's ports must then drain from the dead host before it is
    /// attached elsewhere.
    pub fn migrate(&mut self, now: bool) -> RunReport {
        let Some(agents) = self.list_agents() else {
            return RunReport::failure();
        };
        let dead: Vec<Agent> = agents.iter().filter(|a| a.is_dead()).cloned().collect();
        let alive: Vec<Agent> = agents
            .iter()
            .filter(|a| a.is_eligible_destination())
            .cloned()
            .collect();
        info!(
            dead = dead.len(),
            alive = alive.len(),
            agent_type = %self.settings.agent_type,
            "found offline and online agents"
        );

        if dead.is_empty() {
            return RunReport::success();
        }
        if alive.is_empty() {
            error!("there are no agents alive to migrate routers onto, aborting");
            return RunReport::failure();
        }

        if !now {
            match self.agent_came_back(dead.len()) {
                Ok(true) => {
                    info!("skipping router failover since an agent came back online");
                    return RunReport::success();
                }
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "failed to re-check agents before migration");
                    return RunReport::failure();
                }
            }
        }

        let mode = BatchMode {
            drain: !now,
            log_floating_ips: false,
        };
        let mut report = RunReport::success();
        for agent in &dead {
            match self.migrate_routers_from_agent(agent, alive.clone(), mode) {
                Ok(batch) => report.absorb(batch),
                Err(e) => {
                    error!(agent = %agent.id, error = %e, "could not migrate routers off agent");
                    report.status = RunStatus::Failure;
                }
            }
        }

        info!(
            moved = report.moved,
            failed = report.failed,
            skipped = report.skipped,
            noop = self.settings.noop,
            "migration from offline agents finished"
        );
        report.log_orphans();
        report
    }

    /// Move every router off the agent on `host` onto the other live
    /// agents. A host without an agent is nothing to do.
    pub fn evacuate(&mut self, host: &str) -> RunReport {
        let Some(agents) = self.list_agents() else {
            return RunReport::failure();
        };
        let Some(source) = agents.iter().find(|a| a.host == host).cloned() else {
            info!(%host, "no agent found on host, nothing to evacuate");
            return RunReport::success();
        };

        let targets: Vec<Agent> = agents
            .into_iter()
            .filter(|a| {
                a.is_eligible_destination()
                    && a.host != host
                    && (source.agent_mode.is_none() || a.agent_mode == source.agent_mode)
            })
            .collect();
        if targets.is_empty() {
            warn!(%host, "no other live agents to evacuate routers onto");
        }

        let mode = BatchMode {
            drain: true,
            log_floating_ips: true,
        };
        let report = match self.migrate_routers_from_agent(&source, targets, mode) {
            Ok(report) => report,
            Err(e) => {
                error!(agent = %source.id, error = %e, "could not evacuate agent");
                return RunReport::failure();
            }
        };

        info!(
            %host,
            moved = report.moved,
            failed = report.failed,
            skipped = report.skipped,
            noop = self.settings.noop,
            "evacuation finished"
        );
        report.log_orphans();
        report
    }

    /// Count the routers that `migrate` would move, logging where each
    /// would go. Nothing is changed.
    pub fn check(&mut self) -> MigrateResult<usize> {
        let agents = self.control_plane.list_agents(Some(&self.settings.agent_type))?;
        let dead: Vec<&Agent> = agents.iter().filter(|a| a.is_dead()).collect();
        let alive: Vec<Agent> = agents
            .iter()
            .filter(|a| a.is_eligible_destination())
            .cloned()
            .collect();
        info!(dead = dead.len(), alive = alive.len(), "found offline and online agents");

        if dead.is_empty() {
            return Ok(0);
        }

        self.picker.set_agents(self.control_plane, alive)?;
        let mut required = 0;
        for agent in dead {
            info!(agent = %agent.id, "querying agent for routers to migrate");
            for router_id in self.eligible_routers(agent)? {
                required += 1;
                match self.picker.pick(self.control_plane) {
                    Ok(target) => {
                        warn!(router = %router_id, target = %target.id, "router needs migration")
                    }
                    Err(PickerError::Empty) => {
                        warn!(router = %router_id, "router needs migration but no agent is alive")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(required)
    }

    /// Even out router counts across live agents, one router at a time
    /// from the busiest agent to the idlest, until no two agents differ
    /// by more than one.
    pub fn rebalance(&mut self) -> RunReport {
        let Some(agents) = self.list_agents() else {
            return RunReport::failure();
        };
        let alive: Vec<Agent> = agents
            .into_iter()
            .filter(|a| a.is_eligible_destination())
            .collect();
        if alive.len() < 2 {
            info!(agents = alive.len(), "no rebalancing required for fewer than two agents");
            return RunReport::success();
        }

        let mut loads = Vec::with_capacity(alive.len());
        for agent in alive {
            let routers = match schedulable_router_ids(self.control_plane, &agent.id) {
                Ok(routers) => routers,
                Err(e) => {
                    error!(agent = %agent.id, error = %e, "failed to list routers");
                    return RunReport::failure();
                }
            };
            let movable: VecDeque<String> = self.settings.filter.filter_routers(routers.clone()).into();
            debug!(agent = %agent.id, routers = routers.len(), movable = movable.len(), "agent load");
            loads.push(AgentLoad {
                agent,
                count: routers.len(),
                movable,
            });
        }

        let mut report = RunReport::success();
        let mut stuck: HashSet<String> = HashSet::new();
        loop {
            let Some(low) = (0..loads.len()).min_by_key(|&i| loads[i].count) else {
                break;
            };
            let high = (0..loads.len())
                .filter(|&i| !loads[i].movable.is_empty() && !stuck.contains(&loads[i].agent.id))
                .max_by_key(|&i| loads[i].count);
            let Some(high) = high else { break };
            if loads[high].count <= loads[low].count + 1 {
                break;
            }

            let Some(router_id) = loads[high].movable.pop_front() else {
                break;
            };
            let source = loads[high].agent.clone();
            let target = loads[low].agent.clone();
            info!(
                router = %router_id,
                from = %source.id,
                to = %target.id,
                high_count = loads[high].count,
                low_count = loads[low].count,
                "rebalancing router"
            );
            match self.move_router(&router_id, &source, &target, true) {
                Ok(()) => {
                    loads[high].count -= 1;
                    loads[low].count += 1;
                    report.moved += 1;
                }
                Err(e) => {
                    error!(router = %router_id, from = %source.id, to = %target.id, error = %e, "failed to rebalance router");
                    report.record_failure(&router_id, &e);
                    stuck.insert(source.id);
                }
            }
        }

        info!(moved = report.moved, failed = report.failed, "rebalancing finished");
        report.log_orphans();
        report
    }

    fn list_agents(&self) -> Option<Vec<Agent>> {
        match self.control_plane.list_agents(Some(&self.settings.agent_type)) {
            Ok(agents) => Some(agents),
            Err(e) => {
                error!(error = %e, "failed to list agents");
                None
            }
        }
    }

    /// Re-list agents for the takeover delay. True once fewer than
    /// `dead` agents are down.
    fn agent_came_back(&self, dead: usize) -> MigrateResult<bool> {
        let control_plane = self.control_plane;
        let agent_type = self.settings.agent_type.as_str();
        let result = self.settings.takeover.wait_until(|attempt| {
            let still_dead = control_plane
                .list_agents(Some(agent_type))?
                .iter()
                .filter(|a| a.is_dead())
                .count();
            if still_dead < dead {
                return Ok(true);
            }
            info!(attempt, dead = still_dead, "agents still offline, waiting before migration");
            Ok(false)
        });

        match result {
            Ok(_) => Ok(true),
            Err(WaitError::Exhausted { .. }) => Ok(false),
            Err(WaitError::ControlPlane(e)) => Err(e.into()),
        }
    }

    /// Non-HA routers on an agent that the filter lets through.
    fn eligible_routers(&self, agent: &Agent) -> MigrateResult<Vec<String>> {
        let routers = schedulable_router_ids(self.control_plane, &agent.id)?;
        Ok(self.settings.filter.filter_routers(routers))
    }

    /// Move each eligible router on `source` to a picked target.
    ///
    /// Returns an error only when the batch cannot run at all: the
    /// router listing failed, or the picker is unusable for every router.
    fn migrate_routers_from_agent(
        &mut self,
        source: &Agent,
        targets: Vec<Agent>,
        mode: BatchMode,
    ) -> MigrateResult<RunReport> {
        info!(agent = %source.id, host = %source.host, "querying agent for routers to migrate away");
        let router_ids = self.eligible_routers(source)?;
        let mut report = RunReport::success();
        if router_ids.is_empty() {
            return Ok(report);
        }

        self.picker.set_agents(self.control_plane, targets)?;
        for router_id in router_ids {
            if mode.log_floating_ips {
                self.log_floating_ips(&router_id);
            }

            let target = match self.picker.pick(self.control_plane) {
                Ok(target) => target,
                Err(PickerError::Empty) => {
                    warn!(router = %router_id, agent = %source.id, "no eligible destination agent, skipping router");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match self.move_router(&router_id, source, &target, mode.drain) {
                Ok(()) => report.moved += 1,
                Err(e) => {
                    error!(
                        router = %router_id,
                        from = %source.id,
                        to = %target.id,
                        error = %e,
                        "failed to migrate router"
                    );
                    report.record_failure(&router_id, &e);
                }
            }
        }
        Ok(report)
    }

    /// Detach `router_id` from `source` and attach it to `target`.
    fn move_router(
        &self,
        router_id: &str,
        source: &Agent,
        target: &Agent,
        drain: bool,
    ) -> MigrateResult<()> {
        if self.settings.noop {
            info!(router = %router_id, from = %source.id, to = %target.id, "would migrate router");
            return Ok(());
        }
        info!(router = %router_id, from = %source.id, to = %target.id, "migrating router");

        // Each step is confirmed by listing the agent's routers.
        self.control_plane.remove_router_from_agent(&source.id, router_id)?;
        match self.is_hosted_by(router_id, &source.id) {
            Ok(false) => {}
            Ok(true) => {
                return Err(MigrateError::NotDetached {
                    router: router_id.to_string(),
                    agent: source.id.clone(),
                });
            }
            Err(e) => return Err(self.roll_back(router_id, source, e)),
        }
        debug!(router = %router_id, agent = %source.id, "removed router from agent");

        if let Err(e) = self.land(router_id, source, target, drain) {
            return Err(self.roll_back(router_id, source, e));
        }

        if self.settings.wait_for_router {
            self.wait_router_active(router_id, target)?;
        }
        Ok(())
    }

    /// Drain a detached router off `source` and attach it to `target`.
    fn land(&self, router_id: &str, source: &Agent, target: &Agent, drain: bool) -> MigrateResult<()> {
        if drain {
            self.wait_for_drain(router_id, source)?;
        }

        self.control_plane.add_router_to_agent(&target.id, router_id)?;
        if !self.is_hosted_by(router_id, &target.id)? {
            return Err(MigrateError::NotAttached {
                router: router_id.to_string(),
                agent: target.id.clone(),
            });
        }
        Ok(())
    }

    /// Put a detached router back on `source` after `cause` stopped its
    /// move. Returns the error to report for the router.
    fn roll_back(&self, router_id: &str, source: &Agent, cause: MigrateError) -> MigrateError {
        error!(
            router = %router_id,
            agent = %source.id,
            error = %cause,
            "move failed after detach, returning router to its agent"
        );
        match self.control_plane.add_router_to_agent(&source.id, router_id) {
            Ok(()) => cause,
            Err(rollback) => {
                error!(router = %router_id, agent = %source.id, error = %rollback, "could not return router to its agent");
                MigrateError::Stranded {
                    router: router_id.to_string(),
                    agent: source.id.clone(),
                    cause: Box::new(cause),
                    rollback,
                }
            }
        }
    }

    fn is_hosted_by(&self, router_id: &str, agent_id: &str) -> MigrateResult<bool> {
        Ok(self
            .control_plane
            .list_routers_on_agent(agent_id)?
            .iter()
            .any(|r| r.id == router_id))
    }

    /// Wait until none of the router's ports is still ACTIVE on the
    /// source host.
    fn wait_for_drain(&self, router_id: &str, source: &Agent) -> MigrateResult<()> {
        let control_plane = self.control_plane;
        let query = PortQuery::device(router_id);
        let mut remaining: Vec<String> = Vec::new();

        let result = self.settings.drain.wait_until(|attempt| {
            remaining = control_plane
                .list_ports(&query)?
                .into_iter()
                .filter(|p| !p.is_distributed() && p.is_active() && p.host_id == source.host)
                .map(|p| p.id)
                .collect();
            debug!(router = %router_id, attempt, remaining = ?remaining, "ports still active on source host");
            Ok(remaining.is_empty())
        });

        match result {
            Ok(polls) => {
                debug!(router = %router_id, polls, "router drained");
                Ok(())
            }
            Err(WaitError::Exhausted { attempts }) => Err(MigrateError::DrainTimeout {
                router: router_id.to_string(),
                host: source.host.clone(),
                attempts,
                ports: remaining.join(", "),
            }),
            Err(WaitError::ControlPlane(e)) => Err(e.into()),
        }
    }

    /// Wait until the router's ports are ACTIVE on the target host and
    /// its floating IPs are ACTIVE.
    fn wait_router_active(&self, router_id: &str, target: &Agent) -> MigrateResult<()> {
        info!(router = %router_id, host = %target.host, "waiting for ports and floating ips to be active");
        let control_plane = self.control_plane;
        let query = PortQuery::device(router_id);
        let mut pending: Vec<String> = Vec::new();

        let result = self.settings.drain.wait_until(|_| {
            pending = control_plane
                .list_ports(&query)?
                .into_iter()
                .filter(|p| !p.is_distributed() && !(p.is_active() && p.host_id == target.host))
                .map(|p| format!("port {}", p.id))
                .collect();
            if pending.is_empty() {
                pending = control_plane
                    .list_floating_ips(router_id)?
                    .into_iter()
                    .filter(|f| !f.is_active())
                    .map(|f| format!("floating ip {}", f.id))
                    .collect();
            }
            debug!(router = %router_id, pending = ?pending, "router not active yet");
            Ok(pending.is_empty())
        });

        match result {
            Ok(_) => Ok(()),
            Err(WaitError::Exhausted { attempts }) => Err(MigrateError::ActivationTimeout {
                router: router_id.to_string(),
                host: target.host.clone(),
                attempts,
                pending: pending.join(", "),
            }),
            Err(WaitError::ControlPlane(e)) => Err(e.into()),
        }
    }

    fn log_floating_ips(&self, router_id: &str) {
        match self.control_plane.list_floating_ips(router_id) {
            Ok(fips) => {
                for fip in fips {
                    if fip.is_active() {
                        info!(router = %router_id, floating_ip = %fip.id, status = %fip.status, "floating ip");
                    } else {
                        warn!(router = %router_id, floating_ip = %fip.id, status = %fip.status, "floating ip not active");
                    }
                }
            }
            Err(e) => warn!(router = %router_id, error = %e, "failed to list floating ips"),
        }
    }
}

#[derive(Debug)]
struct AgentLoad {
    agent: Agent,
    count: usize,
    movable: VecDeque<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use l3ha_core::MemoryControlPlane;

    fn settings() -> MigrationSettings {
        MigrationSettings {
            drain: RetryPolicy::immediate(3),
            takeover: RetryPolicy::immediate(2),
            ..MigrationSettings::default()
        }
    }

    fn run_migrate(cp: &MemoryControlPlane, now: bool) -> RunReport {
        MigrationOrchestrator::new(cp, settings()).migrate(now)
    }

    #[test]
    fn no_agents_returns_zero() {
        let cp = MemoryControlPlane::new();
        assert_eq!(run_migrate(&cp, false).exit_code(), 0);
    }

    #[test]
    fn no_alive_agents_returns_one() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1").with_alive(false));

        assert_eq!(run_migrate(&cp, false).exit_code(), 1);
    }

    #[test]
    fn admin_down_agents_are_not_destinations() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1").with_admin_state_up(false));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        assert_eq!(run_migrate(&cp, true).exit_code(), 1);
        assert_eq!(cp.routers_on("agent-2"), vec!["router-1"]);
    }

    #[test]
    fn router_moved() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        let report = run_migrate(&cp, true);

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.moved, 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-1"]);
        assert!(cp.routers_on("agent-2").is_empty());
    }

    #[test]
    fn router_moved_after_drain() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.add_router_interface("router-1", "net-1", "host2");

        let report = run_migrate(&cp, false);

        assert_eq!(report.moved, 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-1"]);
        assert_eq!(cp.ports_of("router-1")[0].host_id, "host1");
    }

    #[test]
    fn drain_timeout_fails_router_but_not_run() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-stuck");
        cp.add_router("agent-2", "router-ok");
        cp.add_router_interface("router-stuck", "net-1", "host2");
        cp.hold_ports_on_detach("router-stuck");

        let report = run_migrate(&cp, false);

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-ok"]);
    }

    #[test]
    fn undrained_router_returns_to_source_and_moves_later() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-stuck");
        cp.add_router_interface("router-stuck", "net-1", "host2");
        cp.hold_ports_on_detach("router-stuck");

        let report = run_migrate(&cp, false);

        assert_eq!(report.failed, 1);
        assert!(report.orphaned.is_empty());
        assert!(cp.routers_on("agent-1").is_empty());
        assert_eq!(cp.routers_on("agent-2"), vec!["router-stuck"]);

        let mut orchestrator = MigrationOrchestrator::new(&cp, settings());
        assert_eq!(orchestrator.check().unwrap(), 1);
        let report = orchestrator.migrate(true);

        assert_eq!(report.moved, 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-stuck"]);
        assert!(cp.routers_on("agent-2").is_empty());
    }

    #[test]
    fn attach_failure_returns_router_to_source() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2"));
        cp.add_router("agent-2", "router-1");
        cp.fail_add_router_to("agent-1", "router-1");

        let report = MigrationOrchestrator::new(&cp, settings()).evacuate("host2");

        assert_eq!(report.failed, 1);
        assert!(report.orphaned.is_empty());
        assert_eq!(cp.routers_on("agent-2"), vec!["router-1"]);
    }

    #[test]
    fn failed_rollback_reports_orphan() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.fail_add_router("router-1");

        let report = run_migrate(&cp, true);

        assert_eq!(report.failed, 1);
        assert_eq!(report.orphaned, vec!["router-1"]);
        assert!(cp.routers_on("agent-1").is_empty());
        assert!(cp.routers_on("agent-2").is_empty());
    }

    #[test]
    fn agent_back_online_cancels_migration() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.revive_after_listings("agent-2", 2);

        let mut orchestrator = MigrationOrchestrator::new(
            &cp,
            MigrationSettings {
                takeover: RetryPolicy::immediate(5),
                ..settings()
            },
        );
        let report = orchestrator.migrate(false);

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.moved, 0);
        assert_eq!(cp.mutations(), 0);
        assert_eq!(cp.routers_on("agent-2"), vec!["router-1"]);
        assert_eq!(cp.list_agent_calls(), 3);
    }

    #[test]
    fn takeover_delay_lists_agents_before_moving() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        let report = run_migrate(&cp, false);

        assert_eq!(report.moved, 1);
        assert_eq!(cp.list_agent_calls(), 3);
    }

    #[test]
    fn now_skips_takeover_delay() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.revive_after_listings("agent-2", 1);

        let report = run_migrate(&cp, true);

        assert_eq!(report.moved, 1);
        assert_eq!(cp.list_agent_calls(), 1);
    }

    #[test]
    fn takeover_listing_failure_is_error() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        let orchestrator = MigrationOrchestrator::new(&cp, settings());
        cp.fail_list_agents();
        assert!(orchestrator.agent_came_back(1).is_err());
    }

    #[test]
    fn now_skips_drain_wait() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-stuck");
        cp.add_router_interface("router-stuck", "net-1", "host2");
        cp.hold_ports_on_detach("router-stuck");

        let report = run_migrate(&cp, true);

        assert_eq!(report.moved, 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-stuck"]);
    }

    #[test]
    fn attach_failure_does_not_abort_batch() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.add_router("agent-2", "router-2");
        cp.fail_add_router("router-1");

        let report = run_migrate(&cp, true);

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.orphaned, vec!["router-1"]);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-2"]);
    }

    #[test]
    fn router_listing_failure_is_run_failure() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_agent(Agent::new("agent-3", "host3").with_alive(false));
        cp.add_router("agent-3", "router-3");
        cp.fail_list_routers("agent-2");

        let report = run_migrate(&cp, true);

        assert_eq!(report.exit_code(), 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-3"]);
    }

    #[test]
    fn list_agents_failure_is_run_failure() {
        let cp = MemoryControlPlane::new();
        cp.fail_list_agents();

        assert_eq!(run_migrate(&cp, true).exit_code(), 1);
    }

    #[test]
    fn routers_spread_over_alive_agents() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2"));
        cp.add_agent(Agent::new("agent-3", "host3").with_alive(false));
        for r in ["r1", "r2", "r3", "r4"] {
            cp.add_router("agent-3", r);
        }

        run_migrate(&cp, true);

        assert_eq!(cp.routers_on("agent-1"), vec!["r1", "r3"]);
        assert_eq!(cp.routers_on("agent-2"), vec!["r2", "r4"]);
    }

    #[test]
    fn ha_routers_left_alone() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_ha_router("agent-2", "router-ha");

        let report = run_migrate(&cp, true);

        assert_eq!(report.moved, 0);
        assert_eq!(cp.routers_on("agent-2"), vec!["router-ha"]);
    }

    #[test]
    fn noop_changes_nothing() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        let mut orchestrator = MigrationOrchestrator::new(
            &cp,
            MigrationSettings {
                noop: true,
                ..settings()
            },
        );
        let report = orchestrator.migrate(false);

        assert_eq!(report.moved, 1);
        assert_eq!(cp.mutations(), 0);
        assert_eq!(cp.routers_on("agent-2"), vec!["router-1"]);
    }

    #[test]
    fn single_target_not_found_fails_run() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        let mut orchestrator = MigrationOrchestrator::new(
            &cp,
            MigrationSettings {
                picker: PickerConfig::Single(Some("host9".into())),
                ..settings()
            },
        );

        assert_eq!(orchestrator.migrate(true).exit_code(), 1);
        assert_eq!(cp.mutations(), 0);
    }

    #[test]
    fn wait_for_router_confirms_activation() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.add_router_interface("router-1", "net-1", "host2");
        cp.add_floating_ip("router-1", "fip-1", "DOWN");

        let mut orchestrator = MigrationOrchestrator::new(
            &cp,
            MigrationSettings {
                wait_for_router: true,
                ..settings()
            },
        );
        let report = orchestrator.migrate(true);

        // Ports come up on the new host; the floating IP never does.
        assert_eq!(report.failed, 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-1"]);
    }

    #[test]
    fn evacuation_moves_router() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1").with_agent_mode("Mode X"));
        cp.add_agent(Agent::new("agent-2", "host2").with_agent_mode("Mode X"));
        cp.add_router("agent-2", "router-1");

        let report = MigrationOrchestrator::new(&cp, settings()).evacuate("host2");

        assert_eq!(report.exit_code(), 0);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-1"]);
    }

    #[test]
    fn evacuation_lists_floating_ips() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2"));
        cp.add_router("agent-2", "router-1");
        cp.add_router("agent-2", "router-2");
        cp.add_floating_ip("router-1", "fip-1", "ACTIVE");

        let report = MigrationOrchestrator::new(&cp, settings()).evacuate("host2");

        assert_eq!(report.moved, 2);
        assert_eq!(cp.floating_ip_calls(), 2);
    }

    #[test]
    fn floating_ip_listing_failure_does_not_block_evacuation() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2"));
        cp.add_router("agent-2", "router-1");
        cp.fail_list_floating_ips("router-1");

        let report = MigrationOrchestrator::new(&cp, settings()).evacuate("host2");

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.moved, 1);
        assert_eq!(cp.floating_ip_calls(), 1);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-1"]);
    }

    #[test]
    fn migrate_does_not_list_floating_ips() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");

        run_migrate(&cp, true);

        assert_eq!(cp.floating_ip_calls(), 0);
    }

    #[test]
    fn evacuating_unknown_host_is_noop() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_router("agent-1", "router-1");

        let report = MigrationOrchestrator::new(&cp, settings()).evacuate("host9");

        assert_eq!(report.exit_code(), 0);
        assert_eq!(cp.routers_on("agent-1"), vec!["router-1"]);
        assert_eq!(cp.mutations(), 0);
    }

    #[test]
    fn evacuation_respects_agent_mode() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1").with_agent_mode("dvr"));
        cp.add_agent(Agent::new("agent-2", "host2").with_agent_mode("dvr_snat"));
        cp.add_agent(Agent::new("agent-3", "host3").with_agent_mode("dvr_snat"));
        cp.add_router("agent-2", "router-1");

        MigrationOrchestrator::new(&cp, settings()).evacuate("host2");

        assert_eq!(cp.routers_on("agent-3"), vec!["router-1"]);
        assert!(cp.routers_on("agent-1").is_empty());
    }

    #[test]
    fn evacuation_without_destination_skips_router() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1").with_alive(false));
        cp.add_agent(Agent::new("agent-2", "host2"));
        cp.add_router("agent-2", "router-1");

        let report = MigrationOrchestrator::new(&cp, settings()).evacuate("host2");

        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(cp.routers_on("agent-2"), vec!["router-1"]);
    }

    #[test]
    fn check_counts_required_migrations() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2").with_alive(false));
        cp.add_router("agent-2", "router-1");
        cp.add_router("agent-2", "router-2");

        let required = MigrationOrchestrator::new(&cp, settings()).check().unwrap();

        assert_eq!(required, 2);
        assert_eq!(cp.mutations(), 0);
    }

    #[test]
    fn check_without_dead_agents_is_zero() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_router("agent-1", "router-1");

        assert_eq!(MigrationOrchestrator::new(&cp, settings()).check().unwrap(), 0);
    }

    #[test]
    fn rebalance_evens_out_counts() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2"));
        for r in ["r1", "r2", "r3", "r4", "r5"] {
            cp.add_router("agent-1", r);
        }

        let report = MigrationOrchestrator::new(&cp, settings()).rebalance();

        assert_eq!(report.moved, 2);
        assert_eq!(cp.routers_on("agent-1").len(), 3);
        assert_eq!(cp.routers_on("agent-2"), vec!["r1", "r2"]);
    }

    #[test]
    fn rebalance_single_agent_is_noop() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_router("agent-1", "r1");
        cp.add_router("agent-1", "r2");

        let report = MigrationOrchestrator::new(&cp, settings()).rebalance();

        assert_eq!(report.exit_code(), 0);
        assert_eq!(cp.mutations(), 0);
    }

    #[test]
    fn rebalance_stops_on_failing_agent() {
        let cp = MemoryControlPlane::new();
        cp.add_agent(Agent::new("agent-1", "host1"));
        cp.add_agent(Agent::new("agent-2", "host2"));
        for r in ["r1", "r2", "r3", "r4"] {
            cp.add_router("agent-1", r);
        }
        cp.fail_remove_router("r1");

        let report = MigrationOrchestrator::new(&cp, settings()).rebalance();

        assert_eq!(report.failed, 1);
        assert_eq!(report.moved, 0);
        assert_eq!(cp.routers_on("agent-1").len(), 4);
    }
}
