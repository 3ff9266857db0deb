//! Agent pickers: choose the destination agent for a router.
//!
//! All pickers share one contract: [`AgentPicker::set_agents`] installs
//! the candidate set and [`AgentPicker::pick`] returns one of them. An
//! empty candidate set is always [`PickerError::Empty`], whichever
//! strategy is configured.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use rand::seq::IndexedRandom;
use thiserror::Error;
use tracing::{debug, info};

use l3ha_core::control_plane::schedulable_router_ids;
use l3ha_core::{Agent, AgentId, ControlPlane, ControlPlaneError};

/// How long router counts stay valid in [`LeastBusyPicker`].
pub const ROUTER_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

pub type PickerResult<T> = Result<T, PickerError>;

#[derive(Debug, Error)]
pub enum PickerError {
    /// No candidates to choose from.
    #[error("cannot choose an agent from an empty candidate set")]
    Empty,

    #[error("Cannot find desired agent '{0}'")]
    NotFound(String),

    #[error("no agent selection value configured")]
    NotConfigured,

    #[error("failed to count routers: {0}")]
    ControlPlane(#[from] ControlPlaneError),
}

/// Which picker to build, as chosen on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerConfig {
    LeastBusy { cache_max_age: Duration },
    Random,
    /// Always pick the agent with this id or host.
    Single(Option<String>),
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self::LeastBusy {
            cache_max_age: ROUTER_CACHE_MAX_AGE,
        }
    }
}

impl PickerConfig {
    pub fn build(&self) -> AgentPicker {
        match self {
            Self::LeastBusy { cache_max_age } => {
                AgentPicker::LeastBusy(LeastBusyPicker::with_max_age(*cache_max_age))
            }
            Self::Random => AgentPicker::Random(RandomPicker::new()),
            Self::Single(value) => {
                let mut picker = SingleAgentPicker::new();
                if let Some(value) = value {
                    picker.set_selection_value(value);
                }
                AgentPicker::Single(picker)
            }
        }
    }
}

/// The configured picking strategy.
#[derive(Debug)]
pub enum AgentPicker {
    LeastBusy(LeastBusyPicker),
    Random(RandomPicker),
    Single(SingleAgentPicker),
}

impl AgentPicker {
    /// Replace the candidate set.
    pub fn set_agents<C: ControlPlane + ?Sized>(
        &mut self,
        control_plane: &C,
        agents: Vec<Agent>,
    ) -> PickerResult<()> {
        match self {
            Self::LeastBusy(p) => p.set_agents(control_plane, agents),
            Self::Random(p) => {
                p.set_agents(agents);
                Ok(())
            }
            Self::Single(p) => {
                p.set_agents(agents);
                Ok(())
            }
        }
    }

    pub fn pick<C: ControlPlane + ?Sized>(&mut self, control_plane: &C) -> PickerResult<Agent> {
        match self {
            Self::LeastBusy(p) => p.pick(control_plane),
            Self::Random(p) => p.pick(),
            Self::Single(p) => p.pick(),
        }
    }

    pub fn agents(&self) -> &[Agent] {
        match self {
            Self::LeastBusy(p) => &p.agents,
            Self::Random(p) => &p.agents,
            Self::Single(p) => &p.agents,
        }
    }
}

// ── Least busy ─────────────────────────────────────────────────────

/// Picks the candidate hosting the fewest routers.
///
/// Router counts are queried once per agent and cached. Each pick bumps
/// the chosen agent's cached count, so a run of picks spreads routers
/// across equally loaded agents without re-querying. Ties go to the
/// agent listed first. The cache is rebuilt once it is older than the
/// configured max age.
#[derive(Debug)]
pub struct LeastBusyPicker {
    agents: Vec<Agent>,
    router_count_per_agent_id: HashMap<AgentId, usize>,
    cache_created_at: Option<SystemTime>,
    max_age: Duration,
}

impl Default for LeastBusyPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl LeastBusyPicker {
    pub fn new() -> Self {
        Self::with_max_age(ROUTER_CACHE_MAX_AGE)
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            agents: Vec::new(),
            router_count_per_agent_id: HashMap::new(),
            cache_created_at: None,
            max_age,
        }
    }

    /// Install candidates, counting their routers if the cache cannot
    /// answer for all of them.
    pub fn set_agents<C: ControlPlane + ?Sized>(
        &mut self,
        control_plane: &C,
        agents: Vec<Agent>,
    ) -> PickerResult<()> {
        self.agents = agents;
        if self.needs_refresh() {
            self.refresh(control_plane)?;
        }
        Ok(())
    }

    /// Re-query the router count of every current candidate.
    pub fn refresh<C: ControlPlane + ?Sized>(&mut self, control_plane: &C) -> PickerResult<()> {
        info!(agents = self.agents.len(), "refreshing router count per agent cache");
        let mut counts = HashMap::with_capacity(self.agents.len());
        for agent in &self.agents {
            let count = schedulable_router_ids(control_plane, &agent.id)?.len();
            debug!(agent = %agent.id, routers = count, "counted routers");
            counts.insert(agent.id.clone(), count);
        }
        self.router_count_per_agent_id = counts;
        self.cache_created_at = Some(SystemTime::now());
        Ok(())
    }

    pub fn cache_expired(&self) -> bool {
        match self.cache_created_at {
            None => true,
            // A clock stepping backwards makes the cache look newer, never
            // invalid.
            Some(created) => created
                .elapsed()
                .map(|age| age > self.max_age)
                .unwrap_or(false),
        }
    }

    fn needs_refresh(&self) -> bool {
        self.cache_expired()
            || self
                .agents
                .iter()
                .any(|a| !self.router_count_per_agent_id.contains_key(&a.id))
    }

    pub fn pick<C: ControlPlane + ?Sized>(&mut self, control_plane: &C) -> PickerResult<Agent> {
        if self.agents.is_empty() {
            return Err(PickerError::Empty);
        }
        if self.needs_refresh() {
            self.refresh(control_plane)?;
        }

        // `min_by_key` keeps the first of equal minimums.
        let chosen = self
            .agents
            .iter()
            .min_by_key(|a| self.router_count_per_agent_id.get(&a.id).copied().unwrap_or(0))
            .cloned()
            .ok_or(PickerError::Empty)?;

        *self
            .router_count_per_agent_id
            .entry(chosen.id.clone())
            .or_insert(0) += 1;
        debug!(agent = %chosen.id, "picked least busy agent");
        Ok(chosen)
    }

    pub fn router_counts(&self) -> &HashMap<AgentId, usize> {
        &self.router_count_per_agent_id
    }

    pub fn cache_created_at(&self) -> Option<SystemTime> {
        self.cache_created_at
    }

    pub fn set_cache_created_at(&mut self, created_at: SystemTime) {
        self.cache_created_at = Some(created_at);
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

// ── Random ─────────────────────────────────────────────────────────

/// Picks a candidate uniformly at random on every call.
#[derive(Debug, Default)]
pub struct RandomPicker {
    agents: Vec<Agent>,
}

impl RandomPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_agents(&mut self, agents: Vec<Agent>) {
        self.agents = agents;
    }

    pub fn pick(&self) -> PickerResult<Agent> {
        self.agents
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(PickerError::Empty)
    }
}

// ── Single target ──────────────────────────────────────────────────

/// Picks the one candidate an operator asked for, by id or host name.
#[derive(Debug, Default)]
pub struct SingleAgentPicker {
    agents: Vec<Agent>,
    agent_selection_value: Option<String>,
}

impl SingleAgentPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_selection_value(&mut self, value: &str) {
        self.agent_selection_value = Some(value.to_string());
    }

    pub fn set_agents(&mut self, agents: Vec<Agent>) {
        self.agents = agents;
    }

    /// Id matches win over host matches.
    pub fn pick(&self) -> PickerResult<Agent> {
        let value = self
            .agent_selection_value
            .as_deref()
            .ok_or(PickerError::NotConfigured)?;

        self.agents
            .iter()
            .find(|a| a.id == value)
            .or_else(|| self.agents.iter().find(|a| a.host == value))
            .cloned()
            .ok_or_else(|| PickerError::NotFound(value.to_string()))
    }
}
