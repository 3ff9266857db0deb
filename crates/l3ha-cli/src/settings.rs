//! Merges command-line flags, environment and the config file into the
//! settings each component takes. Flags and environment win over the
//! file, the file wins over defaults.

use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use l3ha_client::ClientConfig;
use l3ha_core::ToolConfig;
use l3ha_migrate::{DEFAULT_TAKEOVER_DELAY, MigrationSettings, RetryPolicy};
use l3ha_placement::{PickerConfig, ROUTER_CACHE_MAX_AGE, RouterFilter};

use crate::{GlobalArgs, SelectionMode};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Agents are re-listed once per interval during the takeover delay.
const TAKEOVER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The command line is incomplete in a way clap cannot see.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("no API endpoint: pass --endpoint, set OS_NETWORK_ENDPOINT or [control_plane].endpoint")]
    MissingEndpoint,

    #[error("rebalance always moves routers to the idlest agent; drop --target-agent and --agent-selection-mode")]
    RebalancePicker,
}

pub fn load_config(args: &GlobalArgs) -> anyhow::Result<ToolConfig> {
    match &args.config {
        Some(path) => Ok(ToolConfig::from_file(path)?),
        None => Ok(ToolConfig::default()),
    }
}

pub fn client_config(args: &GlobalArgs, file: &ToolConfig) -> anyhow::Result<ClientConfig> {
    let section = &file.control_plane;
    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| section.endpoint.clone())
        .ok_or(UsageError::MissingEndpoint)?;

    Ok(ClientConfig {
        endpoint,
        token: args.token.clone().or_else(|| section.token.clone()),
        insecure: args.insecure || section.insecure.unwrap_or(false),
        ca_cert: args.ca_cert.clone().or_else(|| section.ca_cert.clone()),
        timeout: section
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT),
    })
}

pub fn picker_config(args: &GlobalArgs, file: &ToolConfig) -> PickerConfig {
    if let Some(target) = &args.target_agent {
        return PickerConfig::Single(Some(target.clone()));
    }
    match args.agent_selection_mode {
        SelectionMode::LeastBusy => PickerConfig::LeastBusy {
            cache_max_age: file
                .picker
                .cache_max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(ROUTER_CACHE_MAX_AGE),
        },
        SelectionMode::Random => PickerConfig::Random,
    }
}

pub fn retry_policy(file: &ToolConfig) -> RetryPolicy {
    let section = &file.migration;
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_attempts: section.drain_max_attempts.unwrap_or(defaults.max_attempts),
        initial_interval: section
            .drain_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_interval),
        max_interval: section
            .drain_max_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_interval),
    }
}

pub fn takeover_policy(file: &ToolConfig) -> RetryPolicy {
    let delay = file
        .migration
        .takeover_delay_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TAKEOVER_DELAY);
    let polls = (delay.as_secs() / TAKEOVER_POLL_INTERVAL.as_secs()).max(1);
    RetryPolicy::fixed(u32::try_from(polls).unwrap_or(u32::MAX), TAKEOVER_POLL_INTERVAL)
}

/// `rebalance` picks its own destinations, so a picker choice on the
/// command line would be silently ignored.
pub fn ensure_default_picker(args: &GlobalArgs) -> Result<(), UsageError> {
    if args.target_agent.is_some() || args.agent_selection_mode != SelectionMode::LeastBusy {
        return Err(UsageError::RebalancePicker);
    }
    Ok(())
}

pub fn migration_settings(args: &GlobalArgs, file: &ToolConfig) -> anyhow::Result<MigrationSettings> {
    let filter = match &args.router_list {
        Some(path) => RouterFilter::from_list_file(path)
            .with_context(|| format!("loading router list {}", path.display()))?,
        None => RouterFilter::All,
    };

    Ok(MigrationSettings {
        agent_type: file.agent_type().to_string(),
        picker: picker_config(args, file),
        filter,
        drain: retry_policy(file),
        takeover: takeover_policy(file),
        noop: args.noop,
        wait_for_router: args.wait_for_router,
    })
}
