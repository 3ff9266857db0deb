use tracing::info;

use l3ha_core::ControlPlane;
use l3ha_migrate::{MigrationOrchestrator, MigrationSettings};

/// Exit code of `check` when routers sit on dead agents.
const EXIT_MIGRATION_REQUIRED: u8 = 2;

pub fn migrate<C: ControlPlane>(client: &C, settings: MigrationSettings, now: bool) -> u8 {
    MigrationOrchestrator::new(client, settings).migrate(now).exit_code()
}

pub fn evacuate<C: ControlPlane>(client: &C, settings: MigrationSettings, host: &str) -> u8 {
    MigrationOrchestrator::new(client, settings).evacuate(host).exit_code()
}

pub fn rebalance<C: ControlPlane>(client: &C, settings: MigrationSettings) -> u8 {
    MigrationOrchestrator::new(client, settings).rebalance().exit_code()
}

pub fn check<C: ControlPlane>(client: &C, settings: MigrationSettings) -> anyhow::Result<u8> {
    let required = MigrationOrchestrator::new(client, settings).check()?;
    if required == 0 {
        info!("no routers need migration");
        Ok(0)
    } else {
        info!(routers = required, "routers need migration");
        Ok(EXIT_MIGRATION_REQUIRED)
    }
}
