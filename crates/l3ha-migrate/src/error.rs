//! Migration error types.

use thiserror::Error;

use l3ha_core::ControlPlaneError;
use l3ha_placement::PickerError;

/// Errors that can occur while moving a router.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("agent selection failed: {0}")]
    Picker(#[from] PickerError),

    #[error("router {router} still listed on agent {agent} after removal")]
    NotDetached { router: String, agent: String },

    #[error("router {router} not listed on agent {agent} after adding it")]
    NotAttached { router: String, agent: String },

    #[error("ports of router {router} still active on {host} after {attempts} polls: [{ports}]")]
    DrainTimeout {
        router: String,
        host: String,
        attempts: u32,
        ports: String,
    },

    #[error("router {router} not active on {host} after {attempts} polls: [{pending}]")]
    ActivationTimeout {
        router: String,
        host: String,
        attempts: u32,
        pending: String,
    },

    #[error("router {router} is on no agent after {cause}; re-adding it to {agent} failed: {rollback}")]
    Stranded {
        router: String,
        agent: String,
        cause: Box<MigrateError>,
        rollback: ControlPlaneError,
    },
}

pub type MigrateResult<T> = Result<T, MigrateError>;
