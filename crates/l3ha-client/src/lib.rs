//! Networking v2.0 API adapter.
//!
//! [`NetworkClient`] implements [`l3ha_core::ControlPlane`] over blocking
//! HTTP. Authentication is a pre-issued token sent as `X-Auth-Token`.

pub mod client;
pub mod wire;

pub use client::{ClientConfig, ClientError, ClientResult, NetworkClient};
