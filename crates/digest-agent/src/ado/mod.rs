//! Azure DevOps: REST client, credentials and wire formats.

pub mod auth;
pub mod client;
pub mod wire;

pub use auth::{AzureCli, Credentials};
pub use client::AdoClient;
