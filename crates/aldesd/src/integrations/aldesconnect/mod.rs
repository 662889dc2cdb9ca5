//! AldesConnect integration: temperature sensors for Aldes HVAC thermostats.
//!
//! Each config entry gets its own [`coordinator::DataUpdateCoordinator`]
//! holding the latest products snapshot. Sensors are discovered from that
//! snapshot once at setup and refreshed on every snapshot replacement.

// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod aldesconnect;
pub mod coordinator;
pub mod entity;
mod error;
pub mod model;
pub mod sensor;

use linkme::distributed_slice;
use tracing::info;

pub use aldesconnect::AldesConnectIntegration;
pub use error::Error;

use crate::engine;

/// Integration domain, used as prefix of unique ids and device identifiers.
pub const DOMAIN: &str = "aldesconnect";

pub const MANUFACTURER: &str = "Aldes";

/// Identity of one configured Aldes account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
}

impl ConfigEntry {
    pub fn new(entry_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: title.into(),
        }
    }
}

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_aldesconnect(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let config = if let Some(c) = &ctx.config.integrations.aldesconnect {
        c
    } else {
        return Ok(None);
    };

    info!(
        "Initializing AldesConnect integration with {} entr(y/ies)",
        config.entries.len()
    );
    Ok(Some(Box::new(AldesConnectIntegration::new(config))))
}
