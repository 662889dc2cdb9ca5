//! Type-safe message system for aldesd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::device::DeviceInfo;
use super::state::SensorState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        unique_id: String,
        integration_name: String,
        device: Option<DeviceInfo>,
    },

    /// An entity was removed (integration shut down, etc.)
    EntityRemoved { entity_id: String },

    /// A sensor published a new state
    SensorStateChanged {
        entity_id: String,
        state: SensorState,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Replace the data snapshot of one config entry.
    ///
    /// The payload is kept opaque here; the owning integration decodes it.
    RefreshSnapshot {
        entry_id: String,
        data: serde_json::Value,
    },
}
