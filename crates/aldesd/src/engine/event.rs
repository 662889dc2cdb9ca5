use super::state::SensorState;

/// Automation-level events.
///
/// Distinct from `FromIntegrationMessage` (transport-level). The engine converts
/// `FromIntegrationMessage` into `Event` at the boundary and broadcasts it to
/// every receiver from `Engine::subscribe_events`.
#[derive(Debug, Clone)]
pub enum Event {
    SensorStateChanged {
        entity_id: String,
        state: SensorState,
    },
}
