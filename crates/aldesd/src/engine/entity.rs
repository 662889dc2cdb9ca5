use super::device::DeviceInfo;

/// Entity abstraction for aldesd
///
/// All entities exposed by integrations implement the Entity trait. The
/// engine only ever sees the values these accessors produce.
pub trait Entity: Send + Sync {
    /// Stable identifier, unique across all integrations.
    fn unique_id(&self) -> String;

    /// Human-readable name. May change over the entity's lifetime, and may be
    /// unknown.
    fn name(&self) -> Option<String>;

    /// Return the platform type of this entity (e.g. "sensor")
    fn platform(&self) -> &'static str;

    /// Device this entity belongs to, if any
    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    /// Serialize current state to JSON
    fn state_json(&self) -> serde_json::Value;

    /// Engine-facing entity id, `<platform>.<slug of unique_id>`.
    fn entity_id(&self) -> String {
        let slug: String = self
            .unique_id()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}.{}", self.platform(), slug)
    }
}
