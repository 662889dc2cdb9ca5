use std::collections::BTreeSet;

use serde::Serialize;

/// Device metadata reported by an entity so the engine can group entities
/// belonging to the same physical device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceInfo {
    /// `(domain, id)` pairs identifying the device.
    pub identifiers: BTreeSet<(String, String)>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub name: Option<String>,
}

/// A device in the aldesd system.
///
/// A device represents a physical or logical device that contains one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub identifiers: BTreeSet<(String, String)>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub entity_ids: Vec<String>,
}

impl Device {
    /// Build a registry record from the metadata an entity reported.
    ///
    /// The id is derived from the smallest identifier pair, so it is stable for
    /// a given identifier set. Returns `None` when there is no identifier to key on.
    pub fn from_info(info: &DeviceInfo) -> Option<Self> {
        let (domain, id) = info.identifiers.iter().next()?;
        let device_id = format!("{}:{}", domain, id);
        Some(Self {
            name: info.name.clone().unwrap_or_else(|| device_id.clone()),
            id: device_id,
            identifiers: info.identifiers.clone(),
            manufacturer: info.manufacturer.clone(),
            model: info.model.clone(),
            entity_ids: Vec::new(),
        })
    }

    /// Whether this device shares at least one identifier with `info`.
    pub fn matches(&self, info: &DeviceInfo) -> bool {
        !self.identifiers.is_disjoint(&info.identifiers)
    }

    /// Fold newer metadata into this record. Identifiers accumulate, other
    /// fields are overwritten when present.
    pub fn merge(&mut self, info: &DeviceInfo) {
        self.identifiers.extend(info.identifiers.iter().cloned());
        if let Some(name) = &info.name {
            self.name = name.clone();
        }
        if info.manufacturer.is_some() {
            self.manufacturer = info.manufacturer.clone();
        }
        if info.model.is_some() {
            self.model = info.model.clone();
        }
    }

    pub fn add_entity(&mut self, entity_id: String) {
        if !self.entity_ids.contains(&entity_id) {
            self.entity_ids.push(entity_id);
        }
    }

    pub fn remove_entity(&mut self, entity_id: &str) {
        self.entity_ids.retain(|e| e != entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> DeviceInfo {
        DeviceInfo {
            identifiers: BTreeSet::from([("aldesconnect".to_string(), id.to_string())]),
            manufacturer: Some("Aldes".to_string()),
            model: None,
            name: Some(format!("Thermostat {}", id)),
        }
    }

    #[test]
    fn test_from_info() {
        let device = Device::from_info(&info("42")).unwrap();
        assert_eq!(device.id, "aldesconnect:42");
        assert_eq!(device.name, "Thermostat 42");
        assert_eq!(device.manufacturer.as_deref(), Some("Aldes"));
        assert!(device.entity_ids.is_empty());
    }

    #[test]
    fn test_from_info_without_identifiers() {
        assert!(Device::from_info(&DeviceInfo::default()).is_none());
    }

    #[test]
    fn test_add_entity_is_idempotent() {
        let mut device = Device::from_info(&info("42")).unwrap();
        device.add_entity("sensor.a".to_string());
        device.add_entity("sensor.a".to_string());
        device.add_entity("sensor.b".to_string());
        assert_eq!(device.entity_ids, vec!["sensor.a", "sensor.b"]);

        device.remove_entity("sensor.a");
        assert_eq!(device.entity_ids, vec!["sensor.b"]);
    }

    #[test]
    fn test_matches_and_merge() {
        let mut device = Device::from_info(&info("42")).unwrap();
        assert!(device.matches(&info("42")));
        assert!(!device.matches(&info("7")));

        let mut other = info("42");
        other
            .identifiers
            .insert(("aldesconnect".to_string(), "serial-1".to_string()));
        other.name = Some("Living Room".to_string());
        other.manufacturer = None;
        device.merge(&other);

        assert_eq!(device.identifiers.len(), 2);
        assert_eq!(device.name, "Living Room");
        assert_eq!(device.manufacturer.as_deref(), Some("Aldes"));
    }
}
