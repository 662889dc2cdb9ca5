#[cfg(feature = "integration_aldesconnect")]
pub mod aldesconnect;
