//! AldesConnect integration error types.

use std::path::PathBuf;

/// Errors raised by the AldesConnect integration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A products file could not be read.
    #[error("failed to read products file {0}")]
    Io(PathBuf, #[source] std::io::Error),

    /// A products snapshot did not have the expected shape.
    #[error("malformed products snapshot")]
    Decode(#[source] serde_json::Error),

    /// A command named a config entry this integration does not know.
    #[error("unknown config entry: {0}")]
    UnknownEntry(String),

    /// The engine stopped listening.
    #[error("engine channel closed")]
    EngineClosed,
}

impl Error {
    /// Box for propagation across the `Integration` trait seam.
    pub fn boxed(self) -> Box<dyn std::error::Error + Send> {
        Box::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_entry() {
        let err = Error::UnknownEntry("home".to_string());
        assert_eq!(err.to_string(), "unknown config entry: home");
    }

    #[test]
    fn test_decode_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err = Error::Decode(json_err);
        assert_eq!(err.to_string(), "malformed products snapshot");
        assert!(std::error::Error::source(&err).is_some());
    }
}
