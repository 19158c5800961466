use thiserror::Error;

/// Error kinds surfaced by the style pipeline.
///
/// Per-game problems (`Input`) are recovered locally by skipping the game;
/// everything else is a per-request structural error that propagates to the
/// caller unchanged so a serving layer can map it to a status code.
#[derive(Error, Debug)]
pub enum StyleEngineError {
    /// Malformed or empty game record, unparseable or illegal move
    #[error("Input error: {0}")]
    Input(String),

    /// No usable games remain for aggregation or matching
    #[error("Insufficient data: needed at least {needed} usable games, found {found}")]
    InsufficientData { needed: usize, found: usize },

    /// Invalid tuning constants or a corpus too small for the requested model
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A query arrived before any reference corpus was published
    #[error("Reference corpus not initialized")]
    NotInitialized,

    /// Style vector dimensionality differs between query and corpus
    #[error("Consistency error: expected {expected} style features, found {found}")]
    Consistency { expected: usize, found: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StyleEngineError {
    /// True for errors that only invalidate a single game.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StyleEngineError::Input(_))
    }
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, StyleEngineError>;

// Helper macros for error creation
#[macro_export]
macro_rules! input_error {
    ($msg:expr) => {
        $crate::errors::StyleEngineError::Input($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::StyleEngineError::Input(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::errors::StyleEngineError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::StyleEngineError::Configuration(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = StyleEngineError::Input("bad move".to_string());
        assert_eq!(error.to_string(), "Input error: bad move");

        let error = StyleEngineError::Consistency {
            expected: 11,
            found: 10,
        };
        assert_eq!(
            error.to_string(),
            "Consistency error: expected 11 style features, found 10"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: StyleEngineError = io_error.into();

        match error {
            StyleEngineError::Io(inner) => assert!(inner.to_string().contains("file not found")),
            _ => panic!("Expected Io"),
        }
    }

    #[test]
    fn test_error_macros() {
        let error = config_error!("k_arch = {} exceeds {} players", 5, 4);
        match error {
            StyleEngineError::Configuration(msg) => assert!(msg.contains("k_arch = 5")),
            _ => panic!("Expected Configuration"),
        }

        let error = input_error!("empty move list");
        assert!(error.is_recoverable());
        assert!(!StyleEngineError::NotInitialized.is_recoverable());
    }
}
