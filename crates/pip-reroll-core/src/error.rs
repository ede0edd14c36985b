//! Error types for pip-reroll-core

use thiserror::Error;

/// Main error type for capture, classification and notification operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Invalid capture region {left},{top},{right},{bottom}: width and height must be positive")]
    InvalidGeometry {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Unknown rank: {0}")]
    InvalidRank(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the processing loop should treat this as a retryable hiccup.
    ///
    /// Capture, classification and notification failures are all recovered
    /// locally by the loop; everything else points at a setup problem.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CaptureUnavailable(_)
                | Self::InvalidGeometry { .. }
                | Self::Classification(_)
                | Self::Notification(_)
        )
    }
}

/// Result type alias for pip-reroll operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::CaptureUnavailable("gdi".into()).is_transient());
        assert!(Error::Classification("bad frame".into()).is_transient());
        assert!(Error::Notification("refused".into()).is_transient());
        assert!(!Error::Config("top_k must be positive".into()).is_transient());
        assert!(!Error::InvalidRank("Z".into()).is_transient());
    }

    #[test]
    fn test_geometry_message() {
        let err = Error::InvalidGeometry {
            left: 0,
            top: 0,
            right: 0,
            bottom: 100,
        };
        assert!(err.to_string().contains("0,0,0,100"));
    }
}
