//! # pip-reroll-core
//!
//! Core library for automated pip rerolls.
//!
//! A background worker repeatedly captures a screen region, classifies the
//! pips it finds into quality ranks, and ends the reroll run once a stop
//! condition holds on two captures taken a short delay apart.
//!
//! ## Modules
//!
//! - [`rank`] - Pip quality ranks and their display colors
//! - [`detection`] - Detected pips and per-rank counts
//! - [`criteria`] - Stop conditions and their evaluation
//! - [`debounce`] - Two-point-in-time stop confirmation
//! - [`tally`] - Rank counts shared with the UI
//! - [`vision`] - Region capture and classification
//! - [`notify`] - Host boundary, slot display forwarding, decision log
//! - [`processor`] - The capture → classify → decide loop
//! - [`config`] - Configuration and live settings
//! - [`error`] - Error types and Result alias
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::{mpsc, Arc};
//! use pip_reroll_core::{
//!     platform_capturer, CaptureGeometry, ChannelHost, Config, PaletteClassifier, Processor,
//!     UiUpdate,
//! };
//!
//! let mut config = Config::load();
//! config.region = Some(CaptureGeometry::new(100, 200, 400, 260));
//!
//! let (tx, rx) = mpsc::channel();
//! let host = Arc::new(ChannelHost::new(tx));
//! let processor = Processor::new(
//!     &config,
//!     config.live_settings(),
//!     platform_capturer(),
//!     PaletteClassifier::new(config.classifier),
//!     host,
//! );
//!
//! let _handle = processor.start().expect("Failed to start processor");
//! for update in rx {
//!     if let UiUpdate::StopConfirmed { counts, .. } = update {
//!         println!("Stopped on {}", counts);
//!         break;
//!     }
//! }
//! ```

// Module declarations
pub mod config;
pub mod criteria;
pub mod debounce;
pub mod detection;
pub mod error;
pub mod notify;
pub mod processor;
pub mod rank;
pub mod tally;
pub mod vision;

// Re-export key types for convenience

// Error types
pub use error::{Error, Result};

// Data model
pub use criteria::{evaluate, StopCriteria};
pub use detection::{DetectedObject, RankCounts};
pub use rank::Rank;

// Configuration
pub use config::{Config, LiveSettings, SharedSettings, TimingConfig};

// Decision making
pub use debounce::{DebounceController, DebounceOutcome, DebounceState, PendingStop};
pub use tally::RankTally;

// Capture and classification
pub use vision::{
    platform_capturer, CaptureBackend, CaptureGeometry, Classifier, Frame, PaletteClassifier,
    PaletteConfig, PlatformBackend, RegionCapturer,
};

// Side channels
pub use notify::{
    ChannelHost, DecisionEvent, DecisionLog, JsonlDecisionLog, RerollHost, SlotListener,
    SlotNotifier, UiUpdate,
};

// Processing loop
pub use processor::{Processor, ProcessorHandle};
