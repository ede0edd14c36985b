//! Vision module: seeing the reroll screen.
//!
//! - `Frame` / `CaptureGeometry` - Captured pixels and the region they came from
//! - `RegionCapturer` - Repeated capture of one region with resource reuse
//! - `Classifier` - Frame to ranked pips
//!
//! ## Platform Support
//!
//! - **Windows**: GDI desktop capture
//! - **Linux/macOS**: Not supported (capture always reports unavailable)

mod capture;
mod classify;
mod frame;

pub use capture::{platform_capturer, CaptureBackend, PlatformBackend, RegionCapturer};
#[cfg(windows)]
pub use capture::{GdiBackend, GdiSurface};
#[cfg(not(windows))]
pub use capture::UnsupportedBackend;
pub use classify::{Classifier, PaletteClassifier, PaletteConfig};
pub use frame::{CaptureGeometry, Frame};
