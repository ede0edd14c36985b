//! Screen region capture with reusable graphics resources.
//!
//! Provisioning a device context and bitmap is expensive, copying pixels into
//! an existing one is cheap. [`RegionCapturer`] keeps one set of resources
//! sized for the last region it captured and only rebuilds them when the
//! region changes or a previous call failed.
//!
//! # Platform Support
//!
//! - **Windows**: GDI capture of the desktop window (`GdiBackend`)
//! - **Linux/macOS**: Not supported (`UnsupportedBackend`, always unavailable)

use tracing::{debug, warn};

use super::frame::{CaptureGeometry, Frame};
use crate::error::{Error, Result};

/// Low-level capture API behind a [`RegionCapturer`].
///
/// A surface is the set of native resources sized for one width/height. The
/// capturer owns surfaces and decides when to provision and release them;
/// backends only perform the native calls.
pub trait CaptureBackend: Send {
    /// Native resources for one capture size.
    type Surface: Send;

    /// Allocate resources for a `width` x `height` capture.
    ///
    /// On failure the backend must already have released anything it
    /// allocated part-way through.
    fn provision(&mut self, width: u32, height: u32) -> Result<Self::Surface>;

    /// Copy the screen pixels under `region` into an RGB frame.
    fn copy(&mut self, surface: &mut Self::Surface, region: &CaptureGeometry) -> Result<Frame>;

    /// Free a surface. Must not fail; problems are only logged.
    fn release(&mut self, surface: Self::Surface);
}

/// Captures arbitrary screen rectangles, reusing resources between calls.
pub struct RegionCapturer<B: CaptureBackend> {
    backend: B,
    surface: Option<B::Surface>,
    /// Region the current surface was provisioned for
    last_region: Option<CaptureGeometry>,
    provision_count: u64,
}

impl<B: CaptureBackend> RegionCapturer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            surface: None,
            last_region: None,
            provision_count: 0,
        }
    }

    /// Capture `region`.
    ///
    /// A missing or empty region fails immediately without touching the
    /// backend. Any backend failure releases all resources so the next call
    /// starts from scratch.
    pub fn capture(&mut self, region: Option<&CaptureGeometry>) -> Result<Frame> {
        let region = region.ok_or_else(|| Error::CaptureUnavailable("no capture region".into()))?;
        let (width, height) = region.dimensions()?;

        if self.last_region.as_ref() != Some(region) {
            self.close();
        }

        if self.surface.is_none() {
            match self.backend.provision(width, height) {
                Ok(surface) => {
                    debug!(%region, width, height, "Provisioned capture surface");
                    self.surface = Some(surface);
                    self.last_region = Some(*region);
                    self.provision_count += 1;
                }
                Err(e) => {
                    warn!(%region, "Failed to provision capture surface: {}", e);
                    self.close();
                    return Err(into_unavailable(e));
                }
            }
        }

        let result = match self.surface.as_mut() {
            Some(surface) => self.backend.copy(surface, region),
            None => Err(Error::CaptureUnavailable("capture surface missing".into())),
        };

        result.map_err(|e| {
            warn!(%region, "Capture failed: {}", e);
            self.close();
            into_unavailable(e)
        })
    }

    /// Release all held resources. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.backend.release(surface);
            debug!("Released capture surface");
        }
        self.last_region = None;
    }

    /// Whether resources are currently held.
    pub fn is_provisioned(&self) -> bool {
        self.surface.is_some()
    }

    /// How many times resources have been provisioned.
    pub fn provision_count(&self) -> u64 {
        self.provision_count
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: CaptureBackend> Drop for RegionCapturer<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn into_unavailable(e: Error) -> Error {
    match e {
        Error::CaptureUnavailable(_) | Error::InvalidGeometry { .. } => e,
        other => Error::CaptureUnavailable(other.to_string()),
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use std::ffi::c_void;

    use windows::Win32::Foundation::{HANDLE, HWND};
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GdiFlush,
        GetWindowDC, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::GetDesktopWindow;

    /// GDI resources for one capture size: the desktop window DC, a memory DC
    /// and a top-down 32-bit DIB section selected into it.
    pub struct GdiSurface {
        window_dc: HDC,
        memory_dc: HDC,
        bitmap: HBITMAP,
        previous: HGDIOBJ,
        bits: *mut c_void,
        width: u32,
        height: u32,
    }

    // The DIB pointer is only dereferenced by the thread that owns the surface.
    unsafe impl Send for GdiSurface {}

    /// Desktop capture through GDI `BitBlt`.
    pub struct GdiBackend {
        desktop: HWND,
    }

    impl GdiBackend {
        pub fn new() -> Self {
            Self {
                desktop: unsafe { GetDesktopWindow() },
            }
        }
    }

    impl Default for GdiBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureBackend for GdiBackend {
        type Surface = GdiSurface;

        fn provision(&mut self, width: u32, height: u32) -> Result<GdiSurface> {
            unsafe {
                let window_dc = GetWindowDC(self.desktop);
                if window_dc.is_invalid() {
                    return Err(Error::CaptureUnavailable("GetWindowDC failed".into()));
                }

                let mut surface = GdiSurface {
                    window_dc,
                    memory_dc: HDC::default(),
                    bitmap: HBITMAP::default(),
                    previous: HGDIOBJ::default(),
                    bits: std::ptr::null_mut(),
                    width,
                    height,
                };

                surface.memory_dc = CreateCompatibleDC(window_dc);
                if surface.memory_dc.is_invalid() {
                    self.release(surface);
                    return Err(Error::CaptureUnavailable("CreateCompatibleDC failed".into()));
                }

                let info = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width as i32,
                        // Negative height selects a top-down row order
                        biHeight: -(height as i32),
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };

                match CreateDIBSection(
                    window_dc,
                    &info,
                    DIB_RGB_COLORS,
                    &mut surface.bits,
                    HANDLE::default(),
                    0,
                ) {
                    Ok(bitmap) if !surface.bits.is_null() => surface.bitmap = bitmap,
                    Ok(bitmap) => {
                        surface.bitmap = bitmap;
                        self.release(surface);
                        return Err(Error::CaptureUnavailable(
                            "CreateDIBSection returned no pixel buffer".into(),
                        ));
                    }
                    Err(e) => {
                        self.release(surface);
                        return Err(Error::CaptureUnavailable(format!(
                            "CreateDIBSection failed: {}",
                            e
                        )));
                    }
                }

                surface.previous = SelectObject(surface.memory_dc, surface.bitmap);
                Ok(surface)
            }
        }

        fn copy(&mut self, surface: &mut GdiSurface, region: &CaptureGeometry) -> Result<Frame> {
            let (width, height) = region.dimensions()?;
            if width != surface.width || height != surface.height {
                return Err(Error::CaptureUnavailable(format!(
                    "surface is {}x{}, region is {}x{}",
                    surface.width, surface.height, width, height
                )));
            }

            unsafe {
                BitBlt(
                    surface.memory_dc,
                    0,
                    0,
                    width as i32,
                    height as i32,
                    surface.window_dc,
                    region.left,
                    region.top,
                    SRCCOPY,
                )
                .map_err(|e| Error::CaptureUnavailable(format!("BitBlt failed: {}", e)))?;

                let _ = GdiFlush();

                let len = width as usize * height as usize * 4;
                let bgra = std::slice::from_raw_parts(surface.bits as *const u8, len);
                Frame::from_bgra(width, height, bgra)
            }
        }

        fn release(&mut self, surface: GdiSurface) {
            unsafe {
                if !surface.memory_dc.is_invalid() {
                    if !surface.previous.is_invalid() {
                        SelectObject(surface.memory_dc, surface.previous);
                    }
                    if !DeleteDC(surface.memory_dc).as_bool() {
                        warn!("DeleteDC failed during capture cleanup");
                    }
                }
                if !surface.bitmap.is_invalid() && !DeleteObject(surface.bitmap).as_bool() {
                    warn!("DeleteObject failed during capture cleanup");
                }
                if !surface.window_dc.is_invalid() && ReleaseDC(self.desktop, surface.window_dc) == 0 {
                    warn!("ReleaseDC failed during capture cleanup");
                }
            }
        }
    }
}

// ============================================================================
// Non-Windows Stubs
// ============================================================================

#[cfg(not(windows))]
mod stub_impl {
    use super::*;

    /// Capture is not supported on non-Windows platforms
    #[derive(Debug, Default)]
    pub struct UnsupportedBackend;

    impl UnsupportedBackend {
        pub fn new() -> Self {
            Self
        }
    }

    impl CaptureBackend for UnsupportedBackend {
        type Surface = ();

        fn provision(&mut self, _width: u32, _height: u32) -> Result<()> {
            Err(Error::CaptureUnavailable(
                "Screen capture is only supported on Windows".into(),
            ))
        }

        fn copy(&mut self, _surface: &mut (), _region: &CaptureGeometry) -> Result<Frame> {
            Err(Error::CaptureUnavailable(
                "Screen capture is only supported on Windows".into(),
            ))
        }

        fn release(&mut self, _surface: ()) {}
    }
}

// ============================================================================
// Public API
// ============================================================================

#[cfg(windows)]
pub use windows_impl::{GdiBackend, GdiSurface};

#[cfg(not(windows))]
pub use stub_impl::UnsupportedBackend;

/// Capture backend for the current platform.
#[cfg(windows)]
pub type PlatformBackend = GdiBackend;

/// Capture backend for the current platform.
#[cfg(not(windows))]
pub type PlatformBackend = UnsupportedBackend;

/// A capturer using the platform backend.
pub fn platform_capturer() -> RegionCapturer<PlatformBackend> {
    RegionCapturer::new(PlatformBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend that counts native calls and can be told to fail.
    #[derive(Default, Clone)]
    struct CountingBackend {
        provisions: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
        fail_provision: bool,
        fail_copies: Arc<AtomicUsize>,
    }

    impl CaptureBackend for CountingBackend {
        type Surface = (u32, u32);

        fn provision(&mut self, width: u32, height: u32) -> Result<(u32, u32)> {
            self.provisions.fetch_add(1, Ordering::SeqCst);
            if self.fail_provision {
                return Err(Error::Other("out of handles".into()));
            }
            Ok((width, height))
        }

        fn copy(&mut self, surface: &mut (u32, u32), _region: &CaptureGeometry) -> Result<Frame> {
            if self.fail_copies.load(Ordering::SeqCst) > 0 {
                self.fail_copies.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::CaptureUnavailable("BitBlt failed".into()));
            }
            Ok(Frame::filled(surface.0, surface.1, (1, 2, 3)))
        }

        fn release(&mut self, _surface: (u32, u32)) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn region() -> CaptureGeometry {
        CaptureGeometry::new(10, 10, 50, 30)
    }

    #[test]
    fn test_same_region_reuses_surface() {
        let backend = CountingBackend::default();
        let mut capturer = RegionCapturer::new(backend.clone());

        let frame = capturer.capture(Some(&region())).unwrap();
        assert_eq!((frame.width, frame.height), (40, 20));
        capturer.capture(Some(&region())).unwrap();

        assert_eq!(backend.provisions.load(Ordering::SeqCst), 1);
        assert_eq!(capturer.backend().provisions.load(Ordering::SeqCst), 1);
        assert_eq!(capturer.provision_count(), 1);
    }

    #[test]
    fn test_changed_region_reprovisions_once() {
        let backend = CountingBackend::default();
        let mut capturer = RegionCapturer::new(backend.clone());

        capturer.capture(Some(&region())).unwrap();
        let moved = CaptureGeometry::new(0, 0, 80, 60);
        let frame = capturer.capture(Some(&moved)).unwrap();
        capturer.capture(Some(&moved)).unwrap();

        assert_eq!((frame.width, frame.height), (80, 60));
        assert_eq!(backend.provisions.load(Ordering::SeqCst), 2);
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_size_different_position_reprovisions() {
        let backend = CountingBackend::default();
        let mut capturer = RegionCapturer::new(backend.clone());

        capturer.capture(Some(&region())).unwrap();
        capturer
            .capture(Some(&CaptureGeometry::new(20, 10, 60, 30)))
            .unwrap();

        assert_eq!(backend.provisions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_width_skips_provisioning() {
        let backend = CountingBackend::default();
        let mut capturer = RegionCapturer::new(backend.clone());

        let result = capturer.capture(Some(&CaptureGeometry::new(0, 0, 0, 100)));
        assert!(matches!(result, Err(Error::InvalidGeometry { .. })));
        assert_eq!(backend.provisions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_region_is_unavailable() {
        let backend = CountingBackend::default();
        let mut capturer = RegionCapturer::new(backend.clone());

        assert!(matches!(
            capturer.capture(None),
            Err(Error::CaptureUnavailable(_))
        ));
        assert_eq!(backend.provisions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_copy_failure_releases_and_reprovisions() {
        let backend = CountingBackend::default();
        backend.fail_copies.store(1, Ordering::SeqCst);
        let mut capturer = RegionCapturer::new(backend.clone());

        assert!(capturer.capture(Some(&region())).is_err());
        assert!(!capturer.is_provisioned());
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);

        capturer.capture(Some(&region())).unwrap();
        assert_eq!(backend.provisions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_provision_failure_is_unavailable() {
        let backend = CountingBackend {
            fail_provision: true,
            ..Default::default()
        };
        let mut capturer = RegionCapturer::new(backend.clone());

        for _ in 0..3 {
            assert!(matches!(
                capturer.capture(Some(&region())),
                Err(Error::CaptureUnavailable(_))
            ));
        }
        assert_eq!(backend.provisions.load(Ordering::SeqCst), 3);
        assert_eq!(backend.releases.load(Ordering::SeqCst), 0);
        assert!(!capturer.is_provisioned());
    }

    #[test]
    fn test_close_is_idempotent_and_drop_releases() {
        let backend = CountingBackend::default();
        {
            let mut capturer = RegionCapturer::new(backend.clone());
            capturer.capture(Some(&region())).unwrap();
            capturer.close();
            capturer.close();
            assert_eq!(backend.releases.load(Ordering::SeqCst), 1);

            capturer.capture(Some(&region())).unwrap();
        }
        assert_eq!(backend.releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[ignore] // Requires an interactive desktop
    fn test_platform_capture() {
        let mut capturer = platform_capturer();
        if let Ok(frame) = capturer.capture(Some(&CaptureGeometry::new(0, 0, 64, 64))) {
            assert_eq!((frame.width, frame.height), (64, 64));
        }
    }
}
