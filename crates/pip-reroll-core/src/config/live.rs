//! Settings the UI may change while the processing loop runs.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::criteria::StopCriteria;
use crate::vision::CaptureGeometry;

/// Values read fresh by the processing loop at every iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSettings {
    pub criteria: StopCriteria,
    pub region: Option<CaptureGeometry>,
    pub poll_delay: Duration,
}

/// Shared handle to [`LiveSettings`].
///
/// Clones share the same values. Each setter touches one field; readers take
/// a copy so the lock is never held across capture or sleep.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<LiveSettings>>,
}

impl SharedSettings {
    pub fn new(settings: LiveSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> LiveSettings {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn criteria(&self) -> StopCriteria {
        self.snapshot().criteria
    }

    pub fn region(&self) -> Option<CaptureGeometry> {
        self.snapshot().region
    }

    pub fn poll_delay(&self) -> Duration {
        self.snapshot().poll_delay
    }

    pub fn set_criteria(&self, criteria: StopCriteria) {
        self.update(|settings| settings.criteria = criteria);
    }

    pub fn set_region(&self, region: Option<CaptureGeometry>) {
        self.update(|settings| settings.region = region);
    }

    pub fn set_poll_delay(&self, poll_delay: Duration) {
        self.update(|settings| settings.poll_delay = poll_delay);
    }

    fn update(&self, f: impl FnOnce(&mut LiveSettings)) {
        let mut settings = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::Rank;

    #[test]
    fn test_clones_share_updates() {
        let settings = SharedSettings::new(LiveSettings {
            criteria: StopCriteria::default(),
            region: None,
            poll_delay: Duration::from_millis(20),
        });
        let ui_side = settings.clone();

        ui_side.set_region(Some(CaptureGeometry::new(0, 0, 10, 10)));
        ui_side.set_criteria(StopCriteria::new(Rank::Ss, 1, 1));
        ui_side.set_poll_delay(Duration::from_millis(5));

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.region, Some(CaptureGeometry::new(0, 0, 10, 10)));
        assert_eq!(snapshot.criteria.minimum_rank, Rank::Ss);
        assert_eq!(snapshot.poll_delay, Duration::from_millis(5));
    }
}
