//! Background capture → classify → decide loop.
//!
//! One [`Processor`] drives one reroll run. It owns the capturer and the
//! classifier, publishes rank counts through a shared [`RankTally`], and talks
//! to the owning application only through [`RerollHost`]. Nothing that goes
//! wrong inside an iteration ends the loop; only a confirmed stop or
//! [`ProcessorHandle::stop`] does.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, SharedSettings, TimingConfig};
use crate::criteria::StopCriteria;
use crate::debounce::{DebounceController, DebounceOutcome};
use crate::detection::{DetectedObject, RankCounts};
use crate::error::{Error, Result};
use crate::notify::{
    DecisionEvent, DecisionLog, JsonlDecisionLog, RerollHost, SlotNotifier, UiUpdate,
    CONFIRMED_AFTER_DELAY,
};
use crate::tally::RankTally;
use crate::vision::{
    CaptureBackend, CaptureGeometry, Classifier, Frame, PaletteConfig, RegionCapturer,
};

/// Name of the worker thread.
pub const THREAD_NAME: &str = "pip-processor";

/// Status line posted when a capture attempt fails.
pub const CAPTURE_FAILED_MESSAGE: &str = "Screenshot capture failed. Retrying...";

/// What the worker should do after an iteration.
enum Step {
    Continue,
    Finished,
}

/// The processing loop, configured but not yet running.
pub struct Processor<B: CaptureBackend, C: Classifier> {
    timing: TimingConfig,
    settings: SharedSettings,
    capturer: RegionCapturer<B>,
    classifier: C,
    /// Classifier settings recorded with each decision
    palette: PaletteConfig,
    host: Arc<dyn RerollHost>,
    notifier: Option<SlotNotifier>,
    decision_log: Option<Box<dyn DecisionLog>>,
    tally: Arc<RankTally>,
}

impl<B, C> Processor<B, C>
where
    B: CaptureBackend + 'static,
    C: Classifier + 'static,
{
    /// Create a processor.
    ///
    /// The slot notifier and the decision log are set up from `config` when
    /// their switches are on; the builder methods override that.
    pub fn new(
        config: &Config,
        settings: SharedSettings,
        capturer: RegionCapturer<B>,
        classifier: C,
        host: Arc<dyn RerollHost>,
    ) -> Self {
        let notifier = config.enable_slots_socket.then(|| {
            SlotNotifier::localhost(config.slots_socket_port)
                .with_timeout(config.timing.notify_timeout())
                .with_top_k(config.top_k)
        });

        let decision_log = if config.enable_logging {
            match JsonlDecisionLog::open_default() {
                Ok(log) => Some(Box::new(log) as Box<dyn DecisionLog>),
                Err(e) => {
                    warn!("Decision logging disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            timing: config.timing,
            settings,
            capturer,
            classifier,
            palette: config.classifier,
            host,
            notifier,
            decision_log,
            tally: Arc::new(RankTally::new()),
        }
    }

    /// Forward top-K ranks to this notifier.
    pub fn with_notifier(mut self, notifier: SlotNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Record confirmed stops to this log.
    pub fn with_decision_log(mut self, log: impl DecisionLog + 'static) -> Self {
        self.decision_log = Some(Box::new(log));
        self
    }

    /// Shared tally the loop publishes to.
    pub fn tally(&self) -> Arc<RankTally> {
        Arc::clone(&self.tally)
    }

    /// Spawn the worker thread.
    pub fn start(self) -> Result<ProcessorHandle> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let tally = Arc::clone(&self.tally);

        let worker_flag = Arc::clone(&stop_flag);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || self.run(worker_flag))?;

        Ok(ProcessorHandle {
            stop_flag,
            tally,
            handle: Some(handle),
        })
    }

    fn run(mut self, stop_flag: Arc<AtomicBool>) {
        info!(
            poll_ms = self.timing.poll_delay_ms,
            confirm_ms = self.timing.confirm_delay_ms,
            "Processor started"
        );
        let mut debounce = DebounceController::new(self.timing.confirm_delay());

        while !stop_flag.load(Ordering::SeqCst) {
            match self.iterate(&mut debounce, &stop_flag) {
                Ok(Step::Continue) => {}
                Ok(Step::Finished) => {
                    stop_flag.store(true, Ordering::SeqCst);
                    break;
                }
                Err(e) => {
                    warn!("Processor error: {}", e);
                    self.host
                        .post(UiUpdate::Transient(format!("Processor error: {}", e)));
                    thread::sleep(self.timing.error_backoff());
                }
            }
        }

        self.capturer.close();
        info!("Processor stopped");
    }

    fn iterate(
        &mut self,
        debounce: &mut DebounceController,
        stop_flag: &AtomicBool,
    ) -> Result<Step> {
        let settings = self.settings.snapshot();

        let Some(region) = settings.region else {
            thread::sleep(self.timing.idle_wait());
            return Ok(Step::Continue);
        };

        let frame = match self.capturer.capture(Some(&region)) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Capture failed: {}", e);
                self.host
                    .post(UiUpdate::Transient(CAPTURE_FAILED_MESSAGE.to_string()));
                thread::sleep(self.timing.capture_retry());
                return Ok(Step::Continue);
            }
        };

        let objects = classify_contained(&mut self.classifier, &frame)?;

        if let Some(notifier) = &self.notifier {
            notifier.send_best_effort(&objects);
        }

        self.tally.replace(&objects);
        self.host.post(UiUpdate::Detections(objects.clone()));

        let capturer = &mut self.capturer;
        let classifier = &mut self.classifier;
        let host = &self.host;
        let outcome = debounce.advance(
            Instant::now(),
            &objects,
            &settings.criteria,
            || {
                let frame = capturer.capture(Some(&region))?;
                classify_contained(classifier, &frame)
            },
            || host.is_running() && !stop_flag.load(Ordering::SeqCst),
        )?;

        match outcome {
            DebounceOutcome::Confirmed(fresh) => {
                self.confirm_stop(fresh, &settings.criteria, region, settings.poll_delay.as_millis());
                return Ok(Step::Finished);
            }
            DebounceOutcome::Finished => return Ok(Step::Finished),
            DebounceOutcome::Cancelled => debug!("Pending stop cancelled"),
            DebounceOutcome::Idle | DebounceOutcome::Armed | DebounceOutcome::Waiting => {}
        }

        thread::sleep(settings.poll_delay);
        Ok(Step::Continue)
    }

    /// Publish a confirmed stop. The confirming detections replace the tally.
    fn confirm_stop(
        &mut self,
        objects: Vec<DetectedObject>,
        criteria: &StopCriteria,
        region: CaptureGeometry,
        poll_delay_ms: u128,
    ) {
        let counts = self.tally.replace(&objects);
        info!(%counts, criteria = %criteria.describe(), "Stop confirmed");

        if let Some(log) = self.decision_log.as_mut() {
            let event = DecisionEvent {
                timestamp: chrono::Local::now(),
                objects: objects.clone(),
                counts,
                criteria: *criteria,
                classifier: self.palette,
                region: Some(region),
                poll_delay_ms: u64::try_from(poll_delay_ms).unwrap_or(u64::MAX),
                confirm_delay_ms: self.timing.confirm_delay_ms,
                decision: CONFIRMED_AFTER_DELAY.to_string(),
            };
            if let Err(e) = log.record(&event) {
                warn!("Failed to record decision: {}", e);
            }
        }

        self.host.post(UiUpdate::StopConfirmed {
            objects,
            counts,
            reason: CONFIRMED_AFTER_DELAY.to_string(),
        });
        self.host.post(UiUpdate::Status(confirmed_status(
            self.timing.confirm_delay_ms,
            criteria,
        )));
        self.host.request_stop();
    }
}

/// Status line shown once a stop is confirmed.
pub fn confirmed_status(confirm_delay_ms: u64, criteria: &StopCriteria) -> String {
    format!(
        "Confirmed after {}ms: {} met. Signalling stop.",
        confirm_delay_ms,
        criteria.describe()
    )
}

/// Run the classifier, turning a panic into a classification error.
fn classify_contained<C: Classifier>(
    classifier: &mut C,
    frame: &Frame,
) -> Result<Vec<DetectedObject>> {
    match panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(frame))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Classification(format!("classifier panicked: {}", message)))
        }
    }
}

/// Control handle for a running [`Processor`].
pub struct ProcessorHandle {
    stop_flag: Arc<AtomicBool>,
    tally: Arc<RankTally>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessorHandle {
    /// Stop the worker and wait for it to release the capturer.
    ///
    /// Safe to call more than once. Called from the worker thread itself it
    /// only raises the flag.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            self.handle = Some(handle);
            return;
        }
        if handle.join().is_err() {
            warn!("Processor thread panicked");
        }
    }

    /// Wait for the worker to finish on its own.
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Other("Processor thread panicked".into())),
            None => Ok(()),
        }
    }

    /// Copy of the latest rank counts.
    pub fn counts(&self) -> RankCounts {
        self.tally.snapshot()
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Whether a stop was requested or reached.
    pub fn is_stopping(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }
}

impl Drop for ProcessorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::Rank;

    #[test]
    fn test_confirmed_status() {
        assert_eq!(
            confirmed_status(50, &StopCriteria::new(Rank::A, 3, 0)),
            "Confirmed after 50ms: Min A x3 met. Signalling stop."
        );
        assert_eq!(
            confirmed_status(80, &StopCriteria::new(Rank::S, 2, 1)),
            "Confirmed after 80ms: Min S x2, SS: 1 met. Signalling stop."
        );
    }

    #[test]
    fn test_classify_contains_panics() {
        let frame = Frame::filled(2, 2, (0, 0, 0));

        let mut panicking = |_: &Frame| -> Result<Vec<DetectedObject>> { panic!("bad model") };
        match classify_contained(&mut panicking, &frame) {
            Err(Error::Classification(message)) => assert!(message.contains("bad model")),
            other => panic!("unexpected result: {:?}", other),
        }

        let mut formatted = |_: &Frame| -> Result<Vec<DetectedObject>> { panic!("code {}", 7) };
        match classify_contained(&mut formatted, &frame) {
            Err(Error::Classification(message)) => assert!(message.contains("code 7")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_classify_passes_results_through() {
        let frame = Frame::filled(2, 2, (0, 0, 0));
        let mut classifier =
            |_: &Frame| -> Result<Vec<DetectedObject>> { Ok(vec![DetectedObject::at(Rank::S, 1, 1)]) };
        assert_eq!(
            classify_contained(&mut classifier, &frame).unwrap(),
            vec![DetectedObject::at(Rank::S, 1, 1)]
        );
    }
}
