//! Decision event log.
//!
//! Records why a run was stopped: the confirming detections, the counts at
//! the time, and the settings in force. One JSON object per line.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::criteria::StopCriteria;
use crate::detection::{DetectedObject, RankCounts};
use crate::error::{Error, Result};
use crate::vision::{CaptureGeometry, PaletteConfig};

/// Reason recorded for a stop confirmed by the debounce check.
pub const CONFIRMED_AFTER_DELAY: &str = "StopConditionMetAfterDelay: Confirmed stop after delay";

/// A single logged decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// When the decision was made
    pub timestamp: DateTime<Local>,
    /// Detections that confirmed the stop
    pub objects: Vec<DetectedObject>,
    /// Rank counts at decision time
    pub counts: RankCounts,
    /// Criteria in force
    pub criteria: StopCriteria,
    /// Classifier settings in force
    #[serde(default)]
    pub classifier: PaletteConfig,
    /// Capture region in force
    pub region: Option<CaptureGeometry>,
    /// Poll delay in force
    pub poll_delay_ms: u64,
    /// Confirmation delay in force
    pub confirm_delay_ms: u64,
    /// Why the decision was made
    pub decision: String,
}

impl DecisionEvent {
    /// Format the timestamp for display
    pub fn formatted_datetime(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Sink for decision events.
pub trait DecisionLog: Send {
    fn record(&mut self, event: &DecisionEvent) -> Result<()>;
}

/// Appends decision events to a JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonlDecisionLog {
    path: PathBuf,
}

impl JsonlDecisionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log in the user config directory.
    pub fn open_default() -> Result<Self> {
        Self::default_path()
            .map(Self::new)
            .ok_or_else(|| Error::Config("No config directory available for the event log".into()))
    }

    /// Default log file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pip-reroll").join("decisions.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every parseable entry, oldest first.
    pub fn entries(&self) -> Result<Vec<DecisionEvent>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Ok(entry) = serde_json::from_str::<DecisionEvent>(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

impl DecisionLog for JsonlDecisionLog {
    fn record(&mut self, event: &DecisionEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::Rank;

    fn event(decision: &str) -> DecisionEvent {
        let objects = vec![
            DetectedObject::at(Rank::A, 0, 0),
            DetectedObject::at(Rank::Ss, 10, 0),
        ];
        DecisionEvent {
            timestamp: Local::now(),
            counts: RankCounts::from_objects(&objects),
            objects,
            criteria: StopCriteria::new(Rank::A, 2, 1),
            classifier: PaletteConfig {
                tolerance: 25,
                min_area: 8,
            },
            region: Some(CaptureGeometry::new(0, 0, 200, 40)),
            poll_delay_ms: 20,
            confirm_delay_ms: 50,
            decision: decision.to_string(),
        }
    }

    #[test]
    fn test_record_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JsonlDecisionLog::new(dir.path().join("nested").join("decisions.jsonl"));

        log.record(&event(CONFIRMED_AFTER_DELAY)).unwrap();
        log.record(&event("second")).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].decision, CONFIRMED_AFTER_DELAY);
        assert_eq!(entries[0].counts.get(Rank::Ss), 1);
        assert_eq!(entries[1].decision, "second");
    }

    #[test]
    fn test_entry_without_classifier_uses_defaults() {
        let mut json = serde_json::to_value(event("x")).unwrap();
        json.as_object_mut().unwrap().remove("classifier");

        let entry: DecisionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(entry.classifier, PaletteConfig::default());
    }

    #[test]
    fn test_entries_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlDecisionLog::new(dir.path().join("missing.jsonl"));
        assert!(log.entries().unwrap().is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(event("x")).unwrap();
        assert_eq!(json["criteria"]["minimum_rank"], "A");
        assert_eq!(json["counts"]["SS"], 1);
        assert_eq!(json["objects"][1]["rank"], "SS");
        assert_eq!(json["region"]["right"], 200);
        assert_eq!(json["classifier"]["tolerance"], 25);
        assert_eq!(json["classifier"]["min_area"], 8);
    }
}
