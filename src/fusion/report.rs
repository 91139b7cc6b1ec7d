//! The aggregator's final output and where it goes.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::objects::{Landmark, Pose, StampedDetections, TrackedObject};
use crate::stats::StatisticsSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Why and where a run stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashReport {
    pub error: String,
    pub faulty_sensor: String,
    /// Poses recorded up to the crash, in tick order.
    pub poses: Vec<Pose>,
    #[serde(default)]
    pub last_frames: LastFrames,
}

/// What each sensor last sent downstream, keyed by worker name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastFrames {
    pub cameras: BTreeMap<String, StampedDetections>,
    pub lidars: BTreeMap<String, Vec<TrackedObject>>,
}

impl LastFrames {
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty() && self.lidars.is_empty()
    }
}

/// Map and statistics at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub statistics: StatisticsSnapshot,
    pub landmarks: Vec<Landmark>,
    /// Observations whose pose never arrived.
    pub unmatched_observations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crash: Option<CrashReport>,
}

impl FinalReport {
    pub fn is_crash(&self) -> bool {
        self.crash.is_some()
    }

    pub fn landmark(&self, id: &str) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.id == id)
    }

    pub fn to_json_pretty(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Receives the final report once the aggregator finalizes.
pub trait ReportSink: Send + Sync {
    fn deliver(&self, report: &FinalReport) -> Result<(), ReportError>;
}

/// Keeps every delivered report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<FinalReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FinalReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<FinalReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl ReportSink for MemorySink {
    fn deliver(&self, report: &FinalReport) -> Result<(), ReportError> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }
}

/// Writes each report as pretty-printed JSON to a writer.
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ReportSink for JsonSink<W> {
    fn deliver(&self, report: &FinalReport) -> Result<(), ReportError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer_pretty(&mut *writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
