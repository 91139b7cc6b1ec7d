//! Wires a full fusion run from a configuration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::aggregator::{fusion_worker, FusionSlam};
use super::objects::{Pose, SensorStatus, StampedCloudPoints, StampedDetections};
use super::producers::{
    camera_worker, clock_worker, lidar_worker, pose_worker, Camera, Clock, LidarDatabase,
    LidarTracker, PoseProducer,
};
use super::report::{FinalReport, LastFrames, MemorySink, ReportError, ReportSink};
use crate::bus::{MessageBus, WorkerId};
use crate::service::{
    Lifecycle, LifecycleProbe, Worker, WorkerError, WorkerOutcome, WorkerStats, WorkerThread,
};
use crate::stats::Statistics;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("worker name {0:?} is used more than once")]
    DuplicateName(String),
    #[error("worker name must not be empty")]
    EmptyName,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("aggregator stopped without producing a report")]
    MissingReport,
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Upper bound on how long shutdown waits for a worker still starting up.
const STARTUP_WAIT: Duration = Duration::from_secs(5);

fn default_clock_name() -> String {
    "clock".to_string()
}

fn default_aggregator_name() -> String {
    "fusion-slam".to_string()
}

fn default_pose_name() -> String {
    "pose".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockConfig {
    #[serde(default = "default_clock_name")]
    pub name: String,
    /// Last tick to broadcast.
    pub ticks: u64,
    #[serde(default)]
    pub tick_interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            name: default_clock_name(),
            ticks: 0,
            tick_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    pub name: String,
    #[serde(default)]
    pub frequency: u64,
    #[serde(default)]
    pub detections: Vec<StampedDetections>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LidarConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default = "default_aggregator_name")]
    pub aggregator: String,
    #[serde(default = "default_pose_name")]
    pub pose_producer: String,
    #[serde(default)]
    pub poses: Vec<Pose>,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub lidars: Vec<LidarConfig>,
    #[serde(default)]
    pub lidar_data: Vec<StampedCloudPoints>,
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Every worker needs a distinct, non-empty name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let names = [&self.clock.name, &self.aggregator, &self.pose_producer]
            .into_iter()
            .chain(self.cameras.iter().map(|c| &c.name))
            .chain(self.lidars.iter().map(|l| &l.name));
        for name in names {
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateName(name.clone()));
            }
        }
        Ok(())
    }
}

/// Statistics of one worker after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub name: WorkerId,
    pub stats: WorkerStats,
    /// Final sensor status; `None` for the clock and the aggregator.
    pub status: Option<SensorStatus>,
}

#[derive(Debug)]
pub struct SimulationReport {
    pub report: FinalReport,
    pub workers: Vec<WorkerSummary>,
}

impl SimulationReport {
    pub fn worker(&self, name: &str) -> Option<&WorkerSummary> {
        self.workers.iter().find(|w| w.name == name)
    }
}

/// One run of the fusion pipeline on its own bus.
pub struct Simulation {
    config: SimulationConfig,
    bus: Arc<MessageBus>,
    statistics: Arc<Statistics>,
    sink: Arc<dyn ReportSink>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            bus: Arc::new(MessageBus::new()),
            statistics: Arc::new(Statistics::new()),
            sink: Arc::new(MemorySink::new()),
        })
    }

    /// Deliver the final report to `sink` once every worker has stopped.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }

    /// Start every worker, run until the aggregator finalizes, and join them.
    ///
    /// The clock starts last, once every other worker is subscribed, so no
    /// tick is missed. The report goes to the sink only after every sensor
    /// has been joined, so a crash report carries each sensor's last frame.
    pub fn run(self) -> Result<SimulationReport, SimulationError> {
        let Simulation {
            config,
            bus,
            statistics,
            sink,
        } = self;
        let clock_name = WorkerId::new(&config.clock.name);
        let database = Arc::new(LidarDatabase::new(config.lidar_data));
        let camera_names: Vec<WorkerId> = config.cameras.iter().map(|c| WorkerId::new(&c.name)).collect();

        let mut running = Running::new(&bus);

        let slam = FusionSlam::new(Arc::clone(&statistics), Arc::new(MemorySink::new()))
            .expect_producers(
                std::iter::once(config.pose_producer.clone())
                    .chain(config.lidars.iter().map(|l| l.name.clone())),
            );
        let aggregator = running.spawn(fusion_worker(config.aggregator.as_str(), Arc::clone(&bus), slam))?;

        let pose = running.spawn(pose_worker(
            config.pose_producer.as_str(),
            Arc::clone(&bus),
            PoseProducer::new(config.poses, clock_name.clone()),
        ))?;

        let mut lidars = Vec::with_capacity(config.lidars.len());
        for lidar in &config.lidars {
            let tracker = LidarTracker::new(Arc::clone(&database), camera_names.clone(), Arc::clone(&statistics));
            lidars.push(running.spawn(lidar_worker(lidar.name.as_str(), Arc::clone(&bus), tracker))?);
        }

        let mut cameras = Vec::with_capacity(config.cameras.len());
        for camera in config.cameras {
            let state = Camera::new(camera.frequency, camera.detections, clock_name.clone(), Arc::clone(&statistics));
            cameras.push(running.spawn(camera_worker(camera.name.as_str(), Arc::clone(&bus), state))?);
        }

        running.wait_until_running();
        info!(workers = running.names.len(), "all workers subscribed; starting clock");

        let clock = Clock::new(config.clock.ticks, config.aggregator.as_str(), Arc::clone(&statistics))
            .with_interval(Duration::from_millis(config.clock.tick_interval_ms));
        let clock = running.spawn(clock_worker(clock_name, Arc::clone(&bus), clock))?;

        // Join every worker before anything that waits on it, so a failed
        // worker is seen before its consumers could block on it.
        let mut workers = Vec::new();
        let mut last_frames = LastFrames::default();
        for camera in cameras {
            let name = camera.name().to_string();
            let camera = running.join(camera, &mut workers, |c: &Camera| Some(c.status()))?;
            if let Some(frame) = camera.last_frame() {
                last_frames.cameras.insert(name, frame.clone());
            }
        }
        running.join(pose, &mut workers, |p: &PoseProducer| Some(p.status()))?;
        for lidar in lidars {
            let name = lidar.name().to_string();
            let tracker = running.join(lidar, &mut workers, |l: &LidarTracker| Some(l.status()))?;
            if !tracker.last_tracked().is_empty() {
                last_frames.lidars.insert(name, tracker.last_tracked().to_vec());
            }
        }
        running.join(clock, &mut workers, |_| None)?;
        let slam = running.join(aggregator, &mut workers, |_| None)?;

        let mut report = slam.into_report().ok_or(SimulationError::MissingReport)?;
        if let Some(crash) = report.crash.as_mut() {
            crash.last_frames = last_frames;
        }
        sink.deliver(&report)?;
        Ok(SimulationReport { report, workers })
    }
}

/// Threads started so far. Dropping it unregisters every worker once it is
/// running, which ends any thread still blocked on its mailbox.
struct Running<'a> {
    bus: &'a MessageBus,
    names: Vec<WorkerId>,
    probes: Vec<LifecycleProbe>,
}

impl<'a> Running<'a> {
    fn new(bus: &'a MessageBus) -> Self {
        Self {
            bus,
            names: Vec::new(),
            probes: Vec::new(),
        }
    }

    fn spawn<S: Send + 'static>(&mut self, worker: Worker<S>) -> Result<WorkerThread<S>, WorkerError> {
        let thread = WorkerThread::spawn(worker)?;
        self.names.push(thread.name().clone());
        self.probes.push(thread.lifecycle().clone());
        Ok(thread)
    }

    fn wait_until_running(&self) {
        for probe in &self.probes {
            probe.wait_for(Lifecycle::Running);
        }
    }

    fn join<S: Send + 'static>(
        &self,
        thread: WorkerThread<S>,
        summaries: &mut Vec<WorkerSummary>,
        status: fn(&S) -> Option<SensorStatus>,
    ) -> Result<S, WorkerError> {
        let name = thread.name().clone();
        let WorkerOutcome { state, stats } = thread.join().inspect_err(|error| {
            warn!(worker = %name, %error, "worker failed; stopping the rest");
        })?;
        let status = status(&state);
        if let Some(status) = status {
            debug!(worker = %name, %status, "sensor stopped");
        }
        summaries.push(WorkerSummary { name, stats, status });
        Ok(state)
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        for (name, probe) in self.names.iter().zip(&self.probes) {
            // Unregistering before the worker registers would leave it
            // blocked forever. Every exit path of `Worker::run` ends in
            // `Unregistered`, so this wait only runs long for a worker
            // that is still starting up.
            if probe.wait_for_timeout(Lifecycle::Running, STARTUP_WAIT).is_none() {
                warn!(worker = %name, "worker did not start in time; unregistering anyway");
            }
            self.bus.unregister(name);
        }
    }
}
