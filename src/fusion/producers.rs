//! Clock and sensor workers feeding the aggregator.
//!
//! ```text
//!   clock ──Tick──► pose ─────────PoseEvent──────────────┐
//!     │                                                   ▼
//!     └──Tick──► camera ─DetectObjectsEvent─► lidar ─TrackedObjectsEvent─► fusion
//! ```
//!
//! Every producer announces completion with a [`TerminatedBroadcast`] naming
//! itself, after the last message it sends. Since each mailbox is FIFO, a
//! consumer that sees a producer's completion has already seen all of that
//! producer's messages. Any worker that detects a fault broadcasts a
//! [`CrashedBroadcast`] and stops; every other worker stops when it sees one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use super::messages::{
    CrashedBroadcast, DetectObjectsEvent, PoseEvent, TerminatedBroadcast, TickBroadcast,
    TrackedObjectsEvent,
};
use super::objects::{
    DetectedObject, Pose, SensorStatus, StampedCloudPoints, StampedDetections, TrackedObject,
};
use super::tally::ProducerTally;
use crate::bus::{MessageBus, WorkerId};
use crate::service::{Context, Worker};
use crate::stats::Statistics;

/// Announce completion and stop.
fn finish(ctx: &mut Context<'_>) {
    let sender = ctx.name().clone();
    debug!(worker = %sender, "producer done");
    ctx.send_broadcast(TerminatedBroadcast { sender });
    ctx.terminate();
}

/// Report a fault to everyone and stop.
fn crash(ctx: &mut Context<'_>, error: String) {
    let sender = ctx.name().clone();
    error!(worker = %sender, %error, "sensor fault");
    ctx.send_broadcast(CrashedBroadcast { sender, error });
    ctx.terminate();
}

// ============================================================================
// Clock
// ============================================================================

/// Drives logical time.
#[derive(Debug)]
pub struct Clock {
    ticks: u64,
    interval: Duration,
    aggregator: WorkerId,
    statistics: Arc<Statistics>,
    last_tick: u64,
}

impl Clock {
    /// A clock that broadcasts ticks `1..=ticks` and stops early once
    /// `aggregator` announces it is done.
    pub fn new(ticks: u64, aggregator: impl Into<WorkerId>, statistics: Arc<Statistics>) -> Self {
        Self {
            ticks,
            interval: Duration::ZERO,
            aggregator: aggregator.into(),
            statistics,
            last_tick: 0,
        }
    }

    /// Real time to wait between ticks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    fn tick(&mut self, ctx: &Context<'_>, time: u64) {
        self.last_tick = time;
        self.statistics.add_runtime(1);
        ctx.send_broadcast(TickBroadcast { time });
    }
}

/// The clock hears its own ticks, so at most one tick is in flight ahead of
/// it and ticks stop as soon as the aggregator finishes.
pub fn clock_worker(name: impl Into<WorkerId>, bus: Arc<MessageBus>, clock: Clock) -> Worker<Clock> {
    Worker::new(name, bus, clock)
        .on_start(|clock, ctx| {
            if clock.ticks == 0 {
                finish(ctx);
            } else {
                clock.tick(ctx, 1);
            }
            Ok(())
        })
        .on_broadcast::<TickBroadcast, _>(|clock, ctx, tick| {
            if tick.time < clock.ticks {
                if !clock.interval.is_zero() {
                    thread::sleep(clock.interval);
                }
                clock.tick(ctx, tick.time + 1);
            } else {
                info!(ticks = tick.time, "clock finished");
                finish(ctx);
            }
            Ok(())
        })
        .on_broadcast::<TerminatedBroadcast, _>(|clock, ctx, done| {
            if done.sender == clock.aggregator {
                debug!(tick = clock.last_tick, "aggregator done; stopping clock");
                ctx.terminate();
            }
            Ok(())
        })
        .on_broadcast::<CrashedBroadcast, _>(|_, ctx, _| {
            ctx.terminate();
            Ok(())
        })
}

// ============================================================================
// Pose producer
// ============================================================================

/// Replays recorded poses, one per tick.
#[derive(Debug)]
pub struct PoseProducer {
    poses: BTreeMap<u64, Pose>,
    last_time: u64,
    clock: WorkerId,
    status: SensorStatus,
}

impl PoseProducer {
    pub fn new(poses: impl IntoIterator<Item = Pose>, clock: impl Into<WorkerId>) -> Self {
        let poses: BTreeMap<u64, Pose> = poses.into_iter().map(|p| (p.time, p)).collect();
        let last_time = poses.keys().next_back().copied().unwrap_or(0);
        Self {
            poses,
            last_time,
            clock: clock.into(),
            status: SensorStatus::Up,
        }
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }
}

pub fn pose_worker(
    name: impl Into<WorkerId>,
    bus: Arc<MessageBus>,
    producer: PoseProducer,
) -> Worker<PoseProducer> {
    Worker::new(name, bus, producer)
        .on_broadcast::<TickBroadcast, _>(|gps, ctx, tick| {
            if let Some(pose) = gps.poses.get(&tick.time) {
                let sender = ctx.name().clone();
                ctx.send_event(PoseEvent { sender, pose: *pose });
            }
            if tick.time >= gps.last_time {
                gps.status = SensorStatus::Down;
                finish(ctx);
            }
            Ok(())
        })
        .on_broadcast::<TerminatedBroadcast, _>(|gps, ctx, done| {
            if done.sender == gps.clock {
                gps.status = SensorStatus::Down;
                finish(ctx);
            }
            Ok(())
        })
        .on_broadcast::<CrashedBroadcast, _>(|_, ctx, _| {
            ctx.terminate();
            Ok(())
        })
}

// ============================================================================
// Camera
// ============================================================================

/// Replays recorded detections; detections stamped `t` are sent at tick
/// `t + frequency`.
#[derive(Debug)]
pub struct Camera {
    frequency: u64,
    detections: BTreeMap<u64, StampedDetections>,
    last_time: u64,
    clock: WorkerId,
    statistics: Arc<Statistics>,
    status: SensorStatus,
    last_frame: Option<StampedDetections>,
}

impl Camera {
    pub fn new(
        frequency: u64,
        detections: impl IntoIterator<Item = StampedDetections>,
        clock: impl Into<WorkerId>,
        statistics: Arc<Statistics>,
    ) -> Self {
        let detections: BTreeMap<u64, StampedDetections> =
            detections.into_iter().map(|d| (d.time, d)).collect();
        let last_time = detections.keys().next_back().copied().unwrap_or(0);
        Self {
            frequency,
            detections,
            last_time,
            clock: clock.into(),
            statistics,
            status: SensorStatus::Up,
            last_frame: None,
        }
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    /// The last detections sent downstream.
    pub fn last_frame(&self) -> Option<&StampedDetections> {
        self.last_frame.as_ref()
    }

    fn on_tick(&mut self, ctx: &mut Context<'_>, time: u64) {
        let Some(due) = time.checked_sub(self.frequency) else {
            return;
        };

        if let Some(frame) = self.detections.get(&due) {
            if let Some(fault) = frame.fault() {
                self.status = SensorStatus::Error;
                crash(ctx, fault.description.clone());
                return;
            }
            if !frame.detected_objects.is_empty() {
                let sender = ctx.name().clone();
                self.statistics
                    .add_detected(frame.detected_objects.len() as u64);
                ctx.send_event(DetectObjectsEvent {
                    sender,
                    detections: frame.clone(),
                });
                self.last_frame = Some(frame.clone());
            }
        }

        if due >= self.last_time {
            self.status = SensorStatus::Down;
            finish(ctx);
        }
    }
}

pub fn camera_worker(name: impl Into<WorkerId>, bus: Arc<MessageBus>, camera: Camera) -> Worker<Camera> {
    Worker::new(name, bus, camera)
        .on_broadcast::<TickBroadcast, _>(|camera, ctx, tick| {
            camera.on_tick(ctx, tick.time);
            Ok(())
        })
        .on_broadcast::<TerminatedBroadcast, _>(|camera, ctx, done| {
            if done.sender == camera.clock {
                camera.status = SensorStatus::Down;
                finish(ctx);
            }
            Ok(())
        })
        .on_broadcast::<CrashedBroadcast, _>(|_, ctx, _| {
            ctx.terminate();
            Ok(())
        })
}

// ============================================================================
// LiDAR
// ============================================================================

/// Cloud points recorded for each object and tick. Shared by every LiDAR.
#[derive(Debug, Clone, Default)]
pub struct LidarDatabase {
    rows: Vec<StampedCloudPoints>,
}

impl LidarDatabase {
    pub fn new(rows: Vec<StampedCloudPoints>) -> Self {
        Self { rows }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn lookup(&self, id: &str, time: u64) -> Option<&StampedCloudPoints> {
        self.rows.iter().find(|r| r.id == id && r.time == time)
    }

    /// Whether the database records a fault at `time`.
    pub fn fault_at(&self, time: u64) -> bool {
        self.rows.iter().any(|r| r.time == time && r.is_error())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Looks up cloud points for camera detections and forwards them to the
/// aggregator.
#[derive(Debug)]
pub struct LidarTracker {
    database: Arc<LidarDatabase>,
    cameras: ProducerTally,
    statistics: Arc<Statistics>,
    status: SensorStatus,
    last_tracked: Vec<TrackedObject>,
}

impl LidarTracker {
    /// `cameras` are the upstream workers this tracker waits on before it
    /// finishes.
    pub fn new<I, W>(database: Arc<LidarDatabase>, cameras: I, statistics: Arc<Statistics>) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<WorkerId>,
    {
        Self {
            database,
            cameras: ProducerTally::new(cameras),
            statistics,
            status: SensorStatus::Up,
            last_tracked: Vec::new(),
        }
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    pub fn last_tracked(&self) -> &[TrackedObject] {
        &self.last_tracked
    }

    /// Pair each detected object with its recorded points at `time`.
    pub fn track(&self, time: u64, objects: &[DetectedObject]) -> Vec<TrackedObject> {
        objects
            .iter()
            .map(|object| TrackedObject {
                id: object.id.clone(),
                time,
                description: object.description.clone(),
                coordinates: self
                    .database
                    .lookup(&object.id, time)
                    .map(StampedCloudPoints::points)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

pub fn lidar_worker(
    name: impl Into<WorkerId>,
    bus: Arc<MessageBus>,
    tracker: LidarTracker,
) -> Worker<LidarTracker> {
    Worker::new(name, bus, tracker)
        .on_event::<DetectObjectsEvent, _>(|lidar, ctx, event| {
            let time = event.detections.time;
            if lidar.database.fault_at(time) {
                lidar.status = SensorStatus::Error;
                ctx.complete(&event, false);
                let error = format!("lidar {} disconnected at tick {time}", ctx.name());
                crash(ctx, error);
                return Ok(());
            }

            let tracked = lidar.track(time, &event.detections.detected_objects);
            if !tracked.is_empty() {
                lidar.statistics.add_tracked(tracked.len() as u64);
                let sender = ctx.name().clone();
                ctx.send_event(TrackedObjectsEvent {
                    sender,
                    time,
                    objects: tracked.clone(),
                });
                lidar.last_tracked = tracked;
            }
            ctx.complete(&event, true);
            Ok(())
        })
        .on_broadcast::<TickBroadcast, _>(|lidar, ctx, _| {
            // no upstream cameras
            if lidar.cameras.is_empty() {
                lidar.status = SensorStatus::Down;
                finish(ctx);
            }
            Ok(())
        })
        .on_broadcast::<TerminatedBroadcast, _>(|lidar, ctx, done| {
            if lidar.cameras.finish(&done.sender) && lidar.cameras.is_empty() {
                lidar.status = SensorStatus::Down;
                finish(ctx);
            }
            Ok(())
        })
        .on_broadcast::<CrashedBroadcast, _>(|_, ctx, _| {
            ctx.terminate();
            Ok(())
        })
}
