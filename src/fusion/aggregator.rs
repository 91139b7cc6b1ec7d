//! The fusion aggregator: turns tracked observations and poses into a map.
//!
//! Subscribes to [`PoseEvent`] and [`TrackedObjectsEvent`]. Observations are
//! held in a [`CorrelationBuffer`] until the pose for their tick is known,
//! then transformed into the world frame and merged into the landmark list.
//!
//! The aggregator finalizes once every expected producer has sent a
//! [`TerminatedBroadcast`], or immediately on a [`CrashedBroadcast`]. On a
//! clean finish it announces its own termination so the clock can stop.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::correlation::CorrelationBuffer;
use super::messages::{
    CrashedBroadcast, PoseEvent, TerminatedBroadcast, TickBroadcast, TrackedObjectsEvent,
};
use super::objects::{Landmark, Pose, TrackedObject};
use super::report::{CrashReport, FinalReport, LastFrames, ReportSink};
use super::tally::ProducerTally;
use super::transform::{FrameTransform, PlanarTransform};
use crate::bus::{Delivery, MessageBus, WorkerId};
use crate::service::{Context, HandlerError, Worker};
use crate::stats::Statistics;

type Observation = Delivery<TrackedObjectsEvent>;

/// State owned by the aggregator worker.
pub struct FusionSlam {
    landmarks: Vec<Landmark>,
    buffer: CorrelationBuffer<Observation>,
    transform: Box<dyn FrameTransform>,
    producers: ProducerTally,
    statistics: Arc<Statistics>,
    sink: Arc<dyn ReportSink>,
    report: Option<FinalReport>,
}

impl FusionSlam {
    pub fn new(statistics: Arc<Statistics>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            landmarks: Vec::new(),
            buffer: CorrelationBuffer::new(),
            transform: Box::new(PlanarTransform),
            producers: ProducerTally::default(),
            statistics,
            sink,
            report: None,
        }
    }

    pub fn with_transform(mut self, transform: impl FrameTransform + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// Workers whose [`TerminatedBroadcast`] must arrive before finalizing.
    pub fn expect_producers<I, W>(mut self, producers: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<WorkerId>,
    {
        self.producers = ProducerTally::new(producers);
        self
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn landmark(&self, id: &str) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.id == id)
    }

    pub fn pose_at(&self, time: u64) -> Option<&Pose> {
        self.buffer.position(time)
    }

    /// Observations still waiting for their pose.
    pub fn pending_observations(&self) -> usize {
        self.buffer.pending_len()
    }

    pub fn remaining_producers(&self) -> usize {
        self.producers.remaining()
    }

    pub fn report(&self) -> Option<&FinalReport> {
        self.report.as_ref()
    }

    pub fn into_report(self) -> Option<FinalReport> {
        self.report
    }

    /// Merge objects observed from `pose` into the map.
    pub fn observe(&mut self, pose: &Pose, objects: &[TrackedObject]) {
        for object in objects {
            let world = self.transform.to_world(pose, &object.coordinates);
            match self.landmarks.iter_mut().find(|l| l.id == object.id) {
                Some(landmark) => landmark.merge(&world),
                None => {
                    trace!(id = %object.id, time = pose.time, "new landmark");
                    self.landmarks
                        .push(Landmark::new(&object.id, &object.description, world));
                    self.statistics.add_landmarks(1);
                }
            }
        }
    }

    fn apply(&mut self, ctx: &Context<'_>, ready: Vec<(Pose, Observation)>) {
        for (pose, observation) in ready {
            self.observe(&pose, &observation.objects);
            ctx.complete(&observation, true);
        }
    }

    fn on_pose(&mut self, ctx: &mut Context<'_>, event: Delivery<PoseEvent>) {
        let ready = self.buffer.record_position(event.pose);
        ctx.complete(&event, ());
        if !ready.is_empty() {
            debug!(time = event.pose.time, released = ready.len(), "pose released buffered observations");
        }
        self.apply(ctx, ready);
    }

    fn on_observation(&mut self, ctx: &mut Context<'_>, event: Observation) {
        let time = event.time;
        match self.buffer.offer(time, event) {
            Some(ready) => self.apply(ctx, vec![ready]),
            None => trace!(time, "observation buffered until its pose arrives"),
        }
    }

    fn build_report(&self, crash: Option<&CrashedBroadcast>) -> FinalReport {
        FinalReport {
            statistics: self.statistics.snapshot(),
            landmarks: self.landmarks.clone(),
            unmatched_observations: self.buffer.pending_len(),
            crash: crash.map(|c| CrashReport {
                error: c.error.clone(),
                faulty_sensor: c.sender.to_string(),
                poses: self.buffer.positions().copied().collect(),
                // sensor state lives in the sensor workers
                last_frames: LastFrames::default(),
            }),
        }
    }

    /// Build and deliver the final report, then stop the worker.
    ///
    /// Runs at most once.
    fn finalize(
        &mut self,
        ctx: &mut Context<'_>,
        crash: Option<&CrashedBroadcast>,
    ) -> Result<(), HandlerError> {
        if self.report.is_some() {
            return Ok(());
        }

        // No more poses are coming; anything whose pose is known can go in.
        let ready = self.buffer.sweep();
        self.apply(ctx, ready);

        let report = self.build_report(crash);
        info!(
            worker = %ctx.name(),
            landmarks = report.landmarks.len(),
            unmatched = report.unmatched_observations,
            crashed = report.is_crash(),
            "fusion finalized"
        );

        ctx.terminate();
        if crash.is_none() {
            let sender = ctx.name().clone();
            ctx.send_broadcast(TerminatedBroadcast { sender });
        }

        let delivered = self.sink.deliver(&report);
        self.report = Some(report);
        Ok(delivered?)
    }
}

/// Build the aggregator worker around `slam`.
pub fn fusion_worker(
    name: impl Into<WorkerId>,
    bus: Arc<MessageBus>,
    slam: FusionSlam,
) -> Worker<FusionSlam> {
    Worker::new(name, bus, slam)
        .on_event::<PoseEvent, _>(|slam, ctx, event| {
            slam.on_pose(ctx, event);
            Ok(())
        })
        .on_event::<TrackedObjectsEvent, _>(|slam, ctx, event| {
            slam.on_observation(ctx, event);
            Ok(())
        })
        .on_broadcast::<TickBroadcast, _>(|slam, ctx, _| {
            // nothing to wait for
            if slam.producers.is_empty() {
                slam.finalize(ctx, None)?;
            }
            Ok(())
        })
        .on_broadcast::<TerminatedBroadcast, _>(|slam, ctx, done| {
            if slam.producers.finish(&done.sender) {
                debug!(producer = %done.sender, remaining = slam.producers.remaining(), "producer finished");
                if slam.producers.is_empty() {
                    slam.finalize(ctx, None)?;
                }
            }
            Ok(())
        })
        .on_broadcast::<CrashedBroadcast, _>(|slam, ctx, crash| {
            warn!(sensor = %crash.sender, error = %crash.error, "sensor crashed; finalizing");
            slam.finalize(ctx, Some(crash.as_ref()))
        })
}
