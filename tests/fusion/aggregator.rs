//! The aggregator worker driven directly through the bus.

use std::sync::Arc;

use microbus::fusion::{
    fusion_worker, CrashedBroadcast, FusionSlam, MemorySink, PoseEvent, TerminatedBroadcast,
    TrackedObjectsEvent,
};
use microbus::{Lifecycle, MessageBus, Statistics, WorkerId, WorkerThread};

use crate::support::{init_tracing, points, pose, tracked, SHORT, WAIT};

fn spawn_aggregator(bus: &Arc<MessageBus>, sink: &Arc<MemorySink>) -> WorkerThread<FusionSlam> {
    let slam = FusionSlam::new(Arc::new(Statistics::new()), sink.clone())
        .expect_producers(["pose", "lidar"]);
    let handle = WorkerThread::spawn(fusion_worker("fusion", Arc::clone(bus), slam)).unwrap();
    handle.lifecycle().wait_for(Lifecycle::Running);
    handle
}

fn observation(time: u64, id: &str, point: (f64, f64)) -> TrackedObjectsEvent {
    TrackedObjectsEvent {
        sender: WorkerId::new("lidar"),
        time,
        objects: vec![tracked(id, time, &[point])],
    }
}

fn pose_event(time: u64) -> PoseEvent {
    PoseEvent {
        sender: WorkerId::new("pose"),
        pose: pose(time, time as f64, 0.0, 0.0),
    }
}

fn done(sender: &str) -> TerminatedBroadcast {
    TerminatedBroadcast {
        sender: WorkerId::new(sender),
    }
}

// ============================================================================
// Test 1: Observations at T=5,6,7 wait for poses arriving 6, 5, 7
// ============================================================================

#[test]
fn observations_resolve_only_after_their_pose() {
    init_tracing();
    let bus = Arc::new(MessageBus::new());
    let sink = Arc::new(MemorySink::new());
    let aggregator = spawn_aggregator(&bus, &sink);

    let f5 = bus.send_event(observation(5, "five", (1.0, 0.0))).unwrap();
    let f6 = bus.send_event(observation(6, "six", (1.0, 0.0))).unwrap();
    let f7 = bus.send_event(observation(7, "seven", (1.0, 0.0))).unwrap();
    assert!(f5.get_timeout(SHORT).is_err());

    // 6 is known, but 5 is still missing
    assert_eq!(bus.send_event(pose_event(6)).unwrap().get_timeout(WAIT), Ok(()));
    assert!(!f6.is_done());
    assert!(f6.get_timeout(SHORT).is_err());

    assert_eq!(bus.send_event(pose_event(5)).unwrap().get_timeout(WAIT), Ok(()));
    assert_eq!(f5.get_timeout(WAIT), Ok(true));
    assert_eq!(f6.get_timeout(WAIT), Ok(true));
    assert!(!f7.is_done());

    assert_eq!(bus.send_event(pose_event(7)).unwrap().get_timeout(WAIT), Ok(()));
    assert_eq!(f7.get_timeout(WAIT), Ok(true));

    bus.send_broadcast(done("pose"));
    bus.send_broadcast(done("lidar"));
    let slam = aggregator.join().unwrap().state;

    assert_eq!(slam.pending_observations(), 0);
    assert_eq!(slam.remaining_producers(), 0);
    assert_eq!(slam.pose_at(6).map(|p| p.x), Some(6.0));
    assert!(slam.pose_at(8).is_none());
    assert_eq!(points(slam.landmark("five").unwrap()), vec![(6.0, 0.0)]);
    assert_eq!(points(slam.landmark("six").unwrap()), vec![(7.0, 0.0)]);
    assert_eq!(points(slam.landmark("seven").unwrap()), vec![(8.0, 0.0)]);

    let report = sink.last().unwrap();
    assert!(!report.is_crash());
    assert_eq!(report.unmatched_observations, 0);
    assert_eq!(report.statistics.num_landmarks, 3);
}

// ============================================================================
// Test 2: A known pose lets an observation through at once
// ============================================================================

#[test]
fn observation_with_known_pose_is_processed_immediately() {
    let bus = Arc::new(MessageBus::new());
    let sink = Arc::new(MemorySink::new());
    let aggregator = spawn_aggregator(&bus, &sink);

    bus.send_event(pose_event(2)).unwrap().get_timeout(WAIT).unwrap();
    let seen = bus.send_event(observation(2, "rock", (0.0, 3.0))).unwrap();
    assert_eq!(seen.get_timeout(WAIT), Ok(true));

    // repeat sighting refines the same landmark
    let again = bus.send_event(observation(2, "rock", (0.0, 5.0))).unwrap();
    assert_eq!(again.get_timeout(WAIT), Ok(true));

    bus.send_broadcast(done("lidar"));
    bus.send_broadcast(done("pose"));
    let slam = aggregator.join().unwrap().state;

    assert_eq!(slam.landmarks().len(), 1);
    assert_eq!(points(&slam.landmarks()[0]), vec![(2.0, 4.0)]);
}

// ============================================================================
// Test 3: Finalization waits for every expected producer, once each
// ============================================================================

#[test]
fn repeated_or_unknown_completions_do_not_finalize_early() {
    let bus = Arc::new(MessageBus::new());
    let sink = Arc::new(MemorySink::new());
    let aggregator = spawn_aggregator(&bus, &sink);

    bus.send_broadcast(done("pose"));
    bus.send_broadcast(done("pose"));
    bus.send_broadcast(done("camera"));
    // round trip through the mailbox to know the broadcasts were handled
    bus.send_event(pose_event(1)).unwrap().get_timeout(WAIT).unwrap();

    assert!(!aggregator.is_finished());
    assert!(sink.last().is_none());

    bus.send_broadcast(done("lidar"));
    let slam = aggregator.join().unwrap().state;
    assert_eq!(slam.remaining_producers(), 0);
    assert_eq!(sink.reports().len(), 1);
}

// ============================================================================
// Test 4: A crash finalizes at once with the poses seen so far
// ============================================================================

#[test]
fn crash_produces_partial_report() {
    let bus = Arc::new(MessageBus::new());
    let sink = Arc::new(MemorySink::new());
    let aggregator = spawn_aggregator(&bus, &sink);

    bus.send_event(pose_event(2)).unwrap().get_timeout(WAIT).unwrap();
    bus.send_event(pose_event(1)).unwrap().get_timeout(WAIT).unwrap();
    let orphan = bus.send_event(observation(3, "lost", (0.0, 0.0))).unwrap();

    bus.send_broadcast(CrashedBroadcast {
        sender: WorkerId::new("camera-1"),
        error: "lens cracked".into(),
    });
    let slam = aggregator.join().unwrap().state;

    let report = slam.report().unwrap();
    let crash = report.crash.as_ref().unwrap();
    assert_eq!(crash.error, "lens cracked");
    assert_eq!(crash.faulty_sensor, "camera-1");
    assert_eq!(crash.poses.iter().map(|p| p.time).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(report.unmatched_observations, 1);
    assert!(!orphan.is_done());
    assert_eq!(sink.last().as_ref(), Some(report));
}
