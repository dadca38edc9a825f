mod common;
mod ort;
mod palm;

use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{
    config::ModelConfig,
    geometry::{palm_metrics, pick_primary_hand},
    types::{Frame, HandLandmarks, HandObservation},
};

pub use self::ort::OrtEngine;
use self::palm::PalmDetectorConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectedHand {
    pub landmarks: HandLandmarks,
    pub confidence: f32,
}

/// Landmark detector: every hand found in one frame, coordinates normalized
/// to the frame.
pub trait HandposeEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>>;
}

/// Sending half of a single-slot channel where a new value replaces one the
/// receiver has not taken yet.
#[derive(Clone, Debug)]
pub struct LatestSender<T> {
    tx: Sender<T>,
    stale: Receiver<T>,
}

pub fn latest_channel<T>() -> (LatestSender<T>, Receiver<T>) {
    let (tx, rx) = bounded(1);
    let stale = rx.clone();
    (LatestSender { tx, stale }, rx)
}

impl<T> LatestSender<T> {
    pub fn publish(&self, mut value: T) {
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.stale.try_recv();
                    value = rejected;
                }
                // Unreachable while `stale` keeps the channel open.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Loads both ORT models on a worker thread and turns camera frames into
/// observations for the control loop.
pub fn start_recognizer(
    model: ModelConfig,
    frame_rx: Receiver<Frame>,
    observation_tx: LatestSender<HandObservation>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let palm_config = PalmDetectorConfig {
            score_threshold: model.palm_score_threshold,
            ..PalmDetectorConfig::default()
        };
        let engine = match OrtEngine::new(
            &model.handpose_path,
            &model.palm_path,
            palm_config,
            model.max_hands,
        ) {
            Ok(engine) => {
                log::info!(
                    "handpose ORT backend ready using {} and palm detector {}",
                    model.handpose_path.display(),
                    model.palm_path.display()
                );
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT hand models: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, model.min_confidence, frame_rx, observation_tx);
    })
}

/// Runs until the frame stream closes, always on the newest frame.
pub fn run_worker_loop<E: HandposeEngine>(
    mut engine: E,
    min_confidence: f32,
    frame_rx: Receiver<Frame>,
    observation_tx: LatestSender<HandObservation>,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let hands = match engine.infer(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("handpose inference failed: {err:?}");
                continue;
            }
        };

        observation_tx.publish(build_observation(&hands, &frame, min_confidence));
    }
    log::info!("frame stream closed, stopping recognizer");
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

/// Keeps the largest confident hand; the rest are ignored. Hands whose palm
/// collapsed to a line (landmarks clamped onto a frame edge) never count.
pub fn build_observation(
    hands: &[DetectedHand],
    frame: &Frame,
    min_confidence: f32,
) -> HandObservation {
    let confident: Vec<HandLandmarks> = hands
        .iter()
        .filter(|hand| hand.confidence >= min_confidence)
        .filter(|hand| palm_metrics(&hand.landmarks).area > 0.0)
        .map(|hand| hand.landmarks)
        .collect();

    HandObservation {
        hand: pick_primary_hand(&confident).copied(),
        frame_width: frame.width,
        frame_height: frame.height,
        timestamp: frame.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::fixtures::{Pose, hand, scaled_about_wrist};

    struct Scripted {
        replies: Vec<anyhow::Result<Vec<DetectedHand>>>,
    }

    impl HandposeEngine for Scripted {
        fn infer(&mut self, _frame: &Frame) -> anyhow::Result<Vec<DetectedHand>> {
            if self.replies.is_empty() {
                return Ok(Vec::new());
            }
            self.replies.remove(0)
        }
    }

    fn frame(at: Instant) -> Frame {
        Frame {
            rgba: vec![0; 4 * 4 * 4],
            width: 4,
            height: 4,
            timestamp: at,
        }
    }

    fn detected(landmarks: HandLandmarks, confidence: f32) -> DetectedHand {
        DetectedHand {
            landmarks,
            confidence,
        }
    }

    #[test]
    fn low_confidence_hands_are_dropped() {
        let obs = build_observation(&[detected(hand(Pose::Two), 0.3)], &frame(Instant::now()), 0.5);
        assert!(obs.hand.is_none());
        assert_eq!((obs.frame_width, obs.frame_height), (4, 4));
    }

    #[test]
    fn largest_confident_hand_wins() {
        let small = scaled_about_wrist(&hand(Pose::Four), 0.5);
        let big = hand(Pose::Two);
        let huge_but_unsure = scaled_about_wrist(&hand(Pose::Ok), 1.5);
        let obs = build_observation(
            &[
                detected(small, 0.9),
                detected(big, 0.8),
                detected(huge_but_unsure, 0.1),
            ],
            &frame(Instant::now()),
            0.5,
        );
        assert_eq!(obs.hand, Some(big));
    }

    #[test]
    fn worker_skips_failed_frames() {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(1);
        let (obs_tx, obs_rx) = latest_channel();
        frame_tx.send(frame(Instant::now())).unwrap();
        drop(frame_tx);

        let engine = Scripted {
            replies: vec![Err(anyhow::anyhow!("bad frame"))],
        };
        run_worker_loop(engine, 0.5, frame_rx, obs_tx);
        assert!(obs_rx.try_recv().is_err());
    }

    #[test]
    fn worker_only_processes_the_newest_frame() {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(4);
        let (obs_tx, obs_rx) = latest_channel();
        let start = Instant::now();
        let newest = start + std::time::Duration::from_millis(66);
        frame_tx.send(frame(start)).unwrap();
        frame_tx.send(frame(start + std::time::Duration::from_millis(33))).unwrap();
        frame_tx.send(frame(newest)).unwrap();
        drop(frame_tx);

        let engine = Scripted {
            replies: vec![Ok(vec![detected(hand(Pose::Three), 0.9)])],
        };
        run_worker_loop(engine, 0.5, frame_rx, obs_tx);

        let obs: Vec<HandObservation> = obs_rx.try_iter().collect();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].timestamp, newest);
        assert_eq!(obs[0].hand, Some(hand(Pose::Three)));
    }

    #[test]
    fn unread_observation_is_replaced_by_the_newer_one() {
        let (tx, rx) = latest_channel();
        tx.publish(1);
        tx.publish(2);
        tx.publish(3);
        assert_eq!(rx.try_recv(), Ok(3));
        assert!(rx.try_recv().is_err());

        tx.publish(4);
        assert_eq!(rx.try_recv(), Ok(4));
    }

    /// Queues its second frame only while the first is being processed.
    struct Relay {
        next: Option<(Sender<Frame>, Frame)>,
        script: Scripted,
    }

    impl HandposeEngine for Relay {
        fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>> {
            if let Some((tx, next)) = self.next.take() {
                tx.send(next).unwrap();
            }
            self.script.infer(frame)
        }
    }

    #[test]
    fn worker_keeps_only_the_latest_observation_for_a_busy_consumer() {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(1);
        let (obs_tx, obs_rx) = latest_channel();
        let start = Instant::now();
        let last = start + std::time::Duration::from_millis(33);
        frame_tx.send(frame(start)).unwrap();

        let engine = Relay {
            next: Some((frame_tx, frame(last))),
            script: Scripted {
                replies: vec![
                    Ok(vec![detected(hand(Pose::Two), 0.9)]),
                    Ok(vec![detected(hand(Pose::Four), 0.9)]),
                ],
            },
        };
        run_worker_loop(engine, 0.5, frame_rx, obs_tx);

        let obs: Vec<HandObservation> = obs_rx.try_iter().collect();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].timestamp, last);
        assert_eq!(obs[0].hand, Some(hand(Pose::Four)));
    }

    #[test]
    fn collapsed_palm_is_not_a_hand() {
        let mut points = *hand(Pose::Two).points();
        for p in points.iter_mut().take(5) {
            p.x = 0.0;
        }
        let flat = HandLandmarks::new(points);
        let obs = build_observation(&[detected(flat, 0.9)], &frame(Instant::now()), 0.5);
        assert!(obs.hand.is_none());
    }
}
