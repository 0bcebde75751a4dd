// Camera frame sources feeding the vision pipeline

use std::collections::VecDeque;
use tracing::debug;

use super::VisionError;
use crate::messages::CameraObservation;

/// A camera frame stamped with its capture time in the runtime clock (seconds)
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedObservation {
    pub timestamp: f64,
    pub observation: CameraObservation,
}

pub trait CameraSource {
    fn name(&self) -> &str;

    /// Every frame received since the last call, oldest first. Never blocks;
    /// empty when nothing new arrived.
    fn latest_unread_observations(&mut self) -> Result<Vec<TimestampedObservation>, VisionError>;
}

/// Bounded buffer of frames received from the network, drained once per tick
#[derive(Debug, Clone)]
pub struct ObservationBuffer {
    name: String,
    pending: VecDeque<TimestampedObservation>,
    capacity: usize,
}

impl ObservationBuffer {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            pending: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Queue a frame received at `received_at`; capture time backs out the reported latency.
    /// The oldest frame is dropped when full.
    pub fn push(&mut self, observation: CameraObservation, received_at: f64) {
        let latency = observation.latency_ms.max(0.0) / 1000.0;
        if self.pending.len() == self.capacity {
            self.pending.pop_front();
            debug!("Camera {} buffer full, dropped oldest frame", self.name);
        }
        self.pending.push_back(TimestampedObservation {
            timestamp: received_at - latency,
            observation,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl CameraSource for ObservationBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn latest_unread_observations(&mut self) -> Result<Vec<TimestampedObservation>, VisionError> {
        Ok(self.pending.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_backs_out_latency() {
        let mut buffer = ObservationBuffer::new("front", 4);
        buffer.push(
            CameraObservation {
                latency_ms: 30.0,
                ..Default::default()
            },
            10.0,
        );
        let frames = buffer.latest_unread_observations().unwrap();
        assert_eq!(frames.len(), 1);
        assert!((frames[0].timestamp - 9.97).abs() < 1e-9);
    }

    #[test]
    fn test_drain_marks_frames_read() {
        let mut buffer = ObservationBuffer::new("front", 4);
        buffer.push(CameraObservation::default(), 1.0);
        buffer.push(CameraObservation::default(), 1.1);
        assert_eq!(buffer.latest_unread_observations().unwrap().len(), 2);
        assert!(buffer.latest_unread_observations().unwrap().is_empty());
    }

    #[test]
    fn test_full_buffer_drops_oldest() {
        let mut buffer = ObservationBuffer::new("front", 2);
        for t in [1.0, 2.0, 3.0] {
            buffer.push(CameraObservation::default(), t);
        }
        let frames = buffer.latest_unread_observations().unwrap();
        let stamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![2.0, 3.0]);
    }
}
