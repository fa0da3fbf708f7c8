use nalgebra as na;

use crate::circular_queue::CircularQueue;
use crate::class::VehicleClass;
use crate::frame::FrameNumber;

pub type VehicleId = i64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: na::Point2<f64>, // map space
    pub class: VehicleClass,
    pub frame: FrameNumber,
}

impl Sample {
    pub fn new(position: na::Point2<f64>, class: VehicleClass, frame: FrameNumber) -> Self {
        Self {
            position,
            class,
            frame,
        }
    }
}

/// A tracked vehicle.
///
/// Keeps two views of its history: a short ring buffer of the newest samples
/// for speed estimation and the full trail for drawing. The trail grows for
/// as long as the vehicle stays tracked.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    recent: CircularQueue<Sample>,
    trail: Vec<Sample>,
}

impl Vehicle {
    pub fn new(id: VehicleId, first: Sample, window: usize) -> Self {
        let mut recent = CircularQueue::with_capacity(window);
        recent.push(first);

        Self {
            id,
            recent,
            trail: vec![first],
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.recent.push(sample);
        self.trail.push(sample);
    }

    #[inline]
    pub fn last(&self) -> &Sample {
        // never empty: created with one sample, samples are only appended
        &self.trail[self.trail.len() - 1]
    }

    #[inline]
    pub fn first(&self) -> &Sample {
        &self.trail[0]
    }

    #[inline]
    pub fn last_seen_frame(&self) -> FrameNumber {
        self.last().frame
    }

    #[inline]
    pub fn last_class(&self) -> VehicleClass {
        self.last().class
    }

    #[inline]
    pub fn trail(&self) -> &[Sample] {
        &self.trail
    }

    /// The newest samples, oldest first, at most the ring buffer's capacity.
    pub fn window(&self) -> Vec<Sample> {
        self.recent.asc_iter().copied().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.trail.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }
}
