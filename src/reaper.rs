use std::collections::BTreeSet;

use crate::frame::FrameNumber;
use crate::store::TrajectoryStore;
use crate::vehicle::{Vehicle, VehicleId};

/// Evicts vehicles that have not been detected for the inactivity window.
///
/// Sweeping only reads the store. Evictions are applied separately, once the
/// frame has been rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reaper {
    fps: f64,
    inactivity_seconds: f64,
}

impl Reaper {
    pub const DEFAULT_INACTIVITY_SECONDS: f64 = 5.0;

    pub fn new(fps: f64) -> Self {
        Self::with_inactivity(fps, Self::DEFAULT_INACTIVITY_SECONDS)
    }

    pub fn with_inactivity(fps: f64, inactivity_seconds: f64) -> Self {
        Self {
            fps,
            inactivity_seconds,
        }
    }

    #[inline]
    pub fn seconds_inactive(&self, vehicle: &Vehicle, current_frame: FrameNumber) -> f64 {
        current_frame.saturating_sub(vehicle.last_seen_frame()) as f64 / self.fps
    }

    #[inline]
    pub fn is_stale(&self, vehicle: &Vehicle, current_frame: FrameNumber) -> bool {
        self.seconds_inactive(vehicle, current_frame) >= self.inactivity_seconds
    }

    pub fn sweep(&self, store: &TrajectoryStore, current_frame: FrameNumber) -> BTreeSet<VehicleId> {
        store
            .all()
            .filter(|(_, v)| self.is_stale(v, current_frame))
            .map(|(id, _)| id)
            .collect()
    }

    /// Removes the swept ids, returning how many were still present.
    pub fn apply(store: &mut TrajectoryStore, evicted: &BTreeSet<VehicleId>) -> usize {
        evicted
            .iter()
            .filter(|&&id| {
                let removed = store.remove(id).is_some();
                if removed {
                    tracing::debug!(id, "vehicle evicted");
                }
                removed
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::VehicleClass;
    use nalgebra as na;

    fn store_with(last_seen: &[(VehicleId, FrameNumber)]) -> TrajectoryStore {
        let mut store = TrajectoryStore::new(5);
        for &(id, frame) in last_seen {
            store.upsert(id, na::Point2::new(0.0, 0.0), VehicleClass::Car, frame);
        }
        store
    }

    #[test]
    fn evicts_at_exactly_five_seconds() {
        let reaper = Reaper::new(10.0);
        let store = store_with(&[(1, 10)]);

        assert!(reaper.sweep(&store, 59).is_empty());
        assert_eq!(reaper.sweep(&store, 60).into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn fractional_frame_rate_threshold() {
        let reaper = Reaper::new(7.95);
        let store = store_with(&[(1, 100)]);

        // 39 frames is 4.9 s, 40 frames is 5.03 s
        assert!(reaper.sweep(&store, 139).is_empty());
        assert!(reaper.sweep(&store, 140).contains(&1));
    }

    #[test]
    fn sweep_is_read_only_until_applied() {
        let reaper = Reaper::new(1.0);
        let mut store = store_with(&[(1, 1), (2, 8), (3, 2)]);

        let evicted = reaper.sweep(&store, 8);
        assert_eq!(evicted.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(store.len(), 3);

        assert_eq!(Reaper::apply(&mut store, &evicted), 2);
        assert_eq!(store.all().map(|(id, _)| id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(Reaper::apply(&mut store, &evicted), 0);
    }

    #[test]
    fn future_samples_are_not_stale() {
        let reaper = Reaper::new(1.0);
        let store = store_with(&[(1, 50)]);

        assert!(reaper.sweep(&store, 10).is_empty());
    }
}
