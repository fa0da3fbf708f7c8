use std::collections::BTreeMap;

use nalgebra as na;

use crate::class::VehicleClass;
use crate::frame::FrameNumber;
use crate::vehicle::{Sample, Vehicle, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Appended,
    /// Older than the vehicle's last sample; dropped to keep frames ordered.
    Stale,
}

/// Id-keyed trajectories of every tracked vehicle.
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    vehicles: BTreeMap<VehicleId, Vehicle>,
    window: usize,
}

impl TrajectoryStore {
    /// `window` is the number of newest samples kept for speed estimation.
    pub fn new(window: usize) -> Self {
        Self {
            vehicles: BTreeMap::new(),
            window,
        }
    }

    pub fn upsert(
        &mut self,
        id: VehicleId,
        position: na::Point2<f64>,
        class: VehicleClass,
        frame: FrameNumber,
    ) -> Upsert {
        let sample = Sample::new(position, class, frame);

        match self.vehicles.get_mut(&id) {
            Some(vehicle) if frame < vehicle.last_seen_frame() => {
                tracing::warn!(
                    id,
                    frame,
                    last_seen = vehicle.last_seen_frame(),
                    "dropping out-of-order sample"
                );
                Upsert::Stale
            }
            Some(vehicle) => {
                vehicle.push(sample);
                Upsert::Appended
            }
            None => {
                self.vehicles
                    .insert(id, Vehicle::new(id, sample, self.window));
                Upsert::Created
            }
        }
    }

    #[inline]
    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    /// Newest samples of `id` (oldest first), `None` for unknown ids.
    pub fn speed_input(&self, id: VehicleId) -> Option<Vec<Sample>> {
        self.get(id).map(Vehicle::window)
    }

    /// Vehicles in ascending id order.
    #[inline]
    pub fn all(&self) -> impl Iterator<Item = (VehicleId, &Vehicle)> {
        self.vehicles.iter().map(|(id, v)| (*id, v))
    }

    #[inline]
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn remove(&mut self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.remove(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
