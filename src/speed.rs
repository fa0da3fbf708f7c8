use crate::math;
use crate::vehicle::{Sample, Vehicle};

/// Ground speed from the newest sample and the one `window - 1` samples
/// before it. No smoothing in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedEstimator {
    fps: f64,
    reference_latitude: f64,
    window: usize,
}

impl SpeedEstimator {
    pub const DEFAULT_WINDOW: usize = 5;

    pub fn new(fps: f64, reference_latitude: f64) -> Self {
        Self::with_window(fps, reference_latitude, Self::DEFAULT_WINDOW)
    }

    pub fn with_window(fps: f64, reference_latitude: f64, window: usize) -> Self {
        Self {
            fps,
            reference_latitude,
            window: window.max(2),
        }
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Speed in km/h, `None` while the vehicle has too few samples.
    pub fn estimate(&self, vehicle: &Vehicle) -> Option<f64> {
        self.estimate_window(&vehicle.window())
    }

    /// `samples` must be ordered oldest first.
    pub fn estimate_window(&self, samples: &[Sample]) -> Option<f64> {
        if samples.len() < self.window {
            return None;
        }

        let from = &samples[samples.len() - self.window];
        let to = &samples[samples.len() - 1];

        let frames = to.frame.checked_sub(from.frame)?;
        if frames == 0 {
            return None;
        }

        let meters =
            math::ground_distance(from.position, to.position, self.reference_latitude).floor();
        let seconds = frames as f64 / self.fps;

        Some(meters / seconds * 3600.0 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::VehicleClass;
    use crate::frame::FrameNumber;
    use approx::assert_abs_diff_eq;
    use nalgebra as na;

    fn sample(x: f64, frame: FrameNumber) -> Sample {
        Sample::new(na::Point2::new(x, 0.0), VehicleClass::Car, frame)
    }

    #[test]
    fn unavailable_until_fifth_sample() {
        let estimator = SpeedEstimator::new(10.0, 0.0);
        let mut vehicle = Vehicle::new(1, sample(0.0, 1), 5);

        for frame in 2..=4 {
            vehicle.push(sample(frame as f64 * 10.0, frame));
            assert_eq!(estimator.estimate(&vehicle), None);
        }

        vehicle.push(sample(50.0, 5));
        assert!(estimator.estimate(&vehicle).is_some());
    }

    #[test]
    fn hundred_meters_in_five_frames() {
        let estimator = SpeedEstimator::new(10.0, 0.0);
        let samples = [
            sample(0.0, 0),
            sample(20.0, 1),
            sample(40.0, 2),
            sample(60.0, 3),
            sample(100.0, 5),
        ];

        // 100 m in 0.5 s
        assert_abs_diff_eq!(estimator.estimate_window(&samples).unwrap(), 720.0);
    }

    #[test]
    fn uses_only_window_endpoints() {
        let estimator = SpeedEstimator::new(10.0, 0.0);
        let samples = [
            sample(-500.0, 0),
            sample(0.0, 1),
            sample(900.0, 2),
            sample(-900.0, 3),
            sample(5.0, 4),
            sample(10.0, 5),
        ];

        // 10 m between frames 1 and 5: 0.4 s
        assert_abs_diff_eq!(estimator.estimate_window(&samples).unwrap(), 90.0);
    }

    #[test]
    fn distance_is_floored_and_latitude_scaled() {
        let estimator = SpeedEstimator::new(1.0, 60.0);
        let samples: Vec<_> = (0..5).map(|f| sample(f as f64 * 5.99, f)).collect();

        // 23.96 map units * cos(60°) = 11.98 m, floored to 11 m over 4 s
        assert_abs_diff_eq!(
            estimator.estimate_window(&samples).unwrap(),
            11.0 / 4.0 * 3.6,
            epsilon = 1e-9
        );
    }

    #[test]
    fn zero_frame_delta_is_unavailable() {
        let estimator = SpeedEstimator::new(10.0, 0.0);
        let samples: Vec<_> = (0..5).map(|i| sample(i as f64, 7)).collect();

        assert_eq!(estimator.estimate_window(&samples), None);
    }
}
