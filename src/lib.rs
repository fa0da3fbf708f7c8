pub mod bbox;
pub mod class;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod map;
pub mod math;
pub mod projector;
pub mod reaper;
pub mod renderer;
pub mod source;
pub mod speed;
pub mod store;
pub mod tiles;
pub mod vehicle;

mod circular_queue;

pub use class::VehicleClass;
pub use config::Config;
pub use detection::Detection;
pub use frame::Frame;
pub use map::TrafficMap;
pub use vehicle::{Sample, Vehicle, VehicleId};

use error::Error;
use nalgebra as na;

/// Camera space to map space. Camera points arrive with y growing upwards.
pub trait Projection {
    fn project(&self, camera: na::Point2<f64>) -> Result<na::Point2<f64>, Error>;
}
