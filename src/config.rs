use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::histogram::HistogramStyle;
use crate::math;
use crate::projector::{CoordinateProjector, Correction};
use crate::reaper::Reaper;
use crate::renderer::{Background, MapBounds};
use crate::speed::SpeedEstimator;
use crate::tiles::TileSource;

/// Camera calibration: homography rows plus the empirical corrections.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Calibration {
    pub homography: [[f64; 3]; 3],
    pub x_offset: f64,
    pub shift_threshold: f64,
    pub shift_slope: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            homography: [
                [1.44148602e+05, -2.98484538e+06, -1.00982323e+07],
                [-7.47233399e+04, 1.54733778e+06, 5.22176396e+06],
                [-1.42749785e-02, 2.95577907e-01, 1.00000000e+00],
            ],
            x_offset: 30.0,
            shift_threshold: -10098330.5,
            shift_slope: 0.4,
        }
    }
}

impl Calibration {
    pub fn correction(&self) -> Correction {
        Correction {
            x_offset: self.x_offset,
            shift_threshold: self.shift_threshold,
            shift_slope: self.shift_slope,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub calibration: Calibration,
    /// Web-Mercator extent of the map.
    pub bounds: MapBounds,
    /// Frame rate of the source video.
    pub fps: f64,
    /// Degrees. Derived from the middle of `bounds` when absent.
    pub reference_latitude: Option<f64>,
    pub inactivity_seconds: f64,
    /// Samples between the two ends of a speed measurement, both included.
    pub speed_window: usize,
    /// Slippy-map zoom of the basemap when no background image is given.
    pub zoom: u8,
    pub background: Option<PathBuf>,
    /// Tile server for the basemap; `null` draws on a plain canvas.
    pub basemap: Option<TileSource>,
    pub histogram: HistogramStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            bounds: MapBounds {
                x_min: -10098545.5,
                x_max: -10097885.3,
                y_min: 5234813.7,
                y_max: 5235224.6,
            },
            fps: 7.95,
            reference_latitude: None,
            inactivity_seconds: Reaper::DEFAULT_INACTIVITY_SECONDS,
            speed_window: SpeedEstimator::DEFAULT_WINDOW,
            zoom: 18,
            background: None,
            basemap: Some(TileSource::default()),
            histogram: HistogramStyle::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects configurations the pipeline cannot start with.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(Error::InvalidFps(self.fps));
        }

        if !self.inactivity_seconds.is_finite() || self.inactivity_seconds <= 0.0 {
            return Err(Error::InvalidInactivity(self.inactivity_seconds));
        }

        if self.speed_window < 2 {
            return Err(Error::InvalidSpeedWindow(self.speed_window));
        }

        self.bounds.validate()?;
        self.projector()?;

        Ok(())
    }

    pub fn reference_latitude(&self) -> f64 {
        self.reference_latitude
            .unwrap_or_else(|| math::mercator_to_lat_lon(self.bounds.center()).0)
    }

    pub fn projector(&self) -> Result<CoordinateProjector, Error> {
        CoordinateProjector::from_rows(self.calibration.homography, self.calibration.correction())
    }

    pub fn speed_estimator(&self) -> SpeedEstimator {
        SpeedEstimator::with_window(self.fps, self.reference_latitude(), self.speed_window)
    }

    pub fn reaper(&self) -> Reaper {
        Reaper::with_inactivity(self.fps, self.inactivity_seconds)
    }

    pub fn load_background(&self) -> Result<Background, Error> {
        match &self.background {
            Some(path) => Background::load(path),
            None => Background::for_bounds(&self.bounds, self.zoom, self.basemap.as_ref()),
        }
    }
}
