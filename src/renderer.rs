use std::path::Path;

use nalgebra as na;
use opencv::{
    core::{self, Mat},
    imgcodecs, imgproc,
    prelude::*,
};
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::histogram::{self, ClassCounts, ClassHistogram};
use crate::math;
use crate::speed::SpeedEstimator;
use crate::store::TrajectoryStore;
use crate::tiles::{TileFetcher, TileSource};
use crate::vehicle::Vehicle;

const START_MARKER_RADIUS: i32 = 3;
const CURRENT_MARKER_RADIUS: i32 = 5;

/// Geographic extent of the map, in map space.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl MapBounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self, Error> {
        let bounds = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        bounds.validate()?;

        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());

        if !finite || self.x_max <= self.x_min || self.y_max <= self.y_min {
            return Err(Error::InvalidBounds {
                x_min: self.x_min,
                x_max: self.x_max,
                y_min: self.y_min,
                y_max: self.y_max,
            });
        }

        Ok(())
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f64> {
        na::Point2::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn contains(&self, p: na::Point2<f64>) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    /// Raster `(cols, rows)` covering the bounds at a slippy-map zoom level.
    pub fn raster_size(&self, zoom: u8) -> (i32, i32) {
        let resolution = math::zoom_resolution(zoom);

        (
            (self.width() / resolution).ceil().max(1.0) as i32,
            (self.height() / resolution).ceil().max(1.0) as i32,
        )
    }
}

/// Affine map space to raster pixel mapping; map y grows towards row 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMapper {
    bounds: MapBounds,
    cols: i32,
    rows: i32,
}

impl PixelMapper {
    pub fn new(bounds: MapBounds, cols: i32, rows: i32) -> Self {
        Self { bounds, cols, rows }
    }

    pub fn to_pixel(&self, p: na::Point2<f64>) -> core::Point {
        let b = &self.bounds;
        let u = (p.x - b.x_min) / b.width() * (self.cols - 1) as f64;
        let v = (b.y_max - p.y) / b.height() * (self.rows - 1) as f64;

        core::Point::new(u.round() as i32, v.round() as i32)
    }

    pub fn in_raster(&self, px: core::Point) -> bool {
        px.x >= 0 && px.x < self.cols && px.y >= 0 && px.y < self.rows
    }
}

/// Pristine map raster; every render starts from a copy of it.
pub struct Background {
    raster: Mat,
}

impl Background {
    pub fn new(raster: Mat) -> Result<Self, Error> {
        if raster.rows() <= 0 || raster.cols() <= 0 {
            return Err(Error::EmptyBackground);
        }

        Ok(Self { raster })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let raster = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;

        Self::new(raster)
    }

    pub fn solid(cols: i32, rows: i32, color: core::Scalar) -> Result<Self, Error> {
        if rows <= 0 || cols <= 0 {
            return Err(Error::EmptyBackground);
        }

        Self::new(Mat::new_rows_cols_with_default(
            rows,
            cols,
            core::CV_8UC3,
            color,
        )?)
    }

    /// Basemap tiles covering `bounds`, fetched once.
    pub fn from_tiles(bounds: &MapBounds, zoom: u8, source: &TileSource) -> Result<Self, Error> {
        let fetcher = TileFetcher::new(source.clone())?;

        Self::new(fetcher.mosaic(bounds, zoom)?)
    }

    /// Basemap of `bounds` at `zoom`. Without a tile source, or when the
    /// tiles cannot be fetched, a dark canvas of the same size stands in.
    pub fn for_bounds(
        bounds: &MapBounds,
        zoom: u8,
        basemap: Option<&TileSource>,
    ) -> Result<Self, Error> {
        if let Some(source) = basemap {
            match Self::from_tiles(bounds, zoom, source) {
                Ok(background) => return Ok(background),
                Err(err) => tracing::warn!(%err, "basemap unavailable, drawing on a plain canvas"),
            }
        }

        let (cols, rows) = bounds.raster_size(zoom);
        Self::solid(cols, rows, core::Scalar::new(38.0, 34.0, 34.0, 0.0))
    }

    #[inline]
    pub fn cols(&self) -> i32 {
        self.raster.cols()
    }

    #[inline]
    pub fn rows(&self) -> i32 {
        self.raster.rows()
    }

    pub fn fresh_copy(&self) -> Result<Mat, Error> {
        Ok(self.raster.try_clone()?)
    }
}

pub struct Rendered {
    pub raster: Mat,
    pub counts: ClassCounts,
}

/// Composites trajectories, speed labels and the class histogram over the
/// background.
pub struct MapRenderer {
    background: Background,
    mapper: PixelMapper,
    histogram: ClassHistogram,
    estimator: SpeedEstimator,
}

impl MapRenderer {
    pub fn new(
        bounds: MapBounds,
        background: Background,
        histogram: ClassHistogram,
        estimator: SpeedEstimator,
    ) -> Result<Self, Error> {
        bounds.validate()?;

        let mapper = PixelMapper::new(bounds, background.cols(), background.rows());

        tracing::info!(
            cols = background.cols(),
            rows = background.rows(),
            "map raster ready"
        );

        Ok(Self {
            background,
            mapper,
            histogram,
            estimator,
        })
    }

    #[inline]
    pub fn mapper(&self) -> &PixelMapper {
        &self.mapper
    }

    #[inline]
    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn render(&self, store: &TrajectoryStore) -> Result<Rendered, Error> {
        let mut raster = self.background.fresh_copy()?;

        for vehicle in store.vehicles() {
            self.draw_trajectory(&mut raster, vehicle)?;
        }

        for vehicle in store.vehicles() {
            if let Some(kmph) = self.estimator.estimate(vehicle) {
                self.draw_speed(&mut raster, vehicle, kmph)?;
            }
        }

        let counts = self.histogram.render(&mut raster, store.vehicles())?;

        Ok(Rendered { raster, counts })
    }

    fn draw_trajectory(&self, raster: &mut Mat, vehicle: &Vehicle) -> Result<(), Error> {
        let trail = vehicle.trail();
        let start = vehicle.first();

        imgproc::circle(
            raster,
            self.mapper.to_pixel(start.position),
            START_MARKER_RADIUS,
            start.class.color(),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        // each segment takes the color of the sample it ends at
        for pair in trail.windows(2) {
            imgproc::line(
                raster,
                self.mapper.to_pixel(pair[0].position),
                self.mapper.to_pixel(pair[1].position),
                pair[1].class.color(),
                1,
                imgproc::LINE_8,
                0,
            )?;
        }

        let last = vehicle.last();
        imgproc::circle(
            raster,
            self.mapper.to_pixel(last.position),
            CURRENT_MARKER_RADIUS,
            last.class.color(),
            1,
            imgproc::LINE_AA,
            0,
        )?;

        Ok(())
    }

    fn draw_speed(&self, raster: &mut Mat, vehicle: &Vehicle, kmph: f64) -> Result<(), Error> {
        let at = self.mapper.to_pixel(vehicle.last().position);

        histogram::put_text(
            raster,
            &format!("{:.0} km/h", kmph),
            core::Point::new(
                at.x + CURRENT_MARKER_RADIUS + 2,
                at.y - CURRENT_MARKER_RADIUS - 2,
            ),
            core::Scalar::new(255.0, 255.0, 255.0, 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::VehicleClass;
    use crate::histogram::HistogramStyle;

    fn bounds() -> MapBounds {
        MapBounds::new(0.0, 100.0, 0.0, 50.0).unwrap()
    }

    fn pixel(raster: &Mat, p: core::Point) -> [u8; 3] {
        let px = raster.at_2d::<core::Vec3b>(p.y, p.x).unwrap();
        [px[0], px[1], px[2]]
    }

    fn renderer(cols: i32, rows: i32) -> MapRenderer {
        let background = Background::solid(cols, rows, core::Scalar::all(0.0)).unwrap();

        // histogram parked outside the drawn area
        let style = HistogramStyle {
            margin: 10_000,
            ..Default::default()
        };

        MapRenderer::new(
            bounds(),
            background,
            ClassHistogram::new(style),
            SpeedEstimator::new(10.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn corners_map_to_raster_corners() {
        let mapper = PixelMapper::new(bounds(), 201, 101);

        assert_eq!(mapper.to_pixel(na::Point2::new(0.0, 50.0)), core::Point::new(0, 0));
        assert_eq!(mapper.to_pixel(na::Point2::new(100.0, 0.0)), core::Point::new(200, 100));
        assert_eq!(mapper.to_pixel(na::Point2::new(50.0, 25.0)), core::Point::new(100, 50));
    }

    #[test]
    fn north_is_up() {
        let mapper = PixelMapper::new(bounds(), 201, 101);
        let south = mapper.to_pixel(na::Point2::new(10.0, 10.0));
        let north = mapper.to_pixel(na::Point2::new(10.0, 40.0));

        assert!(north.y < south.y);
        assert!(mapper.in_raster(north));
        assert!(!mapper.in_raster(mapper.to_pixel(na::Point2::new(-10.0, 10.0))));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(matches!(
            MapBounds::new(1.0, 0.0, 0.0, 1.0),
            Err(Error::InvalidBounds { .. })
        ));
        assert!(MapBounds::new(0.0, f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn raster_size_follows_zoom() {
        let b = MapBounds::new(0.0, 660.2, 0.0, 410.9).unwrap();
        let (cols, rows) = b.raster_size(18);

        // ~0.597 m per pixel at zoom 18
        assert_eq!((cols, rows), (1106, 689));
    }

    #[test]
    fn empty_background_is_rejected() {
        assert!(matches!(
            Background::solid(0, 10, core::Scalar::all(0.0)),
            Err(Error::EmptyBackground)
        ));
    }

    #[test]
    fn unreachable_basemap_falls_back_to_canvas() {
        let b = MapBounds::new(0.0, 660.2, 0.0, 410.9).unwrap();
        let source = TileSource {
            url: "http://127.0.0.1:9/{z}/{x}/{y}.png".into(),
            timeout_secs: 1,
        };

        let background = Background::for_bounds(&b, 18, Some(&source)).unwrap();
        assert_eq!((background.cols(), background.rows()), (1106, 689));

        let offline = Background::for_bounds(&b, 18, None).unwrap();
        assert_eq!((offline.cols(), offline.rows()), (1106, 689));
    }

    #[test]
    fn render_leaves_background_untouched() {
        let renderer = renderer(201, 101);
        let mut store = TrajectoryStore::new(5);
        store.upsert(1, na::Point2::new(10.0, 25.0), VehicleClass::Car, 1);
        store.upsert(1, na::Point2::new(90.0, 25.0), VehicleClass::Car, 2);

        let first = renderer.render(&store).unwrap();
        let second = renderer.render(&store).unwrap();

        let start = renderer.mapper().to_pixel(na::Point2::new(10.0, 25.0));
        let [b, g, r] = VehicleClass::Car.info().color;
        assert_eq!(pixel(&first.raster, start), [b, g, r]);
        assert_eq!(pixel(&second.raster, start), [b, g, r]);

        let pristine = renderer.background().fresh_copy().unwrap();
        assert_eq!(pixel(&pristine, start), [0, 0, 0]);
    }

    #[test]
    fn segments_take_the_class_of_their_end_sample() {
        let renderer = renderer(201, 101);
        let mut store = TrajectoryStore::new(5);
        store.upsert(1, na::Point2::new(10.0, 40.0), VehicleClass::Car, 1);
        store.upsert(1, na::Point2::new(50.0, 40.0), VehicleClass::Car, 2);
        store.upsert(1, na::Point2::new(90.0, 40.0), VehicleClass::Truck, 3);

        let out = renderer.render(&store).unwrap();
        let mapper = renderer.mapper();

        let car = VehicleClass::Car.info().color;
        let truck = VehicleClass::Truck.info().color;

        // midpoints of each horizontal segment
        assert_eq!(pixel(&out.raster, mapper.to_pixel(na::Point2::new(30.0, 40.0))), car);
        assert_eq!(pixel(&out.raster, mapper.to_pixel(na::Point2::new(70.0, 40.0))), truck);
        assert_eq!(out.counts.get(VehicleClass::Truck), 1);
    }
}
