//! Slippy-map basemap tiles stitched into a map background.

use std::ops::RangeInclusive;
use std::time::Duration;

use nalgebra as na;
use opencv::{
    core::{self, Mat},
    imgcodecs, imgproc,
    prelude::*,
};
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::math;
use crate::renderer::MapBounds;

const TILE_PX: i64 = math::TILE_SIZE as i64;

/// XYZ tile server; `url` holds `{z}`, `{x}` and `{y}` placeholders.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TileSource {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            url: "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png".into(),
            timeout_secs: 10,
        }
    }
}

impl TileSource {
    pub fn url(&self, zoom: u8, x: i64, y: i64) -> String {
        self.url
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

/// Pixel window of a [`MapBounds`] in the global tile raster at one zoom
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    pub zoom: u8,
    left: i64,
    top: i64,
    cols: i32,
    rows: i32,
}

impl TileWindow {
    /// The window is sized like [`MapBounds::raster_size`], so the cropped
    /// mosaic lines up with the renderer's pixel mapping.
    pub fn covering(bounds: &MapBounds, zoom: u8) -> Self {
        let (col, row) = math::world_pixel(na::Point2::new(bounds.x_min, bounds.y_max), zoom);
        let (cols, rows) = bounds.raster_size(zoom);

        Self {
            zoom,
            left: col.floor() as i64,
            top: row.floor() as i64,
            cols,
            rows,
        }
    }

    pub fn tile_cols(&self) -> RangeInclusive<i64> {
        tile_span(self.left, self.cols)
    }

    pub fn tile_rows(&self) -> RangeInclusive<i64> {
        tile_span(self.top, self.rows)
    }

    pub fn tile_count(&self) -> usize {
        self.tile_cols().count() * self.tile_rows().count()
    }

    /// Region of the stitched mosaic covered by the bounds.
    pub fn crop(&self) -> core::Rect {
        let x = self.left - self.tile_cols().start() * TILE_PX;
        let y = self.top - self.tile_rows().start() * TILE_PX;

        core::Rect::new(x as i32, y as i32, self.cols, self.rows)
    }
}

fn tile_span(first_px: i64, len: i32) -> RangeInclusive<i64> {
    let last_px = first_px + i64::from(len.max(1)) - 1;

    first_px.div_euclid(TILE_PX)..=last_px.div_euclid(TILE_PX)
}

/// Stitches the tiles of `window`, row by row, and crops the result to it.
pub fn assemble<F>(window: &TileWindow, mut tile: F) -> Result<Mat, Error>
where
    F: FnMut(i64, i64) -> Result<Mat, Error>,
{
    let mut strips = core::Vector::<Mat>::new();

    for y in window.tile_rows() {
        let mut strip = core::Vector::<Mat>::new();
        for x in window.tile_cols() {
            strip.push(fit_tile(tile(x, y)?, window.zoom, x, y)?);
        }

        let mut row = Mat::default();
        core::hconcat(&strip, &mut row)?;
        strips.push(row);
    }

    let mut mosaic = Mat::default();
    core::vconcat(&strips, &mut mosaic)?;

    Ok(Mat::roi(&mosaic, window.crop())?.try_clone()?)
}

fn fit_tile(tile: Mat, zoom: u8, x: i64, y: i64) -> Result<Mat, Error> {
    if tile.rows() <= 0 || tile.cols() <= 0 {
        return Err(Error::Tile {
            zoom,
            x,
            y,
            reason: "not a decodable image".into(),
        });
    }

    let side = TILE_PX as i32;
    if tile.rows() == side && tile.cols() == side {
        return Ok(tile);
    }

    let mut resized = Mat::default();
    imgproc::resize(
        &tile,
        &mut resized,
        core::Size::new(side, side),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    Ok(resized)
}

/// Downloads basemap tiles over HTTP.
pub struct TileFetcher {
    client: reqwest::blocking::Client,
    source: TileSource,
}

impl TileFetcher {
    pub fn new(source: TileSource) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(source.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, source })
    }

    pub fn fetch(&self, zoom: u8, x: i64, y: i64) -> Result<Mat, Error> {
        let url = self.source.url(zoom, x, y);
        let bytes = self.client.get(&url).send()?.error_for_status()?.bytes()?;

        tracing::trace!(%url, len = bytes.len(), "tile fetched");

        let buf = core::Vector::<u8>::from_iter(bytes.iter().copied());
        Ok(imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?)
    }

    pub fn mosaic(&self, bounds: &MapBounds, zoom: u8) -> Result<Mat, Error> {
        let window = TileWindow::covering(bounds, zoom);
        tracing::info!(zoom, tiles = window.tile_count(), "fetching basemap");

        assemble(&window, |x, y| self.fetch(zoom, x, y))
    }
}
