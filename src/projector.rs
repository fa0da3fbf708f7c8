use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Empirical post-corrections applied after the homography.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Subtracted from every projected x.
    pub x_offset: f64,
    /// Corrected x at or beyond which the far-field y shift kicks in.
    pub shift_threshold: f64,
    /// Meters of y shift per meter of x past the threshold.
    pub shift_slope: f64,
}

impl Correction {
    pub const NONE: Correction = Correction {
        x_offset: 0.0,
        shift_threshold: f64::INFINITY,
        shift_slope: 0.0,
    };

    pub fn apply(&self, p: na::Point2<f64>) -> na::Point2<f64> {
        let x = p.x - self.x_offset;
        let mut y = p.y;

        if x >= self.shift_threshold {
            y -= self.shift_slope * (x - self.shift_threshold);
        }

        na::Point2::new(x, y)
    }
}

/// Camera space to map space projection: fixed homography plus [`Correction`].
#[derive(Debug, Clone)]
pub struct CoordinateProjector {
    homography: na::Matrix3<f64>,
    correction: Correction,
}

impl CoordinateProjector {
    /// Fails when the matrix cannot describe a plane-to-plane mapping.
    ///
    /// A homography is defined up to scale, so the matrix is normalized
    /// before the determinant is checked and any scaled copy is accepted.
    pub fn new(homography: na::Matrix3<f64>, correction: Correction) -> Result<Self, Error> {
        let homography = normalize(homography)?;
        let determinant = homography.determinant();

        if !determinant.is_finite() || determinant.abs() < f64::EPSILON {
            return Err(Error::DegenerateTransform { determinant });
        }

        Ok(Self {
            homography,
            correction,
        })
    }

    pub fn from_rows(rows: [[f64; 3]; 3], correction: Correction) -> Result<Self, Error> {
        let m = na::Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], //
            rows[1][0], rows[1][1], rows[1][2], //
            rows[2][0], rows[2][1], rows[2][2],
        ]);

        Self::new(m, correction)
    }

    /// Plain homography, without corrections.
    pub fn transform(&self, p: na::Point2<f64>) -> Result<na::Point2<f64>, Error> {
        let h = self.homography * p.to_homogeneous();
        let w = h.z;

        if w.abs() < f64::EPSILON {
            return Err(Error::PointAtInfinity { x: p.x, y: p.y });
        }

        let out = na::Point2::new(h.x / w, h.y / w);
        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(Error::PointAtInfinity { x: p.x, y: p.y });
        }

        Ok(out)
    }
}

/// Scales `h` so that `h[(2, 2)] == 1`, or by its largest entry when the
/// bottom-right element vanishes.
fn normalize(h: na::Matrix3<f64>) -> Result<na::Matrix3<f64>, Error> {
    let corner = h[(2, 2)];
    let pivot = if corner.abs() > f64::EPSILON {
        corner
    } else {
        h.amax()
    };

    if !pivot.is_finite() || pivot == 0.0 {
        return Err(Error::DegenerateTransform { determinant: 0.0 });
    }

    Ok(h / pivot)
}

impl crate::Projection for CoordinateProjector {
    fn project(&self, camera: na::Point2<f64>) -> Result<na::Point2<f64>, Error> {
        self.transform(camera).map(|p| self.correction.apply(p))
    }
}
