use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("degenerate projective transform (determinant {determinant})")]
    DegenerateTransform { determinant: f64 },

    #[error("camera point ({x}, {y}) projects to infinity")]
    PointAtInfinity { x: f64, y: f64 },

    #[error("unknown class id {0}")]
    UnknownClass(i64),

    #[error("detection has no tracker identifier")]
    MissingTrackerId,

    #[error("tracker identifier {0} is not an integer")]
    InvalidIdentifier(String),

    #[error("invalid map bounds: x [{x_min}, {x_max}], y [{y_min}, {y_max}]")]
    InvalidBounds {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },

    #[error("invalid frame rate {0}")]
    InvalidFps(f64),

    #[error("background raster is empty")]
    EmptyBackground,

    #[error("invalid inactivity window {0} s")]
    InvalidInactivity(f64),

    #[error("speed window of {0} samples, at least 2 are needed")]
    InvalidSpeedWindow(usize),

    #[error("tile {zoom}/{x}/{y}: {reason}")]
    Tile {
        zoom: u8,
        x: i64,
        y: i64,
        reason: String,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Http Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
