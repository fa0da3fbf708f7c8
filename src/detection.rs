use nalgebra as na;
use num_traits::ToPrimitive;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::BBox;
use crate::class::VehicleClass;
use crate::error::Error;
use crate::vehicle::VehicleId;

/// Numeric value as the upstream tracker hands it over: a plain integer, a
/// float, a string, or a (nested) one-element tensor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Tensor(Vec<RawValue>),
}

impl RawValue {
    pub fn normalize(&self) -> Result<i64, Error> {
        match self {
            RawValue::Int(value) => Ok(*value),
            RawValue::Float(value) => float_to_int(*value).ok_or_else(|| self.invalid()),
            RawValue::Text(text) => {
                let text = text.trim();

                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(float_to_int))
                    .ok_or_else(|| self.invalid())
            }
            RawValue::Tensor(items) => match items.as_slice() {
                [single] => single.normalize(),
                _ => Err(self.invalid()),
            },
        }
    }

    fn invalid(&self) -> Error {
        Error::InvalidIdentifier(format!("{:?}", self))
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

fn float_to_int(value: f64) -> Option<i64> {
    if value.fract() != 0.0 {
        return None;
    }

    value.to_i64()
}

/// One detector record for a single frame.
///
/// `bbox` keeps the detector's `(x1, y2, x2, y1)` slot order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: [f32; 4],
    #[serde(rename = "c")]
    pub class: RawValue,
    #[serde(default)]
    pub id: Option<RawValue>,
}

/// A detection after normalization: plain integers and a camera point whose
/// y axis grows upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub id: VehicleId,
    pub class: VehicleClass,
    pub camera: na::Point2<f64>,
}

impl Detection {
    pub fn new(bbox: [f32; 4], class: i64, id: Option<i64>) -> Self {
        Self {
            bbox,
            class: class.into(),
            id: id.map(Into::into),
        }
    }

    /// Center of the box with the image y axis negated.
    pub fn camera_point(&self) -> na::Point2<f64> {
        let center = BBox::from_detector(self.bbox).as_xywh();

        na::Point2::new(center.cx() as f64, -(center.cy() as f64))
    }

    pub fn normalize(&self) -> Result<Observation, Error> {
        let id = self
            .id
            .as_ref()
            .ok_or(Error::MissingTrackerId)?
            .normalize()?;

        let class_id = self.class.normalize()?;
        let class = VehicleClass::from_id(class_id).ok_or(Error::UnknownClass(class_id))?;

        Ok(Observation {
            id,
            class,
            camera: self.camera_point(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Detection {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn boxed_identifiers_are_unwrapped() {
        let cases = [
            (r#"{"bbox":[0,0,2,2],"c":0,"id":7}"#, 7),
            (r#"{"bbox":[0,0,2,2],"c":0,"id":7.0}"#, 7),
            (r#"{"bbox":[0,0,2,2],"c":0,"id":"7"}"#, 7),
            (r#"{"bbox":[0,0,2,2],"c":0,"id":[7.0]}"#, 7),
            (r#"{"bbox":[0,0,2,2],"c":[0],"id":[[7]]}"#, 7),
        ];

        for (json, expected) in cases {
            let obs = parse(json).normalize().unwrap();
            assert_eq!(obs.id, expected, "{}", json);
            assert_eq!(obs.class, VehicleClass::Car);
        }
    }

    #[test]
    fn missing_identifier_is_reported() {
        let det = parse(r#"{"bbox":[0,0,2,2],"c":2,"id":null}"#);
        assert!(matches!(det.normalize(), Err(Error::MissingTrackerId)));

        let det = parse(r#"{"bbox":[0,0,2,2],"c":2}"#);
        assert!(matches!(det.normalize(), Err(Error::MissingTrackerId)));
    }

    #[test]
    fn non_integral_identifiers_are_rejected() {
        for raw in [r#"7.5"#, r#"[1, 2]"#, r#""car""#, r#"[]"#, r#"1e300"#] {
            let det = parse(&format!(r#"{{"bbox":[0,0,2,2],"c":0,"id":{}}}"#, raw));
            assert!(
                matches!(det.normalize(), Err(Error::InvalidIdentifier(_))),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn unknown_class_is_rejected() {
        let det = Detection::new([0.0, 0.0, 2.0, 2.0], 42, Some(1));
        assert!(matches!(det.normalize(), Err(Error::UnknownClass(42))));
    }

    #[test]
    fn camera_point_is_flipped_center() {
        let det = Detection::new([100.0, 240.0, 140.0, 200.0], 0, Some(1));

        assert_eq!(det.camera_point(), na::Point2::new(120.0, -220.0));
    }
}
