use opencv::core;
use serde_derive::{Deserialize, Serialize};

/// Vehicle classes emitted by the detector, ordered by class id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleClass {
    Car = 0,
    Truck = 1,
    Bus = 2,
    Motorcycle = 3,
    Bicycle = 4,
}

#[derive(Debug)]
pub struct ClassInfo {
    pub class: VehicleClass,
    pub label: &'static str,
    // BGR, as opencv draws
    pub color: [u8; 3],
}

pub const CLASS_COUNT: usize = 5;

pub static CLASS_TABLE: [ClassInfo; CLASS_COUNT] = [
    ClassInfo {
        class: VehicleClass::Car,
        label: "car",
        color: [255, 144, 30],
    },
    ClassInfo {
        class: VehicleClass::Truck,
        label: "truck",
        color: [0, 165, 255],
    },
    ClassInfo {
        class: VehicleClass::Bus,
        label: "bus",
        color: [60, 200, 60],
    },
    ClassInfo {
        class: VehicleClass::Motorcycle,
        label: "motorcycle",
        color: [200, 60, 220],
    },
    ClassInfo {
        class: VehicleClass::Bicycle,
        label: "bicycle",
        color: [60, 220, 240],
    },
];

impl VehicleClass {
    pub const ALL: [VehicleClass; CLASS_COUNT] = [
        VehicleClass::Car,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Motorcycle,
        VehicleClass::Bicycle,
    ];

    /// Looks up a detector class id; ids outside the table are rejected.
    pub fn from_id(id: i64) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| CLASS_TABLE.get(idx))
            .map(|info| info.class)
    }

    #[inline]
    pub fn id(self) -> i64 {
        self as i64
    }

    #[inline]
    pub fn info(self) -> &'static ClassInfo {
        &CLASS_TABLE[self as usize]
    }

    #[inline]
    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn color(self) -> core::Scalar {
        let [b, g, r] = self.info().color;

        core::Scalar::new(b as f64, g as f64, r as f64, 0.0)
    }
}
