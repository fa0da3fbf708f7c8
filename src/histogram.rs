use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};
use serde_derive::{Deserialize, Serialize};

use crate::class::{VehicleClass, CLASS_COUNT};
use crate::error::Error;
use crate::vehicle::Vehicle;

const FONT_SCALE: f64 = 0.4;
const TEXT_GAP: i32 = 4;

/// Active vehicles per class, keyed by each vehicle's latest class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts([usize; CLASS_COUNT]);

impl ClassCounts {
    pub fn from_vehicles<'a, I: IntoIterator<Item = &'a Vehicle>>(vehicles: I) -> Self {
        let mut counts = Self::default();
        for v in vehicles {
            counts.0[v.last_class() as usize] += 1;
        }
        counts
    }

    #[inline]
    pub fn get(&self, class: VehicleClass) -> usize {
        self.0[class as usize]
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Every class, sorted by class id, zero counts included.
    pub fn iter(&self) -> impl Iterator<Item = (VehicleClass, usize)> + '_ {
        VehicleClass::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct HistogramStyle {
    /// Pixels of bar height per vehicle.
    pub bar_unit_height: i32,
    pub bar_width: i32,
    pub bar_spacing: i32,
    /// Distance from the raster's bottom-left corner.
    pub margin: i32,
}

impl Default for HistogramStyle {
    fn default() -> Self {
        Self {
            bar_unit_height: 10,
            bar_width: 40,
            bar_spacing: 12,
            margin: 20,
        }
    }
}

/// Bar chart of active vehicles per class, drawn in the bottom-left corner.
#[derive(Debug, Clone, Default)]
pub struct ClassHistogram {
    style: HistogramStyle,
}

impl ClassHistogram {
    pub fn new(style: HistogramStyle) -> Self {
        Self { style }
    }

    #[inline]
    pub fn style(&self) -> &HistogramStyle {
        &self.style
    }

    pub fn render<'a, I>(&self, surface: &mut Mat, vehicles: I) -> Result<ClassCounts, Error>
    where
        I: IntoIterator<Item = &'a Vehicle>,
    {
        let counts = ClassCounts::from_vehicles(vehicles);
        self.draw(surface, &counts)?;

        Ok(counts)
    }

    /// Screen rectangle of the bar for `class` with `count` vehicles.
    pub fn bar_rect(&self, surface_rows: i32, class: VehicleClass, count: usize) -> core::Rect {
        let s = &self.style;
        let label_height = text_size("0").map(|sz| sz.height).unwrap_or(10);

        let baseline = surface_rows - s.margin - label_height - TEXT_GAP;
        let x = s.margin + class as i32 * (s.bar_width + s.bar_spacing);

        let max_height = (baseline - s.margin).max(0);
        let height = i32::try_from(count)
            .unwrap_or(i32::MAX)
            .saturating_mul(s.bar_unit_height)
            .min(max_height);

        core::Rect::new(x, baseline - height, s.bar_width, height)
    }

    pub fn draw(&self, surface: &mut Mat, counts: &ClassCounts) -> Result<(), Error> {
        let rows = surface.rows();
        let text_color = core::Scalar::new(255.0, 255.0, 255.0, 0.0);

        for (class, count) in counts.iter() {
            let rect = self.bar_rect(rows, class, count);
            let color = class.color();

            if count > 0 {
                imgproc::rectangle(surface, rect, color, imgproc::FILLED, imgproc::LINE_8, 0)?;
            } else {
                imgproc::line(
                    surface,
                    core::Point::new(rect.x, rect.y),
                    core::Point::new(rect.x + rect.width - 1, rect.y),
                    color,
                    1,
                    imgproc::LINE_8,
                    0,
                )?;
            }

            let label = class.label();
            let label_size = text_size(label)?;
            put_text(
                surface,
                label,
                core::Point::new(
                    rect.x + (rect.width - label_size.width) / 2,
                    rect.y + rect.height + TEXT_GAP + label_size.height,
                ),
                text_color,
            )?;

            let value = count.to_string();
            let value_size = text_size(&value)?;
            put_text(
                surface,
                &value,
                core::Point::new(
                    rect.x + (rect.width - value_size.width) / 2,
                    rect.y - TEXT_GAP,
                ),
                text_color,
            )?;
        }

        Ok(())
    }
}

fn text_size(text: &str) -> Result<core::Size, Error> {
    let mut base_line = 0;

    Ok(imgproc::get_text_size(
        text,
        imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        1,
        &mut base_line,
    )?)
}

pub(crate) fn put_text(
    surface: &mut Mat,
    text: &str,
    origin: core::Point,
    color: core::Scalar,
) -> Result<(), Error> {
    imgproc::put_text(
        surface,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        color,
        1,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::Sample;
    use nalgebra as na;

    fn vehicle(id: i64, classes: &[VehicleClass]) -> Vehicle {
        let mut samples = classes
            .iter()
            .enumerate()
            .map(|(i, &c)| Sample::new(na::Point2::new(0.0, 0.0), c, i as u64 + 1));

        let mut v = Vehicle::new(id, samples.next().unwrap(), 5);
        samples.for_each(|s| v.push(s));
        v
    }

    fn blank(rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC3, core::Scalar::all(0.0)).unwrap()
    }

    #[test]
    fn counts_use_latest_class() {
        let vehicles = vec![
            vehicle(1, &[VehicleClass::Car]),
            vehicle(2, &[VehicleClass::Car, VehicleClass::Truck]),
            vehicle(3, &[VehicleClass::Truck, VehicleClass::Car]),
            vehicle(4, &[VehicleClass::Bus]),
        ];

        let counts = ClassCounts::from_vehicles(&vehicles);

        assert_eq!(counts.get(VehicleClass::Car), 2);
        assert_eq!(counts.get(VehicleClass::Truck), 1);
        assert_eq!(counts.get(VehicleClass::Bus), 1);
        assert_eq!(counts.get(VehicleClass::Bicycle), 0);
        assert_eq!(counts.total(), vehicles.len());
    }

    #[test]
    fn every_class_is_listed_in_id_order() {
        let counts = ClassCounts::default();
        let classes: Vec<_> = counts.iter().map(|(c, _)| c).collect();

        assert_eq!(classes, VehicleClass::ALL.to_vec());
    }

    #[test]
    fn bar_height_is_proportional() {
        let hist = ClassHistogram::default();

        let one = hist.bar_rect(480, VehicleClass::Car, 1);
        let three = hist.bar_rect(480, VehicleClass::Car, 3);
        let empty = hist.bar_rect(480, VehicleClass::Bus, 0);

        assert_eq!(one.height, 10);
        assert_eq!(three.height, 30);
        assert_eq!(one.y + one.height, three.y + three.height);
        assert_eq!(empty.height, 0);
        assert!(empty.x > one.x);
    }

    #[test]
    fn bars_are_clamped_to_surface() {
        let hist = ClassHistogram::default();
        let rect = hist.bar_rect(200, VehicleClass::Car, 10_000);

        assert!(rect.y >= hist.style().margin);
    }

    /// Pixels with any channel set in `rows` x `cols`.
    fn lit(surface: &Mat, rows: std::ops::Range<i32>, cols: std::ops::Range<i32>) -> usize {
        rows.flat_map(|r| cols.clone().map(move |c| (r, c)))
            .filter(|&(r, c)| {
                let px = surface.at_2d::<core::Vec3b>(r, c).unwrap();
                px[0] > 0 || px[1] > 0 || px[2] > 0
            })
            .count()
    }

    #[test]
    fn empty_classes_still_get_a_bar_and_labels() {
        let hist = ClassHistogram::default();
        let mut surface = blank(300, 400);
        let none: Vec<Vehicle> = Vec::new();

        let counts = hist.render(&mut surface, &none).unwrap();
        assert_eq!(counts.total(), 0);

        for class in VehicleClass::ALL {
            let rect = hist.bar_rect(300, class, 0);
            let [b, g, r] = class.info().color;

            // flat bar along the baseline
            for col in [rect.x, rect.x + rect.width / 2, rect.x + rect.width - 1] {
                let px = surface.at_2d::<core::Vec3b>(rect.y, col).unwrap();
                assert_eq!((px[0], px[1], px[2]), (b, g, r), "{:?}", class);
            }

            let bar = rect.x..rect.x + rect.width;
            // "0" above the bar, class label below it
            assert!(lit(&surface, (rect.y - 20).max(0)..rect.y, bar.clone()) > 0, "{:?}", class);
            assert!(lit(&surface, rect.y + 1..(rect.y + 24).min(300), bar) > 0, "{:?}", class);
        }
    }

    #[test]
    fn filled_bar_is_drawn_in_class_color() {
        let hist = ClassHistogram::default();
        let mut surface = blank(300, 400);
        let vehicles = vec![vehicle(1, &[VehicleClass::Truck]), vehicle(2, &[VehicleClass::Truck])];

        let counts = hist.render(&mut surface, &vehicles).unwrap();
        assert_eq!(counts.get(VehicleClass::Truck), 2);

        let rect = hist.bar_rect(300, VehicleClass::Truck, 2);
        let px = *surface
            .at_2d::<core::Vec3b>(rect.y + rect.height / 2, rect.x + rect.width / 2)
            .unwrap();
        let [b, g, r] = VehicleClass::Truck.info().color;

        assert_eq!((px[0], px[1], px[2]), (b, g, r));
    }
}
