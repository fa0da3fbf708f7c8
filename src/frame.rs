use crate::detection::Detection;

pub type FrameNumber = u64;

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub number: FrameNumber, // starts at 1
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(number: FrameNumber, detections: Vec<Detection>) -> Self {
        Self { number, detections }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
