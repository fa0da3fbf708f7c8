//! Reader for detector dumps.
//!
//! One line per frame: `<frame number>: <json array of detections>`, e.g.
//!
//! ```text
//! 12: [{"bbox":[410.5,388.0,470.0,351.2],"c":0,"id":3}]
//! ```
//!
//! Frames without detections may be left out; the reader fills the gaps with
//! empty frames so that time keeps moving for the reaper.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::detection::Detection;
use crate::error::Error;
use crate::frame::{Frame, FrameNumber};

pub struct DumpReader<R> {
    lines: Lines<R>,
    line_no: usize,
    next_number: FrameNumber,
    pending: Option<Frame>,
}

impl DumpReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            next_number: 1,
            pending: None,
        }
    }

    fn read_frame(&mut self) -> Option<Result<Frame, Error>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(parse_line(&line).map_err(|reason| Error::Parse {
                line: self.line_no,
                reason,
            }));
        }
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_none() {
            match self.read_frame()? {
                Ok(frame) if frame.number < self.next_number => {
                    return Some(Err(Error::Parse {
                        line: self.line_no,
                        reason: format!(
                            "frame {} out of order (expected {} or later)",
                            frame.number, self.next_number
                        ),
                    }));
                }
                Ok(frame) => self.pending = Some(frame),
                Err(err) => return Some(Err(err)),
            }
        }

        let number = self.next_number;
        self.next_number += 1;

        match self.pending.take() {
            Some(frame) if frame.number == number => Some(Ok(frame)),
            pending => {
                self.pending = pending;
                Some(Ok(Frame::new(number, Vec::new())))
            }
        }
    }
}

pub fn parse_line(line: &str) -> Result<Frame, String> {
    let (number, json) = line
        .split_once(':')
        .ok_or_else(|| "expected `<frame>: <detections>`".to_string())?;

    let number: FrameNumber = number
        .trim()
        .parse()
        .map_err(|err| format!("bad frame number {:?}: {}", number.trim(), err))?;

    let detections: Vec<Detection> =
        serde_json::from_str(json.trim()).map_err(|err| err.to_string())?;

    Ok(Frame::new(number, detections))
}
