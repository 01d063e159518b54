//! Flat-file storage of parking-spot regions.
//!
//! One ROI per line as `x,y,w,h`, no header.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{ParkError, Result};
use crate::models::Roi;

/// Result of [`create_empty`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Parse ROI file contents
pub fn parse(contents: &str) -> Result<Vec<Roi>> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}

fn parse_line(line_no: usize, line: &str) -> Result<Roi> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 4 {
        return Err(ParkError::RoiParse {
            line: line_no,
            reason: format!("expected 4 fields, found {}", fields.len()),
        });
    }

    let mut values = [0u32; 4];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field.trim().parse().map_err(|e| ParkError::RoiParse {
            line: line_no,
            reason: format!("'{}' is not a valid coordinate: {}", field.trim(), e),
        })?;
    }

    let [x, y, w, h] = values;
    Roi::new(x, y, w, h).map_err(|_| ParkError::RoiParse {
        line: line_no,
        reason: "width and height must be positive".to_string(),
    })
}

/// Load ROIs from a file
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Roi>> {
    let contents = fs::read_to_string(path)?;
    parse(&contents)
}

/// Overwrite `path` with one line per ROI, in iteration order
pub fn save(rois: &[Roi], path: impl AsRef<Path>) -> Result<()> {
    let mut out = String::with_capacity(rois.len() * 16);
    for roi in rois {
        out.push_str(&roi.to_string());
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Create a zero-byte ROI file unless one is already there
pub fn create_empty(path: impl AsRef<Path>) -> Result<CreateOutcome> {
    match OpenOptions::new().write(true).create_new(true).open(path.as_ref()) {
        Ok(mut file) => {
            file.flush()?;
            Ok(CreateOutcome::Created)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(CreateOutcome::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_with_padding() {
        let rois = parse("1,2,3,4\n 10, 20 ,30,40\n").unwrap();
        assert_eq!(rois, vec![
            Roi { x: 1, y: 2, w: 3, h: 4 },
            Roi { x: 10, y: 20, w: 30, h: 40 },
        ]);
    }

    #[test]
    fn reports_offending_line() {
        match parse("1,2,3,4\n5,6,7\n") {
            Err(ParkError::RoiParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_non_integers_and_empty_boxes() {
        assert!(parse("a,2,3,4").is_err());
        assert!(parse("1,2,3,4,5").is_err());
        assert!(parse("-1,2,3,4").is_err());
        assert!(parse("1,2,0,4").is_err());
        assert!(parse("1,2,3,4\n\n5,6,7,8").is_err());
    }

    #[test]
    fn empty_contents_yield_no_rois() {
        assert!(parse("").unwrap().is_empty());
    }
}
