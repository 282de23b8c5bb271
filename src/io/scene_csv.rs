//! CSV description of a synthetic scene.
//!
//! One feature per row, with a header line. Lines starting with `#` are
//! comments. Optional columns may be left empty:
//!
//! ```text
//! x,y,z,first_frame,last_frame,strength,glitch_frame,glitch_dx,glitch_dy
//! 0.0,0.0,-10.0,,,0.9,,,
//! 3.0,-2.0,-12.0,0,40,0.5,25,0.01,0.0
//! ```

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use nalgebra::{Vector2, Vector3};
use serde::Deserialize;

use crate::backend::{SyntheticFeature, SyntheticScene};
use crate::store::Frame;

#[derive(Debug, Deserialize)]
struct FeatureRow {
    x: f64,
    y: f64,
    z: f64,
    first_frame: Option<Frame>,
    last_frame: Option<Frame>,
    strength: Option<f64>,
    glitch_frame: Option<Frame>,
    glitch_dx: Option<f64>,
    glitch_dy: Option<f64>,
}

impl FeatureRow {
    fn into_feature(self, line: usize) -> Result<SyntheticFeature> {
        let mut feature = SyntheticFeature::new(Vector3::new(self.x, self.y, self.z));

        if self.first_frame.is_some() || self.last_frame.is_some() {
            let first = self.first_frame.unwrap_or(Frame::MIN);
            let last = self.last_frame.unwrap_or(Frame::MAX);
            if first > last {
                bail!("line {}: first_frame {} after last_frame {}", line, first, last);
            }
            feature = feature.alive_between(first, last);
        }

        if let Some(strength) = self.strength {
            if !(0.0..=1.0).contains(&strength) {
                bail!("line {}: strength {} outside [0, 1]", line, strength);
            }
            feature = feature.with_strength(strength);
        }

        match (self.glitch_frame, self.glitch_dx, self.glitch_dy) {
            (None, None, None) => {}
            (Some(frame), dx, dy) => {
                let offset = Vector2::new(dx.unwrap_or(0.0), dy.unwrap_or(0.0));
                feature = feature.with_glitch(frame, offset);
            }
            (None, _, _) => bail!("line {}: glitch offset without glitch_frame", line),
        }
        Ok(feature)
    }
}

/// Parse feature rows from `reader`.
pub fn read_features<R: Read>(reader: R) -> Result<Vec<SyntheticFeature>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("missing header line")?.clone();
    let mut features = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or_default();
        let row: FeatureRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("malformed feature on line {}", line))?;
        features.push(row.into_feature(line)?);
    }
    Ok(features)
}

/// Load a scene from a CSV file, using the default camera and clip.
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SyntheticScene> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let features = read_features(file).with_context(|| format!("Failed to parse {}", path.display()))?;
    if features.is_empty() {
        bail!("{} describes no features", path.display());
    }
    Ok(SyntheticScene::new(features))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "x,y,z,first_frame,last_frame,strength,glitch_frame,glitch_dx,glitch_dy\n";

    #[test]
    fn test_reads_optional_columns() {
        let csv = format!(
            "{}# comment\n0.0,0.0,-10.0,,,,,,\n3.0,-2.0,-12.0,0,40,0.5,25,0.01,\n",
            HEADER
        );
        let features = read_features(csv.as_bytes()).unwrap();
        assert_eq!(features.len(), 2);

        let plain = &features[0];
        assert_eq!(plain.position, Vector3::new(0.0, 0.0, -10.0));
        assert_eq!(plain.strength, 1.0);
        assert!(plain.glitch.is_none());
        assert_eq!(plain.first_frame, Frame::MIN);

        let short = &features[1];
        assert_eq!((short.first_frame, short.last_frame), (0, 40));
        assert_eq!(short.strength, 0.5);
        let glitch = short.glitch.unwrap();
        assert_eq!(glitch.frame, 25);
        assert_eq!(glitch.offset, Vector2::new(0.01, 0.0));
    }

    #[test]
    fn test_rejects_bad_strength() {
        let csv = format!("{}0.0,0.0,-10.0,,,1.5,,,\n", HEADER);
        let err = read_features(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_rejects_glitch_offset_without_frame() {
        let csv = format!("{}0.0,0.0,-10.0,,,,,0.1,0.1\n", HEADER);
        assert!(read_features(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_inverted_lifetime() {
        let csv = format!("{}0.0,0.0,-10.0,10,5,,,,\n", HEADER);
        assert!(read_features(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_malformed_number() {
        let csv = format!("{}zero,0.0,-10.0,,,,,,\n", HEADER);
        assert!(read_features(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_scene("/nonexistent/scene.csv").is_err());
    }
}
