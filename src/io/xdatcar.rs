// src/io/xdatcar.rs

use log::warn;
use std::io::Write;

use super::{check_cell, output_position, write_coordinates, write_header, CoordMode};
use crate::error::{Error, Result};
use crate::model::TrajectoryDocument;

pub fn frame_marker(index: usize) -> String {
    format!("Direct configuration={:>6}", index)
}

/// Writes every snapshot as an XDATCAR frame.
///
/// Each frame starts with its own marker line, so a write that stops early
/// still leaves a readable prefix. The last frame is followed by one more
/// marker numbered `last + 1`.
pub fn write<W: Write>(doc: &TrajectoryDocument, coords: CoordMode, w: &mut W) -> Result<()> {
    let first = doc.snapshots.first().ok_or(Error::NoSnapshotFound)?;
    check_cell(&doc.lattice, coords)?;

    let header_labels = first.labels();
    write_header(w, &doc.source, &doc.lattice, &header_labels, &first.counts())?;

    for snapshot in &doc.snapshots {
        if snapshot.labels() != header_labels {
            warn!(
                "Geometry {} lists species as {:?}, header has {:?}",
                snapshot.index,
                snapshot.labels(),
                header_labels
            );
        }

        writeln!(w, "{}", frame_marker(snapshot.index))?;
        for position in snapshot.positions() {
            let p = output_position(position, &doc.lattice, coords)?;
            write_coordinates(w, &p)?;
            writeln!(w)?;
        }
        w.flush()?;
    }

    writeln!(w, "{}", frame_marker(doc.last_index() + 1))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::qe::{self, tests::relax_log, Request};
    use crate::io::tests::sample_document;
    use crate::io::{encode, FramePolicy, OutputMode};

    fn markers(text: &str) -> Vec<usize> {
        text.lines()
            .filter_map(|l| l.strip_prefix("Direct configuration="))
            .map(|n| n.trim().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_marker_layout() {
        assert_eq!(frame_marker(1), "Direct configuration=     1");
        assert_eq!(frame_marker(123), "Direct configuration=   123");
    }

    #[test]
    fn test_frames_and_sentinel() {
        let doc = sample_document(&[1.0, 1.5, 2.0]);
        let text = encode(&doc, OutputMode::Animated, CoordMode::Fractional).unwrap();

        assert_eq!(markers(&text), vec![1, 2, 3, 4]);
        // header + 3 frames of (marker + 3 atoms) + sentinel
        assert_eq!(text.lines().count(), 7 + 3 * 4 + 1);
        assert!(text.ends_with("Direct configuration=     4\n"));
    }

    #[test]
    fn test_fractional_frame_values() {
        let doc = sample_document(&[2.5]);
        let text = encode(&doc, OutputMode::Animated, CoordMode::Fractional).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[7], "Direct configuration=     1");
        assert_eq!(
            lines[8],
            "  0.5000000000000000  0.2500000000000000  0.0000000000000000"
        );
    }

    #[test]
    fn test_fractional_rescales_back() {
        let doc = sample_document(&[1.7]);
        let text = encode(&doc, OutputMode::Animated, CoordMode::Fractional).unwrap();
        let line = text.lines().nth(9).unwrap();

        let frac: Vec<f64> = line.split_whitespace().map(|t| t.parse().unwrap()).collect();
        let cartesian = [3.0, 3.5, 1.5];
        for axis in 0..3 {
            assert!((frac[axis] * doc.lattice[axis][axis] - cartesian[axis]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_skipped_frame_absent_from_output() {
        let text = relax_log(&[
            (-50.2, "0.1000000000"),
            (-50.3, "0.2000000000"),
            (-50.4, "0.3ab0000000"),
            (-50.5, "0.4000000000"),
            (-50.6, "0.5000000000"),
        ]);
        let doc =
            qe::read_document(&text, "TiO2.out", Request::Trajectory(FramePolicy::SkipAndCount))
                .unwrap();
        assert_eq!(doc.skipped_count(), 1);

        let out = encode(&doc, OutputMode::Animated, CoordMode::Fractional).unwrap();
        assert_eq!(markers(&out), vec![1, 2, 4, 5, 6]);
    }

    #[test]
    fn test_species_header_follows_first_seen_order() {
        let text = relax_log(&[(-50.2, "0.1000000000")]);
        let doc =
            qe::read_document(&text, "TiO2.out", Request::Trajectory(FramePolicy::SkipAndCount))
                .unwrap();

        let out = encode(&doc, OutputMode::Animated, CoordMode::Cartesian).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[5], "  Ti   O");
        assert_eq!(lines[6], "   1   1");
    }
}
