// src/io/scanner.rs
//
// Line-by-line builder for pw.x relaxation logs. Each `observe` call moves
// through SeekingHeader -> SeekingLattice -> SeekingPositions <-> InSnapshot,
// and `JOB DONE.` (or `finish`) ends the scan.

use log::{debug, warn};

use super::qe::{self, PositionUnit};
use crate::error::{Error, Result};
use crate::model::{EnergyRecord, FormatKind, LatticeVectors, SkippedFrame, Snapshot};

/// What to do with a geometry block that cannot be read completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Fail the whole scan
    Abort,
    /// Drop the frame, remember it and keep scanning
    #[default]
    SkipAndCount,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanHeader {
    pub atom_count: usize,
    /// Angstrom; `None` for input decks
    pub lattice_parameter: Option<f64>,
    pub lattice: LatticeVectors,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotScan {
    pub snapshots: Vec<Snapshot>,
    pub energies: Vec<EnergyRecord>,
    pub skipped: Vec<SkippedFrame>,
}

#[derive(Debug)]
enum State {
    SeekingHeader,
    SeekingLattice,
    ReadingLattice(Vec<[f64; 3]>),
    SeekingPositions,
    InSnapshot {
        snapshot: Snapshot,
        unit: PositionUnit,
        remaining: usize,
    },
    Done,
}

pub struct TrajectoryBuilder {
    kind: FormatKind,
    policy: FramePolicy,
    state: State,
    line_no: usize,
    lattice_parameter: Option<f64>,
    atom_count: Option<usize>,
    lattice: Option<LatticeVectors>,
    // Index of the configuration the next positions block will get
    next_index: usize,
    scan: SnapshotScan,
}

impl TrajectoryBuilder {
    pub fn new(kind: FormatKind, policy: FramePolicy) -> Self {
        Self {
            kind,
            policy,
            state: State::SeekingHeader,
            line_no: 0,
            lattice_parameter: None,
            atom_count: None,
            lattice: None,
            next_index: 1,
            scan: SnapshotScan::default(),
        }
    }

    /// Starts directly at the positions scan with an already known header.
    pub fn seeded(kind: FormatKind, header: ScanHeader, policy: FramePolicy) -> Self {
        Self {
            state: State::SeekingPositions,
            lattice_parameter: header.lattice_parameter,
            atom_count: Some(header.atom_count),
            lattice: Some(header.lattice),
            ..Self::new(kind, policy)
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    pub fn observe(&mut self, line: &str) -> Result<()> {
        self.line_no += 1;

        if self.is_done() {
            return Ok(());
        }
        if qe::is_job_done(line) {
            self.close()?;
            self.state = State::Done;
            return Ok(());
        }

        // A dropped frame hands its offending line back for a second look,
        // it may open the next block.
        if let Some(line) = self.step(line)? {
            self.step(line)?;
        }
        Ok(())
    }

    /// Returns the line again when it must be re-observed in the new state.
    fn step<'a>(&mut self, line: &'a str) -> Result<Option<&'a str>> {
        let state = std::mem::replace(&mut self.state, State::Done);

        self.state = match state {
            State::SeekingHeader => {
                if let Some(alat) = qe::parse_lattice_parameter_line(line) {
                    debug!("Lattice parameter = {:.8} Angstrom", alat);
                    self.lattice_parameter = Some(alat);
                }
                if let Some(n) = qe::parse_atom_count_line(line).filter(|&n| n > 0) {
                    debug!("Number of atoms = {}", n);
                    self.atom_count = Some(n);
                }
                if self.lattice_parameter.is_some() && self.atom_count.is_some() {
                    State::SeekingLattice
                } else {
                    State::SeekingHeader
                }
            }
            State::SeekingLattice => {
                if qe::is_axes_marker(line) {
                    State::ReadingLattice(Vec::with_capacity(3))
                } else {
                    State::SeekingLattice
                }
            }
            State::ReadingLattice(mut rows) => {
                let row = qe::parse_axis_line(line).ok_or_else(|| {
                    Error::malformed(self.line_no, format!("bad cell vector '{}'", line.trim()))
                })?;
                rows.push(row);

                if rows.len() < 3 {
                    State::ReadingLattice(rows)
                } else {
                    let alat = self.lattice_parameter.ok_or(Error::MissingLatticeParameter)?;
                    self.lattice = Some([rows[0], rows[1], rows[2]].map(|r| r.map(|c| c * alat)));
                    State::SeekingPositions
                }
            }
            State::SeekingPositions => self.seek_positions(line)?,
            State::InSnapshot {
                mut snapshot,
                unit,
                remaining,
            } => match qe::parse_site(line, self.line_no) {
                Ok(mut site) => {
                    let lattice = self.lattice.ok_or(Error::MissingCellVectors)?;
                    site.position = unit.to_cartesian(site.position, &lattice);
                    snapshot.push(site);

                    if remaining > 1 {
                        State::InSnapshot {
                            snapshot,
                            unit,
                            remaining: remaining - 1,
                        }
                    } else {
                        self.commit(snapshot);
                        State::SeekingPositions
                    }
                }
                Err(e) => {
                    self.reject(snapshot.index, e)?;
                    self.state = State::SeekingPositions;
                    return Ok(Some(line));
                }
            },
            State::Done => State::Done,
        };

        Ok(None)
    }

    fn seek_positions(&mut self, line: &str) -> Result<State> {
        if let Some(energy) = qe::parse_energy_line(line) {
            self.record_energy(energy);
            return Ok(State::SeekingPositions);
        }
        if !qe::is_positions_marker(line) {
            return Ok(State::SeekingPositions);
        }

        let atom_count = self.atom_count.ok_or(Error::MissingAtomCount)?;
        let unit = qe::position_unit(line, self.kind, self.lattice_parameter)?;
        debug!("Geometry {} starts at line {}", self.next_index, self.line_no);

        Ok(State::InSnapshot {
            snapshot: Snapshot::new(self.next_index),
            unit,
            remaining: atom_count,
        })
    }

    fn record_energy(&mut self, energy: f64) {
        let record = EnergyRecord {
            index: self.next_index,
            energy,
        };
        match self.scan.energies.last_mut() {
            Some(last) if last.index == record.index => *last = record,
            _ => self.scan.energies.push(record),
        }
    }

    fn commit(&mut self, snapshot: Snapshot) {
        self.next_index = snapshot.index + 1;
        self.scan.snapshots.push(snapshot);
    }

    fn reject(&mut self, index: usize, err: Error) -> Result<()> {
        match self.policy {
            FramePolicy::Abort => Err(err),
            FramePolicy::SkipAndCount => {
                warn!("Something went wrong with geometry {}: {}", index, err);
                let line = match &err {
                    Error::MalformedCoordinateLine { line, .. } => *line,
                    _ => self.line_no,
                };
                self.scan.skipped.push(SkippedFrame {
                    index,
                    line,
                    reason: err.to_string(),
                });
                self.next_index = index + 1;
                Ok(())
            }
        }
    }

    /// Settles a block left open by the end of input.
    fn close(&mut self) -> Result<()> {
        if let State::InSnapshot {
            snapshot,
            remaining,
            ..
        } = std::mem::replace(&mut self.state, State::SeekingPositions)
        {
            let expected = snapshot.atom_count() + remaining;
            let err = Error::malformed(
                self.line_no,
                format!(
                    "input ended after {} of {} atoms",
                    snapshot.atom_count(),
                    expected
                ),
            );
            self.reject(snapshot.index, err)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(ScanHeader, SnapshotScan)> {
        if !self.is_done() {
            self.close()?;
        }

        let atom_count = self.atom_count.ok_or(Error::MissingAtomCount)?;
        if self.kind == FormatKind::RelaxationOutput && self.lattice_parameter.is_none() {
            return Err(Error::MissingLatticeParameter);
        }
        let lattice = self.lattice.ok_or(Error::MissingCellVectors)?;

        if self.scan.snapshots.is_empty() {
            return Err(Error::NoSnapshotFound);
        }

        let header = ScanHeader {
            atom_count,
            lattice_parameter: self.lattice_parameter,
            lattice,
        };
        Ok((header, self.scan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::qe::tests::{relax_header, relax_log};

    fn scan(text: &str, policy: FramePolicy) -> Result<(ScanHeader, SnapshotScan)> {
        let mut builder = TrajectoryBuilder::new(FormatKind::RelaxationOutput, policy);
        for line in text.lines() {
            builder.observe(line)?;
        }
        builder.finish()
    }

    fn five_blocks_with_third_broken() -> String {
        relax_log(&[
            (-50.2, "0.1000000000"),
            (-50.3, "0.2000000000"),
            (-50.4, "0.3ab0000000"),
            (-50.5, "0.4000000000"),
            (-50.6, "0.5000000000"),
        ])
    }

    #[test]
    fn test_header_and_frames() {
        let text = relax_log(&[(-50.2, "0.1000000000"), (-50.3, "0.2000000000")]);
        let (header, scan) = scan(&text, FramePolicy::SkipAndCount).unwrap();

        assert_eq!(header.atom_count, 2);
        assert!((header.lattice[0][0] - 10.0 / 1.8897259885789).abs() < 1e-6);

        let indices: Vec<usize> = scan.snapshots.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_energy_belongs_to_following_block() {
        let text = relax_log(&[(-50.2, "0.1000000000"), (-50.3, "0.2000000000")]);
        let (_, scan) = scan(&text, FramePolicy::SkipAndCount).unwrap();

        // -50.1 precedes block 1, -50.2 block 2, -50.3 the sentinel
        let pairs: Vec<(usize, f64)> = scan.energies.iter().map(|e| (e.index, e.energy)).collect();
        assert_eq!(pairs, vec![(1, -50.1), (2, -50.2), (3, -50.3)]);
    }

    #[test]
    fn test_malformed_frame_is_skipped_and_counted() {
        let (_, scan) = scan(&five_blocks_with_third_broken(), FramePolicy::SkipAndCount).unwrap();

        let indices: Vec<usize> = scan.snapshots.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 4, 5]);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].index, 3);
    }

    #[test]
    fn test_malformed_frame_aborts_when_strict() {
        let err = scan(&five_blocks_with_third_broken(), FramePolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::MalformedCoordinateLine { .. }));
    }

    #[test]
    fn test_short_block_followed_by_marker() {
        let mut text = relax_header();
        text.push_str("ATOMIC_POSITIONS (angstrom)\nTi 0.0 0.0 0.0\n");
        text.push_str("ATOMIC_POSITIONS (angstrom)\nTi 0.5 0.0 0.0\nO 1.0 1.0 1.0\n");

        let (_, scan) = scan(&text, FramePolicy::SkipAndCount).unwrap();

        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].index, 1);
        assert_eq!(scan.snapshots.len(), 1);
        assert_eq!(scan.snapshots[0].index, 2);
    }

    #[test]
    fn test_truncated_last_block() {
        let mut text = relax_header();
        text.push_str("ATOMIC_POSITIONS (angstrom)\nTi 0.5 0.0 0.0\nO 1.0 1.0 1.0\n");
        text.push_str("ATOMIC_POSITIONS (angstrom)\nTi 0.6 0.0 0.0\n");

        let (_, scan) = scan(&text, FramePolicy::SkipAndCount).unwrap();
        assert_eq!(scan.snapshots.len(), 1);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].index, 2);
    }

    #[test]
    fn test_lines_after_job_done_ignored() {
        let mut text = relax_log(&[(-50.2, "0.1000000000")]);
        text.push_str("ATOMIC_POSITIONS (angstrom)\nTi 9.0 0.0 0.0\nO 1.0 1.0 1.0\n");

        let (_, scan) = scan(&text, FramePolicy::SkipAndCount).unwrap();
        assert_eq!(scan.snapshots.len(), 1);
    }

    #[test]
    fn test_missing_header_fields() {
        let text = relax_header().replace("number of atoms/cell", "number of things");
        assert!(matches!(
            scan(&text, FramePolicy::SkipAndCount),
            Err(Error::MissingAtomCount)
        ));

        let text = relax_header().replace("lattice parameter (alat)", "lattice something");
        assert!(matches!(
            scan(&text, FramePolicy::SkipAndCount),
            Err(Error::MissingLatticeParameter)
        ));
    }

    #[test]
    fn test_no_frames() {
        assert!(matches!(
            scan(&relax_log(&[]), FramePolicy::SkipAndCount),
            Err(Error::NoSnapshotFound)
        ));
    }
}
