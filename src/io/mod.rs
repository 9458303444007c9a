// src/io/mod.rs
pub mod energy;
pub mod poscar;
pub mod potcar;
pub mod qe;
pub mod scanner;
pub mod xdatcar;

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{LatticeVectors, TrajectoryDocument};
use crate::utils::linalg;

pub use qe::Request;
pub use scanner::FramePolicy;

pub const SCALE_LINE: &str = "   1.00000000000000";
pub const PLACEHOLDER_FILE: &str = "POTCAR";

const LATTICE_WIDTH: usize = 22;
const COORD_WIDTH: usize = 20;
const LABEL_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordMode {
    Cartesian,
    Fractional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One POSCAR geometry
    Static { selective_dynamics: bool },
    /// XDATCAR frames, one per snapshot
    Animated,
}

pub fn load_document(path: &Path, request: Request) -> Result<TrajectoryDocument> {
    let text = fs::read_to_string(path)?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    qe::read_document(&text, &source, request)
}

/// Writes the whole document to `path`.
///
/// The cell is validated before the file is created, so an unsupported
/// geometry never leaves an empty file behind.
pub fn save_document(
    path: &Path,
    doc: &TrajectoryDocument,
    mode: OutputMode,
    coords: CoordMode,
) -> Result<()> {
    check_cell(&doc.lattice, coords)?;

    let mut writer = BufWriter::new(File::create(path)?);
    write_document(doc, mode, coords, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_document<W: Write>(
    doc: &TrajectoryDocument,
    mode: OutputMode,
    coords: CoordMode,
    w: &mut W,
) -> Result<()> {
    match mode {
        OutputMode::Static { selective_dynamics } => {
            poscar::write(doc, coords, selective_dynamics, w)
        }
        OutputMode::Animated => xdatcar::write(doc, coords, w),
    }
}

pub fn encode(doc: &TrajectoryDocument, mode: OutputMode, coords: CoordMode) -> Result<String> {
    let mut buf = Vec::new();
    write_document(doc, mode, coords, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// =======================
//   NAMING
// =======================

/// File name up to its first dot: `runs/TiO2.relax.out` -> `TiO2`.
/// Dot-files keep their whole name.
pub fn basename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

pub fn poscar_name(base: &str) -> String {
    format!("POSCAR_{}", base)
}

pub fn xdatcar_name(prefix: &str, base: &str) -> String {
    format!("{}_XDATCAR_{}", prefix, base)
}

pub fn energy_log_name(base: &str) -> String {
    format!("{}.E0.log", base)
}

// =======================
//   SHARED LAYOUT
// =======================

pub(crate) fn check_cell(lattice: &LatticeVectors, coords: CoordMode) -> Result<()> {
    if coords == CoordMode::Fractional && !linalg::is_axis_aligned(lattice) {
        return Err(Error::UnsupportedCellGeometry);
    }
    Ok(())
}

pub(crate) fn output_position(
    position: &[f64; 3],
    lattice: &LatticeVectors,
    coords: CoordMode,
) -> Result<[f64; 3]> {
    match coords {
        CoordMode::Cartesian => Ok(*position),
        CoordMode::Fractional => {
            linalg::cart_to_frac_diagonal(*position, lattice).ok_or(Error::UnsupportedCellGeometry)
        }
    }
}

/// Title, scale, cell and the species/count lines shared by POSCAR and XDATCAR.
pub(crate) fn write_header<W: Write>(
    w: &mut W,
    source: &str,
    lattice: &LatticeVectors,
    labels: &[&str],
    counts: &[usize],
) -> std::io::Result<()> {
    writeln!(w, "Translated from QuantumEspresso : {}", source)?;
    writeln!(w, "{}", SCALE_LINE)?;

    for vec in lattice {
        write!(w, " ")?;
        for c in vec {
            write!(w, "{:>width$.16}", c, width = LATTICE_WIDTH)?;
        }
        writeln!(w)?;
    }

    for label in labels {
        write!(w, "{:>width$}", label, width = LABEL_WIDTH)?;
    }
    writeln!(w)?;
    for count in counts {
        write!(w, "{:>width$}", count, width = LABEL_WIDTH)?;
    }
    writeln!(w)
}

pub(crate) fn write_coordinates<W: Write>(w: &mut W, position: &[f64; 3]) -> std::io::Result<()> {
    for c in position {
        write!(w, "{:>width$.16}", c, width = COORD_WIDTH)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{AtomSite, FormatKind, Snapshot};

    pub(crate) fn sample_document(frames: &[f64]) -> TrajectoryDocument {
        let snapshots = frames
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let mut snap = Snapshot::new(i + 1);
                for (species, pos) in [
                    ("O", [x, 1.25, 0.0]),
                    ("Ti", [0.0, 0.0, 0.0]),
                    ("O", [3.0, 3.5, 1.5]),
                ] {
                    snap.push(AtomSite {
                        species: species.to_string(),
                        position: pos,
                    });
                }
                snap
            })
            .collect();

        TrajectoryDocument {
            source: "TiO2.out".to_string(),
            format: FormatKind::RelaxationOutput,
            lattice: [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 3.0]],
            atom_count: 3,
            snapshots,
            energies: Vec::new(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_header_layout() {
        let doc = sample_document(&[1.0]);
        let mut buf = Vec::new();
        write_header(&mut buf, &doc.source, &doc.lattice, &["O", "Ti"], &[2, 1]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Translated from QuantumEspresso : TiO2.out");
        assert_eq!(lines[1], "   1.00000000000000");
        assert_eq!(
            lines[2],
            "     5.0000000000000000    0.0000000000000000    0.0000000000000000"
        );
        assert_eq!(lines[2].len(), 1 + 3 * 22);
        assert_eq!(lines[5], "   O  Ti");
        assert_eq!(lines[6], "   2   1");
    }

    #[test]
    fn test_basename_and_names() {
        assert_eq!(basename(Path::new("runs/TiO2.relax.out")), "TiO2");
        assert_eq!(poscar_name("TiO2"), "POSCAR_TiO2");
        assert_eq!(xdatcar_name("relaxMovie", "TiO2"), "relaxMovie_XDATCAR_TiO2");
        assert_eq!(energy_log_name("TiO2"), "TiO2.E0.log");
    }

    #[test]
    fn test_basename_of_dot_file() {
        assert_eq!(basename(Path::new("runs/.out")), ".out");
        assert_eq!(poscar_name(&basename(Path::new(".relax.out"))), "POSCAR_.relax.out");
        assert_eq!(basename(Path::new("scf")), "scf");
    }

    #[test]
    fn test_fractional_needs_aligned_cell() {
        let mut doc = sample_document(&[1.0]);
        doc.lattice = [[4.0, 0.0, 0.0], [-2.0, 3.46, 0.0], [0.0, 0.0, 5.0]];

        let err = encode(&doc, OutputMode::Animated, CoordMode::Fractional).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCellGeometry));

        // Cartesian output does not depend on the cell shape
        assert!(encode(&doc, OutputMode::Animated, CoordMode::Cartesian).is_ok());
    }

    #[test]
    fn test_save_rejects_cell_before_creating_file() {
        let mut doc = sample_document(&[1.0]);
        doc.lattice[1][0] = 0.5;

        let path = std::env::temp_dir().join(format!("qegeom_reject_{}", std::process::id()));
        let _ = fs::remove_file(&path);

        let err = save_document(&path, &doc, OutputMode::Animated, CoordMode::Fractional);
        assert!(matches!(err, Err(Error::UnsupportedCellGeometry)));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = Path::new("/definitely/not/here/TiO2.out");
        let err = load_document(path, Request::Static).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
