// src/io/poscar.rs

use std::io::Write;

use super::{check_cell, output_position, write_coordinates, write_header, CoordMode};
use crate::error::{Error, Result};
use crate::model::TrajectoryDocument;

const FREEZE_FLAGS: &str = "   F   F   F";

/// Writes the last snapshot of `doc` as a VASP 5 POSCAR.
pub fn write<W: Write>(
    doc: &TrajectoryDocument,
    coords: CoordMode,
    selective_dynamics: bool,
    w: &mut W,
) -> Result<()> {
    let snapshot = doc.snapshots.last().ok_or(Error::NoSnapshotFound)?;
    check_cell(&doc.lattice, coords)?;

    write_header(w, &doc.source, &doc.lattice, &snapshot.labels(), &snapshot.counts())?;

    if selective_dynamics {
        writeln!(w, "Selective dynamics")?;
    }
    match coords {
        CoordMode::Cartesian => writeln!(w, "Cartesian")?,
        CoordMode::Fractional => writeln!(w, "Direct")?,
    }

    for position in snapshot.positions() {
        let p = output_position(position, &doc.lattice, coords)?;
        write_coordinates(w, &p)?;
        if selective_dynamics {
            write!(w, "{}", FREEZE_FLAGS)?;
        }
        writeln!(w)?;
    }

    Ok(())
}
