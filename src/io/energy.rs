// src/io/energy.rs

use std::io::{self, Write};

use crate::model::TrajectoryDocument;

/// Energy log: one ` Geom = <i> , E0 = <Ry>` line per collected record.
pub fn write<W: Write>(doc: &TrajectoryDocument, trajectory_name: &str, w: &mut W) -> io::Result<()> {
    writeln!(
        w,
        " Electronic energies from {}, QuantumEspresso relaxation Job",
        doc.source
    )?;
    writeln!(w, "Values extracted when creating the {} file", trajectory_name)?;

    for record in &doc.energies {
        writeln!(w, " Geom = {} , E0 = {}", record.index, record.energy)?;
    }

    writeln!(w, " ---- End of file ---- ")
}
