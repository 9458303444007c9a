// src/io/potcar.rs
//
// Minimal POTCAR stand-in. Viewers such as vmd read species names from it;
// it holds no pseudopotential data.

use std::io::{self, Write};

pub fn write_placeholders<W: Write>(labels: &[String], w: &mut W) -> io::Result<()> {
    for label in labels {
        writeln!(w, "  PAW_PBE {} 01Feb1994{}", label, " ".repeat(20))?;
        writeln!(w, " End of Dataset")?;
    }
    Ok(())
}
