// src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("not a Quantum ESPRESSO input deck or pw.x output")]
    UnrecognizedFormat,

    #[error("no 'lattice parameter (alat)' line found")]
    MissingLatticeParameter,

    #[error("number of atoms not declared ('nat' or 'number of atoms/cell')")]
    MissingAtomCount,

    #[error("no cell vectors found (CELL_PARAMETERS or crystal axes block)")]
    MissingCellVectors,

    #[error("unsupported {context} unit '{unit}'")]
    UnsupportedUnit { context: &'static str, unit: String },

    #[error("no ATOMIC_POSITIONS block found")]
    NoSnapshotFound,

    #[error("malformed coordinate line {line}: {details}")]
    MalformedCoordinateLine { line: usize, details: String },

    #[error("cell is not aligned with the cartesian axes; fractional coordinates need a diagonal lattice")]
    UnsupportedCellGeometry,

    #[error("file is an input deck and holds no geometry sequence")]
    NotATrajectory,
}

impl Error {
    pub fn malformed(line: usize, details: impl Into<String>) -> Self {
        Self::MalformedCoordinateLine {
            line,
            details: details.into(),
        }
    }

    pub fn unit(context: &'static str, unit: impl Into<String>) -> Self {
        Self::UnsupportedUnit {
            context,
            unit: unit.into(),
        }
    }
}
