// src/model/structure.rs

use std::fmt;

/// Cell basis `[a_vec, b_vec, c_vec]`, in Angstrom.
pub type LatticeVectors = [[f64; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// A pw.x input deck (`&system` + `CELL_PARAMETERS` + `ATOMIC_POSITIONS`)
    SingleInput,
    /// A pw.x run log carrying the program banner
    RelaxationOutput,
    Unrecognized,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::SingleInput => write!(f, "QE input"),
            FormatKind::RelaxationOutput => write!(f, "QE relaxation output"),
            FormatKind::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtomSite {
    pub species: String,
    pub position: [f64; 3],
}

/// All positions of one species inside a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesBlock {
    pub label: String,
    pub positions: Vec<[f64; 3]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// 1-based configuration number
    pub index: usize,
    // Ordered by first appearance in the source block
    pub species: Vec<SpeciesBlock>,
}

impl Snapshot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            species: Vec::new(),
        }
    }

    pub fn push(&mut self, site: AtomSite) {
        match self.species.iter_mut().find(|b| b.label == site.species) {
            Some(block) => block.positions.push(site.position),
            None => self.species.push(SpeciesBlock {
                label: site.species,
                positions: vec![site.position],
            }),
        }
    }

    pub fn atom_count(&self) -> usize {
        self.species.iter().map(|b| b.positions.len()).sum()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.species.iter().map(|b| b.label.as_str()).collect()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.species.iter().map(|b| b.positions.len()).collect()
    }

    /// Positions in species-major order.
    pub fn positions(&self) -> impl Iterator<Item = &[f64; 3]> {
        self.species.iter().flat_map(|b| b.positions.iter())
    }
}

/// Total energy (Ry) reported before the geometry block with the same index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyRecord {
    pub index: usize,
    pub energy: f64,
}

/// A trajectory frame that was dropped instead of aborting the scan.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedFrame {
    pub index: usize,
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct TrajectoryDocument {
    /// File name the geometry was read from, used in the title line
    pub source: String,
    pub format: FormatKind,
    pub lattice: LatticeVectors,
    pub atom_count: usize,
    pub snapshots: Vec<Snapshot>,
    pub energies: Vec<EnergyRecord>,
    pub skipped: Vec<SkippedFrame>,
}

impl TrajectoryDocument {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn last_index(&self) -> usize {
        self.snapshots.last().map(|s| s.index).unwrap_or(0)
    }

    /// Species labels across every snapshot, in first-seen order.
    pub fn species_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for snapshot in &self.snapshots {
            for block in &snapshot.species {
                if !labels.contains(&block.label) {
                    labels.push(block.label.clone());
                }
            }
        }
        labels
    }
}
