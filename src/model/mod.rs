//src/model/mod.rs
pub mod structure;

// Re-exports for cleaner imports
pub use structure::{
    AtomSite, EnergyRecord, FormatKind, LatticeVectors, SkippedFrame, Snapshot, SpeciesBlock,
    TrajectoryDocument,
};
