// src/utils/units.rs

/// Bohr per Angstrom (a.u. of length in one Angstrom)
pub const ANGSTROM_TO_BOHR: f64 = 1.8897259885789;

/// Rydberg in Joule times Avogadro, divided by 1000
pub const RY_TO_KJ_PER_MOL: f64 = 2.1798723611035e-21 * 6.0221409e23;

pub fn bohr_to_angstrom(value: f64) -> f64 {
    value / ANGSTROM_TO_BOHR
}

pub fn ry_to_kj_per_mol(value: f64) -> f64 {
    value * RY_TO_KJ_PER_MOL
}
