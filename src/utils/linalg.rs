// src/utils/linalg.rs

use nalgebra::{Matrix3, Vector3};

use crate::model::LatticeVectors;

/// Relative size of an off-diagonal component still treated as zero.
pub const ALIGNMENT_TOLERANCE: f64 = 1e-8;

/// Lattice vectors as a row matrix [[ax, ay, az], [bx, by, bz], [cx, cy, cz]]
pub fn lattice_matrix(lattice: &LatticeVectors) -> Matrix3<f64> {
  Matrix3::from_row_slice(&[
    lattice[0][0],
    lattice[0][1],
    lattice[0][2],
    lattice[1][0],
    lattice[1][1],
    lattice[1][2],
    lattice[2][0],
    lattice[2][1],
    lattice[2][2],
  ])
}

/// Convert fractional coordinates to Cartesian using lattice matrix
///
/// # Formula
/// ```text
/// Cartesian = Lattice^T × Fractional
/// ```
pub fn frac_to_cart(frac: [f64; 3], lattice: &LatticeVectors) -> [f64; 3] {
  let cart_vec = lattice_matrix(lattice).transpose() * Vector3::from(frac);
  [cart_vec.x, cart_vec.y, cart_vec.z]
}

/// True when every lattice vector lies along its own cartesian axis
/// and none of them is degenerate.
pub fn is_axis_aligned(lattice: &LatticeVectors) -> bool {
  let m = lattice_matrix(lattice);
  let scale = m.amax();
  if scale == 0.0 {
    return false;
  }

  let diag = m.diagonal();
  let off_diagonal = m - Matrix3::from_diagonal(&diag);

  off_diagonal.amax() <= ALIGNMENT_TOLERANCE * scale
    && diag.iter().all(|d| d.abs() > ALIGNMENT_TOLERANCE * scale)
}

/// Cartesian to fractional by dividing each component by the matching
/// diagonal lattice component. `None` for cells that are not axis aligned.
pub fn cart_to_frac_diagonal(cart: [f64; 3], lattice: &LatticeVectors) -> Option<[f64; 3]> {
  if !is_axis_aligned(lattice) {
    return None;
  }

  let diag = lattice_matrix(lattice).diagonal();
  let frac = Vector3::from(cart).component_div(&diag);

  Some([frac.x, frac.y, frac.z])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cubic_lattice() {
    // Simple cubic lattice 5.0 Å
    let lattice = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]];

    let frac = [0.5, 0.5, 0.5];
    let cart = frac_to_cart(frac, &lattice);

    assert!((cart[0] - 2.5).abs() < 1e-10);
    assert!((cart[1] - 2.5).abs() < 1e-10);
    assert!((cart[2] - 2.5).abs() < 1e-10);
  }

  #[test]
  fn test_diagonal_matches_general_inverse() {
    let lattice = [[3.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 5.0]];
    let cart = [1.2, -0.7, 4.9];

    let frac = cart_to_frac_diagonal(cart, &lattice).unwrap();
    let inv = lattice_matrix(&lattice).transpose().try_inverse().unwrap();
    let general = inv * Vector3::from(cart);

    for axis in 0..3 {
      assert!((frac[axis] - general[axis]).abs() < 1e-12);
    }
  }

  #[test]
  fn test_fractional_rescales_to_cartesian() {
    let lattice = [[6.1, 0.0, 0.0], [0.0, 7.3, 0.0], [0.0, 0.0, 19.5]];
    let cart = [2.0, 5.5, 11.25];

    let frac = cart_to_frac_diagonal(cart, &lattice).unwrap();
    let back = frac_to_cart(frac, &lattice);

    for axis in 0..3 {
      assert!((frac[axis] * lattice[axis][axis] - cart[axis]).abs() < 1e-12);
      assert!((back[axis] - cart[axis]).abs() < 1e-12);
    }
  }

  #[test]
  fn test_non_orthogonal_cell_rejected() {
    // Hexagonal
    let lattice = [[4.0, 0.0, 0.0], [-2.0, 3.46, 0.0], [0.0, 0.0, 5.0]];

    assert!(!is_axis_aligned(&lattice));
    assert!(cart_to_frac_diagonal([1.0, 1.0, 1.0], &lattice).is_none());
  }

  #[test]
  fn test_degenerate_cell_rejected() {
    let lattice = [[4.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 5.0]];
    assert!(!is_axis_aligned(&lattice));
  }
}
