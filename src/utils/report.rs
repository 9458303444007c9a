// src/utils/report.rs

use crate::model::structure::TrajectoryDocument;
use crate::utils::units;

/// Species formula in first-seen order, e.g. `O2 Ti1`.
pub fn formula(doc: &TrajectoryDocument) -> String {
    doc.snapshots
        .last()
        .map(|snap| {
            snap.species
                .iter()
                .map(|b| format!("{}{}", b.label, b.positions.len()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Run summary printed once the output files are written
pub fn document_summary(doc: &TrajectoryDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {} ({})\n", doc.source, doc.format));
    out.push_str(&format!("Formula: {}\n", formula(doc)));
    out.push_str(&format!("Atoms: {}\n", doc.atom_count));
    out.push_str(&format!(
        "Geometries: {} written, {} skipped\n",
        doc.snapshots.len(),
        doc.skipped_count()
    ));

    for skipped in &doc.skipped {
        out.push_str(&format!(
            "  skipped geometry {} (line {}): {}\n",
            skipped.index, skipped.line, skipped.reason
        ));
    }

    if let Some(energy) = energy_summary(doc) {
        out.push_str(&energy);
    }

    out
}

fn energy_summary(doc: &TrajectoryDocument) -> Option<String> {
    let first = doc.energies.first()?;
    let last = doc.energies.last()?;
    let lowest = doc
        .energies
        .iter()
        .min_by(|a, b| a.energy.total_cmp(&b.energy))?;

    let drop = last.energy - first.energy;

    let mut out = String::new();
    out.push_str("--------------------------------------------------\n");
    out.push_str(&format!(
        "{:<10} {:<8} {:>18} {:>18}\n",
        "Energy", "Geom", "E0 / Ry", "E0 / kJ/mol"
    ));
    out.push_str("--------------------------------------------------\n");
    for (name, record) in [("first", first), ("last", last), ("lowest", lowest)] {
        out.push_str(&format!(
            "{:<10} {:<8} {:>18.8} {:>18.3}\n",
            name,
            record.index,
            record.energy,
            units::ry_to_kj_per_mol(record.energy)
        ));
    }
    out.push_str(&format!(
        "Change: {:.8} Ry = {:.3} kJ/mol over {} records\n",
        drop,
        units::ry_to_kj_per_mol(drop),
        doc.energies.len()
    ));

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomSite, EnergyRecord, FormatKind, SkippedFrame, Snapshot};

    fn doc() -> TrajectoryDocument {
        let mut snap = Snapshot::new(1);
        for species in ["Ti", "O", "O"] {
            snap.push(AtomSite {
                species: species.to_string(),
                position: [0.0; 3],
            });
        }
        TrajectoryDocument {
            source: "TiO2.out".to_string(),
            format: FormatKind::RelaxationOutput,
            lattice: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            atom_count: 3,
            snapshots: vec![snap],
            energies: Vec::new(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_formula_keeps_first_seen_order() {
        assert_eq!(formula(&doc()), "Ti1 O2");
    }

    #[test]
    fn test_summary_without_energies() {
        let text = document_summary(&doc());
        assert!(text.contains("Geometries: 1 written, 0 skipped"));
        assert!(!text.contains("kJ/mol"));
    }

    #[test]
    fn test_summary_lists_skips_and_energy_change() {
        let mut d = doc();
        d.skipped.push(SkippedFrame {
            index: 3,
            line: 120,
            reason: "bad".to_string(),
        });
        d.energies = vec![
            EnergyRecord { index: 1, energy: -50.0 },
            EnergyRecord { index: 2, energy: -51.0 },
            EnergyRecord { index: 3, energy: -50.5 },
        ];

        let text = document_summary(&d);
        assert!(text.contains("1 skipped"));
        assert!(text.contains("skipped geometry 3 (line 120): bad"));
        assert!(text.contains("Change: -0.50000000 Ry"));
        assert!(text.contains("lowest     2"));
    }
}
