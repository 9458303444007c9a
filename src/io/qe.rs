// src/io/qe.rs

use log::{debug, info, warn};

use super::scanner::{FramePolicy, ScanHeader, SnapshotScan, TrajectoryBuilder};
use crate::error::{Error, Result};
use crate::model::{AtomSite, FormatKind, LatticeVectors, Snapshot, TrajectoryDocument};
use crate::utils::{linalg, units};

pub const PROGRAM_BANNER: &str = "This program is part of the open-source Quantum ESPRESSO suite";

const SYSTEM_NAMELIST: &str = "&system";
const CELL_CARD: &str = "cell_parameters";
const POSITIONS_CARD: &str = "atomic_positions";
const ALAT_MARKER: &str = "lattice parameter (alat)";
const AXES_MARKER: &str = "crystal axes: (cart. coord. in units of alat)";
const NAT_MARKER: &str = "number of atoms/cell";
const ENERGY_MARKER: &str = "total energy";
const JOB_DONE_MARKER: &str = "JOB DONE.";

/// Which geometry (or geometries) to pull from the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// The one ATOMIC_POSITIONS card of an input deck
    Single,
    /// The last ATOMIC_POSITIONS block of a run log
    LastOnly,
    /// Every ATOMIC_POSITIONS block, in order
    Trajectory(FramePolicy),
}

/// What the caller wants out of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Static,
    Trajectory(FramePolicy),
}

/// Unit of the coordinates following an ATOMIC_POSITIONS marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionUnit {
    Angstrom,
    Bohr,
    Crystal,
    /// Lattice parameter in Angstrom
    Alat(f64),
}

impl PositionUnit {
    pub fn to_cartesian(self, raw: [f64; 3], lattice: &LatticeVectors) -> [f64; 3] {
        match self {
            PositionUnit::Angstrom => raw,
            PositionUnit::Bohr => raw.map(units::bohr_to_angstrom),
            PositionUnit::Crystal => linalg::frac_to_cart(raw, lattice),
            PositionUnit::Alat(a) => raw.map(|c| c * a),
        }
    }
}

/// Everything needed to turn a raw coordinate line into Angstrom.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateContext {
    pub kind: FormatKind,
    pub lattice_parameter: Option<f64>,
    pub lattice: LatticeVectors,
}

// =======================
//   FORMAT DETECTION
// =======================

/// Pure sniffing of structural markers.
///
/// An input deck signature (`&system` + `CELL_PARAMETERS` + `ATOMIC_POSITIONS`)
/// wins over the program banner when both are present.
pub fn sniff(text: &str) -> FormatKind {
    let lower = text.to_lowercase();
    let input_signature = lower.contains(SYSTEM_NAMELIST)
        && lower.contains(CELL_CARD)
        && lower.contains(POSITIONS_CARD);

    if input_signature {
        FormatKind::SingleInput
    } else if text.contains(PROGRAM_BANNER) {
        FormatKind::RelaxationOutput
    } else {
        FormatKind::Unrecognized
    }
}

pub fn classify(text: &str) -> Result<FormatKind> {
    match sniff(text) {
        FormatKind::Unrecognized => Err(Error::UnrecognizedFormat),
        kind => Ok(kind),
    }
}

// =======================
//   HEADER FIELDS
// =======================

/// Lattice parameter in Angstrom, from the `lattice parameter (alat)` line (Bohr).
pub fn extract_lattice_parameter(text: &str) -> Result<f64> {
    text.lines()
        .find_map(parse_lattice_parameter_line)
        .ok_or(Error::MissingLatticeParameter)
}

pub fn extract_lattice_vectors(
    text: &str,
    kind: FormatKind,
    lattice_parameter: Option<f64>,
) -> Result<LatticeVectors> {
    let lines: Vec<&str> = text.lines().collect();

    match kind {
        FormatKind::SingleInput => {
            let start = lines
                .iter()
                .position(|l| is_card(l, CELL_CARD))
                .ok_or(Error::MissingCellVectors)?;

            let unit = card_unit(lines[start]);
            if unit.as_deref() != Some("angstrom") {
                return Err(Error::unit("cell", unit.unwrap_or_else(|| "none".to_string())));
            }

            read_three(&lines, start, parse_vec3_line)
        }
        FormatKind::RelaxationOutput => {
            let alat = lattice_parameter.ok_or(Error::MissingLatticeParameter)?;
            let start = lines
                .iter()
                .position(|l| l.contains(AXES_MARKER))
                .ok_or(Error::MissingCellVectors)?;

            let axes = read_three(&lines, start, parse_axis_line)?;
            Ok(axes.map(|row| row.map(|c| c * alat)))
        }
        FormatKind::Unrecognized => Err(Error::UnrecognizedFormat),
    }
}

pub fn extract_atom_count(text: &str, kind: FormatKind) -> Result<usize> {
    let found = match kind {
        FormatKind::SingleInput => namelist_entry(text, SYSTEM_NAMELIST, "nat")
            .and_then(|v| v.parse::<usize>().ok()),
        FormatKind::RelaxationOutput => text.lines().find_map(parse_atom_count_line),
        FormatKind::Unrecognized => return Err(Error::UnrecognizedFormat),
    };

    found.filter(|&n| n > 0).ok_or(Error::MissingAtomCount)
}

// =======================
//   SNAPSHOTS
// =======================

pub fn extract_snapshots(
    text: &str,
    atom_count: usize,
    mode: ExtractMode,
    ctx: &CoordinateContext,
) -> Result<SnapshotScan> {
    let lines: Vec<&str> = text.lines().collect();

    let marker = match mode {
        ExtractMode::Single => {
            let mut markers = lines.iter().enumerate().filter(|(_, l)| is_card(l, POSITIONS_CARD));
            let first = markers.next().map(|(i, _)| i);
            if markers.next().is_some() {
                warn!("More than one ATOMIC_POSITIONS card, using the first");
            }
            first
        }
        ExtractMode::LastOnly => lines.iter().rposition(|l| is_card(l, POSITIONS_CARD)),
        ExtractMode::Trajectory(policy) => {
            let header = ScanHeader {
                atom_count,
                lattice_parameter: ctx.lattice_parameter,
                lattice: ctx.lattice,
            };
            let mut builder = TrajectoryBuilder::seeded(ctx.kind, header, policy);
            for line in &lines {
                builder.observe(line)?;
            }
            let (_, scan) = builder.finish()?;
            return Ok(scan);
        }
    };

    let start = marker.ok_or(Error::NoSnapshotFound)?;
    debug!("Geometry block starts at line {}", start + 1);

    let snapshot = read_block(&lines, start, atom_count, 1, ctx)?;

    Ok(SnapshotScan {
        snapshots: vec![snapshot],
        energies: Vec::new(),
        skipped: Vec::new(),
    })
}

/// Reads `atom_count` coordinate lines following the marker at `start`.
fn read_block(
    lines: &[&str],
    start: usize,
    atom_count: usize,
    index: usize,
    ctx: &CoordinateContext,
) -> Result<Snapshot> {
    let unit = position_unit(lines[start], ctx.kind, ctx.lattice_parameter)?;
    let mut snapshot = Snapshot::new(index);

    for offset in 1..=atom_count {
        let line_no = start + offset + 1;
        let line = lines.get(start + offset).ok_or_else(|| {
            Error::malformed(
                line_no,
                format!("end of file after {} of {} atoms", offset - 1, atom_count),
            )
        })?;

        let mut site = parse_site(line, line_no)?;
        site.position = unit.to_cartesian(site.position, &ctx.lattice);
        snapshot.push(site);
    }

    Ok(snapshot)
}

// =======================
//   DOCUMENT
// =======================

pub fn read_document(text: &str, source: &str, request: Request) -> Result<TrajectoryDocument> {
    let kind = classify(text)?;
    info!("Checking file ... {}", kind);

    let (header, scan) = match (kind, request) {
        (FormatKind::SingleInput, Request::Static) => {
            let atom_count = extract_atom_count(text, kind)?;
            let lattice = extract_lattice_vectors(text, kind, None)?;
            let ctx = CoordinateContext {
                kind,
                lattice_parameter: None,
                lattice,
            };
            let scan = extract_snapshots(text, atom_count, ExtractMode::Single, &ctx)?;
            let header = ScanHeader {
                atom_count,
                lattice_parameter: None,
                lattice,
            };
            (header, scan)
        }
        (FormatKind::RelaxationOutput, Request::Static) => {
            let alat = extract_lattice_parameter(text)?;
            info!("Lattice parameter = {:.8} Angstrom", alat);
            let lattice = extract_lattice_vectors(text, kind, Some(alat))?;
            let atom_count = extract_atom_count(text, kind)?;
            let ctx = CoordinateContext {
                kind,
                lattice_parameter: Some(alat),
                lattice,
            };
            info!("Looking for last geometry");
            let scan = extract_snapshots(text, atom_count, ExtractMode::LastOnly, &ctx)?;
            let header = ScanHeader {
                atom_count,
                lattice_parameter: Some(alat),
                lattice,
            };
            (header, scan)
        }
        (FormatKind::RelaxationOutput, Request::Trajectory(policy)) => {
            let mut builder = TrajectoryBuilder::new(kind, policy);
            for line in text.lines() {
                builder.observe(line)?;
            }
            builder.finish()?
        }
        (FormatKind::SingleInput, Request::Trajectory(_)) => return Err(Error::NotATrajectory),
        (FormatKind::Unrecognized, _) => return Err(Error::UnrecognizedFormat),
    };

    info!("Number of atoms = {}", header.atom_count);

    Ok(TrajectoryDocument {
        source: source.to_string(),
        format: kind,
        lattice: header.lattice,
        atom_count: header.atom_count,
        snapshots: scan.snapshots,
        energies: scan.energies,
        skipped: scan.skipped,
    })
}

// =======================
//   LINE HELPERS
// =======================

/// `lattice parameter (alat)  =      10.2000  a.u.` -> Angstrom
pub(crate) fn parse_lattice_parameter_line(line: &str) -> Option<f64> {
    if !line.contains(ALAT_MARKER) {
        return None;
    }
    extract_val(line, "=").map(units::bohr_to_angstrom)
}

/// `number of atoms/cell      =            3`
pub(crate) fn parse_atom_count_line(line: &str) -> Option<usize> {
    if !line.contains(NAT_MARKER) {
        return None;
    }
    line.split('=').nth(1)?.split_whitespace().next()?.parse().ok()
}

/// `!    total energy              =     -25.44557488 Ry`
pub(crate) fn parse_energy_line(line: &str) -> Option<f64> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('!') || !trimmed.contains(ENERGY_MARKER) {
        return None;
    }
    extract_val(trimmed, "=")
}

pub(crate) fn is_positions_marker(line: &str) -> bool {
    is_card(line, POSITIONS_CARD)
}

pub(crate) fn is_axes_marker(line: &str) -> bool {
    line.contains(AXES_MARKER)
}

pub(crate) fn is_job_done(line: &str) -> bool {
    line.contains(JOB_DONE_MARKER)
}

/// `a(1) = (   1.000000   0.000000   0.000000 )`
pub(crate) fn parse_axis_line(line: &str) -> Option<[f64; 3]> {
    let body = line.split_once('=')?.1;
    let nums: Vec<f64> = body
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|s| !s.is_empty())
        .map(parse_float)
        .collect::<Option<_>>()?;

    (nums.len() >= 3).then(|| [nums[0], nums[1], nums[2]])
}

fn parse_vec3_line(line: &str) -> Option<[f64; 3]> {
    let nums: Vec<f64> = line
        .split_whitespace()
        .take(3)
        .map(parse_float)
        .collect::<Option<_>>()?;

    (nums.len() == 3).then(|| [nums[0], nums[1], nums[2]])
}

/// `Ti  0.0000  0.5000  0.2500  [if_pos flags]`
pub(crate) fn parse_site(line: &str, line_no: usize) -> Result<AtomSite> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(Error::malformed(
            line_no,
            format!("expected species and 3 coordinates, got '{}'", line.trim()),
        ));
    }

    let mut position = [0.0; 3];
    for (axis, token) in parts[1..4].iter().enumerate() {
        position[axis] = parse_float(token).ok_or_else(|| {
            Error::malformed(line_no, format!("'{}' is not a finite number", token))
        })?;
    }

    Ok(AtomSite {
        species: parts[0].to_string(),
        position,
    })
}

/// Resolves the unit of an ATOMIC_POSITIONS block.
///
/// A bare marker means alat in QE; input decks carry no lattice parameter
/// here, so alat positions in an input deck are rejected.
pub(crate) fn position_unit(
    header: &str,
    kind: FormatKind,
    lattice_parameter: Option<f64>,
) -> Result<PositionUnit> {
    let unit = card_unit(header);

    match unit.as_deref() {
        Some("angstrom") => Ok(PositionUnit::Angstrom),
        Some("bohr") => Ok(PositionUnit::Bohr),
        Some("crystal") => Ok(PositionUnit::Crystal),
        None | Some("alat") => match (kind, lattice_parameter) {
            (FormatKind::RelaxationOutput, Some(a)) => Ok(PositionUnit::Alat(a)),
            (FormatKind::RelaxationOutput, None) => Err(Error::MissingLatticeParameter),
            _ => Err(Error::unit("atomic positions", "alat")),
        },
        Some(other) => Err(Error::unit("atomic positions", other)),
    }
}

fn is_card(line: &str, card: &str) -> bool {
    line.trim_start().to_lowercase().starts_with(card)
}

/// Unit keyword of a card header: `CELL_PARAMETERS {angstrom}` -> `angstrom`.
fn card_unit(header: &str) -> Option<String> {
    let rest = header.trim().split_once(|c: char| c.is_whitespace() || c == '(' || c == '{');
    let rest = rest?.1;
    let token = rest
        .split(|c: char| c.is_whitespace() || "(){}=".contains(c))
        .find(|s| !s.is_empty())?;

    Some(token.to_lowercase())
}

fn read_three(
    lines: &[&str],
    start: usize,
    parse: fn(&str) -> Option<[f64; 3]>,
) -> Result<LatticeVectors> {
    let mut vectors = [[0.0; 3]; 3];
    for (row, vector) in vectors.iter_mut().enumerate() {
        let line_no = start + row + 2;
        let line = lines
            .get(start + row + 1)
            .ok_or_else(|| Error::malformed(line_no, "missing cell vector"))?;
        *vector = parse(line)
            .ok_or_else(|| Error::malformed(line_no, format!("bad cell vector '{}'", line.trim())))?;
    }
    Ok(vectors)
}

/// Value of `key` inside a `&namelist ... /` section, comments stripped.
///
/// Entries may share a line with the namelist header or with the closing `/`.
fn namelist_entry(text: &str, namelist: &str, key: &str) -> Option<String> {
    let mut inside = false;

    for line in text.lines() {
        let mut content = line.split('!').next().unwrap_or("").trim();

        if !inside {
            if !content.to_lowercase().starts_with(namelist) {
                continue;
            }
            inside = true;
            content = content.get(namelist.len()..).unwrap_or("");
        } else if content.starts_with('&') {
            break;
        }

        let (body, closed) = match content.find('/') {
            Some(end) => (&content[..end], true),
            None => (content, false),
        };

        for entry in body.split(',') {
            if let Some((k, v)) = entry.split_once('=') {
                if k.trim().eq_ignore_ascii_case(key) {
                    return Some(v.trim().to_string());
                }
            }
        }
        if closed {
            break;
        }
    }
    None
}

fn extract_val(line: &str, delimiter: &str) -> Option<f64> {
    let part = line.split(delimiter).nth(1)?;
    parse_float(part.split_whitespace().next()?)
}

/// Finite float, accepting Fortran `d` exponents (e.g. 1.0d-8).
fn parse_float(token: &str) -> Option<f64> {
    token
        .replace(['d', 'D'], "e")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
