// src/cli.rs

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::io::CoordMode;

#[derive(Parser)]
#[command(
    name = "qegeom",
    about = "Quantum ESPRESSO geometries to VASP POSCAR / XDATCAR",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Report every parsing step
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Single geometry (pw.x input, or last step of a pw.x output) to POSCAR
    #[command(visible_alias = "p")]
    Poscar(PoscarArgs),

    /// Every relaxation step of a pw.x output to XDATCAR
    #[command(visible_alias = "x")]
    Xdatcar(XdatcarArgs),

    /// Show or save the persistent settings
    Config(ConfigArgs),
}

/// Output options shared by the conversion commands.
#[derive(Args)]
pub struct OutputOptions {
    /// Directory for the generated files (default: settings, then current directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Also write a placeholder POTCAR listing the species
    #[arg(long)]
    pub potcar: bool,
}

#[derive(Args)]
pub struct PoscarArgs {
    /// Quantum ESPRESSO input deck or pw.x output
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Coordinate system of the atom positions
    #[arg(long, value_name = "MODE", default_value = "cartesian")]
    pub coords: Coords,

    /// Omit the 'Selective dynamics' line and the F F F flags
    #[arg(long)]
    pub no_selective_dynamics: bool,

    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Args)]
pub struct XdatcarArgs {
    /// pw.x relaxation output
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Coordinate system of the frames (default from settings: fractional)
    #[arg(long, value_name = "MODE")]
    pub coords: Option<Coords>,

    /// File name prefix, giving <PREFIX>_XDATCAR_<basename>
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Do not write <basename>.E0.log
    #[arg(long)]
    pub no_energy_log: bool,

    /// Abort on the first unreadable geometry instead of skipping it
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the effective settings to the settings file
    #[arg(long)]
    pub save: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coords {
    Cartesian,
    Fractional,
}

impl From<Coords> for CoordMode {
    fn from(c: Coords) -> Self {
        match c {
            Coords::Cartesian => CoordMode::Cartesian,
            Coords::Fractional => CoordMode::Fractional,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
