// src/commands.rs

use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::cli::{Command, ConfigArgs, OutputOptions, PoscarArgs, XdatcarArgs};
use crate::config::Config;
use crate::io::{self, potcar, FramePolicy, OutputMode, Request};
use crate::model::TrajectoryDocument;
use crate::utils::report;

pub fn dispatch(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Poscar(args) => run_poscar(args, &config),
        Command::Xdatcar(args) => run_xdatcar(args, &config),
        Command::Config(args) => run_config(args, &config),
    }
}

fn run_poscar(args: PoscarArgs, config: &Config) -> Result<()> {
    info!("Create VASP-type POSCAR from QuantumEspresso files");
    let doc = read(&args.input, Request::Static)?;

    let out_dir = prepare_out_dir(&args.output, config)?;
    let path = out_dir.join(io::poscar_name(&io::basename(&args.input)));

    let mode = OutputMode::Static {
        selective_dynamics: config.selective_dynamics && !args.no_selective_dynamics,
    };

    info!("Creating {} file", path.display());
    io::save_document(&path, &doc, mode, args.coords.into())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if args.output.potcar || config.write_placeholders {
        write_placeholders(&out_dir, &doc)?;
    }

    log_summary(&doc);
    Ok(())
}

fn run_xdatcar(args: XdatcarArgs, config: &Config) -> Result<()> {
    info!("Create VASP-type XDATCAR from QuantumEspresso relaxation output");

    let policy = if args.strict || config.strict_frames {
        FramePolicy::Abort
    } else {
        FramePolicy::SkipAndCount
    };
    let doc = read(&args.input, Request::Trajectory(policy))?;

    let out_dir = prepare_out_dir(&args.output, config)?;
    let base = io::basename(&args.input);
    let prefix = args
        .prefix
        .as_deref()
        .unwrap_or(&config.trajectory_prefix);
    let trajectory_name = io::xdatcar_name(prefix, &base);
    let path = out_dir.join(&trajectory_name);
    let coords = args
        .coords
        .map(Into::into)
        .unwrap_or(config.trajectory_coordinates);

    info!("Creating {} file", path.display());
    io::save_document(&path, &doc, OutputMode::Animated, coords)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if doc.skipped_count() > 0 {
        warn!(
            "{} geometries could not be read and were left out, better check manually",
            doc.skipped_count()
        );
    }

    if config.write_energy_log && !args.no_energy_log {
        if doc.energies.is_empty() {
            warn!("No total energies found, skipping energy log");
        } else {
            let log_path = out_dir.join(io::energy_log_name(&base));
            info!("Writing energies to {}", log_path.display());
            write_with(&log_path, |w| io::energy::write(&doc, &trajectory_name, w))?;
        }
    }

    if args.output.potcar || config.write_placeholders {
        write_placeholders(&out_dir, &doc)?;
    }

    log_summary(&doc);
    Ok(())
}

fn run_config(args: ConfigArgs, config: &Config) -> Result<()> {
    println!("# {}", Config::get_path().display());
    println!("{}", serde_json::to_string_pretty(config)?);

    if args.save {
        let path = config.save().context("failed to save settings")?;
        info!("Config saved to {}", path.display());
    }
    Ok(())
}

fn read(path: &Path, request: Request) -> Result<TrajectoryDocument> {
    info!("Opening file {}", path.display());
    io::load_document(path, request).with_context(|| format!("failed to read {}", path.display()))
}

fn prepare_out_dir(options: &OutputOptions, config: &Config) -> Result<PathBuf> {
    let dir = options
        .out_dir
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

fn write_placeholders(out_dir: &Path, doc: &TrajectoryDocument) -> Result<()> {
    let path = out_dir.join(io::PLACEHOLDER_FILE);
    info!("Writing placeholder {} for viewers", path.display());
    write_with(&path, |w| potcar::write_placeholders(&doc.species_labels(), w))
}

fn write_with<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("failed to write {}", path.display()))
}

fn log_summary(doc: &TrajectoryDocument) {
    for line in report::document_summary(doc).lines() {
        info!("{}", line);
    }
    info!("All done, cheers!");
}
