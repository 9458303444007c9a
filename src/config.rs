// src/config.rs

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::io::CoordMode;

fn default_prefix() -> String {
  "relaxMovie".to_string()
}

fn default_true() -> bool {
  true
}

fn default_trajectory_coordinates() -> CoordMode {
  CoordMode::Fractional
}

// --- Main Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
  /// Prefix of `<prefix>_XDATCAR_<basename>`
  #[serde(default = "default_prefix")]
  pub trajectory_prefix: String,

  /// Where output files go; current directory when unset
  #[serde(default)]
  pub output_dir: Option<PathBuf>,

  #[serde(default = "default_true")]
  pub selective_dynamics: bool,

  #[serde(default = "default_trajectory_coordinates")]
  pub trajectory_coordinates: CoordMode,

  #[serde(default = "default_true")]
  pub write_energy_log: bool,

  #[serde(default)]
  pub write_placeholders: bool,

  /// Abort on the first unreadable trajectory frame instead of skipping it
  #[serde(default)]
  pub strict_frames: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      trajectory_prefix: default_prefix(),
      output_dir: None,
      selective_dynamics: true,
      trajectory_coordinates: default_trajectory_coordinates(),
      write_energy_log: true,
      write_placeholders: false,
      strict_frames: false,
    }
  }
}

impl Config {
  /// Loads config from standard OS location (e.g., ~/.config/qegeom/settings.json)
  pub fn load() -> (Self, String) {
    Self::load_from(&Self::get_path())
  }

  pub fn load_from(path: &Path) -> (Self, String) {
    if path.exists() {
      match File::open(path) {
        Ok(file) => {
          let reader = BufReader::new(file);
          match serde_json::from_reader(reader) {
            Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
            Err(e) => (Self::default(), format!("Error parsing config: {}", e)),
          }
        }
        Err(e) => (Self::default(), format!("Error opening config: {}", e)),
      }
    } else {
      (
        Self::default(),
        "No config found. Using defaults.".to_string(),
      )
    }
  }

  /// Saves config to standard OS location
  pub fn save(&self) -> io::Result<PathBuf> {
    let path = Self::get_path();
    self.save_to(&path)?;
    Ok(path)
  }

  pub fn save_to(&self, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, self)?;
    Ok(())
  }

  pub fn get_path() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("org", "qetoolset", "qegeom") {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }
}
