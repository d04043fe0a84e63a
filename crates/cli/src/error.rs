//! Errors of the `gauss-grid` binary and their process exit codes.
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 2 | rejected by clap before any work starts |
//! | 10 | generation, measurement or spectrum model failure |
//! | 11 | a grid, spectrum, metadata or plot file could not be read or written |
//! | 12 | unusable run configuration, grid sidecar or flag value |
//! | 13 | the JSON report could not be produced |

use std::path::{Path, PathBuf};

use gauss_grid_core::GridError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Grid(GridError),

    #[error("{0}")]
    Storage(String),

    /// The `--config` file parsed but does not describe a valid run.
    #[error("run configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    /// A stored grid whose sidecar or array shape cannot be trusted.
    #[error("grid {}: {reason}", grid.display())]
    Sidecar { grid: PathBuf, reason: String },

    #[error("{0}")]
    Flag(String),

    #[error("cannot render JSON output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Grid(_) => 10,
            CliError::Storage(_) => 11,
            CliError::Config { .. } | CliError::Sidecar { .. } | CliError::Flag(_) => 12,
            CliError::Output(_) => 13,
        }
    }

    /// Short machine-readable tag for `--json` error output.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Grid(GridError::UnknownSpectrum(_)) => "unknown-spectrum",
            CliError::Grid(_) => "grid",
            CliError::Storage(_) => "storage",
            CliError::Config { .. } => "config",
            CliError::Sidecar { .. } => "sidecar",
            CliError::Flag(_) => "flag",
            CliError::Output(_) => "output",
        }
    }

    /// Failure loading the run configuration at `path`.
    pub fn config(path: &Path, e: GridError) -> Self {
        match e {
            GridError::Persistence(msg) => CliError::Storage(msg),
            other => CliError::Config {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }

    /// Failure loading the stored grid at `grid` or resolving its sidecar model.
    pub fn sidecar(grid: &Path, e: GridError) -> Self {
        match e {
            GridError::Persistence(msg) => CliError::Storage(msg),
            other => CliError::Sidecar {
                grid: grid.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<GridError> for CliError {
    fn from(e: GridError) -> Self {
        match e {
            GridError::Persistence(msg) => CliError::Storage(msg),
            other => CliError::Grid(other),
        }
    }
}
