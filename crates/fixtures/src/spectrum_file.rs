//! JSON storage of measured spectra (`<prefix><seed>_pk.json`).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use gauss_grid_core::{GridError, MeasuredSpectrum};

use crate::grid_file::write_json;

pub fn save_spectrum(spectrum: &MeasuredSpectrum, path: &Path) -> Result<(), GridError> {
    write_json(spectrum, path)
}

pub fn load_spectrum(path: &Path) -> Result<MeasuredSpectrum, GridError> {
    let file = File::open(path)
        .map_err(|e| GridError::Persistence(format!("cannot open {}: {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| GridError::invalid(format!("malformed spectrum {}: {e}", path.display())))
}
