//! PNG output of the input-vs-measured comparison plot.
//!
//! Feature-gated behind `png` (default on). The drawing itself lives in
//! [`crate::raster`].

use std::path::Path;

use gauss_grid_core::{GridError, MeasuredSpectrum, PowerSpectrum};

use crate::raster::{comparison_series, render_loglog, Labels};

pub const PLOT_WIDTH: usize = 800;
pub const PLOT_HEIGHT: usize = 600;

/// Writes the log–log comparison of `model` against each seed's spectrum.
pub fn write_comparison(
    model: &dyn PowerSpectrum,
    spectra: &[(u64, &MeasuredSpectrum)],
    path: &Path,
) -> Result<(), GridError> {
    let series = comparison_series(model, spectra);
    let rgba = render_loglog(&series, &Labels::comparison(), PLOT_WIDTH, PLOT_HEIGHT)?;
    let w = u32::try_from(PLOT_WIDTH).map_err(|_| GridError::invalid("plot width overflows u32"))?;
    let h =
        u32::try_from(PLOT_HEIGHT).map_err(|_| GridError::invalid("plot height overflows u32"))?;
    let img = image::RgbaImage::from_raw(w, h, rgba)
        .ok_or_else(|| GridError::Persistence("RGBA buffer size mismatch".into()))?;
    img.save(path)
        .map_err(|e| GridError::Persistence(format!("cannot write {}: {e}", path.display())))
}
