//! `.npy` grid files and their JSON metadata sidecars.
//!
//! A grid is stored as a float64 array of shape `(N, N, N)` in C order, so
//! `np.load(path)[x, y, z]` matches [`Grid::get`]. The sidecar records what
//! the array alone cannot: box size, seed and the spectrum that produced it.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use gauss_grid_core::{GeneratorOptions, Grid, GridError};
use ndarray::{Array3, ArrayView3};
use ndarray_npy::{read_npy, write_npy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything needed to regenerate a stored grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    pub box_size: f64,
    pub grid_size: usize,
    pub seed: u64,
    pub redshift: f64,
    /// Registry name of the spectrum model.
    pub spectrum: String,
    pub spectrum_params: Value,
    #[serde(default)]
    pub options: GeneratorOptions,
}

/// `grid.npy` → `grid.json`.
pub fn sidecar_path(grid_path: &Path) -> PathBuf {
    grid_path.with_extension("json")
}

/// Writes `grid` as a C-order float64 `.npy` file.
pub fn save_grid(grid: &Grid, path: &Path) -> Result<(), GridError> {
    let n = grid.size();
    let view = ArrayView3::from_shape((n, n, n), grid.data())
        .map_err(|e| GridError::Persistence(format!("grid shape: {e}")))?;
    write_npy(path, &view)
        .map_err(|e| GridError::Persistence(format!("cannot write {}: {e}", path.display())))
}

/// Reads a cubic float64 `.npy` file as a grid of side `box_size`.
///
/// Fortran-ordered files are accepted and reordered.
pub fn load_grid(path: &Path, box_size: f64) -> Result<Grid, GridError> {
    let array: Array3<f64> = read_npy(path)
        .map_err(|e| GridError::Persistence(format!("cannot read {}: {e}", path.display())))?;
    let (nx, ny, nz) = array.dim();
    if nx != ny || ny != nz {
        return Err(GridError::invalid(format!(
            "{} holds a {nx}x{ny}x{nz} array, expected a cube",
            path.display()
        )));
    }
    let data = if array.is_standard_layout() {
        array.into_raw_vec()
    } else {
        array.iter().copied().collect()
    };
    Grid::from_data(nx, box_size, data)
}

/// Pretty-prints `value` to `path`. The buffer is flushed explicitly so a
/// short write surfaces here instead of being dropped with the writer.
pub(crate) fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), GridError> {
    let file = File::create(path)
        .map_err(|e| GridError::Persistence(format!("cannot create {}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| GridError::Persistence(format!("cannot write {}: {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| GridError::Persistence(format!("cannot write {}: {e}", path.display())))
}

pub fn save_metadata(meta: &GridMetadata, path: &Path) -> Result<(), GridError> {
    write_json(meta, path)
}

pub fn load_metadata(path: &Path) -> Result<GridMetadata, GridError> {
    let file = File::open(path)
        .map_err(|e| GridError::Persistence(format!("cannot open {}: {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| GridError::invalid(format!("malformed metadata {}: {e}", path.display())))
}

/// Loads a grid together with its sidecar, taking the box size from it.
pub fn load_grid_with_metadata(path: &Path) -> Result<(Grid, GridMetadata), GridError> {
    let meta = load_metadata(&sidecar_path(path))?;
    let grid = load_grid(path, meta.box_size)?;
    if grid.size() != meta.grid_size {
        return Err(GridError::DimensionMismatch {
            expected: meta.grid_size,
            got: grid.size(),
        });
    }
    Ok((grid, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ShapeBuilder;
    use serde_json::json;

    fn ramp(n: usize) -> Grid {
        let data = (0..n * n * n).map(|i| i as f64 * 0.5 - 3.0).collect();
        Grid::from_data(n, 10.0, data).unwrap()
    }

    fn metadata(n: usize) -> GridMetadata {
        GridMetadata {
            box_size: 10.0,
            grid_size: n,
            seed: 7,
            redshift: 0.0,
            spectrum: "constant".into(),
            spectrum_params: json!({"value": 1.0}),
            options: GeneratorOptions::default(),
        }
    }

    #[test]
    fn sidecar_replaces_extension() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/test_grid_512_1.npy")),
            PathBuf::from("/tmp/test_grid_512_1.json")
        );
    }

    #[test]
    fn grid_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.npy");
        let grid = ramp(4);
        save_grid(&grid, &path).unwrap();
        let back = load_grid(&path, 10.0).unwrap();
        assert_eq!(back.size(), 4);
        assert!(grid
            .data()
            .iter()
            .zip(back.data())
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn stored_array_is_c_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.npy");
        let grid = ramp(3);
        save_grid(&grid, &path).unwrap();
        let array: Array3<f64> = read_npy(&path).unwrap();
        assert_eq!(array.dim(), (3, 3, 3));
        assert_eq!(array[[1, 2, 0]], grid.get(1, 2, 0));
        assert_eq!(array[[2, 0, 1]], grid.get(2, 0, 1));
    }

    #[test]
    fn fortran_ordered_file_is_reordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.npy");
        let c = Array3::from_shape_fn((3, 3, 3), |(x, y, z)| (9 * x + 3 * y + z) as f64);
        let mut f = Array3::<f64>::zeros((3, 3, 3).f());
        f.assign(&c);
        write_npy(&path, &f).unwrap();
        let grid = load_grid(&path, 1.0).unwrap();
        assert_eq!(grid.get(1, 2, 0), 15.0);
        assert_eq!(grid.get(0, 0, 2), 2.0);
    }

    #[test]
    fn non_cubic_array_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.npy");
        write_npy(&path, &Array3::<f64>::zeros((2, 3, 4))).unwrap();
        let result = load_grid(&path, 1.0);
        assert!(matches!(result, Err(GridError::InvalidParameter(_))));
    }

    #[test]
    fn missing_file_is_persistence_error() {
        let result = load_grid(Path::new("/nonexistent/grid.npy"), 1.0);
        assert!(matches!(result, Err(GridError::Persistence(_))));
    }

    #[test]
    fn grid_and_metadata_load_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_grid_4_7.npy");
        save_grid(&ramp(4), &path).unwrap();
        save_metadata(&metadata(4), &sidecar_path(&path)).unwrap();
        let (grid, meta) = load_grid_with_metadata(&path).unwrap();
        assert_eq!(meta, metadata(4));
        assert_eq!(grid.box_size(), 10.0);
    }

    #[test]
    fn sidecar_size_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.npy");
        save_grid(&ramp(4), &path).unwrap();
        save_metadata(&metadata(8), &sidecar_path(&path)).unwrap();
        let result = load_grid_with_metadata(&path);
        assert!(matches!(
            result,
            Err(GridError::DimensionMismatch { expected: 8, got: 4 })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn metadata_write_to_full_device_fails() {
        let result = save_metadata(&metadata(4), Path::new("/dev/full"));
        assert!(
            matches!(result, Err(GridError::Persistence(_))),
            "short write must be reported, got {result:?}"
        );
    }
}
