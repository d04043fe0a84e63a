//! The fixture run: for each seed, generate a realization, measure its
//! spectrum, persist both and record the result; then average, validate and
//! plot.
//!
//! Seeds run sequentially in configured order. Files written for earlier
//! seeds stay on disk when a later seed fails; the failing seed's own files
//! are removed. The plot is best effort and never fails a run.

use std::fs;
use std::path::{Path, PathBuf};

use gauss_grid_core::{
    average, GaussianFieldGenerator, Grid, GridError, MeasuredSpectrum, PowerSpectrum, RunConfig,
    SpectrumEstimator, ValidationReport,
};
use gauss_grid_models::SpectrumKind;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::grid_file::{save_grid, save_metadata, GridMetadata};
use crate::spectrum_file::save_spectrum;

/// Tolerance of the ensemble validation report, in units of the expected
/// per-shell scatter.
pub const VALIDATION_SIGMA: f64 = 5.0;

/// Name of the comparison plot inside the output directory.
pub const PLOT_FILE: &str = "pk_comparison.png";

/// Summary statistics of one realization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridStats {
    pub mean: f64,
    pub variance: f64,
    pub max_abs: f64,
}

impl GridStats {
    pub fn of(grid: &Grid) -> Self {
        Self {
            mean: grid.mean(),
            variance: grid.variance(),
            max_abs: grid.max_abs(),
        }
    }
}

/// Outcome of one successful seed.
#[derive(Debug, Clone, Serialize)]
pub struct SeedRecord {
    pub seed: u64,
    pub grid_path: PathBuf,
    pub metadata_path: PathBuf,
    pub spectrum_path: PathBuf,
    pub stats: GridStats,
    pub spectrum: MeasuredSpectrum,
}

/// A seed skipped under `keep_going`.
#[derive(Debug, Clone, Serialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub error: String,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub records: Vec<SeedRecord>,
    pub failures: Vec<SeedFailure>,
    /// Seed-averaged spectrum checked against the input model.
    pub validation: Option<ValidationReport>,
    pub plot_path: Option<PathBuf>,
    /// Why the requested plot was not written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_error: Option<String>,
}

impl RunReport {
    /// `(seed, spectrum)` pairs in run order.
    pub fn spectra(&self) -> Vec<(u64, &MeasuredSpectrum)> {
        self.records.iter().map(|r| (r.seed, &r.spectrum)).collect()
    }
}

/// A configured run, with model, generator and estimator built up front.
pub struct Pipeline {
    config: RunConfig,
    model: SpectrumKind,
    generator: GaussianFieldGenerator,
    estimator: SpectrumEstimator,
}

impl Pipeline {
    /// Validates `config` and resolves its spectrum model.
    pub fn new(config: RunConfig) -> Result<Self, GridError> {
        config.validate()?;
        let model = SpectrumKind::from_name(&config.spectrum, config.redshift, &config.spectrum_params)?;
        let generator = GaussianFieldGenerator::new(config.box_size, config.grid_size)?
            .with_options(config.options);
        let estimator = SpectrumEstimator::new(config.binning()?)?;
        Ok(Self {
            config,
            model,
            generator,
            estimator,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn model(&self) -> &SpectrumKind {
        &self.model
    }

    fn output_path(&self, seed: u64, suffix: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}{seed}{suffix}", self.config.file_prefix()))
    }

    /// Generates, measures and persists one realization.
    ///
    /// On a write failure every file of this seed is removed again before
    /// the error is returned.
    pub fn run_seed(&self, seed: u64) -> Result<SeedRecord, GridError> {
        let grid = self.generator.generate(&self.model, seed)?;
        let stats = GridStats::of(&grid);
        debug!(seed, mean = stats.mean, variance = stats.variance, "generated grid");

        let spectrum = self.estimator.measure(&grid)?;
        debug!(seed, shells = spectrum.len(), "measured spectrum");

        let grid_path = self.output_path(seed, ".npy");
        let metadata_path = self.output_path(seed, ".json");
        let spectrum_path = self.output_path(seed, "_pk.json");
        let meta = GridMetadata {
            box_size: self.config.box_size,
            grid_size: self.config.grid_size,
            seed,
            redshift: self.config.redshift,
            spectrum: self.model.name().to_owned(),
            spectrum_params: self.model.params(),
            options: self.config.options,
        };
        let persisted = save_grid(&grid, &grid_path)
            .and_then(|()| save_metadata(&meta, &metadata_path))
            .and_then(|()| save_spectrum(&spectrum, &spectrum_path));
        if let Err(e) = persisted {
            for path in [&grid_path, &metadata_path, &spectrum_path] {
                discard(path);
            }
            return Err(e);
        }

        Ok(SeedRecord {
            seed,
            grid_path,
            metadata_path,
            spectrum_path,
            stats,
            spectrum,
        })
    }

    /// Runs every configured seed, then validates and plots.
    ///
    /// The first failing seed aborts the run unless `keep_going` is set, in
    /// which case it is recorded in [`RunReport::failures`].
    #[instrument(skip(self), fields(
        spectrum = %self.config.spectrum,
        n = self.config.grid_size,
        box_size = self.config.box_size,
    ))]
    pub fn run(&self) -> Result<RunReport, GridError> {
        fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            GridError::Persistence(format!(
                "cannot create {}: {e}",
                self.config.output_dir.display()
            ))
        })?;

        let mut records = Vec::with_capacity(self.config.seeds.len());
        let mut failures = Vec::new();
        for &seed in &self.config.seeds {
            info!(seed, "generating realization");
            match self.run_seed(seed) {
                Ok(record) => {
                    info!(seed, path = %record.grid_path.display(), "saved grid");
                    records.push(record);
                }
                Err(e) if self.config.keep_going => {
                    warn!(seed, error = %e, "seed failed, continuing");
                    failures.push(SeedFailure {
                        seed,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let mut report = RunReport {
            records,
            failures,
            validation: None,
            plot_path: None,
            plot_error: None,
        };
        if report.records.is_empty() {
            warn!("no realization succeeded");
            return Ok(report);
        }

        let spectra: Vec<MeasuredSpectrum> =
            report.records.iter().map(|r| r.spectrum.clone()).collect();
        let validation = average(&spectra)?.validate_against(&self.model, VALIDATION_SIGMA);
        match validation.worst() {
            Some(worst) => info!(
                shells = validation.bins.len(),
                outside = validation.failures().count(),
                worst_k = worst.k,
                worst_deviation = worst.deviation,
                "validated mean spectrum"
            ),
            None => info!("mean spectrum has no shells to validate"),
        }
        report.validation = Some(validation);

        if self.config.plot {
            match self.write_plot(&report) {
                Ok(path) => report.plot_path = path,
                Err(e) => {
                    warn!(error = %e, "comparison plot not written");
                    report.plot_error = Some(e.to_string());
                }
            }
        }
        Ok(report)
    }

    #[cfg(feature = "png")]
    fn write_plot(&self, report: &RunReport) -> Result<Option<PathBuf>, GridError> {
        let path = self.config.output_dir.join(PLOT_FILE);
        crate::plot::write_comparison(&self.model, &report.spectra(), &path)?;
        info!(path = %path.display(), "wrote comparison plot");
        Ok(Some(path))
    }

    #[cfg(not(feature = "png"))]
    fn write_plot(&self, _report: &RunReport) -> Result<Option<PathBuf>, GridError> {
        warn!("built without the png feature, skipping comparison plot");
        Ok(None)
    }
}

/// Removes a partially written output file. Directories are left alone.
fn discard(path: &Path) {
    if !path.is_file() {
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "cannot remove partial output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_config(dir: &std::path::Path) -> RunConfig {
        let mut c = RunConfig::new(dir.join("out"));
        c.box_size = 100.0;
        c.grid_size = 8;
        c.seeds = vec![1, 2];
        c.spectrum = "constant".into();
        c.spectrum_params = json!({"value": 50.0});
        c.plot = false;
        c
    }

    #[test]
    fn new_rejects_unknown_spectrum() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.spectrum = "nonexistent".into();
        assert!(matches!(
            Pipeline::new(c),
            Err(GridError::UnknownSpectrum(_))
        ));
    }

    #[test]
    fn run_writes_seed_qualified_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = Pipeline::new(small_config(dir.path())).unwrap().run().unwrap();
        assert_eq!(report.records.len(), 2);
        assert!(report.failures.is_empty());
        let out = dir.path().join("out");
        for seed in [1, 2] {
            assert!(out.join(format!("test_grid_8_{seed}.npy")).is_file());
            assert!(out.join(format!("test_grid_8_{seed}.json")).is_file());
            assert!(out.join(format!("test_grid_8_{seed}_pk.json")).is_file());
        }
        assert!(report.plot_path.is_none());
        assert!(report.validation.is_some());
    }

    #[test]
    fn records_follow_seed_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.seeds = vec![9, 3, 5];
        let report = Pipeline::new(c).unwrap().run().unwrap();
        let seeds: Vec<u64> = report.records.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![9, 3, 5]);
    }

    #[test]
    fn persisted_grid_matches_direct_generation() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(small_config(dir.path())).unwrap();
        let record = pipeline.run_seed(2).unwrap();
        let (grid, meta) = crate::grid_file::load_grid_with_metadata(&record.grid_path).unwrap();
        let direct = GaussianFieldGenerator::new(100.0, 8)
            .unwrap()
            .generate(pipeline.model(), 2)
            .unwrap();
        assert_eq!(meta.seed, 2);
        assert_eq!(meta.spectrum, "constant");
        assert!(grid
            .data()
            .iter()
            .zip(direct.data())
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn failed_seed_aborts_without_keep_going() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        // A file where the output directory should be makes every write fail.
        std::fs::write(dir.path().join("blocker"), b"x").unwrap();
        c.output_dir = dir.path().join("blocker");
        assert!(matches!(
            Pipeline::new(c).unwrap().run(),
            Err(GridError::Persistence(_))
        ));
    }

    #[test]
    fn keep_going_records_failure_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.seeds = vec![1, 2, 3];
        c.keep_going = true;
        // A directory squatting on seed 2's grid path.
        std::fs::create_dir_all(dir.path().join("out/test_grid_8_2.npy")).unwrap();
        let report = Pipeline::new(c).unwrap().run().unwrap();
        let seeds: Vec<u64> = report.records.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![1, 3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].seed, 2);
        assert!(report.failures[0].error.contains("test_grid_8_2.npy"));
    }

    #[test]
    fn failed_seed_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.seeds = vec![1, 2, 3];
        c.keep_going = true;
        // The grid of seed 2 can be written, its sidecar cannot.
        std::fs::create_dir_all(dir.path().join("out/test_grid_8_2.json")).unwrap();
        let report = Pipeline::new(c).unwrap().run().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].seed, 2);
        let out = dir.path().join("out");
        assert!(!out.join("test_grid_8_2.npy").exists());
        assert!(!out.join("test_grid_8_2_pk.json").exists());
        assert!(out.join("test_grid_8_2.json").is_dir());
        for seed in [1, 3] {
            assert!(out.join(format!("test_grid_8_{seed}.npy")).is_file());
            assert!(out.join(format!("test_grid_8_{seed}_pk.json")).is_file());
        }
    }

    #[test]
    fn aborted_run_removes_failing_seed_grid() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.seeds = vec![5];
        std::fs::create_dir_all(dir.path().join("out/test_grid_8_5_pk.json")).unwrap();
        let result = Pipeline::new(c).unwrap().run();
        assert!(matches!(result, Err(GridError::Persistence(_))));
        let out = dir.path().join("out");
        assert!(!out.join("test_grid_8_5.npy").exists());
        assert!(!out.join("test_grid_8_5.json").exists());
    }

    #[test]
    fn prefix_override_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.prefix = Some("white_".into());
        c.seeds = vec![4];
        Pipeline::new(c).unwrap().run().unwrap();
        assert!(dir.path().join("out/white_4.npy").is_file());
    }

    #[cfg(feature = "png")]
    #[test]
    fn plot_is_written_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        c.plot = true;
        let report = Pipeline::new(c).unwrap().run().unwrap();
        let path = report.plot_path.unwrap();
        assert!(path.ends_with(PLOT_FILE));
        assert!(path.is_file());
        assert!(report.plot_error.is_none());
    }

    #[cfg(feature = "png")]
    #[test]
    fn unplottable_run_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = small_config(dir.path());
        // Zero power leaves nothing positive to place on log axes.
        c.spectrum_params = json!({"value": 0.0});
        c.plot = true;
        let report = Pipeline::new(c).unwrap().run().unwrap();
        assert_eq!(report.records.len(), 2);
        assert!(report.plot_path.is_none());
        assert!(report.plot_error.is_some());
        assert!(report.validation.is_some());
        let out = dir.path().join("out");
        assert!(out.join("test_grid_8_1.npy").is_file());
        assert!(!out.join(PLOT_FILE).exists());
    }
}
