//! Pure-computation log–log line plot into an RGBA8 buffer, with title,
//! axis captions, decade tick labels and a legend.
//!
//! Always available (no feature gate); [`crate::plot`] only encodes the
//! buffer as PNG.

use gauss_grid_core::{GridError, MeasuredSpectrum, PowerSpectrum};

use crate::font::{glyph, text_width, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

/// Distinct line colors for measured spectra, cycled per seed.
const SEED_COLORS: &[[u8; 3]] = &[
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
];

const MODEL_COLOR: [u8; 3] = [0, 0, 0];
const BACKGROUND: [u8; 3] = [255, 255, 255];
const GRID_LINE: [u8; 3] = [225, 225, 225];
const FRAME: [u8; 3] = [90, 90, 90];
const TEXT: [u8; 3] = [40, 40, 40];
const MARGIN: usize = 48;

/// The input model is drawn over `10^-2 ..= 10^1` h/Mpc whatever the grid.
const MODEL_LOG10_K: (f64, f64) = (-2.0, 1.0);
const MODEL_SAMPLES: usize = 100;

/// Pixel scale of the title, x caption and legend text.
const LARGE_TEXT: usize = 2;
const LEGEND_ROW: i64 = (GLYPH_HEIGHT * LARGE_TEXT + 4) as i64;
const SWATCH: i64 = 16;

/// One curve on the plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend text; an empty label leaves the series out of the legend.
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color: [u8; 3],
    /// Draw a small square at each sample.
    pub markers: bool,
}

/// Title and axis captions. Empty strings are not drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
    pub title: String,
    pub x: String,
    pub y: String,
}

impl Labels {
    pub fn comparison() -> Self {
        Self {
            title: "Input power spectra and grid measurements".into(),
            x: "k [h Mpc^-1]".into(),
            y: "P(k) [h^-3 Mpc^3]".into(),
        }
    }
}

/// Builds the input-vs-measured series: the model as a smooth black curve,
/// then one marked line per seed.
pub fn comparison_series(
    model: &dyn PowerSpectrum,
    spectra: &[(u64, &MeasuredSpectrum)],
) -> Vec<Series> {
    let (lo, hi) = MODEL_LOG10_K;
    let step = (hi - lo) / (MODEL_SAMPLES - 1) as f64;
    let points = (0..MODEL_SAMPLES)
        .map(|i| {
            let k = 10f64.powf(lo + i as f64 * step);
            (k, model.power(k))
        })
        .collect();
    let mut series = Vec::with_capacity(spectra.len() + 1);
    series.push(Series {
        label: "Input power spectrum".into(),
        points,
        color: MODEL_COLOR,
        markers: false,
    });
    for (i, (seed, spectrum)) in spectra.iter().enumerate() {
        series.push(Series {
            label: format!("Grid {seed}"),
            points: spectrum.pairs().collect(),
            color: SEED_COLORS[i % SEED_COLORS.len()],
            markers: true,
        });
    }
    series
}

struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Raster {
    fn new(width: usize, height: usize) -> Self {
        let mut pixels = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            pixels.extend_from_slice(&[BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn put(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let i = (y as usize * self.width + x as usize) * 4;
        self.pixels[i..i + 3].copy_from_slice(&color);
    }

    /// Bresenham line, clipped per pixel.
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.put(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn square(&mut self, (x, y): (i64, i64), color: [u8; 3]) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                self.put(x + dx, y + dy, color);
            }
        }
    }

    fn fill(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.put(x, y, color);
            }
        }
    }

    fn frame(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
        self.line((x0, y0), (x1, y0), color);
        self.line((x1, y0), (x1, y1), color);
        self.line((x1, y1), (x0, y1), color);
        self.line((x0, y1), (x0, y0), color);
    }

    /// Draws `text` with its top-left corner at `(x, y)`.
    fn text(&mut self, (x, y): (i64, i64), text: &str, scale: usize, color: [u8; 3]) {
        let s = scale as i64;
        for (i, c) in text.chars().enumerate() {
            let left = x + (i * ADVANCE * scale) as i64;
            for (row, &bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits >> (GLYPH_WIDTH - 1 - col) & 1 == 1 {
                        let px = left + col as i64 * s;
                        let py = y + row as i64 * s;
                        self.fill((px, py), (px + s - 1, py + s - 1), color);
                    }
                }
            }
        }
    }
}

/// Tick caption for `10^decade`.
fn decade_label(decade: i64) -> String {
    format!("10^{decade}")
}

/// Decade-aligned `log10` bounds of the positive samples on one axis.
fn decade_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(f64::log10)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return None;
    }
    let lo = lo.floor();
    let hi = hi.ceil().max(lo + 1.0);
    Some((lo, hi))
}

/// Renders `series` on shared log–log axes as `width * height * 4` RGBA
/// bytes. Non-positive samples are skipped and break the line. The legend
/// sits in the top-right corner of the plot area, over the curves.
pub fn render_loglog(
    series: &[Series],
    labels: &Labels,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, GridError> {
    if width <= 2 * MARGIN || height <= 2 * MARGIN {
        return Err(GridError::invalid(format!(
            "plot size {width}x{height} leaves no room inside the {MARGIN} px margin"
        )));
    }
    let all = || series.iter().flat_map(|s| s.points.iter().copied());
    let (Some((xlo, xhi)), Some((ylo, yhi))) =
        (decade_bounds(all().map(|p| p.0)), decade_bounds(all().map(|p| p.1)))
    else {
        return Err(GridError::invalid("nothing positive to plot on log axes"));
    };

    let inner_w = (width - 2 * MARGIN - 1) as f64;
    let inner_h = (height - 2 * MARGIN - 1) as f64;
    let to_pixel = |(x, y): (f64, f64)| -> Option<(i64, i64)> {
        if !(x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()) {
            return None;
        }
        let u = (x.log10() - xlo) / (xhi - xlo);
        let v = (y.log10() - ylo) / (yhi - ylo);
        Some((
            (MARGIN as f64 + u * inner_w).round() as i64,
            ((height - MARGIN - 1) as f64 - v * inner_h).round() as i64,
        ))
    };

    let mut raster = Raster::new(width, height);
    let (left, right) = (MARGIN as i64, (width - MARGIN - 1) as i64);
    let (top, bottom) = (MARGIN as i64, (height - MARGIN - 1) as i64);

    let small_height = GLYPH_HEIGHT as i64;
    for decade in (xlo as i64)..=(xhi as i64) {
        if let Some((px, _)) = to_pixel((10f64.powi(decade as i32), 10f64.powf(ylo))) {
            raster.line((px, top), (px, bottom), GRID_LINE);
            let caption = decade_label(decade);
            let half = (text_width(&caption, 1) / 2) as i64;
            raster.text((px - half, bottom + 4), &caption, 1, TEXT);
        }
    }
    for decade in (ylo as i64)..=(yhi as i64) {
        if let Some((_, py)) = to_pixel((10f64.powf(xlo), 10f64.powi(decade as i32))) {
            raster.line((left, py), (right, py), GRID_LINE);
            let caption = decade_label(decade);
            let w = text_width(&caption, 1) as i64;
            raster.text((left - 4 - w, py - small_height / 2), &caption, 1, TEXT);
        }
    }
    raster.frame((left, top), (right, bottom), FRAME);

    for s in series {
        let mut prev = None;
        for &point in &s.points {
            let pixel = to_pixel(point);
            if let (Some(a), Some(b)) = (prev, pixel) {
                raster.line(a, b, s.color);
            }
            if let (Some(p), true) = (pixel, s.markers) {
                raster.square(p, s.color);
            }
            prev = pixel;
        }
    }

    let large_height = (GLYPH_HEIGHT * LARGE_TEXT) as i64;
    let centred = |text: &str| (width as i64 - text_width(text, LARGE_TEXT) as i64) / 2;
    raster.text((centred(&labels.title), 6), &labels.title, LARGE_TEXT, TEXT);
    raster.text(
        (centred(&labels.x), height as i64 - large_height - 4),
        &labels.x,
        LARGE_TEXT,
        TEXT,
    );
    raster.text((left, top - small_height - 4), &labels.y, 1, TEXT);

    draw_legend(&mut raster, series, (right, top));
    Ok(raster.pixels)
}

/// Boxed legend hanging from the top-right corner `(right, top)`.
fn draw_legend(raster: &mut Raster, series: &[Series], (right, top): (i64, i64)) {
    let entries: Vec<&Series> = series.iter().filter(|s| !s.label.is_empty()).collect();
    let Some(text_w) = entries
        .iter()
        .map(|s| text_width(&s.label, LARGE_TEXT) as i64)
        .max()
    else {
        return;
    };
    let pad = 6;
    let box_w = pad + SWATCH + 4 + text_w + pad;
    let box_h = pad + entries.len() as i64 * LEGEND_ROW - 4 + pad;
    let (x0, y0) = (right - 4 - box_w, top + 4);
    raster.fill((x0, y0), (x0 + box_w, y0 + box_h), BACKGROUND);
    raster.frame((x0, y0), (x0 + box_w, y0 + box_h), FRAME);
    for (i, s) in entries.iter().enumerate() {
        let row_top = y0 + pad + i as i64 * LEGEND_ROW;
        let mid = row_top + (GLYPH_HEIGHT * LARGE_TEXT / 2) as i64;
        raster.fill((x0 + pad, mid - 1), (x0 + pad + SWATCH, mid), s.color);
        if s.markers {
            raster.square((x0 + pad + SWATCH / 2, mid), s.color);
        }
        raster.text((x0 + pad + SWATCH + 4, row_top), &s.label, LARGE_TEXT, TEXT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauss_grid_core::{generate, measure, ConstantPower};

    fn pixel(buf: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
        let i = (y * width + x) * 4;
        [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]
    }

    fn diagonal() -> Series {
        Series {
            label: "diag".into(),
            points: vec![(1.0, 1.0), (10.0, 10.0), (100.0, 100.0)],
            color: [255, 0, 0],
            markers: false,
        }
    }

    fn count(buf: &[u8], width: usize, color: [u8; 3], keep: impl Fn(usize, usize) -> bool) -> usize {
        buf.chunks_exact(4)
            .enumerate()
            .filter(|(i, px)| px[..3] == color && keep(i % width, i / width))
            .count()
    }

    #[test]
    fn buffer_has_rgba_length_and_opaque_alpha() {
        let buf = render_loglog(&[diagonal()], &Labels::comparison(), 200, 120).unwrap();
        assert_eq!(buf.len(), 200 * 120 * 4);
        assert!(buf.iter().skip(3).step_by(4).all(|&a| a == 255));
    }

    #[test]
    fn curve_runs_from_lower_left_corner_through_centre() {
        let (w, h) = (200, 160);
        let buf = render_loglog(&[diagonal()], &Labels::default(), w, h).unwrap();
        // Bounds are exactly the data decades, so (10, 10) lands mid-plot.
        let inner_w = (w - 2 * MARGIN - 1) as f64;
        let inner_h = (h - 2 * MARGIN - 1) as f64;
        let cx = (MARGIN as f64 + 0.5 * inner_w).round() as usize;
        let cy = ((h - MARGIN - 1) as f64 - 0.5 * inner_h).round() as usize;
        assert_eq!(pixel(&buf, w, MARGIN, h - MARGIN - 1), [255, 0, 0, 255]);
        assert_eq!(pixel(&buf, w, cx, cy), [255, 0, 0, 255]);
        assert_eq!(pixel(&buf, w, 2, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn legend_shows_labelled_series_only() {
        let (w, h) = (300, 200);
        let green = [0, 200, 0];
        // Data confined to the lower-left of the plot area.
        let small = Series {
            label: "Grid 7".into(),
            points: vec![(1.0, 1.0), (2.0, 2.0)],
            color: green,
            markers: false,
        };
        let upper_right = |x: usize, y: usize| x > w / 2 && y < h / 2;

        let buf = render_loglog(&[small.clone()], &Labels::default(), w, h).unwrap();
        assert!(count(&buf, w, green, upper_right) > 0);
        assert!(count(&buf, w, TEXT, upper_right) > 0);

        let unlabelled = Series {
            label: String::new(),
            ..small
        };
        let buf = render_loglog(&[unlabelled], &Labels::default(), w, h).unwrap();
        assert_eq!(count(&buf, w, green, upper_right), 0);
        assert_eq!(count(&buf, w, TEXT, upper_right), 0);
    }

    #[test]
    fn title_and_captions_are_drawn_in_the_margins() {
        let (w, h) = (400, 300);
        let bare = render_loglog(&[diagonal()], &Labels::default(), w, h).unwrap();
        let labelled = render_loglog(&[diagonal()], &Labels::comparison(), w, h).unwrap();
        let top_strip = |_: usize, y: usize| y < 20;
        let bottom_strip = |_: usize, y: usize| y >= h - 20;
        assert_eq!(count(&bare, w, TEXT, top_strip), 0);
        assert!(count(&labelled, w, TEXT, top_strip) > 0);
        assert_eq!(count(&bare, w, TEXT, bottom_strip), 0);
        assert!(count(&labelled, w, TEXT, bottom_strip) > 0);
    }

    #[test]
    fn non_positive_samples_are_skipped() {
        let s = Series {
            points: vec![(1.0, 1.0), (2.0, 0.0), (10.0, -3.0), (100.0, 10.0)],
            ..diagonal()
        };
        assert!(render_loglog(&[s], &Labels::default(), 200, 120).is_ok());
    }

    #[test]
    fn empty_or_tiny_plots_are_errors() {
        let empty = Series {
            points: vec![(0.0, 1.0)],
            ..diagonal()
        };
        assert!(render_loglog(&[empty], &Labels::default(), 200, 120).is_err());
        assert!(render_loglog(&[diagonal()], &Labels::default(), 60, 60).is_err());
    }

    #[test]
    fn comparison_has_model_then_one_series_per_seed() {
        let l = 100.0;
        let dk = 2.0 * std::f64::consts::PI / l;
        let model = ConstantPower::new(20.0);
        let a = measure(&generate(&model, l, 8, 1).unwrap(), l, dk, 0.5 * dk).unwrap();
        let b = measure(&generate(&model, l, 8, 2).unwrap(), l, dk, 0.5 * dk).unwrap();
        let series = comparison_series(&model, &[(1, &a), (2, &b)]);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].label, "Input power spectrum");
        assert!(!series[0].markers);
        assert_eq!(series[0].points.len(), MODEL_SAMPLES);
        assert_eq!(series[1].label, "Grid 1");
        assert_ne!(series[1].color, series[2].color);
        assert_eq!(series[2].points.len(), b.len());
    }

    #[test]
    fn model_is_sampled_over_fixed_range() {
        let model = ConstantPower::new(3.0);
        // No measured spectra at all: the model curve still spans 0.01..10.
        let series = comparison_series(&model, &[]);
        assert_eq!(series.len(), 1);
        let points = &series[0].points;
        assert!((points[0].0 - 0.01).abs() < 1e-15);
        assert!((points[MODEL_SAMPLES - 1].0 / 10.0 - 1.0).abs() < 1e-12);
        assert!(points.windows(2).all(|p| p[1].0 > p[0].0));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_positive_series_renders(
                points in proptest::collection::vec((1e-4..1e4_f64, 1e-4..1e6_f64), 1..40),
                width in 100_usize..300,
                height in 100_usize..300,
            ) {
                let s = Series { label: "p".into(), points, color: [1, 2, 3], markers: true };
                let buf = render_loglog(&[s], &Labels::comparison(), width, height).unwrap();
                prop_assert_eq!(buf.len(), width * height * 4);
            }
        }
    }
}
