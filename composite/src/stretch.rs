//! Band normalization and Lupton asinh RGB composition.
//!
//! Normalization is outlier-robust: values are clipped to the band's
//! 1st..99th percentile range before rescaling, so a handful of hot
//! pixels or cosmic rays cannot flatten the whole image. Composition
//! follows the asinh mapping of Lupton et al. (2004): faint pixels map
//! near-linearly while bright regions are compressed logarithmically.

use log::error;
use ndarray::{Array2, Array3};

/// Percentile bounds used by [`safe_normalize`].
const CLIP_LOW_PCT: f64 = 1.0;
const CLIP_HIGH_PCT: f64 = 99.0;

/// Fraction of full scale anchoring the asinh slope (Lupton et al.).
const SLOPE_FRAC: f64 = 0.1;

/// Below this, Q is numerically indistinguishable from the linear limit.
const Q_LINEAR: f64 = 1e-6;

/// Value at percentile `pct` with linear interpolation between ranks.
///
/// `values` must be non-empty; order does not matter.
pub fn percentile(values: &[f32], pct: f64) -> f32 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Normalize one band to [0, 1] with percentile clipping.
///
/// Non-finite input values are treated as 0 before the percentiles are
/// taken. A constant band (p1 == p99) has no usable dynamic range and
/// renders black rather than dividing by zero.
///
/// # Arguments
/// * `band` - 2-D pixel array for one color channel
///
/// # Returns
/// Array of the same shape with all values in [0.0, 1.0]
///
/// # Examples
/// ```rust
/// use composite::stretch::safe_normalize;
/// use ndarray::array;
///
/// let band = array![[0.0_f32, 5.0], [10.0, f32::NAN]];
/// let normalized = safe_normalize(&band);
/// assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
///
/// // A flat band cannot be stretched and comes back black.
/// let flat = array![[3.0_f32, 3.0], [3.0, 3.0]];
/// assert!(safe_normalize(&flat).iter().all(|&v| v == 0.0));
/// ```
pub fn safe_normalize(band: &Array2<f32>) -> Array2<f32> {
    let cleaned = band.mapv(|v| if v.is_finite() { v } else { 0.0 });
    if cleaned.is_empty() {
        return cleaned;
    }

    let values: Vec<f32> = cleaned.iter().copied().collect();
    let p_low = percentile(&values, CLIP_LOW_PCT);
    let p_high = percentile(&values, CLIP_HIGH_PCT);
    let range = p_high - p_low;
    if range <= f32::EPSILON {
        return Array2::zeros(band.raw_dim());
    }

    cleaned.mapv(|v| (v.clamp(p_low, p_high) - p_low) / range)
}

/// Asinh intensity mapping of Lupton et al. (2004).
///
/// `stretch` is the softening scale (raising it brightens faint
/// features); `Q` is the nonlinearity factor (raising it compresses
/// bright regions harder). As Q approaches 0 the mapping degenerates to
/// a linear map of slope `1/stretch`.
struct AsinhStretch {
    soften: f64,
    slope: f64,
    stretch: f64,
    linear: bool,
}

impl AsinhStretch {
    fn new(stretch: f64, q: f64) -> Self {
        if q.abs() < Q_LINEAR {
            Self {
                soften: 0.0,
                slope: 0.0,
                stretch,
                linear: true,
            }
        } else {
            Self {
                soften: q / stretch,
                slope: SLOPE_FRAC / (SLOPE_FRAC * q).asinh(),
                stretch,
                linear: false,
            }
        }
    }

    /// Scale factor applied to all three channels at mean intensity `x`.
    fn factor(&self, x: f64) -> f64 {
        if x <= 0.0 {
            0.0
        } else if self.linear {
            1.0 / self.stretch
        } else {
            (self.soften * x).asinh() * self.slope / x
        }
    }
}

/// Combine three bands into an RGB array with a Lupton asinh stretch.
///
/// Each band is [`safe_normalize`]d independently, scaled by the asinh
/// factor of the per-pixel mean intensity, and clamped to [0, 1]; where a
/// channel would exceed full scale, all three are rescaled together so
/// hue survives clipping.
///
/// Returns `None` when any band is missing or the shapes disagree; the
/// caller treats that as "cannot render". A non-positive `stretch` is a
/// degenerate softening scale and yields a defined all-black image.
///
/// # Arguments
/// * `r`, `g`, `b` - the three channel bands, if they loaded
/// * `stretch` - softening scale; raising it brightens faint features
/// * `q` - nonlinearity factor; raising it compresses bright regions
///
/// # Examples
/// ```rust
/// use composite::stretch::compose;
/// use ndarray::Array2;
///
/// let band = Array2::from_shape_fn((4, 4), |(y, x)| (y * 4 + x) as f32);
/// let rgb = compose(Some(&band), Some(&band), Some(&band), 0.5, 10.0).unwrap();
/// assert_eq!(rgb.dim(), (4, 4, 3));
///
/// // A missing band means there is nothing to render.
/// assert!(compose(None, Some(&band), Some(&band), 0.5, 10.0).is_none());
/// ```
pub fn compose(
    r: Option<&Array2<f32>>,
    g: Option<&Array2<f32>>,
    b: Option<&Array2<f32>>,
    stretch: f64,
    q: f64,
) -> Option<Array3<f32>> {
    let (r, g, b) = (r?, g?, b?);
    if r.dim() != g.dim() || g.dim() != b.dim() {
        error!(
            "band shapes disagree: {:?} vs {:?} vs {:?}",
            r.dim(),
            g.dim(),
            b.dim()
        );
        return None;
    }

    let (height, width) = r.dim();
    let mut rgb = Array3::<f32>::zeros((height, width, 3));
    if stretch <= 0.0 {
        return Some(rgb);
    }

    let rn = safe_normalize(r);
    let gn = safe_normalize(g);
    let bn = safe_normalize(b);
    let mapping = AsinhStretch::new(stretch, q);

    for y in 0..height {
        for x in 0..width {
            let rv = rn[[y, x]] as f64;
            let gv = gn[[y, x]] as f64;
            let bv = bn[[y, x]] as f64;
            let fac = mapping.factor((rv + gv + bv) / 3.0);

            let mut channels = [rv * fac, gv * fac, bv * fac];
            let peak = channels[0].max(channels[1]).max(channels[2]);
            if peak > 1.0 {
                for c in &mut channels {
                    *c /= peak;
                }
            }
            for (c, &v) in channels.iter().enumerate() {
                rgb[[y, x, c]] = v.clamp(0.0, 1.0) as f32;
            }
        }
    }

    Some(rgb)
}
