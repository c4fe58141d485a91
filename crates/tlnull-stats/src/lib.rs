//! Regression and summary statistics for Taylor's Law comparisons.
//!
//! Everything here works on plain `&[f64]` slices: empirical means and
//! variances of a study, or one replicate of null variances drawn for it.
//! Fits are ordinary least squares on the log-log scale, with two-sided
//! Student t tests on the coefficients (via `statrs`).

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

/// Significance level used for every "is this fit significant" decision.
pub const ALPHA: f64 = 0.05;

/// Lower and upper percentiles of the null interval.
pub const LOWER_PERCENTILE: f64 = 2.5;
pub const UPPER_PERCENTILE: f64 = 97.5;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("degenerate input: {0}")]
    Degenerate(&'static str),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Summary statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Arithmetic mean. `NaN` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance with the `n - 1` divisor. `NaN` for fewer than two values.
pub fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Percentile `p` in `[0, 100]`, linearly interpolated between closest ranks.
///
/// `NaN` for an empty slice. Values of `p` outside the range are clamped.
pub fn percentile(xs: &[f64], p: f64) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

pub fn median(xs: &[f64]) -> f64 {
    percentile(xs, 50.0)
}

/// How many null standard deviations `observed` lies from the null mean.
pub fn z_score(observed: f64, null: &[f64]) -> f64 {
    (observed - mean(null)) / sample_variance(null).sqrt()
}

/// Mean, median and 95% interval of one null variance sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NullSummary {
    pub mean: f64,
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
}

pub fn summarize_null(variances: &[f64]) -> NullSummary {
    NullSummary {
        mean: mean(variances),
        median: median(variances),
        lower: percentile(variances, LOWER_PERCENTILE),
        upper: percentile(variances, UPPER_PERCENTILE),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Regression
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordinary least squares fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation.
    pub r: f64,
    /// Two-sided p-value for a zero slope.
    pub p_value: f64,
    /// Standard error of the slope.
    pub std_err: f64,
}

impl LinearFit {
    pub fn r_squared(&self) -> f64 {
        self.r * self.r
    }

    pub fn is_significant(&self) -> bool {
        self.p_value < ALPHA
    }
}

/// Two-sided tail probability of a Student t statistic.
fn two_sided_p(t: f64, df: f64) -> Result<f64, StatsError> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|_| StatsError::Degenerate("invalid degrees of freedom"))?;
    Ok(2.0 * dist.sf(t.abs()))
}

/// Simple linear regression with a t test on the slope (`n - 2` df).
pub fn linregress(x: &[f64], y: &[f64]) -> Result<LinearFit, StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::Degenerate("x and y differ in length"));
    }
    let n = x.len();
    if n < 2 {
        return Err(StatsError::TooFewPoints { needed: 2, got: n });
    }

    let xm = mean(x);
    let ym = mean(y);
    let mut ssxm = 0.0;
    let mut ssym = 0.0;
    let mut ssxym = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        ssxm += (xi - xm) * (xi - xm);
        ssym += (yi - ym) * (yi - ym);
        ssxym += (xi - xm) * (yi - ym);
    }
    if ssxm == 0.0 {
        return Err(StatsError::Degenerate("all x values are identical"));
    }

    let r = if ssym == 0.0 {
        0.0
    } else {
        (ssxym / (ssxm * ssym).sqrt()).clamp(-1.0, 1.0)
    };
    let slope = ssxym / ssxm;
    let intercept = ym - slope * xm;

    // Two points always lie on a line.
    if n == 2 {
        let p_value = if ssym == 0.0 { 1.0 } else { 0.0 };
        return Ok(LinearFit {
            slope,
            intercept,
            r,
            p_value,
            std_err: 0.0,
        });
    }

    const TINY: f64 = 1.0e-20;
    let df = (n - 2) as f64;
    let t = r * (df / ((1.0 - r) * (1.0 + r) + TINY)).sqrt();
    let p_value = two_sided_p(t, df)?;
    let std_err = ((1.0 - r * r) * ssym / ssxm / df).sqrt();

    Ok(LinearFit {
        slope,
        intercept,
        r,
        p_value,
        std_err,
    })
}

/// Log-transformed `(mean, var)` pairs, dropping pairs with a non-positive
/// (or undefined) value.
fn log_pairs(means: &[f64], vars: &[f64]) -> (Vec<f64>, Vec<f64>) {
    means
        .iter()
        .zip(vars)
        .filter(|&(&m, &v)| m > 0.0 && v > 0.0)
        .map(|(&m, &v)| (m.ln(), v.ln()))
        .unzip()
}

/// Taylor's Law fit `ln var = intercept + b ln mean`.
///
/// Pairs whose variance is zero are dropped first: the log is undefined.
pub fn fit_taylor(means: &[f64], vars: &[f64]) -> Result<LinearFit, StatsError> {
    if means.len() != vars.len() {
        return Err(StatsError::Degenerate("means and variances differ in length"));
    }
    let (x, y) = log_pairs(means, vars);
    linregress(&x, &y)
}

/// p-value of `c` in `ln var = a + b ln mean + c (ln mean)^2` (`n - 3` df).
pub fn quadratic_term_p(means: &[f64], vars: &[f64]) -> Result<f64, StatsError> {
    if means.len() != vars.len() {
        return Err(StatsError::Degenerate("means and variances differ in length"));
    }
    let (x, y) = log_pairs(means, vars);
    let n = x.len();
    if n < 4 {
        return Err(StatsError::TooFewPoints { needed: 4, got: n });
    }

    // Normal equations X'X beta = X'y with columns [1, x, x^2].
    let mut xtx = [[0.0f64; 3]; 3];
    let mut xty = [0.0f64; 3];
    for (&xi, &yi) in x.iter().zip(&y) {
        let row = [1.0, xi, xi * xi];
        for i in 0..3 {
            xty[i] += row[i] * yi;
            for j in 0..3 {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    let inv = invert_3x3(&xtx).ok_or(StatsError::Degenerate("singular design matrix"))?;
    let beta: Vec<f64> = (0..3)
        .map(|i| (0..3).map(|j| inv[i][j] * xty[j]).sum())
        .collect();

    let rss: f64 = x
        .iter()
        .zip(&y)
        .map(|(&xi, &yi)| {
            let fitted = beta[0] + beta[1] * xi + beta[2] * xi * xi;
            (yi - fitted) * (yi - fitted)
        })
        .sum();
    let df = (n - 3) as f64;
    let se = (rss / df * inv[2][2]).sqrt();
    let t = beta[2] / se;
    if t.is_nan() {
        return Err(StatsError::Degenerate("quadratic coefficient is undefined"));
    }
    two_sided_p(t, df)
}

/// Inverse by cofactors. `None` when the matrix is numerically singular.
fn invert_3x3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
    };
    let c00 = cof(1, 2, 1, 2);
    let c01 = -cof(1, 2, 0, 2);
    let c02 = cof(1, 2, 0, 1);
    let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
    let scale = m[0][0] * m[1][1] * m[2][2];
    if !det.is_finite() || det.abs() <= 1e-12 * scale.abs().max(f64::MIN_POSITIVE) {
        return None;
    }

    let c10 = -cof(0, 2, 1, 2);
    let c11 = cof(0, 2, 0, 2);
    let c12 = -cof(0, 2, 0, 1);
    let c20 = cof(0, 1, 1, 2);
    let c21 = -cof(0, 1, 0, 2);
    let c22 = cof(0, 1, 0, 1);

    // Adjugate is the transposed cofactor matrix.
    Some([
        [c00 / det, c10 / det, c20 / det],
        [c01 / det, c11 / det, c21 / det],
        [c02 / det, c12 / det, c22 / det],
    ])
}

// ═══════════════════════════════════════════════════════════════════════════════
// Empirical vs null comparison
// ═══════════════════════════════════════════════════════════════════════════════

/// Empirical TL fit set against the fits of every null replicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TlComparison {
    pub empirical: LinearFit,
    /// Replicates that produced a fit.
    pub fitted_replicates: usize,
    /// Replicates left with too few non-zero variances to fit.
    pub failed_replicates: usize,
    pub mean_slope: f64,
    pub mean_intercept: f64,
    pub mean_r_squared: f64,
    /// Share of fitted replicates with a significant slope at [`ALPHA`].
    pub fraction_significant: f64,
    pub slope_z: f64,
    pub slope_lower: f64,
    pub slope_upper: f64,
    pub intercept_z: f64,
    pub intercept_lower: f64,
    pub intercept_upper: f64,
}

/// Compare a study's empirical TL with the TL of each null replicate.
///
/// `replicates[i][j]` is the variance of combo `j` in replicate `i`. Zero
/// variances are dropped per replicate before fitting.
pub fn compare_to_null(
    means: &[f64],
    emp_vars: &[f64],
    replicates: &[Vec<f64>],
) -> Result<TlComparison, StatsError> {
    let empirical = fit_taylor(means, emp_vars)?;

    let mut slopes = Vec::with_capacity(replicates.len());
    let mut intercepts = Vec::with_capacity(replicates.len());
    let mut r_squared = Vec::with_capacity(replicates.len());
    let mut significant = 0usize;
    let mut failed = 0usize;
    for replicate in replicates {
        if replicate.len() != means.len() {
            return Err(StatsError::Degenerate("replicate length differs from combo count"));
        }
        match fit_taylor(means, replicate) {
            Ok(fit) => {
                slopes.push(fit.slope);
                intercepts.push(fit.intercept);
                r_squared.push(fit.r_squared());
                if fit.is_significant() {
                    significant += 1;
                }
            }
            Err(_) => failed += 1,
        }
    }
    if slopes.is_empty() {
        return Err(StatsError::Degenerate("no replicate could be fitted"));
    }

    Ok(TlComparison {
        empirical,
        fitted_replicates: slopes.len(),
        failed_replicates: failed,
        mean_slope: mean(&slopes),
        mean_intercept: mean(&intercepts),
        mean_r_squared: mean(&r_squared),
        fraction_significant: significant as f64 / slopes.len() as f64,
        slope_z: z_score(empirical.slope, &slopes),
        slope_lower: percentile(&slopes, LOWER_PERCENTILE),
        slope_upper: percentile(&slopes, UPPER_PERCENTILE),
        intercept_z: z_score(empirical.intercept, &intercepts),
        intercept_lower: percentile(&intercepts, LOWER_PERCENTILE),
        intercept_upper: percentile(&intercepts, UPPER_PERCENTILE),
    })
}

/// Curvature of the empirical log-log relation set against the null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticComparison {
    /// `None` when the empirical data cannot support a quadratic fit.
    pub empirical_p: Option<f64>,
    pub fitted_replicates: usize,
    pub failed_replicates: usize,
    /// Share of fitted replicates with a significant quadratic term.
    pub fraction_significant: f64,
    pub median_p: f64,
    pub p_lower: f64,
    pub p_upper: f64,
}

impl QuadraticComparison {
    pub fn empirical_is_significant(&self) -> bool {
        self.empirical_p.is_some_and(|p| p < ALPHA)
    }
}

/// [`quadratic_term_p`] for the empirical variances and for every replicate.
///
/// Zero variances are dropped per replicate, so replicates may be fitted on
/// fewer combos than the empirical data.
pub fn compare_quadratic(
    means: &[f64],
    emp_vars: &[f64],
    replicates: &[Vec<f64>],
) -> Result<QuadraticComparison, StatsError> {
    let empirical_p = quadratic_term_p(means, emp_vars).ok();

    let mut ps = Vec::with_capacity(replicates.len());
    let mut failed = 0usize;
    for replicate in replicates {
        if replicate.len() != means.len() {
            return Err(StatsError::Degenerate("replicate length differs from combo count"));
        }
        match quadratic_term_p(means, replicate) {
            Ok(p) => ps.push(p),
            Err(_) => failed += 1,
        }
    }
    if ps.is_empty() {
        return Err(StatsError::Degenerate("no replicate could be fitted"));
    }

    let significant = ps.iter().filter(|&&p| p < ALPHA).count();
    Ok(QuadraticComparison {
        empirical_p,
        fitted_replicates: ps.len(),
        failed_replicates: failed,
        fraction_significant: significant as f64 / ps.len() as f64,
        median_p: median(&ps),
        p_lower: percentile(&ps, LOWER_PERCENTILE),
        p_upper: percentile(&ps, UPPER_PERCENTILE),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Inclusion criteria
// ═══════════════════════════════════════════════════════════════════════════════

/// Thresholds a study must meet to enter the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionCriteria {
    /// Minimal Q for a combo to count as valid.
    pub q_min: u64,
    /// Minimal N for a combo to count as valid.
    pub n_min: u64,
    /// Minimal number of valid combos in a study.
    pub min_combos: usize,
    /// Also require a significant empirical TL over all combos.
    pub require_significance: bool,
}

impl Default for InclusionCriteria {
    fn default() -> Self {
        Self {
            q_min: 5,
            n_min: 3,
            min_combos: 5,
            require_significance: false,
        }
    }
}

/// Whether a study with these combos enters the analysis.
///
/// A combo is valid when `Q >= q_min` and `N >= n_min`. The significance
/// test, when required, uses every combo of the study.
pub fn passes_inclusion(
    qs: &[u64],
    ns: &[u64],
    means: &[f64],
    vars: &[f64],
    criteria: &InclusionCriteria,
) -> bool {
    let valid = qs
        .iter()
        .zip(ns)
        .filter(|&(&q, &n)| q >= criteria.q_min && n >= criteria.n_min)
        .count();
    if valid < criteria.min_combos {
        return false;
    }
    !criteria.require_significance
        || fit_taylor(means, vars).is_ok_and(|fit| fit.is_significant())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
