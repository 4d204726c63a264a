use serde::{Deserialize, Serialize};

/// Online mean and standard deviation (Welford's algorithm).
pub struct Accumulator {
    count: usize,
    mean: f64,
    sq_diff_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            sq_diff_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.count += 1;

        let diff_pre = val - self.mean;
        self.mean += diff_pre / self.count as f64;

        let diff_post = val - self.mean;
        self.sq_diff_sum += diff_pre * diff_post;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.count > 1 {
                (self.sq_diff_sum / (self.count as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Stored time series with equilibration-aware summary statistics.
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self { vals: Vec::new() }
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    /// Summary statistics of the equilibrated tail of the series.
    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = equilibration_index(&self.vals);
        let tail = &self.vals[i_equil..];
        TimeSeriesReport {
            mean: mean(tail),
            std_dev: variance(tail).sqrt(),
            sem: blocking_sem(tail),
            is_equil: i_equil != self.vals.len() / 2,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn variance(vals: &[f64]) -> f64 {
    let count = vals.len();
    if count < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (count - 1) as f64
}

/// Standard error of the mean via the Flyvbjerg-Petersen blocking method.
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut blocked = vals.to_vec();
    let mut sem2_ests = Vec::new();
    let mut sem2_errs = Vec::new();

    while blocked.len() >= 2 {
        let count = blocked.len();
        let sem2_est = variance(&blocked) / count as f64;
        sem2_ests.push(sem2_est);
        sem2_errs.push(sem2_est * (2.0 / (count as f64 - 1.0)).sqrt());

        blocked = blocked
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
    }

    // Take the first estimate compatible with every coarser blocking level.
    for (idx, &sem2_est) in sem2_ests.iter().enumerate() {
        let max_low = sem2_ests[idx..]
            .iter()
            .zip(&sem2_errs[idx..])
            .map(|(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);

        if sem2_est > max_low {
            return sem2_est.sqrt();
        }
    }

    sem2_ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Truncation point that minimizes the marginal standard error (MSER).
fn equilibration_index(vals: &[f64]) -> usize {
    let count = vals.len();
    if count == 0 {
        return 0;
    }
    let mut opt_i_equil = count / 2;
    let mut min_mse = f64::INFINITY;

    let n_idxs = count.ilog2() + 1;
    for idx in 0..n_idxs {
        let i_equil = count / 2usize.pow(n_idxs - idx);
        let tail = &vals[i_equil..];

        let mse = variance(tail) * (tail.len() - 1) as f64 / tail.len().pow(2) as f64;
        if mse < min_mse {
            min_mse = mse;
            opt_i_equil = i_equil;
        }
    }

    opt_i_equil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_matches_direct_mean_and_std_dev() {
        let mut acc = Accumulator::new();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn accumulator_std_dev_needs_two_values() {
        let mut acc = Accumulator::new();
        acc.add(1.0);
        assert!(acc.report().std_dev.is_nan());
    }

    #[test]
    fn empty_series_reports_nan_without_panicking() {
        let report = TimeSeries::new().report();
        assert!(report.mean.is_nan());
        assert!(report.std_dev.is_nan());
        assert!(report.sem.is_nan());
        assert!(!report.is_equil);
    }

    #[test]
    fn constant_series_has_zero_error() {
        let mut series = TimeSeries::new();
        for _ in 0..64 {
            series.push(3.0);
        }
        let report = series.report();
        assert_eq!(report.mean, 3.0);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.sem, 0.0);
    }
}
