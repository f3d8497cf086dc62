//! Rolling-window statistics shared by the indicators.

use std::collections::VecDeque;

/// Arithmetic mean. Zero when there are no samples.
#[must_use]
pub fn mean<'a, I>(samples: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
    I::IntoIter: ExactSizeIterator,
{
    let samples = samples.into_iter();
    let n = samples.len();
    if n == 0 {
        return 0.0;
    }
    samples.sum::<f64>() / n as f64
}

/// Population standard deviation around `mean`.
#[must_use]
pub fn standard_deviation<'a, I>(samples: I, mean: f64) -> f64
where
    I: IntoIterator<Item = &'a f64>,
    I::IntoIter: ExactSizeIterator,
{
    let samples = samples.into_iter();
    let n = samples.len();
    if n == 0 {
        return 0.0;
    }
    let variance = samples
        .map(|s| {
            let d = s - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    variance.sqrt()
}

/// Mean plus and minus two standard deviations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub lower: f64,
    pub mean: f64,
    pub upper: f64,
}

impl BollingerBands {
    pub const WIDTH: f64 = 2.0;

    #[must_use]
    pub fn new(mean: f64, standard_deviation: f64) -> Self {
        let offset = standard_deviation * Self::WIDTH;
        Self {
            lower: mean - offset,
            mean,
            upper: mean + offset,
        }
    }

    /// `None` when there are no samples.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let m = mean(samples);
        Some(Self::new(m, standard_deviation(samples, m)))
    }
}

/// Bounded FIFO of the most recent samples.
///
/// Statistics cover the samples actually held, so a window that is still
/// filling up is not dragged toward zero.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    /// Capacity is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning the evicted oldest one when full.
    pub fn push(&mut self, sample: f64) -> Option<f64> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn newest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    #[must_use]
    pub fn oldest(&self) -> Option<f64> {
        self.samples.front().copied()
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        mean(&self.samples)
    }

    #[must_use]
    pub fn standard_deviation(&self) -> f64 {
        standard_deviation(&self.samples, self.mean())
    }

    #[must_use]
    pub fn bands(&self) -> Option<BollingerBands> {
        if self.samples.is_empty() {
            return None;
        }
        Some(BollingerBands::new(self.mean(), self.standard_deviation()))
    }

    /// Mean of the newest `count` samples, clamped to what the window holds.
    #[must_use]
    pub fn recent_mean(&self, count: usize) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let count = count.clamp(1, self.samples.len());
        self.samples.iter().rev().take(count).sum::<f64>() / count as f64
    }

    /// `mean / oldest`, or zero when not finite.
    #[must_use]
    pub fn average_to_oldest_ratio(&self) -> f64 {
        finite_or_zero(self.mean() / self.oldest().unwrap_or(0.0))
    }

    /// `newest / oldest`, or zero when not finite.
    #[must_use]
    pub fn newest_to_oldest_ratio(&self) -> f64 {
        finite_or_zero(self.newest().unwrap_or(0.0) / self.oldest().unwrap_or(0.0))
    }

    /// `newest / mean`, or zero when not finite.
    #[must_use]
    pub fn newest_to_average_ratio(&self) -> f64 {
        finite_or_zero(self.newest().unwrap_or(0.0) / self.mean())
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

/// Least-squares line over the most recent `(x, y)` points.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    points: VecDeque<(f64, f64)>,
    capacity: usize,
    slope: f64,
    intercept: f64,
}

impl LinearRegression {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            slope: 0.0,
            intercept: 0.0,
        }
    }

    pub fn push(&mut self, x: f64, y: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((x, y));
        self.refit();
    }

    // Centred form keeps precision when x is a large millisecond offset.
    fn refit(&mut self) {
        let n = self.points.len() as f64;
        let x_mean = self.points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let y_mean = self.points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (x, y) in &self.points {
            let dx = x - x_mean;
            sxy += dx * (y - y_mean);
            sxx += dx * dx;
        }

        self.slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        self.intercept = y_mean - self.slope * x_mean;
    }

    #[must_use]
    pub const fn slope(&self) -> f64 {
        self.slope
    }

    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    #[must_use]
    pub fn newest_y(&self) -> Option<f64> {
        self.points.back().map(|(_, y)| *y)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_bollinger_bands_textbook_sample() {
        let bands = BollingerBands::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((bands.mean - 5.0).abs() < EPS);
        assert!((bands.lower - 1.0).abs() < EPS);
        assert!((bands.upper - 9.0).abs() < EPS);
    }

    #[test]
    fn test_window_stats_match_slice_stats_after_wrap() {
        let mut window = SampleWindow::new(8);
        for s in [100.0, 100.0, 2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(s);
        }
        assert!(window.is_full());
        assert_eq!(window.oldest(), Some(2.0));
        assert!((window.mean() - 5.0).abs() < EPS);
        assert!((window.standard_deviation() - 2.0).abs() < EPS);

        let slice = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(window.mean(), mean(&slice));
        assert_eq!(window.standard_deviation(), standard_deviation(&slice, mean(&slice)));
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = SampleWindow::new(2);
        assert_eq!(window.push(1.0), None);
        assert_eq!(window.push(2.0), None);
        assert_eq!(window.push(3.0), Some(1.0));
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_window_recent_mean() {
        let mut window = SampleWindow::new(8);
        for s in 1..=8 {
            window.push(f64::from(s));
        }
        assert!((window.recent_mean(2) - 7.5).abs() < EPS);
        assert!((window.recent_mean(100) - 4.5).abs() < EPS);
    }

    #[test]
    fn test_ratios_fall_back_to_zero() {
        let mut window = SampleWindow::new(4);
        window.push(0.0);
        window.push(2.0);
        assert_eq!(window.newest_to_oldest_ratio(), 0.0);
        assert_eq!(window.average_to_oldest_ratio(), 0.0);
        assert!((window.newest_to_average_ratio() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_regression_fits_line() {
        let mut regression = LinearRegression::new(10);
        for x in 0..5 {
            let x = f64::from(x);
            regression.push(x, 3.0 * x + 1.0);
        }
        assert!((regression.slope() - 3.0).abs() < 1e-9);
        assert!((regression.intercept() - 1.0).abs() < 1e-9);
        assert_eq!(regression.newest_y(), Some(13.0));
    }

    #[test]
    fn test_regression_degenerate_x_has_zero_slope() {
        let mut regression = LinearRegression::new(10);
        regression.push(5.0, 1.0);
        regression.push(5.0, 9.0);
        assert_eq!(regression.slope(), 0.0);
    }
}
