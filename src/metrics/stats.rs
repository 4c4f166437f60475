use super::Trend;

/// Relative change between the two halves that counts as a direction.
pub const TREND_CHANGE_RATIO: f64 = 0.2;

/// A simple time series for summary statistics.
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    pub fn min(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn trend(&self) -> Trend {
        trend(&self.values)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compare the mean of the first half against the second half.
///
/// With an odd length the middle value belongs to the second half. Fewer than
/// two values never claim a direction. A zero first half reads as
/// `Increasing` as soon as the second half is nonzero.
pub fn trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }

    let (first, second) = values.split_at(values.len() / 2);
    let first_avg = mean(first);
    let second_avg = mean(second);

    if first_avg == 0.0 {
        return if second_avg == 0.0 {
            Trend::Stable
        } else {
            Trend::Increasing
        };
    }

    let change = (second_avg - first_avg) / first_avg;
    if change > TREND_CHANGE_RATIO {
        Trend::Increasing
    } else if change < -TREND_CHANGE_RATIO {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}
