// Summary statistics over feature trajectories
//
// Every family reduces frame-wise values to mean / std / max / min. Empty
// inputs reduce to 0.0 so a family never produces NaN keys. The standard
// deviation is the population value.

/// Mean / population std / max / min of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
}

impl Summary {
    /// Summarize any iterator of values
    pub fn of<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<f64>,
    {
        let values: Vec<f64> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Self::default();
        }
        Self {
            mean: mean(&values),
            std: std_dev(&values),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }

    /// `max - min`
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Arithmetic mean, 0.0 when empty
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0), 0.0 when empty
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// First differences `x[i+1] - x[i]`
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Summary of row `row` of a frames × bins matrix
pub fn column_summary(frames: &[Vec<f32>], row: usize) -> Summary {
    Summary::of(frames.iter().filter_map(|frame| frame.get(row).copied()))
}

/// Summary of every entry of a frames × bins matrix
pub fn matrix_summary(frames: &[Vec<f32>]) -> Summary {
    Summary::of(frames.iter().flat_map(|frame| frame.iter().copied()))
}
