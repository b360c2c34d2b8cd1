//! Agreement statistics over paired samples.

/// Paired samples of one quantity; `a` is the reference side.
#[derive(Debug, Clone, Default)]
pub struct Samples {
    a: Vec<f64>,
    b: Vec<f64>,
}

/// Summary statistics of one sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agreement {
    pub nrmse: f64,
    pub mae: f64,
    pub max_abs_error: f64,
    pub r_squared: f64,
    pub samples: usize,
}

impl Samples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, a: f64, b: f64) {
        if a.is_finite() && b.is_finite() {
            self.a.push(a);
            self.b.push(b);
        }
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// `None` when no samples were collected.
    ///
    /// NRMSE is normalised by the range of both sides pooled, so it does not
    /// depend on which side is the reference; a zero pooled range means both
    /// sides hold the same constant. R² is taken against `a`; a flat
    /// reference yields 1 for an exact match and 0 otherwise.
    pub fn agreement(&self) -> Option<Agreement> {
        if self.is_empty() {
            return None;
        }
        let n = self.len() as f64;

        let mut sq = 0.0;
        let mut abs = 0.0;
        let mut max_abs: f64 = 0.0;
        for (a, b) in self.a.iter().zip(&self.b) {
            let d = a - b;
            sq += d * d;
            abs += d.abs();
            max_abs = max_abs.max(d.abs());
        }
        let rmse = (sq / n).sqrt();

        let pooled = self.a.iter().chain(&self.b);
        let (lo, hi) = pooled.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
        let range = hi - lo;
        let nrmse = if range > 0.0 { rmse / range } else { 0.0 };

        let mean_a = self.a.iter().sum::<f64>() / n;
        let ss_tot: f64 = self.a.iter().map(|a| (a - mean_a).powi(2)).sum();
        let r_squared = if ss_tot > 0.0 {
            1.0 - sq / ss_tot
        } else if sq == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(Agreement {
            nrmse,
            mae: abs / n,
            max_abs_error: max_abs,
            r_squared,
            samples: self.len(),
        })
    }
}
