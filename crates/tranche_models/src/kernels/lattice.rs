//! Loss lattice for conditionally independent names.
//!
//! Losses are counted in units of `granularity` (a fraction of the pool).
//! A name's loss amount is split between the two neighbouring units so that
//! its expected contribution is preserved exactly.

/// Probability distribution over loss units.
#[derive(Debug, Clone)]
pub(crate) struct LossLattice {
    granularity: f64,
    probs: Vec<f64>,
    top: usize,
}

impl LossLattice {
    /// Lattice able to hold a pool loss of 1 plus one rounding unit per name.
    pub fn new(granularity: f64, n_names: usize) -> Self {
        let size = (1.0 / granularity).ceil() as usize + n_names + 2;
        let mut probs = vec![0.0; size];
        probs[0] = 1.0;
        Self {
            granularity,
            probs,
            top: 0,
        }
    }

    /// Resets to the zero-loss state.
    pub fn reset(&mut self) {
        self.probs[..=self.top].iter_mut().for_each(|p| *p = 0.0);
        self.probs[0] = 1.0;
        self.top = 0;
    }

    /// Outcomes for an amount with the given probability, split onto the
    /// neighbouring units.
    pub fn split(&self, amount: f64, prob: f64, out: &mut Vec<(usize, f64)>) {
        if prob <= 0.0 || amount <= 0.0 {
            return;
        }
        let units = amount / self.granularity;
        let lower = units.floor();
        let frac = units - lower;
        let lower = lower as usize;
        if frac > 0.0 {
            out.push((lower + 1, prob * frac));
        }
        if lower > 0 && frac < 1.0 {
            out.push((lower, prob * (1.0 - frac)));
        }
    }

    /// Convolves one name given its positive-unit outcomes; the remaining
    /// probability stays on the current state.
    pub fn add_name(&mut self, outcomes: &[(usize, f64)]) {
        if outcomes.is_empty() {
            return;
        }
        let moved: f64 = outcomes.iter().map(|(_, p)| p).sum();
        let stay = 1.0 - moved;
        let reach = outcomes.iter().map(|(u, _)| *u).max().unwrap_or(0);
        let new_top = (self.top + reach).min(self.probs.len() - 1);
        for m in (0..=new_top).rev() {
            let mut value = if m <= self.top { self.probs[m] * stay } else { 0.0 };
            for &(u, p) in outcomes {
                if u <= m && m - u <= self.top {
                    value += p * self.probs[m - u];
                }
            }
            self.probs[m] = value;
        }
        self.top = new_top;
    }

    /// `E[min(L, ℓ)]` for each level.
    pub fn expected_capped(&self, levels: &[f64], out: &mut [f64]) {
        for (o, &level) in out.iter_mut().zip(levels) {
            *o = self.probs[..=self.top]
                .iter()
                .enumerate()
                .map(|(m, p)| p * (m as f64 * self.granularity).min(level))
                .sum();
        }
    }

    /// `P(L ≤ ℓ)` for each level.
    pub fn cumulative(&self, levels: &[f64], out: &mut [f64]) {
        for (o, &level) in out.iter_mut().zip(levels) {
            *o = self.probs[..=self.top]
                .iter()
                .enumerate()
                .take_while(|(m, _)| *m as f64 * self.granularity <= level + 1e-12)
                .map(|(_, p)| p)
                .sum::<f64>()
                .min(1.0);
        }
    }
}
