use super::FactorBuffers;

/// The parameters of a finished factorization model.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    params: FactorBuffers,
    global_bias: f32,
}

impl TrainedModel {
    pub fn new(params: FactorBuffers, global_bias: f32) -> Self {
        Self {
            params,
            global_bias,
        }
    }

    pub fn n_factors(&self) -> usize {
        self.params.n_factors()
    }

    pub fn n_rows(&self) -> usize {
        self.params.n_rows()
    }

    pub fn n_cols(&self) -> usize {
        self.params.n_cols()
    }

    /// The user factor matrix, row-major.
    pub fn p(&self) -> &[f32] {
        self.params.p()
    }

    /// The item factor matrix, row-major.
    pub fn q(&self) -> &[f32] {
        self.params.q()
    }

    pub fn user_bias(&self) -> &[f32] {
        self.params.user_bias()
    }

    pub fn item_bias(&self) -> &[f32] {
        self.params.item_bias()
    }

    pub fn global_bias(&self) -> f32 {
        self.global_bias
    }

    pub fn params(&self) -> &FactorBuffers {
        &self.params
    }

    pub fn into_params(self) -> FactorBuffers {
        self.params
    }

    /// Predicts the affinity of user `u` for item `i`.
    ///
    /// # Panics
    /// If `u` or `i` are out of range.
    pub fn predict(&self, u: usize, i: usize) -> f32 {
        let dot: f32 = self
            .params
            .user_factors(u)
            .iter()
            .zip(self.params.item_factors(i))
            .map(|(p, q)| p * q)
            .sum();

        self.global_bias + self.params.user_bias()[u] + self.params.item_bias()[i] + dot
    }

    /// Ranks every item for user `u` and returns the best `n` as `(item, score)`.
    ///
    /// # Arguments
    /// * `u` - The user.
    /// * `n` - The maximum amount of items to return.
    /// * `exclude` - Items to leave out, usually the ones the user already interacted with.
    pub fn recommend(&self, u: usize, n: usize, exclude: &[usize]) -> Vec<(usize, f32)> {
        let mut scores: Vec<_> = (0..self.n_cols())
            .filter(|i| !exclude.contains(i))
            .map(|i| (i, self.predict(u, i)))
            .collect();

        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(n);
        scores
    }
}
