/// One complete copy of the trainable parameters of a factorization model.
///
/// Factor matrices are stored row-major in flat buffers, row `u` of `P` lives
/// at `p[u * n_factors..(u + 1) * n_factors]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorBuffers {
    n_factors: usize,
    pub(crate) p: Box<[f32]>,
    pub(crate) q: Box<[f32]>,
    pub(crate) user_bias: Box<[f32]>,
    pub(crate) item_bias: Box<[f32]>,
}

impl FactorBuffers {
    /// Creates a new `FactorBuffers` from already generated parameters.
    ///
    /// # Arguments
    /// * `n_factors` - The length of every factor row.
    /// * `p` - The user factors, `n_rows * n_factors` values.
    /// * `q` - The item factors, `n_cols * n_factors` values.
    /// * `user_bias` - One bias per user.
    /// * `item_bias` - One bias per item.
    ///
    /// # Panics
    /// If the factor matrices don't hold one row per bias.
    pub fn new(
        n_factors: usize,
        p: Vec<f32>,
        q: Vec<f32>,
        user_bias: Vec<f32>,
        item_bias: Vec<f32>,
    ) -> Self {
        assert_eq!(p.len(), user_bias.len() * n_factors);
        assert_eq!(q.len(), item_bias.len() * n_factors);

        Self {
            n_factors,
            p: p.into_boxed_slice(),
            q: q.into_boxed_slice(),
            user_bias: user_bias.into_boxed_slice(),
            item_bias: item_bias.into_boxed_slice(),
        }
    }

    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    pub fn n_rows(&self) -> usize {
        self.user_bias.len()
    }

    pub fn n_cols(&self) -> usize {
        self.item_bias.len()
    }

    /// The factor row of user `u`.
    #[inline]
    pub fn user_factors(&self, u: usize) -> &[f32] {
        &self.p[u * self.n_factors..(u + 1) * self.n_factors]
    }

    /// The factor row of item `i`.
    #[inline]
    pub fn item_factors(&self, i: usize) -> &[f32] {
        &self.q[i * self.n_factors..(i + 1) * self.n_factors]
    }

    pub fn p(&self) -> &[f32] {
        &self.p
    }

    pub fn q(&self) -> &[f32] {
        &self.q
    }

    pub fn user_bias(&self) -> &[f32] {
        &self.user_bias
    }

    pub fn item_bias(&self) -> &[f32] {
        &self.item_bias
    }

    /// Overwrites every buffer with the contents of `other`.
    ///
    /// # Panics
    /// If both buffers don't share the same shape.
    pub fn copy_from(&mut self, other: &FactorBuffers) {
        self.p.copy_from_slice(&other.p);
        self.q.copy_from_slice(&other.q);
        self.user_bias.copy_from_slice(&other.user_bias);
        self.item_bias.copy_from_slice(&other.item_bias);
    }
}
