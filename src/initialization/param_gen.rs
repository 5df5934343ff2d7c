/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// An option whether the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Drains the generator into a single buffer.
    ///
    /// # Returns
    /// Every remaining parameter, empty if the generator was already exhausted.
    fn sample_all(&mut self) -> Vec<f32> {
        let mut params = Vec::new();

        while let Some(sample) = self.sample(usize::MAX) {
            params.extend(sample);
        }

        params
    }
}

/// Reserves up to `n` parameters out of a generator's `remaining` quota.
///
/// # Returns
/// The amount of parameters to generate, `None` once the quota is spent.
pub(super) fn take_quota(remaining: &mut usize, n: usize) -> Option<usize> {
    if *remaining == 0 {
        return None;
    }

    let n = n.min(*remaining);
    *remaining -= n;
    Some(n)
}
