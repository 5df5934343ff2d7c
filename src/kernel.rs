use rayon::prelude::*;

use crate::{
    config::KernelParams,
    matrix::SparseInteractionMatrix,
    state::{FactorBuffers, ModelState},
};

/// The amount of squared errors summed sequentially before partial sums are combined.
///
/// Partial sums are always combined in the same order, which keeps the loss of an
/// epoch independent from the amount of threads.
const LOSS_CHUNK: usize = 4096;

/// The per-interaction unit of work of an epoch.
///
/// An epoch runs in two parallel phases separated by an implicit barrier:
/// 1. Every interaction computes its prediction error from the read buffer.
/// 2. Every user row and every item row computes its new value from the read
///    buffer and the errors of its interactions, and stores it in the write buffer.
///
/// Each slot of the write buffer has exactly one writer and the read buffer is
/// never written during an epoch, so no locks or atomics are needed. When several
/// interactions of one epoch update the same row, the row receives the mean of the
/// values each of them proposes.
pub struct UpdateKernel<'a> {
    matrix: &'a SparseInteractionMatrix,
    params: &'a KernelParams,
    global_bias: f32,
}

impl<'a> UpdateKernel<'a> {
    /// Creates a new `UpdateKernel`.
    ///
    /// # Arguments
    /// * `matrix` - The interactions to dispatch the kernel on.
    /// * `params` - The session's kernel constants.
    /// * `global_bias` - The fixed offset of every prediction.
    ///
    /// # Returns
    /// A new `UpdateKernel` instance.
    pub fn new(
        matrix: &'a SparseInteractionMatrix,
        params: &'a KernelParams,
        global_bias: f32,
    ) -> Self {
        Self {
            matrix,
            params,
            global_bias,
        }
    }

    /// Predicts the affinity of user `u` for item `i` using the given buffer.
    #[inline]
    pub fn predict(&self, read: &FactorBuffers, u: usize, i: usize) -> f32 {
        let dot: f32 = read
            .user_factors(u)
            .iter()
            .zip(read.item_factors(i))
            .map(|(p, q)| p * q)
            .sum();

        self.global_bias + read.user_bias()[u] + read.item_bias()[i] + dot
    }

    /// Runs a full epoch over `state`, leaving the errors of every interaction in `errors`.
    ///
    /// On training epochs the write buffer receives the updated parameters, on evaluation
    /// epochs it receives an exact copy of the read buffer. Either way the caller is
    /// expected to swap the buffers afterwards.
    ///
    /// # Arguments
    /// * `state` - The double buffered parameters.
    /// * `errors` - One slot per stored interaction.
    ///
    /// # Panics
    /// If `errors` doesn't have one slot per interaction.
    pub fn run_epoch(&self, state: &mut ModelState, errors: &mut [f32]) {
        let (read, write) = state.split();
        self.compute_errors(read, errors);

        if self.params.is_train {
            self.apply_gradients(read, write, errors);
        } else {
            write.copy_from(read);
        }
    }

    /// Writes `target - prediction` for every stored interaction.
    ///
    /// # Panics
    /// If `errors` doesn't have one slot per interaction.
    pub fn compute_errors(&self, read: &FactorBuffers, errors: &mut [f32]) {
        assert_eq!(errors.len(), self.matrix.nnz());

        errors.par_iter_mut().enumerate().for_each(|(e, err)| {
            let u = self.matrix.entry_row(e);
            let i = self.matrix.entry_col(e);
            *err = self.matrix.target(e) - self.predict(read, u, i);
        });
    }

    /// Applies the gradient step of every interaction to the write buffer.
    ///
    /// User rows and item rows are disjoint parts of `write`, both sides run concurrently.
    pub fn apply_gradients(&self, read: &FactorBuffers, write: &mut FactorBuffers, errors: &[f32]) {
        let FactorBuffers {
            p,
            q,
            user_bias,
            item_bias,
            ..
        } = write;

        rayon::join(
            || self.apply_users(read, p, user_bias, errors),
            || self.apply_items(read, q, item_bias, errors),
        );
    }

    fn apply_users(&self, read: &FactorBuffers, p: &mut [f32], bias: &mut [f32], errors: &[f32]) {
        let KernelParams {
            n_factors,
            p_reg,
            user_bias_reg,
            ..
        } = *self.params;

        p.par_chunks_mut(n_factors)
            .zip(bias.par_iter_mut())
            .enumerate()
            .for_each(|(u, (p_row, b))| {
                let entries = self.matrix.row_range(u);
                let others = entries.clone().map(|e| (self.matrix.entry_col(e), e));

                self.apply_row(
                    read.user_factors(u),
                    read.user_bias()[u],
                    others.map(|(i, e)| (read.item_factors(i), errors[e])),
                    entries.len(),
                    (p_reg, user_bias_reg),
                    p_row,
                    b,
                );
            });
    }

    fn apply_items(&self, read: &FactorBuffers, q: &mut [f32], bias: &mut [f32], errors: &[f32]) {
        let KernelParams {
            n_factors,
            q_reg,
            item_bias_reg,
            ..
        } = *self.params;

        q.par_chunks_mut(n_factors)
            .zip(bias.par_iter_mut())
            .enumerate()
            .for_each(|(i, (q_row, b))| {
                let entries = self.matrix.col_entries(i);
                let others = entries.iter().map(|&e| (self.matrix.entry_row(e), e));

                self.apply_row(
                    read.item_factors(i),
                    read.item_bias()[i],
                    others.map(|(u, e)| (read.user_factors(u), errors[e])),
                    entries.len(),
                    (q_reg, item_bias_reg),
                    q_row,
                    b,
                );
            });
    }

    /// Computes the next value of one factor row and its bias.
    ///
    /// With `x` the row, `y` the factors of the other side of an interaction and `err`
    /// its error, a single interaction proposes:
    /// `x + lr * (err * y - reg * x)` and `b + lr * (err - bias_reg * b)`.
    /// The written value is the mean of every proposal, rows without interactions
    /// keep their value.
    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn apply_row<'r, I>(
        &self,
        row: &[f32],
        bias: f32,
        interactions: I,
        count: usize,
        (reg, bias_reg): (f32, f32),
        out_row: &mut [f32],
        out_bias: &mut f32,
    ) where
        I: Iterator<Item = (&'r [f32], f32)>,
    {
        if count == 0 {
            out_row.copy_from_slice(row);
            *out_bias = bias;
            return;
        }

        let lr = self.params.learning_rate;
        let count = count as f32;

        out_row.fill(0.);
        let mut err_sum = 0.;

        for (other, err) in interactions {
            out_row
                .iter_mut()
                .zip(other)
                .for_each(|(acc, y)| *acc += err * y);
            err_sum += err;
        }

        out_row.iter_mut().zip(row).for_each(|(out, &x)| {
            *out = x + lr * (*out / count - reg * x);
        });

        *out_bias = bias + lr * (err_sum / count - bias_reg * bias);
    }
}

/// Reduces the errors of an epoch into their mean square.
///
/// # Returns
/// The mean squared error, `0` when there are no errors.
pub fn mean_squared_error(errors: &[f32]) -> f32 {
    if errors.is_empty() {
        return 0.;
    }

    let partials: Vec<f64> = errors
        .par_chunks(LOSS_CHUNK)
        .map(|chunk| chunk.iter().map(|&e| (e as f64) * (e as f64)).sum())
        .collect();

    (partials.iter().sum::<f64>() / errors.len() as f64) as f32
}
