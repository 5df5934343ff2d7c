use std::{cell::RefCell, rc::Rc};

use rand::{SeedableRng, rngs::StdRng};

use super::{FactorBuffers, TrainedModel};
use crate::{
    config::TrainingConfig,
    error::Result,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// The range of a single initial factor before scaling by the amount of factors.
pub const INIT_SCALE: f32 = 0.1;

/// The mutable parameters of a training session, double buffered.
///
/// The buffer at `active_idx` is authoritative and only read during an epoch,
/// the other one receives the values computed by the epoch. Calling `swap`
/// after the epoch turns the freshly written buffer into the read buffer.
#[derive(Debug, Clone)]
pub struct ModelState {
    active_idx: usize,
    buffers: [FactorBuffers; 2],
    global_bias: f32,
}

impl ModelState {
    /// Creates a new `ModelState` with seeded random factors and zeroed biases.
    ///
    /// `P` is sampled before `Q` from a single `StdRng` seeded with `config.seed`,
    /// so the same configuration always yields the same initial state.
    ///
    /// # Arguments
    /// * `n_rows` - The amount of users.
    /// * `n_cols` - The amount of items.
    /// * `config` - The session's hyperparameters.
    /// * `global_bias` - The fixed offset of every prediction.
    ///
    /// # Returns
    /// A new `ModelState` or an error if the factor distribution can't be built.
    pub fn init(
        n_rows: usize,
        n_cols: usize,
        config: &TrainingConfig,
        global_bias: f32,
    ) -> Result<Self> {
        let k = config.n_factors;
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(config.seed)));

        let p = RandParamGen::factors(rng.clone(), n_rows * k, k, INIT_SCALE)?.sample_all();
        let q = RandParamGen::factors(rng, n_cols * k, k, INIT_SCALE)?.sample_all();
        let user_bias = ConstParamGen::zeros(n_rows).sample_all();
        let item_bias = ConstParamGen::zeros(n_cols).sample_all();

        Ok(Self::from_buffers(
            FactorBuffers::new(k, p, q, user_bias, item_bias),
            global_bias,
        ))
    }

    /// Creates a new `ModelState` where both buffers start as a copy of `initial`.
    pub fn from_buffers(initial: FactorBuffers, global_bias: f32) -> Self {
        Self {
            active_idx: 0,
            buffers: [initial.clone(), initial],
            global_bias,
        }
    }

    /// Creates a new `ModelState` that continues from the parameters of `model`.
    pub fn from_model(model: TrainedModel) -> Self {
        let global_bias = model.global_bias();
        Self::from_buffers(model.into_params(), global_bias)
    }

    pub fn global_bias(&self) -> f32 {
        self.global_bias
    }

    /// The index of the authoritative buffer, either `0` or `1`.
    pub fn active_idx(&self) -> usize {
        self.active_idx
    }

    /// The authoritative parameters.
    pub fn read(&self) -> &FactorBuffers {
        &self.buffers[self.active_idx]
    }

    /// Borrows the read buffer and the write buffer of the current epoch at once.
    pub fn split(&mut self) -> (&FactorBuffers, &mut FactorBuffers) {
        let [a, b] = &mut self.buffers;

        match self.active_idx {
            0 => (a, b),
            _ => (b, a),
        }
    }

    /// Brings the write buffer back in line with the read buffer.
    pub fn mirror(&mut self) {
        let (read, write) = self.split();
        write.copy_from(read);
    }

    /// Swaps the roles of both buffers, what was written becomes authoritative.
    pub fn swap(&mut self) {
        self.active_idx ^= 1;
    }

    /// Copies the authoritative parameters into a model owned by the caller.
    pub fn finalize(&self) -> TrainedModel {
        TrainedModel::new(self.read().clone(), self.global_bias)
    }
}
