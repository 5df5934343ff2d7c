mod session;
mod trace;

pub use session::{Session, SessionStatus};
pub use trace::LossTrace;

use crate::{
    config::TrainingConfig,
    error::{MfErr, Result},
    kernel::{UpdateKernel, mean_squared_error},
    matrix::SparseInteractionMatrix,
    state::TrainedModel,
};

/// The outcome of a complete training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutput {
    pub model: TrainedModel,
    pub losses: LossTrace,
}

/// Trains a biased factorization model on `matrix` until `config.total_iterations` is reached.
///
/// # Arguments
/// * `matrix` - The interactions to reconstruct.
/// * `config` - The session's hyperparameters.
///
/// # Returns
/// The trained model with its loss trace, or an error if the inputs are invalid.
pub fn train(matrix: &SparseInteractionMatrix, config: &TrainingConfig) -> Result<TrainOutput> {
    run_to_completion(Session::new(matrix, config.clone())?)
}

/// Continues training `model` from epoch `config.cur_iterations` until
/// `config.total_iterations` is reached.
///
/// # Arguments
/// * `model` - A model produced by an earlier run over the same matrix.
/// * `matrix` - The interactions to reconstruct.
/// * `config` - The session's hyperparameters, `cur_iterations` being the epochs already run.
///
/// # Returns
/// The trained model with the losses of the remaining epochs, or an error if the inputs
/// are invalid or don't fit the model.
pub fn resume(
    model: TrainedModel,
    matrix: &SparseInteractionMatrix,
    config: &TrainingConfig,
) -> Result<TrainOutput> {
    run_to_completion(Session::resume(matrix, config.clone(), model)?)
}

fn run_to_completion(mut session: Session<'_>) -> Result<TrainOutput> {
    session.start()?;
    session.run()?;

    Ok(TrainOutput {
        model: session.finalize()?,
        losses: session.into_losses(),
    })
}

/// Trains with the given essentials and the default regularization weights.
///
/// # Arguments
/// * `matrix` - The interactions to reconstruct.
/// * `n_iterations` - The amount of epochs.
/// * `n_factors` - The length of every latent factor vector.
/// * `learning_rate` - The step size of every update.
/// * `seed` - The seed of the initial factors.
///
/// # Returns
/// The trained model with its loss trace, or an error if the inputs are invalid.
pub fn train_basic(
    matrix: &SparseInteractionMatrix,
    n_iterations: usize,
    n_factors: usize,
    learning_rate: f32,
    seed: u64,
) -> Result<TrainOutput> {
    let config = TrainingConfig {
        total_iterations: n_iterations,
        n_factors,
        learning_rate,
        seed,
        ..Default::default()
    };

    train(matrix, &config)
}

/// Runs a single evaluation pass of `model` over `matrix`.
///
/// # Arguments
/// * `model` - A trained model.
/// * `matrix` - Interactions with the same users and items as the training data,
///   usually a held-out split.
///
/// # Returns
/// The mean squared error over the interactions of `matrix`, or a `MfErr::ShapeMismatch`
/// if the matrix doesn't fit the model.
pub fn evaluate(model: &TrainedModel, matrix: &SparseInteractionMatrix) -> Result<f32> {
    if model.n_rows() != matrix.n_rows() {
        return Err(MfErr::ShapeMismatch {
            a: "model users",
            b: "matrix rows",
            got: matrix.n_rows(),
            expected: model.n_rows(),
        });
    }

    if model.n_cols() != matrix.n_cols() {
        return Err(MfErr::ShapeMismatch {
            a: "model items",
            b: "matrix columns",
            got: matrix.n_cols(),
            expected: model.n_cols(),
        });
    }

    let params = TrainingConfig {
        n_factors: model.n_factors(),
        is_train: false,
        ..Default::default()
    }
    .kernel_params();

    let kernel = UpdateKernel::new(matrix, &params, model.global_bias());

    let mut errors = vec![0.; matrix.nnz()];
    kernel.compute_errors(model.params(), &mut errors);
    Ok(mean_squared_error(&errors))
}
