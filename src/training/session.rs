use std::fmt::{self, Display};

use log::{debug, info, warn};

use super::LossTrace;
use crate::{
    config::{KernelParams, TrainingConfig},
    error::{MfErr, Result},
    kernel::{UpdateKernel, mean_squared_error},
    matrix::SparseInteractionMatrix,
    state::{ModelState, TrainedModel},
};

/// The lifecycle of a training `Session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Validated, the model isn't allocated yet.
    Idle,
    Running,
    /// Every configured epoch has been run.
    Converged,
    /// Abandoned at an epoch boundary before reaching the configured epochs.
    Stopped,
}

impl SessionStatus {
    fn name(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Converged => "converged",
            SessionStatus::Stopped => "stopped",
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drives the epochs of a single training run over a sparse interaction matrix.
///
/// Every epoch dispatches the `UpdateKernel` over all the interactions, reduces their
/// errors into the epoch's loss, and swaps the model's buffers. Epochs are strictly
/// sequential, the parallelism lives inside each of them.
pub struct Session<'m> {
    matrix: &'m SparseInteractionMatrix,
    config: TrainingConfig,
    params: KernelParams,
    state: Option<ModelState>,
    errors: Vec<f32>,
    losses: LossTrace,
    status: SessionStatus,
}

impl<'m> Session<'m> {
    /// Creates a new idle `Session` that trains from seeded random factors.
    ///
    /// # Arguments
    /// * `matrix` - The interactions to train on, already validated by its construction.
    /// * `config` - The session's hyperparameters, with `cur_iterations` at `0`.
    ///
    /// # Returns
    /// A new `Session` or a `MfErr::InvalidConfig` if any hyperparameter is out of range.
    pub fn new(matrix: &'m SparseInteractionMatrix, config: TrainingConfig) -> Result<Self> {
        if config.cur_iterations != 0 {
            return Err(MfErr::config(
                "cur_iterations",
                format!(
                    "a new session starts at epoch 0, got {}, resume a trained model instead",
                    config.cur_iterations
                ),
            ));
        }

        Self::build(matrix, config, None)
    }

    /// Creates a new idle `Session` that continues training `model` from epoch
    /// `config.cur_iterations`.
    ///
    /// Both buffers start as a copy of the model and its global bias is kept, so running
    /// the remaining epochs yields the same model as an uninterrupted session would.
    ///
    /// # Arguments
    /// * `matrix` - The interactions to train on.
    /// * `config` - The session's hyperparameters, `cur_iterations` being the epochs already run.
    /// * `model` - The parameters to continue from.
    ///
    /// # Returns
    /// A new `Session`, a `MfErr::InvalidConfig` if any hyperparameter is out of range or a
    /// `MfErr::ShapeMismatch` if the model doesn't fit the matrix or the configuration.
    pub fn resume(
        matrix: &'m SparseInteractionMatrix,
        config: TrainingConfig,
        model: TrainedModel,
    ) -> Result<Self> {
        let shapes = [
            ("model users", "matrix rows", matrix.n_rows(), model.n_rows()),
            ("model items", "matrix columns", matrix.n_cols(), model.n_cols()),
            ("model factors", "config n_factors", config.n_factors, model.n_factors()),
        ];

        for (a, b, got, expected) in shapes {
            if got != expected {
                return Err(MfErr::ShapeMismatch {
                    a,
                    b,
                    got,
                    expected,
                });
            }
        }

        Self::build(matrix, config, Some(ModelState::from_model(model)))
    }

    fn build(
        matrix: &'m SparseInteractionMatrix,
        config: TrainingConfig,
        state: Option<ModelState>,
    ) -> Result<Self> {
        config.validate()?;

        for (field, reg) in config.regularizers() {
            if config.learning_rate * reg >= 1. {
                warn!(
                    field = field, learning_rate = config.learning_rate, reg = reg;
                    "learning rate times regularization is at least 1, parameters may oscillate"
                );
            }
        }

        Ok(Self {
            matrix,
            params: config.kernel_params(),
            losses: LossTrace::with_capacity(config.remaining_iterations()),
            config,
            state,
            errors: Vec::new(),
            status: SessionStatus::Idle,
        })
    }

    /// Allocates and initializes the model, entering the `Running` state.
    ///
    /// A resumed session keeps the model it was given. A session with no epochs left
    /// goes straight to `Converged`.
    ///
    /// # Returns
    /// A `MfErr::InvalidState` if the session was already started.
    pub fn start(&mut self) -> Result<()> {
        self.expect(SessionStatus::Idle)?;

        let state = match self.state.take() {
            Some(state) => state,
            None => ModelState::init(
                self.matrix.n_rows(),
                self.matrix.n_cols(),
                &self.config,
                self.matrix.mean_target(),
            )?,
        };

        info!(
            users = self.matrix.n_rows(), items = self.matrix.n_cols(),
            interactions = self.matrix.nnz(), global_bias = state.global_bias(),
            epoch = self.config.cur_iterations;
            "starting training session"
        );
        debug!("configuration:\n{}", self.config);

        self.state = Some(state);
        self.errors = vec![0.; self.matrix.nnz()];
        self.status = SessionStatus::Running;
        self.check_converged();
        Ok(())
    }

    /// Runs a single epoch.
    ///
    /// # Returns
    /// The loss of the epoch, or a `MfErr::InvalidState` if the session isn't running.
    pub fn step(&mut self) -> Result<f32> {
        self.expect(SessionStatus::Running)?;

        let Some(state) = self.state.as_mut() else {
            return Err(MfErr::InvalidState {
                expected: SessionStatus::Running.name(),
                got: self.status.name(),
            });
        };

        let kernel = UpdateKernel::new(self.matrix, &self.params, state.global_bias());
        kernel.run_epoch(state, &mut self.errors);

        let loss = mean_squared_error(&self.errors);
        state.swap();

        let epoch = self.config.cur_iterations;
        self.losses.push(loss);
        self.config.cur_iterations += 1;

        if loss.is_finite() {
            debug!(epoch = epoch, loss = loss; "epoch finished");
        } else {
            warn!(epoch = epoch, loss = loss; "loss is no longer finite");
        }

        self.check_converged();
        Ok(loss)
    }

    /// Runs every remaining epoch.
    ///
    /// # Returns
    /// A `MfErr::InvalidState` if the session isn't running or already converged.
    pub fn run(&mut self) -> Result<()> {
        if self.status == SessionStatus::Converged {
            return Ok(());
        }

        self.expect(SessionStatus::Running)?;
        while self.status == SessionStatus::Running {
            self.step()?;
        }

        info!(
            epochs = self.losses.len(), loss = self.losses.last().copied().unwrap_or(0.);
            "training session finished"
        );
        Ok(())
    }

    /// Abandons the session at the current epoch boundary.
    ///
    /// # Returns
    /// A `MfErr::InvalidState` if the session already finished.
    pub fn stop(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::Idle | SessionStatus::Running => {
                info!(epoch = self.config.cur_iterations; "stopping training session");
                self.status = SessionStatus::Stopped;
                Ok(())
            }
            status => Err(MfErr::InvalidState {
                expected: SessionStatus::Running.name(),
                got: status.name(),
            }),
        }
    }

    /// Copies the authoritative parameters out of the session.
    ///
    /// Calling it repeatedly yields the same model, finalizing doesn't end the session.
    ///
    /// # Returns
    /// The model or a `MfErr::InvalidState` if the session was never started and has no
    /// model to resume.
    pub fn finalize(&self) -> Result<TrainedModel> {
        self.state
            .as_ref()
            .map(ModelState::finalize)
            .ok_or(MfErr::InvalidState {
                expected: SessionStatus::Running.name(),
                got: self.status.name(),
            })
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The session's hyperparameters, with `cur_iterations` pointing at the next epoch.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&ModelState> {
        self.state.as_ref()
    }

    pub fn losses(&self) -> &LossTrace {
        &self.losses
    }

    pub fn into_losses(self) -> LossTrace {
        self.losses
    }

    fn expect(&self, expected: SessionStatus) -> Result<()> {
        if self.status != expected {
            return Err(MfErr::InvalidState {
                expected: expected.name(),
                got: self.status.name(),
            });
        }

        Ok(())
    }

    fn check_converged(&mut self) {
        if self.config.cur_iterations >= self.config.total_iterations {
            self.status = SessionStatus::Converged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> SparseInteractionMatrix {
        SparseInteractionMatrix::new(3, 2, vec![0, 1, 2, 3], vec![0, 1, 0]).unwrap()
    }

    fn config(total_iterations: usize) -> TrainingConfig {
        TrainingConfig {
            total_iterations,
            n_factors: 2,
            learning_rate: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn lifecycle() {
        let matrix = matrix();
        let mut session = Session::new(&matrix, config(2)).unwrap();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.finalize().is_err());
        assert!(session.step().is_err());

        session.start().unwrap();
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(session.start().is_err());

        session.step().unwrap();
        assert_eq!(session.config().cur_iterations, 1);
        assert_eq!(session.status(), SessionStatus::Running);

        session.step().unwrap();
        assert_eq!(session.status(), SessionStatus::Converged);
        assert_eq!(session.losses().len(), 2);
        assert!(session.step().is_err());
        assert!(session.stop().is_err());
    }

    #[test]
    fn zero_iterations_converge_on_start() {
        let matrix = matrix();
        let mut session = Session::new(&matrix, config(0)).unwrap();
        session.start().unwrap();

        assert_eq!(session.status(), SessionStatus::Converged);
        session.run().unwrap();
        assert!(session.losses().is_empty());
    }

    #[test]
    fn stop_at_epoch_boundary() {
        let matrix = matrix();
        let mut session = Session::new(&matrix, config(10)).unwrap();
        session.start().unwrap();
        session.step().unwrap();
        let model = session.finalize().unwrap();

        session.stop().unwrap();
        assert_eq!(session.status(), SessionStatus::Stopped);
        assert!(session.step().is_err());
        assert_eq!(session.losses().len(), 1);
        assert_eq!(session.finalize().unwrap(), model);
    }

    #[test]
    fn buffers_alternate_every_epoch() {
        let matrix = matrix();
        let mut session = Session::new(&matrix, config(3)).unwrap();
        session.start().unwrap();

        let mut active = Vec::new();
        while session.status() == SessionStatus::Running {
            session.step().unwrap();
            active.push(session.state().unwrap().active_idx());
        }

        assert_eq!(active, [1, 0, 1]);
    }

    #[test]
    fn new_session_starts_at_epoch_zero() {
        let matrix = matrix();
        let config = TrainingConfig {
            cur_iterations: 3,
            ..config(5)
        };

        assert!(matches!(
            Session::new(&matrix, config),
            Err(MfErr::InvalidConfig {
                field: "cur_iterations",
                ..
            })
        ));
    }

    #[test]
    fn resumed_session_continues_from_cursor() {
        let matrix = matrix();
        let mut first = Session::new(&matrix, config(3)).unwrap();
        first.start().unwrap();
        first.run().unwrap();
        let model = first.finalize().unwrap();

        let config = TrainingConfig {
            cur_iterations: 3,
            ..config(5)
        };
        let mut session = Session::resume(&matrix, config, model.clone()).unwrap();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.finalize().unwrap(), model);

        session.start().unwrap();
        session.run().unwrap();

        assert_eq!(session.losses().len(), 2);
        assert_eq!(session.config().cur_iterations, 5);
        assert_ne!(session.finalize().unwrap(), model);
    }

    #[test]
    fn resume_rejects_other_shapes() {
        let matrix = matrix();
        let mut session = Session::new(&matrix, config(1)).unwrap();
        session.start().unwrap();
        let model = session.finalize().unwrap();

        let wider = TrainingConfig {
            n_factors: 3,
            ..config(2)
        };
        assert!(matches!(
            Session::resume(&matrix, wider, model.clone()),
            Err(MfErr::ShapeMismatch { .. })
        ));

        let other = SparseInteractionMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1]).unwrap();
        assert!(matches!(
            Session::resume(&other, config(2), model),
            Err(MfErr::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn invalid_config_aborts_before_running() {
        let matrix = matrix();
        let res = Session::new(
            &matrix,
            TrainingConfig {
                n_factors: 0,
                ..Default::default()
            },
        );

        assert!(matches!(res, Err(MfErr::InvalidConfig { .. })));
    }
}
