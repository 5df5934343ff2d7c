//! Biased matrix factorization trained by data-parallel stochastic gradient descent.
//!
//! A `SparseInteractionMatrix` of user-item interactions is reconstructed as
//! `global_bias + user_bias[u] + item_bias[i] + dot(P[u], Q[i])`. Every epoch updates
//! all the interactions in parallel against a double buffered `ModelState`, see
//! `UpdateKernel` for the update rule and `Session` for the epoch loop.

pub mod config;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod kernel;
pub mod matrix;
pub mod state;
pub mod training;

pub use config::{KernelParams, TrainingConfig};
pub use error::{MfErr, Result};
pub use kernel::UpdateKernel;
pub use matrix::SparseInteractionMatrix;
pub use state::{FactorBuffers, ModelState, TrainedModel};
pub use training::{
    LossTrace, Session, SessionStatus, TrainOutput, evaluate, resume, train, train_basic,
};
