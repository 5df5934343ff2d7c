use std::{
    fmt::{self, Display},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{MfErr, Result};

/// The hyperparameters of a training session.
///
/// Every field is optional when deserializing, missing fields take the default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// The amount of epochs already run, only advanced by the training loop.
    pub cur_iterations: usize,
    pub total_iterations: usize,
    pub n_factors: usize,
    pub learning_rate: f32,
    pub seed: u64,
    pub p_reg: f32,
    pub q_reg: f32,
    pub user_bias_reg: f32,
    pub item_bias_reg: f32,
    /// Disables the gradient step, turning every epoch into an evaluation pass.
    pub is_train: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            cur_iterations: 0,
            total_iterations: 100,
            n_factors: 150,
            learning_rate: 0.007,
            seed: 42,
            p_reg: 0.08,
            q_reg: 0.1,
            user_bias_reg: 0.003,
            item_bias_reg: 0.003,
            is_train: true,
        }
    }
}

impl TrainingConfig {
    /// Reads a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The location of the file.
    ///
    /// # Returns
    /// The validated configuration or an error if the file couldn't be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this configuration as pretty printed JSON.
    ///
    /// # Arguments
    /// * `path` - The location of the file, overwritten if it exists.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks every hyperparameter is inside of its valid range.
    ///
    /// # Returns
    /// A `MfErr::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.n_factors == 0 {
            return Err(MfErr::config("n_factors", "must be positive"));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(MfErr::config(
                "learning_rate",
                format!("must be a positive finite number, got {}", self.learning_rate),
            ));
        }

        for (field, reg) in self.regularizers() {
            if !(reg.is_finite() && reg >= 0.) {
                return Err(MfErr::config(
                    field,
                    format!("must be a non negative finite number, got {reg}"),
                ));
            }
        }

        if self.cur_iterations > self.total_iterations {
            return Err(MfErr::config(
                "cur_iterations",
                format!(
                    "{} is beyond total_iterations {}",
                    self.cur_iterations, self.total_iterations
                ),
            ));
        }

        Ok(())
    }

    /// The amount of epochs left to run.
    pub fn remaining_iterations(&self) -> usize {
        self.total_iterations.saturating_sub(self.cur_iterations)
    }

    /// Names and values of every regularization weight.
    pub fn regularizers(&self) -> [(&'static str, f32); 4] {
        [
            ("p_reg", self.p_reg),
            ("q_reg", self.q_reg),
            ("user_bias_reg", self.user_bias_reg),
            ("item_bias_reg", self.item_bias_reg),
        ]
    }

    /// Snapshots the values the update kernel reads on every interaction.
    pub fn kernel_params(&self) -> KernelParams {
        KernelParams {
            n_factors: self.n_factors,
            learning_rate: self.learning_rate,
            p_reg: self.p_reg,
            q_reg: self.q_reg,
            user_bias_reg: self.user_bias_reg,
            item_bias_reg: self.item_bias_reg,
            is_train: self.is_train,
        }
    }
}

impl Display for TrainingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Iterations: {}/{}", self.cur_iterations, self.total_iterations)?;
        writeln!(f, "Factors: {}", self.n_factors)?;
        writeln!(f, "Learning rate: {}", self.learning_rate)?;
        writeln!(f, "Seed: {}", self.seed)?;
        writeln!(f, "P regularization: {}", self.p_reg)?;
        writeln!(f, "Q regularization: {}", self.q_reg)?;
        writeln!(f, "User bias regularization: {}", self.user_bias_reg)?;
        writeln!(f, "Item bias regularization: {}", self.item_bias_reg)?;
        write!(f, "Train: {}", self.is_train)
    }
}

/// The read-only subset of a `TrainingConfig` shared by every kernel invocation of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub n_factors: usize,
    pub learning_rate: f32,
    pub p_reg: f32,
    pub q_reg: f32,
    pub user_bias_reg: f32,
    pub item_bias_reg: f32,
    pub is_train: bool,
}
