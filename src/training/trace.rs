use std::ops::Deref;

use serde::Serialize;

/// The loss of every completed epoch, in epoch order.
///
/// Entries are only ever appended, a non-finite entry marks a diverged session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LossTrace(Vec<f32>);

impl LossTrace {
    pub fn with_capacity(epochs: usize) -> Self {
        Self(Vec::with_capacity(epochs))
    }

    pub(crate) fn push(&mut self, loss: f32) {
        self.0.push(loss);
    }

    /// The epoch of the first non-finite loss, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.0.iter().position(|loss| !loss.is_finite())
    }

    pub fn is_diverged(&self) -> bool {
        self.first_non_finite().is_some()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl Deref for LossTrace {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
