mod buffers;
mod model_state;
mod trained;

pub use buffers::FactorBuffers;
pub use model_state::{INIT_SCALE, ModelState};
pub use trained::TrainedModel;
