mod ratings;
mod split;

pub use ratings::{IdMap, Rating, parse_ratings, read_ratings, to_matrix};
pub use split::{split_per_user, split_random};
