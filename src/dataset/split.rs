use std::collections::BTreeMap;

use rand::{Rng, seq::SliceRandom};

use super::Rating;
use crate::error::{MfErr, Result};

/// Shuffles `ratings` and cuts them into a train and a test set.
///
/// Both sets come back sorted by user, the relative order within a user follows the shuffle.
///
/// # Arguments
/// * `ratings` - Every available rating.
/// * `test_ratio` - The share of ratings held out for testing, in `[0, 1]`.
/// * `rng` - The source of the shuffle.
///
/// # Returns
/// The `(train, test)` sets or a `MfErr::InvalidConfig` if the ratio is out of range.
pub fn split_random<R: Rng>(
    mut ratings: Vec<Rating>,
    test_ratio: f32,
    rng: &mut R,
) -> Result<(Vec<Rating>, Vec<Rating>)> {
    check_ratio(test_ratio)?;

    ratings.shuffle(rng);
    let cut = train_len(ratings.len(), test_ratio);
    let mut test = ratings.split_off(cut);
    let mut train = ratings;

    train.sort_by_key(|r| r.user);
    test.sort_by_key(|r| r.user);
    Ok((train, test))
}

/// Splits the ratings of every user separately, so each user keeps the same share of
/// ratings in the train set.
///
/// # Arguments
/// * `ratings` - Every available rating.
/// * `test_ratio` - The share of each user's ratings held out for testing, in `[0, 1]`.
/// * `rng` - The source of the shuffles.
///
/// # Returns
/// The `(train, test)` sets grouped by ascending user, or a `MfErr::InvalidConfig`
/// if the ratio is out of range.
pub fn split_per_user<R: Rng>(
    ratings: Vec<Rating>,
    test_ratio: f32,
    rng: &mut R,
) -> Result<(Vec<Rating>, Vec<Rating>)> {
    check_ratio(test_ratio)?;

    let mut by_user: BTreeMap<u64, Vec<Rating>> = BTreeMap::new();
    for rating in ratings {
        by_user.entry(rating.user).or_default().push(rating);
    }

    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut user_ratings) in by_user {
        user_ratings.shuffle(rng);
        let cut = train_len(user_ratings.len(), test_ratio);

        test.extend(user_ratings.drain(cut..));
        train.extend(user_ratings);
    }

    Ok((train, test))
}

fn check_ratio(test_ratio: f32) -> Result<()> {
    if !(0. ..=1.).contains(&test_ratio) {
        return Err(MfErr::config(
            "test_ratio",
            format!("must be in [0, 1], got {test_ratio}"),
        ));
    }

    Ok(())
}

/// The amount of ratings kept for training, rounding the train share down.
fn train_len(len: usize, test_ratio: f32) -> usize {
    ((len as f64) * (1. - test_ratio as f64)).floor() as usize
}
