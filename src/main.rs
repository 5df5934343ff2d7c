use std::{env, process};

use anyhow::{Context, bail};
use log::{info, warn};
use rand::{SeedableRng, rngs::StdRng};

use sgd_mf::{
    Session, SessionStatus, TrainingConfig,
    dataset::{self, IdMap},
    evaluate,
};

const DEFAULT_TEST_RATIO: f32 = 0.1;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <ratings.csv> [config.json] [test_ratio]", args[0]);
        process::exit(1);
    }

    let config = match args.get(2) {
        Some(path) => TrainingConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => TrainingConfig::default(),
    };

    let test_ratio = match args.get(3) {
        Some(ratio) => ratio
            .parse()
            .with_context(|| format!("invalid test ratio '{ratio}'"))?,
        None => DEFAULT_TEST_RATIO,
    };

    let ratings = dataset::read_ratings(&args[1]).with_context(|| format!("reading {}", args[1]))?;
    if ratings.is_empty() {
        bail!("{} holds no ratings", args[1]);
    }

    let users = IdMap::users(&ratings);
    let items = IdMap::items(&ratings);
    info!(ratings = ratings.len(), users = users.len(), items = items.len(); "loaded ratings");

    let mut rng = StdRng::seed_from_u64(config.seed);
    let (train, test) = dataset::split_random(ratings, test_ratio, &mut rng)?;
    let train = dataset::to_matrix(&train, &users, &items, false)?;
    let test = dataset::to_matrix(&test, &users, &items, false)?;

    info!("configuration:\n{config}");

    let mut session = Session::new(&train, config)?;
    session.start()?;

    while session.status() == SessionStatus::Running {
        let loss = session.step()?;
        let epoch = session.config().cur_iterations;
        info!(epoch = epoch, loss = loss; "train loss");
    }

    if let Some(epoch) = session.losses().first_non_finite() {
        warn!(epoch = epoch; "training diverged, consider a smaller learning rate");
    }

    let model = session.finalize()?;
    let test_loss = evaluate(&model, &test)?;
    info!(test_ratings = test.nnz(), loss = test_loss; "test loss");

    println!("{}", serde_json::to_string(session.losses())?);
    Ok(())
}
