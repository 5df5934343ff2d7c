use rayon::ThreadPoolBuilder;
use sgd_mf::{
    MfErr, ModelState, Session, SessionStatus, SparseInteractionMatrix, TrainOutput,
    TrainingConfig, evaluate, resume, train, train_basic,
};

/// 3 users x 2 items with interactions {(0, 0), (1, 1), (2, 0)}.
fn scenario_matrix() -> SparseInteractionMatrix {
    SparseInteractionMatrix::new(3, 2, vec![0, 1, 2, 3], vec![0, 1, 0]).unwrap()
}

fn scenario_config() -> TrainingConfig {
    TrainingConfig {
        total_iterations: 5,
        n_factors: 2,
        learning_rate: 0.1,
        seed: 42,
        ..Default::default()
    }
}

fn explicit_matrix() -> SparseInteractionMatrix {
    let triplets: Vec<(usize, usize, f32)> = (0..6)
        .flat_map(|u| (0..5).filter(move |i| (u + i) % 3 != 0).map(move |i| (u, i)))
        .map(|(u, i)| (u, i, 1. + ((u * 7 + i * 3) % 5) as f32))
        .collect();

    SparseInteractionMatrix::from_triplets(6, 5, &triplets, false).unwrap()
}

fn norm(xs: &[f32]) -> f32 {
    xs.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[test]
fn scenario_trace_is_finite_and_non_increasing() {
    let TrainOutput { losses, model } = train(&scenario_matrix(), &scenario_config()).unwrap();

    assert_eq!(losses.len(), 5);
    assert!(losses.iter().all(|loss| loss.is_finite()));
    for w in losses.windows(2) {
        assert!(w[1] <= w[0] * (1. + 1e-4) + 1e-9, "loss increased: {losses:?}");
    }

    assert_eq!(model.p().len(), 3 * 2);
    assert_eq!(model.q().len(), 2 * 2);
    assert_eq!(model.user_bias().len(), 3);
    assert_eq!(model.item_bias().len(), 2);
    assert_eq!(model.global_bias(), 1.);
}

#[test]
fn supplied_negatives_are_fitted() {
    // Same interactions as the scenario, with user 1 rejecting item 1.
    let matrix = SparseInteractionMatrix::with_values(
        3,
        2,
        vec![0, 1, 2, 3],
        vec![0, 1, 0],
        vec![1., 0., 1.],
    )
    .unwrap();

    let losses = train(&matrix, &scenario_config()).unwrap().losses;

    assert_eq!(losses.len(), 5);
    assert!(losses[0] > 0.1, "{losses:?}");
    assert!(losses.windows(2).all(|w| w[1] < w[0]), "{losses:?}");
    assert!(losses[4] < 0.5 * losses[0], "{losses:?}");
}

#[test]
fn resumed_training_matches_an_uninterrupted_run() {
    let matrix = explicit_matrix();
    let config = TrainingConfig {
        total_iterations: 8,
        n_factors: 3,
        learning_rate: 0.05,
        ..Default::default()
    };

    let full = train(&matrix, &config).unwrap();

    let head = train(
        &matrix,
        &TrainingConfig {
            total_iterations: 5,
            ..config.clone()
        },
    )
    .unwrap();
    let tail = resume(
        head.model,
        &matrix,
        &TrainingConfig {
            cur_iterations: 5,
            ..config
        },
    )
    .unwrap();

    assert_eq!(tail.losses.len(), 3);
    assert_eq!([&head.losses[..], &tail.losses[..]].concat(), &full.losses[..]);
    assert_eq!(tail.model, full.model);
}

#[test]
fn training_from_a_cursor_needs_a_model() {
    let config = TrainingConfig {
        cur_iterations: 3,
        ..scenario_config()
    };

    assert!(matches!(
        train(&scenario_matrix(), &config),
        Err(MfErr::InvalidConfig {
            field: "cur_iterations",
            ..
        })
    ));
}

#[test]
fn zero_iterations_return_the_initial_model() {
    let matrix = scenario_matrix();
    let config = TrainingConfig {
        total_iterations: 0,
        ..scenario_config()
    };

    let output = train(&matrix, &config).unwrap();
    let initial = ModelState::init(3, 2, &config, matrix.mean_target()).unwrap();

    assert!(output.losses.is_empty());
    assert_eq!(output.model, initial.finalize());
}

#[test]
fn evaluation_epochs_leave_the_model_untouched() {
    let matrix = scenario_matrix();
    let config = TrainingConfig {
        is_train: false,
        ..scenario_config()
    };

    let mut session = Session::new(&matrix, config.clone()).unwrap();
    session.start().unwrap();
    let initial = session.finalize().unwrap();

    while session.status() == SessionStatus::Running {
        session.step().unwrap();

        let state = session.state().unwrap();
        let mut mirrored = state.clone();
        let (read, write) = mirrored.split();
        assert_eq!(read, &*write);
        assert_eq!(state.finalize(), initial);
    }

    let losses = session.losses();
    assert_eq!(losses.len(), config.total_iterations);
    assert!(losses.iter().all(|&loss| loss == losses[0]));
}

#[test]
fn evaluate_matches_an_evaluation_epoch() {
    let matrix = scenario_matrix();
    let initial = train(
        &matrix,
        &TrainingConfig {
            total_iterations: 0,
            ..scenario_config()
        },
    )
    .unwrap()
    .model;

    let eval = train(
        &matrix,
        &TrainingConfig {
            total_iterations: 1,
            is_train: false,
            ..scenario_config()
        },
    )
    .unwrap();

    assert_eq!(evaluate(&initial, &matrix).unwrap(), eval.losses[0]);
}

#[test]
fn evaluate_rejects_other_shapes() {
    let model = train(&scenario_matrix(), &scenario_config()).unwrap().model;
    let other = SparseInteractionMatrix::new(2, 2, vec![0, 1, 1], vec![0]).unwrap();

    assert!(matches!(
        evaluate(&model, &other),
        Err(MfErr::ShapeMismatch { .. })
    ));
}

#[test]
fn same_seed_same_result() {
    let matrix = explicit_matrix();
    let config = TrainingConfig {
        total_iterations: 20,
        n_factors: 4,
        learning_rate: 0.05,
        ..Default::default()
    };

    let a = train(&matrix, &config).unwrap();
    let b = train(&matrix, &config).unwrap();
    assert_eq!(a, b);

    let other_seed = train(&matrix, &TrainingConfig { seed: 1, ..config }).unwrap();
    assert_ne!(a.model, other_seed.model);
}

#[test]
fn result_does_not_depend_on_the_thread_count() {
    let matrix = explicit_matrix();
    let config = TrainingConfig {
        total_iterations: 10,
        n_factors: 3,
        learning_rate: 0.05,
        ..Default::default()
    };

    let run = |threads| {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| train(&matrix, &config).unwrap())
    };

    assert_eq!(run(1), run(4));
}

#[test]
fn trace_length_matches_iterations() {
    let matrix = explicit_matrix();

    for total_iterations in [1, 3, 8] {
        let config = TrainingConfig {
            total_iterations,
            n_factors: 2,
            learning_rate: 0.01,
            ..Default::default()
        };

        let output = train(&matrix, &config).unwrap();
        assert_eq!(output.losses.len(), total_iterations);
    }
}

#[test]
fn finalize_after_convergence_is_stable() {
    let matrix = scenario_matrix();
    let mut session = Session::new(&matrix, scenario_config()).unwrap();
    session.start().unwrap();
    session.run().unwrap();

    assert_eq!(session.status(), SessionStatus::Converged);
    assert_eq!(session.finalize().unwrap(), session.finalize().unwrap());
}

#[test]
fn stronger_regularization_shrinks_factors() {
    let matrix = scenario_matrix();

    let norms: Vec<f32> = [0., 1., 5., 10.]
        .into_iter()
        .map(|reg| {
            let config = TrainingConfig {
                total_iterations: 20,
                p_reg: reg,
                q_reg: reg,
                ..scenario_config()
            };

            let model = train(&matrix, &config).unwrap().model;
            norm(model.p()) + norm(model.q())
        })
        .collect();

    assert!(norms.windows(2).all(|w| w[1] < w[0]), "{norms:?}");
    assert!(norms[3] < 0.01 * norms[0], "{norms:?}");
}

#[test]
fn explicit_ratings_are_learned() {
    let matrix = explicit_matrix();
    let config = TrainingConfig {
        total_iterations: 50,
        n_factors: 4,
        learning_rate: 0.05,
        ..Default::default()
    };

    let output = train(&matrix, &config).unwrap();
    let first = output.losses[0];
    let last = *output.losses.last().unwrap();

    assert!(last < first, "first {first}, last {last}");
    assert!((output.model.global_bias() - matrix.mean_target()).abs() < 1e-6);
}

#[test]
fn divergence_is_recorded_not_fatal() {
    let matrix = explicit_matrix();
    let config = TrainingConfig {
        total_iterations: 200,
        n_factors: 4,
        learning_rate: 50.,
        ..Default::default()
    };

    let output = train(&matrix, &config).unwrap();

    assert_eq!(output.losses.len(), 200);
    assert!(output.losses.is_diverged());
}

#[test]
fn basic_form_uses_default_regularization() {
    let matrix = scenario_matrix();

    let basic = train_basic(&matrix, 5, 2, 0.1, 42).unwrap();
    let extended = train(&matrix, &scenario_config()).unwrap();

    assert_eq!(basic, extended);
}

#[test]
fn invalid_hyperparameters_abort_the_session() {
    let matrix = scenario_matrix();

    for config in [
        TrainingConfig {
            n_factors: 0,
            ..scenario_config()
        },
        TrainingConfig {
            learning_rate: -0.1,
            ..scenario_config()
        },
        TrainingConfig {
            user_bias_reg: -1.,
            ..scenario_config()
        },
    ] {
        assert!(matches!(
            train(&matrix, &config),
            Err(MfErr::InvalidConfig { .. })
        ));
    }

    assert!(matches!(
        train_basic(&matrix, 5, 2, 0., 42),
        Err(MfErr::InvalidConfig { .. })
    ));
}

#[test]
fn empty_matrix_trains_without_updates() {
    let matrix = SparseInteractionMatrix::new(2, 3, vec![0, 0, 0], vec![]).unwrap();
    let config = scenario_config();

    let output = train(&matrix, &config).unwrap();
    let initial = ModelState::init(2, 3, &config, 0.).unwrap();

    assert_eq!(&*output.losses, [0.; 5]);
    assert_eq!(output.model, initial.finalize());
}
