use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agent::{ActionSource, EpsilonGreedy};
use crate::config::TrainingConfig;

#[test]
fn test_oracle_drives_warm_up() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut explorer = EpsilonGreedy::new(1.0, 0.1, 1000, 100);
    let q_values = Array1::from_vec(vec![0.0, 1.0, 0.0, 0.0, 0.0]);

    for step in 0..100 {
        assert_eq!(explorer.total_steps(), step);
        let oracle = step % 5;
        let (action, source) = explorer.select(&mut rng, q_values.view(), oracle).unwrap();
        assert_eq!(action, oracle);
        assert_eq!(source, ActionSource::Oracle);
        explorer.advance();
    }
    assert!(!explorer.in_warm_up());
    let (_, source) = explorer.select(&mut rng, q_values.view(), 0).unwrap();
    assert_ne!(source, ActionSource::Oracle);
}

#[test]
fn test_epsilon_constant_during_warm_up() {
    let mut explorer = EpsilonGreedy::new(1.0, 0.1, 10, 50);
    for _ in 0..50 {
        assert!(!explorer.advance());
        assert_eq!(explorer.epsilon(), 1.0);
    }
    assert!(explorer.advance());
    assert!(explorer.epsilon() < 1.0);
}

#[test]
fn test_epsilon_anneals_to_floor() {
    let mut explorer = EpsilonGreedy::new(1.0, 0.1, 10, 0);
    let mut previous = explorer.epsilon();
    for _ in 0..100 {
        explorer.advance();
        assert!(explorer.epsilon() <= previous);
        assert!(explorer.epsilon() >= 0.1);
        previous = explorer.epsilon();
    }
    assert!((explorer.epsilon() - 0.1).abs() < 1e-6);
}

#[test]
fn test_random_actions_stay_in_range() {
    let mut rng = StdRng::seed_from_u64(5);
    let explorer = EpsilonGreedy::new(1.0, 1.0, 1, 0);
    let q_values = Array1::zeros(4);
    for _ in 0..50 {
        let (action, source) = explorer.select(&mut rng, q_values.view(), 0).unwrap();
        assert!(action < 4);
        assert_eq!(source, ActionSource::Random);
    }
}

#[test]
fn test_out_of_range_oracle_is_rejected() {
    let mut rng = StdRng::seed_from_u64(5);
    let explorer = EpsilonGreedy::new(1.0, 0.1, 10, 10);
    assert!(explorer.select(&mut rng, Array1::zeros(3).view(), 3).is_err());
}

#[test]
fn test_default_schedule() {
    let explorer = EpsilonGreedy::from_config(&TrainingConfig::default());
    assert!(explorer.in_warm_up());
    assert_eq!(explorer.epsilon(), 1.0);
}
