use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use super::{tiny_network_config, tiny_training_config, ScriptedEnv};
use crate::checkpoint::CheckpointStore;
use crate::error::DrqnError;
use crate::metrics::TrainingMetrics;
use crate::network::DrqnNetwork;
use crate::trainer::{Trainer, METRICS_FILE};

fn network() -> DrqnNetwork {
    DrqnNetwork::new_with_rng(&tiny_network_config(), &mut StdRng::seed_from_u64(30)).unwrap()
}

#[test]
fn test_warm_up_follows_the_oracle() {
    let mut trainer = Trainer::new(&tiny_training_config(), ScriptedEnv::new(3, 6), network(), None).unwrap();
    let summary = trainer.run_episode(0).unwrap();

    assert_eq!(summary.steps, 6);
    assert_eq!(summary.oracle_steps, 6);
    assert_eq!(summary.total_reward, 6.0);
    assert_eq!(summary.correct, 6);
    assert!(summary.stored);
    assert_eq!(trainer.env().actions_taken, trainer.env().oracles);
    assert_eq!(trainer.agent().train_steps, 0);
    assert_eq!(trainer.explorer().total_steps(), 6);
}

#[test]
fn test_storage_policy() {
    let mut trainer = Trainer::new(&tiny_training_config(), ScriptedEnv::new(3, 6), network(), None).unwrap();
    let stored: Vec<bool> = (0..4).map(|ep| trainer.run_episode(ep).unwrap().stored).collect();
    // num_train_episodes = 1, keep_every = 3
    assert_eq!(stored, vec![true, true, false, true]);
    assert_eq!(trainer.recorder().len(), 3);
    assert!(trainer.keeps(6));
    assert!(!trainer.keeps(7));
}

#[test]
fn test_training_and_sync_schedule() {
    let mut trainer = Trainer::new(&tiny_training_config(), ScriptedEnv::new(3, 6), network(), None).unwrap();
    let metrics = trainer.train().unwrap();

    // 24 steps, the first 6 are warm-up
    assert_eq!(trainer.agent().train_steps, 18);
    // steps 8, 12, 16, 20 and 24
    assert_eq!(trainer.agent().target_syncs, 5);
    assert_eq!(metrics.train_steps, 18);
    assert_eq!(metrics.target_syncs, 5);
    assert_eq!(metrics.episode_lengths, vec![6; 4]);
    // correct counts only after the training window
    assert_eq!(metrics.correct_counts.len(), 2);
    assert!(metrics.losses.iter().all(|l| l.is_finite()));
}

#[test]
fn test_checkpoints_and_metrics_are_written() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::open(dir.path(), 5).unwrap();
    let mut trainer = Trainer::new(&tiny_training_config(), ScriptedEnv::new(3, 6), network(), Some(store)).unwrap();
    let metrics = trainer.train().unwrap();

    let store = CheckpointStore::open(dir.path(), 5).unwrap();
    assert_eq!(store.ids(), &[2, 3]);
    let (id, restored): (usize, DrqnNetwork) = store.load_latest().unwrap();
    assert_eq!(id, 3);

    let saved = TrainingMetrics::load(dir.path().join(METRICS_FILE)).unwrap();
    assert_eq!(saved, metrics);

    // the final checkpoint holds the trained online network
    let online = trainer.into_agent().online;
    assert!(online.parameters().iter().zip(restored.parameters()).all(|(a, b)| *a == b));
}

#[test]
fn test_training_without_a_replayable_trace_fails() {
    // episodes of 3 never fill a trace of 4
    let mut trainer = Trainer::new(&tiny_training_config(), ScriptedEnv::new(3, 3), network(), None).unwrap();
    let result = trainer.train();
    assert!(matches!(result, Err(DrqnError::InsufficientData(_))));
    assert!(trainer.recorder().is_empty());
    assert_eq!(trainer.agent().train_steps, 0);
    // the first training step comes right after the 6 warm-up steps
    assert_eq!(trainer.explorer().total_steps(), 7);
}

#[test]
fn test_warm_up_shorter_than_an_episode_is_rejected() {
    let config = tiny_training_config().pre_train_steps(5);
    let result = Trainer::new(&config, ScriptedEnv::new(3, 6), network(), None);
    assert!(matches!(result, Err(DrqnError::InvalidParameter { .. })));
}

#[test]
fn test_mismatched_action_counts_are_rejected() {
    let result = Trainer::new(&tiny_training_config(), ScriptedEnv::new(4, 6), network(), None);
    assert!(result.is_err());
}
