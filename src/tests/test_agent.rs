use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{frame, tagged_trace, tiny_network_config, tiny_training_config, FRAME};
use crate::agent::DrqnAgent;
use crate::config::TargetUpdate;
use crate::error::DrqnError;
use crate::network::DrqnNetwork;
use crate::replay_buffer::EpisodeRecorder;

fn agent() -> DrqnAgent<DrqnNetwork> {
    let network = DrqnNetwork::new_with_rng(&tiny_network_config(), &mut StdRng::seed_from_u64(12)).unwrap();
    DrqnAgent::new(network, &tiny_training_config())
}

fn same_parameters(a: &DrqnNetwork, b: &DrqnNetwork) -> bool {
    a.parameters().iter().zip(b.parameters()).all(|(x, y)| *x == y)
}

fn recorder_with(action_cap: usize) -> EpisodeRecorder {
    let mut recorder = EpisodeRecorder::new(10, 4);
    for tag in [1.0, -1.0] {
        let mut trace = tagged_trace(6, tag);
        for transition in trace.iter_mut() {
            transition.action %= action_cap;
        }
        recorder.add(trace);
    }
    recorder
}

#[test]
fn test_target_starts_as_copy() {
    let agent = agent();
    assert!(same_parameters(&agent.online, &agent.target));
    assert_eq!(agent.train_steps, 0);
    assert_eq!(agent.target_syncs, 0);
}

#[test]
fn test_training_moves_online_only_until_sync() {
    let mut agent = agent();
    let recorder = recorder_with(3);
    let mut rng = StdRng::seed_from_u64(1);

    let batch = recorder.sample(&mut rng, 2, 4).unwrap();
    let loss = agent.train_on_batch(&batch).unwrap();
    assert!(loss.is_finite());
    assert_eq!(agent.train_steps, 1);
    assert!(!same_parameters(&agent.online, &agent.target));

    agent.sync_target();
    assert!(same_parameters(&agent.online, &agent.target));
    assert_eq!(agent.target_syncs, 1);
}

#[test]
fn test_soft_sync_moves_target_partway() {
    let mut agent = agent();
    agent.target_update = TargetUpdate::Soft { tau: 0.5 };
    let recorder = recorder_with(3);
    let mut rng = StdRng::seed_from_u64(2);
    let batch = recorder.sample(&mut rng, 2, 4).unwrap();
    agent.train_on_batch(&batch).unwrap();

    let before = agent.target.clone();
    agent.sync_target();
    assert!(!same_parameters(&agent.target, &before));
    assert!(!same_parameters(&agent.target, &agent.online));
}

#[test]
fn test_out_of_range_action_is_rejected() {
    let mut agent = agent();
    // tagged traces take actions 0..6, the network has 3
    let recorder = recorder_with(6);
    let mut rng = StdRng::seed_from_u64(3);
    let batch = recorder.sample(&mut rng, 4, 4).unwrap();
    assert!(matches!(agent.train_on_batch(&batch), Err(DrqnError::InvalidAction { .. })));
    assert_eq!(agent.train_steps, 0);
}

#[test]
fn test_malformed_batch_is_rejected() {
    let mut agent = agent();
    let recorder = recorder_with(3);
    let mut rng = StdRng::seed_from_u64(4);
    let mut batch = recorder.sample(&mut rng, 2, 4).unwrap();
    batch.transitions.truncate(5);
    assert!(agent.train_on_batch(&batch).is_err());
    assert_eq!(agent.train_steps, 0);
}

#[test]
fn test_observe_threads_state() {
    let mut agent = agent();
    let state = agent.initial_state();
    assert_eq!(state.batch_size(), 1);

    let first = frame(0.3);
    let (q, next) = agent.observe(&first, &state).unwrap();
    assert_eq!(q.len(), 3);
    assert_eq!(next.batch_size(), 1);

    let (q_again, _) = agent.observe(&first, &state).unwrap();
    assert_eq!(q, q_again);
    assert_eq!(first.dim(), FRAME);
}
