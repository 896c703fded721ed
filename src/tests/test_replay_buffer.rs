use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{tagged_trace, FRAME};
use crate::error::DrqnError;
use crate::replay_buffer::EpisodeRecorder;

#[test]
fn test_short_trace_is_rejected() {
    let mut recorder = EpisodeRecorder::new(10, 55);
    assert!(recorder.add(tagged_trace(60, 1.0)));
    assert!(!recorder.add(tagged_trace(54, 2.0)));
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.total_transitions(), 60);
}

#[test]
fn test_oldest_trace_is_evicted() {
    let mut recorder = EpisodeRecorder::new(2, 55);
    for tag in [1.0, 2.0, 3.0] {
        assert!(recorder.add(tagged_trace(60, tag)));
    }
    assert_eq!(recorder.len(), 2);
    let tags: Vec<f32> = recorder.iter().map(|trace| trace[0].reward).collect();
    assert_eq!(tags, vec![2.0, 3.0]);
}

#[test]
fn test_sample_returns_contiguous_windows() {
    let mut recorder = EpisodeRecorder::new(10, 4);
    recorder.add(tagged_trace(10, 1.0));
    recorder.add(tagged_trace(7, 2.0));
    let mut rng = StdRng::seed_from_u64(42);

    let batch = recorder.sample(&mut rng, 5, 4).unwrap();
    assert_eq!(batch.len(), 20);
    assert!(batch.validate().is_ok());
    assert_eq!(batch.windows().count(), 5);
    for window in batch.windows() {
        let start = window[0].action;
        for (t, transition) in window.iter().enumerate() {
            assert_eq!(transition.action, start + t);
            assert_eq!(transition.reward, window[0].reward);
        }
        // The window lies inside its trace.
        let trace_len = if window[0].reward == 1.0 { 10 } else { 7 };
        assert!(start + 4 <= trace_len);
    }
}

#[test]
fn test_sample_skips_traces_that_are_too_short() {
    let mut recorder = EpisodeRecorder::new(10, 4);
    recorder.add(tagged_trace(5, 1.0));
    recorder.add(tagged_trace(9, 2.0));
    let mut rng = StdRng::seed_from_u64(1);

    let batch = recorder.sample(&mut rng, 8, 8).unwrap();
    assert!(batch.transitions.iter().all(|t| t.reward == 2.0));
}

#[test]
fn test_sample_without_long_enough_trace_fails() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut recorder = EpisodeRecorder::new(10, 4);
    assert!(matches!(recorder.sample(&mut rng, 2, 4), Err(DrqnError::InsufficientData(_))));

    recorder.add(tagged_trace(5, 1.0));
    assert!(matches!(recorder.sample(&mut rng, 2, 6), Err(DrqnError::InsufficientData(_))));
}

#[test]
fn test_batch_columns_follow_transition_order() {
    let mut recorder = EpisodeRecorder::new(1, 3);
    recorder.add(tagged_trace(3, -1.0));
    let mut rng = StdRng::seed_from_u64(3);

    let batch = recorder.sample(&mut rng, 2, 3).unwrap();
    assert_eq!(batch.actions(), vec![0, 1, 2, 0, 1, 2]);
    assert_eq!(batch.dones(), vec![false, false, true, false, false, true]);
    assert_eq!(batch.rewards().len(), 6);

    let states = batch.states(FRAME).unwrap();
    let next_states = batch.next_states(FRAME).unwrap();
    assert_eq!(states.dim(), (6, 1, 6, 6));
    // next_state of step t is state of step t + 1
    assert_eq!(next_states.index_axis(ndarray::Axis(0), 0), states.index_axis(ndarray::Axis(0), 1));
}

#[test]
fn test_truncated_batch_fails_validation() {
    let mut recorder = EpisodeRecorder::new(1, 3);
    recorder.add(tagged_trace(3, 0.0));
    let mut rng = StdRng::seed_from_u64(3);
    let mut batch = recorder.sample(&mut rng, 2, 3).unwrap();
    batch.transitions.pop();
    assert!(batch.validate().is_err());
}
