use criterion::{black_box, criterion_group, criterion_main, Criterion};
use leaf_drqn::agent::RecurrentQNetwork;
use leaf_drqn::config::NetworkConfig;
use leaf_drqn::network::DrqnNetwork;
use leaf_drqn::replay_buffer::{EpisodeRecorder, Transition};
use ndarray::{Array3, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn filled_recorder() -> EpisodeRecorder {
    let mut recorder = EpisodeRecorder::new(1000, 55);
    for episode in 0..200 {
        let frames: Vec<Arc<Array3<f32>>> = (0..=64)
            .map(|t| Arc::new(Array3::from_elem((1, 64, 64), (episode + t) as f32 / 300.0)))
            .collect();
        let trace = (0..64)
            .map(|t| Transition {
                state: Arc::clone(&frames[t]),
                action: t % 99,
                reward: if t % 3 == 0 { 1.0 } else { -1.0 },
                next_state: Arc::clone(&frames[t + 1]),
                done: t == 63,
            })
            .collect();
        recorder.add(trace);
    }
    recorder
}

fn bench_sampling(c: &mut Criterion) {
    let recorder = filled_recorder();
    let mut rng = StdRng::seed_from_u64(0);

    c.bench_function("sample 8x55 traces", |b| {
        b.iter(|| recorder.sample(&mut rng, black_box(8), black_box(55)))
    });

    let batch = recorder.sample(&mut rng, 8, 55).unwrap();
    c.bench_function("stack 440 frames", |b| b.iter(|| batch.states(black_box((1, 64, 64)))));
}

fn bench_network(c: &mut Criterion) {
    let mut network = DrqnNetwork::new_with_rng(&NetworkConfig::default(), &mut StdRng::seed_from_u64(1)).unwrap();
    let frame = Array4::from_elem((1, 1, 64, 64), 0.5);
    let state = network.initial_state(1);

    c.bench_function("single step forward", |b| {
        b.iter(|| network.evaluate(black_box(frame.view()), 1, &state))
    });
}

criterion_group!(benches, bench_sampling, bench_network);
criterion_main!(benches);
