//! The episode loop.
//!
//! Each episode resets the environment and the recurrent state, then steps
//! frame by frame: the online network always runs forward on the current
//! frame, the selector picks the oracle, a random or the greedy action, and
//! the transition is kept in the episode trace. Once warm-up is over the
//! target network is synchronised and the online network trained on their
//! schedules. Finished traces go to the episode recorder.
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::agent::{ActionSource, DrqnAgent, EpsilonGreedy, RecurrentQNetwork};
use crate::checkpoint::CheckpointStore;
use crate::config::TrainingConfig;
use crate::env::TrainingEnvironment;
use crate::error::{DrqnError, Result};
use crate::metrics::{correct_from_reward, metrics_summary, MetricsTracker, TrainingMetrics};
use crate::replay_buffer::{EpisodeRecorder, Transition};

pub const METRICS_FILE: &str = "metrics.json";

/// What happened in one episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f32,
    /// Correct count implied by the reward
    pub correct: usize,
    /// Whether the trace went into the episode recorder
    pub stored: bool,
    /// Number of steps whose action came from the oracle
    pub oracle_steps: usize,
}

/// Owns the environment, both networks, the selector and the recorder.
pub struct Trainer<E, Q>
where
    E: TrainingEnvironment,
    Q: RecurrentQNetwork,
{
    config: TrainingConfig,
    env: E,
    agent: DrqnAgent<Q>,
    explorer: EpsilonGreedy,
    recorder: EpisodeRecorder,
    tracker: MetricsTracker,
    checkpoints: Option<CheckpointStore>,
    rng: StdRng,
}

impl<E, Q> Trainer<E, Q>
where
    E: TrainingEnvironment,
    Q: RecurrentQNetwork + Serialize,
{
    /// Build a trainer; checkpoints are only written when a store is given.
    pub fn new(config: &TrainingConfig, env: E, network: Q, checkpoints: Option<CheckpointStore>) -> Result<Self> {
        config.validate()?;
        if network.num_actions() != env.num_actions() {
            return Err(DrqnError::dimension_mismatch(
                format!("{} network actions", env.num_actions()),
                format!("{}", network.num_actions()),
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Trainer {
            config: config.clone(),
            env,
            agent: DrqnAgent::new(network, config),
            explorer: EpsilonGreedy::from_config(config),
            recorder: EpisodeRecorder::new(config.recorder_capacity, config.trace_length),
            tracker: MetricsTracker::default(),
            checkpoints,
            rng,
        })
    }

    pub fn agent(&self) -> &DrqnAgent<Q> {
        &self.agent
    }

    pub fn explorer(&self) -> &EpsilonGreedy {
        &self.explorer
    }

    pub fn recorder(&self) -> &EpisodeRecorder {
        &self.recorder
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        self.tracker.metrics()
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Run all configured episodes, checkpointing on the way and once at
    /// the end.
    pub fn train(&mut self) -> Result<TrainingMetrics> {
        let num_episodes = self.config.num_episodes;
        for episode in 0..num_episodes {
            self.run_episode(episode)?;

            if episode % self.config.checkpoint_interval == 0 && episode != 0 {
                self.save_checkpoint(episode)?;
            }
        }

        if num_episodes > 0 {
            self.save_checkpoint(num_episodes - 1)?;
        }
        let metrics = self.tracker.metrics().clone();
        if let Some(store) = &self.checkpoints {
            metrics.save(store.dir().join(METRICS_FILE))?;
        }
        info!("{}", metrics_summary(&metrics));
        Ok(metrics)
    }

    /// Play one episode and file its trace.
    pub fn run_episode(&mut self, episode: usize) -> Result<EpisodeSummary> {
        self.tracker.start_episode();
        let (mut frame, mut oracle) = self.env.reset()?;
        let mut state = self.agent.initial_state();
        let mut trace: Vec<Transition> = Vec::with_capacity(self.config.max_episode_length);
        let mut oracle_steps = 0;

        while trace.len() < self.config.max_episode_length {
            let (q_values, next_state) = self.agent.observe(&frame, &state)?;
            let (action, source) = self.explorer.select(&mut self.rng, q_values.view(), oracle)?;
            if source == ActionSource::Oracle {
                oracle_steps += 1;
            }

            let outcome = self.env.step(action)?;
            trace.push(Transition {
                state: frame,
                action,
                reward: outcome.reward,
                next_state: outcome.next_frame.clone(),
                done: outcome.done,
            });
            self.tracker.step(outcome.reward);

            if self.explorer.advance() {
                self.after_warm_up_step()?;
            }

            frame = outcome.next_frame;
            oracle = outcome.oracle;
            state = next_state;
            if outcome.done {
                break;
            }
        }

        let steps = trace.len();
        let stored = if trace.len() >= self.config.trace_length && !self.keeps(episode) {
            debug!("Episode {} not kept for replay", episode);
            false
        } else {
            // Short traces are rejected (and reported) by the recorder.
            self.recorder.add(trace)
        };

        let total_reward = self.tracker.current_episode_reward();
        let correct = correct_from_reward(total_reward, self.config.max_episode_length);
        let counted = (episode > self.config.num_train_episodes).then(|| correct);
        self.tracker.end_episode(self.explorer.epsilon(), counted);

        info!(
            "Completed episode {} with {} correctly identified (reward {}, epsilon {:.3})",
            episode,
            correct,
            total_reward,
            self.explorer.epsilon()
        );
        if let Some(loss) = self.tracker.avg_loss(100) {
            debug!("Average loss over the last 100 updates: {:.6}", loss);
        }
        Ok(EpisodeSummary { episode, steps, total_reward, correct, stored, oracle_steps })
    }

    /// Target sync and training, on their schedules in environment steps.
    /// An empty recorder at this point is an error: warm-up must have filed
    /// at least one replayable trace.
    fn after_warm_up_step(&mut self) -> Result<()> {
        let total_steps = self.explorer.total_steps();
        if total_steps % self.config.target_sync_steps() == 0 {
            self.agent.sync_target();
            self.tracker.record_target_sync();
        }
        if total_steps % self.config.update_freq == 0 {
            let batch = self.recorder.sample(&mut self.rng, self.config.batch_size, self.config.trace_length)?;
            let loss = self.agent.train_on_batch(&batch)?;
            self.tracker.record_loss(loss);
        }
        Ok(())
    }

    /// Whether the trace of `episode` is stored for replay.
    pub fn keeps(&self, episode: usize) -> bool {
        episode <= self.config.num_train_episodes || episode % self.config.keep_every == 0
    }

    fn save_checkpoint(&mut self, episode: usize) -> Result<()> {
        if let Some(store) = self.checkpoints.as_mut() {
            store.save(&self.agent.online, episode)?;
        }
        Ok(())
    }

    pub fn into_agent(self) -> DrqnAgent<Q> {
        self.agent
    }
}
