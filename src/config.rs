//! Hyperparameters of the leaf classifier.
//!
//! A [`DrqnConfig`] is read once (from YAML or the defaults) and then passed
//! by reference into the network, agent and trainer; nothing mutates it.
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use crate::activations::Activation;
use crate::error::{DrqnError, Result};
use crate::optimizer::{GradientClipper, OptimizerConfig};

/// How the target network follows the online network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum TargetUpdate {
    /// Copy every online parameter into the target.
    Hard,
    /// Polyak averaging `θ_t ← τ θ_o + (1 − τ) θ_t`.
    Soft { tau: f32 },
}

impl Default for TargetUpdate {
    fn default() -> Self {
        TargetUpdate::Hard
    }
}

/// Configuration of the episode loop and the Double-DQN update.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of traces per training batch.
    pub batch_size: usize,

    /// Length of every sampled trace.
    pub trace_length: usize,

    /// Interval of training steps in environment steps.
    pub update_freq: usize,

    /// Discount factor of the target Q-values.
    pub discount: f32,

    /// Starting chance of a random action.
    pub start_e: f32,

    /// Final chance of a random action.
    pub end_e: f32,

    /// Environment steps to anneal epsilon from `start_e` to `end_e`.
    pub annealing_steps: usize,

    /// Number of episodes to run.
    pub num_episodes: usize,

    /// Episodes whose traces are always stored.
    pub num_train_episodes: usize,

    /// Maximum number of steps in one episode.
    pub max_episode_length: usize,

    /// Environment steps driven by the oracle before training starts.
    pub pre_train_steps: usize,

    /// Target sync interval, counted in training steps.
    pub target_sync_interval: usize,

    pub target_update: TargetUpdate,

    /// After the training window, only every `keep_every`-th episode is stored.
    pub keep_every: usize,

    /// Maximum number of traces held by the episode recorder.
    pub recorder_capacity: usize,

    /// Interval of saving the online network, in episodes.
    pub checkpoint_interval: usize,

    /// Number of checkpoints kept on disk.
    pub max_to_keep: usize,

    /// Directory of checkpoints and metrics.
    pub model_dir: PathBuf,

    /// Resume from the newest checkpoint in `model_dir`.
    pub load_model: bool,

    /// Seed of the trainer's random number generator.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let num_train_episodes = 50;
        let max_episode_length = 64;
        Self {
            batch_size: 8,
            trace_length: 55,
            update_freq: 1,
            discount: 0.99,
            start_e: 1.0,
            end_e: 0.1,
            annealing_steps: 10000,
            num_episodes: 150,
            num_train_episodes,
            max_episode_length,
            pre_train_steps: num_train_episodes * max_episode_length,
            target_sync_interval: 100,
            target_update: TargetUpdate::Hard,
            keep_every: 7,
            recorder_capacity: 1000,
            checkpoint_interval: 64,
            max_to_keep: 5,
            model_dir: PathBuf::from("./drqn"),
            load_model: false,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Sets the number of traces per batch.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the trace length.
    pub fn trace_length(mut self, v: usize) -> Self {
        self.trace_length = v;
        self
    }

    pub fn update_freq(mut self, v: usize) -> Self {
        self.update_freq = v;
        self
    }

    pub fn discount(mut self, v: f32) -> Self {
        self.discount = v;
        self
    }

    /// Sets the epsilon schedule.
    pub fn epsilon(mut self, start_e: f32, end_e: f32, annealing_steps: usize) -> Self {
        self.start_e = start_e;
        self.end_e = end_e;
        self.annealing_steps = annealing_steps;
        self
    }

    pub fn num_episodes(mut self, v: usize) -> Self {
        self.num_episodes = v;
        self
    }

    pub fn num_train_episodes(mut self, v: usize) -> Self {
        self.num_train_episodes = v;
        self
    }

    pub fn max_episode_length(mut self, v: usize) -> Self {
        self.max_episode_length = v;
        self
    }

    /// Sets the warm-up period in environment steps.
    pub fn pre_train_steps(mut self, v: usize) -> Self {
        self.pre_train_steps = v;
        self
    }

    pub fn target_sync_interval(mut self, v: usize) -> Self {
        self.target_sync_interval = v;
        self
    }

    pub fn target_update(mut self, v: TargetUpdate) -> Self {
        self.target_update = v;
        self
    }

    pub fn keep_every(mut self, v: usize) -> Self {
        self.keep_every = v;
        self
    }

    pub fn recorder_capacity(mut self, v: usize) -> Self {
        self.recorder_capacity = v;
        self
    }

    /// Sets the interval of saving in episodes.
    pub fn checkpoint_interval(mut self, v: usize) -> Self {
        self.checkpoint_interval = v;
        self
    }

    pub fn max_to_keep(mut self, v: usize) -> Self {
        self.max_to_keep = v;
        self
    }

    pub fn model_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.model_dir = v.into();
        self
    }

    pub fn load_model(mut self, v: bool) -> Self {
        self.load_model = v;
        self
    }

    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
    }

    /// Environment steps between two target synchronisations.
    pub fn target_sync_steps(&self) -> usize {
        self.update_freq * self.target_sync_interval
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("trace_length", self.trace_length),
            ("update_freq", self.update_freq),
            ("max_episode_length", self.max_episode_length),
            ("target_sync_interval", self.target_sync_interval),
            ("keep_every", self.keep_every),
            ("recorder_capacity", self.recorder_capacity),
            ("checkpoint_interval", self.checkpoint_interval),
            ("max_to_keep", self.max_to_keep),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(DrqnError::invalid_parameter(name, "must be positive"));
            }
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(DrqnError::invalid_parameter(
                "discount".to_string(),
                format!("must lie in [0, 1], got {}", self.discount),
            ));
        }
        if !(0.0..=1.0).contains(&self.start_e) || !(0.0..=1.0).contains(&self.end_e) || self.end_e > self.start_e {
            return Err(DrqnError::invalid_parameter(
                "epsilon".to_string(),
                format!("need 0 <= end_e <= start_e <= 1, got {} -> {}", self.start_e, self.end_e),
            ));
        }
        if let TargetUpdate::Soft { tau } = self.target_update {
            if !(tau > 0.0 && tau <= 1.0) {
                return Err(DrqnError::invalid_parameter(
                    "tau".to_string(),
                    format!("must lie in (0, 1], got {}", tau),
                ));
            }
        }
        if self.trace_length > self.max_episode_length {
            return Err(DrqnError::invalid_parameter(
                "trace_length".to_string(),
                format!(
                    "{} exceeds max_episode_length {}, no episode could ever be stored",
                    self.trace_length, self.max_episode_length
                ),
            ));
        }
        if self.pre_train_steps < self.max_episode_length {
            return Err(DrqnError::invalid_parameter(
                "pre_train_steps".to_string(),
                format!(
                    "{} ends before the first episode of up to {} steps is stored",
                    self.pre_train_steps, self.max_episode_length
                ),
            ));
        }
        Ok(())
    }
}

/// One convolution of the frame encoder.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub struct ConvSpec {
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
}

/// Architecture and optimisation settings of the recurrent Q-network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of actions, one per species.
    pub num_actions: usize,

    pub frame_channels: usize,
    pub frame_height: usize,
    pub frame_width: usize,

    pub conv_layers: Vec<ConvSpec>,

    /// Width of the projection and the LSTM; split in halves for the
    /// advantage and value streams.
    pub hidden_size: usize,

    /// Activation of the convolutions and the projection.
    pub activation: Activation,

    pub learning_rate: f32,
    pub optimizer: OptimizerConfig,
    pub clipper: GradientClipper,

    /// Leading steps of every trace excluded from the loss.
    pub masked_steps: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_actions: 99,
            frame_channels: 1,
            frame_height: 64,
            frame_width: 64,
            conv_layers: vec![
                ConvSpec { out_channels: 32, kernel_size: 8, stride: 4 },
                ConvSpec { out_channels: 64, kernel_size: 4, stride: 2 },
                ConvSpec { out_channels: 64, kernel_size: 3, stride: 1 },
            ],
            hidden_size: 504,
            activation: Activation::Relu,
            learning_rate: 1e-4,
            optimizer: OptimizerConfig::default(),
            clipper: GradientClipper::None,
            masked_steps: 0,
        }
    }
}

impl NetworkConfig {
    pub fn num_actions(mut self, v: usize) -> Self {
        self.num_actions = v;
        self
    }

    /// Sets the frame shape `[channels, height, width]`.
    pub fn frame_shape(mut self, channels: usize, height: usize, width: usize) -> Self {
        self.frame_channels = channels;
        self.frame_height = height;
        self.frame_width = width;
        self
    }

    pub fn conv_layers(mut self, v: Vec<ConvSpec>) -> Self {
        self.conv_layers = v;
        self
    }

    pub fn hidden_size(mut self, v: usize) -> Self {
        self.hidden_size = v;
        self
    }

    pub fn activation(mut self, v: Activation) -> Self {
        self.activation = v;
        self
    }

    pub fn learning_rate(mut self, v: f32) -> Self {
        self.learning_rate = v;
        self
    }

    pub fn optimizer(mut self, v: OptimizerConfig) -> Self {
        self.optimizer = v;
        self
    }

    pub fn clipper(mut self, v: GradientClipper) -> Self {
        self.clipper = v;
        self
    }

    pub fn masked_steps(mut self, v: usize) -> Self {
        self.masked_steps = v;
        self
    }

    pub fn frame_shape_tuple(&self) -> (usize, usize, usize) {
        (self.frame_channels, self.frame_height, self.frame_width)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_actions == 0 {
            return Err(DrqnError::invalid_parameter("num_actions", "must be positive"));
        }
        if self.frame_channels == 0 || self.frame_height == 0 || self.frame_width == 0 {
            return Err(DrqnError::invalid_parameter("frame shape", "all dimensions must be positive"));
        }
        if self.hidden_size < 2 || self.hidden_size % 2 != 0 {
            return Err(DrqnError::invalid_parameter(
                "hidden_size".to_string(),
                format!("must be even to split into advantage and value streams, got {}", self.hidden_size),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(DrqnError::invalid_parameter("learning_rate", "must be positive"));
        }
        for spec in &self.conv_layers {
            if spec.out_channels == 0 || spec.kernel_size == 0 || spec.stride == 0 {
                return Err(DrqnError::invalid_parameter(
                    "conv_layers".to_string(),
                    format!("invalid layer {:?}", spec),
                ));
            }
        }
        Ok(())
    }
}

/// Location and frame size of the leaf dataset.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding `train.csv`, `test.csv` and `images/`.
    pub root: PathBuf,

    /// Number of images shown in one training episode.
    pub episode_length: usize,

    /// Directory of the inference results.
    pub output_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            episode_length: 64,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Complete configuration, as stored in a YAML file.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct DrqnConfig {
    pub training: TrainingConfig,
    pub network: NetworkConfig,
    pub data: DataConfig,
}

impl DrqnConfig {
    pub fn training(mut self, v: TrainingConfig) -> Self {
        self.training = v;
        self
    }

    pub fn network(mut self, v: NetworkConfig) -> Self {
        self.network = v;
        self
    }

    pub fn data(mut self, v: DataConfig) -> Self {
        self.data = v;
        self
    }

    /// Constructs [`DrqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Ok(config)
    }

    /// Saves [`DrqnConfig`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.network.validate()?;
        if self.network.masked_steps >= self.training.trace_length {
            return Err(DrqnError::invalid_parameter(
                "masked_steps".to_string(),
                format!(
                    "{} would mask whole traces of length {}",
                    self.network.masked_steps, self.training.trace_length
                ),
            ));
        }
        if self.data.episode_length < self.training.trace_length {
            return Err(DrqnError::invalid_parameter(
                "episode_length".to_string(),
                format!(
                    "{} is shorter than trace_length {}, no episode could be replayed",
                    self.data.episode_length, self.training.trace_length
                ),
            ));
        }
        Ok(())
    }
}
