use anyhow::{bail, Context, Result};
use clap::Parser;
use leaf_drqn::{
    checkpoint::CheckpointStore,
    config::DrqnConfig,
    env::{LeafDataset, LeafGame, LeafTestSet},
    error::DrqnError,
    inference::run_inference,
    metrics::{plot_correct_counts, plot_reward_history},
    network::DrqnNetwork,
    trainer::Trainer,
};
use std::path::PathBuf;

/// Train or run the recurrent Double-DQN leaf classifier
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Train / Test
    #[arg(short, long)]
    mode: String,

    /// YAML configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset directory with train.csv, test.csv and images/
    #[arg(long)]
    data: Option<PathBuf>,

    /// Directory of checkpoints and metrics
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Directory of the results CSV (Test mode)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<DrqnConfig> {
    let mut config = match &args.config {
        Some(path) => DrqnConfig::load(path).with_context(|| format!("reading config {}", path.display()))?,
        None => DrqnConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data.root = data.clone();
    }
    if let Some(model_dir) = &args.model_dir {
        config.training.model_dir = model_dir.clone();
    }
    if let Some(output) = &args.output {
        config.data.output_dir = output.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_dataset(config: &DrqnConfig) -> Result<LeafDataset> {
    let network = &config.network;
    let dataset = LeafDataset::open(&config.data.root, network.frame_height, network.frame_width)
        .with_context(|| format!("opening dataset in {}", config.data.root.display()))?;
    if dataset.frame_shape() != network.frame_shape_tuple() {
        bail!(
            "network expects frames {:?} but the dataset yields {:?}",
            network.frame_shape_tuple(),
            dataset.frame_shape()
        );
    }
    if dataset.num_labels() != network.num_actions {
        bail!(
            "network has {} actions but the dataset has {} species",
            network.num_actions,
            dataset.num_labels()
        );
    }
    Ok(dataset)
}

fn train(config: &DrqnConfig) -> Result<()> {
    let dataset = open_dataset(config)?;
    let game = LeafGame::new(dataset, config.data.episode_length, config.training.seed)?;
    let store = CheckpointStore::open(&config.training.model_dir, config.training.max_to_keep)?;
    config.save(store.dir().join("config.yaml"))?;

    let network = if config.training.load_model {
        log::info!("Loading Model...");
        let (id, network): (usize, DrqnNetwork) = store.load_latest().context("load_model is set")?;
        log::info!("Resuming from checkpoint {}", id);
        network
    } else {
        DrqnNetwork::new(&config.network)?
    };
    log::info!("Network with {} parameters", network.num_parameters());

    let mut trainer = Trainer::new(&config.training, game, network, Some(store))?;
    let metrics = trainer.train()?;
    println!("{}", plot_reward_history(&metrics, 64, 12));
    println!("{}", plot_correct_counts(&metrics, 64, 16));
    Ok(())
}

fn test(config: &DrqnConfig) -> Result<()> {
    let store = CheckpointStore::open(&config.training.model_dir, config.training.max_to_keep)?;
    log::info!("Loading Model...");
    let (id, mut network): (usize, DrqnNetwork) = store
        .load_latest()
        .with_context(|| format!("no usable checkpoint in {}", config.training.model_dir.display()))?;
    log::info!("Loaded checkpoint {}", id);

    let mut test_set = LeafTestSet::new(open_dataset(config)?);
    let results = run_inference(&mut test_set, &mut network)?;
    results.write_csv(&config.data.output_dir, "0")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.mode.as_str() {
        "Train" => train(&load_config(&args)?),
        "Test" => test(&load_config(&args)?),
        other => {
            println!("{}", DrqnError::InvalidMode(other.to_string()));
            Ok(())
        }
    }
}
