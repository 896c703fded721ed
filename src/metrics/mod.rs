pub mod plot;
pub mod tracker;

pub use plot::{metrics_summary, plot_correct_counts, plot_reward_history, plot_series};
pub use tracker::{correct_from_reward, MetricsTracker, TrainingMetrics};
