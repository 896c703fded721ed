use crate::metrics::tracker::TrainingMetrics;

/// Plot the correct counts of the evaluated episodes as ASCII art
pub fn plot_correct_counts(metrics: &TrainingMetrics, width: usize, height: usize) -> String {
    if metrics.correct_counts.is_empty() {
        return "No correct counts recorded".to_string();
    }

    let counts: Vec<f32> = metrics.correct_counts.iter().map(|&c| c as f32).collect();
    plot_series(&counts, "Number ID'ed Correctly Throughout Training", width, height)
}

/// Plot reward history as ASCII art
pub fn plot_reward_history(metrics: &TrainingMetrics, width: usize, height: usize) -> String {
    if metrics.episode_rewards.is_empty() {
        return "No reward data available".to_string();
    }

    plot_series(&metrics.episode_rewards, "Episode Rewards", width, height)
}

/// Generic series plotter
pub fn plot_series(values: &[f32], title: &str, width: usize, height: usize) -> String {
    if values.is_empty() || width < 10 || height < 5 {
        return format!("{}: Invalid data or dimensions", title);
    }

    let min_val = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if (max_val - min_val).abs() < f32::EPSILON {
        return format!("{}: All values are {:.4}", title, min_val);
    }

    let mut plot = vec![vec![' '; width]; height];

    for row in plot.iter_mut() {
        row[0] = '|';
    }
    for cell in plot[height - 1].iter_mut() {
        *cell = '-';
    }
    plot[height - 1][0] = '+';

    let x_scale = (values.len().max(2) - 1) as f32 / (width - 3) as f32;
    let y_scale = (height - 3) as f32 / (max_val - min_val);

    for (i, &value) in values.iter().enumerate() {
        let x = ((i as f32 / x_scale) as usize + 2).min(width - 1);
        let offset = ((value - min_val) * y_scale) as usize;
        let y = (height - 3).saturating_sub(offset).min(height - 2);
        plot[y][x] = '*';
    }

    let mut output = format!("{}\n", title);
    output.push_str(&format!("Max: {:.4}\n", max_val));

    for row in plot.iter() {
        output.push_str(&row.iter().collect::<String>());
        output.push('\n');
    }

    output.push_str(&format!("Min: {:.4}\n", min_val));
    output.push_str(&format!("Points: {}\n", values.len()));

    output
}

/// Create a summary table of metrics
pub fn metrics_summary(metrics: &TrainingMetrics) -> String {
    let mut output = String::new();
    output.push_str("Training Metrics Summary\n");
    output.push_str("========================\n");
    output.push_str(&format!(
        "Episodes: {}, training steps: {}, target syncs: {}\n",
        metrics.episode_rewards.len(),
        metrics.train_steps,
        metrics.target_syncs
    ));

    if !metrics.losses.is_empty() {
        let recent_loss = metrics.losses.back().copied().unwrap_or(0.0);
        let avg_loss = metrics.losses.iter().sum::<f32>() / metrics.losses.len() as f32;
        output.push_str(&format!("Loss: Current={:.4}, Average={:.4}\n", recent_loss, avg_loss));
    }

    if !metrics.episode_rewards.is_empty() {
        let recent_reward = metrics.episode_rewards.last().copied().unwrap_or(0.0);
        let avg_reward = metrics.episode_rewards.iter().sum::<f32>() / metrics.episode_rewards.len() as f32;
        let max_reward = metrics.episode_rewards.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        output.push_str(&format!(
            "Rewards: Current={:.2}, Average={:.2}, Max={:.2}\n",
            recent_reward, avg_reward, max_reward
        ));
    }

    if !metrics.correct_counts.is_empty() {
        let avg = metrics.correct_counts.iter().sum::<usize>() as f32 / metrics.correct_counts.len() as f32;
        let best = metrics.correct_counts.iter().copied().max().unwrap_or(0);
        output.push_str(&format!("Correct: Average={:.2}, Best={}\n", avg, best));
    }

    output
}
