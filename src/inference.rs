use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::RecurrentQNetwork;
use crate::env::InferenceEnvironment;
use crate::error::{DrqnError, Result};
use crate::network::single_frame;

/// Raw Q-values of one processed item.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceRecord {
    pub item_id: String,
    pub q_values: Vec<f32>,
}

/// All records of one run, with the label of every Q-value column.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceResults {
    pub labels: Vec<String>,
    pub records: Vec<InferenceRecord>,
}

/// Feed every item of `env` through `network` once, carrying the recurrent
/// state from item to item.
pub fn run_inference<E, Q>(env: &mut E, network: &mut Q) -> Result<InferenceResults>
where
    E: InferenceEnvironment,
    Q: RecurrentQNetwork,
{
    let start = env.reset()?;
    if start.labels.len() != network.num_actions() {
        return Err(DrqnError::dimension_mismatch(
            format!("{} labels", network.num_actions()),
            format!("{}", start.labels.len()),
        ));
    }

    let mut frame = start.frame;
    let mut item_id = start.item_id;
    let mut state = network.initial_state(1);
    let mut records = Vec::with_capacity(start.num_steps);

    for step in 1..=start.num_steps {
        let prediction = network.predict(single_frame(&frame).view(), 1, &state)?;
        records.push(InferenceRecord {
            item_id: item_id.clone(),
            q_values: prediction.q_values.row(0).to_vec(),
        });

        if step < start.num_steps {
            let (next_frame, next_id) = env.step(prediction.actions[0])?;
            frame = next_frame;
            item_id = next_id;
        }
        state = prediction.state;
    }

    info!("Completed processing {} test images", records.len());
    Ok(InferenceResults { labels: start.labels, records })
}

impl InferenceResults {
    /// Write `results-<run>.csv` into `dir`: header `id,<labels…>`, then
    /// one row of raw Q-values per item.
    pub fn write_csv(&self, dir: impl AsRef<Path>, run: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("results-{}.csv", run));

        let mut writer = csv::Writer::from_path(&path)?;
        let mut header = Vec::with_capacity(self.labels.len() + 1);
        header.push("id".to_string());
        header.extend(self.labels.iter().cloned());
        writer.write_record(&header)?;

        for record in &self.records {
            if record.q_values.len() != self.labels.len() {
                return Err(DrqnError::dimension_mismatch(
                    format!("{} values for item {}", self.labels.len(), record.item_id),
                    format!("{}", record.q_values.len()),
                ));
            }
            let mut row = Vec::with_capacity(record.q_values.len() + 1);
            row.push(record.item_id.clone());
            row.extend(record.q_values.iter().map(|q| q.to_string()));
            writer.write_record(&row)?;
        }
        writer.flush()?;

        info!("Wrote {} results to {}", self.records.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn csv_has_header_and_one_row_per_item() -> Result<()> {
        let results = InferenceResults {
            labels: vec!["Acer".to_string(), "Quercus".to_string()],
            records: vec![
                InferenceRecord { item_id: "4".to_string(), q_values: vec![0.5, -1.0] },
                InferenceRecord { item_id: "7".to_string(), q_values: vec![2.0, 0.25] },
            ],
        };
        let dir = TempDir::new()?;
        let path = results.write_csv(dir.path(), "0")?;
        assert!(path.ends_with("results-0.csv"));
        let text = std::fs::read_to_string(path)?;
        assert_eq!(text, "id,Acer,Quercus\n4,0.5,-1\n7,2,0.25\n");
        Ok(())
    }
}
