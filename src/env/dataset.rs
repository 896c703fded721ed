use image::imageops::FilterType;
use log::{debug, info};
use ndarray::Array3;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{DrqnError, Result};
use crate::replay_buffer::Frame;

/// A labelled training image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafImage {
    pub id: String,
    pub label: usize,
}

#[derive(Debug, Deserialize)]
struct TrainRow {
    id: String,
    species: String,
}

#[derive(Debug, Deserialize)]
struct TestRow {
    id: String,
}

/// Leaf images in the Kaggle leaf-classification layout:
///
/// ```text
/// <root>/train.csv     id,species,...
/// <root>/test.csv      id,...
/// <root>/images/<id>.jpg
/// ```
///
/// Labels are the sorted distinct species of `train.csv`; action `k` means
/// species `labels[k]`. Images are decoded on first use, converted to
/// grayscale, resized to the frame size and scaled to `[0, 1]`.
pub struct LeafDataset {
    root: PathBuf,
    height: usize,
    width: usize,
    labels: Vec<String>,
    train: Vec<LeafImage>,
    test: Vec<String>,
    cache: HashMap<String, Arc<Frame>>,
}

impl LeafDataset {
    /// Read the CSV indexes under `root`. A missing `test.csv` yields an
    /// empty test set.
    pub fn open(root: impl AsRef<Path>, height: usize, width: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if height == 0 || width == 0 {
            return Err(DrqnError::invalid_parameter("frame size", "must be positive"));
        }

        let mut rows = Vec::new();
        let mut reader = csv::Reader::from_path(root.join("train.csv"))?;
        for row in reader.deserialize() {
            let row: TrainRow = row?;
            rows.push(row);
        }
        let labels: Vec<String> = rows
            .iter()
            .map(|r| r.species.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&str, usize> = labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
        let train = rows
            .iter()
            .map(|r| LeafImage { id: r.id.clone(), label: index[r.species.as_str()] })
            .collect();

        let test_path = root.join("test.csv");
        let mut test = Vec::new();
        if test_path.exists() {
            let mut reader = csv::Reader::from_path(test_path)?;
            for row in reader.deserialize() {
                let row: TestRow = row?;
                test.push(row.id);
            }
        }

        let dataset = LeafDataset { root, height, width, labels, train, test, cache: HashMap::new() };
        info!(
            "Loaded leaf dataset: {} species, {} training and {} test images",
            dataset.labels.len(),
            dataset.train.len(),
            dataset.test.len()
        );
        Ok(dataset)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn train(&self) -> &[LeafImage] {
        &self.train
    }

    pub fn test_ids(&self) -> &[String] {
        &self.test
    }

    /// Frame shape `[1, height, width]`.
    pub fn frame_shape(&self) -> (usize, usize, usize) {
        (1, self.height, self.width)
    }

    pub fn image_path(&self, id: &str) -> PathBuf {
        self.root.join("images").join(format!("{}.jpg", id))
    }

    /// Decoded frame of image `id`, cached after the first call.
    pub fn frame(&mut self, id: &str) -> Result<Arc<Frame>> {
        if let Some(frame) = self.cache.get(id) {
            return Ok(Arc::clone(frame));
        }
        let path = self.image_path(id);
        debug!("Decoding {}", path.display());
        let frame = Arc::new(load_frame(&path, self.height, self.width)?);
        self.cache.insert(id.to_string(), Arc::clone(&frame));
        Ok(frame)
    }
}

/// Grayscale frame `[1, height, width]` with values in `[0, 1]`.
pub fn load_frame(path: &Path, height: usize, width: usize) -> Result<Frame> {
    let image = image::open(path)?
        .resize_exact(width as u32, height as u32, FilterType::Triangle)
        .to_luma8();
    Ok(Array3::from_shape_fn((1, height, width), |(_, y, x)| {
        image.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
    }))
}
