//! Threaded batch loader for an image directory
//!
//! Decoding runs on a small worker pool feeding a bounded channel, so image
//! I/O overlaps with training compute. The training loop only ever sees an
//! iterator of ready batches; it suspends solely at this boundary.

use anyhow::{bail, ensure, Context, Result};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;
use tch::{Kind, Tensor};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Loader over a directory of training images
///
/// Every yielded batch has exactly `batch_size` images (the shuffled
/// remainder is dropped), decoded to `(batch, 3, img_size, img_size)` float
/// tensors in [-1, 1].
pub struct ImageBatchLoader {
    files: Vec<PathBuf>,
    batch_size: usize,
    n_threads: usize,
    img_size: i64,
}

impl ImageBatchLoader {
    /// Create a loader, scanning `dir` for png/jpg/jpeg files
    pub fn new<P: AsRef<Path>>(
        dir: P,
        batch_size: usize,
        n_threads: usize,
        img_size: i64,
    ) -> Result<Self> {
        ensure!(batch_size >= 1, "batch_size must be >= 1");
        ensure!(n_threads >= 1, "n_threads must be >= 1");

        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("reading image directory {dir:?}"))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            bail!("no images found in {dir:?}");
        }

        Ok(Self {
            files,
            batch_size,
            n_threads,
            img_size,
        })
    }

    /// Number of full batches per epoch
    pub fn num_batches(&self) -> usize {
        self.files.len() / self.batch_size
    }

    /// Total number of images found
    pub fn num_images(&self) -> usize {
        self.files.len()
    }

    /// Start one shuffled pass over the data on the worker pool
    pub fn epoch_iter(&self) -> BatchIter {
        let mut files = self.files.clone();
        files.shuffle(&mut rand::thread_rng());
        files.truncate(self.num_batches() * self.batch_size);

        let batches: Vec<Vec<PathBuf>> = files
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let n_workers = self.n_threads.min(batches.len()).max(1);
        let mut shards: Vec<Vec<Vec<PathBuf>>> = (0..n_workers).map(|_| Vec::new()).collect();
        for (i, batch) in batches.into_iter().enumerate() {
            shards[i % n_workers].push(batch);
        }

        // Bounded channel gives back-pressure: workers stall once a few
        // batches are ready and untaken
        let (tx, rx) = sync_channel(n_workers * 2);
        for shard in shards {
            let tx = tx.clone();
            let img_size = self.img_size;
            thread::spawn(move || {
                for batch in shard {
                    let decoded = decode_batch(&batch, img_size);
                    // Send fails only when the consumer went away early
                    if tx.send(decoded).is_err() {
                        return;
                    }
                }
            });
        }

        BatchIter { rx }
    }
}

fn decode_batch(paths: &[PathBuf], img_size: i64) -> Result<Tensor> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let image = tch::vision::image::load_and_resize(path, img_size, img_size)
            .with_context(|| format!("decoding image {path:?}"))?;
        images.push(image);
    }
    // u8 [0, 255] -> float [-1, 1]
    Ok(Tensor::stack(&images, 0).to_kind(Kind::Float) / 127.5 - 1.0)
}

/// Iterator over one epoch's decoded batches
pub struct BatchIter {
    rx: Receiver<Result<Tensor>>,
}

impl Iterator for BatchIter {
    type Item = Result<Tensor>;

    fn next(&mut self) -> Option<Self::Item> {
        // Ends once every worker has dropped its sender
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_images(dir: &Path, count: usize) {
        for i in 0..count {
            let image = Tensor::full([3, 16, 16], (i * 20) as i64, (Kind::Uint8, tch::Device::Cpu));
            tch::vision::image::save(&image, dir.join(format!("img_{i}.png"))).unwrap();
        }
    }

    #[test]
    fn test_loader_batches_and_drop_last() {
        let dir = tempfile::tempdir().unwrap();
        write_test_images(dir.path(), 10);

        let loader = ImageBatchLoader::new(dir.path(), 3, 2, 64).unwrap();
        assert_eq!(loader.num_images(), 10);
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<Tensor> = loader
            .epoch_iter()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(batches.len(), 3);
        for batch in &batches {
            assert_eq!(batch.size(), vec![3, 3, 64, 64]);
            let min_val: f64 = batch.min().double_value(&[]);
            let max_val: f64 = batch.max().double_value(&[]);
            assert!(min_val >= -1.0 && max_val <= 1.0);
        }
    }

    #[test]
    fn test_loader_rejects_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageBatchLoader::new(dir.path(), 4, 1, 64).is_err());
    }

    #[test]
    fn test_loader_skips_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        write_test_images(dir.path(), 4);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let loader = ImageBatchLoader::new(dir.path(), 2, 1, 64).unwrap();
        assert_eq!(loader.num_images(), 4);
    }
}
