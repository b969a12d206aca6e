//! Sampling generated images to disk

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tch::{Device, Kind};
use tracing::info;

use crate::model::Dcgan;

/// Run the generator once on a fresh noise batch and write one numbered PNG
/// per image into `out_dir`, creating the directory if absent
///
/// # Arguments
///
/// * `model` - Model whose generator to sample
/// * `num_samples` - Number of images to write
/// * `out_dir` - Output directory; files are named `0.png` .. `{n-1}.png`
///
/// # Returns
///
/// Paths of the written files, in index order
pub fn sample_images<P: AsRef<Path>>(
    model: &Dcgan,
    num_samples: i64,
    out_dir: P,
) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {out_dir:?}"))?;

    let images = tch::no_grad(|| model.generate(num_samples));

    // [-1, 1] -> [0, 255] unsigned bytes
    let images = ((images + 1.0) * 127.5)
        .clamp(0.0, 255.0)
        .to_kind(Kind::Uint8)
        .to_device(Device::Cpu);

    let mut paths = Vec::with_capacity(num_samples as usize);
    for i in 0..num_samples {
        let path = out_dir.join(format!("{i}.png"));
        tch::vision::image::save(&images.get(i), &path)
            .with_context(|| format!("writing sampled image {path:?}"))?;
        paths.push(path);
    }

    info!("Wrote {} sampled images to {:?}", num_samples, out_dir);
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::small_model;

    #[test]
    fn test_sample_writes_numbered_byte_images() {
        let dir = tempfile::tempdir().unwrap();
        let model = small_model();

        let paths = sample_images(&model, 3, dir.path()).unwrap();

        assert_eq!(paths.len(), 3);
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{i}.png"));
            assert!(path.exists());

            let loaded = tch::vision::image::load(path).unwrap();
            assert_eq!(loaded.kind(), Kind::Uint8);
            assert_eq!(loaded.size(), vec![3, 64, 64]);
        }
    }

    #[test]
    fn test_sample_creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("samples/run_1");
        let model = small_model();

        let paths = sample_images(&model, 1, &nested).unwrap();
        assert!(paths[0].exists());
    }
}
