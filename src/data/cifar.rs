//! CIFAR-10 binary shard loader
//!
//! Each shard file is a sequence of 3073-byte records: one label byte
//! followed by 3072 pixel bytes stored as three 32x32 planes (red, green,
//! blue). Pixels are normalized to `[0, 1]` and the planes are interleaved
//! to row-major `(row, col, channel)` order, so per-channel operations can
//! index channels as `flat_index % 3`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ndarray::Array1;

use crate::data::{Sample, SampleSet};
use crate::error::{Error, Result};

pub const IMAGE_WIDTH: usize = 32;
pub const IMAGE_HEIGHT: usize = 32;
pub const IMAGE_DEPTH: usize = 3;
pub const IMAGE_SIZE: usize = IMAGE_WIDTH * IMAGE_HEIGHT * IMAGE_DEPTH;
pub const NUM_CLASSES: usize = 10;

const RECORD_SIZE: usize = 1 + IMAGE_SIZE;
const PLANE_SIZE: usize = IMAGE_WIDTH * IMAGE_HEIGHT;

/// The shard file names, in order: five training shards then the test shard.
pub const SHARD_NAMES: [&str; 6] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
    "test_batch.bin",
];

/// Load all six shards from `dir`, in order.
///
/// Any missing file or malformed shard is fatal.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<SampleSet>> {
    let dir = dir.as_ref();
    SHARD_NAMES
        .iter()
        .map(|name| {
            let bytes = fs::read(dir.join(name))
                .map_err(|e| Error::Dataset(format!("reading {name}: {e}")))?;
            parse_shard(&bytes).map_err(|e| match e {
                Error::Dataset(msg) => Error::Dataset(format!("{name}: {msg}")),
                other => other,
            })
        })
        .collect()
}

/// Decode one shard's bytes into a [`SampleSet`].
pub fn parse_shard(bytes: &[u8]) -> Result<SampleSet> {
    if bytes.is_empty() || bytes.len() % RECORD_SIZE != 0 {
        return Err(Error::Dataset(format!(
            "shard length {} is not a positive multiple of {RECORD_SIZE}",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(RECORD_SIZE)
        .map(parse_record)
        .collect::<Result<Vec<_>>>()?;
    Ok(SampleSet::new(samples))
}

fn parse_record(record: &[u8]) -> Result<Arc<Sample>> {
    let label = record[0] as usize;
    if label >= NUM_CLASSES {
        return Err(Error::Dataset(format!("label {label} out of range")));
    }

    let pixels = &record[1..];
    let mut image = vec![0.0f32; IMAGE_SIZE];
    for y in 0..IMAGE_HEIGHT {
        for x in 0..IMAGE_WIDTH {
            for c in 0..IMAGE_DEPTH {
                let planar = c * PLANE_SIZE + y * IMAGE_WIDTH + x;
                image[(y * IMAGE_WIDTH + x) * IMAGE_DEPTH + c] = pixels[planar] as f32 / 255.0;
            }
        }
    }

    Ok(Arc::new(Sample {
        image: Array1::from(image),
        label,
    }))
}
