use super::FetchError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub max_bytes: u64,
}

impl Limits {
    pub fn from_kib(kib: u64) -> Self {
        Self {
            max_bytes: kib.saturating_mul(1024),
        }
    }
}

fn normalize(path: &str) -> Result<PathBuf, FetchError> {
    Path::new(path)
        .canonicalize()
        .map_err(|source| FetchError::File {
            path: path.to_string(),
            source,
        })
}

pub fn read_file_bounded(path: &str, limits: &Limits) -> Result<Vec<u8>, FetchError> {
    let p = normalize(path)?;
    let io_err = |source| FetchError::File {
        path: p.display().to_string(),
        source,
    };
    let md = fs::metadata(&p).map_err(io_err)?;
    if md.len() > limits.max_bytes {
        return Err(FetchError::TooLarge {
            limit: limits.max_bytes,
        });
    }
    fs::read(&p).map_err(io_err)
}
