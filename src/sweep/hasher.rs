use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 8192;

/// Content fingerprint of the file at `path`: lowercase hex SHA-256 over the
/// bytes only. Returns `Ok(None)` when the file does not exist at call time;
/// artifact creation is asynchronous, so a missing file is an expected
/// observation, not an error.
pub fn fingerprint(path: &Path) -> Result<Option<String>> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(Some(format!("{:x}", hasher.finalize())))
}
