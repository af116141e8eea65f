use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const BUFFER_SIZE: usize = 256 * 1024;

/// SHA-256 of a regular file as lowercase hex.
///
/// Returns `Ok(None)` for non-regular files and files over `max_size_mb`.
pub fn calculate_sha256(path: &Path, max_size_mb: u64) -> io::Result<Option<String>> {
    let metadata = std::fs::metadata(path)?;

    if !metadata.is_file() || metadata.len() > max_size_mb * 1024 * 1024 {
        return Ok(None);
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Some(format!("{:x}", hasher.finalize())))
}
