use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use twox_hash::XxHash64;

const READ_BUFFER_LENGTH: usize = 64 * 1024;

/// XxHash64 (seed 0) of the whole file, streamed in 64KB chunks.
pub fn hash_file(file: &Path) -> io::Result<u64> {
    let mut f = File::open(file)?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = vec![0; READ_BUFFER_LENGTH];
    loop {
        let bytes_read = f.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.write(&buffer[..bytes_read]);
    }
    Ok(hasher.finish())
}
