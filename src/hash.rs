//! File content comparison for rootfs-differ

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufReader, Read};

const SMALL_FILE: u64 = 1024;
const LARGE_FILE: u64 = 1024 * 1024;

/// Content fingerprint of an open file of known length.
///
/// Small files are fingerprinted by their raw bytes, larger ones by BLAKE3 digest,
/// so two fingerprints are only comparable for files of equal length.
pub fn fingerprint(file: &File, len: u64) -> io::Result<Vec<u8>> {
    if len < SMALL_FILE {
        return read_small(file);
    }
    Ok(hash_file(file, len)?.to_vec())
}

/// Hash an open file, memory mapping it when it is large.
pub fn hash_file(file: &File, len: u64) -> io::Result<[u8; 32]> {
    if len > LARGE_FILE {
        hash_large_file(file)
    } else {
        hash_medium_file(file)
    }
}

fn read_small(mut file: &File) -> io::Result<Vec<u8>> {
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}

fn hash_medium_file(file: &File) -> io::Result<[u8; 32]> {
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 32768];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(*hasher.finalize().as_bytes())
}

fn hash_large_file(file: &File) -> io::Result<[u8; 32]> {
    // SAFETY: the trees are read-only for the duration of a comparison.
    let mmap = unsafe { Mmap::map(file)? };
    Ok(*blake3::Hasher::new().update(&mmap).finalize().as_bytes())
}
