//! Content signature of exported files (SHA-256, lowercase hex)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{MasterError, MasterResult};

/// Read size while hashing
pub const SIGNATURE_BLOCK_SIZE: usize = 64 * 1024;

/// Hash everything `reader` yields
pub fn stamp_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; SIGNATURE_BLOCK_SIZE];

    loop {
        let n = reader.read(&mut block)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Signature of a written file
pub fn stamp_file(path: &Path) -> MasterResult<String> {
    let file = File::open(path)
        .map_err(|e| MasterError::Write(format!("{}: cannot sign: {}", path.display(), e)))?;
    stamp_reader(file)
        .map_err(|e| MasterError::Write(format!("{}: cannot sign: {}", path.display(), e)))
}

/// Recompute and compare (case-insensitive)
pub fn verify_file(path: &Path, expected: &str) -> MasterResult<bool> {
    Ok(stamp_file(path)?.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            stamp_reader(&b"abc"[..]).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            stamp_reader(&b""[..]).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_multi_block_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..SIGNATURE_BLOCK_SIZE * 3 + 17).map(|i| i as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let signature = stamp_file(&path).unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(signature, stamp_reader(&data[..]).unwrap());
        assert!(verify_file(&path, &signature.to_uppercase()).unwrap());

    }

    #[test]
    fn test_single_byte_change_changes_signature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.bin");
        let mut data: Vec<u8> = (0..SIGNATURE_BLOCK_SIZE * 2).map(|i| (i * 7) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        let signature = stamp_file(&path).unwrap();

        for index in [0, SIGNATURE_BLOCK_SIZE - 1, SIGNATURE_BLOCK_SIZE, data.len() - 1] {
            data[index] ^= 1;
            std::fs::write(&path, &data).unwrap();
            assert_ne!(stamp_file(&path).unwrap(), signature, "byte {index}");
            assert!(!verify_file(&path, &signature).unwrap());
            data[index] ^= 1;
        }

        std::fs::write(&path, &data).unwrap();
        assert!(verify_file(&path, &signature).unwrap());
    }

    #[test]
    fn test_missing_file_is_export_error() {
        let err = stamp_file(Path::new("/no/such/output.wav")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Export);
    }
}
