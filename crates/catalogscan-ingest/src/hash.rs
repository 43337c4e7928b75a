use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a file's contents, read in 64 KiB chunks.
pub fn file_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// True if the file starts with the `%PDF-` magic bytes.
pub fn has_pdf_header(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; 5];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < header.len() {
        let n = file.read(&mut header[read..])?;
        if n == 0 {
            return Ok(false);
        }
        read += n;
    }
    Ok(&header == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn header_check() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("ok.pdf");
        let short = dir.path().join("short.pdf");
        let text = dir.path().join("notes.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n...").unwrap();
        std::fs::write(&short, b"%PD").unwrap();
        std::fs::write(&text, b"hello world").unwrap();
        assert!(has_pdf_header(&pdf).unwrap());
        assert!(!has_pdf_header(&short).unwrap());
        assert!(!has_pdf_header(&text).unwrap());
    }
}
