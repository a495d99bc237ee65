use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;

use crate::store::ConfigStore;

/// Write a compressed binary snapshot of a store to disk.
pub fn save_snapshot(store: &ConfigStore, path: impl AsRef<Path>) -> std::io::Result<()> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, store)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(())
}

/// Read a compressed binary snapshot back into a store.
pub fn load_snapshot(path: impl AsRef<Path>) -> std::io::Result<ConfigStore> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let store: ConfigStore = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(store)
}

/// Serialize a store into an in-memory gzip buffer (download payloads).
pub fn serialize_to_memory(store: &ConfigStore, buffer: &mut Vec<u8>) -> std::io::Result<()> {
    let mut encoder = GzEncoder::new(buffer, Compression::default());
    serialize_into(&mut encoder, store)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    encoder.finish()?;
    Ok(())
}

/// Deserialize a store from an in-memory gzip buffer (upload payloads).
pub fn deserialize_from_memory(buffer: &[u8]) -> std::io::Result<ConfigStore> {
    let cursor = std::io::Cursor::new(buffer);
    let decoder = GzDecoder::new(cursor);
    let mut reader = std::io::BufReader::new(decoder);

    let store: ConfigStore = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use tempfile::tempdir;

    fn small_store() -> ConfigStore {
        ConfigStore {
            header_rows: vec!["a,b".into(), "c,d".into(), "e,f".into(), "code,label".into()],
            headers: vec!["code".into(), "label".into()],
            records: vec![Record::new("row-0", vec!["fieldCode001".into(), "Color".into()])],
        }
    }

    #[test]
    fn memory_round_trip() {
        let store = small_store();
        let mut buffer = Vec::new();
        serialize_to_memory(&store, &mut buffer).unwrap();
        assert!(!buffer.is_empty());
        let restored = deserialize_from_memory(&buffer).unwrap();
        assert_eq!(store, restored);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.bin.gz");
        let store = small_store();
        save_snapshot(&store, &path).unwrap();
        let restored = load_snapshot(&path).unwrap();
        assert_eq!(store, restored);
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(deserialize_from_memory(b"definitely not gzip").is_err());
    }
}
