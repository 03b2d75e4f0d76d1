//! Archive container codec
//!
//! Archives are zip containers holding newline-delimited JSON streams, one
//! per entity collection, plus JSON documents for the manifest, the server
//! settings, and the genre tree, and raw binary entries for image assets.
//!
//! On read, a missing named stream is a recoverable "not present" condition
//! (`Ok(None)`), distinct from a structural error: many streams are optional.
//! A malformed line inside a stream is surfaced per record and never aborts
//! the rest of the stream.

use crate::{ArchiveError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::Path;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive format version. Must match exactly on read; there is no
/// cross-version migration logic.
pub const FORMAT_VERSION: &str = "1";

/// Path of the manifest inside the container
pub const MANIFEST_PATH: &str = "manifest.json";
/// Path of the server identity/settings document
pub const SERVER_PATH: &str = "server.json";
/// Path of the genre taxonomy tree document
pub const GENRES_PATH: &str = "entities/genres.json";
/// Path of the listening event stream
pub const EVENTS_PATH: &str = "listening/events.jsonl";
/// Path of the listening session stream
pub const SESSIONS_PATH: &str = "listening/sessions.jsonl";
/// Prefix of binary image assets
pub const IMAGES_PREFIX: &str = "images/";

/// Stream path for an entity collection, e.g. `entities/users.jsonl`
pub fn entity_stream_path(collection: &str) -> String {
    format!("entities/{collection}.jsonl")
}

/// A single undecodable line inside a record stream
#[derive(Debug, Clone)]
pub struct RecordError {
    /// 1-based line number inside the stream
    pub line: usize,
    pub message: String,
}

/// Lazy iterator over the records of one JSONL stream.
///
/// Yields one `Result` per non-empty line; decoding failures are per-item and
/// iteration continues past them.
pub struct RecordIter<T> {
    lines: std::vec::IntoIter<(usize, String)>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> Iterator for RecordIter<T> {
    type Item = std::result::Result<T, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line_no, line) = self.lines.next()?;
        Some(serde_json::from_str(&line).map_err(|e| RecordError {
            line: line_no,
            message: e.to_string(),
        }))
    }
}

/// Streaming archive writer over a zip container.
///
/// Tracks a running record count per stream so the exporter can write the
/// manifest last, reflecting final counts.
pub struct ArchiveWriter {
    zip: ZipWriter<File>,
    counts: BTreeMap<String, u64>,
}

impl ArchiveWriter {
    /// Create a new archive at `path`, truncating any existing file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            zip: ZipWriter::new(file),
            counts: BTreeMap::new(),
        })
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// Write one entity collection as a newline-delimited JSON stream and
    /// record its count under `count_key`
    pub fn write_jsonl<T: Serialize>(
        &mut self,
        path: &str,
        count_key: &str,
        records: &[T],
    ) -> Result<u64> {
        self.zip.start_file(path, Self::options())?;
        for record in records {
            let line = serde_json::to_string(record)?;
            self.zip.write_all(line.as_bytes())?;
            self.zip.write_all(b"\n")?;
        }
        let count = records.len() as u64;
        self.counts.insert(count_key.to_string(), count);
        Ok(count)
    }

    /// Write one JSON document (manifest, server settings, genre tree)
    pub fn write_json<T: Serialize>(&mut self, path: &str, value: &T) -> Result<()> {
        self.zip.start_file(path, Self::options())?;
        let body = serde_json::to_vec_pretty(value)?;
        self.zip.write_all(&body)?;
        Ok(())
    }

    /// Write one binary asset
    pub fn write_binary(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.zip.start_file(path, Self::options())?;
        self.zip.write_all(bytes)?;
        Ok(())
    }

    /// Record a count for a stream written outside `write_jsonl`
    pub fn set_count(&mut self, key: &str, count: u64) {
        self.counts.insert(key.to_string(), count);
    }

    /// Running per-stream counts, for manifest population
    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    /// Finalize the container
    pub fn finish(self) -> Result<()> {
        self.zip.finish()?;
        Ok(())
    }
}

/// Archive reader over a zip container
pub struct ArchiveReader {
    zip: ZipArchive<File>,
}

impl ArchiveReader {
    /// Open an existing archive. Fails if the container is structurally
    /// unreadable.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            zip: ZipArchive::new(file)?,
        })
    }

    fn read_entry(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.zip.by_name(path) {
            Ok(mut entry) => {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            Err(ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and validate the manifest. Missing manifest or a version
    /// mismatch is fatal.
    pub fn read_manifest(&mut self) -> Result<crate::Manifest> {
        let manifest: crate::Manifest = self
            .read_json(MANIFEST_PATH)?
            .ok_or(ArchiveError::ManifestMissing)?;
        if manifest.version != FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion {
                found: manifest.version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(manifest)
    }

    /// Open a named JSONL stream. `Ok(None)` means the stream is not present
    /// in this archive.
    pub fn read_records<T: DeserializeOwned>(&mut self, path: &str) -> Result<Option<RecordIter<T>>> {
        let Some(bytes) = self.read_entry(path)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<(usize, String)> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| (i + 1, l.to_string()))
            .collect();
        Ok(Some(RecordIter {
            lines: lines.into_iter(),
            _marker: PhantomData,
        }))
    }

    /// Read one JSON document, `Ok(None)` when absent
    pub fn read_json<T: DeserializeOwned>(&mut self, path: &str) -> Result<Option<T>> {
        let Some(bytes) = self.read_entry(path)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Read one binary asset, `Ok(None)` when absent
    pub fn read_binary(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        self.read_entry(path)
    }

    /// All entry paths starting with `prefix`
    pub fn list_paths(&self, prefix: &str) -> Vec<String> {
        self.zip
            .file_names()
            .filter(|name| name.starts_with(prefix))
            .map(ToString::to_string)
            .collect()
    }
}

/// SHA-256 checksum of the full byte stream of a file, hex-encoded.
///
/// Detects transport corruption of a finished archive.
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        id: String,
        n: i64,
    }

    #[test]
    fn jsonl_stream_roundtrips_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fab");

        let mut writer = ArchiveWriter::create(&path).unwrap();
        let records = vec![
            Rec { id: "a".into(), n: 1 },
            Rec { id: "b".into(), n: 2 },
        ];
        let count = writer
            .write_jsonl(&entity_stream_path("recs"), "recs", &records)
            .unwrap();
        assert_eq!(count, 2);
        writer.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let iter = reader
            .read_records::<Rec>(&entity_stream_path("recs"))
            .unwrap()
            .unwrap();
        let loaded: Vec<Rec> = iter.map(|r| r.unwrap()).collect();
        assert_eq!(loaded, records);
    }

    #[test]
    fn missing_stream_is_not_present_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fab");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        writer.write_json("something.json", &1).unwrap();
        writer.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        assert!(reader
            .read_records::<Rec>("entities/ghosts.jsonl")
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_line_does_not_abort_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.fab");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        writer
            .write_binary(
                "entities/recs.jsonl",
                b"{\"id\":\"a\",\"n\":1}\nnot json at all\n{\"id\":\"c\",\"n\":3}\n",
            )
            .unwrap();
        writer.finish().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let results: Vec<_> = reader
            .read_records::<Rec>("entities/recs.jsonl")
            .unwrap()
            .unwrap()
            .collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(results[2].is_ok());
    }

    #[test]
    fn checksum_is_stable_for_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"fable").unwrap();
        let a = file_checksum(&path).unwrap();
        let b = file_checksum(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
