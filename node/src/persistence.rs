// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Serialize, Deserialize};
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use crc32fast::Hasher;
use thiserror::Error;

use crate::ledger::SessionRecord;
use crate::storage::PlayerRecord;

const MAGIC: u32 = u32::from_le_bytes(*b"BSTN");
const SCHEMA_VERSION: u32 = 2;
const HEADER_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("not a snapshot file")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    VersionMismatch(u32),
    #[error("checksum mismatch")]
    Checksum,
    #[error("snapshot truncated")]
    Truncated,
}

/// Everything the store holds, in a stable order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub players: Vec<PlayerRecord>,
    pub sessions: Vec<SessionRecord>,
}

pub struct SnapshotManager;

impl SnapshotManager {
    /// `[MAGIC][VER][LEN][PAYLOAD][CRC]`, integers little endian, CRC over
    /// everything before it.
    pub fn encode(snapshot: &StoreSnapshot) -> Result<Vec<u8>, PersistenceError> {
        let payload = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())
            .map_err(|e| PersistenceError::Encode(e.to_string()))?;
        let len = u32::try_from(payload.len()).map_err(|_| PersistenceError::Encode("snapshot too large".into()))?;

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&payload);

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());
        Ok(buf)
    }

    pub fn decode(buffer: &[u8]) -> Result<StoreSnapshot, PersistenceError> {
        if buffer.len() < HEADER_LEN + 4 {
            return Err(PersistenceError::Truncated);
        }

        // Check Trailer
        let (content, trailer) = buffer.split_at(buffer.len() - 4);
        let mut hasher = Hasher::new();
        hasher.update(content);
        if hasher.finalize() != read_u32(trailer, 0) {
            return Err(PersistenceError::Checksum);
        }

        // Parse Header
        if read_u32(content, 0) != MAGIC {
            return Err(PersistenceError::BadMagic);
        }
        let version = read_u32(content, 4);
        if version != SCHEMA_VERSION {
            return Err(PersistenceError::VersionMismatch(version));
        }
        let len = read_u32(content, 8) as usize;
        let payload = &content[HEADER_LEN..];
        if payload.len() != len {
            return Err(PersistenceError::Truncated);
        }

        let (snapshot, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;
        Ok(snapshot)
    }

    /// Writes to a temp file and renames it over `path`, keeping the previous
    /// file as `<path>.prev`. Returns the bytes written.
    pub fn save(path: &Path, snapshot: &StoreSnapshot) -> Result<u64, PersistenceError> {
        let bytes = Self::encode(snapshot)?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        // ROTATION LOGIC: Keep one previous version
        if path.exists() {
            if let Err(e) = std::fs::rename(path, prev_path(path)) {
                tracing::warn!("could not rotate snapshot {:?}: {}", path, e);
            }
        }

        std::fs::rename(&tmp_path, path)?;
        Ok(bytes.len() as u64)
    }

    /// `Ok(None)` when no snapshot exists yet.
    pub fn load(path: &Path) -> Result<Option<StoreSnapshot>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(path)?;
        Self::decode(&data).map(Some)
    }
}

pub fn prev_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".prev");
    PathBuf::from(name)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(word)
}
