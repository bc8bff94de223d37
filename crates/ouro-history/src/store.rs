//! Frame storage backends
//!
//! The chain invariants live in `FrameLog`; a store only persists frames
//! in sequence order. `MemoryStore` is the default. `JsonlStore` mirrors
//! every frame to a JSON-lines file (one record per sequence number) so an
//! external auditor can recompute the full chain offline.

use crate::frame::Frame;
use ouro_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait FrameStore: Send {
    fn append(&mut self, frame: Frame) -> Result<()>;
    fn get(&self, sequence: u64) -> Option<&Frame>;
    fn len(&self) -> u64;
    fn frames(&self) -> &[Frame];

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last(&self) -> Option<&Frame> {
        self.frames().last()
    }
}

/// In-memory store. Frames live for the life of the process.
#[derive(Default)]
pub struct MemoryStore {
    frames: Vec<Frame>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameStore for MemoryStore {
    fn append(&mut self, frame: Frame) -> Result<()> {
        self.frames.push(frame);
        Ok(())
    }

    fn get(&self, sequence: u64) -> Option<&Frame> {
        self.frames.get(sequence as usize)
    }

    fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// File-backed store: in-memory vector plus an append-only `.jsonl` file.
/// Reads are served from memory; the file exists for durability and audit.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    frames: Vec<Frame>,
}

impl JsonlStore {
    /// Open (or create) a store at `path`, loading any existing frames.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let frames = if path.exists() {
            Self::load_frames(&path)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Vec::new()
        };
        Ok(Self { path, frames })
    }

    fn load_frames(path: &Path) -> Result<Vec<Frame>> {
        let content = fs::read_to_string(path)?;
        let mut frames = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let frame: Frame = serde_json::from_str(line).map_err(|e| {
                Error::storage(format!(
                    "corrupt frame record at {}:{}: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameStore for JsonlStore {
    fn append(&mut self, frame: Frame) -> Result<()> {
        let line = serde_json::to_string(&frame)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        self.frames.push(frame);
        Ok(())
    }

    fn get(&self, sequence: u64) -> Option<&Frame> {
        self.frames.get(sequence as usize)
    }

    fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    fn frames(&self) -> &[Frame] {
        &self.frames
    }
}
