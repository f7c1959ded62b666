//! Game files
//!
//! The game reads three kinds of files: the game data image (`OBJECT`), the
//! character ROM (`char.rom`) and castles (`Z<name>`). Data and castle files
//! are program files: the first two bytes are a load address, which is
//! skipped. Saved positions are opaque blobs produced by `savestate`.
//!
//! `DiskStore` keeps everything in one directory; `MemoryStore` holds files
//! in a map and is what tests use.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::memory::{Memory, CASTLE_IMAGE, GAME_DATA};

/// Game data file name
pub const GAME_DATA_FILE: &str = "OBJECT";

/// Character ROM file name
pub const CHAR_ROM_FILE: &str = "char.rom";

/// Castle files carry this prefix
pub const CASTLE_PREFIX: &str = "Z";

/// Saved positions carry this extension
pub const POSITION_EXTENSION: &str = "sav";

/// Size of the program file load address
const LOAD_ADDRESS_SIZE: usize = 2;

/// Errors raised by a store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File {0} is too short")]
    TooShort(String),
}

/// Source of game files and sink for saved positions
pub trait Persistence {
    /// Read a whole file
    fn read(&self, name: &str) -> Result<Vec<u8>, PersistenceError>;

    /// Write a whole file
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), PersistenceError>;

    /// Names of the castles available
    fn castles(&self) -> Result<Vec<String>, PersistenceError>;

    /// Game data, without its load address
    fn load_game_data(&self) -> Result<Vec<u8>, PersistenceError> {
        strip_load_address(GAME_DATA_FILE, self.read(GAME_DATA_FILE)?)
    }

    fn load_char_rom(&self) -> Result<Vec<u8>, PersistenceError> {
        self.read(CHAR_ROM_FILE)
    }

    /// A castle image, without its load address
    fn load_castle(&self, name: &str) -> Result<Vec<u8>, PersistenceError> {
        let file = castle_file(name);
        strip_load_address(&file, self.read(&file)?)
    }

    fn save_position(&mut self, name: &str, data: &[u8]) -> Result<(), PersistenceError> {
        self.write(&position_file(name), data)
    }

    fn load_position(&self, name: &str) -> Result<Vec<u8>, PersistenceError> {
        self.read(&position_file(name))
    }
}

fn castle_file(name: &str) -> String {
    if name.starts_with(CASTLE_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", CASTLE_PREFIX, name)
    }
}

fn position_file(name: &str) -> String {
    format!("{}.{}", name, POSITION_EXTENSION)
}

fn strip_load_address(name: &str, mut data: Vec<u8>) -> Result<Vec<u8>, PersistenceError> {
    if data.len() < LOAD_ADDRESS_SIZE {
        return Err(PersistenceError::TooShort(name.to_string()));
    }
    data.drain(..LOAD_ADDRESS_SIZE);
    Ok(data)
}

/// Place the game data image at its load address
pub fn install_game_data(memory: &mut Memory, data: &[u8]) {
    memory.load(GAME_DATA, data);
    debug!("Game data: {:#06X} bytes at {:04X}", data.len(), GAME_DATA);
}

/// Place a castle image where a new game copies it from
pub fn install_castle(memory: &mut Memory, data: &[u8]) {
    memory.load(CASTLE_IMAGE, data);
    debug!("Castle: {:#06X} bytes at {:04X}", data.len(), CASTLE_IMAGE);
}

/// Files in a directory
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        DiskStore { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Persistence for DiskStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, PersistenceError> {
        let path = self.root.join(name);
        match fs::read(&path) {
            Ok(data) => {
                debug!("Read {} ({} bytes)", path.display(), data.len());
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistenceError::NotFound(path.display().to_string()))
            }
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), PersistenceError> {
        let path = self.root.join(name);
        fs::write(&path, data).map_err(|source| PersistenceError::Io { path: path.clone(), source })?;
        info!("Wrote {}", path.display());
        Ok(())
    }

    fn castles(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = fs::read_dir(&self.root).map_err(|source| PersistenceError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(CASTLE_PREFIX) && !name.contains('.'))
            .map(|name| name[CASTLE_PREFIX.len()..].to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Files held in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.files.insert(name.to_string(), data);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

impl Persistence for MemoryStore {
    fn read(&self, name: &str) -> Result<Vec<u8>, PersistenceError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(name.to_string()))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), PersistenceError> {
        self.insert(name, data.to_vec());
        Ok(())
    }

    fn castles(&self) -> Result<Vec<String>, PersistenceError> {
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter(|name| name.starts_with(CASTLE_PREFIX) && !name.contains('.'))
            .map(|name| name[CASTLE_PREFIX.len()..].to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}
