use std::cell::RefCell;
use std::path::Path;

use crate::error::Result;

/// Key the state blob is stored under.
pub const STORAGE_KEY: &str = "elon_tracker_state";

/// A byte store holding the single serialized state blob.
pub trait StateStore {
    fn load(&self) -> Result<Option<Vec<u8>>>;
    fn save(&self, bytes: &[u8]) -> Result<()>;
}

pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }
}

impl StateStore for SledStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(STORAGE_KEY)?.map(|v| v.to_vec()))
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        self.db.insert(STORAGE_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-process store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: RefCell<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn with_blob(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: RefCell::new(Some(bytes.into())),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.borrow().clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }
}
