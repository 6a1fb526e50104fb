/// Session persistence: the onboarding-complete flag, kept in sled
use crate::error::{ChatError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const ONBOARDED_KEY: &str = "whisperly-onboarded";

/// Where the client keeps its first-run flag
pub trait OnboardingFlag: Send + Sync {
    fn is_onboarded(&self) -> Result<bool>;
    fn mark_onboarded(&self) -> Result<()>;
    fn reset(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct SessionStore {
    db: Arc<sled::Db>,
}

impl SessionStore {
    /// Open (or create) the session DB in the given data directory
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("session.db");
        debug!("Opening session store at {:?}", db_path);

        let db = sled::open(&db_path)
            .map_err(|e| ChatError::Storage(format!("Failed to open session DB: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Throwaway store for tests and the offline CLI
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ChatError::Storage(format!("Failed to open temp session DB: {}", e)))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl OnboardingFlag for SessionStore {
    fn is_onboarded(&self) -> Result<bool> {
        let v = self
            .db
            .get(ONBOARDED_KEY.as_bytes())
            .map_err(|e| ChatError::Storage(format!("Failed to read session flag: {}", e)))?;
        Ok(v.map(|b| b.as_ref() == b"true").unwrap_or(false))
    }

    fn mark_onboarded(&self) -> Result<()> {
        self.db
            .insert(ONBOARDED_KEY.as_bytes(), b"true".as_ref())
            .map_err(|e| ChatError::Storage(format!("Failed to write session flag: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Failed to flush session DB: {}", e)))?;
        info!("Onboarding marked complete");
        Ok(())
    }

    /// Forget the flag so the next start shows onboarding again
    fn reset(&self) -> Result<()> {
        self.db
            .remove(ONBOARDED_KEY.as_bytes())
            .map_err(|e| ChatError::Storage(format!("Failed to clear session flag: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Failed to flush session DB: {}", e)))?;
        Ok(())
    }
}
