//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use liquid_store::MetaStore;

use crate::LmdbError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of named databases opened below.
const DATABASE_COUNT: u32 = 9;

/// Wraps the LMDB environment and all database handles.
///
/// Cheap to share behind an `Arc`; LMDB serialises writers internally, so a
/// read-check-write inside one write transaction is atomic.
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) participants_db: Database<Bytes, Bytes>,
    pub(crate) members_db: Database<Bytes, Bytes>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
    pub(crate) actions_db: Database<Bytes, Bytes>,
    pub(crate) action_log_db: Database<Bytes, Bytes>,
    pub(crate) audits_db: Database<Bytes, Bytes>,
    pub(crate) tallies_db: Database<Bytes, Bytes>,
    pub(crate) snapshots_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("create {}: {e}", path.display())))?;

        // SAFETY: the environment is opened once per process per path and the
        // memory map is never touched outside heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASE_COUNT)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        let participants_db = env.create_database(&mut wtxn, Some("participants"))?;
        let members_db = env.create_database(&mut wtxn, Some("members"))?;
        let proposals_db = env.create_database(&mut wtxn, Some("proposals"))?;
        let actions_db = env.create_database(&mut wtxn, Some("actions"))?;
        let action_log_db = env.create_database(&mut wtxn, Some("action_log"))?;
        let audits_db = env.create_database(&mut wtxn, Some("audits"))?;
        let tallies_db = env.create_database(&mut wtxn, Some("tallies"))?;
        let snapshots_db = env.create_database(&mut wtxn, Some("snapshots"))?;
        wtxn.commit()?;

        let environment = Self {
            env,
            meta_db,
            participants_db,
            members_db,
            proposals_db,
            actions_db,
            action_log_db,
            audits_db,
            tallies_db,
            snapshots_db,
        };
        environment.check_schema()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(environment)
    }

    /// Stamp a fresh database with [`SCHEMA_VERSION`]; refuse newer ones.
    fn check_schema(&self) -> Result<(), LmdbError> {
        let to_lmdb = |e: liquid_store::StoreError| LmdbError::Heed(e.to_string());
        let found = self.get_schema_version().map_err(to_lmdb)?;
        if found == 0 {
            self.set_schema_version(SCHEMA_VERSION).map_err(to_lmdb)?;
        } else if found > SCHEMA_VERSION {
            return Err(LmdbError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_environment_is_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        assert_eq!(env.get_schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
            env.set_schema_version(SCHEMA_VERSION + 1).unwrap();
        }
        let err = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).err().unwrap();
        assert!(matches!(err, LmdbError::UnsupportedSchema { .. }));
    }
}
