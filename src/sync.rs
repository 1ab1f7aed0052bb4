//! Encrypted database snapshots pushed to and pulled from a remote store.
//!
//! Only the remote contract lives here; provider accounts, OAuth and the
//! network transport belong to the [`RemoteStore`] implementation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, VaultError};
use crate::file_cipher::FileCipher;
use crate::session::VaultSession;
use crate::storage::Storage;

/// Name every push uploads to, overwriting the previous snapshot.
pub const BACKUP_FILE_NAME: &str = "safekey_backup.dat";
const BACKUP_PREFIX: &str = "safekey_backup";

/// Minimal file-level surface of a remote storage provider.
pub trait RemoteStore {
    fn upload(&self, local: &Path, name: &str) -> Result<()>;
    fn download(&self, name: &str, local: &Path) -> Result<()>;
    fn list(&self) -> Result<Vec<String>>;
    fn delete(&self, name: &str) -> Result<()>;
}

/// True for current and legacy snapshot names (`safekey_backup*.dat|.db`).
pub fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX) && (name.ends_with(".dat") || name.ends_with(".db"))
}

/// Most recent snapshot on the remote: the fixed name if present, otherwise
/// the greatest legacy (timestamped) name.
pub fn latest_backup(remote: &dyn RemoteStore) -> Result<Option<String>> {
    let mut backups: Vec<String> = remote
        .list()?
        .into_iter()
        .filter(|n| is_backup_name(n))
        .collect();

    if backups.iter().any(|n| n == BACKUP_FILE_NAME) {
        return Ok(Some(BACKUP_FILE_NAME.to_string()));
    }
    backups.sort();
    Ok(backups.pop())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub name: String,
    pub pruned: Vec<String>,
}

pub struct Snapshotter<'a> {
    session: &'a VaultSession,
    remote: &'a dyn RemoteStore,
}

impl<'a> Snapshotter<'a> {
    pub fn new(session: &'a VaultSession, remote: &'a dyn RemoteStore) -> Self {
        Self { session, remote }
    }

    /// Encrypts `database` and uploads it as [`BACKUP_FILE_NAME`], then
    /// deletes older snapshots. A failed deletion is logged, not returned.
    pub fn push(&self, database: &Path) -> Result<PushReport> {
        let cipher = self.session.cipher()?;
        let staging = staging_dir()?;
        let sealed = staging.path().join("safekey_backup_encrypted.dat");

        FileCipher::new(&cipher).encrypt_file(database, &sealed)?;

        let existing = self.remote.list()?;
        self.remote.upload(&sealed, BACKUP_FILE_NAME)?;
        info!(database = %database.display(), name = BACKUP_FILE_NAME, "snapshot uploaded");

        let mut pruned = Vec::new();
        for old in existing
            .into_iter()
            .filter(|n| is_backup_name(n) && n != BACKUP_FILE_NAME)
        {
            match self.remote.delete(&old) {
                Ok(()) => {
                    debug!(name = %old, "old snapshot deleted");
                    pruned.push(old);
                }
                Err(e) => warn!(name = %old, error = %e, "could not delete old snapshot"),
            }
        }

        Ok(PushReport {
            name: BACKUP_FILE_NAME.to_string(),
            pruned,
        })
    }

    /// Name of the snapshot [`pull`](Self::pull) would restore.
    pub fn latest(&self) -> Result<Option<String>> {
        latest_backup(self.remote)
    }

    /// Downloads the latest snapshot and decrypts it to `output`.
    pub fn pull(&self, output: &Path) -> Result<String> {
        let cipher = self.session.cipher()?;
        let name = self
            .latest()?
            .ok_or_else(|| VaultError::Remote("no snapshot found".to_string()))?;

        let staging = staging_dir()?;
        let sealed = staging.path().join(&name);
        self.remote.download(&name, &sealed)?;

        FileCipher::new(&cipher).decrypt_file(&sealed, output)?;
        info!(name = %name, output = %output.display(), "snapshot restored");
        Ok(name)
    }
}

fn staging_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir().map_err(|e| VaultError::io(std::env::temp_dir(), e))
}

/// A directory used as the remote, e.g. a locally mounted cloud drive.
#[derive(Debug, Clone)]
pub struct DirRemote {
    root: PathBuf,
}

impl DirRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(VaultError::Remote(format!("invalid remote file name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

impl RemoteStore for DirRemote {
    fn upload(&self, local: &Path, name: &str) -> Result<()> {
        let target = self.entry(name)?;
        let data = fs::read(local).map_err(|e| VaultError::io(local, e))?;
        Storage::new(target).save(&data)
    }

    fn download(&self, name: &str, local: &Path) -> Result<()> {
        let source = self.entry(name)?;
        let data = fs::read(&source).map_err(|e| VaultError::io(&source, e))?;
        Storage::new(local).save(&data)
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| VaultError::io(&self.root, e))? {
            let entry = entry.map_err(|e| VaultError::io(&self.root, e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let target = self.entry(name)?;
        fs::remove_file(&target).map_err(|e| VaultError::io(&target, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use crate::crypto::KdfParams;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn unlocked_session(dir: &Path, password: &str) -> VaultSession {
        let config =
            VaultConfig::new(dir.join("master.key")).with_kdf(KdfParams::pbkdf2(1_000).unwrap());
        let session = VaultSession::new(&config);
        session.initialize(password).unwrap();
        session
    }

    #[test]
    fn backup_names_are_recognized() {
        assert!(is_backup_name("safekey_backup.dat"));
        assert!(is_backup_name("safekey_backup_2024-01-01.db"));
        assert!(!is_backup_name("safekey.db"));
        assert!(!is_backup_name("safekey_backup.tmp"));
    }

    #[test]
    fn push_then_pull_restores_database() {
        let local = tempdir().unwrap();
        let cloud = tempdir().unwrap();
        let session = unlocked_session(local.path(), "pw");
        let remote = DirRemote::new(cloud.path());

        let db = local.path().join("safekey.db");
        fs::write(&db, b"SQLite format 3\0records").unwrap();

        let report = Snapshotter::new(&session, &remote).push(&db).unwrap();
        assert_eq!(report.name, BACKUP_FILE_NAME);
        assert!(cloud.path().join(BACKUP_FILE_NAME).exists());

        let restored = local.path().join("restored.db");
        let name = Snapshotter::new(&session, &remote).pull(&restored).unwrap();
        assert_eq!(name, BACKUP_FILE_NAME);
        assert_eq!(fs::read(restored).unwrap(), b"SQLite format 3\0records");
    }

    #[test]
    fn push_prunes_legacy_snapshots_only() {
        let local = tempdir().unwrap();
        let cloud = tempdir().unwrap();
        let session = unlocked_session(local.path(), "pw");
        let remote = DirRemote::new(cloud.path());

        fs::write(cloud.path().join("safekey_backup_1700000000.db"), b"old").unwrap();
        fs::write(cloud.path().join("notes.txt"), b"keep me").unwrap();
        let db = local.path().join("safekey.db");
        fs::write(&db, b"db").unwrap();

        let report = Snapshotter::new(&session, &remote).push(&db).unwrap();

        assert_eq!(report.pruned, vec!["safekey_backup_1700000000.db".to_string()]);
        assert_eq!(
            remote.list().unwrap(),
            vec![BACKUP_FILE_NAME.to_string(), "notes.txt".to_string()]
        );
    }

    #[test]
    fn latest_prefers_fixed_name_then_newest_legacy() {
        let cloud = tempdir().unwrap();
        let remote = DirRemote::new(cloud.path());
        assert_eq!(latest_backup(&remote).unwrap(), None);

        fs::write(cloud.path().join("safekey_backup_1.dat"), b"").unwrap();
        fs::write(cloud.path().join("safekey_backup_2.dat"), b"").unwrap();
        assert_eq!(
            latest_backup(&remote).unwrap().as_deref(),
            Some("safekey_backup_2.dat")
        );

        fs::write(cloud.path().join(BACKUP_FILE_NAME), b"").unwrap();
        assert_eq!(latest_backup(&remote).unwrap().as_deref(), Some(BACKUP_FILE_NAME));
    }

    #[test]
    fn latest_tracks_pushes() {
        let local = tempdir().unwrap();
        let cloud = tempdir().unwrap();
        let session = unlocked_session(local.path(), "pw");
        let remote = DirRemote::new(cloud.path());
        let snapshots = Snapshotter::new(&session, &remote);
        assert_eq!(snapshots.latest().unwrap(), None);

        fs::write(cloud.path().join("safekey_backup_1700000000.dat"), b"old").unwrap();
        assert_eq!(
            snapshots.latest().unwrap().as_deref(),
            Some("safekey_backup_1700000000.dat")
        );

        let db = local.path().join("safekey.db");
        fs::write(&db, b"db").unwrap();
        snapshots.push(&db).unwrap();
        assert_eq!(snapshots.latest().unwrap().as_deref(), Some(BACKUP_FILE_NAME));
    }

    #[test]
    fn push_requires_loaded_key() {
        let local = tempdir().unwrap();
        let cloud = tempdir().unwrap();
        let session = unlocked_session(local.path(), "pw");
        session.lock();
        let remote = DirRemote::new(cloud.path());

        let err = Snapshotter::new(&session, &remote)
            .push(&local.path().join("safekey.db"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyNotLoaded);
        assert!(remote.list().unwrap().is_empty());
    }

    #[test]
    fn pull_without_snapshot_is_remote_error() {
        let local = tempdir().unwrap();
        let cloud = tempdir().unwrap();
        let session = unlocked_session(local.path(), "pw");

        let err = Snapshotter::new(&session, &DirRemote::new(cloud.path()))
            .pull(&local.path().join("out.db"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    #[test]
    fn remote_names_cannot_escape_root() {
        let cloud = tempdir().unwrap();
        let remote = DirRemote::new(cloud.path());
        assert_eq!(remote.delete("../x").unwrap_err().kind(), ErrorKind::Remote);
        assert_eq!(remote.delete("..").unwrap_err().kind(), ErrorKind::Remote);
    }
}
