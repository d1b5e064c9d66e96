//! Node identity: a random [`PeerId`] generated on first start and kept in
//! `<data_dir>/identity` as hex.

use std::fs;
use std::io;
use std::path::Path;

use shared_types::PeerId;
use thiserror::Error;
use tracing::info;

const IDENTITY_FILE: &str = "identity";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("cannot access identity file: {0}")]
    Io(#[from] io::Error),

    #[error("identity file is corrupted: {0}")]
    Corrupted(String),
}

/// Load the identity of the node owning `data_dir`, creating it if needed.
pub fn load_or_create(data_dir: &Path) -> Result<PeerId, IdentityError> {
    let path = data_dir.join(IDENTITY_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => text
            .trim()
            .parse()
            .map_err(|e| IdentityError::Corrupted(format!("{e}"))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(data_dir)?;
            let peer_id = PeerId::new(rand::random());
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, format!("{peer_id}\n"))?;
            fs::rename(&tmp, &path)?;
            info!(peer = %peer_id.short(), "[dal-node] Generated node identity");
            Ok(peer_id)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identity_is_stable() {
        let dir = TempDir::new().unwrap();
        let first = load_or_create(dir.path()).unwrap();
        let second = load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupted_identity_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(IDENTITY_FILE), "zz").unwrap();
        assert!(matches!(
            load_or_create(dir.path()),
            Err(IdentityError::Corrupted(_))
        ));
    }
}
