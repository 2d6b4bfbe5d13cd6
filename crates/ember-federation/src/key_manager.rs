//! Loads or provisions this server's signing key, persisted in the store's
//! `meta` column rather than a dedicated table — the key is process-wide
//! metadata, the same class of thing as the `event_idx` counter it already
//! holds.

use ember_store::{columns, Store};
use tracing::{info, warn};

use crate::error::FederationResult;
use crate::keys::ServerSigningKey;

const META_SIGNING_KEY: &[u8] = b"federation_signing_key";
const KEY_VERSION: &str = "a_1";

/// Loads this server's signing key from the store, generating and
/// persisting one on first run.
pub struct KeyManager {
    store: Store,
}

impl KeyManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Return the active `ServerSigningKey`, generating one if this is the
    /// first run.
    pub fn load_or_generate(&self) -> FederationResult<ServerSigningKey> {
        if let Some(der) = self.store.get_cf(columns::META, META_SIGNING_KEY)? {
            let key = ServerSigningKey::from_der(&der, KEY_VERSION)?;
            info!("federation: loaded signing key {}", key.key_id());
            return Ok(key);
        }

        warn!("no federation signing key found — generating a new Ed25519 key pair");
        let (key, der) = ServerSigningKey::generate(KEY_VERSION)?;

        let cf = self.store.cf(columns::META)?;
        self.store.db().put_cf(cf, META_SIGNING_KEY, &der)?;

        info!("federation: generated and persisted new signing key {}", key.key_id());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_store::StoreOptions;

    #[test]
    fn generates_once_then_loads_the_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();

        let first = KeyManager::new(store.clone()).load_or_generate().unwrap();
        let second = KeyManager::new(store).load_or_generate().unwrap();

        assert_eq!(first.key_id(), second.key_id());
        assert_eq!(first.public_key_base64(), second.public_key_base64());
    }
}
