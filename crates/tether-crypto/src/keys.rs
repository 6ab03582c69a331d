//! crypto_box identity keypairs for TETHER endpoints.
//!
//! A keypair identifies one endpoint (ground station or robot) to the AEAD
//! layer. The secret key never leaves the process except through
//! [`BoxKeyPair::save`], the out-of-band provisioning path.

use anyhow::{Context, Result};
use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};
use std::fs;
use zeroize::Zeroize;

/// crypto_box key length (both public and secret).
pub const KEY_LEN: usize = 32;

/// An X25519 keypair for the NaCl box primitive.
///
/// Only the secret key is stored; the public key is derived on demand.
/// `crypto_box::SecretKey` zeroizes itself on drop.
#[derive(Clone)]
pub struct BoxKeyPair {
    secret: SecretKey,
}

impl BoxKeyPair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        Self {
            secret: SecretKey::from(*bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    pub fn public_key_bytes(&self) -> [u8; KEY_LEN] {
        *self.secret.public_key().as_bytes()
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Save the keypair to files.
    ///
    /// The secret key file gets 0600 permissions on Unix.
    pub fn save(&self, secret_path: &str, public_path: &str) -> Result<()> {
        let mut secret_bytes = self.secret.to_bytes();
        fs::write(secret_path, &secret_bytes)?;
        secret_bytes.zeroize();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(secret_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(secret_path, perms)?;
        }

        fs::write(public_path, self.public_key_bytes())?;

        Ok(())
    }

    /// Load a keypair from a secret key file.
    pub fn load(secret_path: &str) -> Result<Self> {
        let bytes = fs::read(secret_path).context("failed to read secret key")?;

        if bytes.len() != KEY_LEN {
            anyhow::bail!(
                "invalid secret key length: expected {KEY_LEN} bytes, got {}",
                bytes.len()
            );
        }

        let mut key_bytes = [0u8; KEY_LEN];
        key_bytes.copy_from_slice(&bytes);

        let keypair = Self::from_secret_bytes(&key_bytes);
        key_bytes.zeroize();

        Ok(keypair)
    }

    /// Load only a public key (a peer's provisioned identity).
    pub fn load_public(public_path: &str) -> Result<PublicKey> {
        let bytes = fs::read(public_path).context("failed to read public key")?;

        let key_bytes: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("invalid public key length: expected {KEY_LEN} bytes"))?;

        Ok(PublicKey::from(key_bytes))
    }
}

impl std::fmt::Debug for BoxKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never prints the secret half.
        f.debug_struct("BoxKeyPair")
            .field("public_key", &hex_lower(&self.public_key_bytes()))
            .finish()
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypairs_are_distinct() {
        let a = BoxKeyPair::generate();
        let b = BoxKeyPair::generate();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn secret_bytes_roundtrip() {
        let keypair = BoxKeyPair::generate();
        let restored = BoxKeyPair::from_secret_bytes(&keypair.secret.to_bytes());
        assert_eq!(restored.public_key_bytes(), keypair.public_key_bytes());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("ground.key");
        let public_path = dir.path().join("ground.pub");
        let secret_path = secret_path.to_str().unwrap();
        let public_path = public_path.to_str().unwrap();

        let keypair = BoxKeyPair::generate();
        keypair.save(secret_path, public_path).unwrap();

        let loaded = BoxKeyPair::load(secret_path).unwrap();
        assert_eq!(loaded.public_key_bytes(), keypair.public_key_bytes());

        let public = BoxKeyPair::load_public(public_path).unwrap();
        assert_eq!(*public.as_bytes(), keypair.public_key_bytes());
    }

    #[test]
    fn load_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.key");
        fs::write(&path, [0u8; 16]).unwrap();
        assert!(BoxKeyPair::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let keypair = BoxKeyPair::generate();
        let rendered = format!("{keypair:?}");
        let secret_hex = hex_lower(&keypair.secret.to_bytes());
        assert!(!rendered.contains(&secret_hex));
    }
}
