use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::Oaep;
use sha2::Sha256;

use crate::error::CredentialError;
use crate::keystore::KeyStore;

/// Encrypts short secrets with the public half of a [`KeyStore`] and decrypts
/// them with the private half. Ciphertext is RSA-OAEP (SHA-256) output in
/// standard base64.
#[derive(Debug, Clone)]
pub struct SecretCodec {
    keys: KeyStore,
}

impl SecretCodec {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let public_key = self.keys.public_key()?;
        let mut rng = rand::rngs::OsRng;
        let ciphertext = public_key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext.as_bytes())
            .map_err(CredentialError::Encryption)?;
        Ok(STANDARD.encode(ciphertext))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError> {
        let private_key = self.keys.private_key().map_err(|err| match err {
            CredentialError::KeyMissing { path } => CredentialError::decryption(format!(
                "private key '{}' is missing",
                path.display()
            )),
            CredentialError::InvalidKey { path, reason } => CredentialError::decryption(format!(
                "private key '{}' is unreadable: {reason}",
                path.display()
            )),
            other => other,
        })?;
        let raw = STANDARD
            .decode(ciphertext.trim())
            .map_err(|err| CredentialError::decryption(format!("invalid base64: {err}")))?;
        let plaintext = private_key
            .decrypt(Oaep::new::<Sha256>(), &raw)
            .map_err(|err| CredentialError::decryption(err.to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| CredentialError::decryption("plaintext is not valid UTF-8"))
    }
}
