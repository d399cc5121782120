use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CredentialError;

pub const PRIVATE_KEY_FILE: &str = "private.pem";
pub const PUBLIC_KEY_FILE: &str = "public.pem";
pub const DEFAULT_KEY_BITS: usize = 2048;

/// The local RSA key pair, stored as two PEM files in one directory.
///
/// The private half is PKCS#8 and never leaves `private.pem`; the public half
/// is SPKI in `public.pem`.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
    bits: usize,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            bits: DEFAULT_KEY_BITS,
        }
    }

    pub fn with_bits(mut self, bits: usize) -> Self {
        self.bits = bits;
        self
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    pub fn exists(&self) -> bool {
        self.private_key_path().is_file() && self.public_key_path().is_file()
    }

    /// Generates a fresh key pair and replaces both key files.
    ///
    /// Both halves are written to temporary files first and only renamed into
    /// place once both writes succeeded. The previous private key is set aside
    /// until the public key lands and is put back if that rename fails, so a
    /// failure never leaves a mismatched pair behind.
    pub fn generate_key_pair(&self) -> Result<(), CredentialError> {
        fs::create_dir_all(&self.dir).map_err(|err| CredentialError::io(&self.dir, err))?;

        let mut rng = rand::rngs::OsRng;
        let private_key =
            RsaPrivateKey::new(&mut rng, self.bits).map_err(CredentialError::KeyGeneration)?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| CredentialError::InvalidKey {
                path: self.private_key_path(),
                reason: err.to_string(),
            })?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|err| CredentialError::InvalidKey {
                path: self.public_key_path(),
                reason: err.to_string(),
            })?;

        let stamp = Uuid::new_v4();
        let private_tmp = self.dir.join(format!(".private-{stamp}.tmp"));
        let public_tmp = self.dir.join(format!(".public-{stamp}.tmp"));

        let staged = write_private(&private_tmp, private_pem.as_bytes())
            .and_then(|()| write_file(&public_tmp, public_pem.as_bytes()));
        if let Err(err) = staged {
            let _ = fs::remove_file(&private_tmp);
            let _ = fs::remove_file(&public_tmp);
            return Err(err);
        }

        let private_path = self.private_key_path();
        let public_path = self.public_key_path();
        let backup = self.dir.join(format!(".private-{stamp}.bak"));
        let has_backup = match fs::rename(&private_path, &backup) {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => {
                let _ = fs::remove_file(&private_tmp);
                let _ = fs::remove_file(&public_tmp);
                return Err(CredentialError::io(&private_path, err));
            }
        };
        let restore_previous = || {
            if has_backup {
                let _ = fs::rename(&backup, &private_path);
            }
        };

        if let Err(err) = fs::rename(&private_tmp, &private_path) {
            let _ = fs::remove_file(&private_tmp);
            let _ = fs::remove_file(&public_tmp);
            restore_previous();
            return Err(CredentialError::io(&private_path, err));
        }
        if let Err(err) = fs::rename(&public_tmp, &public_path) {
            let _ = fs::remove_file(&public_tmp);
            let _ = fs::remove_file(&private_path);
            restore_previous();
            return Err(CredentialError::io(&public_path, err));
        }
        if has_backup {
            let _ = fs::remove_file(&backup);
        }

        info!(dir = %self.dir.display(), bits = self.bits, "generated new key pair");
        Ok(())
    }

    pub fn public_key_pem(&self) -> Result<String, CredentialError> {
        read_key_file(&self.public_key_path())
    }

    pub fn public_key(&self) -> Result<RsaPublicKey, CredentialError> {
        let path = self.public_key_path();
        let pem = read_key_file(&path)?;
        RsaPublicKey::from_public_key_pem(&pem).map_err(|err| CredentialError::InvalidKey {
            path,
            reason: err.to_string(),
        })
    }

    pub fn private_key(&self) -> Result<RsaPrivateKey, CredentialError> {
        let path = self.private_key_path();
        let pem = read_key_file(&path)?;
        debug!(path = %path.display(), "loaded private key");
        RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|err| CredentialError::InvalidKey {
            path,
            reason: err.to_string(),
        })
    }
}

fn read_key_file(path: &Path) -> Result<String, CredentialError> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => CredentialError::KeyMissing {
            path: path.to_path_buf(),
        },
        _ => CredentialError::io(path, err),
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), CredentialError> {
    fs::write(path, contents).map_err(|err| CredentialError::io(path, err))
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<(), CredentialError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|err| CredentialError::io(path, err))?;
    file.write_all(contents)
        .map_err(|err| CredentialError::io(path, err))
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<(), CredentialError> {
    write_file(path, contents)
}
