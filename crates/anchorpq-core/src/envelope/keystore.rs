//! Keypair persistence.
//!
//! A keypair is stored as the KEM's standard byte encodings in a
//! length-prefixed container, never as a serialized object graph:
//!
//! ```text
//! magic (8) ‖ format version (1) ‖ parameter-set tag (1)
//! ‖ u32_be ek_len ‖ ek ‖ u32_be dk_len ‖ dk
//! ‖ key_id (16) ‖ generated_at (i64 be)
//! ```
//!
//! Key files are created with 0600 permissions; loads refuse files that
//! are readable by group or world.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::kem::{KemKeyPair, ParameterSet};
use super::EnvelopeError;

const KEY_FILE_MAGIC: &[u8; 8] = b"ANCHORPQ";
const KEY_FILE_VERSION: u8 = 1;

/// Writes `keypair` to `path` with 0600 permissions.
///
/// # Errors
///
/// Returns [`EnvelopeError::KeySaveFailed`] on any I/O failure or when
/// the resulting file ends up with permissive mode bits.
pub fn persist(keypair: &KemKeyPair, path: &Path) -> Result<(), EnvelopeError> {
    let save_failed = |reason: String| EnvelopeError::KeySaveFailed {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
    }

    let public_bytes = keypair.public_key().raw_bytes();
    let private_bytes = keypair.private_key_bytes();

    let mut contents = Zeroizing::new(Vec::with_capacity(
        KEY_FILE_MAGIC.len() + 2 + 8 + public_bytes.len() + private_bytes.len() + 16 + 8,
    ));
    contents.extend_from_slice(KEY_FILE_MAGIC);
    contents.push(KEY_FILE_VERSION);
    contents.push(keypair.parameter_set().tag());
    contents.extend_from_slice(
        &u32::try_from(public_bytes.len())
            .map_err(|_| save_failed("public key too large".to_string()))?
            .to_be_bytes(),
    );
    contents.extend_from_slice(&public_bytes);
    contents.extend_from_slice(
        &u32::try_from(private_bytes.len())
            .map_err(|_| save_failed("private key too large".to_string()))?
            .to_be_bytes(),
    );
    contents.extend_from_slice(&private_bytes);
    contents.extend_from_slice(keypair.key_id().as_bytes());
    contents.extend_from_slice(&keypair.generated_at().to_be_bytes());

    // Replace atomically enough for a single-writer daemon: create new,
    // refuse to clobber a file we did not create with 0600.
    if path.exists() {
        fs::remove_file(path).map_err(|e| save_failed(e.to_string()))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| save_failed(e.to_string()))?;
    file.write_all(&contents)
        .map_err(|e| save_failed(e.to_string()))?;
    file.sync_all().map_err(|e| save_failed(e.to_string()))?;

    let mode = fs::metadata(path)
        .map_err(|e| save_failed(e.to_string()))?
        .permissions()
        .mode();
    if mode & 0o077 != 0 {
        let _ = fs::remove_file(path);
        return Err(save_failed(format!("insecure permissions {mode:o}")));
    }

    info!(path = %path.display(), key_id = %keypair.key_id(), "keypair persisted");
    Ok(())
}

/// Loads a keypair previously written by [`persist`].
///
/// # Errors
///
/// Returns [`EnvelopeError::KeyLoadFailed`] on a missing file, insecure
/// permissions, or a malformed container, and
/// [`EnvelopeError::InvalidPrivateKey`] when the key bytes fail
/// structural validation.
pub fn load(path: &Path) -> Result<KemKeyPair, EnvelopeError> {
    let load_failed = |reason: String| EnvelopeError::KeyLoadFailed {
        path: path.display().to_string(),
        reason,
    };

    if !path.exists() {
        return Err(load_failed("file does not exist".to_string()));
    }

    let mode = fs::metadata(path)
        .map_err(|e| load_failed(e.to_string()))?
        .permissions()
        .mode();
    if mode & 0o077 != 0 {
        return Err(load_failed(format!("insecure permissions {mode:o}")));
    }

    let mut file = fs::File::open(path).map_err(|e| load_failed(e.to_string()))?;
    let mut contents = Zeroizing::new(Vec::new());
    file.read_to_end(&mut contents)
        .map_err(|e| load_failed(e.to_string()))?;

    let mut reader = KeyFileReader::new(&contents);

    let magic = reader.take(KEY_FILE_MAGIC.len()).map_err(load_failed)?;
    if magic != &KEY_FILE_MAGIC[..] {
        return Err(load_failed("bad magic".to_string()));
    }
    let version = reader.take_u8().map_err(load_failed)?;
    if version != KEY_FILE_VERSION {
        return Err(load_failed(format!("unsupported format version {version}")));
    }
    let parameter_set = ParameterSet::from_tag(reader.take_u8().map_err(load_failed)?)
        .ok_or_else(|| load_failed("unknown parameter-set tag".to_string()))?;

    let public_len = reader.take_u32().map_err(load_failed)? as usize;
    let public_bytes = reader.take(public_len).map_err(load_failed)?.to_vec();
    let private_len = reader.take_u32().map_err(load_failed)? as usize;
    let private_bytes = Zeroizing::new(reader.take(private_len).map_err(load_failed)?.to_vec());

    let key_id_bytes: [u8; 16] = reader
        .take(16)
        .map_err(load_failed)?
        .try_into()
        .map_err(|_| load_failed("short key id".to_string()))?;
    let key_id = Uuid::from_bytes(key_id_bytes);

    let generated_at_bytes: [u8; 8] = reader
        .take(8)
        .map_err(load_failed)?
        .try_into()
        .map_err(|_| load_failed("short timestamp".to_string()))?;
    let generated_at = i64::from_be_bytes(generated_at_bytes);

    reader.ensure_exhausted().map_err(load_failed)?;

    let keypair = KemKeyPair::from_parts(
        parameter_set,
        &public_bytes,
        &private_bytes,
        key_id,
        generated_at,
    )?;
    info!(path = %path.display(), key_id = %key_id, "keypair loaded");
    Ok(keypair)
}

struct KeyFileReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> KeyFileReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| "truncated key file".to_string())?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, String> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn ensure_exhausted(&self) -> Result<(), String> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err("trailing bytes in key file".to_string())
        }
    }
}
