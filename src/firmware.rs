use std::fmt;

use crc::{CRC_16_XMODEM, Crc, Table};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::ProtocolError;
use crate::hw::LensXmlData;

/// Length of both the base key and the device key.
pub const KEY_LEN: usize = 32;
/// Length of the encrypted header preceding each data block.
pub const BLOCK_HEADER_LEN: usize = 1024;
/// Largest data block a header may declare.
pub const MAX_BLOCK_DATA_LEN: usize = 1_048_576;

const BASE_PASSPHRASE: &[u8] = b"EncryptionToolBaseKey";
const DATA_SIZE_OFFSET: usize = 64;
const DATA_CRC_OFFSET: usize = 70;

/// Block checksum, table-driven over the same polynomial as the frame CRC.
const BLOCK_CRC: Crc<u16, Table<1>> = Crc::<u16, Table<1>>::new(&CRC_16_XMODEM);

/// Terminal outcomes of a failed decryption pass.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FirmwareError {
    #[error("decryption key must be exactly 64 hexadecimal characters")]
    InvalidKey,
    #[error("firmware image is malformed at offset {offset}")]
    InvalidFile { offset: usize },
    #[error(
        "block at offset {offset} failed its checksum (expected {expected:02X?}, computed {actual:02X?})"
    )]
    CrcMismatch {
        offset: usize,
        expected: [u8; 2],
        actual: [u8; 2],
    },
    #[error("could not allocate {requested} bytes for decrypted output")]
    Write { requested: usize },
}

/// Repeating-XOR keystream with an explicit cursor.
#[derive(Clone)]
pub struct CipherState {
    key: [u8; KEY_LEN],
    cursor: usize,
}

impl CipherState {
    /// Creates a keystream positioned at the start of `key`.
    #[must_use]
    pub const fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key, cursor: 0 }
    }

    /// Rewinds the cursor to the first key byte.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Returns the index of the next key byte.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// XORs `data` in place, advancing the cursor modulo the key length.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.key[self.cursor];
            self.cursor = (self.cursor + 1) % KEY_LEN;
        }
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

/// Expands the fixed passphrase cyclically to fill one key.
fn base_key() -> [u8; KEY_LEN] {
    let mut key = [0_u8; KEY_LEN];
    for (slot, byte) in key.iter_mut().zip(BASE_PASSPHRASE.iter().cycle()) {
        *slot = *byte;
    }
    key
}

/// Validates a 64-hex-character device key and unwraps it with the base key.
///
/// ```
/// use tapin::derive_working_key;
///
/// let key = derive_working_key("035E5241374047595E28645E5C22725243540D554876205341494132595E5D1A")?;
/// assert_eq!(b"F013N0301", &key[..9]);
/// # Ok::<(), tapin::FirmwareError>(())
/// ```
///
/// # Errors
///
/// Returns [`FirmwareError::InvalidKey`] for any string that is not 64 hex characters.
pub fn derive_working_key(device_key: &str) -> Result<[u8; KEY_LEN], FirmwareError> {
    if device_key.len() != KEY_LEN * 2 {
        return Err(FirmwareError::InvalidKey);
    }
    let mut key = [0_u8; KEY_LEN];
    hex::decode_to_slice(device_key, &mut key).map_err(|_invalid| FirmwareError::InvalidKey)?;

    let mut base = CipherState::new(base_key());
    base.apply(&mut key);
    Ok(key)
}

/// Decrypts `.tfwf` firmware images: repeated 1024-byte headers each followed by a data block.
#[derive(Debug, Clone)]
pub struct FirmwareDecryptor {
    cipher: CipherState,
}

impl FirmwareDecryptor {
    /// Creates a decryptor from a device key string.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::InvalidKey`] when the key is malformed.
    pub fn new(device_key: &str) -> Result<Self, FirmwareError> {
        Ok(Self {
            cipher: CipherState::new(derive_working_key(device_key)?),
        })
    }

    /// Creates a decryptor from the key published in a lens catalog entry.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::InvalidKey`] when the catalog key is malformed.
    pub fn from_lens_xml(data: &LensXmlData) -> Result<Self, FirmwareError> {
        Self::new(data.decrypt_key.trim())
    }

    /// Parses a lens metadata document and keys a decryptor from its published key.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Catalog`] when the document cannot be parsed and
    /// [`ProtocolError::Firmware`] when its key is malformed.
    pub fn from_lens_document(document: &str) -> Result<Self, ProtocolError> {
        let data = LensXmlData::parse(document)?;
        Ok(Self::from_lens_xml(&data)?)
    }

    /// Decrypts a whole image.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt_with_progress`].
    pub fn decrypt(&mut self, input: &[u8]) -> Result<Vec<u8>, FirmwareError> {
        self.decrypt_with_progress(input, |_percent| {})
    }

    /// Decrypts a whole image, reporting `floor(position * 100 / len)` after every header
    /// and data block.
    ///
    /// The output keeps the decrypted headers. Nothing is returned unless every block
    /// decrypts and verifies.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::InvalidFile`] for truncated blocks or oversized size fields,
    /// [`FirmwareError::CrcMismatch`] when a block fails its checksum and
    /// [`FirmwareError::Write`] when the output cannot be allocated.
    #[instrument(skip_all, fields(input_len = input.len()))]
    pub fn decrypt_with_progress(
        &mut self,
        input: &[u8],
        mut progress: impl FnMut(u8),
    ) -> Result<Vec<u8>, FirmwareError> {
        self.cipher.reset();
        let total = input.len();
        let mut output = Vec::new();
        let mut position = 0;

        while position < total {
            let block_start = position;
            let mut header: [u8; BLOCK_HEADER_LEN] = input
                .get(position..position + BLOCK_HEADER_LEN)
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or(FirmwareError::InvalidFile { offset: position })?;
            self.cipher.apply(&mut header);
            progress(percent(position, total));

            let size_bytes = [
                header[DATA_SIZE_OFFSET],
                header[DATA_SIZE_OFFSET + 1],
                header[DATA_SIZE_OFFSET + 2],
                header[DATA_SIZE_OFFSET + 3],
            ];
            let data_len = usize::try_from(u32::from_le_bytes(size_bytes))
                .ok()
                .filter(|len| *len <= MAX_BLOCK_DATA_LEN)
                .ok_or(FirmwareError::InvalidFile { offset: position })?;
            let expected = [header[DATA_CRC_OFFSET], header[DATA_CRC_OFFSET + 1]];
            position += BLOCK_HEADER_LEN;

            let encrypted = input
                .get(position..position + data_len)
                .ok_or(FirmwareError::InvalidFile { offset: position })?;
            let mut data = encrypted.to_vec();
            self.cipher.apply(&mut data);
            progress(percent(position + data_len, total));

            let actual = BLOCK_CRC.checksum(&data).to_le_bytes();
            if actual != expected {
                return Err(FirmwareError::CrcMismatch {
                    offset: block_start,
                    expected,
                    actual,
                });
            }

            let requested = BLOCK_HEADER_LEN + data_len;
            output
                .try_reserve(requested)
                .map_err(|_exhausted| FirmwareError::Write { requested })?;
            output.extend_from_slice(&header);
            output.extend_from_slice(&data);
            debug!(block_start, data_len, "decrypted firmware block");

            position += data_len;
        }

        Ok(output)
    }
}

fn percent(position: usize, total: usize) -> u8 {
    let scaled = (position as u128 * 100) / (total.max(1) as u128);
    u8::try_from(scaled).unwrap_or(100)
}
