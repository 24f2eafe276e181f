//! Account address encoding.
//!
//! An address is the base32 encoding (RFC 4648 alphabet, no padding) of a
//! 32-byte public key followed by the last four bytes of its SHA-512/256
//! digest, for 58 characters in total.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha512_256};

use crate::error::ClientError;

const KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

/// Length of an encoded address.
pub const ADDRESS_LEN: usize = 58;

fn checksum(key: &[u8; KEY_LEN]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha512_256::digest(key);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
    out
}

/// Encode a public key as an address.
pub fn encode_address(key: &[u8; KEY_LEN]) -> String {
    let mut payload = Vec::with_capacity(KEY_LEN + CHECKSUM_LEN);
    payload.extend_from_slice(key);
    payload.extend_from_slice(&checksum(key));
    BASE32_NOPAD.encode(&payload)
}

/// Encode raw bytes as an address when they are exactly one public key.
pub fn encode_key_bytes(bytes: &[u8]) -> Option<String> {
    let key: &[u8; KEY_LEN] = bytes.try_into().ok()?;
    Some(encode_address(key))
}

/// Decode an address back to its public key, verifying length and checksum.
pub fn decode_address(address: &str) -> Result<[u8; KEY_LEN], ClientError> {
    if address.len() != ADDRESS_LEN {
        return Err(ClientError::InvalidData(format!(
            "address must be {} characters, got {}",
            ADDRESS_LEN,
            address.len()
        )));
    }
    let bytes = BASE32_NOPAD
        .decode(address.as_bytes())
        .map_err(|e| ClientError::InvalidData(format!("{} in {}", e, address)))?;
    if bytes.len() < KEY_LEN + CHECKSUM_LEN {
        return Err(ClientError::InvalidData("address too short".to_string()));
    }

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes[..KEY_LEN]);
    if bytes[KEY_LEN..KEY_LEN + CHECKSUM_LEN] != checksum(&key) {
        return Err(ClientError::InvalidData(format!(
            "checksum mismatch for {}",
            address
        )));
    }
    Ok(key)
}

/// Validate every watch-list entry, reporting the first bad one.
pub fn validate_addresses<'a>(
    addresses: impl IntoIterator<Item = &'a String>,
) -> Result<(), ClientError> {
    for address in addresses {
        decode_address(address)
            .map_err(|e| ClientError::Config(format!("invalid address {}: {}", address, e)))?;
    }
    Ok(())
}
