//! Block decoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nodeui_core::{Block, Round};
use serde::Deserialize;
use serde_json::Value;

use crate::address::encode_key_bytes;
use crate::error::ClientError;

/// Transaction fields that carry an account address.
const ADDRESS_FIELDS: [&str; 4] = ["snd", "rcv", "close", "arcv"];

/// Turns raw block bytes from the node into a [`Block`].
pub trait BlockCodec: Send + Sync {
    /// Path query selecting the wire format this codec understands.
    fn format(&self) -> &'static str;

    fn decode(&self, round: Round, bytes: &[u8]) -> Result<Block, ClientError>;
}

/// Lenient decoder for the node's JSON block encoding.
///
/// Unknown fields are ignored and missing fields take defaults. Only input
/// that is not a block envelope at all is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBlockCodec;

#[derive(Deserialize)]
struct Envelope {
    block: Value,
    #[serde(default)]
    cert: Value,
}

impl JsonBlockCodec {
    /// Proposer address from `cert.prop.oprop`, if present and well formed.
    fn proposer(cert: &Value) -> Option<String> {
        let oprop = cert.get("prop")?.get("oprop")?.as_str()?;
        let bytes = STANDARD.decode(oprop).ok()?;
        encode_key_bytes(&bytes)
    }

    /// Replace base64 public keys in address fields with encoded addresses.
    fn normalize_addresses(block: &mut Value) {
        let Some(txns) = block.get_mut("txns").and_then(Value::as_array_mut) else {
            return;
        };
        for stxn in txns {
            let Some(txn) = stxn.get_mut("txn").and_then(Value::as_object_mut) else {
                continue;
            };
            for field in ADDRESS_FIELDS {
                if let Some(Value::String(s)) = txn.get_mut(field)
                    && let Ok(bytes) = STANDARD.decode(s.as_bytes())
                    && let Some(address) = encode_key_bytes(&bytes)
                {
                    *s = address;
                }
            }
        }
    }
}

impl BlockCodec for JsonBlockCodec {
    fn format(&self) -> &'static str {
        "json"
    }

    fn decode(&self, round: Round, bytes: &[u8]) -> Result<Block, ClientError> {
        let Envelope {
            block: mut raw,
            cert,
        } = serde_json::from_slice(bytes)?;
        if !raw.is_object() {
            return Err(ClientError::InvalidData(format!(
                "block {} is not an object",
                round
            )));
        }
        Self::normalize_addresses(&mut raw);

        let mut block: Block = serde_json::from_value(raw)?;
        if block.header.round == 0 {
            block.header.round = round;
        }
        block.proposer = Self::proposer(&cert);
        tracing::trace!(
            "Decoded block {} with {} transactions",
            block.round(),
            block.payset.len()
        );
        Ok(block)
    }
}
