use bech32::{FromBase32, ToBase32, Variant};

use crate::error::{Error, Result};

const MAINNET_PREFIX: &str = "xch";
const TESTNET_PREFIX: &str = "txch";

/// Decodes an `xch1…`/`txch1…` bech32m address or a `0x…` hex literal
/// into a 32-byte puzzle hash.
pub fn decode_address(text: &str) -> Result<[u8; 32]> {
    if let Some(raw) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let bytes = hex::decode(raw)
            .map_err(|_| invalid(text, "not valid hex"))?;
        return to_puzzle_hash(&bytes, text);
    }

    let (hrp, data, variant) =
        bech32::decode(text).map_err(|e| invalid(text, &e.to_string()))?;
    if variant != Variant::Bech32m {
        return Err(invalid(text, "not bech32m encoded"));
    }
    if hrp != MAINNET_PREFIX && hrp != TESTNET_PREFIX {
        return Err(invalid(text, &format!("unknown prefix `{hrp}`")));
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| invalid(text, &e.to_string()))?;
    to_puzzle_hash(&bytes, text)
}

/// Encodes a puzzle hash back to an address with the given prefix
/// (`xch` or `txch`).
pub fn encode_address(puzzle_hash: &[u8; 32], prefix: &str) -> Result<String> {
    bech32::encode(prefix, puzzle_hash.to_base32(), Variant::Bech32m)
        .map_err(|e| Error::serialize(format!("cannot encode address: {e}")))
}

fn to_puzzle_hash(bytes: &[u8], text: &str) -> Result<[u8; 32]> {
    if bytes.len() != 32 {
        return Err(invalid(text, &format!("expected 32 bytes, got {}", bytes.len())));
    }
    let mut hash = [0_u8; 32];
    hash.copy_from_slice(bytes);
    Ok(hash)
}

fn invalid(text: &str, reason: &str) -> Error {
    Error::Semantic {
        message: format!("Invalid Chia address `{text}`: {reason}"),
        offset: None,
    }
}
