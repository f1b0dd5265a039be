//! Address decoding back to the digest a pipeline compares against.

use bech32::{FromBase32, Variant};

use crate::error::{Result, SearchError};

use super::address::{AddressKind, Network};
use super::hash::double_sha256;

/// The digest extracted from an address string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub kind: AddressKind,
    pub payload: Vec<u8>,
}

/// Decodes a P2PKH, P2WPKH, P2TR or EVM address.
///
/// EVM addresses are accepted in any letter case; the EIP-55 checksum is not
/// enforced.
pub fn decode_address(address: &str, network: Network) -> Result<DecodedAddress> {
    let address = address.trim();
    let invalid = |reason: &str| SearchError::InvalidAddress(format!("{address}: {reason}"));

    if let Some(hex_part) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        return decode_evm(hex_part).ok_or_else(|| invalid("expected 40 hex digits"));
    }

    let segwit_prefix = format!("{}1", network.hrp());
    if address.to_lowercase().starts_with(&segwit_prefix) {
        return decode_segwit(address, network).map_err(|reason| invalid(&reason));
    }

    decode_base58(address, network).map_err(|reason| invalid(&reason))
}

fn decode_evm(hex_part: &str) -> Option<DecodedAddress> {
    if hex_part.len() != 40 {
        return None;
    }
    let payload = hex::decode(hex_part).ok()?;
    Some(DecodedAddress {
        kind: AddressKind::Evm,
        payload,
    })
}

fn decode_segwit(address: &str, network: Network) -> std::result::Result<DecodedAddress, String> {
    let (hrp, data, variant) = bech32::decode(address).map_err(|e| e.to_string())?;
    if hrp != network.hrp() {
        return Err(format!("unexpected human-readable part {hrp}"));
    }
    let (version, program) = data
        .split_first()
        .ok_or_else(|| "missing witness version".to_string())?;
    let program = Vec::<u8>::from_base32(program).map_err(|e| e.to_string())?;

    match (version.to_u8(), variant, program.len()) {
        (0, Variant::Bech32, 20) => Ok(DecodedAddress {
            kind: AddressKind::SegWit,
            payload: program,
        }),
        (1, Variant::Bech32m, 32) => Ok(DecodedAddress {
            kind: AddressKind::Taproot,
            payload: program,
        }),
        (v, variant, len) => Err(format!(
            "unsupported witness program v{v} ({variant:?}, {len} bytes)"
        )),
    }
}

fn decode_base58(address: &str, network: Network) -> std::result::Result<DecodedAddress, String> {
    let raw = bs58::decode(address).into_vec().map_err(|e| e.to_string())?;
    if raw.len() != 25 {
        return Err(format!("expected 25 bytes, got {}", raw.len()));
    }
    let (body, checksum) = raw.split_at(21);
    if double_sha256(body)[..4] != *checksum {
        return Err("checksum mismatch".into());
    }
    if body[0] != network.p2pkh_version() {
        return Err(format!("unsupported version byte 0x{:02x}", body[0]));
    }
    Ok(DecodedAddress {
        kind: AddressKind::Legacy,
        payload: body[1..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_legacy() {
        let decoded = decode_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Mainnet).unwrap();
        assert_eq!(decoded.kind, AddressKind::Legacy);
        assert_eq!(
            hex::encode(decoded.payload),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn test_decode_legacy_bad_checksum() {
        assert!(decode_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMJ", Network::Mainnet).is_err());
    }

    #[test]
    fn test_decode_legacy_wrong_network() {
        assert!(decode_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Testnet).is_err());
    }

    #[test]
    fn test_decode_p2wpkh() {
        let decoded =
            decode_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Network::Mainnet).unwrap();
        assert_eq!(decoded.kind, AddressKind::SegWit);
        assert_eq!(
            hex::encode(decoded.payload),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn test_decode_taproot_round_trip() {
        use crate::crypto::encoding::{AddressEncoder, SegwitEncoder};

        let address = SegwitEncoder::new("bc", 1).encode(&[0x42; 32]).unwrap();
        let decoded = decode_address(&address, Network::Mainnet).unwrap();
        assert_eq!(decoded.kind, AddressKind::Taproot);
        assert_eq!(decoded.payload, vec![0x42; 32]);
    }

    #[test]
    fn test_decode_evm_any_case() {
        let lower = decode_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf", Network::Mainnet)
            .unwrap();
        let upper = decode_address("0x7E5F4552091A69125D5DFCB7B8C2659029395BDF", Network::Mainnet)
            .unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.kind, AddressKind::Evm);
        assert!(decode_address("0x1234", Network::Mainnet).is_err());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_address("not-an-address", Network::Mainnet),
            Err(SearchError::InvalidAddress(_))
        ));
    }
}
