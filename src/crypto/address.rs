//! Address variants and networks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::encoding::{AddressEncoder, Base58Check, Eip55, SegwitEncoder};
use super::PointFormat;

/// Bitcoin network parameters used by the encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Base58Check version byte of pay-to-pubkey-hash addresses.
    pub const fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6F,
        }
    }

    /// Human-readable part of segwit addresses.
    pub const fn hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            _ => Err(format!("Unknown network: {}", s)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// The digest domain a target address lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// P2PKH, HASH160 of a public key.
    Legacy,
    /// P2WPKH, HASH160 of a compressed public key.
    SegWit,
    /// P2TR key path, tweaked x-only output key.
    Taproot,
    /// Last 20 bytes of Keccak-256 of the raw public key.
    Evm,
}

/// The address form a pipeline derives. Chosen once per pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AddressVariant {
    Legacy { compressed: bool },
    SegWit,
    Taproot,
    Evm,
}

impl Default for AddressVariant {
    fn default() -> Self {
        AddressVariant::Legacy { compressed: true }
    }
}

impl AddressVariant {
    pub const fn kind(self) -> AddressKind {
        match self {
            AddressVariant::Legacy { .. } => AddressKind::Legacy,
            AddressVariant::SegWit => AddressKind::SegWit,
            AddressVariant::Taproot => AddressKind::Taproot,
            AddressVariant::Evm => AddressKind::Evm,
        }
    }

    /// Public key serialization fed into the hash stage.
    pub const fn point_format(self) -> PointFormat {
        match self {
            AddressVariant::Legacy { compressed: false } => PointFormat::Uncompressed,
            AddressVariant::Legacy { compressed: true } | AddressVariant::SegWit => {
                PointFormat::Compressed
            }
            AddressVariant::Taproot => PointFormat::XOnlyTweaked,
            AddressVariant::Evm => PointFormat::UncompressedRaw,
        }
    }

    /// Length of the digest compared against targets.
    pub const fn digest_len(self) -> usize {
        match self {
            AddressVariant::Taproot => 32,
            _ => 20,
        }
    }

    /// Encodes `digest` into the address string for this variant.
    pub fn encode(self, network: Network, digest: &[u8]) -> Result<String> {
        match self {
            AddressVariant::Legacy { .. } => {
                Base58Check::new(network.p2pkh_version()).encode(digest)
            }
            AddressVariant::SegWit => SegwitEncoder::new(network.hrp(), 0).encode(digest),
            AddressVariant::Taproot => SegwitEncoder::new(network.hrp(), 1).encode(digest),
            AddressVariant::Evm => Eip55.encode(digest),
        }
    }
}

impl FromStr for AddressVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" | "p2pkh" | "legacy-uncompressed" => {
                Ok(AddressVariant::Legacy { compressed: false })
            }
            "legacy-compressed" | "p2pkh-compressed" => {
                Ok(AddressVariant::Legacy { compressed: true })
            }
            "segwit" | "p2wpkh" | "bech32" => Ok(AddressVariant::SegWit),
            "taproot" | "p2tr" | "bech32m" => Ok(AddressVariant::Taproot),
            "evm" | "eth" | "ethereum" => Ok(AddressVariant::Evm),
            _ => Err(format!("Unknown address variant: {}", s)),
        }
    }
}

impl fmt::Display for AddressVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressVariant::Legacy { compressed: false } => write!(f, "legacy"),
            AddressVariant::Legacy { compressed: true } => write!(f, "legacy-compressed"),
            AddressVariant::SegWit => write!(f, "segwit"),
            AddressVariant::Taproot => write!(f, "taproot"),
            AddressVariant::Evm => write!(f, "evm"),
        }
    }
}

impl TryFrom<String> for AddressVariant {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AddressVariant> for String {
    fn from(value: AddressVariant) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trip_through_strings() {
        for variant in [
            AddressVariant::Legacy { compressed: false },
            AddressVariant::Legacy { compressed: true },
            AddressVariant::SegWit,
            AddressVariant::Taproot,
            AddressVariant::Evm,
        ] {
            assert_eq!(variant.to_string().parse::<AddressVariant>(), Ok(variant));
        }
        assert!("p2sh".parse::<AddressVariant>().is_err());
    }

    #[test]
    fn test_variant_serde() {
        let json = serde_json::to_string(&AddressVariant::SegWit).unwrap();
        assert_eq!(json, "\"segwit\"");
        let parsed: AddressVariant = serde_json::from_str("\"legacy-compressed\"").unwrap();
        assert_eq!(parsed, AddressVariant::Legacy { compressed: true });
    }

    #[test]
    fn test_point_formats() {
        assert_eq!(
            AddressVariant::Legacy { compressed: false }.point_format(),
            PointFormat::Uncompressed
        );
        assert_eq!(AddressVariant::SegWit.point_format(), PointFormat::Compressed);
        assert_eq!(AddressVariant::Evm.point_format(), PointFormat::UncompressedRaw);
        assert_eq!(AddressVariant::Taproot.digest_len(), 32);
    }

    #[test]
    fn test_network_params() {
        assert_eq!(Network::Mainnet.p2pkh_version(), 0x00);
        assert_eq!(Network::Testnet.hrp(), "tb");
        assert_eq!("TESTNET".parse::<Network>(), Ok(Network::Testnet));
    }
}
