/// MultiVault Kernel: Core Domain Types
///
/// Pure data. No behaviour, no transition logic.
/// All amounts: u128 raw units, fixed-point WAD = 1e18.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Identifiers ────────────────────────────────────────────────────

/// Registry-assigned bonding curve id. Starts at 1, never reused.
pub type CurveId = u32;

/// Content-derived term identifier (SHA-256 digest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(pub [u8; 32]);

/// 20-byte account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Ghost-share sink. Never redeems, never receives deposits.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Address whose low 8 bytes hold `n` big-endian. Handy for fixtures.
    pub fn from_low_u64_be(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Address::ZERO
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| format!("invalid hex {:?}: {}", s, e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected {} bytes, got {}", N, b.len()))
}

impl FromStr for TermId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(TermId)
    }
}

impl FromStr for Address {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Address)
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(TermId);
hex_serde!(Address);

/// Serde adapter for opaque byte payloads as lowercase hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Vec<Vec<u8>>` payloads as a list of hex strings.
pub mod hex_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&hex::encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(serde::de::Error::custom))
            .collect()
    }
}

// ── Terms ──────────────────────────────────────────────────────────

/// Which kind of term an id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    Atom,
    Triple,
    CounterTriple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomRecord {
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub creator: Address,
    pub wallet: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TripleRecord {
    pub subject_id: TermId,
    pub predicate_id: TermId,
    pub object_id: TermId,
    pub counter_id: TermId,
    pub creator: Address,
}

impl TripleRecord {
    pub fn components(&self) -> [TermId; 3] {
        [self.subject_id, self.predicate_id, self.object_id]
    }
}

/// Per-term record. Counter-triples hold only the back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermRecord {
    Atom(AtomRecord),
    Triple(TripleRecord),
    CounterTriple { triple_id: TermId },
}

impl TermRecord {
    pub fn kind(&self) -> TermKind {
        match self {
            TermRecord::Atom(_) => TermKind::Atom,
            TermRecord::Triple(_) => TermKind::Triple,
            TermRecord::CounterTriple { .. } => TermKind::CounterTriple,
        }
    }
}

// ── Approvals ──────────────────────────────────────────────────────

/// Capability an owner grants an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    #[default]
    None,
    Deposit,
    Redemption,
    Both,
}

impl ApprovalType {
    pub fn allows_deposit(self) -> bool {
        matches!(self, ApprovalType::Deposit | ApprovalType::Both)
    }

    pub fn allows_redemption(self) -> bool {
        matches!(self, ApprovalType::Redemption | ApprovalType::Both)
    }
}

// ── Vault views ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultTotals {
    pub total_assets: u128,
    pub total_shares: u128,
}

/// Lifecycle position of a (term, curve) vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultPhase {
    Uninitialized,
    Bootstrapped,
    Active,
}

/// Full breakdown of what a deposit would do. Produced by the same code
/// path that executes the deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DepositQuote {
    /// Shares minted to the receiver in the target vault.
    pub shares: u128,
    /// Assets converted to shares in the target vault.
    pub assets_after_fees: u128,
    pub protocol_fee: u128,
    pub entry_fee: u128,
    pub atom_wallet_fee: u128,
    /// Amount routed into *each* underlying atom vault (triples only).
    pub atom_deposit_fraction: u128,
    /// Assets spent minting ghost shares when the deposit creates the vault.
    pub ghost_cost: u128,
    pub creates_vault: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RedeemQuote {
    /// Net assets paid to the owner.
    pub assets_after_fees: u128,
    pub shares_used: u128,
    /// Assets released by the curve before fees.
    pub gross_assets: u128,
    pub exit_fee: u128,
    pub protocol_fee: u128,
    /// True when no non-ghost shares remain afterwards (exit fee waived).
    pub full_exit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_roundtrips_through_display() {
        let a = Address::from_low_u64_be(0xdead_beef);
        let s = a.to_string();
        assert_eq!(s, "0x00000000000000000000000000000000deadbeef");
        assert_eq!(s.parse::<Address>().unwrap(), a);
    }

    #[test]
    fn term_id_rejects_wrong_length() {
        assert!("0xabcd".parse::<TermId>().is_err());
        assert!("zz".repeat(32).parse::<TermId>().is_err());
    }

    #[test]
    fn approval_capabilities() {
        assert!(!ApprovalType::None.allows_deposit());
        assert!(ApprovalType::Deposit.allows_deposit());
        assert!(!ApprovalType::Deposit.allows_redemption());
        assert!(ApprovalType::Redemption.allows_redemption());
        assert!(ApprovalType::Both.allows_deposit() && ApprovalType::Both.allows_redemption());
    }

    #[test]
    fn term_id_serializes_as_hex_string() {
        let id = TermId([0xab; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: TermId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
