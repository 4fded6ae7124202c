use crate::domain::types::AgentRecord;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use sha3::{Digest, Keccak256};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: U256,
    pub s: U256,
    pub y_parity: u8,
}

/// Signs transaction hashes on behalf of one agent wallet.
#[async_trait(?Send)]
pub trait SignerPort {
    fn address(&self) -> Address;
    async fn sign_hash(&self, hash: &B256) -> Result<RecoverableSignature, String>;
}

/// Boundary to the secrets component: yields the plaintext hex private key
/// for an agent record.
pub trait KeyResolver {
    fn resolve_private_key(&self, record: &AgentRecord) -> Result<String, String>;
}

impl<F> KeyResolver for F
where
    F: Fn(&AgentRecord) -> Result<String, String>,
{
    fn resolve_private_key(&self, record: &AgentRecord) -> Result<String, String> {
        self(record)
    }
}

/// secp256k1 signer over an in-memory private key.
pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalKeySigner {
    pub fn from_hex_key(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let without_prefix = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if without_prefix.len() != 64 {
            return Err("private key must be exactly 32 bytes of hex".to_string());
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(without_prefix, &mut bytes)
            .map_err(|error| format!("private key is not valid hex: {error}"))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|error| format!("private key is not a valid secp256k1 scalar: {error}"))?;
        let address = ethereum_address(&PublicKey::from(key.verifying_key()))?;
        Ok(Self { key, address })
    }

    pub fn from_record(record: &AgentRecord, resolver: &dyn KeyResolver) -> Result<Self, String> {
        let plaintext = resolver
            .resolve_private_key(record)
            .map_err(|error| format!("failed to resolve signing key: {error}"))?;
        Self::from_hex_key(&plaintext)
    }
}

#[async_trait(?Send)]
impl SignerPort for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_hash(&self, hash: &B256) -> Result<RecoverableSignature, String> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|error| format!("failed to sign transaction hash: {error}"))?;
        let bytes = signature.to_bytes();
        Ok(RecoverableSignature {
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..]),
            y_parity: u8::from(recovery_id.is_y_odd()),
        })
    }
}

fn ethereum_address(public_key: &PublicKey) -> Result<Address, String> {
    let uncompressed = public_key.to_encoded_point(false);
    let bytes = uncompressed.as_bytes();
    if bytes.len() != 65 || bytes.first().copied() != Some(0x04) {
        return Err("unexpected uncompressed public key format".to_string());
    }
    let digest = Keccak256::digest(&bytes[1..]);
    Ok(Address::from_slice(&digest[12..32]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::block_on_with_spin;
    use alloy_primitives::keccak256;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    // Well-known development key (anvil/hardhat account #0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn derives_address_from_private_key() {
        let signer = LocalKeySigner::from_hex_key(DEV_KEY).expect("key should parse");
        assert_eq!(format!("{:#x}", signer.address()), DEV_ADDRESS);

        let unprefixed = LocalKeySigner::from_hex_key(DEV_KEY.trim_start_matches("0x"))
            .expect("unprefixed key should parse");
        assert_eq!(unprefixed.address(), signer.address());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(LocalKeySigner::from_hex_key("0x1234").is_err());
        assert!(LocalKeySigner::from_hex_key(&format!("0x{}", "zz".repeat(32))).is_err());
        assert!(LocalKeySigner::from_hex_key(&format!("0x{}", "00".repeat(32))).is_err());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let signer = LocalKeySigner::from_hex_key(DEV_KEY).expect("key should parse");
        let rendered = format!("{signer:?}");
        assert!(!rendered.contains("ac0974bec39a17e3"));
    }

    #[test]
    fn signature_recovers_to_signer_address() {
        let signer = LocalKeySigner::from_hex_key(DEV_KEY).expect("key should parse");
        let hash = keccak256(b"sweep");
        let signature = block_on_with_spin(signer.sign_hash(&hash)).expect("signing should work");

        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&signature.r.to_be_bytes::<32>());
        compact[32..].copy_from_slice(&signature.s.to_be_bytes::<32>());
        let parsed = Signature::from_slice(&compact).expect("signature bytes should parse");
        let recovery_id =
            RecoveryId::from_byte(signature.y_parity).expect("y parity should be 0 or 1");
        let recovered = VerifyingKey::recover_from_prehash(hash.as_slice(), &parsed, recovery_id)
            .expect("public key should recover");
        let address = ethereum_address(&PublicKey::from(&recovered)).expect("address");
        assert_eq!(address, signer.address());
    }

    #[test]
    fn resolves_keys_through_closures() {
        let record = AgentRecord {
            id: "agent-1".to_string(),
            ..AgentRecord::default()
        };
        let resolver = |_: &AgentRecord| Ok::<_, String>(DEV_KEY.to_string());
        let signer = LocalKeySigner::from_record(&record, &resolver).expect("signer");
        assert_eq!(format!("{:#x}", signer.address()), DEV_ADDRESS);

        let failing = |_: &AgentRecord| Err::<String, _>("vault sealed".to_string());
        let error = LocalKeySigner::from_record(&record, &failing).expect_err("must fail");
        assert!(error.contains("vault sealed"));
    }
}
