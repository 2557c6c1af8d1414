//! Verifier Contract Encoding
//!
//! ABI encoding of proof artifacts for an on-chain verifier that looks the
//! block root up in the EIP-4788 beacon roots contract by timestamp.

use alloy::{primitives::FixedBytes, sol, sol_types::SolCall};
use gindex_proofs::ProofArtifact;
use serde::Serialize;

sol! {
    interface IBeaconProofVerifier {
        function verifyBeaconProof(
            uint64 timestamp,
            uint64 gindex,
            bytes32 leaf,
            bytes32[] calldata witnesses
        ) external view returns (bool);
    }
}

/// Encoded verifier call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calldata {
    /// Function selector, `0x`-prefixed
    pub selector: String,
    /// Full calldata, `0x`-prefixed
    pub data: String,
}

impl Calldata {
    #[must_use]
    pub fn from_artifact(artifact: &ProofArtifact) -> Self {
        let selector = IBeaconProofVerifier::verifyBeaconProofCall::SELECTOR;
        Self {
            selector: format!("0x{}", hex::encode(selector)),
            data: format!("0x{}", hex::encode(verify_call(artifact).abi_encode())),
        }
    }
}

fn verify_call(artifact: &ProofArtifact) -> IBeaconProofVerifier::verifyBeaconProofCall {
    IBeaconProofVerifier::verifyBeaconProofCall {
        timestamp: artifact.timestamp,
        gindex: artifact.target_gindex.get(),
        leaf: FixedBytes::from(artifact.leaf),
        witnesses: artifact
            .witnesses
            .iter()
            .map(|w| FixedBytes::from(*w))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gindex_proofs::GeneralizedIndex;

    fn artifact() -> ProofArtifact {
        ProofArtifact {
            path: "state_root/slot".to_string(),
            slot: 99,
            timestamp: 1_606_825_223,
            root_hash: [0xaa; 32],
            target_gindex: GeneralizedIndex::new(0x2c2).unwrap(),
            leaf: [0x01; 32],
            leaf_value: serde_json::Value::String("1".to_string()),
            witnesses: vec![[0x02; 32], [0x03; 32]],
        }
    }

    #[test]
    fn test_calldata_layout() {
        let calldata = Calldata::from_artifact(&artifact());
        let data = hex::decode(calldata.data.trim_start_matches("0x")).unwrap();

        // selector, 4 head words, array length, 2 elements
        assert_eq!(data.len(), 4 + 32 * 7);
        assert_eq!(calldata.selector.len(), 10);
        assert!(calldata.data.starts_with(&calldata.selector));
        assert_eq!(data[4 + 31], 0x07); // low byte of the timestamp
        assert_eq!(&data[4 + 64..4 + 96], &[0x01; 32]);
    }

    #[test]
    fn test_calldata_decodes() {
        let artifact = artifact();
        let encoded = verify_call(&artifact).abi_encode();
        let decoded = IBeaconProofVerifier::verifyBeaconProofCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.timestamp, artifact.timestamp);
        assert_eq!(decoded.gindex, 0x2c2);
        assert_eq!(decoded.witnesses.len(), 2);
    }
}
