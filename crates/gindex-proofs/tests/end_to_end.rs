//! End-to-end proof requests against a mocked beacon node

use gindex_proofs::hash::to_hex;
use gindex_proofs::merkleize::Merkleize;
use gindex_proofs::types::{BeaconBlockHeader, BeaconState, PendingConsolidation, Validator};
use gindex_proofs::{BeaconClient, BlockId, ProofRequest, Prover, ProverError};
use serde_json::json;
use ssz_rs::prelude::Vector;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENESIS_TIME: u64 = 1_606_824_023;

fn state() -> BeaconState {
    let mut state = BeaconState::default();
    state.genesis_time = GENESIS_TIME;
    state.slot = 99;
    for i in 0..8u8 {
        let mut validator = Validator::default();
        validator.pubkey = Vector::try_from(vec![i; 48]).unwrap();
        validator.withdrawal_credentials = [0x01; 32];
        validator.withdrawal_credentials[31] = i;
        validator.effective_balance = 32_000_000_000;
        validator.activation_epoch = 1000 + u64::from(i);
        validator.exit_epoch = u64::MAX;
        validator.withdrawable_epoch = u64::MAX;
        state.validators.push(validator);
        state.balances.push(32_000_000_000 + u64::from(i));
    }
    state.pending_consolidations.push(PendingConsolidation {
        source_index: 6,
        target_index: 2,
    });
    state
}

fn header_json(header: &BeaconBlockHeader, canonical: bool) -> serde_json::Value {
    json!({
        "root": to_hex(&header.root().unwrap()),
        "canonical": canonical,
        "header": {
            "message": {
                "slot": header.slot.to_string(),
                "proposer_index": header.proposer_index.to_string(),
                "parent_root": to_hex(&header.parent_root),
                "state_root": to_hex(&header.state_root),
                "body_root": to_hex(&header.body_root),
            },
            "signature": format!("0x{}", "00".repeat(96)),
        }
    })
}

/// Serves block 99 with its state and a canonical child at slot 100.
async fn mock_node(state: &BeaconState) -> (MockServer, BeaconBlockHeader) {
    let server = MockServer::start().await;
    let header = BeaconBlockHeader {
        slot: 99,
        proposer_index: 3,
        parent_root: [0x11; 32],
        state_root: state.root().unwrap(),
        body_root: [0x22; 32],
    };
    let child = BeaconBlockHeader {
        slot: 100,
        proposer_index: 4,
        parent_root: header.root().unwrap(),
        state_root: [0x33; 32],
        body_root: [0x44; 32],
    };

    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/headers/99"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": header_json(&header, true) })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eth/v2/debug/beacon/states/99"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ssz_rs::serialize(state).unwrap()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/headers"))
        .and(query_param("parent_root", to_hex(&header.root().unwrap()).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [header_json(&child, true)] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/genesis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "genesis_time": GENESIS_TIME.to_string() }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/config/spec"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "SECONDS_PER_SLOT": "12" }
        })))
        .mount(&server)
        .await;

    (server, header)
}

fn request(path: &str) -> ProofRequest {
    ProofRequest {
        block_id: BlockId::Slot(99),
        path: path.parse().unwrap(),
    }
}

#[tokio::test]
async fn test_prove_through_beacon_api() {
    let state = state();
    let (server, header) = mock_node(&state).await;
    let prover = Prover::connect(BeaconClient::new(server.uri())).await.unwrap();
    assert_eq!(prover.config().seconds_per_slot, 12);

    let cases = [
        ("slot", json!("99")),
        ("state_root", json!(to_hex(&header.state_root))),
        ("state_root/slot", json!("99")),
        ("state_root/validators/__len__", json!("8")),
        ("state_root/validators/5/activation_epoch", json!("1005")),
        ("state_root/validators/5/slashed", json!(false)),
        ("state_root/balances/7", json!("32000000007")),
        ("state_root/pending_consolidations/0/source_index", json!("6")),
    ];
    for (path, expected) in cases {
        let artifact = prover.prove(&request(path)).await.unwrap();
        assert_eq!(artifact.root_hash, header.root().unwrap(), "{path}");
        assert_eq!(artifact.leaf_value, expected, "{path}");
        assert_eq!(artifact.slot, 99);
        assert_eq!(artifact.timestamp, 1_606_825_223);
        artifact.verify().unwrap();
    }
}

#[tokio::test]
async fn test_artifact_json_round_trip() {
    let state = state();
    let (server, _header) = mock_node(&state).await;
    let prover = Prover::connect(BeaconClient::new(server.uri())).await.unwrap();

    let artifact = prover
        .prove(&request("state_root/validators/1/withdrawal_credentials"))
        .await
        .unwrap();
    let json = serde_json::to_string_pretty(&artifact).unwrap();
    assert!(json.contains("\"targetGIndex\""));
    assert!(json.contains("\"leafValue\""));

    let decoded: gindex_proofs::ProofArtifact = serde_json::from_str(&json).unwrap();
    decoded.verify().unwrap();
    assert_eq!(decoded, artifact);
}

#[tokio::test]
async fn test_missing_block_is_source_error() {
    let state = state();
    let (server, _header) = mock_node(&state).await;
    let prover = Prover::connect(BeaconClient::new(server.uri())).await.unwrap();

    let err = prover
        .prove(&ProofRequest {
            block_id: BlockId::Slot(500),
            path: "slot".parse().unwrap(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ProverError::SourceUnavailable(_)));
}
