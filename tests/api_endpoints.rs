//! Integration tests for UFChain API endpoints
//!
//! Drives the router end to end: wallet creation, minting, transfers,
//! block lookup, validators and error status mapping.

#![cfg(feature = "api")]

use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use ufchain::api::build_api_router;
use ufchain::ledger::Ledger;

fn server_with_validator() -> TestServer {
    let ledger = Ledger::in_memory().expect("Failed to open ledger");
    ledger
        .register_validator(vec![0x42; 64], 10)
        .expect("Failed to register validator");
    TestServer::new(build_api_router(Arc::new(ledger))).expect("Failed to create test server")
}

#[tokio::test]
async fn test_health_and_stats() {
    let server = server_with_validator();

    let response = server.get("/api/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["height"], 0);
    assert!(json["timestamp"].is_string());

    let response = server.get("/api/stats").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["blocks"], 1);
    assert_eq!(json["validators"], 1);
    assert_eq!(json["total_stake"], 10);
    assert!(json["total_requests"].is_number());
    assert!(json["uptime_seconds"].is_number());
}

#[tokio::test]
async fn test_wallet_mint_transfer_flow() {
    let server = server_with_validator();

    let alice: Value = server.post("/api/wallet").await.json();
    let bob: Value = server.post("/api/wallet").await.json();
    let alice_address = alice["address"].as_str().unwrap().to_string();
    let bob_address = bob["address"].as_str().unwrap().to_string();
    assert_eq!(alice["public_key"].as_str().unwrap().len(), 128);

    let response = server
        .post(&format!("/api/wallet/{}/mint", alice_address))
        .json(&json!({ "amount": 1000, "private_key": alice["private_key"] }))
        .await;
    assert_eq!(response.status_code(), 201);
    let block: Value = response.json();
    assert_eq!(block["transactions"][0]["outputs"][0]["value"], 1000);
    assert_eq!(block["validator"], "42".repeat(64));

    let response = server
        .post("/api/transaction")
        .json(&json!({
            "from": alice_address,
            "to": bob_address,
            "amount": 400,
            "private_key": alice["private_key"],
        }))
        .await;
    assert_eq!(response.status_code(), 201);
    let block: Value = response.json();
    let block_hash = block["hash"].as_str().unwrap().to_string();

    let balance: Value = server
        .get(&format!("/api/wallet/{}/balance", alice_address))
        .await
        .json();
    assert_eq!(balance["balance"], 600);

    let info: Value = server.get(&format!("/api/wallet/{}", bob_address)).await.json();
    assert_eq!(info["balance"], 400);
    assert_eq!(info["public_key"], bob["public_key"]);

    let response = server.get(&format!("/api/block/{}", block_hash)).await;
    assert_eq!(response.status_code(), 200);
    let fetched: Value = response.json();
    assert_eq!(fetched["hash"], block_hash.as_str());
    assert_eq!(fetched["transactions"][0]["outputs"].as_array().unwrap().len(), 2);

    let blocks: Value = server.get("/api/blocks").await.json();
    let blocks = blocks.as_array().unwrap();
    assert_eq!(blocks.len(), 3);
    assert!(blocks[0]["previous_hash"].is_null());
    assert_eq!(blocks[2]["previous_hash"], blocks[1]["hash"]);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let server = server_with_validator();
    let alice: Value = server.post("/api/wallet").await.json();
    let bob: Value = server.post("/api/wallet").await.json();

    // Overspend is a validation error.
    let response = server
        .post("/api/transaction")
        .json(&json!({
            "from": alice["address"],
            "to": bob["public_key"],
            "amount": 5,
            "private_key": alice["private_key"],
        }))
        .await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("Insufficient funds"));

    // Wrong key for the wallet.
    let response = server
        .post("/api/transaction")
        .json(&json!({
            "from": alice["address"],
            "to": bob["address"],
            "amount": 5,
            "private_key": bob["private_key"],
        }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = server
        .get("/api/wallet/0x0000000000000000000000000000000000000000")
        .await;
    assert_eq!(response.status_code(), 404);

    let response = server.get(&format!("/api/block/{}", "00".repeat(32))).await;
    assert_eq!(response.status_code(), 404);

    let response = server.get("/api/block/not-hex").await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_no_validator_is_service_unavailable() {
    let ledger = Ledger::in_memory().expect("Failed to open ledger");
    let server = TestServer::new(build_api_router(Arc::new(ledger))).unwrap();
    let alice: Value = server.post("/api/wallet").await.json();

    let response = server
        .post(&format!("/api/wallet/{}/mint", alice["address"].as_str().unwrap()))
        .json(&json!({ "amount": 10, "private_key": alice["private_key"] }))
        .await;
    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn test_validators_and_contracts() {
    let server = server_with_validator();

    let response = server
        .post("/api/validators")
        .json(&json!({ "public_key": "07".repeat(64), "stake": 5 }))
        .await;
    assert_eq!(response.status_code(), 201);

    let response = server
        .post("/api/validators")
        .json(&json!({ "public_key": "07", "stake": 5 }))
        .await;
    assert_eq!(response.status_code(), 400);

    let validators: Value = server.get("/api/validators").await.json();
    let validators = validators.as_array().unwrap();
    assert_eq!(validators.len(), 2);
    assert_eq!(validators[0]["public_key"], "07".repeat(64));

    let response = server
        .post("/api/contract")
        .json(&json!({ "code": "" }))
        .await;
    assert_eq!(response.status_code(), 400);

    let contract: Value = server
        .post("/api/contract")
        .json(&json!({ "code": "store" }))
        .await
        .json();
    let id = contract["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/contract/{}/execute", id))
        .json(&json!({ "input": { "x": 1 } }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["state"]["lastExecution"], json!({ "x": 1 }));

    let response = server
        .post("/api/contract/unknown/execute")
        .json(&json!({ "input": null }))
        .await;
    assert_eq!(response.status_code(), 404);
}
