use alloy::primitives::{Address, B256};
use evm_indexer_sdk::{AlloyProvider, ChainProvider, IndexerError, RetryConfig, RetryingProvider};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const BLOCK_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const TX_HASH: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

/// Responds with `result`, echoing the JSON-RPC id of the request.
fn rpc_result(result: Value) -> impl Fn(&Request) -> ResponseTemplate {
    move |req: &Request| {
        let id = serde_json::from_slice::<Value>(&req.body)
            .ok()
            .and_then(|body| body.get("id").cloned())
            .unwrap_or(json!(0));
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result.clone(),
        }))
    }
}

fn block_json(number: u64, timestamp: u64) -> Value {
    json!({
        "hash": BLOCK_HASH,
        "parentHash": format!("0x{}", "00".repeat(32)),
        "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
        "miner": format!("0x{}", "00".repeat(20)),
        "stateRoot": format!("0x{}", "00".repeat(32)),
        "transactionsRoot": format!("0x{}", "00".repeat(32)),
        "receiptsRoot": format!("0x{}", "00".repeat(32)),
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "difficulty": "0x0",
        "number": format!("{number:#x}"),
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x0",
        "timestamp": format!("{timestamp:#x}"),
        "extraData": "0x",
        "mixHash": format!("0x{}", "00".repeat(32)),
        "nonce": "0x0000000000000000",
        "baseFeePerGas": "0x7",
        "size": "0x220",
        "transactions": [],
        "uncles": []
    })
}

fn provider(server: &MockServer) -> AlloyProvider {
    AlloyProvider::new(&server.uri(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_chain_id_and_head() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("eth_chainId"))
        .respond_with(rpc_result(json!("0x7a69")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("eth_blockNumber"))
        .respond_with(rpc_result(json!("0x64")))
        .mount(&server)
        .await;

    let provider = provider(&server);
    assert_eq!(provider.chain_id().await.unwrap(), 31337);
    assert_eq!(provider.block_number().await.unwrap(), 100);
}

#[tokio::test]
async fn test_block_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("eth_getBlockByNumber"))
        .respond_with(rpc_result(block_json(100, 1_700_000_000)))
        .mount(&server)
        .await;

    let header = provider(&server).block_header(100).await.unwrap().unwrap();
    assert_eq!(header.number, 100);
    assert_eq!(header.timestamp, 1_700_000_000);
    assert_eq!(header.hash, BLOCK_HASH.parse::<B256>().unwrap());
}

#[tokio::test]
async fn test_logs_skip_pending_entries() {
    let server = MockServer::start().await;
    let topic = format!("0x{}", "ab".repeat(32));
    Mock::given(method("POST"))
        .and(body_string_contains("eth_getLogs"))
        .respond_with(rpc_result(json!([
            {
                "address": CONTRACT,
                "topics": [topic],
                "data": "0x",
                "blockNumber": "0x64",
                "blockHash": BLOCK_HASH,
                "transactionHash": TX_HASH,
                "transactionIndex": "0x0",
                "logIndex": "0x3",
                "removed": false
            },
            {
                "address": CONTRACT,
                "topics": [topic],
                "data": "0x",
                "blockNumber": null,
                "blockHash": null,
                "transactionHash": null,
                "transactionIndex": null,
                "logIndex": null,
                "removed": false
            }
        ])))
        .mount(&server)
        .await;

    let address: Address = CONTRACT.parse().unwrap();
    let logs = provider(&server).logs(90, 100, &[address]).await.unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, address);
    assert_eq!(logs[0].position(), (100, 3));
    assert_eq!(logs[0].block_timestamp, None);
}

#[tokio::test]
async fn test_rpc_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(|req: &Request| {
            let id = serde_json::from_slice::<Value>(&req.body)
                .ok()
                .and_then(|body| body.get("id").cloned())
                .unwrap_or(json!(0));
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32005, "message": "query returned more than 10000 results" }
            }))
        })
        .mount(&server)
        .await;

    let err = provider(&server).block_number().await.unwrap_err();
    assert!(matches!(err, IndexerError::RpcError(_)), "got {err:?}");
}

#[tokio::test]
async fn test_retrying_provider_recovers_from_http_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("eth_blockNumber"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("eth_blockNumber"))
        .respond_with(rpc_result(json!("0x2a")))
        .mount(&server)
        .await;

    let retrying = RetryingProvider::new(
        provider(&server),
        RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            backoff_multiplier: 1.0,
            max_backoff_ms: 5,
            jitter: false,
        },
    );
    assert_eq!(retrying.block_number().await.unwrap(), 42);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let provider = AlloyProvider::new(&server.uri(), Duration::from_millis(50)).unwrap();
    let err = provider.chain_id().await.unwrap_err();
    assert!(matches!(err, IndexerError::Timeout(_)), "got {err:?}");
}

#[test]
fn test_invalid_url_rejected() {
    let err = AlloyProvider::new("not a url", Duration::from_secs(1)).err().unwrap();
    assert!(matches!(err, IndexerError::ConfigError(_)));
}
