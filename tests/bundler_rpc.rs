//! User operation submission and account reads against a scripted JSON-RPC endpoint.
//!
//! One local server plays the chain node, the bundler and the paymaster.

use alloy::{
    eips::eip7702::constants::EIP7702_DELEGATION_DESIGNATOR,
    primitives::{Address, B256, Bytes, FixedBytes, Signature, U256, address, b256, bytes},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol_types::{SolCall, SolValue},
};
use http_body_util::{BodyExt, Full};
use hyper::{
    Request, Response, body::Incoming, header::CONTENT_TYPE, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use kernel_kit::{
    bundler::{BundlerClient, UserOpSender},
    constants::{EIP1271_MAGIC_VALUE, ECDSA_VALIDATOR, ENTRYPOINT_V07, KERNEL_V3_3_IMPLEMENTATION},
    eip712::AccountDomain,
    error::{ReadError, SubmitError},
    poll::PollConfig,
    signers::{DynSigner, KernelSigner},
    types::{
        AccountReader, Call, IEntryPoint, IKernel, KernelReader, SignatureEnvelope, UserOperation,
        ValidationId,
    },
    verify::{SignatureVerifier, UnverifiableReason, ValidationOutcome},
};
use serde_json::{Value, json};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};
use tokio::net::TcpListener;
use url::Url;

const CHAIN_ID: u64 = 8453;
const PAYMASTER: Address = address!("0x00000000000000000000000000000000000000aa");
const USER_OP_HASH: B256 =
    b256!("0x1111111111111111111111111111111111111111111111111111111111111111");
const TX_HASH: B256 = b256!("0x2222222222222222222222222222222222222222222222222222222222222222");

/// How the endpoint answers `isValidSignature`.
#[derive(Debug, Clone, Copy)]
enum SignatureAnswer {
    Magic,
    /// `execution reverted` with the given revert data.
    Revert(&'static str),
    /// A node error unrelated to execution.
    NodeError,
    /// An empty return value.
    Empty,
}

#[derive(Debug, Clone)]
struct Script {
    delegated: bool,
    stub_is_final: bool,
    /// Receipt polls answered with `null` before the receipt shows up.
    pending_receipts: u32,
    /// `Some(success)` once included, `None` if never included.
    receipt: Option<bool>,
    send_error: Option<&'static str>,
    signature: SignatureAnswer,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            delegated: false,
            stub_is_final: false,
            pending_receipts: 1,
            receipt: Some(true),
            send_error: None,
            signature: SignatureAnswer::Magic,
        }
    }
}

#[derive(Debug)]
struct Node {
    script: Script,
    requests: Mutex<Vec<(String, Value)>>,
    receipt_polls: AtomicU32,
}

impl Node {
    fn handle(&self, request: &Value) -> Value {
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"].clone();
        self.requests.lock().unwrap().push((method.clone(), params.clone()));

        match self.respond(&method, &params) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
            Err(error) => json!({ "jsonrpc": "2.0", "id": request["id"], "error": error }),
        }
    }

    fn respond(&self, method: &str, params: &Value) -> Result<Value, Value> {
        let script = &self.script;
        match method {
            "eth_call" => self.call(params),
            "eth_getCode" if script.delegated => Ok(json!(Bytes::from(
                [&EIP7702_DELEGATION_DESIGNATOR[..], KERNEL_V3_3_IMPLEMENTATION.as_slice()]
                    .concat()
            ))),
            "eth_getCode" => Ok(json!("0x")),
            "eth_getTransactionCount" => Ok(json!("0x3")),
            "eth_feeHistory" => Ok(json!({
                "oldestBlock": "0x1",
                "baseFeePerGas": ["0x3b9aca00", "0x3b9aca00"],
                "gasUsedRatio": [0.5],
                "reward": [["0x5f5e100"]]
            })),
            "pm_getPaymasterStubData" => Ok(json!({
                "paymaster": PAYMASTER,
                "paymasterData": "0xaa",
                "paymasterVerificationGasLimit": "0x8000",
                "paymasterPostOpGasLimit": "0x1000",
                "isFinal": script.stub_is_final
            })),
            "eth_estimateUserOperationGas" => Ok(json!({
                "preVerificationGas": "0xc350",
                "verificationGasLimit": "0x20000",
                "callGasLimit": "0x10000"
            })),
            "pm_getPaymasterData" => {
                Ok(json!({ "paymaster": PAYMASTER, "paymasterData": "0xbbbb" }))
            }
            "eth_sendUserOperation" => match script.send_error {
                Some(message) => Err(json!({ "code": -32500, "message": message })),
                None => Ok(json!(USER_OP_HASH)),
            },
            "eth_getUserOperationReceipt" => {
                let polls = self.receipt_polls.fetch_add(1, Ordering::SeqCst);
                match script.receipt {
                    Some(success) if polls >= script.pending_receipts => Ok(json!({
                        "userOpHash": USER_OP_HASH,
                        "sender": Address::ZERO,
                        "success": success,
                        "reason": (!success).then_some("execution reverted"),
                        "receipt": { "transactionHash": TX_HASH }
                    })),
                    _ => Ok(Value::Null),
                }
            }
            _ => Err(json!({ "code": -32601, "message": "method not found" })),
        }
    }

    fn call(&self, params: &Value) -> Result<Value, Value> {
        let tx = &params[0];
        let input: Bytes = tx
            .get("input")
            .or_else(|| tx.get("data"))
            .and_then(Value::as_str)
            .unwrap_or("0x")
            .parse()
            .unwrap();

        if input.starts_with(&IEntryPoint::getNonceCall::SELECTOR) {
            return Ok(json!(Bytes::from(U256::from(7).abi_encode())));
        }
        assert!(input.starts_with(&IKernel::isValidSignatureCall::SELECTOR));

        match self.script.signature {
            SignatureAnswer::Magic => Ok(json!(Bytes::from(EIP1271_MAGIC_VALUE.abi_encode()))),
            SignatureAnswer::Revert(data) => {
                Err(json!({ "code": 3, "message": "execution reverted", "data": data }))
            }
            SignatureAnswer::NodeError => {
                Err(json!({ "code": -32602, "message": "invalid argument 0: bad block" }))
            }
            SignatureAnswer::Empty => Ok(json!("0x")),
        }
    }

    fn methods(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(method, _)| method.clone()).collect()
    }

    /// Bundler and paymaster methods, in call order.
    fn user_op_methods(&self) -> Vec<String> {
        self.methods()
            .into_iter()
            .filter(|method| method.starts_with("pm_") || method.contains("UserOperation"))
            .collect()
    }

    fn params(&self, method: &str) -> Value {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
            .unwrap()
    }
}

async fn spawn_node(script: Script) -> (Url, Arc<Node>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let node =
        Arc::new(Node { script, requests: Mutex::default(), receipt_polls: AtomicU32::new(0) });

    let server = node.clone();
    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else { continue };
            let node = server.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let node = node.clone();
                    async move {
                        let body = req.collect().await?.to_bytes();
                        let request: Value = serde_json::from_slice(&body).unwrap();
                        let body = hyper::body::Bytes::from(node.handle(&request).to_string());
                        let response = Response::builder()
                            .header(CONTENT_TYPE, "application/json")
                            .body(Full::new(body))
                            .unwrap();
                        Ok::<_, hyper::Error>(response)
                    }
                });
                let _ = http1::Builder::new().serve_connection(TokioIo::new(tcp), service).await;
            });
        }
    });

    (url, node)
}

fn provider(url: &Url) -> DynProvider {
    ProviderBuilder::new().connect_http(url.clone()).erased()
}

/// A bundler client for a fresh owner whose EIP-7702 account lives at the owner address.
fn bundler(url: &Url) -> (BundlerClient, Address) {
    let owner = DynSigner::from(PrivateKeySigner::random());
    let account = owner.address();
    let signer = KernelSigner::new(
        owner,
        AccountDomain::kernel(CHAIN_ID, account),
        ValidationId::validator(ECDSA_VALIDATOR),
    );
    let client = BundlerClient::new(provider(url), signer, url.clone(), Some(url.clone()))
        .with_poll(PollConfig { attempts: 3, initial_backoff_ms: 5, max_backoff_ms: 10 });
    (client, account)
}

fn calls() -> Vec<Call> {
    vec![Call::new(Address::repeat_byte(0x22), bytes!("12345678"))]
}

#[tokio::test]
async fn first_operation_is_sponsored_and_delegates() {
    let (url, node) = spawn_node(Script::default()).await;
    let (client, owner) = bundler(&url);

    let receipt = client.send_and_wait(calls()).await.unwrap();
    assert_eq!(receipt.user_op_hash, USER_OP_HASH);
    assert_eq!(receipt.receipt.transaction_hash, TX_HASH);

    assert_eq!(
        node.user_op_methods(),
        vec![
            "pm_getPaymasterStubData",
            "eth_estimateUserOperationGas",
            "pm_getPaymasterData",
            "eth_sendUserOperation",
            "eth_getUserOperationReceipt",
            "eth_getUserOperationReceipt",
        ]
    );

    let params = node.params("eth_sendUserOperation");
    assert_eq!(params[1], json!(ENTRYPOINT_V07));
    let op: UserOperation = serde_json::from_value(params[0].clone()).unwrap();
    assert_eq!(op.sender, owner);
    assert_eq!(op.nonce, U256::from(7));
    assert_eq!(op.call_gas_limit, 0x10000);
    assert_eq!(op.pre_verification_gas, 0xc350);
    assert_eq!(op.paymaster, Some(PAYMASTER));
    assert_eq!(op.paymaster_data, Some(bytes!("bbbb")));
    // the stub's gas limits survive the final paymaster data
    assert_eq!(op.paymaster_verification_gas_limit, Some(0x8000));

    let auth = op.eip7702_auth.as_ref().unwrap();
    assert_eq!(auth.address, KERNEL_V3_3_IMPLEMENTATION);
    assert_eq!(auth.nonce, 3);
    assert_eq!(auth.chain_id, U256::from(CHAIN_ID));
    assert_eq!(auth.recover_authority().unwrap(), owner);

    let signature = Signature::from_raw(&op.signature).unwrap();
    let hash = op.hash(ENTRYPOINT_V07, CHAIN_ID);
    assert_eq!(signature.recover_address_from_msg(hash.as_slice()).unwrap(), owner);
}

#[tokio::test]
async fn final_stub_and_delegated_account() {
    let script = Script { delegated: true, stub_is_final: true, ..Default::default() };
    let (url, node) = spawn_node(script).await;
    let (client, _) = bundler(&url);

    assert_eq!(client.send_calls(calls()).await.unwrap(), USER_OP_HASH);

    assert_eq!(
        node.user_op_methods(),
        vec!["pm_getPaymasterStubData", "eth_estimateUserOperationGas", "eth_sendUserOperation"]
    );
    assert!(!node.methods().contains(&"eth_getTransactionCount".to_string()));

    let op: UserOperation =
        serde_json::from_value(node.params("eth_sendUserOperation")[0].clone()).unwrap();
    assert_eq!(op.eip7702_auth, None);
    assert_eq!(op.paymaster_data, Some(bytes!("aa")));
}

#[tokio::test]
async fn failed_execution_is_reverted_on_chain() {
    let script = Script { delegated: true, receipt: Some(false), ..Default::default() };
    let (url, _) = spawn_node(script).await;
    let (client, _) = bundler(&url);

    let err = client.send_and_wait(calls()).await.unwrap_err();
    assert_eq!(
        err,
        SubmitError::RevertedOnChain { code: None, message: "execution reverted".to_string() }
    );
}

#[tokio::test]
async fn missing_receipt_times_out() {
    let script = Script { delegated: true, receipt: None, ..Default::default() };
    let (url, node) = spawn_node(script).await;
    let (client, _) = bundler(&url);

    let err = client.wait_for_receipt(USER_OP_HASH).await.unwrap_err();
    assert_eq!(err, SubmitError::ReceiptTimeout(USER_OP_HASH.to_string()));
    assert_eq!(node.receipt_polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn bundler_rejection_is_classified() {
    let script = Script {
        delegated: true,
        send_error: Some("paymaster validation failed: AA33 reverted"),
        ..Default::default()
    };
    let (url, _) = spawn_node(script).await;
    let (client, _) = bundler(&url);

    let err = client.send_calls(calls()).await.unwrap_err();
    assert!(matches!(err, SubmitError::PaymasterRejected(_)), "{err:?}");
}

async fn is_valid_signature(answer: SignatureAnswer) -> Result<FixedBytes<4>, ReadError> {
    let script = Script { delegated: true, signature: answer, ..Default::default() };
    let (url, _) = spawn_node(script).await;
    KernelReader::new(provider(&url))
        .is_valid_signature(Address::repeat_byte(0xaa), B256::ZERO, Bytes::new())
        .await
}

#[tokio::test]
async fn node_answers_map_to_read_errors() {
    assert_eq!(is_valid_signature(SignatureAnswer::Magic).await.unwrap(), EIP1271_MAGIC_VALUE);

    let err = is_valid_signature(SignatureAnswer::Revert("0x682a6e7c")).await.unwrap_err();
    assert!(matches!(
        &err,
        ReadError::Reverted { data: Some(data), .. } if data == &bytes!("682a6e7c")
    ));

    let err = is_valid_signature(SignatureAnswer::Empty).await.unwrap_err();
    assert!(matches!(err, ReadError::Reverted { data: None, .. }), "{err:?}");

    let err = is_valid_signature(SignatureAnswer::NodeError).await.unwrap_err();
    assert!(matches!(err, ReadError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn invalid_validator_revert_from_node_is_unknown_validator() {
    let script = Script {
        delegated: true,
        signature: SignatureAnswer::Revert("0x682a6e7c"),
        ..Default::default()
    };
    let (url, _) = spawn_node(script).await;
    let verifier = SignatureVerifier::new(Arc::new(KernelReader::new(provider(&url))));
    let envelope =
        SignatureEnvelope::for_validation(ValidationId::validator(ECDSA_VALIDATOR), [0x1b; 65]);

    let outcome =
        verifier.verify(Address::repeat_byte(0xaa), B256::ZERO, &envelope).await.unwrap();
    assert_eq!(outcome, ValidationOutcome::Unverifiable(UnverifiableReason::UnknownValidator));
}
