//! REST API server for UFChain
//!
//! Every handler works on the shared [`Ledger`]. Reads use the published
//! snapshot; writes run on the blocking pool because they end in a storage
//! commit.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::consensus::Validator;
use crate::contract::SmartContract;
use crate::crypto::Sha256Hash;
use crate::error::{ChainError, ErrorKind};
use crate::ledger::{Ledger, LedgerStats};
use crate::transaction::Transaction;

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<Ledger>,
    api_stats: Arc<RwLock<ApiStats>>,
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl ApiState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }

    /// Runs a ledger write on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Ledger) -> Result<T, ChainError> + Send + 'static,
    {
        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| ApiError::InternalError(format!("Worker task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
    Forbidden(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(e) => {
                let status = match e.kind() {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Storage | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Consensus => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct WalletResponse {
    pub address: String,
    pub public_key: String,
    pub private_key: String,
}

#[derive(Serialize, Deserialize)]
pub struct WalletInfoResponse {
    pub address: String,
    pub public_key: String,
    pub balance: u64,
}

#[derive(Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Deserialize)]
pub struct MintRequest {
    pub amount: u64,
    pub private_key: String,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub from: String,
    /// Wallet address or hex public key.
    pub to: String,
    pub amount: u64,
    pub private_key: String,
}

#[derive(Deserialize)]
pub struct RegisterValidatorRequest {
    pub public_key: String,
    pub stake: u64,
}

#[derive(Deserialize)]
pub struct DeployContractRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct ExecuteContractRequest {
    #[serde(default)]
    pub input: serde_json::Value,
}

#[derive(Serialize)]
pub struct InputView {
    pub tx_id: String,
    pub output_index: u32,
    pub public_key: String,
    pub signature: String,
}

#[derive(Serialize)]
pub struct OutputView {
    pub value: u64,
    pub public_key: String,
}

#[derive(Serialize)]
pub struct TransactionView {
    pub id: String,
    pub inputs: Vec<InputView>,
    pub outputs: Vec<OutputView>,
    pub nonce: u64,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        TransactionView {
            id: tx.id_hex(),
            inputs: tx
                .inputs
                .iter()
                .map(|i| InputView {
                    tx_id: hex::encode(i.tx_id),
                    output_index: i.output_index,
                    public_key: hex::encode(&i.public_key),
                    signature: hex::encode(&i.signature),
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|o| OutputView {
                    value: o.value,
                    public_key: hex::encode(&o.public_key),
                })
                .collect(),
            nonce: tx.nonce,
        }
    }
}

#[derive(Serialize)]
pub struct BlockView {
    pub hash: String,
    pub previous_hash: Option<String>,
    pub timestamp: String,
    pub validator: String,
    pub nonce: u64,
    pub transactions: Vec<TransactionView>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        BlockView {
            hash: block.hash_hex(),
            previous_hash: block.previous_hash.map(hex::encode),
            timestamp: block.timestamp.clone(),
            validator: hex::encode(&block.validator),
            nonce: block.nonce,
            transactions: block.transactions.iter().map(TransactionView::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ValidatorView {
    pub public_key: String,
    pub stake: u64,
}

impl From<&Validator> for ValidatorView {
    fn from(v: &Validator) -> Self {
        ValidatorView {
            public_key: v.public_key_hex(),
            stake: v.stake,
        }
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub ledger: LedgerStats,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub uptime_seconds: u64,
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    state.api_stats.write().await.record_request(success);

    response
}

/// Request logging middleware. Logs method, path, status and duration.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(ledger: Arc<Ledger>) -> Router {
    let state = ApiState::new(ledger);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/wallet", post(create_wallet))
        .route("/wallet/:address", get(get_wallet))
        .route("/wallet/:address/balance", get(get_wallet_balance))
        .route("/wallet/:address/mint", post(mint_to_wallet))
        .route("/transaction", post(submit_transfer))
        .route("/block/:hash", get(get_block))
        .route("/blocks", get(get_blocks))
        .route("/validators", get(get_validators).post(register_validator))
        .route("/contract", post(deploy_contract))
        .route("/contract/:id/execute", post(execute_contract))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), stats_middleware))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

/// Serves the API on `addr` until `shutdown` resolves.
pub async fn run_api_server<F>(
    ledger: Arc<Ledger>,
    addr: &str,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_api_router(ledger);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "api.listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

fn parse_hex(label: &str, input: &str) -> Result<Vec<u8>, ApiError> {
    hex::decode(input.trim_start_matches("0x"))
        .map_err(|e| ApiError::InvalidInput(format!("Invalid {}: {}", label, e)))
}

fn parse_block_hash(input: &str) -> Result<Sha256Hash, ApiError> {
    let bytes = parse_hex("block hash", input)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ApiError::InvalidInput(format!("Block hash must be 32 bytes, got {}", bytes.len())))
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let chain = state.ledger.snapshot();
    Json(serde_json::json!({
        "status": "healthy",
        "height": chain.height(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    let ledger = state.ledger.stats();
    let stats = state.api_stats.read().await;
    Json(StatsResponse {
        ledger,
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        transactions_submitted: stats.transactions_submitted,
        uptime_seconds: stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0),
    })
}

async fn create_wallet(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<WalletResponse>), ApiError> {
    let wallet = state.blocking(|ledger| ledger.create_wallet()).await?;
    Ok((
        StatusCode::CREATED,
        Json(WalletResponse {
            address: wallet.address.clone(),
            public_key: wallet.public_key_hex(),
            private_key: wallet.private_key_hex(),
        }),
    ))
}

async fn get_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<WalletInfoResponse>, ApiError> {
    let wallet = state.ledger.get_wallet(&address)?;
    let balance = state.ledger.balance(&wallet.public_key);
    Ok(Json(WalletInfoResponse {
        address: wallet.address.clone(),
        public_key: wallet.public_key_hex(),
        balance,
    }))
}

async fn get_wallet_balance(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.balance_of_address(&address)?;
    Ok(Json(BalanceResponse { address, balance }))
}

async fn mint_to_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<MintRequest>,
) -> Result<(StatusCode, Json<BlockView>), ApiError> {
    let wallet = state.ledger.get_wallet(&address)?;
    if !wallet.owns_private_key(&parse_hex("private key", &req.private_key)?) {
        return Err(ApiError::Forbidden(
            "Private key does not match wallet".to_string(),
        ));
    }

    let block = state
        .blocking(move |ledger| ledger.mint(&wallet.public_key, req.amount))
        .await?;
    Ok((StatusCode::CREATED, Json(BlockView::from(&block))))
}

async fn submit_transfer(
    State(state): State<ApiState>,
    Json(req): Json<TransferRequest>,
) -> Result<(StatusCode, Json<BlockView>), ApiError> {
    let sender = state.ledger.get_wallet(&req.from)?;
    if !sender.owns_private_key(&parse_hex("private key", &req.private_key)?) {
        return Err(ApiError::Forbidden(
            "Private key does not match wallet".to_string(),
        ));
    }
    let recipient = state.ledger.resolve_public_key(&req.to)?;

    let block = state
        .blocking(move |ledger| ledger.transfer(&sender, &recipient, req.amount))
        .await?;
    state.api_stats.write().await.transactions_submitted += 1;
    Ok((StatusCode::CREATED, Json(BlockView::from(&block))))
}

async fn get_block(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> Result<Json<BlockView>, ApiError> {
    let hash = parse_block_hash(&hash)?;
    let block = state.ledger.get_block(&hash)?;
    Ok(Json(BlockView::from(&block)))
}

async fn get_blocks(State(state): State<ApiState>) -> Json<Vec<BlockView>> {
    let chain = state.ledger.snapshot();
    Json(chain.blocks().iter().map(BlockView::from).collect())
}

async fn get_validators(State(state): State<ApiState>) -> Json<Vec<ValidatorView>> {
    Json(state.ledger.validators().iter().map(ValidatorView::from).collect())
}

async fn register_validator(
    State(state): State<ApiState>,
    Json(req): Json<RegisterValidatorRequest>,
) -> Result<(StatusCode, Json<ValidatorView>), ApiError> {
    let public_key = parse_hex("public key", &req.public_key)?;
    let validator = Validator::new(public_key.clone(), req.stake);
    state.ledger.register_validator(public_key, req.stake)?;
    Ok((StatusCode::CREATED, Json(ValidatorView::from(&validator))))
}

async fn deploy_contract(
    State(state): State<ApiState>,
    Json(req): Json<DeployContractRequest>,
) -> Result<(StatusCode, Json<SmartContract>), ApiError> {
    let contract = state.ledger.deploy_contract(&req.code)?;
    Ok((StatusCode::CREATED, Json(contract)))
}

async fn execute_contract(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ExecuteContractRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state.ledger.execute_contract(&id, req.input)?;
    Ok(Json(serde_json::json!({ "id": id, "state": result })))
}
