//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers. Socket file
//! permissions are the trust boundary for the collaborator feeds
//! (`record_attribution`, the transfer webhooks); per-user authorization
//! is performed by resolving the `caller_id` parameter on every
//! user-facing method.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Domain errors

    /// Unknown caller identity (-32020).
    pub fn unauthenticated() -> Self {
        Self {
            code: -32020,
            message: "UNAUTHENTICATED".to_string(),
            data: None,
        }
    }

    /// Caller lacks permission (-32021).
    pub fn access_denied(detail: &str) -> Self {
        Self {
            code: -32021,
            message: "ACCESS_DENIED".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Resource does not exist (-32022).
    pub fn not_found(detail: &str) -> Self {
        Self {
            code: -32022,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Operation not permitted from the current status (-32023).
    pub fn invalid_state(detail: &str) -> Self {
        Self {
            code: -32023,
            message: "INVALID_STATE".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Entry already committed to a batch (-32024).
    pub fn already_batched(ledger_id: i64, batch_id: i64) -> Self {
        Self {
            code: -32024,
            message: "ALREADY_BATCHED".to_string(),
            data: Some(serde_json::json!({"ledger_id": ledger_id, "batch_id": batch_id})),
        }
    }

    /// Entry claimed by another request (-32025).
    pub fn already_requested(ledger_id: i64, request_id: i64) -> Self {
        Self {
            code: -32025,
            message: "ALREADY_REQUESTED".to_string(),
            data: Some(serde_json::json!({"ledger_id": ledger_id, "request_id": request_id})),
        }
    }

    /// No ledger entries supplied (-32026).
    pub fn empty_selection() -> Self {
        Self {
            code: -32026,
            message: "EMPTY_SELECTION".to_string(),
            data: None,
        }
    }

    /// Deny without a reason (-32027).
    pub fn missing_reason() -> Self {
        Self {
            code: -32027,
            message: "MISSING_REASON".to_string(),
            data: None,
        }
    }

    /// Void blocked by a mid-flight transfer (-32028).
    pub fn transfer_in_progress(batch_id: i64) -> Self {
        Self {
            code: -32028,
            message: "TRANSFER_IN_PROGRESS".to_string(),
            data: Some(serde_json::json!({"batch_id": batch_id})),
        }
    }
}

impl From<suds_ledger::LedgerError> for RpcError {
    fn from(err: suds_ledger::LedgerError) -> Self {
        use suds_ledger::LedgerError;
        match &err {
            LedgerError::NotFound(_) => RpcError::not_found(&err.to_string()),
            LedgerError::AccessDenied(_) => RpcError::access_denied(&err.to_string()),
            LedgerError::InvalidState { .. } => RpcError::invalid_state(&err.to_string()),
            LedgerError::Overflow | LedgerError::Db(_) => {
                RpcError::internal_error(&err.to_string())
            }
        }
    }
}

impl From<suds_payout::PayoutError> for RpcError {
    fn from(err: suds_payout::PayoutError) -> Self {
        use suds_payout::PayoutError;
        match &err {
            PayoutError::NotFound(_) => RpcError::not_found(&err.to_string()),
            PayoutError::AccessDenied(_) => RpcError::access_denied(&err.to_string()),
            PayoutError::InvalidState { .. } => RpcError::invalid_state(&err.to_string()),
            PayoutError::AlreadyBatched { ledger_id, batch_id } => {
                RpcError::already_batched(*ledger_id, *batch_id)
            }
            PayoutError::AlreadyRequested { ledger_id, request_id } => {
                RpcError::already_requested(*ledger_id, *request_id)
            }
            PayoutError::EmptySelection => RpcError::empty_selection(),
            PayoutError::MissingReason => RpcError::missing_reason(),
            PayoutError::TransferInProgress(batch_id) => {
                RpcError::transfer_in_progress(*batch_id)
            }
            PayoutError::Db(_) => RpcError::internal_error(&err.to_string()),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Ledger commands
        "upsert_ledger_period" => commands::ledger::upsert_ledger_period(&state, params).await,
        "upsert_current_ledger_period" => {
            commands::ledger::upsert_current_ledger_period(&state, params).await
        }
        "lock_ledger_period" => commands::ledger::lock_ledger_period(&state, params).await,
        "mark_ledger_paid" => commands::ledger::mark_ledger_paid(&state, params).await,
        "unmark_ledger_paid" => commands::ledger::unmark_ledger_paid(&state, params).await,
        "get_my_ledger" => commands::ledger::get_my_ledger(&state, params).await,
        "get_my_attributions" => commands::ledger::get_my_attributions(&state, params).await,
        "get_referrer_ledger" => commands::ledger::get_referrer_ledger(&state, params).await,

        // Payout batch commands
        "create_payout_batch" => commands::payout::create_payout_batch(&state, params).await,
        "void_payout_batch" => commands::payout::void_payout_batch(&state, params).await,
        "get_payout_batch" => commands::payout::get_payout_batch(&state, params).await,
        "list_payout_batches" => commands::payout::list_payout_batches(&state, params).await,
        "list_referrer_payout_batches" => {
            commands::payout::list_referrer_payout_batches(&state, params).await
        }

        // Payout request commands
        "create_payout_request" => commands::payout::create_payout_request(&state, params).await,
        "cancel_payout_request" => commands::payout::cancel_payout_request(&state, params).await,
        "approve_payout_request" => {
            commands::payout::approve_payout_request(&state, params).await
        }
        "deny_payout_request" => commands::payout::deny_payout_request(&state, params).await,
        "complete_payout_request" => {
            commands::payout::complete_payout_request(&state, params).await
        }
        "get_my_payout_requests" => {
            commands::payout::get_my_payout_requests(&state, params).await
        }
        "list_payout_requests" => commands::payout::list_payout_requests(&state, params).await,
        "get_payout_request" => commands::payout::get_payout_request(&state, params).await,

        // Trusted collaborator feeds
        "record_attribution" => commands::feeds::record_attribution(&state, params).await,
        "ledger_transfer_paid" => commands::feeds::ledger_transfer_paid(&state, params).await,
        "update_batch_transfer" => commands::feeds::update_batch_transfer(&state, params).await,

        // Diagnostics
        "healthcheck" => commands::diagnostics::healthcheck(&state).await,
        "subscribe_events" => commands::diagnostics::subscribe_events(&state, params).await,
        "unsubscribe_events" => commands::diagnostics::unsubscribe_events(&state, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
