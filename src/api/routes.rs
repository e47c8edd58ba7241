//! API Routes
//!
//! The single JSON-RPC endpoint and one function per method.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::domain::{AccountView, Caller, DomainError, HistoryEntry, OperationContext};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    decimal_param, CreateUserCommand, CreateUserHandler, DeactivateUserCommand,
    DeactivateUserHandler, TransferCommand, TransferHandler, UpdateUserCommand, UpdateUserHandler,
};
use crate::store::{AccountStore, TransactionLog};

use super::middleware::{clear_session_cookie, session_cookie};
use super::rpc::{Method, RpcRequest, RpcResponse};
use super::AppState;

/// History page size when the caller gives none
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Largest history page a caller may request
pub const MAX_HISTORY_LIMIT: u32 = 1000;

// =========================================================================
// Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountView,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AccountView>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub total_users: i64,
    pub total_managers: i64,
    pub total_clients: i64,
    pub total_balance: crate::domain::Balance,
}

/// Outcome of one method call: the result plus an optional cookie change
struct RpcOutcome {
    result: Value,
    set_cookie: Option<String>,
}

impl RpcOutcome {
    fn new<T: Serialize>(result: T) -> AppResult<Self> {
        let result = serde_json::to_value(result)
            .map_err(|e| AppError::Internal(format!("failed to encode result: {}", e)))?;
        Ok(Self {
            result,
            set_cookie: None,
        })
    }

    fn with_cookie(mut self, cookie: String) -> Self {
        self.set_cookie = Some(cookie);
        self
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new().route("/api", post(handle_rpc))
}

/// POST /api
async fn handle_rpc(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    body: Bytes,
) -> Response {
    let request = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => RpcRequest::from_value(value),
        Err(e) => Err(AppError::InvalidRequest(format!("malformed JSON: {}", e))),
    };
    let request = match request {
        Ok(request) => request,
        Err(err) => return error_response(Value::Null, &err),
    };

    let RpcRequest { method, params, id } = request;

    let outcome = match method.parse::<Method>() {
        Ok(method) => {
            let span = tracing::info_span!(
                "rpc",
                method = method.as_str(),
                correlation_id = ?context.correlation_id,
                client_ip = ?context.client_ip,
            );
            dispatch(&state, &context, method, &params)
                .instrument(span)
                .await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(outcome) => {
            let mut response = Json(RpcResponse::success(id, outcome.result)).into_response();
            if let Some(cookie) = outcome.set_cookie {
                match HeaderValue::from_str(&cookie) {
                    Ok(value) => {
                        response.headers_mut().insert(header::SET_COOKIE, value);
                    }
                    Err(_) => tracing::error!("Refusing to send malformed Set-Cookie header"),
                }
            }
            response
        }
        Err(err) => error_response(id, &err),
    }
}

fn error_response(id: Value, err: &AppError) -> Response {
    let status: StatusCode = err.status_code();
    (status, Json(RpcResponse::failure(id, err.to_rpc_error()))).into_response()
}

/// Check access for the method and run it
async fn dispatch(
    state: &AppState,
    context: &OperationContext,
    method: Method,
    params: &Map<String, Value>,
) -> AppResult<RpcOutcome> {
    let caller = method.access().authorize(context)?;

    match (method, caller) {
        (Method::Login, _) => login(state, params).await,
        (Method::Logout, _) => logout(state, context).await,
        (Method::VerifyToken, caller) => verify_token(state, caller).await,
        (Method::GetAccountInfo, Some(caller)) => get_account_info(state, caller).await,
        (Method::GetTransactionHistory, Some(caller)) => {
            get_transaction_history(state, caller, params).await
        }
        (Method::TransferMoney, Some(caller)) => {
            transfer_money(state, context, caller, params).await
        }
        (Method::DeleteAccount, Some(caller)) => delete_account(state, context, caller).await,
        (Method::GetAllUsers, Some(_)) => get_all_users(state).await,
        (Method::CreateUser, Some(_)) => create_user(state, context, params).await,
        (Method::UpdateUser, Some(_)) => update_user(state, context, params).await,
        (Method::DeleteUser, Some(_)) => delete_user(state, context, params).await,
        (Method::GetStatistics, Some(_)) => get_statistics(state).await,
        (_, None) => Err(AppError::Unauthenticated),
    }
}

// =========================================================================
// Param helpers
// =========================================================================

/// First present, non-null value among the given key spellings
fn param<'a>(params: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .find(|value| !value.is_null())
}

fn required_str<'a>(params: &'a Map<String, Value>, keys: &[&str]) -> AppResult<&'a str> {
    optional_str(params, keys)?
        .ok_or_else(|| AppError::InvalidParams(format!("missing parameter: {}", keys[0])))
}

fn optional_str<'a>(params: &'a Map<String, Value>, keys: &[&str]) -> AppResult<Option<&'a str>> {
    match param(params, keys) {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.as_str())),
        Some(_) => Err(AppError::InvalidParams(format!(
            "parameter {} must be a string",
            keys[0]
        ))),
    }
}

fn required_id(params: &Map<String, Value>) -> AppResult<i64> {
    param(params, &["id", "userId", "user_id"])
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::InvalidParams("missing or invalid parameter: id".to_string()))
}

// =========================================================================
// Public methods
// =========================================================================

async fn login(state: &AppState, params: &Map<String, Value>) -> AppResult<RpcOutcome> {
    let login = required_str(params, &["login"])?;
    let password = required_str(params, &["password"])?;

    let sessions = state.sessions();
    let issued = sessions.login(login, password).await?;
    let cookie = session_cookie(&issued.token, sessions.ttl().num_seconds());

    Ok(RpcOutcome::new(LoginResponse {
        token: issued.token,
        user: issued.account.view(),
    })?
    .with_cookie(cookie))
}

async fn logout(state: &AppState, context: &OperationContext) -> AppResult<RpcOutcome> {
    if let Some(session_hash) = &context.session_hash {
        state.sessions().logout(session_hash).await?;
    }
    Ok(RpcOutcome::new(SuccessResponse { success: true })?.with_cookie(clear_session_cookie()))
}

async fn verify_token(state: &AppState, caller: Option<&Caller>) -> AppResult<RpcOutcome> {
    let account = match caller {
        Some(caller) => AccountStore::new(state.pool.clone())
            .find_by_id(caller.account_id)
            .await?
            .filter(|account| account.is_active),
        None => None,
    };

    RpcOutcome::new(VerifyTokenResponse {
        valid: account.is_some(),
        user: account.map(|account| account.view()),
    })
}

// =========================================================================
// Authenticated methods
// =========================================================================

async fn get_account_info(state: &AppState, caller: &Caller) -> AppResult<RpcOutcome> {
    let account = AccountStore::new(state.pool.clone())
        .find_by_id(caller.account_id)
        .await?
        .ok_or_else(|| DomainError::AccountNotFound(caller.account_id.to_string()))?;

    RpcOutcome::new(account.view())
}

// =========================================================================
// Client methods
// =========================================================================

async fn get_transaction_history(
    state: &AppState,
    caller: &Caller,
    params: &Map<String, Value>,
) -> AppResult<RpcOutcome> {
    let limit = match param(params, &["limit"]) {
        None => DEFAULT_HISTORY_LIMIT,
        Some(value) => value
            .as_u64()
            .filter(|limit| *limit > 0)
            .map(|limit| limit.min(u64::from(MAX_HISTORY_LIMIT)) as u32)
            .ok_or_else(|| {
                AppError::InvalidParams("limit must be a positive integer".to_string())
            })?,
    };

    let entries: Vec<HistoryEntry> = TransactionLog::new(state.pool.clone())
        .history(caller.account_id, limit)
        .await?;

    RpcOutcome::new(entries)
}

async fn transfer_money(
    state: &AppState,
    context: &OperationContext,
    caller: &Caller,
    params: &Map<String, Value>,
) -> AppResult<RpcOutcome> {
    let recipient = required_str(params, &["recipient", "recipientAccount", "recipient_account"])?;
    let amount = param(params, &["amount"])
        .ok_or_else(|| AppError::InvalidParams("missing parameter: amount".to_string()))?;
    let amount = decimal_param(amount)?;
    let description = optional_str(params, &["description"])?;

    let command = TransferCommand::new(caller.account_id, recipient.to_string(), amount)
        .with_description(description.map(str::to_string));

    let handler = TransferHandler::new(state.pool.clone(), state.config.max_transfer_amount);
    let result = handler.execute(command, context).await?;

    RpcOutcome::new(result)
}

async fn delete_account(
    state: &AppState,
    context: &OperationContext,
    caller: &Caller,
) -> AppResult<RpcOutcome> {
    let handler = DeactivateUserHandler::new(state.pool.clone());
    handler
        .execute(DeactivateUserCommand::new(caller.account_id), context)
        .await?;

    Ok(RpcOutcome::new(SuccessResponse { success: true })?.with_cookie(clear_session_cookie()))
}

// =========================================================================
// Manager methods
// =========================================================================

async fn get_all_users(state: &AppState) -> AppResult<RpcOutcome> {
    let accounts = AccountStore::new(state.pool.clone()).list_all().await?;
    let views: Vec<AccountView> = accounts.iter().map(|account| account.view()).collect();
    RpcOutcome::new(views)
}

async fn create_user(
    state: &AppState,
    context: &OperationContext,
    params: &Map<String, Value>,
) -> AppResult<RpcOutcome> {
    let balance = param(params, &["balance"]).map(decimal_param).transpose()?;

    let command = CreateUserCommand::new(
        required_str(params, &["login"])?.to_string(),
        required_str(params, &["password"])?.to_string(),
        required_str(params, &["fullName", "full_name"])?.to_string(),
        required_str(params, &["role"])?.to_string(),
    )
    .with_phone(optional_str(params, &["phone"])?.map(str::to_string))
    .with_account_number(
        optional_str(params, &["accountNumber", "account_number"])?.map(str::to_string),
    )
    .with_balance(balance);

    let handler = CreateUserHandler::new(state.pool.clone(), state.hasher.clone());
    let account = handler.execute(command, context).await?;

    RpcOutcome::new(account.view())
}

async fn update_user(
    state: &AppState,
    context: &OperationContext,
    params: &Map<String, Value>,
) -> AppResult<RpcOutcome> {
    let command = UpdateUserCommand::from_params(params)?;

    let handler = UpdateUserHandler::new(state.pool.clone(), state.hasher.clone());
    let account = handler.execute(command, context).await?;

    RpcOutcome::new(account.view())
}

async fn delete_user(
    state: &AppState,
    context: &OperationContext,
    params: &Map<String, Value>,
) -> AppResult<RpcOutcome> {
    let account_id = required_id(params)?;

    let handler = DeactivateUserHandler::new(state.pool.clone());
    handler
        .execute(DeactivateUserCommand::new(account_id), context)
        .await?;

    RpcOutcome::new(SuccessResponse { success: true })
}

async fn get_statistics(state: &AppState) -> AppResult<RpcOutcome> {
    let stats = AccountStore::new(state.pool.clone()).statistics().await?;

    RpcOutcome::new(StatisticsResponse {
        total_users: stats.total_users,
        total_managers: stats.total_managers,
        total_clients: stats.total_clients,
        total_balance: stats.total_balance,
    })
}
