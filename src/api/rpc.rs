//! JSON-RPC envelope
//!
//! Request/response framing, error codes and the method table with its
//! access rules.

use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{Caller, OperationContext};
use crate::error::{AppError, AppResult};

/// Stable error codes
pub mod codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Domain and authentication errors
    pub const DOMAIN_ERROR: i32 = -32000;
    pub const CLIENT_ONLY: i32 = -32002;
    pub const MANAGER_ONLY: i32 = -32007;
}

pub const JSONRPC_VERSION: &str = "2.0";

// =========================================================================
// Envelope
// =========================================================================

/// A validated call
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub method: String,
    pub params: Map<String, Value>,
    pub id: Value,
}

impl RpcRequest {
    /// Validate the envelope of a decoded body
    pub fn from_value(body: Value) -> Result<Self, AppError> {
        let Value::Object(mut envelope) = body else {
            return Err(AppError::InvalidRequest(
                "request must be a JSON object".to_string(),
            ));
        };

        match envelope.get("jsonrpc") {
            None => {}
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(_) => {
                return Err(AppError::InvalidRequest(
                    "jsonrpc must be \"2.0\"".to_string(),
                ))
            }
        }

        let method = match envelope.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => {
                return Err(AppError::InvalidRequest(
                    "method must be a non-empty string".to_string(),
                ))
            }
        };

        let params = match envelope.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => {
                return Err(AppError::InvalidRequest(
                    "params must be an object".to_string(),
                ))
            }
        };

        let id = envelope.remove("id").unwrap_or(Value::Null);

        Ok(Self { method, params, id })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }
}

// =========================================================================
// Method table
// =========================================================================

/// Who may call a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Client,
    Manager,
}

impl Access {
    /// Check the caller against this rule. Public methods may run
    /// anonymously and get `None`.
    pub fn authorize<'a>(&self, context: &'a OperationContext) -> AppResult<Option<&'a Caller>> {
        let caller = context.caller.as_ref();
        match self {
            Access::Public => Ok(caller),
            Access::Authenticated => caller.map(Some).ok_or(AppError::Unauthenticated),
            Access::Client => match caller {
                None => Err(AppError::Unauthenticated),
                Some(caller) if caller.is_manager() => Err(AppError::ClientOnly),
                Some(caller) => Ok(Some(caller)),
            },
            Access::Manager => match caller {
                None => Err(AppError::Unauthenticated),
                Some(caller) if !caller.is_manager() => Err(AppError::ManagerOnly),
                Some(caller) => Ok(Some(caller)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Login,
    Logout,
    VerifyToken,
    GetAccountInfo,
    GetTransactionHistory,
    TransferMoney,
    DeleteAccount,
    GetAllUsers,
    CreateUser,
    UpdateUser,
    DeleteUser,
    GetStatistics,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Login => "login",
            Method::Logout => "logout",
            Method::VerifyToken => "verifyToken",
            Method::GetAccountInfo => "getAccountInfo",
            Method::GetTransactionHistory => "getTransactionHistory",
            Method::TransferMoney => "transferMoney",
            Method::DeleteAccount => "deleteAccount",
            Method::GetAllUsers => "getAllUsers",
            Method::CreateUser => "createUser",
            Method::UpdateUser => "updateUser",
            Method::DeleteUser => "deleteUser",
            Method::GetStatistics => "getStatistics",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Method::Login | Method::Logout | Method::VerifyToken => Access::Public,
            Method::GetAccountInfo => Access::Authenticated,
            Method::GetTransactionHistory | Method::TransferMoney | Method::DeleteAccount => {
                Access::Client
            }
            Method::GetAllUsers
            | Method::CreateUser
            | Method::UpdateUser
            | Method::DeleteUser
            | Method::GetStatistics => Access::Manager,
        }
    }
}

impl FromStr for Method {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "login" => Method::Login,
            "logout" => Method::Logout,
            "verifyToken" => Method::VerifyToken,
            "getAccountInfo" => Method::GetAccountInfo,
            "getTransactionHistory" => Method::GetTransactionHistory,
            "transferMoney" => Method::TransferMoney,
            "deleteAccount" => Method::DeleteAccount,
            "getAllUsers" => Method::GetAllUsers,
            "createUser" => Method::CreateUser,
            "updateUser" => Method::UpdateUser,
            "deleteUser" => Method::DeleteUser,
            "getStatistics" => Method::GetStatistics,
            other => return Err(AppError::MethodNotFound(other.to_string())),
        };
        Ok(method)
    }
}
