//! Operation Context
//!
//! The authenticated caller and request metadata, threaded explicitly into
//! every operation instead of living in ambient session state.

use std::net::IpAddr;
use uuid::Uuid;

use super::account::{Account, AccountId, Role};

/// The resolved, active account behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account_id: AccountId,
    pub login: String,
    pub role: Role,
}

impl Caller {
    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

impl From<&Account> for Caller {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            login: account.login.clone(),
            role: account.role,
        }
    }
}

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    /// Authenticated caller, if the request carried a valid session
    pub caller: Option<Caller>,

    /// Hash of the session token that authenticated the caller
    pub session_hash: Option<String>,

    /// Correlation ID for request tracing
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Create a new anonymous context
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an authenticated caller and the session it came from
    pub fn with_caller(mut self, caller: Caller, session_hash: String) -> Self {
        self.caller = Some(caller);
        self.session_hash = Some(session_hash);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Account id of the caller, if authenticated
    pub fn caller_id(&self) -> Option<AccountId> {
        self.caller.as_ref().map(|caller| caller.account_id)
    }
}
