//! Transaction records
//!
//! Immutable log entries written by the transfer engine, and their
//! per-account view used by the history query.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::account::AccountId;
use super::amount::Amount;

pub type TransactionId = i64;

/// One committed transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Amount,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Direction of a transaction relative to the account viewing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    /// `None` when the viewer is neither party
    pub fn relative_to(
        sender_id: AccountId,
        receiver_id: AccountId,
        viewer: AccountId,
    ) -> Option<Self> {
        if sender_id == viewer {
            Some(Direction::Outgoing)
        } else if receiver_id == viewer {
            Some(Direction::Incoming)
        } else {
            None
        }
    }
}

/// A transaction annotated from one account's perspective
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub amount: Amount,
    pub description: Option<String>,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    /// Display name of the other party
    pub counterparty: String,
    pub counterparty_account: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_relative_to_viewer() {
        assert_eq!(Direction::relative_to(1, 2, 1), Some(Direction::Outgoing));
        assert_eq!(Direction::relative_to(1, 2, 2), Some(Direction::Incoming));
        assert_eq!(Direction::relative_to(1, 2, 3), None);
    }

    #[test]
    fn test_history_entry_serializes_type_field() {
        let entry = HistoryEntry {
            id: 7,
            direction: Direction::Outgoing,
            amount: Amount::from_cents(10000).unwrap(),
            description: Some("x".to_string()),
            sender_id: 1,
            receiver_id: 2,
            counterparty: "Client Two".to_string(),
            counterparty_account: Some("ACC1002".to_string()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "outgoing");
        assert_eq!(json["amount"].as_f64(), Some(100.0));
        assert_eq!(json["counterparty"], "Client Two");
    }
}
