//! Append-only audit log
//!
//! Every state transition attempt, successful or not, is recorded here
//! with an outcome tag, so stock reconciliation never needs the live
//! order state alone. Entries are never updated or deleted.

use rusqlite::{params, Connection};

use crate::core::error::AppResult;

/// Audit action tags for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// Buyer created an order
    OrderCreated,
    /// Buyer attached (or replaced) payment proof
    ProofAttached,
    /// Reviewer's first tap: entered the confirm sub-state
    ConfirmRequested,
    /// Reviewer backed out of the confirm prompt
    ConfirmCancelled,
    /// Order approved and an inventory item allocated
    Approval,
    /// Order rejected by the reviewer
    Rejection,
    /// Order expired by the background sweep
    Expired,
    /// Reviewer action attempted by a non-reviewer identity
    Unauthorized,
}

impl AuditAction {
    /// Returns the string identifier for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderCreated => "order_created",
            AuditAction::ProofAttached => "proof_attached",
            AuditAction::ConfirmRequested => "confirm_requested",
            AuditAction::ConfirmCancelled => "confirm_cancelled",
            AuditAction::Approval => "approval",
            AuditAction::Rejection => "rejection",
            AuditAction::Expired => "expired",
            AuditAction::Unauthorized => "unauthorized",
        }
    }
}

/// One transition attempt about to be recorded.
///
/// `status` is the outcome tag: the resulting order status on success, or
/// the error kind (`out_of_stock`, `invalid_transition`, ...) on failure.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub action: AuditAction,
    pub status: &'a str,
    pub plan: Option<&'a str>,
    pub buyer_id: Option<i64>,
    pub order_id: Option<&'a str>,
    pub detail: Option<serde_json::Value>,
}

impl<'a> AuditEvent<'a> {
    pub fn new(action: AuditAction, status: &'a str) -> Self {
        Self {
            action,
            status,
            plan: None,
            buyer_id: None,
            order_id: None,
            detail: None,
        }
    }

    /// Event carrying the order's plan, buyer, id, and current status.
    pub fn for_order(action: AuditAction, order: &'a crate::storage::orders::Order) -> Self {
        Self {
            action,
            status: order.status.as_str(),
            plan: Some(&order.plan),
            buyer_id: Some(order.buyer_id),
            order_id: Some(&order.id),
            detail: None,
        }
    }

    pub fn with_plan(mut self, plan: &'a str) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_buyer(mut self, buyer_id: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_order_id(mut self, order_id: &'a str) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// An audit row read back from the database.
///
/// `action` stays a plain string on the read path; the table is
/// append-only and may hold tags written by older releases.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub plan: Option<String>,
    pub buyer_id: Option<i64>,
    pub order_id: Option<String>,
    pub status: String,
    pub detail: Option<String>,
    pub created_at: String,
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        action: row.get(1)?,
        plan: row.get(2)?,
        buyer_id: row.get(3)?,
        order_id: row.get(4)?,
        status: row.get(5)?,
        detail: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Append one entry, returning its id.
pub fn append(conn: &Connection, event: &AuditEvent<'_>) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO audit_log (action, plan, buyer_id, order_id, status, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.action.as_str(),
            event.plan,
            event.buyer_id,
            event.order_id,
            event.status,
            event.detail.as_ref().map(|v| v.to_string()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Append an entry, logging instead of failing.
///
/// Used on failure paths where the primary error is already being
/// handled and a broken audit write must not mask it.
pub fn append_or_log(conn: &Connection, event: &AuditEvent<'_>) {
    if let Err(e) = append(conn, event) {
        log::error!(
            "Failed to write audit entry (action={}, status={}): {}",
            event.action.as_str(),
            event.status,
            e
        );
    }
}

/// Most recent entries, newest first.
pub fn recent(conn: &Connection, limit: i64) -> AppResult<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, action, plan, buyer_id, order_id, status, detail, created_at
         FROM audit_log
         ORDER BY id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], parse_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Most recent entries touching one buyer, newest first.
pub fn recent_for_buyer(conn: &Connection, buyer_id: i64, limit: i64) -> AppResult<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, action, plan, buyer_id, order_id, status, detail, created_at
         FROM audit_log
         WHERE buyer_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![buyer_id, limit], parse_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}
