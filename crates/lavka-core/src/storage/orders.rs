//! Order ledger: buyer purchase intents and their lifecycle.
//!
//! Status is monotonic: `pending -> {approved | rejected | expired}`, no
//! transition leaves a terminal state. The `review_stage` column persists
//! the reviewer's confirm sub-state so the two-tap rule is enforced here,
//! not by whichever buttons a front end happens to draw. The partial
//! unique index on pending orders makes the one-pending-order check and
//! the insert a single atomic step.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::core::error::{AppError, AppResult};
use crate::storage::inventory::ItemId;

/// Parse a SQLite `datetime('now')` text timestamp as UTC.
pub fn parse_sqlite_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub type OrderId = String;

/// Persisted order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "approved" => Some(OrderStatus::Approved),
            "rejected" => Some(OrderStatus::Rejected),
            "expired" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// Reviewer confirmation sub-state of a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    None,
    Confirm,
}

impl ReviewStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStage::None => "none",
            ReviewStage::Confirm => "confirm",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewStage> {
        match s {
            "none" => Some(ReviewStage::None),
            "confirm" => Some(ReviewStage::Confirm),
            _ => None,
        }
    }
}

/// Reviewer-facing view of where an order sits in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Pending, buyer has not sent payment proof yet
    AwaitingProof,
    /// Pending with proof attached, waiting for the reviewer's first tap
    ReviewPending,
    /// Reviewer tapped "approve" once; waiting for confirm or cancel
    ConfirmRequested,
    Approved,
    Rejected,
    Expired,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::AwaitingProof => "awaiting_proof",
            ReviewState::ReviewPending => "review_pending",
            ReviewState::ConfirmRequested => "confirm_requested",
            ReviewState::Approved => "approved",
            ReviewState::Rejected => "rejected",
            ReviewState::Expired => "expired",
        }
    }
}

/// An order row from the database.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: i64,
    pub plan: String,
    pub price_snapshot: String,
    pub status: OrderStatus,
    pub review_stage: ReviewStage,
    pub proof_ref: Option<String>,
    pub item_id: Option<ItemId>,
    pub created_at: String,
    pub approved_at: Option<String>,
}

impl Order {
    /// Creation time as UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_sqlite_datetime(&self.created_at)
    }

    /// Derive the reviewer-facing state from status, proof and stage.
    pub fn review_state(&self) -> ReviewState {
        match self.status {
            OrderStatus::Approved => ReviewState::Approved,
            OrderStatus::Rejected => ReviewState::Rejected,
            OrderStatus::Expired => ReviewState::Expired,
            OrderStatus::Pending => match (self.proof_ref.is_some(), self.review_stage) {
                (_, ReviewStage::Confirm) => ReviewState::ConfirmRequested,
                (true, ReviewStage::None) => ReviewState::ReviewPending,
                (false, ReviewStage::None) => ReviewState::AwaitingProof,
            },
        }
    }
}

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let status_str: String = row.get(4)?;
    let status = OrderStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown order status '{}'", status_str).into(),
        )
    })?;
    let stage_str: String = row.get(5)?;
    let review_stage = ReviewStage::parse(&stage_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown review stage '{}'", stage_str).into(),
        )
    })?;
    Ok(Order {
        id: row.get(0)?,
        buyer_id: row.get(1)?,
        plan: row.get(2)?,
        price_snapshot: row.get(3)?,
        status,
        review_stage,
        proof_ref: row.get(6)?,
        item_id: row.get(7)?,
        created_at: row.get(8)?,
        approved_at: row.get(9)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Create a PENDING order for a buyer.
///
/// The price is snapshotted as given; later pricing changes do not touch
/// open orders. Fails with `DuplicatePendingOrder` when the buyer already
/// has a pending order, detected by the partial unique index, so two
/// rapid submissions cannot both pass a pre-check and both insert.
pub fn create_order(conn: &Connection, buyer_id: i64, plan: &str, price_snapshot: &str) -> AppResult<Order> {
    let id = Uuid::new_v4().to_string();
    let result = conn.query_row(
        "INSERT INTO orders (id, buyer_id, plan, price_snapshot)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, buyer_id, plan, price_snapshot, status, review_stage,
                   proof_ref, item_id, created_at, approved_at",
        params![id, buyer_id, plan, price_snapshot],
        parse_row,
    );
    match result {
        Ok(order) => Ok(order),
        Err(e) if is_unique_violation(&e) => Err(AppError::DuplicatePendingOrder(buyer_id)),
        Err(e) => Err(e.into()),
    }
}

/// Get an order by id.
pub fn get_order(conn: &Connection, order_id: &str) -> AppResult<Option<Order>> {
    let order = conn
        .query_row(
            "SELECT id, buyer_id, plan, price_snapshot, status, review_stage,
                    proof_ref, item_id, created_at, approved_at
             FROM orders WHERE id = ?1",
            params![order_id],
            parse_row,
        )
        .optional()?;
    Ok(order)
}

/// Most recent order of a buyer, any status.
pub fn latest_for_buyer(conn: &Connection, buyer_id: i64) -> AppResult<Option<Order>> {
    let order = conn
        .query_row(
            "SELECT id, buyer_id, plan, price_snapshot, status, review_stage,
                    proof_ref, item_id, created_at, approved_at
             FROM orders
             WHERE buyer_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
            params![buyer_id],
            parse_row,
        )
        .optional()?;
    Ok(order)
}

/// Attach (or replace) payment proof on a pending order.
///
/// Returns `false` without touching anything when the order is no longer
/// PENDING; resending a photo is harmless.
pub fn attach_proof(conn: &Connection, order_id: &str, proof_ref: &str) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE orders SET proof_ref = ?1 WHERE id = ?2 AND status = 'pending'",
        params![proof_ref, order_id],
    )?;
    Ok(changed > 0)
}

/// Move a pending order to a terminal status.
///
/// One conditional UPDATE guarded by `status = 'pending'`, so a terminal
/// order can never be moved again no matter how the call interleaves with
/// others. An APPROVED transition must carry the inventory item reserved
/// in the same unit of work and also stamps `approved_at`.
pub fn transition(conn: &Connection, order_id: &str, target: OrderStatus, item_id: Option<ItemId>) -> AppResult<Order> {
    let updated = match target {
        OrderStatus::Pending => {
            return Err(AppError::Validation("orders cannot transition back to pending".into()));
        }
        OrderStatus::Approved => {
            let item_id = item_id.ok_or_else(|| {
                AppError::Validation("an approved order must be bound to an inventory item".into())
            })?;
            conn.query_row(
                "UPDATE orders
                 SET status = 'approved', item_id = ?1, approved_at = datetime('now'),
                     review_stage = 'none'
                 WHERE id = ?2 AND status = 'pending'
                 RETURNING id, buyer_id, plan, price_snapshot, status, review_stage,
                           proof_ref, item_id, created_at, approved_at",
                params![item_id, order_id],
                parse_row,
            )
            .optional()?
        }
        OrderStatus::Rejected | OrderStatus::Expired => conn
            .query_row(
                "UPDATE orders
                 SET status = ?1, review_stage = 'none'
                 WHERE id = ?2 AND status = 'pending'
                 RETURNING id, buyer_id, plan, price_snapshot, status, review_stage,
                           proof_ref, item_id, created_at, approved_at",
                params![target.as_str(), order_id],
                parse_row,
            )
            .optional()?,
    };

    match updated {
        Some(order) => Ok(order),
        None => match get_order(conn, order_id)? {
            Some(existing) => Err(AppError::InvalidTransition {
                order_id: order_id.to_string(),
                from: existing.status.as_str().to_string(),
                to: target.as_str().to_string(),
            }),
            None => Err(AppError::Validation(format!("order {} not found", order_id))),
        },
    }
}

/// First reviewer tap: enter the confirm sub-state.
///
/// Legal only on a pending order with proof attached; repeating the tap
/// is idempotent. A proof-less order fails with `NotReady`, a terminal
/// one with `InvalidTransition`.
pub fn request_confirm(conn: &Connection, order_id: &str) -> AppResult<Order> {
    let updated = conn
        .query_row(
            "UPDATE orders
             SET review_stage = 'confirm'
             WHERE id = ?1 AND status = 'pending' AND proof_ref IS NOT NULL
             RETURNING id, buyer_id, plan, price_snapshot, status, review_stage,
                       proof_ref, item_id, created_at, approved_at",
            params![order_id],
            parse_row,
        )
        .optional()?;

    if let Some(order) = updated {
        return Ok(order);
    }
    match get_order(conn, order_id)? {
        Some(existing) if existing.status == OrderStatus::Pending => {
            Err(AppError::NotReady(order_id.to_string()))
        }
        Some(existing) => Err(AppError::InvalidTransition {
            order_id: order_id.to_string(),
            from: existing.status.as_str().to_string(),
            to: "confirm_requested".to_string(),
        }),
        None => Err(AppError::Validation(format!("order {} not found", order_id))),
    }
}

/// Reviewer backed out of the confirm prompt: leave the confirm sub-state.
pub fn cancel_confirm(conn: &Connection, order_id: &str) -> AppResult<Order> {
    let updated = conn
        .query_row(
            "UPDATE orders
             SET review_stage = 'none'
             WHERE id = ?1 AND status = 'pending'
             RETURNING id, buyer_id, plan, price_snapshot, status, review_stage,
                       proof_ref, item_id, created_at, approved_at",
            params![order_id],
            parse_row,
        )
        .optional()?;

    if let Some(order) = updated {
        return Ok(order);
    }
    match get_order(conn, order_id)? {
        Some(existing) => Err(AppError::InvalidTransition {
            order_id: order_id.to_string(),
            from: existing.status.as_str().to_string(),
            to: "review_pending".to_string(),
        }),
        None => Err(AppError::Validation(format!("order {} not found", order_id))),
    }
}

/// Expire pending orders older than the window, returning what changed.
///
/// One predicate sweep: only rows still `pending` qualify, so the sweep
/// cannot touch an order an approval has already committed.
pub fn expire_stale(conn: &Connection, window_minutes: i64) -> AppResult<Vec<Order>> {
    let cutoff = format!("-{} minutes", window_minutes);
    let mut stmt = conn.prepare(
        "UPDATE orders
         SET status = 'expired', review_stage = 'none'
         WHERE status = 'pending' AND created_at < datetime('now', ?1)
         RETURNING id, buyer_id, plan, price_snapshot, status, review_stage,
                   proof_ref, item_id, created_at, approved_at",
    )?;
    let rows = stmt.query_map(params![cutoff], parse_row)?;

    let mut expired = Vec::new();
    for row in rows {
        expired.push(row?);
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::init_schema;
    use crate::storage::inventory;
    use rusqlite::Connection;

    fn make_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn backdate(conn: &Connection, order_id: &str, minutes: i64) {
        conn.execute(
            "UPDATE orders SET created_at = datetime('now', ?1) WHERE id = ?2",
            params![format!("-{} minutes", minutes), order_id],
        )
        .unwrap();
    }

    // ── create_order ─────────────────────────────────────────────────────────

    #[test]
    fn create_order_starts_pending() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();

        assert_eq!(order.buyer_id, 100);
        assert_eq!(order.plan, "monthly");
        assert_eq!(order.price_snapshot, "199 ₽");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.review_stage, ReviewStage::None);
        assert!(order.proof_ref.is_none());
        assert!(order.item_id.is_none());
        assert!(order.approved_at.is_none());
        assert_eq!(order.review_state(), ReviewState::AwaitingProof);
    }

    #[test]
    fn second_pending_order_is_rejected() {
        let conn = make_conn();
        create_order(&conn, 100, "monthly", "199 ₽").unwrap();

        let err = create_order(&conn, 100, "yearly", "1490 ₽").unwrap_err();
        assert!(matches!(err, AppError::DuplicatePendingOrder(100)));
    }

    #[test]
    fn terminal_order_frees_the_buyer() {
        let conn = make_conn();
        let first = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        transition(&conn, &first.id, OrderStatus::Rejected, None).unwrap();

        let second = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn different_buyers_are_independent() {
        let conn = make_conn();
        create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        create_order(&conn, 200, "monthly", "199 ₽").unwrap();
    }

    // ── attach_proof ─────────────────────────────────────────────────────────

    #[test]
    fn attach_proof_sets_proof_on_pending() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();

        assert!(attach_proof(&conn, &order.id, "photo:abc").unwrap());
        let order = get_order(&conn, &order.id).unwrap().unwrap();
        assert_eq!(order.proof_ref.as_deref(), Some("photo:abc"));
        assert_eq!(order.review_state(), ReviewState::ReviewPending);
    }

    #[test]
    fn attach_proof_resend_replaces_proof() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        attach_proof(&conn, &order.id, "photo:old").unwrap();

        assert!(attach_proof(&conn, &order.id, "photo:new").unwrap());
        let order = get_order(&conn, &order.id).unwrap().unwrap();
        assert_eq!(order.proof_ref.as_deref(), Some("photo:new"));
    }

    #[test]
    fn attach_proof_is_noop_on_terminal_order() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        transition(&conn, &order.id, OrderStatus::Rejected, None).unwrap();

        assert!(!attach_proof(&conn, &order.id, "photo:late").unwrap());
        let order = get_order(&conn, &order.id).unwrap().unwrap();
        assert!(order.proof_ref.is_none(), "terminal order must keep its proof untouched");
    }

    // ── transition ───────────────────────────────────────────────────────────

    #[test]
    fn approve_binds_item_and_stamps_time() {
        let conn = make_conn();
        let item_id = inventory::restock(&conn, "monthly", "login:pass").unwrap();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();

        let approved = transition(&conn, &order.id, OrderStatus::Approved, Some(item_id)).unwrap();
        assert_eq!(approved.status, OrderStatus::Approved);
        assert_eq!(approved.item_id, Some(item_id));
        assert!(approved.approved_at.is_some());
        assert_eq!(approved.review_stage, ReviewStage::None);
    }

    #[test]
    fn approve_without_item_is_refused() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();

        let err = transition(&conn, &order.id, OrderStatus::Approved, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let order = get_order(&conn, &order.id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending, "refused transition must not mutate");
    }

    #[test]
    fn terminal_states_are_final() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        transition(&conn, &order.id, OrderStatus::Rejected, None).unwrap();

        let err = transition(&conn, &order.id, OrderStatus::Expired, None).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition { ref from, .. } if from == "rejected"
        ));

        let err = transition(&conn, &order.id, OrderStatus::Approved, Some(1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn transition_unknown_order_is_validation_error() {
        let conn = make_conn();
        let err = transition(&conn, "no-such-order", OrderStatus::Rejected, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    // ── request_confirm / cancel_confirm ─────────────────────────────────────

    #[test]
    fn request_confirm_requires_proof() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();

        let err = request_confirm(&conn, &order.id).unwrap_err();
        assert!(matches!(err, AppError::NotReady(_)));
    }

    #[test]
    fn request_confirm_enters_confirm_stage() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        attach_proof(&conn, &order.id, "photo:abc").unwrap();

        let order = request_confirm(&conn, &order.id).unwrap();
        assert_eq!(order.review_stage, ReviewStage::Confirm);
        assert_eq!(order.review_state(), ReviewState::ConfirmRequested);

        // The first tap arriving twice is harmless
        let again = request_confirm(&conn, &order.id).unwrap();
        assert_eq!(again.review_stage, ReviewStage::Confirm);
    }

    #[test]
    fn request_confirm_on_terminal_order_is_invalid() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        attach_proof(&conn, &order.id, "photo:abc").unwrap();
        transition(&conn, &order.id, OrderStatus::Rejected, None).unwrap();

        let err = request_confirm(&conn, &order.id).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn cancel_confirm_returns_to_review() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        attach_proof(&conn, &order.id, "photo:abc").unwrap();
        request_confirm(&conn, &order.id).unwrap();

        let order = cancel_confirm(&conn, &order.id).unwrap();
        assert_eq!(order.review_stage, ReviewStage::None);
        assert_eq!(order.review_state(), ReviewState::ReviewPending);
    }

    // ── latest_for_buyer ─────────────────────────────────────────────────────

    #[test]
    fn latest_for_buyer_none_for_new_buyer() {
        let conn = make_conn();
        assert!(latest_for_buyer(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn latest_for_buyer_returns_newest() {
        let conn = make_conn();
        let first = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        transition(&conn, &first.id, OrderStatus::Rejected, None).unwrap();
        let second = create_order(&conn, 100, "yearly", "1490 ₽").unwrap();

        let latest = latest_for_buyer(&conn, 100).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    // ── expire_stale ─────────────────────────────────────────────────────────

    #[test]
    fn expire_stale_touches_only_old_pending_orders() {
        let conn = make_conn();
        let stale = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        backdate(&conn, &stale.id, 31);
        let fresh = create_order(&conn, 200, "monthly", "199 ₽").unwrap();

        let item_id = inventory::restock(&conn, "yearly", "y").unwrap();
        let approved = create_order(&conn, 300, "yearly", "1490 ₽").unwrap();
        backdate(&conn, &approved.id, 45);
        transition(&conn, &approved.id, OrderStatus::Approved, Some(item_id)).unwrap();

        let expired = expire_stale(&conn, 30).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
        assert_eq!(expired[0].status, OrderStatus::Expired);

        assert_eq!(
            get_order(&conn, &fresh.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
        assert_eq!(
            get_order(&conn, &approved.id).unwrap().unwrap().status,
            OrderStatus::Approved,
            "terminal orders are excluded by the sweep predicate"
        );
    }

    #[test]
    fn expired_order_frees_the_pending_slot() {
        let conn = make_conn();
        let stale = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        backdate(&conn, &stale.id, 31);
        expire_stale(&conn, 30).unwrap();

        // The buyer can order again
        create_order(&conn, 100, "monthly", "199 ₽").unwrap();
    }

    #[test]
    fn expire_stale_clears_confirm_stage() {
        let conn = make_conn();
        let order = create_order(&conn, 100, "monthly", "199 ₽").unwrap();
        attach_proof(&conn, &order.id, "photo:abc").unwrap();
        request_confirm(&conn, &order.id).unwrap();
        backdate(&conn, &order.id, 31);

        let expired = expire_stale(&conn, 30).unwrap();
        assert_eq!(expired[0].review_stage, ReviewStage::None);
        assert_eq!(expired[0].review_state(), ReviewState::Expired);
    }
}
