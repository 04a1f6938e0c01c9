//! Allocation engine
//!
//! The only place an inventory item moves from AVAILABLE to SOLD. The
//! verify, the claim, the order transition, and the audit entry run in
//! one IMMEDIATE transaction: either the order ends APPROVED bound to
//! exactly one freshly sold item, or nothing changed at all. SQLite's
//! single-writer lock orders concurrent approvals; the conditional
//! claim in `reserve_one` hands each of them a distinct row or nothing.

use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;

use crate::core::error::{AppError, AppResult};
use crate::storage::audit::{self, AuditAction, AuditEvent};
use crate::storage::inventory::{self, InventoryItem};
use crate::storage::orders::{self, Order, OrderStatus};

/// Approve a reviewed order: claim one item of its plan and bind it.
///
/// Preconditions checked inside the transaction:
/// - the order exists and is still PENDING (else `InvalidTransition`,
///   or `Validation` for an unknown id);
/// - payment proof is attached (else `NotReady`);
/// - the plan has an AVAILABLE item (else `OutOfStock`, nothing mutated).
///
/// On success returns the approved order and the sold item whose
/// `secret_payload` the caller delivers to the buyer. Any error after
/// the claim rolls the whole transaction back, so an item can never end
/// up SOLD next to an order that is still PENDING.
pub fn approve_order(conn: &mut Connection, order_id: &str) -> AppResult<(Order, InventoryItem)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = orders::get_order(&tx, order_id)?
        .ok_or_else(|| AppError::Validation(format!("order {} not found", order_id)))?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidTransition {
            order_id: order_id.to_string(),
            from: order.status.as_str().to_string(),
            to: OrderStatus::Approved.as_str().to_string(),
        });
    }
    if order.proof_ref.is_none() {
        return Err(AppError::NotReady(order_id.to_string()));
    }

    let item =
        inventory::reserve_one(&tx, &order.plan)?.ok_or_else(|| AppError::OutOfStock(order.plan.clone()))?;

    let approved = orders::transition(&tx, order_id, OrderStatus::Approved, Some(item.id))?;

    audit::append(
        &tx,
        &AuditEvent::for_order(AuditAction::Approval, &approved).with_detail(json!({ "item_id": item.id })),
    )?;

    tx.commit()?;

    log::info!(
        "Order {} approved: item {} ({}) sold to buyer {}",
        approved.id,
        item.id,
        approved.plan,
        approved.buyer_id
    );
    Ok((approved, item))
}
