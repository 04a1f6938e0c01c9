//! Outbound messaging port
//!
//! The core never talks to a chat framework directly. The embedding
//! process implements [`Messenger`] over its transport (Telegram in
//! production, a recording mock in tests). Implementations own delivery
//! retries; the core logs a failed send and moves on.

use async_trait::async_trait;
use serde::Serialize;

use crate::storage::orders::{parse_sqlite_datetime, Order};

/// An action button offered to the reviewer under a review prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewerAction {
    /// First tap: ask for confirmation
    Approve,
    /// Second tap: actually allocate and approve
    Confirm,
    /// Back out of the confirm prompt
    Cancel,
    /// Reject the order (terminal)
    Reject,
}

impl ReviewerAction {
    /// Returns the string identifier used in callback payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewerAction::Approve => "approve",
            ReviewerAction::Confirm => "confirm",
            ReviewerAction::Cancel => "cancel",
            ReviewerAction::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewerAction> {
        match s {
            "approve" => Some(ReviewerAction::Approve),
            "confirm" => Some(ReviewerAction::Confirm),
            "cancel" => Some(ReviewerAction::Cancel),
            "reject" => Some(ReviewerAction::Reject),
            _ => None,
        }
    }

    /// Button label shown to the reviewer
    pub fn label(&self) -> &'static str {
        match self {
            ReviewerAction::Approve => "✅ Одобрить",
            ReviewerAction::Confirm => "✅ Да, подтверждаю",
            ReviewerAction::Cancel => "↩️ Отмена",
            ReviewerAction::Reject => "❌ Отклонить",
        }
    }
}

/// Snapshot of an order for the reviewer's prompt.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub buyer_id: i64,
    pub plan: String,
    pub price_snapshot: String,
    pub review_state: String,
    pub proof_ref: Option<String>,
    pub created_at: String,
}

impl OrderSummary {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            buyer_id: order.buyer_id,
            plan: order.plan.clone(),
            price_snapshot: order.price_snapshot.clone(),
            review_state: order.review_state().as_str().to_string(),
            proof_ref: order.proof_ref.clone(),
            created_at: order.created_at.clone(),
        }
    }

    /// Text of the review prompt; the front end draws the action buttons.
    pub fn format_message(&self) -> String {
        let proof = if self.proof_ref.is_some() {
            "приложен"
        } else {
            "нет"
        };
        let created = parse_sqlite_datetime(&self.created_at)
            .map(|t| t.format("%d.%m %H:%M UTC").to_string())
            .unwrap_or_else(|| self.created_at.clone());
        format!(
            "🧾 Заказ `{}`\n👤 Покупатель: `{}`\n📋 План: {} — {}\n📎 Чек: {}\n🕒 Создан: {}\n⏳ Состояние: {}",
            self.order_id, self.buyer_id, self.plan, self.price_snapshot, proof, created, self.review_state
        )
    }
}

/// Outbound side of the messaging front end.
///
/// `notify_buyer` sends a plain text to any principal by chat id, the
/// reviewer included, for feedback that is not a review prompt.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn notify_buyer(&self, buyer_id: i64, text: &str) -> anyhow::Result<()>;

    /// Render (or re-render) the review prompt for an order with the
    /// actions currently available.
    async fn notify_reviewer(&self, summary: &OrderSummary, actions: &[ReviewerAction]) -> anyhow::Result<()>;

    /// Hand the sold credentials to the buyer.
    async fn deliver_credentials(&self, buyer_id: i64, secret_payload: &str) -> anyhow::Result<()>;
}
