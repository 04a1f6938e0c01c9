//! Storefront facade
//!
//! The inbound boundary of the store core. Each entry point maps to one
//! front-end event (plan tap, proof photo, reviewer button) and converts
//! the domain error taxonomy into short user-facing messages; only
//! infrastructure errors propagate to the embedding process. Every
//! transition attempt, successful or not, leaves one audit entry.

use std::sync::Arc;

use serde_json::json;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::shop::allocation;
use crate::shop::guard::RateLimiter;
use crate::shop::messenger::{Messenger, OrderSummary, ReviewerAction};
use crate::shop::session::SessionStore;
use crate::storage::audit::{self, AuditAction, AuditEvent};
use crate::storage::db::{self, DbConnection, DbPool};
use crate::storage::inventory;
use crate::storage::orders::{self, Order, OrderStatus, ReviewState};

/// Errors answered with a reviewer-facing refusal instead of bubbling up.
/// Unknown order ids land here too: buttons can outlive anything.
fn review_refused(err: &AppError) -> bool {
    err.is_domain() || matches!(err, AppError::Validation(_))
}

/// Dependencies of the store flows, constructed once per process (or per
/// test) and shared across handlers.
#[derive(Clone)]
pub struct Storefront {
    db_pool: Arc<DbPool>,
    messenger: Arc<dyn Messenger>,
    rate_limiter: Arc<RateLimiter>,
    sessions: Arc<SessionStore>,
    reviewer_id: i64,
}

impl Storefront {
    /// Create the facade over its collaborators.
    ///
    /// `reviewer_id` is the single trusted principal; pass
    /// `*config::reviewer::REVIEWER_ID` in production. Zero means no
    /// reviewer is configured and every reviewer action is refused.
    pub fn new(
        db_pool: Arc<DbPool>,
        messenger: Arc<dyn Messenger>,
        rate_limiter: Arc<RateLimiter>,
        sessions: Arc<SessionStore>,
        reviewer_id: i64,
    ) -> Self {
        Self {
            db_pool,
            messenger,
            rate_limiter,
            sessions,
            reviewer_id,
        }
    }

    fn conn(&self) -> AppResult<DbConnection> {
        Ok(db::get_connection(&self.db_pool)?)
    }

    fn is_reviewer(&self, caller_id: i64) -> bool {
        self.reviewer_id != 0 && caller_id == self.reviewer_id
    }

    /// Send a plain text, logging instead of failing; delivery retries
    /// are the messenger's problem.
    async fn send_to(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.messenger.notify_buyer(chat_id, text).await {
            log::warn!("Failed to send message to {}: {}", chat_id, e);
        }
    }

    async fn send_review_prompt(&self, order: &Order, actions: &[ReviewerAction]) {
        let summary = OrderSummary::from_order(order);
        if let Err(e) = self.messenger.notify_reviewer(&summary, actions).await {
            log::warn!("Failed to send review prompt for order {}: {}", order.id, e);
        }
    }

    /// Buyer picked a plan: open an order and ask for the payment proof.
    ///
    /// Returns the created order, or `None` when the buyer was turned
    /// away (cooldown, unknown plan, or an order already open).
    pub async fn on_plan_selected(&self, buyer_id: i64, plan: &str) -> AppResult<Option<Order>> {
        if self.rate_limiter.is_rate_limited(buyer_id).await {
            let remaining = self
                .rate_limiter
                .get_remaining_time(buyer_id)
                .await
                .map(|d| d.as_secs().max(1))
                .unwrap_or(1);
            self.send_to(
                buyer_id,
                &format!("⏳ Не так быстро! Попробуй снова через {} сек.", remaining),
            )
            .await;
            return Ok(None);
        }

        let Some(price) = config::pricing::price_for(plan) else {
            self.send_to(buyer_id, "🤔 Такого плана в магазине нет. Выбери план из меню.")
                .await;
            return Ok(None);
        };

        let conn = self.conn()?;

        // Fast pre-check for a friendly message; the ledger's unique
        // index below stays authoritative.
        if let Some(open) = orders::latest_for_buyer(&conn, buyer_id)? {
            if open.status == OrderStatus::Pending {
                self.notify_duplicate_order(buyer_id, &open.plan).await;
                return Ok(None);
            }
        }

        let order = match orders::create_order(&conn, buyer_id, plan, &price) {
            Ok(order) => order,
            Err(AppError::DuplicatePendingOrder(_)) => {
                // Two rapid taps raced past the pre-check; the index won.
                audit::append_or_log(
                    &conn,
                    &AuditEvent::new(AuditAction::OrderCreated, "duplicate_pending_order")
                        .with_plan(plan)
                        .with_buyer(buyer_id),
                );
                self.notify_duplicate_order(buyer_id, plan).await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        audit::append_or_log(&conn, &AuditEvent::for_order(AuditAction::OrderCreated, &order));
        metrics::ORDERS_CREATED_TOTAL.with_label_values(&[plan]).inc();

        self.sessions.start(buyer_id, plan).await;
        self.sessions.bind_order(buyer_id, &order.id).await;
        self.rate_limiter.update_rate_limit(buyer_id).await;

        self.send_to(
            buyer_id,
            &format!(
                "🛒 Заказ оформлен: план {}, цена {}.\n📸 Пришли фото чека об оплате — я передам его на проверку.",
                plan, price
            ),
        )
        .await;

        log::info!("Buyer {} opened order {} (plan {})", buyer_id, order.id, plan);
        Ok(Some(order))
    }

    async fn notify_duplicate_order(&self, buyer_id: i64, plan: &str) {
        self.send_to(
            buyer_id,
            &format!(
                "⚠️ У тебя уже есть открытый заказ (план {}). Доведи его до конца или дождись решения продавца.",
                plan
            ),
        )
        .await;
    }

    /// Buyer sent a payment proof: attach it and wake the reviewer.
    ///
    /// Returns `false` when there was no order waiting for proof; a
    /// resent photo on a live order is accepted and simply replaces the
    /// previous proof.
    pub async fn on_proof_submitted(&self, buyer_id: i64, proof_ref: &str) -> AppResult<bool> {
        let conn = self.conn()?;

        let open = match orders::latest_for_buyer(&conn, buyer_id)? {
            Some(order) if order.status == OrderStatus::Pending => order,
            _ => {
                // The session hint tells apart "never ordered" from
                // "order just closed under you".
                let text = if self.sessions.get(buyer_id).await.is_some() {
                    "🤷 Твой заказ уже закрыт или истёк. Оформи новый, если хочешь."
                } else {
                    "🤷 Не нашла заказа, который ждёт оплаты. Сначала выбери план."
                };
                self.send_to(buyer_id, text).await;
                return Ok(false);
            }
        };

        if !orders::attach_proof(&conn, &open.id, proof_ref)? {
            self.send_to(buyer_id, "🤷 Твой заказ уже закрыт или истёк. Оформи новый, если хочешь.")
                .await;
            return Ok(false);
        }

        audit::append_or_log(
            &conn,
            &AuditEvent::new(AuditAction::ProofAttached, "pending")
                .with_plan(&open.plan)
                .with_buyer(buyer_id)
                .with_order_id(&open.id)
                .with_detail(json!({ "proof_ref": proof_ref })),
        );

        let order = orders::get_order(&conn, &open.id)?
            .ok_or_else(|| AppError::Validation(format!("order {} vanished after proof", open.id)))?;

        self.send_to(
            buyer_id,
            "✅ Чек получила! Как только продавец подтвердит оплату, пришлю данные аккаунта.",
        )
        .await;
        self.send_review_prompt(&order, &[ReviewerAction::Approve, ReviewerAction::Reject])
            .await;

        log::info!("Buyer {} attached proof to order {}", buyer_id, order.id);
        Ok(true)
    }

    /// Reviewer pressed a button under a review prompt.
    ///
    /// Anyone but the configured reviewer is refused, and the attempt is
    /// audited with the caller's identity.
    pub async fn on_reviewer_action(&self, caller_id: i64, order_id: &str, action: ReviewerAction) -> AppResult<()> {
        if !self.is_reviewer(caller_id) {
            metrics::UNAUTHORIZED_ACTIONS_TOTAL.inc();
            log::warn!(
                "Unauthorized reviewer action '{}' on order {} by user {}",
                action.as_str(),
                order_id,
                caller_id
            );
            let conn = self.conn()?;
            audit::append_or_log(
                &conn,
                &AuditEvent::new(AuditAction::Unauthorized, "unauthorized")
                    .with_buyer(caller_id)
                    .with_order_id(order_id)
                    .with_detail(json!({ "action": action.as_str() })),
            );
            self.send_to(caller_id, "🚫 Эта кнопка только для продавца.").await;
            return Ok(());
        }

        match action {
            ReviewerAction::Approve => self.handle_approve(order_id).await,
            ReviewerAction::Confirm => self.handle_confirm(order_id).await,
            ReviewerAction::Cancel => self.handle_cancel(order_id).await,
            ReviewerAction::Reject => self.handle_reject(order_id).await,
        }
    }

    /// First tap: move to the confirm sub-state and redraw the prompt.
    /// Never touches the allocation engine.
    async fn handle_approve(&self, order_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        match orders::request_confirm(&conn, order_id) {
            Ok(order) => {
                audit::append_or_log(&conn, &AuditEvent::for_order(AuditAction::ConfirmRequested, &order));
                self.send_review_prompt(&order, &[ReviewerAction::Confirm, ReviewerAction::Cancel])
                    .await;
                Ok(())
            }
            Err(e) if review_refused(&e) => {
                self.report_review_failure(conn, AuditAction::ConfirmRequested, order_id, &e)
                    .await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Second tap: the order must sit in the confirm sub-state, then the
    /// allocation engine takes over.
    async fn handle_confirm(&self, order_id: &str) -> AppResult<()> {
        let mut conn = self.conn()?;

        // Approve only after an explicit confirm; a replayed or stale
        // confirm button fails closed.
        let stage = match orders::get_order(&conn, order_id)? {
            Some(order) => order.review_state(),
            None => {
                let e = AppError::Validation(format!("order {} not found", order_id));
                self.report_review_failure(conn, AuditAction::Approval, order_id, &e).await;
                return Ok(());
            }
        };
        if stage != ReviewState::ConfirmRequested {
            let e = AppError::InvalidTransition {
                order_id: order_id.to_string(),
                from: stage.as_str().to_string(),
                to: OrderStatus::Approved.as_str().to_string(),
            };
            self.report_review_failure(conn, AuditAction::Approval, order_id, &e).await;
            return Ok(());
        }

        match allocation::approve_order(&mut conn, order_id) {
            Ok((approved, item)) => {
                metrics::ORDERS_APPROVED_TOTAL.with_label_values(&[&approved.plan]).inc();
                self.sessions.clear(approved.buyer_id).await;

                if let Err(e) = self
                    .messenger
                    .deliver_credentials(approved.buyer_id, &item.secret_payload)
                    .await
                {
                    log::error!("Failed to deliver credentials for order {}: {}", approved.id, e);
                }
                self.send_to(
                    approved.buyer_id,
                    "🎉 Оплата подтверждена! Выше — данные твоего аккаунта. Спасибо за покупку!",
                )
                .await;
                self.send_to(
                    self.reviewer_id,
                    &format!("✅ Заказ `{}` одобрен, аккаунт выдан покупателю.", approved.id),
                )
                .await;
                Ok(())
            }
            Err(e) if review_refused(&e) => {
                if let AppError::OutOfStock(plan) = &e {
                    metrics::OUT_OF_STOCK_TOTAL.with_label_values(&[plan]).inc();
                    // The order stays in the confirm sub-state; restock
                    // and a second confirm will finish the job.
                    if let Ok(Some(order)) = orders::get_order(&conn, order_id) {
                        self.send_to(
                            order.buyer_id,
                            "😔 Свободные аккаунты закончились. Продавец пополнит склад и сразу выдаст твой — ничего делать не нужно.",
                        )
                        .await;
                    }
                }
                self.report_review_failure(conn, AuditAction::Approval, order_id, &e).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Reviewer backed out of the confirm prompt.
    async fn handle_cancel(&self, order_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        match orders::cancel_confirm(&conn, order_id) {
            Ok(order) => {
                audit::append_or_log(&conn, &AuditEvent::for_order(AuditAction::ConfirmCancelled, &order));
                self.send_review_prompt(&order, &[ReviewerAction::Approve, ReviewerAction::Reject])
                    .await;
                Ok(())
            }
            Err(e) if review_refused(&e) => {
                self.report_review_failure(conn, AuditAction::ConfirmCancelled, order_id, &e)
                    .await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Reject: always legal from any non-terminal state, always terminal.
    async fn handle_reject(&self, order_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        match orders::transition(&conn, order_id, OrderStatus::Rejected, None) {
            Ok(order) => {
                audit::append_or_log(&conn, &AuditEvent::for_order(AuditAction::Rejection, &order));
                metrics::ORDERS_REJECTED_TOTAL.with_label_values(&[&order.plan]).inc();
                self.sessions.clear(order.buyer_id).await;

                self.send_to(
                    order.buyer_id,
                    "❌ Оплату не удалось подтвердить — заказ отклонён. Если это ошибка, напиши продавцу.",
                )
                .await;
                self.send_to(self.reviewer_id, &format!("❌ Заказ `{}` отклонён.", order.id))
                    .await;
                Ok(())
            }
            Err(e) if review_refused(&e) => {
                self.report_review_failure(conn, AuditAction::Rejection, order_id, &e).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Audit a failed reviewer step and tell the reviewer what happened.
    ///
    /// Written on a live connection, outside any failed transaction, so
    /// the entry survives the rollback.
    async fn report_review_failure(&self, conn: DbConnection, action: AuditAction, order_id: &str, err: &AppError) {
        audit::append_or_log(
            &conn,
            &AuditEvent::new(action, err.audit_tag())
                .with_order_id(order_id)
                .with_detail(json!({ "error": err.to_string() })),
        );

        let text = match err {
            AppError::NotReady(_) => "📎 У заказа ещё нет чека — одобрять рано.".to_string(),
            AppError::OutOfStock(plan) => format!(
                "❗ Свободных аккаунтов плана {} нет. Пополни склад и нажми подтверждение ещё раз.",
                plan
            ),
            AppError::InvalidTransition { from, .. } => {
                log::warn!("Stale reviewer button on order {} (state {})", order_id, from);
                format!("🗂 Кнопка устарела: заказ сейчас в состоянии «{}».", from)
            }
            AppError::Validation(_) => "🤷 Такого заказа нет.".to_string(),
            _ => "⚠️ Не получилось обработать действие, подробности в логах.".to_string(),
        };
        self.send_to(self.reviewer_id, &text).await;
    }

    /// Per-plan stock breakdown for the reviewer, also refreshing the
    /// stock gauge.
    pub async fn stock_report(&self) -> AppResult<String> {
        let conn = self.conn()?;
        let stock = inventory::stock_by_plan(&conn)?;

        if stock.is_empty() {
            return Ok("📦 Склад пуст — ещё ничего не завозили.".to_string());
        }

        let mut text = String::from("📦 Склад:\n");
        for entry in &stock {
            metrics::STOCK_AVAILABLE
                .with_label_values(&[&entry.plan])
                .set(entry.available as f64);
            text.push_str(&format!(
                "• {}: {} свободно, {} продано\n",
                entry.plan, entry.available, entry.sold
            ));
        }
        Ok(text)
    }

    /// Expire stale pending orders: audit, count, and tell each buyer.
    ///
    /// Driven by the background sweep in `shop::expiry`; safe next to an
    /// in-flight approval because the sweep predicate only touches rows
    /// still pending.
    pub async fn expire_stale_orders(&self) -> AppResult<Vec<Order>> {
        let window_minutes = *config::orders::EXPIRY_MINUTES;
        let conn = self.conn()?;
        let expired = orders::expire_stale(&conn, window_minutes)?;

        for order in &expired {
            audit::append_or_log(&conn, &AuditEvent::for_order(AuditAction::Expired, order));
            metrics::ORDERS_EXPIRED_TOTAL.with_label_values(&[&order.plan]).inc();
            self.sessions.clear(order.buyer_id).await;
            self.send_to(
                order.buyer_id,
                &format!(
                    "⌛ Заказ истёк: мы не дождались оплаты за {} минут. Можешь оформить новый в любой момент.",
                    window_minutes
                ),
            )
            .await;
        }
        Ok(expired)
    }
}
