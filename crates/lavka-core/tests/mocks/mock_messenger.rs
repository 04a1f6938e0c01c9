//! Recording messenger for scenario tests
//!
//! Captures every outbound message instead of sending it, so tests can
//! assert on exactly what the store said and to whom.

#![allow(dead_code)] // Accessors are shared across several test crates

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lavka_core::shop::{Messenger, OrderSummary, ReviewerAction};
use tokio::sync::Mutex;

/// Messenger that records calls instead of delivering them.
#[derive(Default)]
pub struct RecordingMessenger {
    texts: Mutex<Vec<(i64, String)>>,
    review_prompts: Mutex<Vec<(OrderSummary, Vec<ReviewerAction>)>>,
    deliveries: Mutex<Vec<(i64, String)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail, as if the chat platform was down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_up(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("messenger is down");
        }
        Ok(())
    }

    /// All plain texts sent to one chat, in send order.
    pub async fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.texts
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub async fn last_text_for(&self, chat_id: i64) -> Option<String> {
        self.texts_for(chat_id).await.pop()
    }

    /// Review prompts in send order.
    pub async fn review_prompts(&self) -> Vec<(OrderSummary, Vec<ReviewerAction>)> {
        self.review_prompts.lock().await.clone()
    }

    pub async fn last_review_prompt(&self) -> Option<(OrderSummary, Vec<ReviewerAction>)> {
        self.review_prompts.lock().await.last().cloned()
    }

    /// Credential payloads handed to one buyer.
    pub async fn deliveries_for(&self, buyer_id: i64) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == buyer_id)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn notify_buyer(&self, buyer_id: i64, text: &str) -> anyhow::Result<()> {
        self.check_up()?;
        self.texts.lock().await.push((buyer_id, text.to_string()));
        Ok(())
    }

    async fn notify_reviewer(&self, summary: &OrderSummary, actions: &[ReviewerAction]) -> anyhow::Result<()> {
        self.check_up()?;
        self.review_prompts.lock().await.push((summary.clone(), actions.to_vec()));
        Ok(())
    }

    async fn deliver_credentials(&self, buyer_id: i64, secret_payload: &str) -> anyhow::Result<()> {
        self.check_up()?;
        self.deliveries.lock().await.push((buyer_id, secret_payload.to_string()));
        Ok(())
    }
}
