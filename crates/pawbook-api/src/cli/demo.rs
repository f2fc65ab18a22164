//! `pawbook demo`: a two-user exchange against an in-process backend.
//!
//! Alice and Bob each get their own stores over one shared
//! [`MemoryBackend`], so Bob's scheduler sees Alice's messages the same way
//! it would see another client's writes on the hosted backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;

use pawbook_infra::memory::MemoryBackend;
use pawbook_types::config::PawbookConfig;
use pawbook_types::message::{Draft, Message, Sender};

use crate::cli::message::format_message;
use crate::state::AppState;

const ALICE: &str = "alice@paws.dev";
const BOB: &str = "bob@paws.dev";

/// How long Bob waits for Alice's live message.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// What the demo observed.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub conversation_id: String,
    /// Bob's log after Alice's second message arrived.
    pub bob_log: Vec<Message>,
}

pub async fn run_demo(config: PawbookConfig, json: bool) -> Result<DemoReport> {
    let alice = AppState::<MemoryBackend>::in_memory(config.clone());
    let bob = AppState::<MemoryBackend>::with_backend(Arc::clone(&alice.backend), config);

    let alice_sender = Sender::new(ALICE, "Alice");
    let conversation = alice.conversations.find_or_create(ALICE, BOB).await?;
    let mut draft = Draft::new("Hi Bob! Is Rex free for a walk?");
    alice
        .outbound
        .send(&conversation.id, &alice_sender, &mut draft)
        .await?;

    // Bob opens the app: list mounted, conversation open.
    let scheduler = bob.scheduler();
    scheduler.mount_list(BOB).await;
    let bob_conversation = bob.conversations.find_or_create(BOB, ALICE).await?;
    scheduler.open_conversation(&bob_conversation.id).await?;
    let mut bob_log = scheduler.messages();

    draft.set("Park at five?");
    let sent = alice
        .outbound
        .send(&conversation.id, &alice_sender, &mut draft)
        .await?;

    let delivered = tokio::time::timeout(DELIVERY_TIMEOUT, async {
        loop {
            if bob_log.borrow_and_update().messages.iter().any(|m| m.id == sent.id) {
                return Ok::<_, anyhow::Error>(());
            }
            bob_log.changed().await.context("message log closed")?;
        }
    })
    .await
    .context("Bob did not receive Alice's message in time")?;
    delivered?;

    let report = DemoReport {
        conversation_id: conversation.id.clone(),
        bob_log: bob_log.borrow().messages.clone(),
    };
    scheduler.unmount().await;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "conversation_id": report.conversation_id,
                "messages": report.bob_log,
            })
        );
        return Ok(report);
    }

    println!();
    println!(
        "  {} {} and {} are talking (conversation {})",
        style("✓").green().bold(),
        style("Alice").cyan(),
        style("Bob").cyan(),
        style(&report.conversation_id).dim()
    );
    println!();
    for message in &report.bob_log {
        println!("{}", format_message(message, BOB));
    }
    println!();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bob_sees_both_messages_in_one_conversation() {
        let report = run_demo(PawbookConfig::default(), true)
            .await
            .unwrap();

        let contents: Vec<_> = report.bob_log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Hi Bob! Is Rex free for a walk?", "Park at five?"]);
        assert!(
            report
                .bob_log
                .iter()
                .all(|m| m.conversation_id == report.conversation_id)
        );
    }
}
