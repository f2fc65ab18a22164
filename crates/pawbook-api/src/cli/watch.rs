//! `pawbook watch`: follow conversations live until Ctrl+C.
//!
//! Mounts the sync scheduler for the user and, with `--with`, opens the
//! conversation with that user. Changes published by the scheduler are
//! printed as they arrive.

use std::collections::HashSet;
use std::future::Future;

use anyhow::Result;
use console::style;

use pawbook_core::backend::Backend;
use pawbook_core::sync::SyncScheduler;

use crate::cli::conversation::conversation_table;
use crate::cli::message::format_message;
use crate::state::AppState;

/// What a watch session printed before it stopped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub list_updates: usize,
    pub messages_seen: usize,
}

pub async fn watch<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    with: Option<&str>,
    json: bool,
) -> Result<()> {
    if !json {
        println!(
            "  {}",
            style("Watching for changes. Press Ctrl+C to stop.").dim()
        );
    }
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    let summary = watch_until(state, user_id, with, json, shutdown).await?;
    tracing::debug!(
        list_updates = summary.list_updates,
        messages_seen = summary.messages_seen,
        "Watch stopped"
    );
    Ok(())
}

/// Run a watch session until `shutdown` resolves, then unmount.
pub async fn watch_until<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    with: Option<&str>,
    json: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<WatchSummary> {
    let scheduler = state.scheduler();
    scheduler.mount_list(user_id).await;

    let result = follow(state, &scheduler, user_id, with, json, shutdown).await;
    scheduler.unmount().await;
    result
}

async fn follow<B: Backend + 'static>(
    state: &AppState<B>,
    scheduler: &SyncScheduler<B>,
    user_id: &str,
    with: Option<&str>,
    json: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<WatchSummary> {
    let mut list_rx = scheduler.conversations();
    let mut log_rx = scheduler.messages();

    if let Some(other) = with {
        let conversation = state.conversations.find_or_create(user_id, other).await?;
        scheduler.open_conversation(&conversation.id).await?;
        if !json {
            println!(
                "  {} Following conversation with {}",
                style("→").cyan().bold(),
                style(other).cyan()
            );
        }
    }

    let mut summary = WatchSummary::default();
    let mut seen: HashSet<String> = HashSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = list_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let conversations = list_rx.borrow_and_update().clone();
                summary.list_updates += 1;
                if json {
                    println!("{}", serde_json::json!({ "conversations": conversations }));
                } else if with.is_none() && !conversations.is_empty() {
                    println!("{}", conversation_table(&conversations, user_id));
                }
            }
            changed = log_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let log = log_rx.borrow_and_update().clone();
                for message in log.messages {
                    if !seen.insert(message.id.clone()) {
                        continue;
                    }
                    summary.messages_seen += 1;
                    if json {
                        println!("{}", serde_json::json!({ "message": message }));
                    } else {
                        println!("{}", format_message(&message, user_id));
                    }
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pawbook_infra::memory::MemoryBackend;
    use pawbook_types::config::PawbookConfig;
    use pawbook_types::message::{Draft, Sender};

    #[tokio::test]
    async fn watch_prints_incoming_messages_until_shutdown() {
        let state = AppState::<MemoryBackend>::in_memory(PawbookConfig::default());
        let conversation = state
            .conversations
            .find_or_create("bob@paws.dev", "alice@paws.dev")
            .await
            .unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let conversation_id = conversation.id.clone();

        let watcher = async {
            watch_until(&state, "alice@paws.dev", Some("bob@paws.dev"), true, async {
                let _ = stop_rx.await;
            })
            .await
        };
        let remote = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let mut draft = Draft::new("Are you home?");
            state
                .outbound
                .send(
                    &conversation_id,
                    &Sender::new("bob@paws.dev", "Bob"),
                    &mut draft,
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = stop_tx.send(());
        };

        let (summary, ()) = tokio::join!(watcher, remote);
        let summary = summary.unwrap();
        assert_eq!(summary.messages_seen, 1);
        assert!(summary.list_updates >= 1);
    }

    #[tokio::test]
    async fn watch_rejects_self_conversation() {
        let state = AppState::<MemoryBackend>::in_memory(PawbookConfig::default());
        let err = watch_until(
            &state,
            "alice@paws.dev",
            Some("ALICE@paws.dev"),
            true,
            std::future::pending(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("invalid participants"));
    }
}
