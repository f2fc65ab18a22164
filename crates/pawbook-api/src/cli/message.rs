//! Message commands: send and history.

use anyhow::Result;
use console::style;

use pawbook_core::backend::Backend;
use pawbook_types::conversation::{Conversation, same_user};
use pawbook_types::error::MessagingError;
use pawbook_types::message::{Draft, Message, Sender};

use crate::cli::{default_display_name, format_relative_time};
use crate::state::AppState;

/// Send one message from `user_id` to `other`, starting the conversation
/// if needed.
///
/// # Examples
///
/// ```bash
/// pawbook send --user alice@paws.dev --with bob@paws.dev Walk at five?
/// ```
pub async fn send_message<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    name: Option<String>,
    other: &str,
    text: &str,
    json: bool,
) -> Result<Message> {
    if text.trim().is_empty() {
        return Err(MessagingError::EmptyMessage.into());
    }
    let conversation = state.conversations.find_or_create(user_id, other).await?;
    let sender = Sender::new(
        user_id,
        name.unwrap_or_else(|| default_display_name(user_id)),
    );
    let mut draft = Draft::new(text);

    let message = state
        .outbound
        .send(&conversation.id, &sender, &mut draft)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        println!(
            "  {} Sent to {} {}",
            style("✓").green().bold(),
            style(other).cyan(),
            style(format!("({})", message.id)).dim()
        );
    }

    Ok(message)
}

/// Print the message log of the conversation between two users.
pub async fn show_history<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    other: &str,
    json: bool,
) -> Result<Vec<Message>> {
    let Some(conversation) = find_existing(state, user_id, other).await? else {
        if json {
            println!("[]");
        } else {
            println!();
            println!(
                "  {} No conversation with {} yet.",
                style("i").blue().bold(),
                style(other).cyan()
            );
            println!();
        }
        return Ok(Vec::new());
    };

    let messages = state.messages.refresh(&conversation.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(messages);
    }

    println!();
    if messages.is_empty() {
        println!("  {}", style("(no messages)").dim());
    }
    for message in &messages {
        println!("{}", format_message(message, user_id));
    }
    println!();

    Ok(messages)
}

async fn find_existing<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    other: &str,
) -> Result<Option<Conversation>> {
    let conversations = state.conversations.list_for_user(user_id).await?;
    Ok(conversations
        .into_iter()
        .find(|conversation| conversation.participants.is_pair(user_id, other)))
}

/// One line of a message log, own messages marked.
pub(crate) fn format_message(message: &Message, user_id: &str) -> String {
    let own = same_user(&message.sender_id, user_id);
    let name = if message.sender_name.is_empty() {
        message.sender_id.as_str()
    } else {
        message.sender_name.as_str()
    };
    let name = if own {
        style(name).green().bold()
    } else {
        style(name).cyan().bold()
    };
    format!(
        "  {} {} {}",
        style(format!("[{}]", format_relative_time(&message.created_at))).dim(),
        name,
        message.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawbook_infra::memory::MemoryBackend;
    use pawbook_types::config::PawbookConfig;
    use pawbook_types::entity::EntityKind;

    fn state() -> AppState<MemoryBackend> {
        AppState::<MemoryBackend>::in_memory(PawbookConfig::default())
    }

    #[tokio::test]
    async fn send_creates_conversation_and_message() {
        let state = state();

        let message = send_message(
            &state,
            "alice@paws.dev",
            None,
            "bob@paws.dev",
            "Walk at five?",
            true,
        )
        .await
        .unwrap();

        assert_eq!(message.sender_name, "alice");
        assert_eq!(message.content, "Walk at five?");
        assert_eq!(state.backend.len(EntityKind::Conversation), 1);

        let bob = state.conversations.list_for_user("bob@paws.dev").await.unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].last_message, "Walk at five?");
    }

    #[tokio::test]
    async fn history_is_empty_without_conversation() {
        let state = state();
        let messages = show_history(&state, "alice@paws.dev", "bob@paws.dev", true)
            .await
            .unwrap();
        assert!(messages.is_empty());
        assert_eq!(state.backend.len(EntityKind::Conversation), 0);
    }

    #[tokio::test]
    async fn history_lists_both_sides_in_order() {
        let state = state();
        send_message(&state, "alice@paws.dev", None, "bob@paws.dev", "one", true)
            .await
            .unwrap();
        send_message(&state, "bob@paws.dev", Some("Bob".into()), "alice@paws.dev", "two", true)
            .await
            .unwrap();

        let messages = show_history(&state, "Alice@paws.dev", "bob@paws.dev", true)
            .await
            .unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two"]);
        assert_eq!(messages[1].sender_name, "Bob");
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let state = state();
        let err = send_message(&state, "alice@paws.dev", None, "bob@paws.dev", "   ", true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MessagingError>(),
            Some(MessagingError::EmptyMessage)
        ));
        assert_eq!(state.backend.len(EntityKind::Conversation), 0);
    }

    #[test]
    fn format_message_falls_back_to_sender_id() {
        let message = Message {
            id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            sender_id: "bob@paws.dev".to_string(),
            sender_name: String::new(),
            content: "woof".to_string(),
            created_at: chrono::Utc::now(),
        };
        let line = console::strip_ansi_codes(&format_message(&message, "alice@paws.dev")).to_string();
        assert!(line.contains("bob@paws.dev woof"));
        assert!(line.contains("[just now]"));
    }
}
