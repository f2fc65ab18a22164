//! Conversation commands: list and open.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use pawbook_core::backend::Backend;
use pawbook_core::conversation::other_participant;
use pawbook_types::conversation::Conversation;

use crate::cli::format_relative_time;
use crate::state::AppState;

/// List a user's conversations, most recent first.
pub async fn list_conversations<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let conversations = state.conversations.list_for_user(user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. Start one with: {}",
            style("i").blue().bold(),
            style(format!("pawbook open --user {user_id} --with <email>")).yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", conversation_table(&conversations, user_id));
    println!();
    println!(
        "  {} conversation{}",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Find or create the conversation between two users and print it.
pub async fn open_conversation<B: Backend + 'static>(
    state: &AppState<B>,
    user_id: &str,
    other: &str,
    json: bool,
) -> Result<()> {
    let conversation = state.conversations.find_or_create(user_id, other).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversation)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Conversation with {}",
        style("✓").green().bold(),
        style(other_participant(&conversation, user_id)).cyan()
    );
    println!(
        "  {}  {}",
        style("ID:").bold(),
        style(&conversation.id).dim()
    );
    if !conversation.last_message.is_empty() {
        println!(
            "  {}  {}",
            style("Last:").bold(),
            conversation.last_message
        );
    }
    println!();

    Ok(())
}

pub(crate) fn conversation_table(conversations: &[Conversation], user_id: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("With").fg(Color::White),
        Cell::new("Last message").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for conversation in conversations {
        let preview = if conversation.last_message.is_empty() {
            Cell::new("(no messages)").fg(Color::DarkGrey)
        } else {
            Cell::new(&conversation.last_message)
        };
        table.add_row(vec![
            Cell::new(other_participant(conversation, user_id)).fg(Color::Cyan),
            preview,
            Cell::new(format_relative_time(&conversation.last_message_at)).fg(Color::DarkGrey),
            Cell::new(&conversation.id).fg(Color::DarkGrey),
        ]);
    }

    table
}
