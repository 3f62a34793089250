use goose_desktop_client::chat::{ChatOptions, ChatSession, TurnState};
use goose_desktop_client::{DesktopConfig, DesktopEvent, GoosedClient};
use goose_desktop_models::{Message, Role};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::CliError;

/// Run one turn and print the assistant text as it arrives.
pub async fn run_chat(
    config: &DesktopConfig,
    prompt: &str,
    session_id: Option<&str>,
    approve_tools: bool,
) -> Result<(), CliError> {
    let client = Arc::new(GoosedClient::from_config(&config.backend)?);
    let mut options = ChatOptions::from_config(config);
    options.session_id = session_id.map(str::to_string);

    let session = ChatSession::builder(client.clone())
        .options(options)
        .build();

    if let Some(id) = session_id {
        let details = client.get_session(id).await?;
        session.resume(details);
    }

    let mut events = session.events().subscribe();
    session.append(Message::user().with_text(prompt))?;

    let mut printed = 0;
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    DesktopEvent::MessagesChanged { .. } => {
                        printed = print_new_text(&session, printed, &mut stdout)?;
                    }
                    DesktopEvent::ToolConfirmationRequested { request, .. } => {
                        println!(
                            "\n[tool confirmation] {} {}",
                            request.tool_name, request.arguments
                        );
                        if !approve_tools {
                            warn!("Denying tool {}; pass --approve-tools to allow", request.tool_name);
                        }
                        session.confirm_tool(&request.id, approve_tools).await?;
                    }
                    DesktopEvent::ToolNotification { message, .. } => {
                        info!("tool: {}", message);
                    }
                    DesktopEvent::TurnFinished { .. } | DesktopEvent::TurnFailed { .. } => break,
                    DesktopEvent::Toast(toast) => warn!("{}: {}", toast.title, toast.message),
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let outcome = session.stop();
                println!();
                info!(
                    "Stopped ({} tool calls interrupted)",
                    outcome.interrupted_tool_calls.len()
                );
                return Ok(());
            }
        }
    }

    print_new_text(&session, printed, &mut stdout)?;
    println!();

    if session.state() == TurnState::Errored {
        let message = session.error().unwrap_or_else(|| "unknown error".to_string());
        return Err(CliError::Other(anyhow::anyhow!("Reply failed: {}", message)));
    }
    Ok(())
}

/// Print the part of the reply not yet shown. Returns the new offset.
fn print_new_text(
    session: &ChatSession,
    printed: usize,
    out: &mut impl Write,
) -> Result<usize, CliError> {
    let messages = session.messages();
    let Some(reply) = messages.last().filter(|m| m.role == Role::Assistant) else {
        return Ok(printed);
    };

    let text = reply.as_concat_text();
    if let Some(new) = text.get(printed..) {
        write!(out, "{}", new)?;
        out.flush()?;
    }
    Ok(text.len())
}
