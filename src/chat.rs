// Terminal front-end for the chat widget.

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::widget::{AskClient, ChatController, HttpAskClient, Transcript};

/// Runs an interactive session against the gateway at `gateway_url`.
pub async fn run_chat(gateway_url: &str) -> Result<()> {
    info!("Starting chat session against {}", gateway_url);
    println!("Magic: The Gathering Assistant ({})", gateway_url);
    println!("Posez votre question, une par ligne (Ctrl-D pour quitter).");

    let controller = ChatController::new(HttpAskClient::new(gateway_url));
    let lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    drive_chat(controller, lines, &mut stdout).await
}

/// Feeds every input line to `controller` and prints the conversation as it
/// grows. Returns once input is exhausted and every pending reply has been
/// printed.
pub async fn drive_chat<C, R, W>(
    mut controller: ChatController<C>,
    mut lines: tokio::io::Lines<R>,
    out: &mut W,
) -> Result<()>
where
    C: AskClient,
    R: tokio::io::AsyncBufRead + Unpin,
    W: Write,
{
    let conversation = controller.conversation().clone();
    let mut changes = conversation.subscribe();
    let mut transcript = Transcript::new();
    let mut pending = FuturesUnordered::new();
    let mut input_closed = false;

    loop {
        tokio::select! {
            line = lines.next_line(), if !input_closed => {
                match line.context("Failed to read input")? {
                    Some(line) => {
                        controller.set_input(line);
                        if let Some(reply) = controller.send() {
                            pending.push(reply);
                        }
                    }
                    None => input_closed = true,
                }
            }
            Ok(()) = changes.changed() => {
                transcript.render_new(&conversation, out).context("Failed to write transcript")?;
            }
            Some(joined) = pending.next(), if !pending.is_empty() => {
                if let Err(e) = joined {
                    error!("Reply task failed: {:?}", e);
                }
            }
            else => break,
        }

        if input_closed && pending.is_empty() {
            break;
        }
    }

    transcript.render_new(&conversation, out).context("Failed to write transcript")?;
    info!("Chat session finished after {} messages", conversation.len());
    Ok(())
}
