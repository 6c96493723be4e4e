use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::application::RunLifecycleManager;
use crate::domain::{DomainError, Session};

pub const EXIT_WORD: &str = "quit";
const PROMPT: &str = "Enter a message (or 'quit' to exit): ";

/// Interactive console conversation on a single thread.
///
/// Reads one line at a time, sends it through
/// [`RunLifecycleManager::process_message`] and prints the reply. Stops on
/// [`EXIT_WORD`] (any case) or end of input and returns the final session.
pub async fn run_chat<R, W>(
    lifecycle: &RunLifecycleManager,
    session: Session,
    input: R,
    output: &mut W,
) -> Result<Session, DomainError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = session;
    let mut lines = input.lines();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let text = line.trim();
        if text.eq_ignore_ascii_case(EXIT_WORD) {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let (next, response) = lifecycle.process_message(&session, text).await?;
        session = next;
        debug!(
            "Run {:?} finished",
            session.run().map(|r| r.status().to_string())
        );

        let reply = match response {
            Some(reply) => format!("Assistant: {}\n", reply),
            None => "Assistant: (no response)\n".to_string(),
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(session)
}
