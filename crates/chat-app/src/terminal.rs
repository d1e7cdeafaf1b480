use rozgar_llm::ToolInvocation;
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::chat::{ChatController, Language, SessionUpdate, render_tool_result, tool_label};
use crate::error::{AppResult, TerminalSnafu};

const HELP_TEXT: &str = "Commands:\n  /lang <en|hi|pa>  switch conversation language\n  /help             show this help\n  /quit             leave the chat\nPress Ctrl-C while a reply streams to stop it.\n";

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Message(String),
    Language(Language),
    UnknownLanguage(String),
    Help,
    Quit,
}

impl InputLine {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let (name, argument) = command
            .split_once(char::is_whitespace)
            .map(|(name, argument)| (name, argument.trim()))
            .unwrap_or((command, ""));
        match name {
            "quit" | "exit" => Self::Quit,
            "help" => Self::Help,
            "lang" | "language" => {
                let code = argument.to_ascii_lowercase();
                if Language::ALL.iter().any(|language| language.code() == code) {
                    Self::Language(Language::from_code(&code))
                } else {
                    Self::UnknownLanguage(argument.to_string())
                }
            }
            _ => Self::Message(line.to_string()),
        }
    }
}

/// Text printed for one transcript change.
pub fn render_update(update: &SessionUpdate) -> String {
    match update {
        SessionUpdate::Fragment { text, .. } => text.clone(),
        SessionUpdate::ToolInvocation { invocation, .. } => render_invocation(invocation),
        SessionUpdate::Committed { .. } => "\n".to_string(),
        SessionUpdate::Failed { error, .. } => format!("\n[error] {error}\n"),
        SessionUpdate::Cancelled { .. } => "\n[stopped]\n".to_string(),
    }
}

fn render_invocation(invocation: &ToolInvocation) -> String {
    format!(
        "\n[{}]\n{}\n",
        tool_label(&invocation.tool_name),
        render_tool_result(&invocation.tool_name, &invocation.result)
    )
}

fn banner(controller: &ChatController) -> String {
    let language = controller.session().language();
    let welcome = controller
        .session()
        .messages()
        .first()
        .map(|message| message.content.as_str())
        .unwrap_or_else(|| language.welcome_message());
    format!(
        "{welcome}\n({} | model {}) Type /help for commands.\n",
        language.display_name(),
        controller.model_id()
    )
}

fn prompt(controller: &ChatController) -> String {
    format!("{} > ", controller.session().language().input_placeholder())
}

async fn emit<W>(output: &mut W, text: &str) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await.context(TerminalSnafu {
        stage: "write-terminal-output",
    })?;
    output.flush().await.context(TerminalSnafu {
        stage: "flush-terminal-output",
    })
}

/// Streams one turn's updates to `output` until the turn closes.
///
/// Ctrl-C cancels the exchange instead of terminating the process.
async fn stream_reply<W>(controller: &mut ChatController, output: &mut W) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            update = controller.next_update() => {
                let Some(update) = update else {
                    return Ok(());
                };
                emit(output, &render_update(&update)).await?;
                if update.is_terminal() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("reply interrupted from terminal");
                if let Some(update) = controller.cancel() {
                    emit(output, &render_update(&update)).await?;
                }
                return Ok(());
            }
        }
    }
}

/// Interactive chat over stdin and stdout.
///
/// Ends on `/quit`, end of input, or Ctrl-C at the prompt.
pub async fn run_chat(controller: &mut ChatController) -> AppResult<()> {
    let mut output = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    emit(&mut output, &banner(controller)).await?;

    loop {
        emit(&mut output, &prompt(controller)).await?;

        let line = tokio::select! {
            line = lines.next_line() => line.context(TerminalSnafu {
                stage: "read-terminal-line",
            })?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            emit(&mut output, "\n").await?;
            break;
        };

        match InputLine::parse(&line) {
            InputLine::Quit => break,
            InputLine::Help => emit(&mut output, HELP_TEXT).await?,
            InputLine::Language(language) => {
                controller.change_language(language);
                tracing::info!(language = language.code(), "conversation language changed");
                emit(
                    &mut output,
                    &format!("{}\n", language.welcome_message()),
                )
                .await?;
            }
            InputLine::UnknownLanguage(code) => {
                emit(
                    &mut output,
                    &format!("Unknown language '{code}'. Use en, hi or pa.\n"),
                )
                .await?;
            }
            InputLine::Message(text) => {
                controller.set_pending_input(text.as_str());
                match controller.submit(&text) {
                    Ok(_) => stream_reply(controller, &mut output).await?,
                    Err(rejected) => {
                        tracing::debug!(reason = %rejected, "message not sent");
                        emit(&mut output, &format!("[not sent] {rejected}\n")).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rozgar_llm::SessionId;
    use serde_json::json;

    use super::*;
    use crate::chat::{MessageId, RequestOptions};

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            InputLine::parse("find clerk jobs in Mohali"),
            InputLine::Message("find clerk jobs in Mohali".to_string())
        );
        assert_eq!(
            InputLine::parse("/unknown thing"),
            InputLine::Message("/unknown thing".to_string())
        );
    }

    #[test]
    fn commands_are_recognised() {
        assert_eq!(InputLine::parse("/quit"), InputLine::Quit);
        assert_eq!(InputLine::parse("  /exit  "), InputLine::Quit);
        assert_eq!(InputLine::parse("/help"), InputLine::Help);
        assert_eq!(
            InputLine::parse("/lang PA"),
            InputLine::Language(Language::Pa)
        );
        assert_eq!(
            InputLine::parse("/lang fr"),
            InputLine::UnknownLanguage("fr".to_string())
        );
        assert_eq!(
            InputLine::parse("/lang"),
            InputLine::UnknownLanguage(String::new())
        );
    }

    #[test]
    fn fragments_print_verbatim() {
        let update = SessionUpdate::Fragment {
            message_id: MessageId(2),
            text: "Sat Sri Akal".to_string(),
        };

        assert_eq!(render_update(&update), "Sat Sri Akal");
    }

    #[test]
    fn tool_invocations_print_under_their_label() {
        let update = SessionUpdate::ToolInvocation {
            message_id: MessageId(2),
            invocation: ToolInvocation {
                tool_name: "resumeAnalysis".to_string(),
                result: json!({ "score": 72, "strengths": ["Clear layout"] }),
            },
        };

        let rendered = render_update(&update);

        assert!(rendered.starts_with("\n[Resume Analysis]\n"));
        assert!(rendered.contains("Resume Score: 72/100"));
        assert!(rendered.contains("Clear layout"));
    }

    #[test]
    fn failures_and_stops_are_marked() {
        let failed = SessionUpdate::Failed {
            message_id: MessageId(2),
            error: "rate limited".to_string(),
        };
        let cancelled = SessionUpdate::Cancelled {
            message_id: MessageId(2),
        };

        assert_eq!(render_update(&failed), "\n[error] rate limited\n");
        assert_eq!(render_update(&cancelled), "\n[stopped]\n");
    }

    #[test]
    fn banner_shows_the_welcome_message() {
        let controller = ChatController::new(
            SessionId(1),
            Language::Hi,
            None,
            RequestOptions::default(),
        );

        let banner = banner(&controller);

        assert!(banner.starts_with(Language::Hi.welcome_message()));
        assert!(banner.contains(Language::Hi.display_name()));
    }

    #[tokio::test]
    async fn emit_writes_and_flushes() {
        let mut output = Vec::new();

        let result = emit(&mut output, "hello").await;

        assert!(result.is_ok());
        assert_eq!(output, b"hello");
    }
}
