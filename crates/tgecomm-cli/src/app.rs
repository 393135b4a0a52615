//! Interactive menu loop driving a TGecomm session

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};

use tgecomm_runtime::{RunOutcome, SessionLifecycleManager};

use crate::error::Result;
use crate::ui::{self, MenuChoice};

/// Why the menu loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppExit {
    /// The user chose to exit
    Quit,
    /// Input was closed
    EndOfInput,
    /// Listening mode ended
    Listened,
}

/// Menu loop reading commands from `R` and rendering to `W`
pub struct App<R, W> {
    session: Arc<SessionLifecycleManager>,
    input: Lines<R>,
    output: W,
    max_retries: u32,
}

impl<R, W> App<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(session: Arc<SessionLifecycleManager>, input: R, output: W) -> Self {
        let max_retries = session.config().session.max_retries;
        Self {
            session,
            input: input.lines(),
            output,
            max_retries,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Run until the user exits, input ends, or listening mode finishes
    pub async fn run(&mut self) -> Result<AppExit> {
        loop {
            ui::print_menu(&mut self.output)?;
            let Some(line) = self.read_line("\nChoose an option (0-5): ").await? else {
                return Ok(AppExit::EndOfInput);
            };

            match MenuChoice::parse(&line) {
                Some(MenuChoice::Exit) => {
                    writeln!(self.output, "Exiting...")?;
                    return Ok(AppExit::Quit);
                }
                Some(MenuChoice::Send) => self.send_message().await?,
                Some(MenuChoice::ViewMessages) => self.view_messages().await?,
                Some(MenuChoice::ListDialogs) => self.list_dialogs().await?,
                Some(MenuChoice::Listen) => return self.listen().await,
                Some(MenuChoice::ShowMetrics) => {
                    let summary = self.session.metrics_summary();
                    ui::print_metrics(&mut self.output, &summary)?;
                }
                None => ui::print_error(&mut self.output, "Invalid option. Please choose 0-5.")?,
            }
        }
    }

    async fn read_line(&mut self, label: &str) -> Result<Option<String>> {
        ui::print_prompt(&mut self.output, label)?;
        Ok(self.input.next_line().await?)
    }

    /// Read a recipient or chat, reporting an unrecognised format
    async fn read_target(&mut self, label: &str) -> Result<Option<String>> {
        let Some(line) = self.read_line(label).await? else {
            return Ok(None);
        };
        match ui::parse_target(&line) {
            Some(target) => Ok(Some(target)),
            None => {
                warn!("Invalid recipient format: {}", line.trim());
                ui::print_error(
                    &mut self.output,
                    "Invalid recipient format. Use @username, +phone, or numeric ID",
                )?;
                Ok(None)
            }
        }
    }

    async fn read_limit(&mut self, label: &str, field_name: &str) -> Result<Option<usize>> {
        let Some(line) = self.read_line(label).await? else {
            return Ok(None);
        };
        match ui::parse_limit(&line, field_name) {
            Ok(limit) => Ok(Some(limit)),
            Err(err) => {
                warn!("Validation error: {}", err);
                ui::print_error(&mut self.output, &err.to_string())?;
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Menu Actions
    // ------------------------------------------------------------------------

    async fn send_message(&mut self) -> Result<()> {
        let Some(recipient) = self
            .read_target("Enter recipient (username/phone/chat_id): ")
            .await?
        else {
            return Ok(());
        };
        let Some(message) = self.read_line("Enter message: ").await? else {
            return Ok(());
        };
        if message.trim().is_empty() {
            return Ok(ui::print_error(&mut self.output, "Message cannot be empty")?);
        }

        match self.session.try_send(&recipient, &message).await {
            Ok(()) => ui::print_success(
                &mut self.output,
                &format!("Message sent to {}", recipient),
            )?,
            Err(err) => ui::print_error(&mut self.output, &format!("Send failed: {}", err))?,
        }
        Ok(())
    }

    async fn view_messages(&mut self) -> Result<()> {
        let Some(chat) = self
            .read_target("Enter chat (username/phone/chat_id): ")
            .await?
        else {
            return Ok(());
        };
        let Some(limit) = self
            .read_limit("Number of messages (default 10): ", "Number of messages")
            .await?
        else {
            return Ok(());
        };

        match self.session.try_fetch_messages(&chat, limit).await {
            Ok(messages) => ui::print_messages(&mut self.output, &chat, &messages)?,
            Err(err) => ui::print_error(
                &mut self.output,
                &format!("Error getting messages from {}: {}", chat, err),
            )?,
        }
        Ok(())
    }

    async fn list_dialogs(&mut self) -> Result<()> {
        let Some(limit) = self
            .read_limit("Number of dialogs (default 10): ", "Number of dialogs")
            .await?
        else {
            return Ok(());
        };

        match self.session.try_fetch_dialogs(limit).await {
            Ok(dialogs) => ui::print_dialogs(&mut self.output, &dialogs)?,
            Err(err) => {
                ui::print_error(&mut self.output, &format!("Error getting dialogs: {}", err))?
            }
        }
        Ok(())
    }

    /// Listen until Ctrl+C, a clean remote close, or retries run out
    async fn listen(&mut self) -> Result<AppExit> {
        ui::print_info(
            &mut self.output,
            "Listening for messages. Press Ctrl+C to stop.",
        )?;
        self.output.flush()?;

        let stop = self.session.stop_handle();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received");
                stop.stop();
            }
        });

        let outcome = self.session.run(self.max_retries).await;
        ctrl_c.abort();

        match outcome {
            Ok(RunOutcome::Stopped) => {
                ui::print_info(&mut self.output, "Stopped listening")?;
                Ok(AppExit::Listened)
            }
            Ok(RunOutcome::Closed) => {
                ui::print_warning(&mut self.output, "Connection closed by the remote side")?;
                Ok(AppExit::Listened)
            }
            Err(err) => {
                ui::print_error(&mut self.output, &err.to_string())?;
                Err(err.into())
            }
        }
    }
}

/// Run the menu against the process's standard input and output
pub async fn run_interactive(session: Arc<SessionLifecycleManager>) -> Result<AppExit> {
    let input = BufReader::new(tokio::io::stdin());
    let mut app = App::new(session, input, std::io::stdout());
    app.run().await
}
