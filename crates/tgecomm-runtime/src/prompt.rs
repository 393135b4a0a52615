//! Interactive credential prompts

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

/// Source of the second-factor password requested during authentication
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    async fn second_factor_password(&self) -> io::Result<String>;
}

/// Reads the password from standard input on a blocking thread
#[derive(Debug, Clone)]
pub struct ConsolePrompt {
    label: String,
}

impl ConsolePrompt {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new("Two-step verification enabled. Please enter your password: ")
    }
}

#[async_trait]
impl CredentialPrompt for ConsolePrompt {
    async fn second_factor_password(&self) -> io::Result<String> {
        let label = self.label.clone();
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            write!(stdout, "{}", label)?;
            stdout.flush()?;

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

/// Answers every prompt with a fixed password
#[derive(Debug, Clone)]
pub struct StaticPrompt {
    password: String,
}

impl StaticPrompt {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl CredentialPrompt for StaticPrompt {
    async fn second_factor_password(&self) -> io::Result<String> {
        Ok(self.password.clone())
    }
}
