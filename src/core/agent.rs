use std::path::PathBuf;

use crate::ai::{LocalAI, OpenAIClient};
use crate::config::Config;
use crate::services::{grep, KnowledgeStore};

pub const EXIT_COMMAND: &str = "adios";
pub const SEARCH_PREFIX: &str = "buscar ";
pub const REMOTE_PREFIX: &str = "openai ";

/// One line of user input, classified. Checked in this order, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Exit,
    Search(&'a str),
    Remote(&'a str),
    Ask(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(input: &'a str) -> Self {
        if input == EXIT_COMMAND {
            Command::Exit
        } else if let Some(term) = input.strip_prefix(SEARCH_PREFIX) {
            Command::Search(term)
        } else if let Some(question) = input.strip_prefix(REMOTE_PREFIX) {
            Command::Remote(question)
        } else {
            Command::Ask(input)
        }
    }
}

/// What the console should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Print these lines and read the next input.
    Continue(Vec<String>),
    /// Print the farewell and stop.
    Exit(String),
}

pub struct ChatAgent {
    local: LocalAI,
    remote: OpenAIClient,
    knowledge_file: PathBuf,
    bot_name: String,
}

impl ChatAgent {
    pub fn new(config: &Config, store: KnowledgeStore, remote: OpenAIClient) -> Self {
        Self {
            local: LocalAI::new(store),
            remote,
            knowledge_file: config.knowledge_file.clone(),
            bot_name: config.bot_name.clone(),
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn knowledge_size(&self) -> usize {
        self.local.knowledge().len()
    }

    pub async fn respond(&self, command: Command<'_>) -> Turn {
        match command {
            Command::Exit => {
                log::info!("👋 Exit requested");
                Turn::Exit(format!("{}: Goodbye!", self.bot_name))
            }
            Command::Search(term) => {
                log::debug!("🔎 Search for '{}'", term);
                Turn::Continue(self.search(term))
            }
            Command::Remote(question) => {
                log::debug!("📡 Remote question");
                let answer = self.remote.ask(question).await;
                Turn::Continue(vec![format!("{} (OpenAI): {}", self.bot_name, answer)])
            }
            Command::Ask(question) => {
                let answer = self.local.get_response(question);
                Turn::Continue(vec![format!("{}: {}", self.bot_name, answer)])
            }
        }
    }

    fn search(&self, term: &str) -> Vec<String> {
        let mut lines = vec!["=== Search results ===".to_string()];
        match grep(&self.knowledge_file, term) {
            Ok(hits) if hits.is_empty() => lines.push("No matches.".to_string()),
            Ok(hits) => lines.extend(
                hits.into_iter()
                    .map(|hit| format!("Match at line {}: {}", hit.line_number, hit.line)),
            ),
            Err(e) => {
                log::error!("Search failed: {:#}", e);
                lines.push(format!("Error opening the file: {:#}", e));
            }
        }
        lines
    }
}
