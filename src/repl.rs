//! Interactive REPL - the in-repo chat caller
//!
//! A readline loop standing in for a chat transport: it delivers utterances
//! to the orchestrator for one local session and prints the replies. Slash
//! commands cover the caller-boundary actions (profile linking, reset).

use anyhow::Result;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;

use crate::agent::Orchestrator;

/// Session id used for the local console user.
const LOCAL_SESSION: &str = "local";

const HELP: &str = "Commands:
  /link <email-or-id>  link this chat to your employee profile
  /reset               forget the conversation (keeps the link)
  /help                show this help
  /quit                exit

Anything else is sent to the assistant, e.g.:
  show me jane.doe@corp.test
  attendance for 507f1f77bcf86cd799439011 over the last 60 days
  Show Engineering department attendance
  who was late this week
  mark my attendance at 08:45";

/// REPL state
pub struct Repl {
    editor: Editor<(), DefaultHistory>,
    orchestrator: Orchestrator,
    history_path: std::path::PathBuf,
}

impl Repl {
    pub fn new(orchestrator: Orchestrator) -> Result<Self> {
        let editor = Editor::new()?;

        // History file in ~/.punchcard/history
        let history_path = dirs::home_dir()
            .unwrap_or_default()
            .join(".punchcard")
            .join("history");

        Ok(Self {
            editor,
            orchestrator,
            history_path,
        })
    }

    fn load_history(&mut self) {
        if self.history_path.exists() {
            let _ = self.editor.load_history(&self.history_path);
        }
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&self.history_path);
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.load_history();
        println!("{HELP}\n");

        loop {
            match self.editor.readline("you> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if let Some(command) = line.strip_prefix('/') {
                        if !self.handle_command(command).await {
                            break;
                        }
                        continue;
                    }

                    let reply = self.orchestrator.handle_turn(LOCAL_SESSION, line).await;
                    println!("\n{}\n", reply.text);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("readline error: {e}");
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    /// Returns false when the REPL should exit.
    async fn handle_command(&self, command: &str) -> bool {
        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name {
            "quit" | "exit" | "q" => return false,
            "help" => println!("\n{HELP}\n"),
            "reset" => {
                self.orchestrator.reset(LOCAL_SESSION).await;
                println!("\n🔄 Conversation reset. Starting fresh!\n");
            }
            "link" => {
                if rest.is_empty() {
                    println!("\nUsage: /link <email-or-id>\n");
                } else {
                    let reply = self.orchestrator.link_profile(LOCAL_SESSION, rest).await;
                    println!("\n{}\n", reply.text);
                }
            }
            other => println!("\nUnknown command: /{other} (try /help)\n"),
        }
        true
    }
}
