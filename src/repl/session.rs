//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::agent::ChatRole;
use crate::chat::{ChatSession, TurnOutcome, TurnStage, GREETING};
use crate::render::{fit_bounds, split_routes};
use crate::state::RouteSnapshot;

/// Interactive REPL session over a chat session
pub struct ReplSession {
    chat: Arc<ChatSession>,
}

enum SlashResult {
    Continue,
    Quit,
}

impl ReplSession {
    /// Create a new REPL session
    pub fn new(chat: Arc<ChatSession>) -> Self {
        Self { chat }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial: Option<String>) -> Result<()> {
        self.print_welcome();

        // If an initial message was provided, process it first
        if let Some(message) = initial {
            println!("{} {}", ">".bright_green(), message);
            self.process_turn(&message).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_turn(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Print welcome message
    fn print_welcome(&self) {
        println!();
        println!("{}", "RouteCause Route Planner".bright_cyan().bold());
        println!("{}", GREETING);
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Submit one turn and print the result
    async fn process_turn(&mut self, input: &str) {
        let outcome = self.chat.submit(input).await;

        // The placeholder now holds the final text for this turn
        let conversation = self.chat.conversation().await;
        if let Some(message) = conversation.last() {
            println!("{}", message.content.bright_blue());
        }

        match outcome {
            TurnOutcome::Completed { route_updated: true } => {
                self.print_map(&self.chat.snapshot());
            }
            TurnOutcome::Completed { route_updated: false } => {}
            TurnOutcome::Failed(stage) => {
                let stage = match stage {
                    TurnStage::Agent => "agent",
                    TurnStage::Geocode => "geocoding",
                    TurnStage::Route => "routing",
                };
                println!("{}", format!("({} stage failed)", stage).dimmed());
            }
            TurnOutcome::Superseded => {}
        }
    }

    /// Handle slash commands
    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/clear" | "/c" => {
                self.chat.reset().await;
                println!("{}", "Conversation cleared.".dimmed());
                SlashResult::Continue
            }
            "/history" => {
                self.print_history().await;
                SlashResult::Continue
            }
            "/map" | "/m" => {
                self.print_map(&self.chat.snapshot());
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    /// Print help message
    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the REPL", "/quit".yellow());
        println!("  {:14} Clear the conversation and the map", "/clear".yellow());
        println!("  {:14} Show conversation history", "/history".yellow());
        println!("  {:14} Show the current route", "/map".yellow());
        println!();
        println!("Anything else is sent to the route-planning agent.");
        println!();
    }

    /// Print conversation history
    async fn print_history(&self) {
        let conversation = self.chat.conversation().await;

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, msg) in conversation.iter().enumerate() {
            let role = match msg.role {
                ChatRole::User => "User".bright_green(),
                ChatRole::Assistant => "Assistant".bright_blue(),
            };
            let preview: String = msg.content.chars().take(70).collect();
            let preview = if msg.content.chars().count() > 70 {
                format!("{}...", preview)
            } else {
                preview
            };
            println!("  {}. {}: {}", i + 1, role, preview);
        }
        println!();
    }

    /// Print a text view of the current route state
    fn print_map(&self, snapshot: &RouteSnapshot) {
        if snapshot.waypoints.is_empty() {
            println!("{}", "No route yet.".dimmed());
            return;
        }

        println!();
        println!("{}", "Current Route:".bright_cyan());
        for waypoint in &snapshot.waypoints {
            let marker = match waypoint.role {
                crate::plan::WaypointRole::Start => "●".bright_green(),
                crate::plan::WaypointRole::Via => "○".yellow(),
                crate::plan::WaypointRole::End => "■".bright_red(),
            };
            println!(
                "  {} {} ({:.4}, {:.4})",
                marker, waypoint.name, waypoint.coords.lat, waypoint.coords.lon
            );
        }

        if let Some(route) = &snapshot.route {
            let (primary, alternates) = split_routes(route);
            if primary.is_some() {
                let label = if alternates.is_empty() {
                    "1 route".to_string()
                } else {
                    format!("1 route, {} alternate(s)", alternates.len())
                };
                println!("  {}", label.dimmed());
            }
        }

        if let Some(bounds) = fit_bounds(&snapshot.waypoints, snapshot.route.as_ref()) {
            let center = bounds.center();
            println!(
                "  {}",
                format!(
                    "bounds ({:.4}, {:.4}) to ({:.4}, {:.4}), center ({:.4}, {:.4})",
                    bounds.south, bounds.west, bounds.north, bounds.east, center.lat, center.lon
                )
                .dimmed()
            );
        }
        println!();
    }
}
