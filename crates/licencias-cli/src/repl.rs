//! Interactive question loop.
//!
//! By default we use `rustyline` for line editing and history.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

use crate::{answer_blocking, print_answer};
use anyhow::Result;
#[cfg(feature = "repl-rustyline")]
use anyhow::anyhow;
use colored::Colorize;
use licencias_agent::Agent;
#[cfg(not(feature = "repl-rustyline"))]
use std::io::{self, Write};
use tokio::runtime::Runtime;

const EXIT_WORDS: [&str; 3] = ["salir", "exit", "quit"];
const PROMPT: &str = "> ";

pub fn cmd_chat(runtime: &Runtime, agent: &Agent) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        cmd_chat_rustyline(runtime, agent)
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        cmd_chat_simple(runtime, agent)
    }
}

fn print_banner(agent: &Agent) {
    println!("{}", "¡Agente listo!".green().bold());
    println!(
        "Modelo: {}. Escribe 'salir' para terminar.",
        agent.model_name()
    );
}

#[cfg(not(feature = "repl-rustyline"))]
fn cmd_chat_simple(runtime: &Runtime, agent: &Agent) -> Result<()> {
    print_banner(agent);

    let stdin = io::stdin();
    loop {
        print!("\n{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        match dispatch_line(runtime, agent, &line) {
            ReplControl::Continue => {}
            ReplControl::Exit => break,
        }
    }

    println!("¡Hasta luego!");
    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn cmd_chat_rustyline(runtime: &Runtime, agent: &Agent) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    print_banner(agent);

    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        if !line.trim().is_empty() {
            if let Err(e) = rl.add_history_entry(line.trim()) {
                tracing::debug!(error = %e, "history entry not recorded");
            }
        }

        match dispatch_line(runtime, agent, &line) {
            ReplControl::Continue => {}
            ReplControl::Exit => break,
        }
    }

    println!("¡Hasta luego!");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReplControl {
    Continue,
    Exit,
}

fn classify(line: &str) -> Option<ReplControl> {
    let line = line.trim();
    if line.is_empty() {
        return Some(ReplControl::Continue);
    }
    if is_exit_word(line) {
        return Some(ReplControl::Exit);
    }
    None
}

fn is_exit_word(line: &str) -> bool {
    let lowered = line.to_lowercase();
    EXIT_WORDS.contains(&lowered.as_str())
}

/// Turn failures are already folded into the answer, so the loop never ends
/// on an error.
fn dispatch_line(runtime: &Runtime, agent: &Agent, line: &str) -> ReplControl {
    if let Some(control) = classify(line) {
        return control;
    }
    let answer = answer_blocking(runtime, agent, line.trim());
    print_answer(&answer);
    ReplControl::Continue
}
