//! Interactive question loop.
//!
//! Reads one question per line, runs the pipeline, and prints the generated
//! query, the result table, and the answer. A fault in one turn is reported
//! and the loop moves on to the next question.

mod render;

use std::io::{BufRead, Write};

pub use render::{render_cell, render_table};

use crate::app::App;
use crate::core::ReplConfig;
use crate::pipeline::{CompletedSession, ExecutionOutcome};

/// Prompt shown before each question.
pub const PROMPT: &str = "quarry> ";

/// Run the loop until an exit keyword or end of input.
pub async fn run_repl<R: BufRead, W: Write>(
    app: &App,
    mut input: R,
    mut output: W,
) -> anyhow::Result<()> {
    let config = &app.config.repl;

    writeln!(output, "Ask a question about your data. Type '{}' to leave.", exit_hint(config))?;

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let mut buf = Vec::new();
        if input.read_until(b'\n', &mut buf)? == 0 {
            writeln!(output)?;
            break;
        }

        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                writeln!(output, "Error: input is not valid UTF-8 ({})", e.utf8_error())?;
                continue;
            }
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if config.is_exit(question) {
            break;
        }

        match app.ask(question).await {
            Ok(session) => print_session(&session, config, &mut output)?,
            Err(e) => {
                tracing::debug!(error = ?e, "turn failed");
                writeln!(output, "Error: {}", e)?;
            }
        }
        writeln!(output)?;
    }

    writeln!(output, "Goodbye.")?;
    Ok(())
}

/// Print one completed session.
pub fn print_session<W: Write>(
    session: &CompletedSession,
    config: &ReplConfig,
    output: &mut W,
) -> std::io::Result<()> {
    writeln!(output, "SQL: {}", session.query)?;
    if config.show_reasoning {
        writeln!(output, "Reasoning: {}", session.reasoning)?;
    }

    match &session.outcome {
        ExecutionOutcome::Rows { columns, rows } => {
            writeln!(output, "{}", render_table(columns, rows, config.max_display_rows))?;
        }
        ExecutionOutcome::Empty => writeln!(output, "(no rows)")?,
        ExecutionOutcome::Failed { message } => writeln!(output, "Query failed: {}", message)?,
    }

    writeln!(output, "Answer: {}", session.answer)
}

fn exit_hint(config: &ReplConfig) -> &str {
    config.exit_keywords.first().map_or("exit", String::as_str)
}
