//! Line-oriented question loop.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tracing::info;

pub const PROMPT: &str = "Your question: ";
pub const EXIT_WORD: &str = "quit";
pub const FAREWELL: &str = "Shutting down the assistant. Goodbye!";
pub const EMPTY_INPUT_HINT: &str = "Please type a question.";

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn answer(&self, question: &str) -> String;
}

/// Prompt, read a line, answer, repeat until `quit` or end of input.
pub async fn run_shell<A, I, O>(assistant: &A, mut input: I, output: &mut O) -> io::Result<()>
where
    A: Assistant + ?Sized,
    I: BufRead,
    O: Write,
{
    writeln!(output, "\n--- Technical Standards Assistant ---")?;
    writeln!(output, "Ask a question about the loaded standards. Type '{}' to exit.", EXIT_WORD)?;

    let mut line = String::new();
    loop {
        write!(output, "\n{}", PROMPT)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        let question = line.trim();
        if question.eq_ignore_ascii_case(EXIT_WORD) {
            break;
        }
        if question.is_empty() {
            writeln!(output, "{}", EMPTY_INPUT_HINT)?;
            continue;
        }

        let answer = assistant.answer(question).await;
        writeln!(output, "\nAssistant: {}", answer)?;
    }
    info!("Interactive session finished");
    writeln!(output, "{}", FAREWELL)?;
    output.flush()
}
