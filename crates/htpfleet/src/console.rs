//! Operator prompts
//!
//! Everything interactive goes through [`Prompt`] so the workflows can be
//! driven from a script in tests. Reads are async so an interrupt is
//! noticed while a question is pending.

use async_trait::async_trait;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("standard input closed")]
    Closed,

    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[async_trait]
pub trait Prompt: Send {
    /// Print `question` and read one trimmed line
    async fn ask(&mut self, question: &str) -> Result<String>;
}

/// Prompt on the terminal
pub struct StdinPrompt {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompt for StdinPrompt {
    async fn ask(&mut self, question: &str) -> Result<String> {
        print!("{}", question);
        std::io::stdout().flush()?;

        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(ConsoleError::Closed),
        }
    }
}

/// Ask a yes/no question until the answer is `y` or `n`
pub async fn confirm(prompt: &mut dyn Prompt, question: &str) -> Result<bool> {
    let mut text = format!("{} [y/n]: ", question);
    loop {
        let answer = prompt.ask(&text).await?;
        match answer.to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => text = "# [y/n]: ".to_string(),
        }
    }
}

/// Ask for a number in `1..=max` until one is given
pub async fn choose(prompt: &mut dyn Prompt, question: &str, max: usize) -> Result<usize> {
    loop {
        let answer = prompt.ask(question).await?;
        if let Ok(n) = answer.parse::<usize>() {
            if (1..=max).contains(&n) {
                println!();
                return Ok(n);
            }
        }
    }
}

/// Print a numbered list and let the operator pick one entry
pub async fn pick<'a, T>(
    prompt: &mut dyn Prompt,
    question: &str,
    items: &'a [T],
    label: impl Fn(&T) -> &str,
) -> Result<&'a T> {
    for (index, item) in items.iter().enumerate() {
        println!("{:>2}. {}", index + 1, label(item));
    }
    let choice = choose(prompt, question, items.len()).await?;
    Ok(&items[choice - 1])
}

/// Ask how many agents to deploy, insisting on `1..=max`
pub async fn choose_amount(prompt: &mut dyn Prompt, max: usize) -> Result<usize> {
    let mut question = "# Choose an amount: ".to_string();
    loop {
        let answer = prompt.ask(&question).await?;
        match answer.parse::<usize>() {
            Ok(n) if (1..=max).contains(&n) => {
                println!();
                return Ok(n);
            }
            Ok(n) => {
                question = format!("# {}? Let me rephrase, choose a REASONABLE amount: ", n);
            }
            Err(_) => question = "# Choose an amount: ".to_string(),
        }
    }
}
