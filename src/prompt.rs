use std::io::{self, BufRead, Write};
use std::ops::RangeInclusive;

use crate::errors::{AppError, Result};

/// Prints `prompt` and reads one line from stdin.
///
/// Ctrl+C while waiting returns `AppError::Interrupted`, as does end of input.
/// The blocking read keeps its thread until a line arrives, so callers exit
/// the process after an interrupt instead of unwinding back to the runtime.
pub async fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let read = tokio::task::spawn_blocking(|| -> io::Result<Option<String>> {
        let mut input = String::new();
        let bytes = io::stdin().lock().read_line(&mut input)?;
        Ok((bytes > 0).then_some(input))
    });

    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => Err(AppError::Interrupted),
        joined = read => {
            let line = joined.map_err(|e| AppError::Io(io::Error::other(e)))??;
            line.map(|l| l.trim().to_string()).ok_or(AppError::Interrupted)
        }
    }
}

pub async fn ask_text(prompt: &str, default: Option<&str>) -> Result<String> {
    let shown = match default {
        Some(d) => format!("{} [{}]: ", prompt, d),
        None => format!("{}: ", prompt),
    };
    let input = read_line(&shown).await?;
    Ok(match (input.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => input,
    })
}

/// Asks until the answer is a number in `choices`; empty input takes `default`.
pub async fn ask_choice(prompt: &str, choices: RangeInclusive<u8>, default: u8) -> Result<u8> {
    let shown = format!("{} [{}-{}] ({}): ", prompt, choices.start(), choices.end(), default);
    loop {
        let input = read_line(&shown).await?;
        match parse_choice(&input, &choices, default) {
            Some(choice) => return Ok(choice),
            None => println!("Please select one of {}-{}", choices.start(), choices.end()),
        }
    }
}

pub async fn confirm(prompt: &str, default: bool) -> Result<bool> {
    let shown = format!("{} [{}]: ", prompt, if default { "Y/n" } else { "y/N" });
    loop {
        let input = read_line(&shown).await?;
        match parse_confirm(&input, default) {
            Some(answer) => return Ok(answer),
            None => println!("Please enter y or n"),
        }
    }
}

/// Waits for Enter.
pub async fn pause(prompt: &str) -> Result<()> {
    read_line(prompt).await.map(|_| ())
}

fn parse_choice(input: &str, choices: &RangeInclusive<u8>, default: u8) -> Option<u8> {
    let input = input.trim();
    if input.is_empty() {
        return Some(default);
    }
    input.parse::<u8>().ok().filter(|c| choices.contains(c))
}

fn parse_confirm(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
