/// Parser for the line-based command scripts replayed by the CLI.
use anyhow::{bail, Context, Result};
use rewind_history::Significance;

/// One script command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `add <significance> <delta>`
    Add {
        significance: Significance,
        delta: i64,
    },
    /// `set <significance> <value>`
    Set {
        significance: Significance,
        value: i64,
    },
    NewOperation,
    BeginOperation,
    EndOperation,
    Extend,
    Track(bool),
    Undo,
    Redo,
    BeginUndo,
    EndUndo,
    BeginRedo,
    EndRedo,
    Clear,
    Print,
}

/// A command together with its 1-based source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub command: Command,
}

/// Parses a whole script. Blank lines and `#` comments are skipped.
pub fn parse_script(source: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let command = parse_line(raw).with_context(|| format!("line {number}: {}", raw.trim()))?;
        if let Some(command) = command {
            lines.push(Line { number, command });
        }
    }
    Ok(lines)
}

fn parse_line(raw: &str) -> Result<Option<Command>> {
    let text = raw.split('#').next().unwrap_or_default().trim();
    let mut words = text.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (keyword, args.as_slice()) {
        ("add", [significance, delta]) => Command::Add {
            significance: parse_significance(significance)?,
            delta: delta
                .parse()
                .with_context(|| format!("invalid delta '{delta}'"))?,
        },
        ("set", [significance, value]) => Command::Set {
            significance: parse_significance(significance)?,
            value: value
                .parse()
                .with_context(|| format!("invalid value '{value}'"))?,
        },
        ("track", ["on"]) => Command::Track(true),
        ("track", ["off"]) => Command::Track(false),
        ("new-op", []) => Command::NewOperation,
        ("begin-op", []) => Command::BeginOperation,
        ("end-op", []) => Command::EndOperation,
        ("extend", []) => Command::Extend,
        ("undo", []) => Command::Undo,
        ("redo", []) => Command::Redo,
        ("begin-undo", []) => Command::BeginUndo,
        ("end-undo", []) => Command::EndUndo,
        ("begin-redo", []) => Command::BeginRedo,
        ("end-redo", []) => Command::EndRedo,
        ("clear", []) => Command::Clear,
        ("print", []) => Command::Print,
        ("add" | "set", _) => bail!("expected '{keyword} <significance> <number>'"),
        ("track", _) => bail!("expected 'track on' or 'track off'"),
        _ => bail!("unknown command '{text}'"),
    };
    Ok(Some(command))
}

fn parse_significance(word: &str) -> Result<Significance> {
    match word {
        "supporting" => Ok(Significance::Supporting),
        "minor" => Ok(Significance::Minor),
        "substantial" => Ok(Significance::Substantial),
        other => bail!("unknown significance '{other}'"),
    }
}
