// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::fmt;

use pest::Parser;
use snafu::ResultExt;

use crate::error::*;
use crate::parser::{Rule, ShellTokenizer};

/// The shell operator joining a part to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
  /// The last part of a command has no delimiter.
  None,
  And,
  Or,
  Semicolon,
  Pipe,
  Background
}

impl Delimiter {
  fn from_token(token: &str) -> Delimiter {
    match token {
      "&&" => Delimiter::And,
      "||" => Delimiter::Or,
      ";" => Delimiter::Semicolon,
      "|" => Delimiter::Pipe,
      "&" => Delimiter::Background,
      _ => Delimiter::None
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Delimiter::None => "",
      Delimiter::And => "&&",
      Delimiter::Or => "||",
      Delimiter::Semicolon => ";",
      Delimiter::Pipe => "|",
      Delimiter::Background => "&"
    }
  }
}

impl fmt::Display for Delimiter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A single simple command within a shell pipeline.
///
/// `extra_pre` holds the whitespace, line continuations, and comments that
/// preceded the command token, so unconverted commands can be accounted for
/// byte-by-byte against their source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellPart {
  pub extra_pre: String,
  pub command: String,
  pub args: Vec<String>,
  pub delimiter: Delimiter
}

impl ShellPart {
  pub fn new<S: Into<String>>(command: S, args: Vec<S>) -> ShellPart {
    ShellPart {
      extra_pre: String::new(),
      command: command.into(),
      args: args.into_iter().map(|a| a.into()).collect(),
      delimiter: Delimiter::None
    }
  }
}

/// An ordered sequence of simple commands as found after a `RUN` keyword.
///
/// The unmodified source text is retained in `original`, mirroring how the
/// parsed `Dockerfile` retains its `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
  pub original: String,
  pub parts: Vec<ShellPart>
}

impl ShellCommand {
  /// Tokenizes the shell form of a RUN instruction.
  ///
  /// Delimiters (`&&`, `||`, `;`, `|`, `&`) are recognized at the top level
  /// only; quoted tokens keep their quotes. Line continuations and comments
  /// are insignificant except that they accumulate into the following part's
  /// `extra_pre`.
  pub fn parse(input: &str) -> Result<ShellCommand> {
    let shell = ShellTokenizer::parse(Rule::shell, input)
      .context(ShellParseError)?
      .next();

    let mut parts = Vec::new();
    let mut current: Option<ShellPart> = None;
    let mut pending = String::new();

    let tokens = match shell {
      Some(pair) => pair.into_inner(),
      None => return Ok(ShellCommand {
        original: input.to_string(),
        parts
      })
    };

    for token in tokens {
      match token.as_rule() {
        Rule::space | Rule::line_continuation | Rule::comment => {
          pending.push_str(token.as_str());
        },
        Rule::operator => {
          let delimiter = Delimiter::from_token(token.as_str());
          let mut part = current.take().unwrap_or_else(
            || ShellPart::new::<String>(String::new(), vec![])
          );
          part.delimiter = delimiter;
          parts.push(part);

          // whitespace before an operator belongs to nobody
          pending.clear();
        },
        Rule::word | Rule::stray => {
          match current.as_mut() {
            Some(part) => {
              part.args.push(token.as_str().to_string());
              pending.clear();
            },
            None => {
              let mut part = ShellPart::new(token.as_str(), vec![]);
              part.extra_pre = std::mem::replace(&mut pending, String::new());
              current = Some(part);
            }
          }
        },
        Rule::EOI => break,
        _ => ()
      }
    }

    if let Some(part) = current.take() {
      parts.push(part);
    }

    Ok(ShellCommand {
      original: input.to_string(),
      parts
    })
  }

  pub fn is_empty(&self) -> bool {
    self.parts.is_empty()
  }
}

/// Serializes to the canonical multi-line form: one simple command per
/// physical line, continuation-joined with a four space indent.
impl fmt::Display for ShellCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, part) in self.parts.iter().enumerate() {
      write!(f, "{}", part.command)?;

      for arg in &part.args {
        write!(f, " {}", arg)?;
      }

      if part.delimiter != Delimiter::None {
        write!(f, " {}", part.delimiter)?;
      }

      if i + 1 < self.parts.len() {
        write!(f, " \\\n    ")?;
      }
    }

    Ok(())
  }
}
