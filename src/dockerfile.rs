// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, BufReader};
use std::str::FromStr;

use snafu::ResultExt;

use crate::error::*;
use crate::instructions::*;

/// A single logical Dockerfile line.
///
/// `raw` is the instruction text as written, spanning physical lines when
/// backslash continuations are present. `extra` holds the blank and comment
/// lines that preceded the instruction, verbatim. `converted` replaces `raw`
/// in serialized output when set.
///
/// At most one of `from`, `arg`, `run` is set; all are None for other
/// directives.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
  pub raw: String,
  pub converted: Option<String>,
  pub extra: String,

  /// 1-based build stage, or 0 before the first FROM
  pub stage: usize,

  pub from: Option<FromDetails>,
  pub arg: Option<ArgDetails>,
  pub run: Option<RunDetails>
}

impl Line {
  fn opaque(raw: String, extra: String, stage: usize) -> Line {
    Line {
      raw, extra, stage,
      converted: None,
      from: None,
      arg: None,
      run: None
    }
  }

  /// The text this line contributes to serialized output.
  pub fn content(&self) -> &str {
    self.converted.as_ref().unwrap_or(&self.raw)
  }
}

/// A parsed Dockerfile.
///
/// Parsing is total: unrecognized directives become opaque lines carrying
/// only `raw`, `extra`, and `stage`. Serializing an unconverted Dockerfile
/// reproduces its source byte-for-byte, modulo one suppressed trailing
/// newline at EOF.
///
/// # Example
/// ```
/// use dockerfile_converter::Dockerfile;
///
/// let source = "FROM alpine:3.11\nRUN echo \"hello world\"";
/// let dockerfile = Dockerfile::parse(source);
///
/// assert_eq!(dockerfile.lines.len(), 2);
/// assert_eq!(dockerfile.to_string(), source);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Dockerfile {
  /// The raw content of the Dockerfile
  pub content: String,

  /// An ordered list of all logical lines
  pub lines: Vec<Line>
}

fn emit(
  lines: &mut Vec<Line>,
  current: &mut String,
  extra: &mut String,
  stage: &mut usize,
  aliases: &mut HashMap<String, usize>
) {
  let raw = std::mem::replace(current, String::new());
  let extra = std::mem::replace(extra, String::new());

  let keyword = raw
    .trim_start()
    .split_whitespace()
    .next()
    .unwrap_or("")
    .to_string();

  let mut line = Line::opaque(raw, extra, *stage);

  if keyword.eq_ignore_ascii_case("FROM") {
    *stage += 1;
    line.stage = *stage;
    line.from = FromDetails::parse(&line.raw, aliases);

    if let Some(from) = &line.from {
      if let Some(alias) = &from.alias {
        aliases.insert(alias.to_ascii_lowercase(), *stage);
      }
    }
  } else if keyword.eq_ignore_ascii_case("ARG") {
    line.arg = ArgDetails::parse(&line.raw);
  } else if keyword.eq_ignore_ascii_case("RUN") {
    line.run = RunDetails::parse(&line.raw);
  }

  lines.push(line);
}

fn parse_dockerfile(input: &str) -> Dockerfile {
  let mut lines = Vec::new();
  let mut extra = String::new();
  let mut current = String::new();
  let mut in_multi = false;
  let mut stage = 0;
  let mut aliases = HashMap::new();

  let source: Vec<&str> = input.split('\n').collect();
  let last = source.len() - 1;

  for (i, physical) in source.iter().enumerate() {
    let has_newline = i < last;
    let trimmed = physical.trim();

    if in_multi {
      current.push('\n');
      current.push_str(physical);

      // a comment cannot terminate a continued instruction
      if trimmed.starts_with('#') {
        continue;
      }

      if !trimmed.ends_with('\\') {
        in_multi = false;
        emit(&mut lines, &mut current, &mut extra, &mut stage, &mut aliases);
      }

      continue;
    }

    if trimmed.is_empty() || trimmed.starts_with('#') {
      extra.push_str(physical);
      if has_newline {
        extra.push('\n');
      }
      continue;
    }

    current.push_str(physical);

    if trimmed.ends_with('\\') {
      in_multi = true;
    } else {
      emit(&mut lines, &mut current, &mut extra, &mut stage, &mut aliases);
    }
  }

  // a continuation left open at EOF is still one instruction
  if in_multi {
    emit(&mut lines, &mut current, &mut extra, &mut stage, &mut aliases);
  }

  if !extra.is_empty() {
    if extra.ends_with('\n') {
      extra.pop();
    }

    lines.push(Line::opaque(extra, String::new(), stage));
  }

  // mark ARGs whose name a later FROM base references
  for i in 0..lines.len() {
    let name = match &lines[i].arg {
      Some(arg) => arg.name.clone(),
      None => continue
    };

    let used = lines[i + 1..].iter().any(|line| {
      line.from
        .as_ref()
        .map(|from| references_arg(&from.image.base, &name))
        .unwrap_or(false)
    });

    if used {
      if let Some(arg) = lines[i].arg.as_mut() {
        arg.used_as_base = true;
      }
    }
  }

  Dockerfile {
    content: input.to_string(),
    lines
  }
}

impl Dockerfile {
  /// Parses a Dockerfile from a string. Never fails: arbitrary text parses
  /// into opaque lines.
  pub fn parse(input: &str) -> Dockerfile {
    parse_dockerfile(input)
  }

  /// Parses a Dockerfile from a reader.
  pub fn from_reader<R>(reader: R) -> Result<Dockerfile>
  where
    R: Read
  {
    let mut buf = String::new();
    let mut buf_reader = BufReader::new(reader);
    buf_reader.read_to_string(&mut buf).context(ReadError)?;

    Ok(Dockerfile::parse(&buf))
  }
}

impl fmt::Display for Dockerfile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, line) in self.lines.iter().enumerate() {
      f.write_str(&line.extra)?;
      f.write_str(line.content())?;

      if i + 1 < self.lines.len() {
        f.write_str("\n")?;
      }
    }

    Ok(())
  }
}

impl FromStr for Dockerfile {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Dockerfile::parse(s))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  #[test]
  fn parse_basic() {
    let dockerfile = Dockerfile::parse(indoc!(r#"
      FROM alpine:3.10

      RUN apk add --no-cache curl
    "#));

    assert_eq!(dockerfile.lines.len(), 2);

    let from = dockerfile.lines[0].from.as_ref().unwrap();
    assert_eq!(from.image.base, "alpine");
    assert_eq!(from.image.tag, Some("3.10".to_string()));
    assert_eq!(dockerfile.lines[0].stage, 1);

    let run = dockerfile.lines[1].run.as_ref().unwrap();
    assert_eq!(run.before.parts[0].command, "apk");
    assert_eq!(dockerfile.lines[1].extra, "\n");
    assert_eq!(dockerfile.lines[1].stage, 1);
  }

  #[test]
  fn parse_round_trip() {
    let sources = [
      "",
      "FROM alpine",
      "FROM alpine\n",
      "# only a comment\n",
      indoc!(r#"
        # syntax=docker/dockerfile:1

        ARG VERSION=3.18
        FROM alpine:$VERSION AS base

        # install things
        RUN apk add --no-cache \
            curl \
            jq

        COPY . /app
        WORKDIR /app

        CMD ["/app/run"]
      "#),
      "RUN echo hi \\\n",
      "FROM a\r\nRUN b\r\n"
    ];

    for source in &sources {
      let out = Dockerfile::parse(source).to_string();

      // byte-identical modulo at most one suppressed trailing newline
      assert!(
        out == *source || format!("{}\n", out) == *source,
        "round trip failed for {:?}: got {:?}", source, out
      );
    }
  }

  #[test]
  fn parse_multiline_raw() {
    let dockerfile = Dockerfile::parse("RUN apk add \\\n    curl\nFROM x");

    assert_eq!(dockerfile.lines.len(), 2);
    assert_eq!(dockerfile.lines[0].raw, "RUN apk add \\\n    curl");
    assert_eq!(dockerfile.lines[1].raw, "FROM x");
  }

  #[test]
  fn parse_comment_inside_continuation() {
    let dockerfile = Dockerfile::parse(indoc!(r#"
      RUN apt-get update && \
          # deps
          apt-get install -y curl
    "#));

    assert_eq!(dockerfile.lines.len(), 1);
    let run = dockerfile.lines[0].run.as_ref().unwrap();
    assert_eq!(run.before.parts.len(), 2);
    assert_eq!(run.before.parts[1].args, vec!["install", "-y", "curl"]);
  }

  #[test]
  fn parse_trailing_continuation() {
    let dockerfile = Dockerfile::parse("RUN echo hi \\\n");

    assert_eq!(dockerfile.lines.len(), 1);
    assert!(dockerfile.lines[0].raw.ends_with("\\\n"));
  }

  #[test]
  fn parse_trailing_extra() {
    let dockerfile = Dockerfile::parse("FROM alpine\n\n# the end\n");

    assert_eq!(dockerfile.lines.len(), 2);
    assert_eq!(dockerfile.lines[1].raw, "\n# the end");
    assert_eq!(dockerfile.lines[1].stage, 1);
  }

  #[test]
  fn parse_stages_and_aliases() {
    let dockerfile = Dockerfile::parse(indoc!(r#"
      ARG REV=1
      FROM golang:1.23 AS Build
      RUN go build ./...

      FROM build
      COPY --from=build /out /out

      FROM scratch
    "#));

    assert_eq!(dockerfile.lines[0].stage, 0);
    assert_eq!(dockerfile.lines[1].stage, 1);
    assert_eq!(dockerfile.lines[2].stage, 1);

    let second = dockerfile.lines[3].from.as_ref().unwrap();
    assert_eq!(dockerfile.lines[3].stage, 2);
    assert_eq!(second.parent, Some(1));

    let third = dockerfile.lines[5].from.as_ref().unwrap();
    assert_eq!(dockerfile.lines[5].stage, 3);
    assert_eq!(third.parent, None);
    assert_eq!(third.image.base, "scratch");
  }

  #[test]
  fn parse_arg_used_as_base() {
    let dockerfile = Dockerfile::parse(indoc!(r#"
      ARG BASE=python:3.9
      ARG OTHER=unused
      FROM ${BASE}
      RUN pip install requests
    "#));

    assert!(dockerfile.lines[0].arg.as_ref().unwrap().used_as_base);
    assert!(!dockerfile.lines[1].arg.as_ref().unwrap().used_as_base);

    let from = dockerfile.lines[2].from.as_ref().unwrap();
    assert!(from.base_dynamic);
    assert_eq!(from.parent, None);
  }

  #[test]
  fn parse_unknown_alias() {
    let dockerfile = Dockerfile::parse("FROM missing-alias");
    let from = dockerfile.lines[0].from.as_ref().unwrap();

    assert_eq!(from.parent, None);
    assert!(!from.base_dynamic);
  }

  #[test]
  fn from_reader_matches_parse() {
    let source = "FROM alpine:3.11\nRUN echo ok";

    assert_eq!(
      Dockerfile::from_reader(source.as_bytes()).unwrap(),
      Dockerfile::parse(source)
    );
    assert_eq!(
      source.parse::<Dockerfile>().unwrap(),
      Dockerfile::parse(source)
    );
  }
}
