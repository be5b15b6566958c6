// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use crate::util::*;

/// The parsed payload of a Dockerfile [`ARG` instruction][arg].
///
/// [arg]: https://docs.docker.com/engine/reference/builder/#arg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDetails {
  pub name: String,

  pub default_value: Option<String>,

  /// True when a later FROM's base references `$name` or `${name}`
  pub used_as_base: bool
}

impl ArgDetails {
  pub(crate) fn parse(raw: &str) -> Option<ArgDetails> {
    let text = clean_escaped_breaks(raw);
    let rest = strip_keyword(&text, "ARG")?;

    let (name, default_value) = match rest.find('=') {
      Some(eq) => (
        rest[..eq].trim().to_string(),
        Some(rest[eq + 1..].trim().to_string())
      ),
      None => (rest.trim().to_string(), None)
    };

    if name.is_empty() {
      return None;
    }

    Some(ArgDetails {
      name, default_value,
      used_as_base: false
    })
  }
}

/// Whether an image base references the named build arg as `$name` or
/// `${name}`. A bare `$name` only counts when not followed by another
/// identifier character, so `$BASE` does not claim `$BASEIMAGE`.
pub(crate) fn references_arg(base: &str, name: &str) -> bool {
  if base.contains(&format!("${{{}}}", name)) {
    return true;
  }

  let pattern = format!("${}", name);
  let mut start = 0;

  while let Some(pos) = base[start..].find(&pattern) {
    let end = start + pos + pattern.len();

    match base[end..].chars().next() {
      Some(c) if c.is_ascii_alphanumeric() || c == '_' => start = end,
      _ => return true
    }
  }

  false
}
