// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::collections::HashMap;

use crate::image::ImageRef;
use crate::util::*;

/// The parsed payload of a Dockerfile [`FROM` instruction][from].
///
/// [from]: https://docs.docker.com/engine/reference/builder/#from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromDetails {
  /// The original image reference as written, before any parsing
  pub orig: String,

  /// The parsed reference (base, tag, digest)
  pub image: ImageRef,

  /// Flags between the keyword and the image, e.g. `--platform=linux/amd64`,
  /// preserved verbatim
  pub flags: Vec<String>,

  /// The name after `AS`, original case preserved
  pub alias: Option<String>,

  /// The stage this FROM references when its base names an earlier stage
  /// alias (matched case-insensitively)
  pub parent: Option<usize>,

  /// True when the base contains a `$` build-arg reference
  pub base_dynamic: bool,

  /// True when the tag contains a `$` build-arg reference
  pub tag_dynamic: bool
}

impl FromDetails {
  /// Parses a raw FROM instruction. `aliases` maps case-folded aliases of
  /// earlier stages to their 1-based stage numbers.
  ///
  /// Returns None when no image reference is present at all.
  pub(crate) fn parse(raw: &str, aliases: &HashMap<String, usize>) -> Option<FromDetails> {
    let text = clean_escaped_breaks(raw);
    let mut tokens = text.split_whitespace();

    // the FROM keyword itself
    tokens.next()?;

    let mut flags = Vec::new();
    let mut orig = None;

    for token in &mut tokens {
      if token.starts_with("--") {
        flags.push(token.to_string());
      } else {
        orig = Some(token.to_string());
        break;
      }
    }

    let orig = orig?;

    let alias = match tokens.next() {
      Some(token) if token.eq_ignore_ascii_case("as") => {
        tokens.next().map(String::from)
      },
      _ => None
    };

    let image = ImageRef::parse(&orig);
    let base_dynamic = image.base.contains('$');
    let tag_dynamic = image.tag
      .as_ref()
      .map(|t| t.contains('$'))
      .unwrap_or(false);

    let parent = aliases.get(&image.base.to_ascii_lowercase()).copied();

    Some(FromDetails {
      orig, image, flags, alias, parent,
      base_dynamic, tag_dynamic
    })
  }
}
