// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use crate::mappings::Distro;
use crate::packages::Manager;
use crate::shell::ShellCommand;
use crate::util::*;

/// The parsed payload of a Dockerfile [`RUN` instruction][run] in shell form.
///
/// `distro`, `manager`, and `packages` are populated during conversion when a
/// package-manager install was detected, alongside the rewritten shell in
/// `after`.
///
/// [run]: https://docs.docker.com/engine/reference/builder/#run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDetails {
  pub distro: Option<Distro>,
  pub manager: Option<Manager>,

  /// Source package names observed in the install commands, deduplicated and
  /// sorted
  pub packages: Vec<String>,

  /// The original command sequence
  pub before: ShellCommand,

  /// The rewritten command sequence, when the RUN was converted
  pub after: Option<ShellCommand>
}

impl RunDetails {
  pub(crate) fn parse(raw: &str) -> Option<RunDetails> {
    let body = strip_keyword(raw, "RUN")?.trim_start();

    // tokenization is total in practice; an untokenizable body degrades to
    // an empty part list and the RUN passes through verbatim
    let before = ShellCommand::parse(body).unwrap_or_else(|_| ShellCommand {
      original: body.to_string(),
      parts: Vec::new()
    });

    Some(RunDetails {
      distro: None,
      manager: None,
      packages: Vec::new(),
      before,
      after: None
    })
  }
}
