// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::collections::BTreeSet;
use std::fmt;

use crate::error::*;
use crate::mappings::{Distro, MappingProvider};
use crate::shell::{ShellCommand, ShellPart};

/// A package-manager command recognized inside RUN instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manager {
  AptGet,
  Apt,
  Yum,
  Dnf,
  Microdnf,
  Apk
}

impl Manager {
  pub fn from_command(command: &str) -> Option<Manager> {
    match command {
      "apt-get" => Some(Manager::AptGet),
      "apt" => Some(Manager::Apt),
      "yum" => Some(Manager::Yum),
      "dnf" => Some(Manager::Dnf),
      "microdnf" => Some(Manager::Microdnf),
      "apk" => Some(Manager::Apk),
      _ => None
    }
  }

  pub fn distro(&self) -> Distro {
    match self {
      Manager::AptGet | Manager::Apt => Distro::Debian,
      Manager::Yum | Manager::Dnf | Manager::Microdnf => Distro::Fedora,
      Manager::Apk => Distro::Alpine
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Manager::AptGet => "apt-get",
      Manager::Apt => "apt",
      Manager::Yum => "yum",
      Manager::Dnf => "dnf",
      Manager::Microdnf => "microdnf",
      Manager::Apk => "apk"
    }
  }
}

impl fmt::Display for Manager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// What a scan of a RUN's parts found about package-manager usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstallScan {
  pub manager: Manager,
  pub distro: Distro,

  /// Source package names from install parts, deduplicated and sorted
  pub packages: Vec<String>,

  /// True when managers of more than one distro family appear
  pub mixed: bool,

  pub has_install: bool,
  pub has_upgrade: bool
}

/// The contiguous run of `distro`-family PM parts beginning at the first PM
/// part. Parts past the run are never consumed.
fn pm_run_bounds(cmd: &ShellCommand, distro: Distro) -> Option<(usize, usize)> {
  let start = cmd.parts
    .iter()
    .position(|part| Manager::from_command(&part.command).is_some())?;

  let end = cmd.parts[start..]
    .iter()
    .position(|part| {
      Manager::from_command(&part.command)
        .map(|manager| manager.distro() != distro)
        .unwrap_or(true)
    })
    .map(|offset| start + offset)
    .unwrap_or(cmd.parts.len());

  Some((start, end))
}

/// Scans a parsed command for a package-manager run. The first PM part
/// determines the manager and distro; collection walks the contiguous run of
/// same-family PM parts starting there and stops at the first part that is
/// anything else. Package names are the install-part tokens that are neither
/// flags nor install/add/upgrade keywords.
pub(crate) fn scan_install(cmd: &ShellCommand) -> Option<InstallScan> {
  let mut first = None;
  let mut mixed = false;

  for part in &cmd.parts {
    if let Some(manager) = Manager::from_command(&part.command) {
      let head = *first.get_or_insert(manager);

      if manager.distro() != head.distro() {
        mixed = true;
      }
    }
  }

  let manager = first?;
  let distro = manager.distro();
  let keyword = distro.install_keyword();
  let (start, end) = pm_run_bounds(cmd, distro)?;

  let mut packages = BTreeSet::new();
  let mut has_install = false;
  let mut has_upgrade = false;

  for part in &cmd.parts[start..end] {
    if part.args.iter().any(|a| a == "upgrade") {
      has_upgrade = true;
    }

    if !part.args.iter().any(|a| a == keyword) {
      continue;
    }

    has_install = true;

    for arg in &part.args {
      if arg.starts_with('-') {
        continue;
      }

      if arg == "install" || arg == "add" || arg == "upgrade" || arg == keyword {
        continue;
      }

      packages.insert(arg.clone());
    }
  }

  Some(InstallScan {
    manager, distro, mixed,
    packages: packages.into_iter().collect(),
    has_install, has_upgrade
  })
}

/// Rewrites the contiguous package-manager run of `cmd` into a single `apk`
/// part, substituting source packages through the provider. Parts before and
/// after the run keep their delimiters, including any later PM parts past
/// the first gap, which stay untouched; the `apk` part takes the delimiter
/// of the run's last part so following commands stay linked.
///
/// Returns None when no PM part is present, or when manager families are
/// mixed (such RUNs pass through untouched).
pub(crate) fn convert_packages(
  cmd: &ShellCommand,
  provider: &dyn MappingProvider
) -> Result<Option<(InstallScan, ShellCommand)>> {
  let scan = match scan_install(cmd) {
    Some(scan) => scan,
    None => return Ok(None)
  };

  if scan.mixed {
    return Ok(None);
  }

  let mut targets = BTreeSet::new();

  for package in &scan.packages {
    match provider.package_mappings(scan.distro, package)? {
      Some(mapped) => targets.extend(mapped),
      None => {
        targets.insert(package.clone());
      }
    }
  }

  let args = if scan.has_install {
    let mut args = vec!["add".to_string(), "-U".to_string()];
    args.extend(targets);
    args
  } else if scan.has_upgrade {
    vec!["upgrade".to_string()]
  } else {
    vec!["update".to_string()]
  };

  let (start, end) = match pm_run_bounds(cmd, scan.distro) {
    Some(bounds) => bounds,
    None => return Ok(None)
  };

  let mut unified = ShellPart::new("apk".to_string(), args);
  unified.delimiter = cmd.parts[end - 1].delimiter;

  let mut parts: Vec<ShellPart> = Vec::with_capacity(cmd.parts.len() - (end - start) + 1);
  parts.extend(cmd.parts[..start].iter().cloned());
  parts.push(unified);
  parts.extend(cmd.parts[end..].iter().cloned());

  let mut after = ShellCommand {
    original: String::new(),
    parts
  };
  let rendered = after.to_string();
  after.original = rendered;

  Ok(Some((scan, after)))
}

/// Rewrites shadow-utils and GNU tar invocations to their busybox
/// equivalents. `useradd`/`groupadd` are left alone when the stage installs
/// the `shadow` package. Returns a rewritten command only when something
/// changed.
pub(crate) fn busybox_rewrite(
  cmd: &ShellCommand,
  shadow_installed: bool
) -> Option<ShellCommand> {
  let mut changed = false;
  let mut parts = Vec::with_capacity(cmd.parts.len());

  for part in &cmd.parts {
    let mut part = part.clone();

    match part.command.as_str() {
      "useradd" if !shadow_installed => {
        part.command = "adduser".to_string();

        let named = part.args
          .last()
          .map(|last| !last.starts_with('-'))
          .unwrap_or(false);

        if named && !part.args.iter().any(|a| a == "-D") {
          part.args.insert(part.args.len() - 1, "-D".to_string());
        }

        changed = true;
      },
      "groupadd" if !shadow_installed => {
        part.command = "addgroup".to_string();
        changed = true;
      },
      "tar" => {
        let len = part.args.len();
        part.args.retain(|a| a != "--no-same-owner" && a != "--no-same-permissions");

        if part.args.len() != len {
          changed = true;
        }
      },
      _ => ()
    }

    parts.push(part);
  }

  if !changed {
    return None;
  }

  let mut after = ShellCommand {
    original: String::new(),
    parts
  };
  let rendered = after.to_string();
  after.original = rendered;

  Some(after)
}
