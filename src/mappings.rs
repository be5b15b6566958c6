// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::*;
use crate::image::ImageRef;

/// A package-naming namespace.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
  Serialize, Deserialize
)]
#[serde(rename_all = "lowercase")]
pub enum Distro {
  Debian,
  Fedora,
  Alpine
}

impl Distro {
  /// The keyword that marks an install command under this distro's package
  /// managers.
  pub(crate) fn install_keyword(&self) -> &'static str {
    match self {
      Distro::Alpine => "add",
      _ => "install"
    }
  }
}

impl fmt::Display for Distro {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Distro::Debian => "debian",
      Distro::Fedora => "fedora",
      Distro::Alpine => "alpine"
    };

    write!(f, "{}", name)
  }
}

/// A mapping document: source image patterns to target images, and
/// per-distro source package names to target package lists.
///
/// Image pattern keys may contain `*` wildcards. BTreeMaps keep wildcard
/// evaluation order deterministic (lexicographic by pattern).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingsConfig {
  #[serde(default)]
  pub images: BTreeMap<String, String>,

  #[serde(default)]
  pub packages: BTreeMap<Distro, BTreeMap<String, Vec<String>>>
}

impl MappingsConfig {
  /// Parses a mapping document from its YAML form.
  pub fn from_yaml(input: &str) -> Result<MappingsConfig> {
    serde_yaml::from_str(input).context(MappingsError)
  }
}

lazy_static! {
  static ref BUILTIN: MappingsConfig =
    MappingsConfig::from_yaml(include_str!("builtin-mappings.yaml"))
      .expect("embedded mappings document must parse");
}

/// The built-in mapping catalog embedded in the crate.
pub fn builtin_mappings() -> &'static MappingsConfig {
  &BUILTIN
}

/// A source of image and package mappings.
///
/// `Ok(None)` means "not found"; the caller keeps the original name. Backends
/// performing I/O are responsible for honoring their own cancellation and
/// must surface failures as errors (`Error::provider` wraps arbitrary backend
/// failures), which conversion propagates unchanged.
pub trait MappingProvider {
  /// Looks up the target image for a source image reference.
  fn image_mapping(&self, source_image: &str) -> Result<Option<String>>;

  /// Looks up the target packages for a source package under a distro.
  fn package_mappings(&self, distro: Distro, package: &str)
    -> Result<Option<Vec<String>>>;
}

/// A provider backed by an in-memory `MappingsConfig`.
pub struct InMemoryMappingProvider {
  config: MappingsConfig
}

impl InMemoryMappingProvider {
  pub fn new(config: MappingsConfig) -> InMemoryMappingProvider {
    InMemoryMappingProvider { config }
  }
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
  let expr = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));

  Regex::new(&expr).ok()
}

impl MappingProvider for InMemoryMappingProvider {
  fn image_mapping(&self, source_image: &str) -> Result<Option<String>> {
    if let Some(target) = self.config.images.get(source_image) {
      return Ok(Some(target.clone()));
    }

    // equivalent Docker Hub spellings, then wildcard patterns against each
    let variants = ImageRef::parse(source_image).variants();

    for variant in &variants {
      if let Some(target) = self.config.images.get(variant) {
        return Ok(Some(target.clone()));
      }
    }

    for (pattern, target) in &self.config.images {
      if !pattern.contains('*') {
        continue;
      }

      let regex = match wildcard_regex(pattern) {
        Some(regex) => regex,
        None => continue
      };

      if variants.iter().any(|v| regex.is_match(v)) {
        return Ok(Some(target.clone()));
      }
    }

    Ok(None)
  }

  fn package_mappings(&self, distro: Distro, package: &str)
    -> Result<Option<Vec<String>>>
  {
    let targets = self.config.packages
      .get(&distro)
      .and_then(|packages| packages.get(package));

    match targets {
      Some(targets) if !targets.is_empty() => Ok(Some(targets.clone())),
      _ => Ok(None)
    }
  }
}

/// An ordered chain of providers; the first hit wins.
pub struct ChainedMappingProvider {
  pub providers: Vec<Box<dyn MappingProvider>>
}

impl MappingProvider for ChainedMappingProvider {
  fn image_mapping(&self, source_image: &str) -> Result<Option<String>> {
    for provider in &self.providers {
      if let Some(target) = provider.image_mapping(source_image)? {
        return Ok(Some(target));
      }
    }

    Ok(None)
  }

  fn package_mappings(&self, distro: Distro, package: &str)
    -> Result<Option<Vec<String>>>
  {
    for provider in &self.providers {
      if let Some(targets) = provider.package_mappings(distro, package)? {
        return Ok(Some(targets));
      }
    }

    Ok(None)
  }
}
