// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use std::fmt;

/// A parsed docker image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
  /// The registry path without tag or digest, e.g. `docker.io/library/alpine`
  pub base: String,
  pub tag: Option<String>,
  pub digest: Option<String>
}

/// Determines if an ImageRef token refers to a registry hostname or not
///
/// Based on rules from https://stackoverflow.com/a/42116190
fn is_registry(token: &str) -> bool {
  token == "localhost" || token.contains('.') || token.contains(':')
}

impl ImageRef {
  /// Parses an image reference of the form `base[:tag][@digest]`.
  ///
  /// The digest is split off first; the remainder is split on its first `:`.
  /// Tags are not otherwise validated, so invalid characters may slip
  /// through.
  pub fn parse(s: &str) -> ImageRef {
    let (rest, digest) = match s.find('@') {
      Some(at) => (&s[..at], Some(s[at + 1..].to_string())),
      None => (s, None)
    };

    let parts: Vec<&str> = rest.splitn(2, ':').collect();
    let base = parts[0].to_string();
    let tag = parts.get(1).map(|p| String::from(*p));

    ImageRef { base, tag, digest }
  }

  /// The last path segment of the base, e.g. `alpine` for
  /// `docker.io/library/alpine`.
  pub fn base_filename(&self) -> &str {
    self.base.rsplit('/').next().unwrap_or(&self.base)
  }

  /// Enumerates the equivalent spellings of this reference's base on Docker
  /// Hub, starting with the base itself.
  ///
  /// Bare names (`foo`) and single-level org names (`org/foo`) have
  /// well-known long forms; anything under an explicit registry host only
  /// names itself.
  pub fn variants(&self) -> Vec<String> {
    let base = &self.base;

    let mut split = base.splitn(2, '/');
    let head = split.next().unwrap_or("");
    let rest = split.next();

    match rest {
      None => vec![
        base.clone(),
        format!("docker.io/{}", base),
        format!("docker.io/library/{}", base),
        format!("registry-1.docker.io/library/{}", base),
        format!("index.docker.io/{}", base),
        format!("index.docker.io/library/{}", base)
      ],
      Some(rest) if !is_registry(head) && !rest.contains('/') => vec![
        base.clone(),
        format!("docker.io/{}", base),
        format!("registry-1.docker.io/{}", base),
        format!("index.docker.io/{}", base)
      ],
      Some(_) => vec![base.clone()]
    }
  }
}

impl fmt::Display for ImageRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.base)?;

    if let Some(tag) = &self.tag {
      write!(f, ":{}", tag)?;
    }

    if let Some(digest) = &self.digest {
      write!(f, "@{}", digest)?;
    }

    Ok(())
  }
}
