// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use snafu::Snafu;

use crate::parser::*;

/// A Dockerfile conversion error.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
  #[snafu(display(
    "could not tokenize shell command: {}", source
  ))]
  ShellParseError {
    source: pest::error::Error<Rule>
  },

  #[snafu(display(
    "could not read Dockerfile: {}", source
  ))]
  ReadError {
    source: std::io::Error
  },

  #[snafu(display(
    "could not parse mappings document: {}", source
  ))]
  MappingsError {
    source: serde_yaml::Error
  },

  #[snafu(display(
    "mapping provider error: {}", message
  ))]
  ProviderError {
    message: String
  }
}

/// A Dockerfile conversion Result.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Wraps an arbitrary backend failure into a provider error, for use by
  /// external `MappingProvider` implementations.
  pub fn provider<E: std::fmt::Display>(err: E) -> Error {
    Error::ProviderError {
      message: err.to_string()
    }
  }
}
