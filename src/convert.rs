// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::dockerfile::{Dockerfile, Line};
use crate::error::*;
use crate::image::ImageRef;
use crate::instructions::*;
use crate::mappings::*;
use crate::packages::{busybox_rewrite, convert_packages, scan_install};
use crate::tag::convert_reference;

/// A hook invoked after default FROM reference assembly.
///
/// Receives the parsed FROM details, the default-converted reference
/// (without any trailing `AS`), and whether the stage needs a `-dev` image.
/// A non-empty successful return replaces the default reference; an error is
/// logged and the default is kept.
pub type FromLineConverter =
  Box<dyn Fn(&FromDetails, &str, bool) -> Result<String>>;

/// Options controlling `Dockerfile::convert`.
pub struct ConvertOptions {
  /// Organization under the default `cgr.dev` registry; used when `registry`
  /// is empty
  pub organization: String,

  /// Alternate `<host>/<namespace>` prefix; overrides `organization`
  pub registry: String,

  /// Additional mappings consulted before the built-in catalog
  pub extra_mappings: Option<MappingsConfig>,

  /// Suppress the built-in catalog
  pub no_built_in: bool,

  pub from_line_converter: Option<FromLineConverter>,

  /// Overrides all mapping assembly when set
  pub mapping_provider: Option<Box<dyn MappingProvider>>
}

impl Default for ConvertOptions {
  fn default() -> ConvertOptions {
    ConvertOptions {
      organization: "ORG".to_string(),
      registry: String::new(),
      extra_mappings: None,
      no_built_in: false,
      from_line_converter: None,
      mapping_provider: None
    }
  }
}

impl ConvertOptions {
  fn registry_prefix(&self) -> String {
    if !self.registry.is_empty() {
      self.registry.clone()
    } else if self.organization.is_empty() {
      "cgr.dev/ORG".to_string()
    } else {
      format!("cgr.dev/{}", self.organization)
    }
  }
}

lazy_static! {
  static ref USER_LINE: Regex = Regex::new(r"(?im)^\s*USER\s+(.+)$").unwrap();
}

fn has_user_root(text: &str) -> bool {
  USER_LINE
    .captures_iter(text)
    .any(|caps| caps[1].to_lowercase().contains("root"))
}

fn should_convert_from(from: &FromDetails) -> bool {
  from.image.base != "scratch" && from.parent.is_none() && !from.base_dynamic
}

fn convert_from_line(
  line: &mut Line,
  stages_with_run: &HashSet<usize>,
  prefix: &str,
  provider: &dyn MappingProvider,
  options: &ConvertOptions
) -> Result<()> {
  let from = match &line.from {
    Some(from) => from,
    None => return Ok(())
  };

  if !should_convert_from(from) {
    return Ok(());
  }

  let needs_dev = stages_with_run.contains(&line.stage);
  let mut reference = convert_reference(&from.image, needs_dev, prefix, provider)?;

  if let Some(hook) = &options.from_line_converter {
    match hook(from, &reference, needs_dev) {
      Ok(custom) => {
        if !custom.is_empty() {
          reference = custom;
        }
      },
      Err(err) => {
        tracing::warn!(
          "custom FROM line converter failed, keeping default: {}", err
        );
      }
    }
  }

  let mut converted = String::from("FROM ");

  for flag in &from.flags {
    converted.push_str(flag);
    converted.push(' ');
  }

  converted.push_str(&reference);

  if let Some(alias) = &from.alias {
    converted.push_str(" AS ");
    converted.push_str(alias);
  }

  line.converted = Some(converted);

  Ok(())
}

fn convert_arg_line(
  line: &mut Line,
  needs_dev: bool,
  prefix: &str,
  provider: &dyn MappingProvider
) -> Result<()> {
  let arg = match &line.arg {
    Some(arg) => arg,
    None => return Ok(())
  };

  if !arg.used_as_base {
    return Ok(());
  }

  let default = match &arg.default_value {
    Some(default) if !default.is_empty() => default,
    _ => return Ok(())
  };

  if default.contains('$') {
    return Ok(());
  }

  let image = ImageRef::parse(default);
  let reference = convert_reference(&image, needs_dev, prefix, provider)?;
  let converted = format!("ARG {}={}", arg.name, reference);

  line.converted = Some(converted);

  Ok(())
}

fn convert_run_line(
  line: &mut Line,
  shadow_installed: bool,
  provider: &dyn MappingProvider
) -> Result<()> {
  let rewritten = match &line.run {
    Some(run) => convert_packages(&run.before, provider)?,
    None => return Ok(())
  };

  if let Some((scan, after)) = rewritten {
    line.converted = Some(format!("RUN {}", after));

    if let Some(run) = line.run.as_mut() {
      run.distro = Some(scan.distro);
      run.manager = Some(scan.manager);
      run.packages = scan.packages;
      run.after = Some(after);
    }

    return Ok(());
  }

  // a RUN with PM parts that did not rewrite (mixed manager families)
  // passes through untouched, busybox rewrites included
  let rewritten = line.run
    .as_ref()
    .filter(|run| scan_install(&run.before).is_none())
    .and_then(|run| busybox_rewrite(&run.before, shadow_installed));

  if let Some(after) = rewritten {
    line.converted = Some(format!("RUN {}", after));

    if let Some(run) = line.run.as_mut() {
      run.after = Some(after);
    }
  }

  Ok(())
}

impl Dockerfile {
  /// Converts this Dockerfile to the hardened registry and `apk` packages.
  ///
  /// The result is a fresh deep copy; `self` is left untouched. Constructs
  /// not understood by the converter pass through verbatim, so converting is
  /// total except for provider failures, which abort the whole conversion.
  ///
  /// # Example
  /// ```
  /// use dockerfile_converter::{ConvertOptions, Dockerfile};
  ///
  /// let dockerfile = Dockerfile::parse(
  ///   "FROM python:3.9\nRUN apt-get update && apt-get install -y nano"
  /// );
  /// let converted = dockerfile.convert(&ConvertOptions::default()).unwrap();
  ///
  /// assert_eq!(
  ///   converted.to_string(),
  ///   "FROM cgr.dev/ORG/python:3.9-dev\nUSER root\nRUN apk add -U nano"
  /// );
  /// ```
  pub fn convert(&self, options: &ConvertOptions) -> Result<Dockerfile> {
    let chained;
    let provider: &dyn MappingProvider = match &options.mapping_provider {
      Some(provider) => provider.as_ref(),
      None => {
        let mut providers: Vec<Box<dyn MappingProvider>> = Vec::new();

        if let Some(extra) = &options.extra_mappings {
          providers.push(Box::new(InMemoryMappingProvider::new(extra.clone())));
        }

        if !options.no_built_in {
          providers.push(Box::new(
            InMemoryMappingProvider::new(builtin_mappings().clone())
          ));
        }

        chained = ChainedMappingProvider { providers };
        &chained
      }
    };

    let prefix = options.registry_prefix();

    // pass 1: per-stage facts gathered from the unconverted document
    let mut stages_with_run = HashSet::new();
    let mut stage_installs: HashMap<usize, HashSet<String>> = HashMap::new();

    for line in &self.lines {
      if let Some(run) = &line.run {
        stages_with_run.insert(line.stage);

        if let Some(scan) = scan_install(&run.before) {
          if !scan.mixed {
            stage_installs
              .entry(line.stage)
              .or_insert_with(HashSet::new)
              .extend(scan.packages.iter().cloned());
          }
        }
      }
    }

    // pass 2: rewrite FROM / ARG / RUN lines
    let mut lines = Vec::with_capacity(self.lines.len());

    for line in &self.lines {
      let mut line = line.clone();

      if line.from.is_some() {
        convert_from_line(&mut line, &stages_with_run, &prefix, provider, options)?;
      } else if line.arg.is_some() {
        let needs_dev = match &line.arg {
          Some(arg) => self.lines.iter().any(|l| {
            l.from
              .as_ref()
              .map(|f| {
                references_arg(&f.image.base, &arg.name)
                  && stages_with_run.contains(&l.stage)
              })
              .unwrap_or(false)
          }),
          None => false
        };

        convert_arg_line(&mut line, needs_dev, &prefix, provider)?;
      } else if line.run.is_some() {
        let shadow_installed = stage_installs
          .get(&line.stage)
          .map(|installs| installs.contains("shadow"))
          .unwrap_or(false);

        convert_run_line(&mut line, shadow_installed, provider)?;
      }

      lines.push(line);
    }

    // pass 3: stages whose RUNs were converted start from root
    let converted_run_stages: HashSet<usize> = lines
      .iter()
      .filter(|line| line.run.is_some() && line.converted.is_some())
      .map(|line| line.stage)
      .collect();

    let mut user_root_stages: HashSet<usize> = lines
      .iter()
      .filter(|line| {
        has_user_root(&line.raw)
          || line.converted.as_ref().map(|c| has_user_root(c)).unwrap_or(false)
      })
      .map(|line| line.stage)
      .collect();

    for line in &mut lines {
      if line.from.is_none() {
        continue;
      }

      if !converted_run_stages.contains(&line.stage)
        || user_root_stages.contains(&line.stage)
      {
        continue;
      }

      if let Some(converted) = line.converted.as_mut() {
        converted.push_str("\nUSER root");
        user_root_stages.insert(line.stage);
      }
    }

    Ok(Dockerfile {
      content: self.content.clone(),
      lines
    })
  }
}
