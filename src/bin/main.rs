// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dockerfile_converter::{ConvertOptions, Dockerfile, MappingsConfig};

/// Converts a Dockerfile to hardened base images and apk packages.
#[derive(Parser)]
#[command(name = "dockerfile-converter", version, about)]
struct Cli {
  /// Path to the Dockerfile, or - for stdin
  input: PathBuf,

  /// Write the converted Dockerfile to a file instead of stdout
  #[arg(short, long, conflicts_with = "in_place")]
  output: Option<PathBuf>,

  /// Overwrite the input file with the converted output
  #[arg(short, long)]
  in_place: bool,

  /// Organization used under the default registry
  #[arg(long, default_value = "ORG")]
  org: String,

  /// Alternate <host>/<namespace> registry prefix
  #[arg(long, default_value = "")]
  registry: String,

  /// Extra image/package mappings, as a YAML document
  #[arg(long)]
  mappings: Option<PathBuf>,

  /// Ignore the built-in mapping catalog
  #[arg(long)]
  no_builtin: bool
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
  let dockerfile = if cli.input.as_os_str() == "-" {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Dockerfile::parse(&buf)
  } else {
    Dockerfile::from_reader(fs::File::open(&cli.input)?)?
  };

  let extra_mappings = match &cli.mappings {
    Some(path) => Some(MappingsConfig::from_yaml(&fs::read_to_string(path)?)?),
    None => None
  };

  let options = ConvertOptions {
    organization: cli.org.clone(),
    registry: cli.registry.clone(),
    extra_mappings,
    no_built_in: cli.no_builtin,
    ..ConvertOptions::default()
  };

  let converted = dockerfile.convert(&options)?;
  let mut output = converted.to_string();
  output.push('\n');

  if cli.in_place {
    if cli.input.as_os_str() == "-" {
      return Err("cannot convert stdin in place".into());
    }

    fs::write(&cli.input, output)?;
  } else if let Some(path) = &cli.output {
    fs::write(path, output)?;
  } else {
    print!("{}", output);
  }

  Ok(())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  if let Err(err) = run(cli) {
    eprintln!("error: {}", err);
    process::exit(1);
  }
}
