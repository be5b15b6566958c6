// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

extern crate dockerfile_converter;

use dockerfile_converter::*;
use indoc::indoc;
use pretty_assertions::assert_eq;

fn convert(source: &str, options: &ConvertOptions) -> Dockerfile {
  Dockerfile::parse(source).convert(options).unwrap()
}

fn convert_default(source: &str) -> String {
  convert(source, &ConvertOptions::default()).to_string()
}

#[test]
fn apt_get_install_with_mapping() {
  let options = ConvertOptions {
    extra_mappings: Some(MappingsConfig::from_yaml(indoc!(r#"
      packages:
        debian:
          abc:
            - xyz
            - lmnop
    "#)).unwrap()),
    ..ConvertOptions::default()
  };

  let converted = convert(
    "FROM debian:12\nRUN apt-get update && apt-get install -y abc nginx",
    &options
  );

  let run = &converted.lines[1];
  assert_eq!(run.converted, Some("RUN apk add -U lmnop nginx xyz".to_string()));

  let details = run.run.as_ref().unwrap();
  assert_eq!(details.packages, vec!["abc", "nginx"]);
  assert_eq!(details.distro, Some(Distro::Debian));
  assert_eq!(details.manager, Some(Manager::AptGet));
  assert!(details.after.is_some());
}

#[test]
fn multi_stage_with_platform_and_upgrade() {
  let output = convert_default(indoc!(r#"
    FROM --platform=linux/amd64 golang:1.23.8-bookworm AS build
    RUN apt-get update && apt-get upgrade -y
    FROM --platform=linux/amd64 ubuntu:latest
  "#));

  assert_eq!(output, indoc!(r#"
    FROM --platform=linux/amd64 cgr.dev/ORG/go:1.23-dev AS build
    USER root
    RUN apk upgrade
    FROM --platform=linux/amd64 cgr.dev/ORG/chainguard-base:latest
  "#).trim_end_matches('\n'));
}

#[test]
fn useradd_preserved_when_shadow_installed() {
  let output = convert_default(
    "FROM debian:12\nRUN apt-get install -y shadow && useradd -r -s /bin/bash nonroot"
  );

  assert!(output.contains("apk add -U shadow"));
  assert!(output.contains("useradd -r -s /bin/bash nonroot"));
  assert!(!output.contains("adduser"));
}

#[test]
fn useradd_preserved_when_shadow_installed_in_other_run() {
  let converted = convert(
    indoc!(r#"
      FROM debian:12
      RUN apt-get install -y shadow
      RUN useradd -r appuser
    "#),
    &ConvertOptions::default()
  );

  // the busybox rewrite is off for the whole stage
  assert_eq!(converted.lines[2].converted, None);
}

#[test]
fn useradd_rewritten_without_shadow() {
  let converted = convert(
    "FROM debian:12\nRUN useradd -u 1001 appuser && groupadd grp",
    &ConvertOptions::default()
  );

  assert_eq!(
    converted.lines[1].converted,
    Some("RUN adduser -u 1001 -D appuser && \\\n    addgroup grp".to_string())
  );
}

#[test]
fn digest_preserved() {
  let output = convert_default("FROM python:3.9-slim@sha256:123456abcdef");

  assert_eq!(output, "FROM cgr.dev/ORG/python:3.9@sha256:123456abcdef");
}

#[test]
fn user_root_inserted_once() {
  let output = convert_default("FROM python:3.9\nRUN apt-get install -y nano");

  assert_eq!(
    output,
    "FROM cgr.dev/ORG/python:3.9-dev\nUSER root\nRUN apk add -U nano"
  );
  assert_eq!(output.matches("USER root").count(), 1);

  // converting the output again changes nothing
  assert_eq!(convert_default(&output), output);
}

#[test]
fn duplicate_packages_collapsed() {
  let converted = convert(
    "FROM debian:12\nRUN apt-get install -y nginx nginx curl curl",
    &ConvertOptions::default()
  );

  let run = &converted.lines[1];
  assert_eq!(run.converted, Some("RUN apk add -U curl nginx".to_string()));
  assert_eq!(run.run.as_ref().unwrap().packages, vec!["curl", "nginx"]);
}

#[test]
fn no_dev_suffix_without_run() {
  let output = convert_default(indoc!(r#"
    FROM python:3.9 AS base
    FROM node:22.4.1
    COPY . /app
  "#));

  assert!(!output.contains("-dev"));
  assert!(output.contains("cgr.dev/ORG/python:3.9 AS base"));
  assert!(output.contains("cgr.dev/ORG/node:22.4"));
}

#[test]
fn stage_references_and_scratch_untouched() {
  let output = convert_default(indoc!(r#"
    FROM golang:1.22 AS build
    RUN apt-get install -y git make
    FROM scratch
    COPY --from=build /out /out
    FROM build
  "#));

  assert!(output.contains("FROM cgr.dev/ORG/go:1.22-dev AS build"));
  assert!(output.contains("\nFROM scratch\n"));
  assert!(output.ends_with("FROM build"));
}

#[test]
fn non_contiguous_install_converts_first_run_only() {
  let output = convert_default(
    "FROM debian:12\nRUN apt-get install -y foo && echo mid && apt-get install -y bar"
  );

  // collection stops at the gap; the trailing install is left as written
  assert!(output.contains(
    "RUN apk add -U foo && \\\n    echo mid && \\\n    apt-get install -y bar"
  ));
  assert!(!output.contains("bar foo"));

  // the leftover part makes a second pass a no-op
  assert_eq!(convert_default(&output), output);
}

#[test]
fn mixed_package_managers_untouched() {
  let source = "FROM debian:12\nRUN apt-get install -y curl && yum install -y wget";
  let converted = convert(source, &ConvertOptions::default());

  assert_eq!(converted.lines[1].converted, None);
  // an unconverted RUN means no USER root either
  assert!(!converted.to_string().contains("USER root"));
}

#[test]
fn structure_preserved_around_conversions() {
  let output = convert_default(indoc!(r#"
    # build image
    FROM debian:12

    # tools
    RUN apt-get update && \
        apt-get install -y git

    CMD ["bash"]
  "#));

  assert_eq!(output, indoc!(r#"
    # build image
    FROM cgr.dev/ORG/chainguard-base:latest
    USER root

    # tools
    RUN apk add -U git

    CMD ["bash"]
  "#).trim_end_matches('\n'));
}

#[test]
fn conversion_idempotent() {
  let sources = [
    indoc!(r#"
      ARG BASE=python:3.11-slim
      FROM ${BASE} AS app
      RUN apt-get update && apt-get install -y nano curl
      RUN useradd -u 1001 appuser
      FROM ubuntu:22.04
      RUN microdnf install -y tar
    "#),
    "FROM fedora:40\nRUN dnf install -y gcc-c++ && dnf clean all",
    "FROM alpine:3.19\nRUN apk add --no-cache curl"
  ];

  for source in &sources {
    let once = convert_default(source);
    assert_eq!(convert_default(&once), once, "not idempotent for {:?}", source);
  }
}

#[test]
fn identity_provider_idempotent() {
  let options = || ConvertOptions {
    no_built_in: true,
    ..ConvertOptions::default()
  };

  let source = indoc!(r#"
    FROM golang:1.23.8 AS build
    RUN apt-get install -y abc
    FROM scratch
  "#);

  let once = convert(source, &options()).to_string();
  let twice = convert(&once, &options()).to_string();

  assert_eq!(twice, once);
  // unmapped names pass through
  assert!(once.contains("cgr.dev/ORG/golang:1.23-dev"));
  assert!(once.contains("apk add -U abc"));
}

#[test]
fn custom_registry_option() {
  let options = ConvertOptions {
    registry: "registry.example.com/hardened".to_string(),
    ..ConvertOptions::default()
  };

  let converted = convert("FROM python:3.9", &options);

  assert_eq!(
    converted.to_string(),
    "FROM registry.example.com/hardened/python:3.9"
  );
}

#[test]
fn existing_user_root_not_duplicated() {
  let output = convert_default(indoc!(r#"
    FROM debian:12
    USER root
    RUN apt-get install -y curl
    USER nobody
  "#));

  assert_eq!(output.matches("USER root").count(), 1);
}

#[test]
fn openjdk_tag_special_case() {
  let output = convert_default("FROM eclipse-temurin:17-jdk\nRUN apt-get install -y curl");

  assert!(output.contains("FROM cgr.dev/ORG/jdk:openjdk-17-dev"));
  assert_eq!(convert_default(&output), output);
}
