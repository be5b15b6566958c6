// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

use crate::error::*;
use crate::image::ImageRef;
use crate::mappings::MappingProvider;

/// Reduces a version tag to major.minor: the first `-suffix` is dropped, a
/// leading `v` before a digit is dropped, and a purely numeric dotted tag
/// keeps at most two components. Anything non-numeric becomes `latest`.
fn truncate_semver(tag: &str) -> String {
  let stripped = match tag.find('-') {
    Some(dash) => &tag[..dash],
    None => tag
  };

  let stripped = if stripped.starts_with('v')
    && stripped[1..].starts_with(|c: char| c.is_ascii_digit())
  {
    &stripped[1..]
  } else {
    stripped
  };

  let parts: Vec<&str> = stripped.split('.').collect();
  let numeric = parts.iter().all(|p| p.parse::<u64>().is_ok());

  if numeric {
    if parts.len() >= 2 {
      format!("{}.{}", parts[0], parts[1])
    } else {
      stripped.to_string()
    }
  } else {
    "latest".to_string()
  }
}

/// Computes the target tag for a converted reference. `target_tag` is a tag
/// carried by the catalog's target image, which takes precedence over the
/// source tag's converted form. `needs_dev` selects the build-tooling image
/// variant and is set when the stage contains a RUN.
pub(crate) fn convert_tag(
  base_filename: &str,
  tag: Option<&str>,
  needs_dev: bool,
  target_tag: Option<&str>
) -> String {
  // the minimal base image has no version streams and no -dev variant
  if base_filename == "chainguard-base" {
    return "latest".to_string();
  }

  let jdkish = base_filename == "jdk" || base_filename == "jre";

  let mut converted = match target_tag {
    Some(target) => target.to_string(),
    None => match tag {
      None => "latest".to_string(),
      Some(t) if t.is_empty() => "latest".to_string(),
      Some(t) if t.contains('$') => t.to_string(),
      // an already-prefixed openjdk tag survives truncation
      Some(t) if jdkish && t.starts_with("openjdk-") => t.to_string(),
      Some(t) => truncate_semver(t)
    }
  };

  if jdkish
    && converted != "latest"
    && converted != "latest-dev"
    && !converted.starts_with("openjdk-")
  {
    converted = format!("openjdk-{}", converted);
  }

  if needs_dev {
    if converted == "latest" {
      converted = "latest-dev".to_string();
    } else if !converted.ends_with("-dev") {
      converted.push_str("-dev");
    }
  }

  converted
}

/// Builds the converted reference for a source image: the mapped base name
/// under `prefix`, the converted tag, and the source digest verbatim.
pub(crate) fn convert_reference(
  image: &ImageRef,
  needs_dev: bool,
  prefix: &str,
  provider: &dyn MappingProvider
) -> Result<String> {
  let target = provider.image_mapping(&image.base)?;

  let (target_base, target_tag) = match target {
    Some(target) => {
      let parsed = ImageRef::parse(&target);
      (parsed.base, parsed.tag)
    },
    None => (image.base.clone(), None)
  };

  let base_filename = target_base
    .rsplit('/')
    .next()
    .unwrap_or(&target_base);

  let tag = convert_tag(
    base_filename,
    image.tag.as_deref(),
    needs_dev,
    target_tag.as_deref()
  );

  let mut reference = format!("{}/{}:{}", prefix, base_filename, tag);

  if let Some(digest) = &image.digest {
    reference.push('@');
    reference.push_str(digest);
  }

  Ok(reference)
}
