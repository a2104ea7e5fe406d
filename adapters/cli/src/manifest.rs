//! Loading of the TOML configuration manifest.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use pipeflow_core::NetworkConfig;
use pipeflow_system_flow_emitter::Config as EmitterConfig;
use serde::Deserialize;

const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Settings resolved from a configuration manifest.
#[derive(Clone, Debug, Default)]
pub(crate) struct Settings {
    /// Configuration handed to the world.
    pub(crate) network: NetworkConfig,
    /// Configuration of the continuous flow emitter.
    pub(crate) emitter: EmitterConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    version: u32,
    #[serde(default)]
    network: NetworkConfig,
    #[serde(default)]
    flow: FlowSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowSection {
    interval_ms: Option<u64>,
}

/// Reads and validates the manifest stored at `path`.
pub(crate) fn load(path: &Path) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid configuration at {}", path.display()))
}

fn parse(contents: &str) -> Result<Settings> {
    let manifest: Manifest =
        toml::from_str(contents).context("failed to parse configuration toml contents")?;
    if manifest.version != SUPPORTED_MANIFEST_VERSION {
        bail!(
            "unsupported configuration version {} (expected {SUPPORTED_MANIFEST_VERSION})",
            manifest.version
        );
    }
    manifest
        .network
        .validate()
        .context("network configuration rejected")?;

    let emitter = manifest
        .flow
        .interval_ms
        .map(|millis| EmitterConfig::new(Duration::from_millis(millis)))
        .unwrap_or_default();
    Ok(Settings {
        network: manifest.network,
        emitter,
    })
}
