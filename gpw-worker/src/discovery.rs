// SPDX-License-Identifier: AGPL-3.0-or-later
//! Build-asset discovery
//!
//! The server publishes a JSON index of its hashed build output, either
//! `{"assets": [...]}` or a bare array of root-relative paths.

use gpw_core::{GpwResult, StaticManifest};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum AssetIndex {
    Listing { assets: Vec<String> },
    Bare(Vec<String>),
}

/// Parse an asset index body
pub fn parse_index(body: &[u8]) -> GpwResult<Vec<String>> {
    let index: AssetIndex = serde_json::from_slice(body)?;
    Ok(match index {
        AssetIndex::Listing { assets } => assets,
        AssetIndex::Bare(assets) => assets,
    })
}

/// Keep paths under `prefix` that the manifest does not already cover.
/// Order is preserved and duplicates dropped.
pub fn select_assets(paths: Vec<String>, prefix: &str, manifest: &StaticManifest) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for path in paths {
        let path = path.split_once('#').map(|(p, _)| p.to_string()).unwrap_or(path);
        if path.starts_with(prefix) && !manifest.contains(&path) && !selected.contains(&path) {
            selected.push(path);
        }
    }
    selected
}
