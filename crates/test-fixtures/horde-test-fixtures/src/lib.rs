//! Shared JSON authoring fixtures for crowd animation tests.
//!
//! Every fixture is listed in `fixtures/manifest.json` at the repository root,
//! grouped by kind. Loaders return raw JSON or deserialize into any authoring
//! type, so this crate stays independent of the animation crates.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    skeletons: HashMap<String, String>,
    masks: HashMap<String, String>,
    meshes: HashMap<String, String>,
    clips: HashMap<String, String>,
    controllers: HashMap<String, ControllerEntry>,
}

/// A controller together with the clip and mask fixtures it names.
#[derive(Debug, Deserialize)]
struct ControllerEntry {
    path: String,
    #[serde(default)]
    clips: Vec<String>,
    #[serde(default)]
    masks: Vec<String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn sorted_keys<T>(map: &HashMap<String, T>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

macro_rules! simple_fixtures {
    ($module:ident, $field:ident, $kind:literal) => {
        pub mod $module {
            use super::*;

            pub fn keys() -> Vec<String> {
                sorted_keys(&MANIFEST.$field)
            }

            pub fn json(name: &str) -> Result<String> {
                let rel = lookup(&MANIFEST.$field, $kind, name)?;
                read_to_string(rel)
            }

            pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
                let rel = lookup(&MANIFEST.$field, $kind, name)?;
                super::load_json(rel)
            }

            pub fn path(name: &str) -> Result<PathBuf> {
                let rel = lookup(&MANIFEST.$field, $kind, name)?;
                Ok(resolve_path(rel))
            }
        }
    };
}

simple_fixtures!(skeletons, skeletons, "skeleton");
simple_fixtures!(masks, masks, "skeleton mask");
simple_fixtures!(meshes, meshes, "skinned mesh");
simple_fixtures!(clips, clips, "clip");

pub mod controllers {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.controllers)
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.controllers, "controller", name)?;
        read_to_string(&entry.path)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.controllers, "controller", name)?;
        super::load_json(&entry.path)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.controllers, "controller", name)?;
        Ok(resolve_path(&entry.path))
    }

    /// Clip fixture names the controller references, in manifest order.
    pub fn clips(name: &str) -> Result<Vec<String>> {
        let entry = lookup(&MANIFEST.controllers, "controller", name)?;
        Ok(entry.clips.clone())
    }

    /// Mask fixture names the controller references, in manifest order.
    pub fn masks(name: &str) -> Result<Vec<String>> {
        let entry = lookup(&MANIFEST.controllers, "controller", name)?;
        Ok(entry.masks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_exists() {
        for kind in [
            &MANIFEST.skeletons,
            &MANIFEST.masks,
            &MANIFEST.meshes,
            &MANIFEST.clips,
        ] {
            for rel in kind.values() {
                assert!(resolve_path(rel).is_file(), "missing fixture {rel}");
            }
        }
        for entry in MANIFEST.controllers.values() {
            assert!(resolve_path(&entry.path).is_file(), "missing fixture {}", entry.path);
            for clip in &entry.clips {
                assert!(MANIFEST.clips.contains_key(clip), "unknown clip {clip}");
            }
            for mask in &entry.masks {
                assert!(MANIFEST.masks.contains_key(mask), "unknown mask {mask}");
            }
        }
    }
}
