//! Emitted assets and writing them below the output directory.

use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use tracing::info;

use crate::runtime::Runtime;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Linked script of a build target.
    Script,
    /// Extracted stylesheet of a build target.
    Style,
    /// File emitted by a stage (fonts, images, templates).
    File,
    /// License comments moved out of a minified script.
    License,
}

/// One output file.
///
/// `name` is the public name relative to the output directory and may carry
/// a query (`mustache/card.mustache?1f0c...`); the query is not part of the
/// path on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub content: Vec<u8>,
    pub kind: AssetKind,
    /// Build target that produced the asset, for scripts and styles.
    pub entry: Option<String>,
}

impl Asset {
    pub fn new(name: impl Into<String>, content: Vec<u8>, kind: AssetKind) -> Self {
        Self {
            name: name.into(),
            content,
            kind,
            entry: None,
        }
    }

    pub fn for_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Path relative to the output directory.
    pub fn file_name(&self) -> &str {
        strip_query(&self.name)
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Name without `?query` (and without `#fragment`).
pub fn strip_query(name: &str) -> &str {
    let end = name.find(['?', '#']).unwrap_or(name.len());
    &name[..end]
}

/// Assets of one build, keyed by name, in emission order.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    assets: IndexMap<String, Asset>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset. Re-emitting identical content under the same name is a
    /// no-op; different content is an error.
    pub fn insert(&mut self, asset: Asset) -> Result<()> {
        if let Some(existing) = self.assets.get(&asset.name) {
            if existing.content == asset.content {
                return Ok(());
            }
            return Err(Error::AssetConflict(asset.name));
        }
        self.assets.insert(asset.name.clone(), asset);
        Ok(())
    }

    /// Replace the content of an existing asset (used by optimizers).
    pub fn update(&mut self, name: &str, content: Vec<u8>) -> bool {
        match self.assets.get_mut(name) {
            Some(asset) => {
                asset.content = content;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Assets of `kind` whose name matches `filter`.
    pub fn matching<'a>(
        &'a self,
        kind: AssetKind,
        filter: &'a regex::Regex,
    ) -> impl Iterator<Item = &'a Asset> + 'a {
        self.assets
            .values()
            .filter(move |a| a.kind == kind && filter.is_match(&a.name))
    }
}

impl IntoIterator for AssetMap {
    type Item = Asset;
    type IntoIter = indexmap::map::IntoValues<String, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.into_values()
    }
}

/// A file written by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// Public name (may carry a query).
    pub name: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    pub size: usize,
    pub kind: AssetKind,
}

/// Join an asset name onto the output directory, refusing anything that
/// would land outside it.
pub fn output_path(out_dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(strip_query(name));
    if relative.as_os_str().is_empty() {
        return Err(Error::InvalidOutputPath(name.to_string()));
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(Error::InvalidOutputPath(name.to_string())),
        }
    }
    Ok(out_dir.join(relative))
}

/// Write every asset below `out_dir`.
pub async fn write_assets(
    runtime: &dyn Runtime,
    out_dir: &Path,
    assets: &AssetMap,
) -> Result<Vec<EmittedFile>> {
    let mut written = Vec::with_capacity(assets.len());
    for asset in assets.iter() {
        let path = output_path(out_dir, &asset.name)?;
        runtime.write_file(&path, &asset.content).await?;
        info!(asset = %asset.name, size = asset.content.len(), "emitted");
        written.push(EmittedFile {
            name: asset.name.clone(),
            path,
            size: asset.content.len(),
            kind: asset.kind,
        });
    }
    Ok(written)
}
