//! Reusable asset catalog.
//!
//! The store is a directory holding `assets.json` and copies of every
//! image the catalog refers to. Each mutation writes the whole catalog
//! before the in-memory state changes, so a failed write leaves both the
//! file and the store untouched.

use super::{StorageError, StorageResult, ensure_dir, read_file, write_atomic};
use crate::elements::{ElementKind, ImageElement, TextElement};
use crate::snapshot::{ElementData, GroupSnapshot, TextData};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// File name of the catalog inside the store directory.
pub const ASSET_CATALOG_FILE: &str = "assets.json";

/// Text asset names keep this many characters.
const NAME_CHARS: usize = 20;

/// Numeric asset id, unique within one asset category.
pub type AssetId = u64;

#[derive(Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Seconds(u64),
    Text(String),
}

/// Older catalogs store a formatted date string; those read as 0.
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Timestamp::deserialize(deserializer)? {
        Timestamp::Seconds(secs) => secs,
        Timestamp::Text(text) => {
            log::debug!("Unrecognized asset timestamp {text:?}");
            0
        }
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAsset {
    pub id: AssetId,
    pub name: String,
    #[serde(flatten)]
    pub data: TextData,
    /// Seconds since the Unix epoch.
    #[serde(default, deserialize_with = "timestamp")]
    pub created_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: AssetId,
    pub name: String,
    /// The copy inside the store.
    pub path: PathBuf,
    pub original_path: PathBuf,
    pub width: f64,
    #[serde(default)]
    pub source_width: u32,
    #[serde(default)]
    pub source_height: u32,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAsset {
    pub id: AssetId,
    pub name: String,
    /// Image items point at copies inside the store.
    #[serde(flatten)]
    pub group: GroupSnapshot,
    pub item_count: usize,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Catalog {
    #[serde(default)]
    texts: Vec<TextAsset>,
    #[serde(default)]
    images: Vec<ImageAsset>,
    #[serde(default)]
    groups: Vec<GroupAsset>,
}

/// Directory-backed asset catalog.
#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    catalog: Catalog,
}

impl AssetStore {
    /// Open (or create) a store in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = ensure_dir(dir)?;
        let catalog_path = dir.join(ASSET_CATALOG_FILE);
        let catalog = match read_file(&catalog_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Serialization(format!(
                    "Failed to parse {}: {}",
                    catalog_path.display(),
                    e
                ))
            })?,
            Err(StorageError::NotFound(_)) => Catalog::default(),
            Err(err) => return Err(err),
        };
        Ok(Self { dir, catalog })
    }

    /// Open the store in the default location.
    ///
    /// On Unix: `~/.local/share/shupai/assets/`
    /// On Windows: `%LOCALAPPDATA%\shupai\assets\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::open(base.join("shupai").join("assets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn text_assets(&self) -> &[TextAsset] {
        &self.catalog.texts
    }

    pub fn image_assets(&self) -> &[ImageAsset] {
        &self.catalog.images
    }

    pub fn group_assets(&self) -> &[GroupAsset] {
        &self.catalog.groups
    }

    pub fn text_asset(&self, id: AssetId) -> Option<&TextAsset> {
        self.catalog.texts.iter().find(|a| a.id == id)
    }

    pub fn image_asset(&self, id: AssetId) -> Option<&ImageAsset> {
        self.catalog.images.iter().find(|a| a.id == id)
    }

    pub fn group_asset(&self, id: AssetId) -> Option<&GroupAsset> {
        self.catalog.groups.iter().find(|a| a.id == id)
    }

    /// Save a text element's content and styling.
    pub fn add_text_asset(&mut self, text: &TextElement) -> StorageResult<AssetId> {
        let id = next_id(self.catalog.texts.iter().map(|a| a.id));
        let asset = TextAsset {
            id,
            name: text_name(text.content()),
            data: TextData::capture(text),
            created_time: now(),
        };
        let mut next = self.catalog.clone();
        next.texts.push(asset);
        self.commit(next)?;
        log::info!("Saved text asset {id}");
        Ok(id)
    }

    /// Save an image, copying its file into the store.
    pub fn add_image_asset(&mut self, image: &ImageElement) -> StorageResult<AssetId> {
        let id = next_id(self.catalog.images.iter().map(|a| a.id));
        let original = image.source().to_path_buf();
        let copy = self.copy_media(&original, &format!("img_{id}"))?;
        let (source_width, source_height) = image.source_size();
        let asset = ImageAsset {
            id,
            name: file_name(&original),
            path: copy.clone(),
            original_path: original,
            width: image.target_width(),
            source_width,
            source_height,
            created_time: now(),
        };

        let mut next = self.catalog.clone();
        next.images.push(asset);
        if let Err(err) = self.commit(next) {
            remove_media(&copy);
            return Err(err);
        }
        log::info!("Saved image asset {id}");
        Ok(id)
    }

    /// Save a group, copying the files of its image items into the store.
    pub fn add_group_asset(&mut self, group: &GroupSnapshot) -> StorageResult<AssetId> {
        if group.is_empty() {
            return Err(StorageError::Other("Cannot save an empty group".to_string()));
        }
        let id = next_id(self.catalog.groups.iter().map(|a| a.id));

        let mut stored = group.clone();
        let mut copies = Vec::new();
        for (index, item) in stored.items.iter_mut().enumerate() {
            let ElementData::Image(image) = &mut item.data else {
                continue;
            };
            match self.copy_media(&image.path, &format!("group_{id}_{index}")) {
                Ok(copy) => {
                    image.path = copy.clone();
                    copies.push(copy);
                }
                Err(err) => {
                    copies.iter().for_each(|c| remove_media(c));
                    return Err(err);
                }
            }
        }

        let asset = GroupAsset {
            id,
            name: group_name(group),
            item_count: stored.len(),
            group: stored,
            created_time: now(),
        };
        let mut next = self.catalog.clone();
        next.groups.push(asset);
        if let Err(err) = self.commit(next) {
            copies.iter().for_each(|c| remove_media(c));
            return Err(err);
        }
        log::info!("Saved group asset {id} with {} items", group.len());
        Ok(id)
    }

    /// Returns `false` when no such asset exists.
    pub fn remove_text_asset(&mut self, id: AssetId) -> StorageResult<bool> {
        let mut next = self.catalog.clone();
        let before = next.texts.len();
        next.texts.retain(|a| a.id != id);
        if next.texts.len() == before {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Remove an image asset and its copied file.
    pub fn remove_image_asset(&mut self, id: AssetId) -> StorageResult<bool> {
        let Some(asset) = self.image_asset(id).cloned() else {
            return Ok(false);
        };
        let mut next = self.catalog.clone();
        next.images.retain(|a| a.id != id);
        self.commit(next)?;
        remove_media(&asset.path);
        Ok(true)
    }

    /// Remove a group asset and the files of its image items.
    pub fn remove_group_asset(&mut self, id: AssetId) -> StorageResult<bool> {
        let Some(asset) = self.group_asset(id).cloned() else {
            return Ok(false);
        };
        let mut next = self.catalog.clone();
        next.groups.retain(|a| a.id != id);
        self.commit(next)?;
        for item in &asset.group.items {
            if let ElementData::Image(image) = &item.data {
                remove_media(&image.path);
            }
        }
        Ok(true)
    }

    fn commit(&mut self, next: Catalog) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(&next)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        write_atomic(&self.dir.join(ASSET_CATALOG_FILE), &json)?;
        self.catalog = next;
        Ok(())
    }

    /// Copy `source` into the store as `{prefix}_{file name}`.
    fn copy_media(&self, source: &Path, prefix: &str) -> StorageResult<PathBuf> {
        let target = self.dir.join(format!("{prefix}_{}", file_name(source)));
        fs::copy(source, &target).map_err(|e| {
            StorageError::Io(format!("Failed to copy {}: {}", source.display(), e))
        })?;
        Ok(target)
    }
}

fn next_id(ids: impl Iterator<Item = AssetId>) -> AssetId {
    ids.max().map_or(1, |max| max + 1)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string())
}

fn text_name(content: &str) -> String {
    let head: String = content.chars().take(NAME_CHARS).collect();
    if content.chars().count() > NAME_CHARS {
        format!("{head}...")
    } else {
        head
    }
}

fn group_name(group: &GroupSnapshot) -> String {
    format!(
        "Group: {} texts, {} images",
        group.count(ElementKind::Text),
        group.count(ElementKind::Image)
    )
}

/// Missing files are fine; anything else is only logged.
fn remove_media(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to delete {}: {}", path.display(), e),
    }
}
