//! Project documents.
//!
//! A project is a JSON object with the canvas size, the element records in
//! insertion order, the hierarchy links and the content connectors. Records
//! refer to each other by their `id`, so item order does not matter on load.
//! Loading also accepts the bare item array written by the first version of
//! the format.

use super::{StorageError, StorageResult, read_file, write_atomic};
use crate::config::SceneConfig;
use crate::connector::Connector;
use crate::document::SceneDocument;
use crate::elements::{Element, ElementId, ImageElement};
use crate::layout::{FontMetrics, ScaledMetrics};
use crate::scene::Scene;
use crate::snapshot::{ConnectionRecord, ElementData};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Version written by [`ProjectSerializer::save`].
pub const PROJECT_VERSION: u32 = 2;

const NO_PARENT: i64 = -1;

fn no_parent() -> i64 {
    NO_PARENT
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
    /// Record id referenced by `parent_id` and connectors. Falls back to
    /// the position in `items` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<usize>,
    #[serde(flatten)]
    data: ElementData,
    /// Local position.
    x: f64,
    y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scene_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scene_y: Option<f64>,
    #[serde(default)]
    z: f64,
    #[serde(default = "no_parent")]
    parent_id: i64,
    #[serde(default = "default_true")]
    anchor_visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkRecord {
    parent_id: usize,
    child_id: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CanvasRecord {
    width: f64,
    height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectDocument {
    version: u32,
    #[serde(default)]
    canvas: Option<CanvasRecord>,
    items: Vec<ItemRecord>,
    /// Mirrors `parent_id`; only consulted for items without one.
    #[serde(default)]
    connectors: Vec<LinkRecord>,
    #[serde(default)]
    content_connectors: Vec<ConnectionRecord>,
}

/// Saves and loads scenes as project documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectSerializer;

impl ProjectSerializer {
    /// Serialize a scene to pretty-printed JSON.
    pub fn save(scene: &Scene) -> StorageResult<Vec<u8>> {
        let doc = scene.document();
        let index: HashMap<ElementId, usize> =
            doc.ids().iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let index_of = |id: ElementId| {
            index
                .get(&id)
                .copied()
                .ok_or_else(|| StorageError::Other(format!("Unknown element {id}")))
        };

        let mut items = Vec::with_capacity(doc.len());
        for (i, &id) in doc.ids().iter().enumerate() {
            let element = doc
                .get(id)
                .ok_or_else(|| StorageError::Other(format!("Unknown element {id}")))?;
            let position = element.position();
            let scene_pos = doc.scene_position(id);
            let parent_id = match element.parent() {
                Some(parent) => index_of(parent)? as i64,
                None => NO_PARENT,
            };
            items.push(ItemRecord {
                id: Some(i),
                data: ElementData::capture(element),
                x: position.x,
                y: position.y,
                scene_x: scene_pos.map(|p| p.x),
                scene_y: scene_pos.map(|p| p.y),
                z: element.z(),
                parent_id,
                anchor_visible: element.anchor_visible(),
            });
        }

        let connectors = doc
            .hierarchy_connectors()
            .iter()
            .map(|c| {
                Ok(LinkRecord {
                    parent_id: index_of(c.item1)?,
                    child_id: index_of(c.item2)?,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;
        let content_connectors = doc
            .content_connectors()
            .iter()
            .map(|c| {
                Ok(ConnectionRecord {
                    from: index_of(c.item1)?,
                    to: index_of(c.item2)?,
                    kind: c.kind,
                    line_width: c.line_width,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let size = scene.canvas_size();
        let project = ProjectDocument {
            version: PROJECT_VERSION,
            canvas: Some(CanvasRecord {
                width: size.width,
                height: size.height,
            }),
            items,
            connectors,
            content_connectors,
        };
        serde_json::to_vec_pretty(&project)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Load a project with the default config and metrics.
    pub fn load(bytes: &[u8]) -> StorageResult<Scene> {
        Self::load_with(bytes, SceneConfig::default(), Box::new(ScaledMetrics::default()))
    }

    /// Load a project in three phases: elements, parent links, content
    /// connectors. The returned scene has an empty history.
    pub fn load_with(
        bytes: &[u8],
        config: SceneConfig,
        metrics: Box<dyn FontMetrics>,
    ) -> StorageResult<Scene> {
        let project = parse(bytes)?;
        if project.version > PROJECT_VERSION {
            log::warn!(
                "Project version {} is newer than {}, loading what is understood",
                project.version,
                PROJECT_VERSION
            );
        }

        let mut document = SceneDocument::new();
        document.hierarchy_line_width = config.hierarchy_line_width;
        let invalid = |what: String| StorageError::Serialization(what);

        // Phase 1: elements, keyed by record id.
        let mut ids = Vec::with_capacity(project.items.len());
        let mut by_record: HashMap<usize, ElementId> = HashMap::new();
        for (i, item) in project.items.iter().enumerate() {
            let record = item.id.unwrap_or(i);
            let mut element = build_element(&item.data, metrics.as_ref())
                .map_err(|e| invalid(format!("item {record}: {e}")))?;
            element.set_position(Point::new(item.x, item.y));
            element.set_z(item.z);
            element.set_anchor_visible(item.anchor_visible);
            if by_record.insert(record, element.id()).is_some() {
                return Err(invalid(format!("duplicate item id {record}")));
            }
            ids.push(element.id());
            document
                .insert_element(element, usize::MAX)
                .map_err(|e| invalid(format!("item {record}: {e}")))?;
        }

        // Phase 2: parents. `parent_id` wins; `connectors` only fills gaps.
        let mut parent_of: HashMap<usize, usize> = HashMap::new();
        for (i, item) in project.items.iter().enumerate() {
            if let Ok(parent) = usize::try_from(item.parent_id) {
                parent_of.insert(item.id.unwrap_or(i), parent);
            }
        }
        for link in &project.connectors {
            parent_of.entry(link.child_id).or_insert(link.parent_id);
        }
        for (i, item) in project.items.iter().enumerate() {
            let record = item.id.unwrap_or(i);
            let Some(&parent_record) = parent_of.get(&record) else {
                continue;
            };
            match by_record.get(&parent_record) {
                Some(&parent) if parent_record != record => document
                    .set_parent_link(ids[i], Some(parent), Point::new(item.x, item.y))
                    .map_err(|e| invalid(format!("item {record}: {e}")))?,
                _ => log::warn!("Item {record} has invalid parent {parent_record}, kept as root"),
            }
        }

        // Phase 3: content connectors.
        for record in &project.content_connectors {
            let ends = (by_record.get(&record.from), by_record.get(&record.to));
            let (Some(&a), Some(&b)) = ends else {
                log::warn!("Skipping connector {} -> {}: no such item", record.from, record.to);
                continue;
            };
            if a == b || !record.kind.is_content() || document.find_content_connector(a, b).is_some() {
                log::warn!("Skipping connector {} -> {}", record.from, record.to);
                continue;
            }
            let connector = Connector::new(record.kind, a, b).with_line_width(record.line_width);
            document
                .insert_connector(connector, usize::MAX)
                .map_err(|e| invalid(e.to_string()))?;
        }

        document.refresh_all_connectors();
        document
            .check_consistency()
            .map_err(|e| invalid(e.to_string()))?;

        let mut scene = Scene::from_document(document, config, metrics);
        if let Some(canvas) = project.canvas {
            scene.set_canvas_size(canvas.width, canvas.height);
        }
        log::info!("Loaded project with {} elements", ids.len());
        Ok(scene)
    }

    pub fn save_to_file(scene: &Scene, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let bytes = Self::save(scene)?;
        write_atomic(path, &bytes)?;
        log::info!("Saved project to {}", path.display());
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> StorageResult<Scene> {
        let bytes = read_file(path.as_ref())?;
        Self::load(&bytes)
    }
}

fn parse(bytes: &[u8]) -> StorageResult<ProjectDocument> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    if value.is_array() {
        let items: Vec<ItemRecord> = serde_json::from_value(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        return Ok(ProjectDocument {
            version: 1,
            canvas: None,
            items,
            connectors: Vec::new(),
            content_connectors: Vec::new(),
        });
    }
    serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Images whose file is gone load as a square placeholder.
fn build_element(data: &ElementData, metrics: &dyn FontMetrics) -> crate::SceneResult<Element> {
    match data {
        ElementData::Image(image) => match image.build() {
            Ok(element) => Ok(element.into()),
            Err(err) => {
                log::warn!("{err}; using a placeholder for {}", image.path.display());
                Ok(ImageElement::with_source_size(&image.path, 0, 0, image.width).into())
            }
        },
        text => text.build(metrics),
    }
}
