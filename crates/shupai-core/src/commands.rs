//! Structural scene edits as reversible commands.
//!
//! Each command records, during `execute`, exactly what it needs to put the
//! document back. Ids are kept across undo and redo, and removed items are
//! restored at their former indices.

use crate::connector::{Connector, ConnectorId};
use crate::document::SceneDocument;
use crate::elements::{Element, ElementId};
use crate::error::{SceneError, SceneResult};
use crate::undo::Command;
use kurbo::Point;

/// A structural edit of a [`SceneDocument`].
#[derive(Debug, Clone)]
pub enum SceneCommand {
    /// Insert an element. Its parent link, if any, must resolve.
    AddElement {
        element: Element,
        index: Option<usize>,
    },
    /// Remove an element together with its subtree and every content
    /// connector touching it.
    DeleteElement {
        id: ElementId,
        removed: Vec<(Element, usize)>,
        connectors: Vec<(Connector, usize)>,
    },
    /// Change an element's parent, keeping its scene position.
    Reparent {
        id: ElementId,
        parent: Option<ElementId>,
        previous: Option<Option<ElementId>>,
    },
    /// Insert a content connector.
    AddConnector {
        connector: Connector,
        index: Option<usize>,
    },
    /// Remove a set of content connectors.
    RemoveConnectors {
        ids: Vec<ConnectorId>,
        removed: Vec<(Connector, usize)>,
    },
    /// Several commands applied as one step.
    Batch(Vec<SceneCommand>),
}

impl SceneCommand {
    pub fn add_element(element: impl Into<Element>) -> Self {
        SceneCommand::AddElement {
            element: element.into(),
            index: None,
        }
    }

    pub fn delete_element(id: ElementId) -> Self {
        SceneCommand::DeleteElement {
            id,
            removed: Vec::new(),
            connectors: Vec::new(),
        }
    }

    pub fn reparent(id: ElementId, parent: Option<ElementId>) -> Self {
        SceneCommand::Reparent {
            id,
            parent,
            previous: None,
        }
    }

    pub fn add_connector(connector: Connector) -> Self {
        SceneCommand::AddConnector {
            connector,
            index: None,
        }
    }

    pub fn remove_connectors(ids: Vec<ConnectorId>) -> Self {
        SceneCommand::RemoveConnectors {
            ids,
            removed: Vec::new(),
        }
    }

    pub fn batch(commands: Vec<SceneCommand>) -> Self {
        SceneCommand::Batch(commands)
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            SceneCommand::AddElement { .. } => "add element",
            SceneCommand::DeleteElement { .. } => "delete element",
            SceneCommand::Reparent { .. } => "reparent",
            SceneCommand::AddConnector { .. } => "add connector",
            SceneCommand::RemoveConnectors { .. } => "remove connectors",
            SceneCommand::Batch(_) => "batch",
        }
    }
}

impl Command<SceneDocument> for SceneCommand {
    type Error = SceneError;

    fn execute(&mut self, doc: &mut SceneDocument) -> SceneResult<()> {
        match self {
            SceneCommand::AddElement { element, index } => {
                let at = index.unwrap_or(doc.len());
                doc.insert_element(element.clone(), at)?;
                *index = Some(at);
                Ok(())
            }
            SceneCommand::DeleteElement {
                id,
                removed,
                connectors,
            } => delete_subtree(doc, *id, removed, connectors),
            SceneCommand::Reparent {
                id,
                parent,
                previous,
            } => {
                let old = doc.get(*id).ok_or(SceneError::ElementNotFound(*id))?.parent();
                attach_in_place(doc, *id, *parent)?;
                *previous = Some(old);
                Ok(())
            }
            SceneCommand::AddConnector { connector, index } => {
                if connector.item1 == connector.item2 {
                    return Err(SceneError::SelfConnection);
                }
                if doc
                    .find_content_connector(connector.item1, connector.item2)
                    .is_some()
                {
                    return Err(SceneError::AlreadyConnected);
                }
                let at = index.unwrap_or(doc.content_connectors().len());
                doc.insert_connector(connector.clone(), at)?;
                *index = Some(at);
                Ok(())
            }
            SceneCommand::RemoveConnectors { ids, removed } => {
                let mut indices = Vec::with_capacity(ids.len());
                for id in ids.iter() {
                    let index = doc
                        .content_connectors()
                        .iter()
                        .position(|c| c.id() == *id)
                        .ok_or(SceneError::ConnectorNotFound(*id))?;
                    indices.push(index);
                }
                indices.sort_unstable();
                indices.dedup();
                removed.clear();
                for index in indices.into_iter().rev() {
                    let id = doc.content_connectors()[index].id();
                    removed.push(doc.remove_connector(id)?);
                }
                Ok(())
            }
            SceneCommand::Batch(commands) => {
                for i in 0..commands.len() {
                    if let Err(err) = commands[i].execute(doc) {
                        for done in commands[..i].iter_mut().rev() {
                            if let Err(rollback) = done.undo(doc) {
                                log::error!("Rollback of {} failed: {}", done.name(), rollback);
                            }
                        }
                        return Err(err);
                    }
                }
                Ok(())
            }
        }
    }

    fn undo(&mut self, doc: &mut SceneDocument) -> SceneResult<()> {
        match self {
            SceneCommand::AddElement { element, .. } => {
                let (current, _) = doc.remove_element(element.id())?;
                // Keep edits made since the add for a later redo.
                *element = current;
                Ok(())
            }
            SceneCommand::DeleteElement {
                removed, connectors, ..
            } => restore(doc, removed, connectors),
            SceneCommand::Reparent { id, previous, .. } => {
                let parent = previous.take().ok_or_else(|| {
                    SceneError::Consistency("reparent undone before execute".to_string())
                })?;
                attach_in_place(doc, *id, parent)
            }
            SceneCommand::AddConnector { connector, .. } => {
                let (current, _) = doc.remove_connector(connector.id())?;
                *connector = current;
                Ok(())
            }
            SceneCommand::RemoveConnectors { removed, .. } => {
                for (connector, index) in std::mem::take(removed).into_iter().rev() {
                    doc.insert_connector(connector, index)?;
                }
                Ok(())
            }
            SceneCommand::Batch(commands) => {
                for command in commands.iter_mut().rev() {
                    command.undo(doc)?;
                }
                Ok(())
            }
        }
    }
}

fn delete_subtree(
    doc: &mut SceneDocument,
    id: ElementId,
    removed: &mut Vec<(Element, usize)>,
    connectors: &mut Vec<(Connector, usize)>,
) -> SceneResult<()> {
    if !doc.contains(id) {
        return Err(SceneError::ElementNotFound(id));
    }
    removed.clear();
    connectors.clear();

    let subtree = doc.subtree(id);
    let incident: Vec<ConnectorId> = doc
        .content_connectors()
        .iter()
        .rev()
        .filter(|c| subtree.iter().any(|e| c.involves(*e)))
        .map(Connector::id)
        .collect();

    let result = remove_all(doc, &incident, &subtree, removed, connectors);
    if result.is_err() {
        restore(doc, removed, connectors)?;
    }
    result
}

fn remove_all(
    doc: &mut SceneDocument,
    incident: &[ConnectorId],
    subtree: &[ElementId],
    removed: &mut Vec<(Element, usize)>,
    connectors: &mut Vec<(Connector, usize)>,
) -> SceneResult<()> {
    for connector in incident {
        connectors.push(doc.remove_connector(*connector)?);
    }
    // Children first, so every removal is of a leaf.
    for element in subtree.iter().rev() {
        removed.push(doc.remove_element(*element)?);
    }
    Ok(())
}

fn restore(
    doc: &mut SceneDocument,
    removed: &mut Vec<(Element, usize)>,
    connectors: &mut Vec<(Connector, usize)>,
) -> SceneResult<()> {
    for (element, index) in std::mem::take(removed).into_iter().rev() {
        doc.insert_element(element, index)?;
    }
    for (connector, index) in std::mem::take(connectors).into_iter().rev() {
        doc.insert_connector(connector, index)?;
    }
    Ok(())
}

/// Link `id` under `parent`, converting its current scene position into
/// the new local position.
fn attach_in_place(
    doc: &mut SceneDocument,
    id: ElementId,
    parent: Option<ElementId>,
) -> SceneResult<()> {
    let world = doc
        .scene_position(id)
        .ok_or_else(|| SceneError::Consistency(format!("no scene position for {id}")))?;
    let origin = match parent {
        Some(p) => doc.scene_position(p).ok_or(SceneError::ElementNotFound(p))?,
        None => Point::ZERO,
    };
    doc.set_parent_link(id, parent, world - origin.to_vec2())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectionType, ConnectorKind};
    use crate::elements::ImageElement;
    use crate::undo::UndoEngine;

    fn image(x: f64, y: f64) -> Element {
        ImageElement::with_source_size("a.png", 100, 100, 40.0)
            .at(Point::new(x, y))
            .into()
    }

    fn generic(a: ElementId, b: ElementId) -> Connector {
        Connector::new(ConnectorKind::Generic(ConnectionType::ImageImage), a, b)
    }

    #[test]
    fn test_reparent_keeps_world_position() {
        let mut doc = SceneDocument::new();
        let mut engine = UndoEngine::new(50);
        let parent = image(100.0, 100.0);
        let child = image(250.0, 300.0);
        let (p, c) = (parent.id(), child.id());
        engine.push(SceneCommand::add_element(parent), &mut doc).unwrap();
        engine.push(SceneCommand::add_element(child), &mut doc).unwrap();

        engine.push(SceneCommand::reparent(c, Some(p)), &mut doc).unwrap();
        assert_eq!(doc.get(c).unwrap().position(), Point::new(150.0, 200.0));
        assert_eq!(doc.scene_position(c), Some(Point::new(250.0, 300.0)));

        engine.undo(&mut doc).unwrap();
        assert_eq!(doc.get(c).unwrap().parent(), None);
        assert_eq!(doc.get(c).unwrap().position(), Point::new(250.0, 300.0));
        assert!(doc.hierarchy_connectors().is_empty());
        doc.check_consistency().unwrap();
    }

    #[test]
    fn test_reparent_undo_after_move_keeps_world_position() {
        let mut doc = SceneDocument::new();
        let mut engine = UndoEngine::new(50);
        let parent = image(100.0, 100.0);
        let child = image(250.0, 300.0);
        let (p, c) = (parent.id(), child.id());
        engine.push(SceneCommand::add_element(parent), &mut doc).unwrap();
        engine.push(SceneCommand::add_element(child), &mut doc).unwrap();
        engine.push(SceneCommand::reparent(c, Some(p)), &mut doc).unwrap();

        // Moves are not undoable, so undo must respect where the child is now.
        let moved = doc.get(c).unwrap().position() + kurbo::Vec2::new(30.0, -20.0);
        doc.get_mut(c).unwrap().set_position(moved);
        assert_eq!(doc.scene_position(c), Some(Point::new(280.0, 280.0)));

        engine.undo(&mut doc).unwrap();
        assert_eq!(doc.get(c).unwrap().parent(), None);
        assert_eq!(doc.scene_position(c), Some(Point::new(280.0, 280.0)));

        engine.redo(&mut doc).unwrap();
        assert_eq!(doc.get(c).unwrap().parent(), Some(p));
        assert_eq!(doc.get(c).unwrap().position(), Point::new(180.0, 180.0));
        doc.check_consistency().unwrap();
    }

    #[test]
    fn test_delete_restores_subtree_and_connectors() {
        let mut doc = SceneDocument::new();
        let mut engine = UndoEngine::new(50);
        let root = image(0.0, 0.0);
        let child = image(10.0, 10.0);
        let other = image(500.0, 0.0);
        let (r, c, o) = (root.id(), child.id(), other.id());
        for element in [root, child, other] {
            engine.push(SceneCommand::add_element(element), &mut doc).unwrap();
        }
        engine.push(SceneCommand::reparent(c, Some(r)), &mut doc).unwrap();
        let link = generic(c, o);
        let link_id = link.id();
        engine.push(SceneCommand::add_connector(link), &mut doc).unwrap();

        engine.push(SceneCommand::delete_element(r), &mut doc).unwrap();
        assert_eq!(doc.ids(), &[o]);
        assert!(doc.content_connectors().is_empty());
        assert!(doc.hierarchy_connectors().is_empty());

        engine.undo(&mut doc).unwrap();
        assert_eq!(doc.ids(), &[r, c, o]);
        assert_eq!(doc.get(c).unwrap().parent(), Some(r));
        assert!(doc.content_connector(link_id).is_some());
        doc.check_consistency().unwrap();

        engine.redo(&mut doc).unwrap();
        assert_eq!(doc.len(), 1);
        doc.check_consistency().unwrap();
    }

    #[test]
    fn test_connector_validation() {
        let mut doc = SceneDocument::new();
        let mut engine = UndoEngine::new(50);
        let a = image(0.0, 0.0);
        let b = image(100.0, 0.0);
        let (a_id, b_id) = (a.id(), b.id());
        engine.push(SceneCommand::add_element(a), &mut doc).unwrap();
        engine.push(SceneCommand::add_element(b), &mut doc).unwrap();

        let self_link = engine.push(SceneCommand::add_connector(generic(a_id, a_id)), &mut doc);
        assert_eq!(self_link, Err(SceneError::SelfConnection));

        engine.push(SceneCommand::add_connector(generic(a_id, b_id)), &mut doc).unwrap();
        let duplicate = engine.push(SceneCommand::add_connector(generic(b_id, a_id)), &mut doc);
        assert_eq!(duplicate, Err(SceneError::AlreadyConnected));
        assert_eq!(doc.content_connectors().len(), 1);
    }

    #[test]
    fn test_remove_connectors_restores_order() {
        let mut doc = SceneDocument::new();
        let mut engine = UndoEngine::new(50);
        let elements: Vec<Element> = (0..4).map(|i| image(i as f64 * 100.0, 0.0)).collect();
        let ids: Vec<ElementId> = elements.iter().map(Element::id).collect();
        for element in elements {
            engine.push(SceneCommand::add_element(element), &mut doc).unwrap();
        }
        let mut connector_ids = Vec::new();
        for pair in ids.windows(2) {
            let connector = generic(pair[0], pair[1]);
            connector_ids.push(connector.id());
            engine.push(SceneCommand::add_connector(connector), &mut doc).unwrap();
        }

        let targets = vec![connector_ids[2], connector_ids[0]];
        engine.push(SceneCommand::remove_connectors(targets), &mut doc).unwrap();
        assert_eq!(doc.content_connectors().len(), 1);

        engine.undo(&mut doc).unwrap();
        let restored: Vec<ConnectorId> = doc.content_connectors().iter().map(Connector::id).collect();
        assert_eq!(restored, connector_ids);
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let mut doc = SceneDocument::new();
        let mut engine = UndoEngine::new(50);
        let a = image(0.0, 0.0);
        let a_id = a.id();
        engine.push(SceneCommand::add_element(a), &mut doc).unwrap();

        let b = image(50.0, 0.0);
        let b_id = b.id();
        let batch = SceneCommand::batch(vec![
            SceneCommand::add_element(b),
            SceneCommand::add_connector(generic(a_id, b_id)),
            SceneCommand::add_connector(generic(b_id, a_id)),
        ]);
        assert_eq!(engine.push(batch, &mut doc), Err(SceneError::AlreadyConnected));
        assert_eq!(doc.ids(), &[a_id]);
        assert!(doc.content_connectors().is_empty());
        assert_eq!(engine.undo_depth(), 1);
        doc.check_consistency().unwrap();
    }
}
