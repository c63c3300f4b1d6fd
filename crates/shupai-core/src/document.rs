//! Scene document: the element arena, the parent/child hierarchy and the
//! connectors that mirror it.
//!
//! The document owns every element. Parent links are ids, children are a
//! derived query, and each parent link has exactly one hierarchy connector.
//! The raw mutators here keep those invariants but do no undo bookkeeping;
//! structural edits from outside the crate go through
//! [`SceneCommand`](crate::SceneCommand)s.

use crate::connector::{Connector, ConnectorId, ConnectorKind, DEFAULT_LINE_WIDTH, curve_between};
use crate::elements::{AnchorRef, Element, ElementId};
use crate::error::{SceneError, SceneResult};
use kurbo::{CubicBez, Point, Rect};
use std::collections::{HashMap, HashSet};

/// Elements and connectors of one scene.
#[derive(Debug, Clone)]
pub struct SceneDocument {
    elements: HashMap<ElementId, Element>,
    /// Insertion order.
    order: Vec<ElementId>,
    hierarchy: Vec<Connector>,
    content: Vec<Connector>,
    /// Stroke width for new hierarchy connectors.
    pub hierarchy_line_width: f64,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDocument {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            order: Vec::new(),
            hierarchy: Vec::new(),
            content: Vec::new(),
            hierarchy_line_width: DEFAULT_LINE_WIDTH,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    /// Element ids in insertion order.
    pub fn ids(&self) -> &[ElementId] {
        &self.order
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.order.iter().position(|&e| e == id)
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.elements()
            .filter(|e| e.parent() == Some(id))
            .map(Element::id)
            .collect()
    }

    /// Parent-less elements, in insertion order.
    pub fn roots(&self) -> Vec<ElementId> {
        self.elements()
            .filter(|e| e.parent().is_none())
            .map(Element::id)
            .collect()
    }

    /// All descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if out.contains(&next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    /// `id` followed by its descendants in pre-order.
    pub fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = vec![id];
        out.extend(self.descendants(id));
        out
    }

    /// Every element, parents before children: roots in insertion order,
    /// each followed by its subtree.
    pub fn pre_order(&self) -> Vec<ElementId> {
        self.roots()
            .into_iter()
            .flat_map(|root| self.subtree(root))
            .collect()
    }

    /// Pre-order with siblings sorted by z, which is the paint order.
    pub fn paint_order(&self) -> Vec<ElementId> {
        let mut out = Vec::with_capacity(self.len());
        let mut roots = self.roots();
        self.sort_by_z(&mut roots);
        let mut stack: Vec<ElementId> = roots.into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            let mut children = self.children(next);
            self.sort_by_z(&mut children);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    fn sort_by_z(&self, ids: &mut [ElementId]) {
        let z = |id: &ElementId| self.get(*id).map_or(0.0, Element::z);
        ids.sort_by(|a, b| z(a).total_cmp(&z(b)));
    }

    /// Whether `candidate` is `ancestor` or lies below it.
    pub fn is_descendant(&self, candidate: ElementId, ancestor: ElementId) -> bool {
        let mut current = Some(candidate);
        // Bounded so a corrupt cycle cannot loop forever.
        for _ in 0..=self.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.get(id).and_then(Element::parent),
                None => return false,
            }
        }
        false
    }

    /// Position in scene coordinates, accumulated through the parent chain.
    pub fn scene_position(&self, id: ElementId) -> Option<Point> {
        let mut element = self.get(id)?;
        let mut pos = element.position();
        for _ in 0..self.len() {
            match element.parent() {
                Some(parent) => {
                    element = self.get(parent)?;
                    pos += element.position().to_vec2();
                }
                None => return Some(pos),
            }
        }
        None
    }

    /// Bounding box in scene coordinates.
    pub fn scene_bounds(&self, id: ElementId) -> Option<Rect> {
        let origin = self.scene_position(id)?;
        let size = self.get(id)?.size();
        Some(Rect::from_origin_size(origin, size))
    }

    /// Scene position of an anchor.
    pub fn anchor_position(&self, anchor: AnchorRef) -> Option<Point> {
        let origin = self.scene_position(anchor.element)?;
        let size = self.get(anchor.element)?.size();
        Some(origin + anchor.kind.local_position(size).to_vec2())
    }

    /// Where content connectors attach: the primary anchor, or the center
    /// for elements without one.
    pub fn connection_point(&self, id: ElementId) -> Option<Point> {
        match self.get(id)?.primary_anchor() {
            Some(kind) => self.anchor_position(AnchorRef::new(id, kind)),
            None => self.scene_bounds(id).map(|r| r.center()),
        }
    }

    pub fn hierarchy_connectors(&self) -> &[Connector] {
        &self.hierarchy
    }

    pub fn content_connectors(&self) -> &[Connector] {
        &self.content
    }

    pub fn content_connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.content.iter().find(|c| c.id == id)
    }

    /// Content connector joining `a` and `b` in either direction.
    pub fn find_content_connector(&self, a: ElementId, b: ElementId) -> Option<&Connector> {
        self.content.iter().find(|c| c.joins(a, b))
    }

    /// Content connectors touching `id`.
    pub fn content_connectors_of(&self, id: ElementId) -> Vec<ConnectorId> {
        self.content
            .iter()
            .filter(|c| c.involves(id))
            .map(Connector::id)
            .collect()
    }

    // --- Raw mutation --------------------------------------------------

    /// Insert an element at `index` in insertion order (clamped).
    ///
    /// The element's parent, if any, must already be present.
    pub(crate) fn insert_element(&mut self, element: Element, index: usize) -> SceneResult<()> {
        let id = element.id();
        if self.contains(id) {
            return Err(SceneError::Consistency(format!("duplicate element {id}")));
        }
        let parent = element.parent();
        if let Some(missing) = parent.filter(|p| !self.contains(*p)) {
            return Err(SceneError::ElementNotFound(missing));
        }

        let index = index.min(self.order.len());
        self.order.insert(index, id);
        self.elements.insert(id, element);
        if let Some(parent) = parent {
            self.link(parent, id);
        }
        self.refresh_connectors_for(id);
        Ok(())
    }

    /// Remove a leaf element with no content connectors.
    ///
    /// Returns the element and its former index.
    pub(crate) fn remove_element(&mut self, id: ElementId) -> SceneResult<(Element, usize)> {
        let index = self.index_of(id).ok_or(SceneError::ElementNotFound(id))?;
        if self.elements().any(|e| e.parent() == Some(id)) {
            return Err(SceneError::Consistency(format!(
                "element {id} still has children"
            )));
        }
        if self.content.iter().any(|c| c.involves(id)) {
            return Err(SceneError::Consistency(format!(
                "element {id} still has content connectors"
            )));
        }

        self.order.remove(index);
        self.hierarchy.retain(|c| c.item2 != id);
        let element = self
            .elements
            .remove(&id)
            .ok_or(SceneError::ElementNotFound(id))?;
        Ok((element, index))
    }

    /// Rewrite the parent link and local position of `id`.
    pub(crate) fn set_parent_link(
        &mut self,
        id: ElementId,
        parent: Option<ElementId>,
        position: Point,
    ) -> SceneResult<()> {
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(SceneError::ElementNotFound(parent));
            }
            if self.is_descendant(parent, id) {
                return Err(SceneError::CyclicParent { child: id, parent });
            }
        }
        let element = self.get_mut(id).ok_or(SceneError::ElementNotFound(id))?;
        element.set_parent_link(parent);
        element.set_position(position);

        self.hierarchy.retain(|c| c.item2 != id);
        if let Some(parent) = parent {
            self.link(parent, id);
        }
        self.refresh_connectors_for(id);
        Ok(())
    }

    fn link(&mut self, parent: ElementId, child: ElementId) {
        let connector = Connector::new(ConnectorKind::Hierarchy, parent, child)
            .with_line_width(self.hierarchy_line_width);
        self.hierarchy.push(connector);
    }

    /// Insert a content connector at `index` (clamped).
    pub(crate) fn insert_connector(&mut self, connector: Connector, index: usize) -> SceneResult<()> {
        if !connector.kind.is_content() {
            return Err(SceneError::Consistency(
                "hierarchy connectors follow parent links".to_string(),
            ));
        }
        for end in [connector.item1, connector.item2] {
            if !self.contains(end) {
                return Err(SceneError::ElementNotFound(end));
            }
        }
        if self.content.iter().any(|c| c.id == connector.id) {
            return Err(SceneError::Consistency(format!(
                "duplicate connector {}",
                connector.id
            )));
        }

        let id = connector.id;
        let index = index.min(self.content.len());
        self.content.insert(index, connector);
        self.refresh_connectors_where(|c| c.id == id);
        Ok(())
    }

    /// Remove a content connector, returning it and its former index.
    pub(crate) fn remove_connector(&mut self, id: ConnectorId) -> SceneResult<(Connector, usize)> {
        let index = self
            .content
            .iter()
            .position(|c| c.id == id)
            .ok_or(SceneError::ConnectorNotFound(id))?;
        Ok((self.content.remove(index), index))
    }

    /// Recompute the curves of every connector touching `id` or any of its
    /// descendants.
    pub fn refresh_connectors_for(&mut self, id: ElementId) {
        let affected: HashSet<ElementId> = self.subtree(id).into_iter().collect();
        self.refresh_connectors_where(|c| affected.contains(&c.item1) || affected.contains(&c.item2));
    }

    pub fn refresh_all_connectors(&mut self) {
        self.refresh_connectors_where(|_| true);
    }

    fn refresh_connectors_where(&mut self, affected: impl Fn(&Connector) -> bool) {
        let hierarchy: Vec<(usize, CubicBez)> = self
            .hierarchy
            .iter()
            .enumerate()
            .filter(|(_, c)| affected(c))
            .filter_map(|(i, c)| self.curve_for(c).map(|curve| (i, curve)))
            .collect();
        let content: Vec<(usize, CubicBez)> = self
            .content
            .iter()
            .enumerate()
            .filter(|(_, c)| affected(c))
            .filter_map(|(i, c)| self.curve_for(c).map(|curve| (i, curve)))
            .collect();

        for (i, curve) in hierarchy {
            self.hierarchy[i].curve = curve;
        }
        for (i, curve) in content {
            self.content[i].curve = curve;
        }
    }

    fn curve_for(&self, connector: &Connector) -> Option<CubicBez> {
        let (from, to) = match connector.kind {
            ConnectorKind::Hierarchy => {
                let parent = self.scene_bounds(connector.item1)?;
                let child = self.scene_bounds(connector.item2)?;
                (
                    Point::new(parent.center().x, parent.y1),
                    Point::new(child.center().x, child.y0),
                )
            }
            _ => (
                self.connection_point(connector.item1)?,
                self.connection_point(connector.item2)?,
            ),
        };
        Some(curve_between(connector.kind, from, to))
    }

    /// Remove everything.
    pub(crate) fn clear(&mut self) {
        self.elements.clear();
        self.order.clear();
        self.hierarchy.clear();
        self.content.clear();
    }

    /// Verify the structural invariants.
    pub fn check_consistency(&self) -> SceneResult<()> {
        let fail = |msg: String| Err(SceneError::Consistency(msg));

        if self.order.len() != self.elements.len()
            || self.order.iter().any(|id| !self.elements.contains_key(id))
        {
            return fail("element order out of sync with the arena".to_string());
        }

        let mut linked = 0;
        for element in self.elements() {
            let id = element.id();
            let Some(parent) = element.parent() else {
                continue;
            };
            linked += 1;
            if !self.contains(parent) {
                return fail(format!("element {id} has missing parent {parent}"));
            }
            if self.scene_position(id).is_none() {
                return fail(format!("parent chain of {id} has a cycle"));
            }
            let mirrors = self
                .hierarchy
                .iter()
                .filter(|c| c.item1 == parent && c.item2 == id)
                .count();
            if mirrors != 1 {
                return fail(format!("link {parent} -> {id} has {mirrors} hierarchy connectors"));
            }
        }
        if self.hierarchy.len() != linked {
            return fail("stale hierarchy connectors".to_string());
        }

        for connector in &self.content {
            if !self.contains(connector.item1) || !self.contains(connector.item2) {
                return fail(format!("connector {} has a missing endpoint", connector.id));
            }
            if connector.item1 == connector.item2 {
                return fail(format!("connector {} is a self link", connector.id));
            }
        }
        Ok(())
    }
}
