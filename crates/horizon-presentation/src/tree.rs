//! The element tree dependency objects are digested and inherit through.
//!
//! The value engine only needs two questions answered about the tree: who is
//! an object's parent, and who are its children. Those are the
//! [`TreeWalker`] trait. The default walker reads the per-thread
//! [`ElementTree`], an arena of nodes keyed by [`ElementId`] in which every
//! [`DependencyObject`] is registered on creation.
//!
//! The tree does not own objects. A node holds a weak handle to its object
//! and is removed when the object drops; its children become roots.

use slotmap::{new_key_type, SlotMap};

use crate::error::{PresentationError, Result};
use crate::foundation::PresentationFoundation;
use crate::logging::targets;
use crate::object::{DependencyObject, WeakDependencyObject};

new_key_type! {
    /// Identifies an object's node in the element tree.
    pub struct ElementId;
}

/// Parent and child navigation over dependency objects.
pub trait TreeWalker {
    /// The object's parent, if any.
    fn parent(&self, object: &DependencyObject) -> Option<DependencyObject>;

    /// Call `f` for each of the object's children, in order.
    fn for_each_child(&self, object: &DependencyObject, f: &mut dyn FnMut(&DependencyObject));
}

struct ElementNode {
    object: WeakDependencyObject,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// Arena-backed parent/child relationships between dependency objects.
#[derive(Default)]
pub struct ElementTree {
    nodes: SlotMap<ElementId, ElementNode>,
}

impl ElementTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, object: WeakDependencyObject) -> ElementId {
        self.nodes.insert(ElementNode {
            object,
            parent: None,
            children: Vec::new(),
        })
    }

    /// Remove a node. Its children become roots.
    pub(crate) fn remove(&mut self, id: ElementId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|parent| self.nodes.get_mut(parent)) {
            parent.children.retain(|&child| child != id);
        }
        for child in node.children {
            if let Some(child) = self.nodes.get_mut(child) {
                child.parent = None;
            }
        }
    }

    /// Returns `true` if the node exists.
    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Move `id` under `new_parent`, or make it a root.
    pub fn set_parent(&mut self, id: ElementId, new_parent: Option<ElementId>) -> Result<()> {
        if !self.nodes.contains_key(id) {
            return Ok(());
        }
        if let Some(parent) = new_parent {
            if self.is_ancestor_of(id, parent) {
                return Err(PresentationError::CircularParentage);
            }
        }

        let new_parent = new_parent.filter(|&parent| self.nodes.contains_key(parent));
        let old_parent = self.nodes.get(id).and_then(|node| node.parent);
        if let Some(old) = old_parent.and_then(|old| self.nodes.get_mut(old)) {
            old.children.retain(|&child| child != id);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = new_parent;
        }
        if let Some(parent) = new_parent.and_then(|parent| self.nodes.get_mut(parent)) {
            parent.children.push(id);
        }
        tracing::trace!(target: targets::CORE, ?id, ?new_parent, "reparented element");
        Ok(())
    }

    fn is_ancestor_of(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes.get(node).and_then(|node| node.parent);
        }
        false
    }

    /// The parent node.
    pub fn parent_id(&self, id: ElementId) -> Option<ElementId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    /// The child nodes.
    pub fn child_ids(&self, id: ElementId) -> &[ElementId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// The object registered at `id`, if it is still alive.
    pub fn object(&self, id: ElementId) -> Option<DependencyObject> {
        self.nodes.get(id).and_then(|node| node.object.upgrade())
    }

    /// The parent object.
    pub fn parent(&self, id: ElementId) -> Option<DependencyObject> {
        self.parent_id(id).and_then(|parent| self.object(parent))
    }

    /// The live child objects.
    pub fn children(&self, id: ElementId) -> Vec<DependencyObject> {
        self.child_ids(id)
            .iter()
            .filter_map(|&child| self.object(child))
            .collect()
    }

    /// The ancestors from the parent up to the root.
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut current = self.parent_id(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent_id(node);
        }
        result
    }

    /// The subtree rooted at `id` in depth-first pre-order.
    pub fn depth_first_preorder(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        if self.nodes.contains_key(id) {
            self.preorder_recursive(id, &mut result);
        }
        result
    }

    fn preorder_recursive(&self, id: ElementId, result: &mut Vec<ElementId>) {
        result.push(id);
        for &child in self.child_ids(id) {
            self.preorder_recursive(child, result);
        }
    }
}

/// The walker over the per-thread [`ElementTree`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementTreeWalker;

impl TreeWalker for ElementTreeWalker {
    fn parent(&self, object: &DependencyObject) -> Option<DependencyObject> {
        PresentationFoundation::with_element_tree(|tree| tree.parent(object.element_id()))
    }

    fn for_each_child(&self, object: &DependencyObject, f: &mut dyn FnMut(&DependencyObject)) {
        let children =
            PresentationFoundation::with_element_tree(|tree| tree.children(object.element_id()));
        for child in &children {
            f(child);
        }
    }
}
