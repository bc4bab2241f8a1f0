//! Control tree arena
//!
//! Controls live in a slot arena indexed by [`ControlId`]. Slots are never
//! reused within a tree, so an id held across a mutation either still refers
//! to the same control or to nothing.
//!
//! Structure (parent, children, `ID`, naming) and lifecycle state are kept on
//! the node; the behavior object is checked out of its slot while one of its
//! hooks runs. This lets hooks mutate the tree through `&mut ControlTree`
//! without aliasing themselves.

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;

use crate::control::lifecycle::ControlState;
use crate::control::pool::{ControlPool, Poolable};
use crate::control::{type_mismatch, Control};
use crate::{Result, WebFormsError};

/// `ID` of the page root and first segment of every `UniqueID`
pub const PAGE_ID: &str = "p";

/// Separator between naming container segments of a `UniqueID`
pub const ID_SEPARATOR: char = '$';

// ----------------------------------------------------------------------------
// Control Id
// ----------------------------------------------------------------------------

/// Handle to a control within one [`ControlTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlId(u32);

impl ControlId {
    fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Node
// ----------------------------------------------------------------------------

struct Node {
    id: Option<String>,
    parent: Option<ControlId>,
    children: SmallVec<[ControlId; 4]>,
    state: ControlState,
    enable_view_state: bool,
    behavior: Option<Box<dyn Control>>,
    type_name: &'static str,
    naming_container: bool,
    is_form: bool,
    pooled: bool,
    next_generated_id: u32,
}

/// Disposal requested while the control's own hook was running
#[derive(Debug, Clone, Copy)]
struct PendingDisposal {
    initialized: bool,
    pooled: bool,
}

// ----------------------------------------------------------------------------
// Control Tree
// ----------------------------------------------------------------------------

/// Arena holding one request's controls
pub struct ControlTree {
    nodes: Vec<Option<Node>>,
    root: ControlId,
    post_back: bool,
    restoring: bool,
    enable_view_state_default: bool,
    pool: Option<Arc<ControlPool>>,
    pending_disposals: HashMap<ControlId, PendingDisposal>,
}

impl ControlTree {
    /// Create a tree whose root is `root`, named [`PAGE_ID`] and acting as
    /// the outermost naming container
    pub fn new<C: Control>(root: C) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: ControlId(0),
            post_back: false,
            restoring: false,
            enable_view_state_default: true,
            pool: None,
            pending_disposals: HashMap::new(),
        };
        let root = tree.insert(root);
        if let Some(node) = tree.slot_mut(root) {
            node.id = Some(PAGE_ID.to_string());
            node.naming_container = true;
        }
        tree.root = root;
        tree
    }

    pub fn root(&self) -> ControlId {
        self.root
    }

    pub fn is_post_back(&self) -> bool {
        self.post_back
    }

    pub fn set_post_back(&mut self, post_back: bool) {
        self.post_back = post_back;
    }

    /// Whether a view state restore pass is running
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub(crate) fn set_restoring(&mut self, restoring: bool) {
        self.restoring = restoring;
    }

    /// `EnableViewState` given to controls inserted from now on
    pub fn set_enable_view_state_default(&mut self, enabled: bool) {
        self.enable_view_state_default = enabled;
    }

    pub fn set_pool(&mut self, pool: Arc<ControlPool>) {
        self.pool = Some(pool);
    }

    pub fn pool(&self) -> Option<&Arc<ControlPool>> {
        self.pool.as_ref()
    }

    /// Number of live controls, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---- Creation ----

    /// Add a detached control in the `Constructed` state
    pub fn insert<C: Control>(&mut self, control: C) -> ControlId {
        self.insert_boxed(Box::new(control))
    }

    /// Add a detached, already boxed control
    pub fn insert_boxed(&mut self, control: Box<dyn Control>) -> ControlId {
        let id = ControlId(self.nodes.len() as u32);
        let node = Node {
            id: None,
            parent: None,
            children: SmallVec::new(),
            state: ControlState::Constructed,
            enable_view_state: self.enable_view_state_default,
            type_name: (*control).type_name(),
            naming_container: control.is_naming_container(),
            is_form: control.is_form(),
            pooled: false,
            next_generated_id: 0,
            behavior: Some(control),
        };
        self.nodes.push(Some(node));
        id
    }

    /// Add a detached control taken from the tree's [`ControlPool`]
    ///
    /// Without a pool this is `insert(C::default())`.
    pub fn acquire<C: Poolable>(&mut self) -> ControlId {
        match self.pool.clone() {
            Some(pool) => {
                let control: Box<dyn Control> = pool.acquire::<C>();
                let id = self.insert_boxed(control);
                if let Some(node) = self.slot_mut(id) {
                    node.pooled = true;
                }
                id
            }
            None => self.insert(C::default()),
        }
    }

    /// Insert `control` and attach it as the last child of `parent`
    pub fn append<C: Control>(&mut self, parent: ControlId, control: C) -> Result<ControlId> {
        let id = self.insert(control);
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Insert `control` with an author-assigned `ID` and attach it
    pub fn append_with_id<C: Control>(
        &mut self,
        parent: ControlId,
        control_id: &str,
        control: C,
    ) -> Result<ControlId> {
        let id = self.insert(control);
        self.set_control_id(id, control_id)?;
        self.add_child(parent, id)?;
        Ok(id)
    }

    // ---- Structure ----

    /// Attach `child` and catch it up to the parent's lifecycle state
    ///
    /// While a restore pass runs, late-added controls only reach
    /// `Initialized`; the restore pass takes them from there.
    pub fn add_child(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        self.attach(parent, child)?;
        self.catch_up(child)
    }

    /// Bring an attached `child` up to its parent's lifecycle state
    ///
    /// Pairs with [`add_child_without_events`](Self::add_child_without_events)
    /// for containers that fill a child before it sees any hook.
    pub fn catch_up(&mut self, child: ControlId) -> Result<()> {
        let parent = self.node(child)?.parent.ok_or_else(|| {
            WebFormsError::application(format!("control {} is not attached", child))
        })?;

        let mut target = self.state(parent)?.min(ControlState::Rendered);
        if self.restoring {
            target = target.min(ControlState::Initialized);
        }
        if target > ControlState::Constructed {
            self.advance_subtree(child, target)?;
        }
        Ok(())
    }

    /// Attach `child` without running any lifecycle hooks
    pub fn add_child_without_events(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        self.attach(parent, child)
    }

    fn attach(&mut self, parent: ControlId, child: ControlId) -> Result<()> {
        if child == self.root {
            return Err(WebFormsError::application("the root control cannot be a child"));
        }
        if self.node(child)?.parent.is_some() {
            return Err(WebFormsError::application(format!(
                "control {} already has a parent",
                child
            )));
        }
        let mut cursor = Some(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(WebFormsError::application(format!(
                    "control {} cannot be attached below itself",
                    child
                )));
            }
            cursor = self.node(ancestor)?.parent;
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);

        if self.node(child)?.id.is_none() {
            let container = self.naming_container_of(parent);
            let node = self.node_mut(container)?;
            let generated = format!("c{}", node.next_generated_id);
            node.next_generated_id += 1;
            self.node_mut(child)?.id = Some(generated);
        }
        Ok(())
    }

    /// Remove `id` and its subtree, disposing every control in it
    pub fn remove(&mut self, id: ControlId) -> Result<()> {
        if id == self.root {
            return Err(WebFormsError::application("the root control cannot be removed"));
        }

        if let Some(parent) = self.node(id)?.parent {
            if let Some(parent) = self.slot_mut(parent) {
                parent.children.retain(|child| *child != id);
            }
            self.node_mut(id)?.parent = None;
        }

        let subtree = self.descendants_and_self(id);
        self.advance_subtree(id, ControlState::Disposed)?;
        for control in subtree {
            if let Some(slot) = self.nodes.get_mut(control.index()) {
                *slot = None;
            }
        }
        trace!(control = %id, "removed control subtree");
        Ok(())
    }

    /// Replace the child order of `parent` with a permutation of its children
    pub fn set_child_order(&mut self, parent: ControlId, order: &[ControlId]) -> Result<()> {
        let node = self.node_mut(parent)?;
        let mut current: Vec<ControlId> = node.children.to_vec();
        let mut proposed: Vec<ControlId> = order.to_vec();
        current.sort_unstable();
        proposed.sort_unstable();
        if current != proposed {
            return Err(WebFormsError::application(format!(
                "new child order of {} is not a permutation of its children",
                parent
            )));
        }
        node.children = order.iter().copied().collect();
        Ok(())
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.slot(id).is_some()
    }

    pub fn parent(&self, id: ControlId) -> Option<ControlId> {
        self.slot(id).and_then(|node| node.parent)
    }

    /// Children in order; empty for unknown ids
    pub fn children(&self, id: ControlId) -> &[ControlId] {
        self.slot(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// `id` and all of its descendants in depth-first pre-order
    pub fn descendants_and_self(&self, id: ControlId) -> Vec<ControlId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.slot(current) {
                result.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        result
    }

    /// All form controls attached below the root, in tree order
    pub fn forms(&self) -> Vec<ControlId> {
        self.descendants_and_self(self.root)
            .into_iter()
            .filter(|id| self.is_form(*id))
            .collect()
    }

    // ---- Node Properties ----

    pub fn state(&self, id: ControlId) -> Result<ControlState> {
        Ok(self.node(id)?.state)
    }

    /// Author-assigned or generated `ID`
    pub fn control_id(&self, id: ControlId) -> Option<&str> {
        self.slot(id).and_then(|node| node.id.as_deref())
    }

    pub fn set_control_id(&mut self, id: ControlId, control_id: &str) -> Result<()> {
        if control_id.is_empty() || control_id.contains(ID_SEPARATOR) {
            return Err(WebFormsError::application(format!(
                "invalid control ID {:?}",
                control_id
            )));
        }
        self.node_mut(id)?.id = Some(control_id.to_string());
        Ok(())
    }

    pub fn enable_view_state(&self, id: ControlId) -> bool {
        self.slot(id).map(|node| node.enable_view_state).unwrap_or(false)
    }

    pub fn set_enable_view_state(&mut self, id: ControlId, enabled: bool) -> Result<()> {
        self.node_mut(id)?.enable_view_state = enabled;
        Ok(())
    }

    pub fn is_form(&self, id: ControlId) -> bool {
        self.slot(id).map(|node| node.is_form).unwrap_or(false)
    }

    pub fn is_naming_container(&self, id: ControlId) -> bool {
        self.slot(id).map(|node| node.naming_container).unwrap_or(false)
    }

    pub fn type_name(&self, id: ControlId) -> Option<&'static str> {
        self.slot(id).map(|node| node.type_name)
    }

    // ---- Naming ----

    fn naming_container_of(&self, id: ControlId) -> ControlId {
        let mut cursor = id;
        loop {
            match self.slot(cursor) {
                Some(node) if node.naming_container => return cursor,
                Some(Node {
                    parent: Some(parent),
                    ..
                }) => cursor = *parent,
                _ => return cursor,
            }
        }
    }

    /// Naming container `ID`s from the root down to `id`, joined with `$`
    pub fn unique_id(&self, id: ControlId) -> Result<String> {
        let node = self.node(id)?;
        let mut segments = vec![node.id.as_deref().unwrap_or_default()];

        let mut cursor = node.parent;
        while let Some(ancestor) = cursor {
            let ancestor = self.node(ancestor)?;
            if ancestor.naming_container {
                segments.push(ancestor.id.as_deref().unwrap_or_default());
            }
            cursor = ancestor.parent;
        }

        segments.reverse();
        Ok(segments.join("$"))
    }

    /// Resolve a `UniqueID` produced by [`unique_id`](Self::unique_id)
    pub fn find_by_unique_id(&self, unique_id: &str) -> Option<ControlId> {
        let mut segments = unique_id.split(ID_SEPARATOR);
        let root = self.slot(self.root)?;
        if segments.next()? != root.id.as_deref()? {
            return None;
        }

        let mut scope = self.root;
        let mut segments = segments.peekable();
        while let Some(segment) = segments.next() {
            if !self.is_naming_container(scope) {
                return None;
            }
            scope = self.find_in_naming_scope(scope, segment)?;
            if segments.peek().is_none() {
                return Some(scope);
            }
        }
        Some(scope)
    }

    fn find_in_naming_scope(&self, container: ControlId, control_id: &str) -> Option<ControlId> {
        let mut stack: Vec<ControlId> = self.children(container).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let node = self.slot(current)?;
            if node.id.as_deref() == Some(control_id) {
                return Some(current);
            }
            if !node.naming_container {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        None
    }

    // ---- Behavior Access ----

    /// Shared access to the behavior of `id`
    pub fn control(&self, id: ControlId) -> Result<&dyn Control> {
        self.node(id)?
            .behavior
            .as_deref()
            .ok_or_else(|| WebFormsError::ControlBusy {
                control: id.to_string(),
            })
    }

    /// Typed shared access
    pub fn get<T: Control>(&self, id: ControlId) -> Option<&T> {
        self.slot(id)?
            .behavior
            .as_deref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Typed mutable access, for mutations that need no tree access
    pub fn get_mut<T: Control>(&mut self, id: ControlId) -> Option<&mut T> {
        self.slot_mut(id)?
            .behavior
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Check the behavior of `id` out of its slot and run `f` with the tree
    pub fn with_behavior<R>(
        &mut self,
        id: ControlId,
        f: impl FnOnce(&mut dyn Control, &mut ControlTree) -> Result<R>,
    ) -> Result<R> {
        let mut behavior = self
            .node_mut(id)?
            .behavior
            .take()
            .ok_or_else(|| WebFormsError::ControlBusy {
                control: id.to_string(),
            })?;

        let result = f(&mut *behavior, self);

        // The hook may have disposed or removed its own control
        if let Some(pending) = self.pending_disposals.remove(&id) {
            self.finish_disposal(id, behavior, pending);
        } else if let Some(node) = self.slot_mut(id) {
            node.behavior = Some(behavior);
        }
        result
    }

    /// Typed variant of [`with_behavior`](Self::with_behavior)
    pub fn with_control_mut<T: Control, R>(
        &mut self,
        id: ControlId,
        f: impl FnOnce(&mut T, &mut ControlTree) -> Result<R>,
    ) -> Result<R> {
        self.with_behavior(id, |control, tree| {
            let control = control
                .as_any_mut()
                .downcast_mut::<T>()
                .ok_or_else(|| type_mismatch::<T>(id))?;
            f(control, tree)
        })
    }

    // ---- Lifecycle ----

    /// Perform a single validated transition of `id`, running its hook
    pub fn transition(&mut self, id: ControlId, target: ControlState) -> Result<()> {
        let current = self.state(id)?;
        if current == ControlState::Disposed && target == ControlState::Disposed {
            return Ok(());
        }
        current.validate_transition(target)?;

        match target {
            ControlState::Initialized => self.with_behavior(id, |c, tree| c.on_init(tree, id))?,
            ControlState::Loaded => self.with_behavior(id, |c, tree| c.on_load(tree, id))?,
            ControlState::PreRendered => {
                self.with_behavior(id, |c, tree| c.on_pre_render(tree, id))?
            }
            ControlState::Disposed => self.dispose_node(id, current)?,
            ControlState::Constructed | ControlState::StateRestored | ControlState::Rendered => {}
        }

        if let Some(node) = self.slot_mut(id) {
            node.state = target;
        }
        trace!(control = %id, from = %current, to = %target, "control transition");
        Ok(())
    }

    fn dispose_node(&mut self, id: ControlId, current: ControlState) -> Result<()> {
        let node = self.node_mut(id)?;
        let pending = PendingDisposal {
            initialized: current.is_initialized(),
            pooled: node.pooled,
        };

        match node.behavior.take() {
            Some(behavior) => self.finish_disposal(id, behavior, pending),
            // Checked out by a running hook; `with_behavior` finishes the job
            None => {
                self.pending_disposals.insert(id, pending);
            }
        }
        Ok(())
    }

    /// Run `on_dispose` and hand pooled behaviors back to the pool
    fn finish_disposal(
        &mut self,
        id: ControlId,
        mut behavior: Box<dyn Control>,
        pending: PendingDisposal,
    ) {
        if pending.initialized {
            behavior.on_dispose();
        }

        match self.pool.clone() {
            Some(pool) if pending.pooled => pool.release(behavior),
            _ => {
                if let Some(node) = self.slot_mut(id) {
                    node.behavior = Some(behavior);
                }
            }
        }
    }

    /// Step `id` forward until it reaches `target`
    ///
    /// Controls already at or past `target` are left alone. `Disposed` is
    /// reached directly from any state.
    pub fn advance(&mut self, id: ControlId, target: ControlState) -> Result<()> {
        if target == ControlState::Disposed {
            return self.transition(id, target);
        }

        loop {
            if !self.contains(id) {
                return Ok(());
            }
            let current = self.state(id)?;
            if current >= target {
                return Ok(());
            }
            match current.next() {
                Some(next) => self.transition(id, next)?,
                None => return Ok(()),
            }
        }
    }

    /// Advance `root` and its subtree in depth-first pre-order
    ///
    /// Children are read after the parent's hook has run, so controls created
    /// by that hook are visited as well.
    pub fn advance_subtree(&mut self, root: ControlId, target: ControlState) -> Result<()> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            self.advance(id, target)?;
            stack.extend(self.children(id).iter().rev().copied());
        }
        Ok(())
    }

    // ---- Slots ----

    fn slot(&self, id: ControlId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: ControlId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn node(&self, id: ControlId) -> Result<&Node> {
        self.slot(id)
            .ok_or_else(|| WebFormsError::control_not_found(id.to_string()))
    }

    fn node_mut(&mut self, id: ControlId) -> Result<&mut Node> {
        self.slot_mut(id)
            .ok_or_else(|| WebFormsError::control_not_found(id.to_string()))
    }
}

impl fmt::Debug for ControlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlTree")
            .field("controls", &self.len())
            .field("root", &self.root)
            .field("post_back", &self.post_back)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
