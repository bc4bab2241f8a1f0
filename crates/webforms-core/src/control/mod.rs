//! Server controls
//!
//! A control is a behavior object stored in a [`ControlTree`] arena. The tree
//! owns structure and lifecycle bookkeeping (parent, children, `ID`, state),
//! while the [`Control`] trait carries hooks and optional capabilities. The
//! engine only ever asks a control for a capability; it never inspects
//! concrete types.

pub mod lifecycle;
pub mod pool;
pub mod tree;

use core::any::Any;

use crate::html::HtmlWriter;
use crate::page::FormCollection;
use crate::viewstate::{HasViewState, ViewStateManager};
use crate::{Result, WebFormsError};

pub use lifecycle::{ControlState, StateTransitionError};
pub use pool::{ControlPool, Poolable};
pub use tree::{ControlId, ControlTree};

// ----------------------------------------------------------------------------
// Dynamic Typing Support
// ----------------------------------------------------------------------------

/// Upcast to [`Any`] for typed access to controls stored as trait objects
///
/// Call these on `&dyn Control`, never on `Box<dyn Control>`: the box is an
/// `Any` itself and would answer for its own type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }
}

// ----------------------------------------------------------------------------
// Control Trait
// ----------------------------------------------------------------------------

/// Behavior of a node in the control tree
///
/// Hooks receive the tree and their own [`ControlId`]. While a hook runs the
/// control is checked out of its slot, so the hook may freely add or remove
/// other controls, including its own children.
pub trait Control: AsAny + Send {
    fn on_init(&mut self, _tree: &mut ControlTree, _id: ControlId) -> Result<()> {
        Ok(())
    }

    fn on_load(&mut self, _tree: &mut ControlTree, _id: ControlId) -> Result<()> {
        Ok(())
    }

    fn on_pre_render(&mut self, _tree: &mut ControlTree, _id: ControlId) -> Result<()> {
        Ok(())
    }

    /// Runs on the submitted form after change events were raised
    fn on_submit(&mut self, _tree: &mut ControlTree, _id: ControlId) -> Result<()> {
        Ok(())
    }

    /// Release resources; only called for controls that were initialized
    fn on_dispose(&mut self) {}

    /// Emit markup. The default renders the children in order.
    fn render(&self, ctx: &RenderContext<'_>, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        ctx.render_children(id, out)
    }

    fn view_state(&self) -> Option<&dyn HasViewState> {
        None
    }

    fn view_state_mut(&mut self) -> Option<&mut dyn HasViewState> {
        None
    }

    fn post_back_data_handler(&mut self) -> Option<&mut dyn PostBackDataHandler> {
        None
    }

    fn post_back_event_handler(&mut self) -> Option<&mut dyn PostBackEventHandler> {
        None
    }

    fn post_back_load_handler(&mut self) -> Option<&mut dyn PostBackLoadHandler> {
        None
    }

    /// Whether this control starts a new `UniqueID` scope
    fn is_naming_container(&self) -> bool {
        false
    }

    /// Whether this control is a form with its own state token
    fn is_form(&self) -> bool {
        false
    }
}

impl core::fmt::Debug for dyn Control {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.type_name())
    }
}

// ----------------------------------------------------------------------------
// Capabilities
// ----------------------------------------------------------------------------

/// Input controls that adopt submitted form values
pub trait PostBackDataHandler {
    /// Adopt the value posted under `post_data_key`, returning whether it
    /// differs from the restored state
    fn load_post_data(&mut self, post_data_key: &str, form: &FormCollection) -> Result<bool>;

    /// Raise the change notification after all controls are loaded
    fn raise_post_data_changed_event(&mut self, tree: &mut ControlTree, id: ControlId)
        -> Result<()>;
}

/// Controls that can be the target of a postback
pub trait PostBackEventHandler {
    fn raise_post_back_event(
        &mut self,
        tree: &mut ControlTree,
        id: ControlId,
        argument: &str,
    ) -> Result<()>;
}

/// Controls that rebuild children right after their state was restored
///
/// The restore pass runs this before it schedules the control's children, so
/// controls created here are restored in the same pass.
pub trait PostBackLoadHandler {
    fn after_post_back_load(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Templates
// ----------------------------------------------------------------------------

/// Builds a fixed set of controls into a container
pub trait Template: Send + Sync {
    fn instantiate_in(&self, tree: &mut ControlTree, container: ControlId) -> Result<()>;
}

impl<F> Template for F
where
    F: Fn(&mut ControlTree, ControlId) -> Result<()> + Send + Sync,
{
    fn instantiate_in(&self, tree: &mut ControlTree, container: ControlId) -> Result<()> {
        self(tree, container)
    }
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// Read-only view of the tree handed to [`Control::render`]
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    tree: &'a ControlTree,
    view_state: Option<&'a ViewStateManager>,
    page_state: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    pub fn new(tree: &'a ControlTree, view_state: Option<&'a ViewStateManager>) -> Self {
        Self {
            tree,
            view_state,
            page_state: None,
        }
    }

    /// Context whose forms also carry the page-scope `token`
    pub fn with_page_state<'b>(&self, token: &'b str) -> RenderContext<'b>
    where
        'a: 'b,
    {
        RenderContext {
            tree: self.tree,
            view_state: self.view_state,
            page_state: Some(token),
        }
    }

    /// Page-scope token every form posts back alongside its own
    pub fn page_state(&self) -> Option<&'a str> {
        self.page_state
    }

    pub fn tree(&self) -> &'a ControlTree {
        self.tree
    }

    /// Manager used to emit state tokens; `None` when state is disabled
    pub fn view_state(&self) -> Option<&'a ViewStateManager> {
        self.view_state.filter(|manager| manager.config().enabled)
    }

    /// Render one control
    pub fn render_control(&self, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        let control = self.tree.control(id)?;
        control.render(self, id, out)
    }

    /// Render all children of `id` in order
    pub fn render_children(&self, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        for &child in self.tree.children(id) {
            self.render_control(child, out)?;
        }
        Ok(())
    }

    /// `UniqueID` of `id`, used for `name` attributes
    pub fn unique_id(&self, id: ControlId) -> Result<String> {
        self.tree.unique_id(id)
    }
}

/// Build a type mismatch error for `id`
pub(crate) fn type_mismatch<T>(id: ControlId) -> WebFormsError {
    WebFormsError::TypeMismatch {
        control: id.to_string(),
        expected: core::any::type_name::<T>(),
    }
}
