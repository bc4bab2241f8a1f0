//! Page lifecycle
//!
//! A [`Page`] owns the control tree of one request and drives it through the
//! pipeline:
//!
//! init → load state → post data → load → postback event → change events →
//! form submit → pre-render → render → dispose
//!
//! State is split into one page-scope token and one token per form. On a
//! postback only the submitted form survives; all other forms are removed
//! before their controls are loaded.

pub mod request;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ViewStateConfig;
use crate::control::{
    Control, ControlId, ControlPool, ControlState, ControlTree, RenderContext, Template,
};
use crate::errors::ViewStateError;
use crate::html::HtmlWriter;
use crate::viewstate::{DecodedState, ViewStateManager};
use crate::{Result, WebFormsError};

pub use request::{
    CancellationFlag, FormCollection, PageRequest, RequestMethod, EVENT_ARGUMENT_FIELD,
    EVENT_TARGET_FIELD, FORM_FIELD, FORM_STATE_FIELD, PAGE_STATE_FIELD,
};

/// Page-level lifecycle callback
pub type PageCallback = Box<dyn FnMut(&mut ControlTree, ControlId) -> Result<()> + Send>;

// ----------------------------------------------------------------------------
// Page Root Control
// ----------------------------------------------------------------------------

/// Behavior of the tree root: page callbacks and the page-scope token
struct PageRoot {
    on_init: Option<PageCallback>,
    on_load: Option<PageCallback>,
    on_pre_render: Option<PageCallback>,
}

impl Control for PageRoot {
    fn on_init(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        match self.on_init.as_mut() {
            Some(callback) => callback(tree, id),
            None => Ok(()),
        }
    }

    fn on_load(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        match self.on_load.as_mut() {
            Some(callback) => callback(tree, id),
            None => Ok(()),
        }
    }

    fn on_pre_render(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        match self.on_pre_render.as_mut() {
            Some(callback) => callback(tree, id),
            None => Ok(()),
        }
    }

    /// Forms write the page-scope token inside their own markup so that
    /// whichever form is submitted posts it back
    fn render(&self, ctx: &RenderContext<'_>, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        let token = match ctx.view_state() {
            Some(manager) if ctx.tree().enable_view_state(id) => {
                Some(manager.serialize(ctx.tree(), id)?)
            }
            _ => None,
        };

        match token.as_deref() {
            Some(token) => ctx.with_page_state(token).render_children(id, out),
            None => ctx.render_children(id, out),
        }
    }

    fn is_naming_container(&self) -> bool {
        true
    }
}

// ----------------------------------------------------------------------------
// Page Builder
// ----------------------------------------------------------------------------

/// Builder for a [`Page`]
#[derive(Default)]
pub struct PageBuilder {
    template: Option<Arc<dyn Template>>,
    on_init: Option<PageCallback>,
    on_load: Option<PageCallback>,
    on_pre_render: Option<PageCallback>,
    enable_view_state: Option<bool>,
    enable_view_state_default: Option<bool>,
    pool: Option<Arc<ControlPool>>,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls built into the page before initialization
    pub fn with_template<T: Template + 'static>(mut self, template: T) -> Self {
        self.template = Some(Arc::new(template));
        self
    }

    /// Share an already wrapped template
    pub fn with_shared_template(mut self, template: Arc<dyn Template>) -> Self {
        self.template = Some(template);
        self
    }

    pub fn on_init<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut ControlTree, ControlId) -> Result<()> + Send + 'static,
    {
        self.on_init = Some(Box::new(callback));
        self
    }

    pub fn on_load<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut ControlTree, ControlId) -> Result<()> + Send + 'static,
    {
        self.on_load = Some(Box::new(callback));
        self
    }

    pub fn on_pre_render<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut ControlTree, ControlId) -> Result<()> + Send + 'static,
    {
        self.on_pre_render = Some(Box::new(callback));
        self
    }

    /// Whether the page writes its own page-scope token
    pub fn enable_view_state(mut self, enabled: bool) -> Self {
        self.enable_view_state = Some(enabled);
        self
    }

    /// Take the `EnableViewState` default for new controls from `config`
    pub fn with_config(mut self, config: &ViewStateConfig) -> Self {
        self.enable_view_state_default = Some(config.enable_view_state_default);
        self
    }

    /// Draw pooled controls from `pool` and return them on disposal
    pub fn with_control_pool(mut self, pool: Arc<ControlPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Build the tree and instantiate the template into it
    pub fn build(self) -> Result<Page> {
        let mut tree = ControlTree::new(PageRoot {
            on_init: self.on_init,
            on_load: self.on_load,
            on_pre_render: self.on_pre_render,
        });
        let root = tree.root();

        if let Some(enabled) = self.enable_view_state_default {
            tree.set_enable_view_state_default(enabled);
        }
        tree.set_enable_view_state(root, self.enable_view_state.unwrap_or(true))?;
        if let Some(pool) = self.pool {
            tree.set_pool(pool);
        }

        let mut page = Page {
            tree,
            active_form: None,
            disposed: false,
        };
        if let Some(template) = self.template {
            template.instantiate_in(&mut page.tree, root)?;
        }
        Ok(page)
    }
}

// ----------------------------------------------------------------------------
// Page
// ----------------------------------------------------------------------------

/// Root of one request's control tree
pub struct Page {
    tree: ControlTree,
    active_form: Option<ControlId>,
    disposed: bool,
}

impl Page {
    pub fn builder() -> PageBuilder {
        PageBuilder::new()
    }

    pub fn tree(&self) -> &ControlTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ControlTree {
        &mut self.tree
    }

    pub fn root(&self) -> ControlId {
        self.tree.root()
    }

    pub fn is_post_back(&self) -> bool {
        self.tree.is_post_back()
    }

    /// Form whose state was submitted with this request
    pub fn active_form(&self) -> Option<ControlId> {
        self.active_form
    }

    /// Run the pipeline up to and including pre-render
    ///
    /// A cancelled request disposes the page before returning
    /// [`WebFormsError::Cancelled`].
    pub fn process_request(
        &mut self,
        request: &PageRequest,
        manager: &ViewStateManager,
    ) -> Result<()> {
        let result = self.run_pipeline(request, manager);
        if matches!(result, Err(WebFormsError::Cancelled)) {
            debug!("request cancelled, disposing page");
            self.dispose()?;
        }
        result
    }

    fn run_pipeline(&mut self, request: &PageRequest, manager: &ViewStateManager) -> Result<()> {
        let root = self.tree.root();
        self.tree.set_post_back(request.is_post_back());

        request.check_cancelled()?;
        self.tree.advance_subtree(root, ControlState::Initialized)?;

        request.check_cancelled()?;
        let active_form = self.load_view_state(request, manager)?;
        self.active_form = active_form;
        if self.tree.is_post_back() {
            self.remove_inactive_forms(active_form)?;
        }
        self.tree.advance_subtree(root, ControlState::StateRestored)?;

        request.check_cancelled()?;
        let changed = match active_form {
            Some(form) if self.tree.is_post_back() => self.load_post_data(form, request.form())?,
            _ => Vec::new(),
        };

        request.check_cancelled()?;
        self.tree.advance_subtree(root, ControlState::Loaded)?;

        if self.tree.is_post_back() {
            request.check_cancelled()?;
            self.raise_post_back_event(request.form())?;

            request.check_cancelled()?;
            self.raise_changed_events(&changed)?;

            if let Some(form) = active_form.filter(|form| self.tree.contains(*form)) {
                request.check_cancelled()?;
                self.tree
                    .with_behavior(form, |control, tree| control.on_submit(tree, form))?;
            }
        }

        request.check_cancelled()?;
        self.tree.advance_subtree(root, ControlState::PreRendered)
    }

    // ---- View State ----

    fn load_view_state(
        &mut self,
        request: &PageRequest,
        manager: &ViewStateManager,
    ) -> Result<Option<ControlId>> {
        if !manager.config().enabled || !self.tree.is_post_back() {
            return Ok(None);
        }

        let values = request.form();
        let root = self.tree.root();
        let form = match (values.get(FORM_FIELD), values.get(FORM_STATE_FIELD)) {
            (Some(unique_id), Some(_)) => self
                .tree
                .find_by_unique_id(unique_id)
                .filter(|id| self.tree.is_form(*id)),
            _ => None,
        };

        let (page_state, form_state) = match decode_tokens(manager, values, form.is_some()) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(%error, "view state rejected, treating request as fresh");
                self.tree.set_post_back(false);
                return Ok(None);
            }
        };

        if let Some(state) = page_state {
            manager.restore_into(&mut self.tree, root, &state)?;
        }
        if let (Some(form), Some(state)) = (form, form_state) {
            manager.restore_into(&mut self.tree, form, &state)?;
        }
        Ok(form)
    }

    fn remove_inactive_forms(&mut self, active_form: Option<ControlId>) -> Result<()> {
        for form in self.tree.forms() {
            if Some(form) != active_form && self.tree.contains(form) {
                debug!(form = %form, "removing inactive form");
                self.tree.remove(form)?;
            }
        }
        Ok(())
    }

    // ---- Postback ----

    /// Offer submitted values to the data handlers of the active form,
    /// returning the controls that reported a change in registration order
    fn load_post_data(&mut self, form: ControlId, values: &FormCollection) -> Result<Vec<ControlId>> {
        let mut changed = Vec::new();
        for id in self.tree.descendants_and_self(form) {
            if !self.tree.contains(id) {
                continue;
            }
            let key = self.tree.unique_id(id)?;
            if !values.contains_key(&key) {
                continue;
            }
            let is_changed = self.tree.with_behavior(id, |control, _| {
                match control.post_back_data_handler() {
                    Some(handler) => handler.load_post_data(&key, values),
                    None => Ok(false),
                }
            })?;
            if is_changed {
                changed.push(id);
            }
        }
        Ok(changed)
    }

    fn raise_post_back_event(&mut self, values: &FormCollection) -> Result<()> {
        let Some(target) = values.get(EVENT_TARGET_FIELD) else {
            return Ok(());
        };
        let argument = values.get(EVENT_ARGUMENT_FIELD).unwrap_or_default();

        let Some(id) = self.tree.find_by_unique_id(target) else {
            debug!(unique_id = target, "postback target not found");
            return Ok(());
        };

        self.tree.with_behavior(id, |control, tree| {
            match control.post_back_event_handler() {
                Some(handler) => handler.raise_post_back_event(tree, id, argument),
                None => {
                    debug!(unique_id = target, "postback target does not handle events");
                    Ok(())
                }
            }
        })
    }

    fn raise_changed_events(&mut self, changed: &[ControlId]) -> Result<()> {
        for &id in changed {
            if !self.tree.contains(id) {
                continue;
            }
            self.tree.with_behavior(id, |control, tree| {
                match control.post_back_data_handler() {
                    Some(handler) => handler.raise_post_data_changed_event(tree, id),
                    None => Ok(()),
                }
            })?;
        }
        Ok(())
    }

    // ---- Output ----

    /// Emit markup for the pre-rendered tree, including state tokens
    pub fn render(&mut self, manager: &ViewStateManager) -> Result<String> {
        let root = self.tree.root();
        self.tree
            .state(root)?
            .validate_transition(ControlState::Rendered)?;

        let mut out = HtmlWriter::new();
        RenderContext::new(&self.tree, Some(manager)).render_control(root, &mut out)?;
        self.tree.advance_subtree(root, ControlState::Rendered)?;
        Ok(out.into_string())
    }

    /// Dispose every control; safe to call more than once
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        let root = self.tree.root();
        self.tree.advance_subtree(root, ControlState::Disposed)
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            warn!(%error, "page disposal failed");
        }
    }
}

impl core::fmt::Debug for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Page")
            .field("tree", &self.tree)
            .field("active_form", &self.active_form)
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Decode both tokens before touching the tree so that a bad form token
/// leaves the page scope untouched as well
fn decode_tokens(
    manager: &ViewStateManager,
    values: &FormCollection,
    with_form: bool,
) -> core::result::Result<(Option<DecodedState>, Option<DecodedState>), ViewStateError> {
    let page_state = values
        .get(PAGE_STATE_FIELD)
        .map(|token| manager.deserialize(token))
        .transpose()?;

    let form_state = match values.get(FORM_STATE_FIELD) {
        Some(token) if with_form && !token.is_empty() => Some(manager.deserialize(token)?),
        _ => None,
    };

    Ok((page_state, form_state))
}
