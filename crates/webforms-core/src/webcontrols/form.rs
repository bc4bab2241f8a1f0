//! Server form

use crate::control::{Control, ControlId, ControlTree, RenderContext};
use crate::html::HtmlWriter;
use crate::page::{FORM_FIELD, FORM_STATE_FIELD, PAGE_STATE_FIELD};
use crate::webcontrols::EventCallback;
use crate::Result;

/// `<form method="post">` carrying its own state token
///
/// A page may hold several forms. Each one serializes only its own subtree
/// into `__FORMSTATE` and names itself in `__FORM`, so a postback restores
/// exactly the form that was submitted.
#[derive(Default)]
pub struct HtmlForm {
    submit: Option<EventCallback>,
}

impl HtmlForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` when this form is the submitted one
    pub fn with_submit<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut ControlTree, ControlId) -> Result<()> + Send + 'static,
    {
        self.submit = Some(Box::new(callback));
        self
    }
}

impl Control for HtmlForm {
    fn on_submit(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        match self.submit.as_mut() {
            Some(callback) => callback(tree, id),
            None => Ok(()),
        }
    }

    fn render(&self, ctx: &RenderContext<'_>, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        let unique_id = ctx.unique_id(id)?;
        out.begin_tag("form")
            .attribute("id", &unique_id)
            .attribute("method", "post")
            .close_start()
            .hidden_field(FORM_FIELD, &unique_id);

        ctx.render_children(id, out)?;

        if let Some(token) = ctx.page_state() {
            out.hidden_field(PAGE_STATE_FIELD, token);
        }
        if let Some(manager) = ctx.view_state() {
            let token = manager.serialize(ctx.tree(), id)?;
            out.hidden_field(FORM_STATE_FIELD, &token);
        }
        out.end_tag("form");
        Ok(())
    }

    fn is_form(&self) -> bool {
        true
    }
}

impl core::fmt::Debug for HtmlForm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HtmlForm")
            .field("submit", &self.submit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewStateConfig;
    use crate::viewstate::ViewStateManager;
    use crate::webcontrols::{Label, Panel};

    #[test]
    fn test_form_emits_identity_and_token() {
        let mut tree = ControlTree::new(Panel::new());
        let root = tree.root();
        let form = tree.append_with_id(root, "main", HtmlForm::new()).unwrap();
        tree.append(form, Label::new("hi")).unwrap();

        let manager = ViewStateManager::new(ViewStateConfig::testing()).unwrap();
        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, Some(&manager))
            .render_control(form, &mut out)
            .unwrap();

        let html = out.into_string();
        assert!(html.starts_with(
            "<form id=\"p$main\" method=\"post\"><input type=\"hidden\" name=\"__FORM\" value=\"p$main\">"
        ));
        assert!(html.contains("<span>hi</span>"));
        assert!(html.contains("name=\"__FORMSTATE\""));
        assert!(html.ends_with("</form>"));
        assert!(!html.contains("__PAGESTATE"));
    }

    #[test]
    fn test_form_carries_page_token() {
        let mut tree = ControlTree::new(Panel::new());
        let root = tree.root();
        let form = tree.append(root, HtmlForm::new()).unwrap();

        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .with_page_state("cGFnZQ==")
            .render_control(form, &mut out)
            .unwrap();
        assert!(out
            .as_str()
            .ends_with("<input type=\"hidden\" name=\"__PAGESTATE\" value=\"cGFnZQ==\"></form>"));
    }

    #[test]
    fn test_form_without_state_has_no_token() {
        let mut tree = ControlTree::new(Panel::new());
        let root = tree.root();
        let form = tree.append(root, HtmlForm::new()).unwrap();

        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .render_control(form, &mut out)
            .unwrap();
        assert!(!out.as_str().contains("__FORMSTATE"));
    }
}
