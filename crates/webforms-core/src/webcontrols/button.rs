//! Submit button

use crate::control::{
    Control, ControlId, ControlTree, Poolable, PostBackEventHandler, RenderContext,
};
use crate::html::HtmlWriter;
use crate::page::EVENT_TARGET_FIELD;
use crate::viewstate::HasViewState;
use crate::webcontrols::CommandCallback;
use crate::Result;

/// Submit button that names itself as the postback target
///
/// The browser posts `wfcTarget=<UniqueID>` for the pressed button; the page
/// then raises `click` with the value of `wfcArgument`.
#[derive(Default)]
pub struct Button {
    text: String,
    click: Option<CommandCallback>,
}

crate::view_state! {
    Button {
        text: String = String::new(),
    }
}

impl Button {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            click: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text<T: Into<String>>(&mut self, text: T) {
        self.text = text.into();
    }

    pub fn on_click<F>(&mut self, callback: F)
    where
        F: FnMut(&mut ControlTree, ControlId, &str) -> Result<()> + Send + 'static,
    {
        self.click = Some(Box::new(callback));
    }

    /// Builder-style [`on_click`](Self::on_click)
    pub fn with_click<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut ControlTree, ControlId, &str) -> Result<()> + Send + 'static,
    {
        self.on_click(callback);
        self
    }
}

impl Control for Button {
    fn render(&self, ctx: &RenderContext<'_>, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        let unique_id = ctx.unique_id(id)?;
        out.begin_tag("button")
            .attribute("type", "submit")
            .attribute("name", EVENT_TARGET_FIELD)
            .attribute("value", &unique_id)
            .close_start()
            .text(&self.text)
            .end_tag("button");
        Ok(())
    }

    fn view_state(&self) -> Option<&dyn HasViewState> {
        Some(self)
    }

    fn view_state_mut(&mut self) -> Option<&mut dyn HasViewState> {
        Some(self)
    }

    fn post_back_event_handler(&mut self) -> Option<&mut dyn PostBackEventHandler> {
        Some(self)
    }
}

impl PostBackEventHandler for Button {
    fn raise_post_back_event(
        &mut self,
        tree: &mut ControlTree,
        id: ControlId,
        argument: &str,
    ) -> Result<()> {
        match self.click.as_mut() {
            Some(callback) => callback(tree, id, argument),
            None => Ok(()),
        }
    }
}

impl Poolable for Button {}

impl core::fmt::Debug for Button {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Button")
            .field("text", &self.text)
            .field("click", &self.click.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webcontrols::{Label, Panel};

    #[test]
    fn test_click_receives_argument() {
        let mut tree = ControlTree::new(Panel::new());
        let root = tree.root();
        let label = tree.append(root, Label::default()).unwrap();
        let button = tree
            .append(
                root,
                Button::new("Go").with_click(move |tree, _, argument| {
                    if let Some(label) = tree.get_mut::<Label>(label) {
                        label.set_text(argument);
                    }
                    Ok(())
                }),
            )
            .unwrap();

        tree.with_behavior(button, |control, tree| {
            control
                .post_back_event_handler()
                .unwrap()
                .raise_post_back_event(tree, button, "42")
        })
        .unwrap();

        assert_eq!(tree.get::<Label>(label).unwrap().text(), "42");
    }

    #[test]
    fn test_renders_as_event_target() {
        let mut tree = ControlTree::new(Panel::new());
        let root = tree.root();
        tree.append_with_id(root, "save", Button::new("Save & close"))
            .unwrap();

        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .render_children(root, &mut out)
            .unwrap();
        assert_eq!(
            out.as_str(),
            "<button type=\"submit\" name=\"wfcTarget\" value=\"p$save\">Save &amp; close</button>"
        );
    }
}
