//! Single-line text input

use crate::control::{
    Control, ControlId, ControlTree, Poolable, PostBackDataHandler, RenderContext,
};
use crate::html::HtmlWriter;
use crate::page::FormCollection;
use crate::viewstate::HasViewState;
use crate::webcontrols::EventCallback;
use crate::Result;

/// `<input type="text">` posting back under its `UniqueID`
///
/// The text is persisted so that a postback can tell whether the user edited
/// it; `text_changed` fires after every control has loaded.
#[derive(Default)]
pub struct TextBox {
    text: String,
    text_changed: Option<EventCallback>,
}

crate::view_state! {
    TextBox {
        text: String = String::new(),
    }
}

impl TextBox {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            text_changed: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text<T: Into<String>>(&mut self, text: T) {
        self.text = text.into();
    }

    pub fn on_text_changed<F>(&mut self, callback: F)
    where
        F: FnMut(&mut ControlTree, ControlId) -> Result<()> + Send + 'static,
    {
        self.text_changed = Some(Box::new(callback));
    }
}

impl Control for TextBox {
    fn render(&self, ctx: &RenderContext<'_>, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        let name = ctx.unique_id(id)?;
        out.begin_tag("input")
            .attribute("type", "text")
            .attribute("name", &name)
            .attribute("value", &self.text)
            .close_start();
        Ok(())
    }

    fn view_state(&self) -> Option<&dyn HasViewState> {
        Some(self)
    }

    fn view_state_mut(&mut self) -> Option<&mut dyn HasViewState> {
        Some(self)
    }

    fn post_back_data_handler(&mut self) -> Option<&mut dyn PostBackDataHandler> {
        Some(self)
    }
}

impl PostBackDataHandler for TextBox {
    fn load_post_data(&mut self, post_data_key: &str, form: &FormCollection) -> Result<bool> {
        match form.get(post_data_key) {
            Some(posted) if posted != self.text => {
                self.text = posted.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn raise_post_data_changed_event(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        match self.text_changed.as_mut() {
            Some(callback) => callback(tree, id),
            None => Ok(()),
        }
    }
}

impl Poolable for TextBox {}

impl core::fmt::Debug for TextBox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TextBox")
            .field("text", &self.text)
            .field("text_changed", &self.text_changed.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlTree;
    use crate::webcontrols::Panel;

    #[test]
    fn test_posted_value_reports_change_once() {
        let mut text_box = TextBox::new("old");
        let form = FormCollection::new().with("p$c0", "new");

        assert!(text_box.load_post_data("p$c0", &form).unwrap());
        assert_eq!(text_box.text(), "new");
        assert!(!text_box.load_post_data("p$c0", &form).unwrap());
    }

    #[test]
    fn test_missing_key_is_not_a_change() {
        let mut text_box = TextBox::new("kept");
        assert!(!text_box
            .load_post_data("p$c0", &FormCollection::new())
            .unwrap());
        assert_eq!(text_box.text(), "kept");
    }

    #[test]
    fn test_renders_unique_id_as_name() {
        let mut tree = ControlTree::new(Panel::new());
        let root = tree.root();
        tree.append_with_id(root, "title", TextBox::new("x\"y"))
            .unwrap();

        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .render_children(root, &mut out)
            .unwrap();
        assert_eq!(
            out.as_str(),
            "<input type=\"text\" name=\"p$title\" value=\"x&quot;y\">"
        );
    }

    #[test]
    fn test_reset_drops_handler() {
        let mut text_box = TextBox::new("a");
        text_box.on_text_changed(|_, _| Ok(()));
        text_box.reset();
        assert_eq!(text_box.text(), "");
        assert!(text_box.text_changed.is_none());
    }
}
