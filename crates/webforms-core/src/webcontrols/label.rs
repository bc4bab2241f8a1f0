//! Text label

use crate::control::{Control, ControlId, Poolable, RenderContext};
use crate::html::HtmlWriter;
use crate::viewstate::HasViewState;
use crate::Result;

/// `<span>` with escaped text that survives postbacks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    text: String,
}

crate::view_state! {
    Label {
        text: String = String::new(),
    }
}

impl Label {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text<T: Into<String>>(&mut self, text: T) {
        self.text = text.into();
    }
}

impl Control for Label {
    fn render(&self, _ctx: &RenderContext<'_>, _id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        out.begin_tag("span").close_start().text(&self.text).end_tag("span");
        Ok(())
    }

    fn view_state(&self) -> Option<&dyn HasViewState> {
        Some(self)
    }

    fn view_state_mut(&mut self) -> Option<&mut dyn HasViewState> {
        Some(self)
    }
}

impl Poolable for Label {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlTree;

    #[test]
    fn test_label_escapes_text() {
        let tree = ControlTree::new(Label::new("a < b"));
        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .render_control(tree.root(), &mut out)
            .unwrap();
        assert_eq!(out.as_str(), "<span>a &lt; b</span>");
    }
}
