//! Raw markup

use crate::control::{Control, ControlId, Poolable, RenderContext};
use crate::html::HtmlWriter;
use crate::Result;

/// Emits its text verbatim; nothing is persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Literal {
    text: String,
}

impl Literal {
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

impl Control for Literal {
    fn render(&self, _ctx: &RenderContext<'_>, _id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        out.raw(&self.text);
        Ok(())
    }
}

impl Poolable for Literal {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlTree;

    #[test]
    fn test_literal_is_not_escaped() {
        let mut tree = ControlTree::new(Literal::new("<b>bold</b>"));
        let root = tree.root();
        tree.append(root, Literal::new(" & more")).unwrap();

        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .render_control(root, &mut out)
            .unwrap();
        assert_eq!(out.as_str(), "<b>bold</b>");
    }
}
