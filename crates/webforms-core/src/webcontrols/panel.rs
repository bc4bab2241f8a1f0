//! Generic container

use crate::control::{Control, ControlId, Poolable, RenderContext};
use crate::html::HtmlWriter;
use crate::Result;

/// `<div>` around its children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Panel {
    css_class: Option<String>,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_css_class<T: Into<String>>(mut self, css_class: T) -> Self {
        self.css_class = Some(css_class.into());
        self
    }
}

impl Control for Panel {
    fn render(&self, ctx: &RenderContext<'_>, id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        out.begin_tag("div");
        if let Some(css_class) = &self.css_class {
            out.attribute("class", css_class);
        }
        out.close_start();
        ctx.render_children(id, out)?;
        out.end_tag("div");
        Ok(())
    }
}

impl Poolable for Panel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlTree;
    use crate::webcontrols::Literal;

    #[test]
    fn test_panel_wraps_children() {
        let mut tree = ControlTree::new(Panel::new().with_css_class("box"));
        let root = tree.root();
        tree.append(root, Literal::new("a")).unwrap();
        tree.append(root, Literal::new("b")).unwrap();

        let mut out = HtmlWriter::new();
        RenderContext::new(&tree, None)
            .render_control(root, &mut out)
            .unwrap();
        assert_eq!(out.as_str(), "<div class=\"box\">ab</div>");
    }
}
