//! Minimal HTML output

use core::fmt;

/// Append-only markup buffer with attribute and text escaping
#[derive(Debug, Default, Clone)]
pub struct HtmlWriter {
    buffer: String,
}

impl HtmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<tag`
    pub fn begin_tag(&mut self, tag: &str) -> &mut Self {
        self.buffer.push('<');
        self.buffer.push_str(tag);
        self
    }

    /// ` name="value"`, with `value` escaped
    pub fn attribute(&mut self, name: &str, value: &str) -> &mut Self {
        self.buffer.push(' ');
        self.buffer.push_str(name);
        self.buffer.push_str("=\"");
        escape_into(value, &mut self.buffer);
        self.buffer.push('"');
        self
    }

    /// `>`
    pub fn close_start(&mut self) -> &mut Self {
        self.buffer.push('>');
        self
    }

    /// `</tag>`
    pub fn end_tag(&mut self, tag: &str) -> &mut Self {
        self.buffer.push_str("</");
        self.buffer.push_str(tag);
        self.buffer.push('>');
        self
    }

    /// Escaped text content
    pub fn text(&mut self, text: &str) -> &mut Self {
        escape_into(text, &mut self.buffer);
        self
    }

    /// Unescaped markup
    pub fn raw(&mut self, markup: &str) -> &mut Self {
        self.buffer.push_str(markup);
        self
    }

    /// `<input type="hidden" name=".." value="..">`
    pub fn hidden_field(&mut self, name: &str, value: &str) -> &mut Self {
        self.begin_tag("input")
            .attribute("type", "hidden")
            .attribute("name", name)
            .attribute("value", value)
            .close_start()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Display for HtmlWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buffer)
    }
}

/// Escape `&`, `<`, `>`, `"` and `'`
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, &mut out);
    out
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaping() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_hidden_field() {
        let mut writer = HtmlWriter::new();
        writer.hidden_field("__PAGESTATE", "ab+/=");
        assert_eq!(
            writer.as_str(),
            "<input type=\"hidden\" name=\"__PAGESTATE\" value=\"ab+/=\">"
        );
    }
}
