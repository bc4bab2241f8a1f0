//! Demo todo page
//!
//! A single form with a text box, an add button and a repeater of items,
//! each carrying its own remove button. Everything the page knows between
//! requests travels in its state tokens.

use webforms_core::page::{FORM_FIELD, FORM_STATE_FIELD, PAGE_STATE_FIELD};
use webforms_core::webcontrols::{
    Button, HtmlForm, Label, Literal, Panel, Repeater, RepeaterItem, TextBox,
};
use webforms_core::{ControlId, ControlTree, FormCollection, Page, Result, WebFormsError};

/// `UniqueID`s of the demo controls
pub mod ids {
    pub const FORM: &str = "p$todo";
    pub const TITLE: &str = "p$title";
    pub const ADD: &str = "p$add";
    pub const ITEMS: &str = "p$items";
    pub const COUNT: &str = "p$count";
}

/// Build the demo page; `initial` items are bound on the first request only
pub fn todo_page(initial: Vec<String>) -> Result<Page> {
    Page::builder()
        .with_template(build_controls)
        .on_load(move |tree, _| {
            if tree.is_post_back() {
                return Ok(());
            }
            let items = initial.clone();
            with_items(tree, move |list, tree, id| {
                list.set_data_source(items);
                list.data_bind(tree, id)
            })
        })
        .on_pre_render(|tree, _| {
            let count = with_items(tree, |list, _, _| Ok(list.item_count()))?;
            let label = find(tree, ids::COUNT)?;
            if let Some(label) = tree.get_mut::<Label>(label) {
                label.set_text(format!("{} item(s)", count));
            }
            Ok(())
        })
        .build()
}

fn build_controls(tree: &mut ControlTree, root: ControlId) -> Result<()> {
    let form = tree.append_with_id(root, "todo", HtmlForm::new())?;
    tree.append_with_id(form, "count", Label::default())?;

    let mut items = Repeater::<String>::new()
        .with_header_template(|tree, item| tree.append(item, Literal::new("<ul>")).map(|_| ()))
        .with_footer_template(|tree, item| tree.append(item, Literal::new("</ul>")).map(|_| ()))
        .with_item_template(|tree, item| {
            let row = tree.append(item, Panel::new().with_css_class("todo-item"))?;
            tree.append_with_id(row, "text", Label::default())?;
            tree.append_with_id(row, "remove", Button::new("Done").with_click(remove_item))?;
            Ok(())
        });
    items.on_item_data_bound(|tree, item, text: &String| {
        let label = tree
            .find_by_unique_id(&format!("{}$text", tree.unique_id(item)?))
            .ok_or_else(|| WebFormsError::control_not_found("item text"))?;
        if let Some(label) = tree.get_mut::<Label>(label) {
            label.set_text(text.clone());
        }
        Ok(())
    });
    tree.append_with_id(form, "items", items)?;

    tree.append_with_id(form, "title", TextBox::default())?;
    tree.append_with_id(form, "add", Button::new("Add").with_click(add_item))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Event Handlers
// ----------------------------------------------------------------------------

fn add_item(tree: &mut ControlTree, _button: ControlId, _argument: &str) -> Result<()> {
    let title = find(tree, ids::TITLE)?;
    let text = tree
        .get::<TextBox>(title)
        .map(|text_box| text_box.text().trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Ok(());
    }
    if let Some(text_box) = tree.get_mut::<TextBox>(title) {
        text_box.set_text("");
    }
    with_items(tree, |list, tree, id| list.add(tree, id, text).map(|_| ()))
}

/// Remove the item that contains the pressed button
fn remove_item(tree: &mut ControlTree, button: ControlId, _argument: &str) -> Result<()> {
    let mut cursor = tree.parent(button);
    let index = loop {
        match cursor {
            Some(id) => {
                if let Some(item) = tree.get::<RepeaterItem>(id) {
                    break item.item_index();
                }
                cursor = tree.parent(id);
            }
            None => break None,
        }
    };
    let index = index.ok_or_else(|| WebFormsError::application("button is not inside an item"))?;
    with_items(tree, |list, tree, id| list.remove_at(tree, id, index))
}

fn find(tree: &ControlTree, unique_id: &str) -> Result<ControlId> {
    tree.find_by_unique_id(unique_id)
        .ok_or_else(|| WebFormsError::control_not_found(unique_id))
}

fn with_items<R>(
    tree: &mut ControlTree,
    f: impl FnOnce(&mut Repeater<String>, &mut ControlTree, ControlId) -> Result<R>,
) -> Result<R> {
    let id = find(tree, ids::ITEMS)?;
    tree.with_control_mut::<Repeater<String>, _>(id, |list, tree| f(list, tree, id))
}

// ----------------------------------------------------------------------------
// Hidden Fields
// ----------------------------------------------------------------------------

/// Collect the hidden state fields of the first form on a rendered page, as
/// a browser would submit them
pub fn hidden_fields(html: &str) -> FormCollection {
    let mut form = FormCollection::new();
    let mut rest = first_form(html);
    while let Some(start) = rest.find("<input type=\"hidden\"") {
        rest = &rest[start..];
        let end = rest.find('>').unwrap_or(rest.len());
        let tag = &rest[..end];
        if let (Some(name), Some(value)) = (attribute(tag, "name"), attribute(tag, "value")) {
            if [PAGE_STATE_FIELD, FORM_FIELD, FORM_STATE_FIELD].contains(&name.as_str()) {
                form.insert(name, value);
            }
        }
        rest = &rest[end..];
    }
    form
}

/// Markup of the first `<form>`, or the whole page when there is none
fn first_form(html: &str) -> &str {
    let Some(start) = html.find("<form") else {
        return html;
    };
    let end = html[start..]
        .find("</form>")
        .map_or(html.len(), |end| start + end);
    &html[start..end]
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let marker = format!(" {}=\"", name);
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')? + start;
    Some(unescape(&tag[start..end]))
}

fn unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use webforms_core::page::EVENT_TARGET_FIELD;
    use webforms_core::{PageRequest, ViewStateConfig, ViewStateManager};

    fn render(page: &mut Page, manager: &ViewStateManager, form: Option<FormCollection>) -> String {
        let request = match form {
            Some(form) => PageRequest::post(form),
            None => PageRequest::get(),
        };
        page.process_request(&request, manager).unwrap();
        page.render(manager).unwrap()
    }

    #[test]
    fn test_hidden_fields_are_extracted() {
        let html = "<form><input type=\"hidden\" name=\"__FORM\" value=\"p$todo\">\
                    <input type=\"text\" name=\"p$title\" value=\"x\">\
                    <input type=\"hidden\" name=\"__FORMSTATE\" value=\"a&amp;b\"></form>";
        let form = hidden_fields(html);
        assert_eq!(form.get(FORM_FIELD), Some("p$todo"));
        assert_eq!(form.get(FORM_STATE_FIELD), Some("a&b"));
        assert_eq!(form.get("p$title"), None);
    }

    #[test]
    fn test_page_token_is_taken_from_the_form() {
        let html = "<input type=\"hidden\" name=\"__PAGESTATE\" value=\"outside\">\
                    <form><input type=\"hidden\" name=\"__PAGESTATE\" value=\"inside\"></form>";
        assert_eq!(hidden_fields(html).get(PAGE_STATE_FIELD), Some("inside"));
    }

    #[test]
    fn test_add_and_remove_round_trip() {
        let manager = ViewStateManager::new(ViewStateConfig::default()).unwrap();
        let mut page = todo_page(vec!["milk".into()]).unwrap();
        let html = render(&mut page, &manager, None);
        assert!(html.contains("<span>milk</span>"));
        assert!(html.contains("<span>1 item(s)</span>"));

        let form = hidden_fields(&html)
            .with(ids::TITLE, "eggs")
            .with(EVENT_TARGET_FIELD, ids::ADD);
        let mut page = todo_page(Vec::new()).unwrap();
        let html = render(&mut page, &manager, Some(form));
        assert!(html.contains("<span>eggs</span>"));
        assert!(html.contains("<span>2 item(s)</span>"));
        assert!(html.contains("name=\"p$title\" value=\"\""));

        let form = hidden_fields(&html).with(EVENT_TARGET_FIELD, "p$items$i0$remove");
        let mut page = todo_page(Vec::new()).unwrap();
        let html = render(&mut page, &manager, Some(form));
        assert!(!html.contains("<span>milk</span>"));
        assert!(html.contains("<span>eggs</span>"));
        assert!(html.contains("<span>1 item(s)</span>"));
    }
}
