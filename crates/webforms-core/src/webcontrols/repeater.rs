//! Templated list control
//!
//! A [`Repeater`] builds one [`RepeaterItem`] per data item from its
//! templates. Only the number of items is persisted; on postback the
//! repeater recreates that many unbound items right after its own state is
//! restored, and the restore pass then fills them from the token.
//!
//! Child order mirrors creation order, `h, i0, f, s1, i1, s2, i2, ...`, so a
//! recreated list lines up with the state written for the original one.
//! After items were removed or swapped the repeater renames and reorders its
//! children during pre-render to restore that shape.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::trace;

use crate::control::{
    Control, ControlId, ControlTree, PostBackLoadHandler, RenderContext, Template,
};
use crate::html::HtmlWriter;
use crate::viewstate::{HasViewState, ViewStateReader, ViewStateWriter};
use crate::{Result, WebFormsError};

// ----------------------------------------------------------------------------
// Items
// ----------------------------------------------------------------------------

/// Role of a [`RepeaterItem`] within its repeater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListItemType {
    Header,
    Footer,
    Item,
    AlternatingItem,
    Separator,
}

/// Naming container holding one instantiated template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeaterItem {
    item_index: Option<usize>,
    item_type: ListItemType,
}

impl RepeaterItem {
    pub fn new(item_index: Option<usize>, item_type: ListItemType) -> Self {
        Self {
            item_index,
            item_type,
        }
    }

    /// Position among the data items; `None` for header, footer and separators
    pub fn item_index(&self) -> Option<usize> {
        self.item_index
    }

    pub fn item_type(&self) -> ListItemType {
        self.item_type
    }
}

impl Control for RepeaterItem {
    fn is_naming_container(&self) -> bool {
        true
    }
}

/// A data item and the separator rendered before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ItemSlot {
    item: ControlId,
    separator: Option<ControlId>,
}

/// Called for every created item, before it catches up with the repeater
pub type ItemCreatedCallback<T> =
    Box<dyn FnMut(&mut ControlTree, ControlId, Option<&T>) -> Result<()> + Send>;

/// Called after an item was created from a data item
pub type ItemDataBoundCallback<T> =
    Box<dyn FnMut(&mut ControlTree, ControlId, &T) -> Result<()> + Send>;

// ----------------------------------------------------------------------------
// Repeater
// ----------------------------------------------------------------------------

/// List control rendering a template per data item
pub struct Repeater<T> {
    header_template: Option<Arc<dyn Template>>,
    footer_template: Option<Arc<dyn Template>>,
    separator_template: Option<Arc<dyn Template>>,
    item_template: Option<Arc<dyn Template>>,
    alternating_item_template: Option<Arc<dyn Template>>,
    data_source: Vec<T>,
    items: Vec<ItemSlot>,
    header: Option<ControlId>,
    footer: Option<ControlId>,
    restored_count: usize,
    names_dirty: bool,
    item_created: Option<ItemCreatedCallback<T>>,
    item_data_bound: Option<ItemDataBoundCallback<T>>,
}

impl<T> Default for Repeater<T> {
    fn default() -> Self {
        Self {
            header_template: None,
            footer_template: None,
            separator_template: None,
            item_template: None,
            alternating_item_template: None,
            data_source: Vec::new(),
            items: Vec::new(),
            header: None,
            footer: None,
            restored_count: 0,
            names_dirty: false,
            item_created: None,
            item_data_bound: None,
        }
    }
}

impl<T: Send + 'static> Repeater<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Configuration ----

    pub fn with_header_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&mut ControlTree, ControlId) -> Result<()> + Send + Sync + 'static,
    {
        self.header_template = Some(Arc::new(template));
        self
    }

    pub fn with_footer_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&mut ControlTree, ControlId) -> Result<()> + Send + Sync + 'static,
    {
        self.footer_template = Some(Arc::new(template));
        self
    }

    pub fn with_separator_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&mut ControlTree, ControlId) -> Result<()> + Send + Sync + 'static,
    {
        self.separator_template = Some(Arc::new(template));
        self
    }

    pub fn with_item_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&mut ControlTree, ControlId) -> Result<()> + Send + Sync + 'static,
    {
        self.item_template = Some(Arc::new(template));
        self
    }

    /// Template for odd items; falls back to the item template
    pub fn with_alternating_item_template<F>(mut self, template: F) -> Self
    where
        F: Fn(&mut ControlTree, ControlId) -> Result<()> + Send + Sync + 'static,
    {
        self.alternating_item_template = Some(Arc::new(template));
        self
    }

    /// Share an existing template for the given item role
    pub fn set_template(&mut self, item_type: ListItemType, template: Arc<dyn Template>) {
        let slot = match item_type {
            ListItemType::Header => &mut self.header_template,
            ListItemType::Footer => &mut self.footer_template,
            ListItemType::Separator => &mut self.separator_template,
            ListItemType::Item => &mut self.item_template,
            ListItemType::AlternatingItem => &mut self.alternating_item_template,
        };
        *slot = Some(template);
    }

    pub fn with_data_source(mut self, data_source: Vec<T>) -> Self {
        self.data_source = data_source;
        self
    }

    pub fn set_data_source(&mut self, data_source: Vec<T>) {
        self.data_source = data_source;
    }

    pub fn on_item_created<F>(&mut self, callback: F)
    where
        F: FnMut(&mut ControlTree, ControlId, Option<&T>) -> Result<()> + Send + 'static,
    {
        self.item_created = Some(Box::new(callback));
    }

    pub fn on_item_data_bound<F>(&mut self, callback: F)
    where
        F: FnMut(&mut ControlTree, ControlId, &T) -> Result<()> + Send + 'static,
    {
        self.item_data_bound = Some(Box::new(callback));
    }

    // ---- Queries ----

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Item controls in display order
    pub fn items(&self) -> impl Iterator<Item = ControlId> + '_ {
        self.items.iter().map(|slot| slot.item)
    }

    pub fn item(&self, index: usize) -> Option<ControlId> {
        self.items.get(index).map(|slot| slot.item)
    }

    /// Separator rendered before the item at `index`
    pub fn separator(&self, index: usize) -> Option<ControlId> {
        self.items.get(index).and_then(|slot| slot.separator)
    }

    pub fn header(&self) -> Option<ControlId> {
        self.header
    }

    pub fn footer(&self) -> Option<ControlId> {
        self.footer
    }

    // ---- Operations ----

    /// Rebuild all items from the data source
    pub fn data_bind(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        self.clear(tree, id)?;

        let source = std::mem::take(&mut self.data_source);
        let result = source
            .iter()
            .try_for_each(|data| self.create_item(tree, id, Some(data)).map(|_| ()));
        self.data_source = source;

        trace!(repeater = %id, items = self.items.len(), "data bound");
        result
    }

    /// Append one item bound to `data`
    pub fn add(&mut self, tree: &mut ControlTree, id: ControlId, data: T) -> Result<ControlId> {
        self.create_item(tree, id, Some(&data))
    }

    /// Remove the item at `index` together with its separator
    ///
    /// When the first item goes, the new first item loses its separator so
    /// that no separator ever leads the list.
    pub fn remove_at(&mut self, tree: &mut ControlTree, id: ControlId, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }

        let slot = self.items.remove(index);
        tree.remove(slot.item)?;
        if let Some(separator) = slot.separator {
            tree.remove(separator)?;
        }

        if self.items.is_empty() {
            return self.clear(tree, id);
        }

        if index == 0 {
            if let Some(separator) = self.items[0].separator.take() {
                tree.remove(separator)?;
            }
        }
        self.names_dirty = true;
        Ok(())
    }

    /// Remove the given item control
    pub fn remove(&mut self, tree: &mut ControlTree, id: ControlId, item: ControlId) -> Result<()> {
        let index = self
            .items
            .iter()
            .position(|slot| slot.item == item)
            .ok_or_else(|| WebFormsError::control_not_found(item.to_string()))?;
        self.remove_at(tree, id, index)
    }

    /// Exchange the items at `first` and `second`
    ///
    /// Separators stay where they are; only the items change places.
    pub fn swap(&mut self, first: usize, second: usize) -> Result<()> {
        let len = self.items.len();
        if first >= len {
            return Err(out_of_range(first, len));
        }
        if second >= len {
            return Err(out_of_range(second, len));
        }
        if first == second {
            return Ok(());
        }

        let moved = self.items[first].item;
        self.items[first].item = self.items[second].item;
        self.items[second].item = moved;
        self.names_dirty = true;
        Ok(())
    }

    /// Remove every child and forget all items
    pub fn clear(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        for child in tree.children(id).to_vec() {
            tree.remove(child)?;
        }
        self.items.clear();
        self.header = None;
        self.footer = None;
        self.names_dirty = false;
        Ok(())
    }

    // ---- Item Creation ----

    fn create_item(
        &mut self,
        tree: &mut ControlTree,
        id: ControlId,
        data: Option<&T>,
    ) -> Result<ControlId> {
        if self.header.is_none() && self.header_template.is_some() {
            let header = self.create_part(tree, id, ListItemType::Header, None, "h", None)?;
            self.header = Some(header);
        }

        let index = self.items.len();
        let separator = if index > 0 && self.separator_template.is_some() {
            let control_id = format!("s{}", index);
            Some(self.create_part(tree, id, ListItemType::Separator, None, &control_id, None)?)
        } else {
            None
        };

        let item_type = if index % 2 == 0 {
            ListItemType::Item
        } else {
            ListItemType::AlternatingItem
        };
        let control_id = format!("i{}", index);
        let item = self.create_part(tree, id, item_type, Some(index), &control_id, data)?;
        self.items.push(ItemSlot { item, separator });

        if self.footer.is_none() && self.footer_template.is_some() {
            let footer = self.create_part(tree, id, ListItemType::Footer, None, "f", None)?;
            self.footer = Some(footer);
        }
        Ok(item)
    }

    /// Attach an item, fill it from its template, then let it catch up
    fn create_part(
        &mut self,
        tree: &mut ControlTree,
        id: ControlId,
        item_type: ListItemType,
        item_index: Option<usize>,
        control_id: &str,
        data: Option<&T>,
    ) -> Result<ControlId> {
        let item = tree.insert(RepeaterItem::new(item_index, item_type));
        tree.set_control_id(item, control_id)?;
        tree.add_child_without_events(id, item)?;

        if let Some(template) = self.template_for(item_type) {
            template.instantiate_in(tree, item)?;
        }
        if let Some(callback) = self.item_created.as_mut() {
            callback(tree, item, data)?;
        }

        tree.catch_up(item)?;

        if let (Some(data), Some(callback)) = (data, self.item_data_bound.as_mut()) {
            callback(tree, item, data)?;
        }
        Ok(item)
    }

    fn template_for(&self, item_type: ListItemType) -> Option<Arc<dyn Template>> {
        let template = match item_type {
            ListItemType::Header => &self.header_template,
            ListItemType::Footer => &self.footer_template,
            ListItemType::Separator => &self.separator_template,
            ListItemType::Item => &self.item_template,
            ListItemType::AlternatingItem => {
                if self.alternating_item_template.is_some() {
                    &self.alternating_item_template
                } else {
                    &self.item_template
                }
            }
        };
        template.clone()
    }

    /// Rename items to their positions and restore the creation order
    fn update_names(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        let mut order = Vec::with_capacity(tree.children(id).len());
        order.extend(self.header);

        for (index, slot) in self.items.iter().enumerate() {
            if let Some(separator) = slot.separator {
                tree.set_control_id(separator, &format!("s{}", index))?;
                order.push(separator);
            }
            tree.set_control_id(slot.item, &format!("i{}", index))?;
            if let Some(item) = tree.get_mut::<RepeaterItem>(slot.item) {
                item.item_index = Some(index);
            }
            order.push(slot.item);
            if index == 0 {
                order.extend(self.footer);
            }
        }

        let placed: HashSet<ControlId> = order.iter().copied().collect();
        order.extend(
            tree.children(id)
                .iter()
                .copied()
                .filter(|child| !placed.contains(child)),
        );
        tree.set_child_order(id, &order)?;

        self.names_dirty = false;
        trace!(repeater = %id, items = self.items.len(), "renamed items");
        Ok(())
    }
}

fn out_of_range(index: usize, len: usize) -> WebFormsError {
    WebFormsError::application(format!(
        "item index {} is out of range for {} items",
        index, len
    ))
}

// ----------------------------------------------------------------------------
// Control Integration
// ----------------------------------------------------------------------------

impl<T: Send + 'static> Control for Repeater<T> {
    fn on_pre_render(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        if self.names_dirty {
            self.update_names(tree, id)?;
        }
        Ok(())
    }

    fn render(&self, ctx: &RenderContext<'_>, _id: ControlId, out: &mut HtmlWriter) -> Result<()> {
        if let Some(header) = self.header {
            ctx.render_control(header, out)?;
        }
        for slot in &self.items {
            if let Some(separator) = slot.separator {
                ctx.render_control(separator, out)?;
            }
            ctx.render_control(slot.item, out)?;
        }
        if let Some(footer) = self.footer {
            ctx.render_control(footer, out)?;
        }
        Ok(())
    }

    fn view_state(&self) -> Option<&dyn HasViewState> {
        Some(self)
    }

    fn view_state_mut(&mut self) -> Option<&mut dyn HasViewState> {
        Some(self)
    }

    fn post_back_load_handler(&mut self) -> Option<&mut dyn PostBackLoadHandler> {
        Some(self)
    }

    fn is_naming_container(&self) -> bool {
        true
    }
}

impl<T> HasViewState for Repeater<T> {
    fn save_view_state(&self, writer: &mut ViewStateWriter<'_>) -> Result<()> {
        writer.write_value(&self.items.len(), &0usize)
    }

    fn load_view_state(&mut self, reader: &mut ViewStateReader<'_>) -> Result<()> {
        self.restored_count = reader.read_value(&0usize)?;
        Ok(())
    }
}

impl<T: Send + 'static> PostBackLoadHandler for Repeater<T> {
    fn after_post_back_load(&mut self, tree: &mut ControlTree, id: ControlId) -> Result<()> {
        let count = std::mem::take(&mut self.restored_count);
        if count == 0 {
            return Ok(());
        }

        self.clear(tree, id)?;
        for _ in 0..count {
            self.create_item(tree, id, None)?;
        }
        trace!(repeater = %id, items = count, "recreated items");
        Ok(())
    }
}

impl<T> core::fmt::Debug for Repeater<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Repeater")
            .field("items", &self.items)
            .field("header", &self.header)
            .field("footer", &self.footer)
            .field("names_dirty", &self.names_dirty)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
