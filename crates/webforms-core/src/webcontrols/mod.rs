//! Built-in controls
//!
//! Small set of HTML controls used by pages and tests: static text, labels,
//! inputs, buttons, containers, forms and the [`Repeater`] list control.

pub mod button;
pub mod form;
pub mod label;
pub mod literal;
pub mod panel;
pub mod repeater;
pub mod text_box;

use crate::control::{ControlId, ControlTree};
use crate::Result;

pub use button::Button;
pub use form::HtmlForm;
pub use label::Label;
pub use literal::Literal;
pub use panel::Panel;
pub use repeater::{ListItemType, Repeater, RepeaterItem};
pub use text_box::TextBox;

/// Handler for events that carry no argument
pub type EventCallback = Box<dyn FnMut(&mut ControlTree, ControlId) -> Result<()> + Send>;

/// Handler for postback events carrying the submitted argument
pub type CommandCallback =
    Box<dyn FnMut(&mut ControlTree, ControlId, &str) -> Result<()> + Send>;
