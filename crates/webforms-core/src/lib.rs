//! WebForms Core
//!
//! Server-rendered UI framework core: controls live in a tree that is rebuilt
//! on every request, and the state they declare survives round trips inside
//! an opaque, integrity-checked token embedded in the rendered page.
//!
//! The crate is split into the view state protocol ([`viewstate`]), the
//! control tree and its lifecycle ([`control`]), the per-request pipeline
//! ([`page`]) and a small set of built-in controls ([`webcontrols`]).

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod control;
pub mod errors;
pub mod html;
pub mod page;
pub mod viewstate;
pub mod webcontrols;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::ViewStateConfig;
pub use control::{
    Control, ControlId, ControlPool, ControlState, ControlTree, Poolable, PostBackDataHandler,
    PostBackEventHandler, PostBackLoadHandler, RenderContext, Template,
};
pub use errors::{FormatError, Result, ViewStateError, WebFormsError};
pub use html::HtmlWriter;
pub use page::{CancellationFlag, FormCollection, Page, PageBuilder, PageRequest, RequestMethod};
pub use viewstate::{
    CompressionKind, HasViewState, SerializerRegistry, TokenHeader, TypedSerializer,
    ViewStateManager, ViewStateReader, ViewStateWriter,
};
