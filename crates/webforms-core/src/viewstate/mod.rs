//! View state persistence
//!
//! Control state survives between requests inside an opaque token carried by
//! the page. Each control of a scope appends its declared fields to a shared
//! [`ViewStateWriter`]; the [`ViewStateManager`] compresses, hashes and
//! base64-encodes the result, and replays it into a freshly built tree on
//! postback.

pub mod builtin;
pub mod compression;
pub mod integrity;
pub mod manager;
pub mod pool;
pub mod reader;
pub mod serializer;
pub mod token;
pub mod writer;

pub use builtin::PrimitiveSerializer;
pub use compression::CompressionKind;
pub use integrity::StateHasher;
pub use manager::{DecodedState, ViewStateManager};
pub use pool::{BufferPool, PooledBuffer};
pub use reader::ViewStateReader;
pub use serializer::{SerializerRegistry, TypedSerializer, ViewStateSerializer};
pub use token::{TokenHeader, HASH_LENGTH, HEADER_LENGTH, PAYLOAD_OFFSET};
pub use writer::ViewStateWriter;

use crate::Result;

/// Controls that persist declared fields in view state
///
/// Implementations write and read the same fields in the same order and
/// consume exactly what they wrote; there is no per-control length prefix.
/// The [`view_state!`](crate::view_state) macro generates both halves from a
/// field list.
pub trait HasViewState {
    fn save_view_state(&self, writer: &mut ViewStateWriter<'_>) -> Result<()>;

    fn load_view_state(&mut self, reader: &mut ViewStateReader<'_>) -> Result<()>;
}

/// Implement [`HasViewState`] for a control from its persisted fields
///
/// ```ignore
/// view_state! {
///     TextBox {
///         text: String = String::new(),
///         max_length: i32 = 0,
///     }
/// }
/// ```
#[macro_export]
macro_rules! view_state {
    ($control:ty { $($field:ident : $ty:ty = $default:expr),* $(,)? }) => {
        impl $crate::viewstate::HasViewState for $control {
            #[allow(unused_variables)]
            fn save_view_state(
                &self,
                writer: &mut $crate::viewstate::ViewStateWriter<'_>,
            ) -> $crate::Result<()> {
                $(
                    {
                        let default: $ty = $default;
                        writer.write_value::<$ty>(&self.$field, &default)?;
                    }
                )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn load_view_state(
                &mut self,
                reader: &mut $crate::viewstate::ViewStateReader<'_>,
            ) -> $crate::Result<()> {
                $(
                    {
                        let default: $ty = $default;
                        self.$field = reader.read_value::<$ty>(&default)?;
                    }
                )*
                Ok(())
            }
        }
    };
}
