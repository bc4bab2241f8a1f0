//! Per-type serializer registry
//!
//! Controls never encode field values themselves. [`ViewStateWriter::write_value`]
//! and [`ViewStateReader::read_value`] look up the serializer for the field's
//! runtime type here. The registry is type-erased so that applications can
//! plug in codecs for their own types next to the built-in ones.

use core::any::{type_name, Any, TypeId};
use core::marker::PhantomData;

use crate::viewstate::builtin::PrimitiveSerializer;
use crate::viewstate::reader::ViewStateReader;
use crate::viewstate::writer::ViewStateWriter;
use crate::{Result, WebFormsError};

// ----------------------------------------------------------------------------
// Serializer Traits
// ----------------------------------------------------------------------------

/// Type-erased value codec
pub trait ViewStateSerializer: Send + Sync {
    /// Whether values of `type_id` are handled by this serializer
    fn can_serialize(&self, type_id: TypeId) -> bool;

    /// Write `value`; `default` is the declared default of the field
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &dyn Any, default: &dyn Any)
        -> Result<()>;

    /// Read a value previously written by [`write`](Self::write)
    fn read(&self, reader: &mut ViewStateReader<'_>, default: &dyn Any) -> Result<Box<dyn Any>>;

    /// Whether `value` differs from `default` and must be written
    fn should_persist(&self, value: &dyn Any, default: &dyn Any) -> Result<bool>;
}

/// Statically typed codec, adapted into a [`ViewStateSerializer`] by
/// [`SerializerRegistry::register_typed`]
pub trait TypedSerializer<T: Any>: Send + Sync + 'static {
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &T) -> Result<()>;

    /// Read a present value; `default` is the declared default of the field
    fn read(&self, reader: &mut ViewStateReader<'_>, default: &T) -> Result<T>;

    fn should_persist(&self, value: &T, default: &T) -> bool;
}

struct TypedAdapter<T, S> {
    inner: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> TypedAdapter<T, S> {
    fn downcast<'v>(value: &'v dyn Any) -> Result<&'v T>
    where
        T: Any,
    {
        value
            .downcast_ref::<T>()
            .ok_or_else(|| WebFormsError::invalid_value(format!("expected {}", type_name::<T>())))
    }
}

impl<T: Any, S: TypedSerializer<T>> ViewStateSerializer for TypedAdapter<T, S> {
    fn can_serialize(&self, type_id: TypeId) -> bool {
        type_id == TypeId::of::<T>()
    }

    fn write(
        &self,
        writer: &mut ViewStateWriter<'_>,
        value: &dyn Any,
        _default: &dyn Any,
    ) -> Result<()> {
        self.inner.write(writer, Self::downcast(value)?)
    }

    fn read(&self, reader: &mut ViewStateReader<'_>, default: &dyn Any) -> Result<Box<dyn Any>> {
        let value = self.inner.read(reader, Self::downcast(default)?)?;
        Ok(Box::new(value))
    }

    fn should_persist(&self, value: &dyn Any, default: &dyn Any) -> Result<bool> {
        Ok(self
            .inner
            .should_persist(Self::downcast(value)?, Self::downcast(default)?))
    }
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

/// Ordered collection of serializers; later registrations take precedence
#[derive(Default)]
pub struct SerializerRegistry {
    serializers: Vec<Box<dyn ViewStateSerializer>>,
}

impl SerializerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with codecs for the built-in field types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_typed::<String, _>(PrimitiveSerializer);
        registry.register_typed::<bool, _>(PrimitiveSerializer);
        registry.register_typed::<i32, _>(PrimitiveSerializer);
        registry.register_typed::<u32, _>(PrimitiveSerializer);
        registry.register_typed::<i64, _>(PrimitiveSerializer);
        registry.register_typed::<u64, _>(PrimitiveSerializer);
        registry.register_typed::<usize, _>(PrimitiveSerializer);
        registry.register_typed::<f64, _>(PrimitiveSerializer);
        registry.register_typed::<Option<String>, _>(PrimitiveSerializer);
        registry.register_typed::<Vec<String>, _>(PrimitiveSerializer);
        registry
    }

    /// Add a type-erased serializer
    pub fn register<S: ViewStateSerializer + 'static>(&mut self, serializer: S) -> &mut Self {
        self.serializers.push(Box::new(serializer));
        self
    }

    /// Add a typed serializer for `T`
    pub fn register_typed<T: Any, S: TypedSerializer<T>>(&mut self, serializer: S) -> &mut Self {
        self.register(TypedAdapter {
            inner: serializer,
            _marker: PhantomData,
        })
    }

    /// Most recently registered serializer handling `type_id`
    pub fn find(&self, type_id: TypeId) -> Option<&dyn ViewStateSerializer> {
        self.serializers
            .iter()
            .rev()
            .find(|serializer| serializer.can_serialize(type_id))
            .map(|serializer| serializer.as_ref())
    }

    /// Like [`find`](Self::find), failing with `SerializerNotFound`
    pub fn require(
        &self,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<&dyn ViewStateSerializer> {
        self.find(type_id)
            .ok_or(WebFormsError::SerializerNotFound { type_name })
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }
}

impl core::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("serializers", &self.serializers.len())
            .finish()
    }
}
