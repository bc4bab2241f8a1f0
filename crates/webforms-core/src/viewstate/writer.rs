//! Append-only view state writer

use core::any::{type_name, Any, TypeId};

use crate::viewstate::pool::PooledBuffer;
use crate::viewstate::serializer::SerializerRegistry;
use crate::Result;

/// Marker written for a field equal to its declared default
pub const MARKER_ABSENT: u8 = 0;

/// Marker written before a persisted field value
pub const MARKER_PRESENT: u8 = 1;

// ----------------------------------------------------------------------------
// View State Writer
// ----------------------------------------------------------------------------

/// Binary cursor over a growable pooled buffer
///
/// Every control of a scope writes into the same writer in traversal order.
/// Integers are big-endian, lengths are LEB128.
pub struct ViewStateWriter<'a> {
    buffer: PooledBuffer,
    registry: &'a SerializerRegistry,
}

impl<'a> ViewStateWriter<'a> {
    /// Create a writer over a rented buffer
    pub fn new(mut buffer: PooledBuffer, registry: &'a SerializerRegistry) -> Self {
        buffer.clear();
        Self { buffer, registry }
    }

    /// Serializer registry used by [`write_value`](Self::write_value)
    pub fn registry(&self) -> &'a SerializerRegistry {
        self.registry
    }

    /// Bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_bits().to_be_bytes());
    }

    /// Write an unsigned LEB128 integer
    pub fn write_var_u64(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                return;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    /// Write a length-prefixed byte run
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_var_u64(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write a declared state field
    ///
    /// Only the absent marker is written when the registered serializer says
    /// `value` need not be persisted against `default`.
    pub fn write_value<T: Any>(&mut self, value: &T, default: &T) -> Result<()> {
        let registry = self.registry;
        let serializer = registry.require(TypeId::of::<T>(), type_name::<T>())?;

        if !serializer.should_persist(value, default)? {
            self.write_u8(MARKER_ABSENT);
            return Ok(());
        }

        self.write_u8(MARKER_PRESENT);
        serializer.write(self, value, default)
    }

    /// Give back the underlying buffer
    pub fn into_buffer(self) -> PooledBuffer {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewstate::pool::BufferPool;
    use std::sync::Arc;

    #[test]
    fn test_fixed_width_is_big_endian() {
        let pool = Arc::new(BufferPool::new());
        let registry = SerializerRegistry::with_defaults();
        let mut writer = ViewStateWriter::new(pool.rent(8), &registry);

        writer.write_u16(0x0102);
        writer.write_i32(-2);
        assert_eq!(writer.as_slice(), &[0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn test_var_u64_encoding() {
        let pool = Arc::new(BufferPool::new());
        let registry = SerializerRegistry::with_defaults();
        let mut writer = ViewStateWriter::new(pool.rent(8), &registry);

        writer.write_var_u64(0);
        writer.write_var_u64(127);
        writer.write_var_u64(300);
        assert_eq!(writer.as_slice(), &[0x00, 0x7F, 0xAC, 0x02]);
    }

    #[test]
    fn test_default_value_costs_one_marker() {
        let pool = Arc::new(BufferPool::new());
        let registry = SerializerRegistry::with_defaults();
        let mut writer = ViewStateWriter::new(pool.rent(8), &registry);

        writer.write_value(&String::new(), &String::new()).unwrap();
        assert_eq!(writer.as_slice(), &[MARKER_ABSENT]);

        writer
            .write_value(&"hi".to_string(), &String::new())
            .unwrap();
        assert_eq!(writer.as_slice(), &[MARKER_ABSENT, MARKER_PRESENT, 2, b'h', b'i']);
    }

    #[test]
    fn test_unregistered_type_fails() {
        let pool = Arc::new(BufferPool::new());
        let registry = SerializerRegistry::new();
        let mut writer = ViewStateWriter::new(pool.rent(8), &registry);

        let result = writer.write_value(&1u8, &0u8);
        assert!(matches!(
            result,
            Err(crate::WebFormsError::SerializerNotFound { .. })
        ));
    }
}
