//! Cursor over a decoded view state payload

use core::any::{type_name, Any, TypeId};
use core::convert::TryInto;

use crate::errors::FormatError;
use crate::viewstate::serializer::SerializerRegistry;
use crate::viewstate::writer::{MARKER_ABSENT, MARKER_PRESENT};
use crate::{Result, WebFormsError};

// ----------------------------------------------------------------------------
// View State Reader
// ----------------------------------------------------------------------------

/// Mirror of [`ViewStateWriter`](crate::viewstate::ViewStateWriter) over an
/// immutable slice. Reading past the end is a [`FormatError`].
pub struct ViewStateReader<'a> {
    data: &'a [u8],
    position: usize,
    registry: &'a SerializerRegistry,
}

impl<'a> ViewStateReader<'a> {
    pub fn new(data: &'a [u8], registry: &'a SerializerRegistry) -> Self {
        Self {
            data,
            position: 0,
            registry,
        }
    }

    pub fn registry(&self) -> &'a SerializerRegistry {
        self.registry
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, count: usize) -> core::result::Result<&'a [u8], FormatError> {
        if self.remaining() < count {
            return Err(FormatError::UnexpectedEnd {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> core::result::Result<[u8; N], FormatError> {
        let slice = self.take(N)?;
        slice.try_into().map_err(|_| FormatError::UnexpectedEnd {
            needed: N,
            remaining: slice.len(),
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FormatError::InvalidValue {
                reason: format!("{} is not a boolean", other),
            }
            .into()),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take_array()?)))
    }

    /// Read an unsigned LEB128 integer
    pub fn read_var_u64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(FormatError::VarIntOverflow.into());
            }
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(FormatError::VarIntOverflow.into());
            }
        }
    }

    /// Read a length-prefixed byte run without copying
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let length = self.read_var_u64()?;
        let length = usize::try_from(length).map_err(|_| FormatError::VarIntOverflow)?;
        Ok(self.take(length)?)
    }

    /// Read a length-prefixed UTF-8 string without copying
    pub fn read_str(&mut self) -> Result<&'a str> {
        let bytes = self.read_bytes()?;
        core::str::from_utf8(bytes).map_err(|_| WebFormsError::Format(FormatError::InvalidUtf8))
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.read_str().map(str::to_owned)
    }

    /// Read a declared state field, yielding `default` for the absent marker
    pub fn read_value<T: Any + Clone>(&mut self, default: &T) -> Result<T> {
        let registry = self.registry;
        let serializer = registry.require(TypeId::of::<T>(), type_name::<T>())?;

        match self.read_u8()? {
            MARKER_ABSENT => Ok(default.clone()),
            MARKER_PRESENT => {
                let value = serializer.read(self, default)?;
                value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                    WebFormsError::invalid_value(format!(
                        "serializer for {} produced a different type",
                        type_name::<T>()
                    ))
                })
            }
            marker => Err(FormatError::InvalidMarker { marker }.into()),
        }
    }
}
