//! Built-in field codecs

use crate::errors::FormatError;
use crate::viewstate::reader::ViewStateReader;
use crate::viewstate::serializer::TypedSerializer;
use crate::viewstate::writer::ViewStateWriter;
use crate::Result;

/// Codec for the primitive field types registered by
/// [`SerializerRegistry::with_defaults`](crate::viewstate::SerializerRegistry::with_defaults)
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveSerializer;

macro_rules! fixed_width {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl TypedSerializer<$ty> for PrimitiveSerializer {
                fn write(&self, writer: &mut ViewStateWriter<'_>, value: &$ty) -> Result<()> {
                    writer.$write(*value);
                    Ok(())
                }

                fn read(&self, reader: &mut ViewStateReader<'_>, _default: &$ty) -> Result<$ty> {
                    reader.$read()
                }

                fn should_persist(&self, value: &$ty, default: &$ty) -> bool {
                    value != default
                }
            }
        )*
    };
}

fixed_width! {
    bool => write_bool, read_bool;
    i32 => write_i32, read_i32;
    u32 => write_u32, read_u32;
    i64 => write_i64, read_i64;
    u64 => write_u64, read_u64;
}

impl TypedSerializer<f64> for PrimitiveSerializer {
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &f64) -> Result<()> {
        writer.write_f64(*value);
        Ok(())
    }

    fn read(&self, reader: &mut ViewStateReader<'_>, _default: &f64) -> Result<f64> {
        reader.read_f64()
    }

    // Bitwise so that -0.0 and NaN payloads survive
    fn should_persist(&self, value: &f64, default: &f64) -> bool {
        value.to_bits() != default.to_bits()
    }
}

impl TypedSerializer<usize> for PrimitiveSerializer {
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &usize) -> Result<()> {
        writer.write_var_u64(*value as u64);
        Ok(())
    }

    fn read(&self, reader: &mut ViewStateReader<'_>, _default: &usize) -> Result<usize> {
        let value = reader.read_var_u64()?;
        Ok(usize::try_from(value).map_err(|_| FormatError::VarIntOverflow)?)
    }

    fn should_persist(&self, value: &usize, default: &usize) -> bool {
        value != default
    }
}

impl TypedSerializer<String> for PrimitiveSerializer {
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &String) -> Result<()> {
        writer.write_str(value);
        Ok(())
    }

    fn read(&self, reader: &mut ViewStateReader<'_>, _default: &String) -> Result<String> {
        reader.read_string()
    }

    fn should_persist(&self, value: &String, default: &String) -> bool {
        value != default
    }
}

impl TypedSerializer<Option<String>> for PrimitiveSerializer {
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &Option<String>) -> Result<()> {
        match value {
            Some(text) => {
                writer.write_bool(true);
                writer.write_str(text);
            }
            None => writer.write_bool(false),
        }
        Ok(())
    }

    fn read(
        &self,
        reader: &mut ViewStateReader<'_>,
        _default: &Option<String>,
    ) -> Result<Option<String>> {
        if reader.read_bool()? {
            Ok(Some(reader.read_string()?))
        } else {
            Ok(None)
        }
    }

    fn should_persist(&self, value: &Option<String>, default: &Option<String>) -> bool {
        value != default
    }
}

impl TypedSerializer<Vec<String>> for PrimitiveSerializer {
    fn write(&self, writer: &mut ViewStateWriter<'_>, value: &Vec<String>) -> Result<()> {
        writer.write_var_u64(value.len() as u64);
        for item in value {
            writer.write_str(item);
        }
        Ok(())
    }

    fn read(
        &self,
        reader: &mut ViewStateReader<'_>,
        _default: &Vec<String>,
    ) -> Result<Vec<String>> {
        let count = reader.read_var_u64()?;
        let count = usize::try_from(count).map_err(|_| FormatError::VarIntOverflow)?;

        // Every element costs at least its length byte
        if count > reader.remaining() {
            return Err(FormatError::UnexpectedEnd {
                needed: count,
                remaining: reader.remaining(),
            }
            .into());
        }

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(reader.read_string()?);
        }
        Ok(items)
    }

    fn should_persist(&self, value: &Vec<String>, default: &Vec<String>) -> bool {
        value != default
    }
}
