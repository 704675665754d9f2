//! Fixed-width little-endian encodings for values stored in process memory

use crate::core::types::{Color, Quaternion, Vector};
use std::fmt;

/// A value type that can live at an address in the target process.
///
/// Every implementation occupies exactly [`MemoryType::SIZE`] bytes and uses
/// little-endian byte order, the layout of x86/x64 targets.
pub trait MemoryType: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Name used in handle descriptions and error messages
    const NAME: &'static str;

    /// Encoded width in bytes
    const SIZE: usize;

    /// Decodes a value from exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Option<Self>;

    /// Encodes the value into `SIZE` bytes
    fn encode(&self) -> Vec<u8>;
}

macro_rules! impl_primitive {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl MemoryType for $ty {
                const NAME: &'static str = $name;
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn decode(bytes: &[u8]) -> Option<Self> {
                    Some(<$ty>::from_le_bytes(bytes.try_into().ok()?))
                }

                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }
        )*
    };
}

impl_primitive! {
    u8 => "u8",
    i8 => "i8",
    u16 => "u16",
    i16 => "i16",
    u32 => "u32",
    i32 => "i32",
    u64 => "u64",
    i64 => "i64",
    f32 => "f32",
    f64 => "f64",
}

impl MemoryType for bool {
    const NAME: &'static str = "bool";
    const SIZE: usize = 1;

    fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b] => Some(*b != 0),
            _ => None,
        }
    }

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }
}

fn decode_f32s<const N: usize>(bytes: &[u8]) -> Option<[f32; N]> {
    if bytes.len() != N * 4 {
        return None;
    }
    let mut out = [0f32; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *slot = f32::from_le_bytes(chunk.try_into().ok()?);
    }
    Some(out)
}

fn encode_f32s(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl MemoryType for Vector {
    const NAME: &'static str = "Vector";
    const SIZE: usize = 12;

    fn decode(bytes: &[u8]) -> Option<Self> {
        let [x, y, z] = decode_f32s::<3>(bytes)?;
        Some(Vector::new(x, y, z))
    }

    fn encode(&self) -> Vec<u8> {
        encode_f32s(&[self.x, self.y, self.z])
    }
}

impl MemoryType for Color {
    const NAME: &'static str = "Color";
    const SIZE: usize = 12;

    fn decode(bytes: &[u8]) -> Option<Self> {
        let [r, g, b] = decode_f32s::<3>(bytes)?;
        Some(Color::new(r, g, b))
    }

    fn encode(&self) -> Vec<u8> {
        encode_f32s(&[self.r, self.g, self.b])
    }
}

impl MemoryType for Quaternion {
    const NAME: &'static str = "Quaternion";
    const SIZE: usize = 16;

    fn decode(bytes: &[u8]) -> Option<Self> {
        let [x, y, z, w] = decode_f32s::<4>(bytes)?;
        Some(Quaternion::new(x, y, z, w))
    }

    fn encode(&self) -> Vec<u8> {
        encode_f32s(&[self.x, self.y, self.z, self.w])
    }
}
