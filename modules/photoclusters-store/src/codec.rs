//! Binary encoding for N-dimensional arrays stored as single BLOB values.
//!
//! Layout (little-endian):
//!
//! ```text
//! b"NDAR" | version u8 | dtype u8 | ndim u8 | ndim × u64 dims | elements
//! ```
//!
//! Elements are written in logical (row-major) order regardless of the
//! source array's memory layout.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ndarray::{Array, ArrayBase, Data, Dimension, IxDyn};

const MAGIC: &[u8; 4] = b"NDAR";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DType {
    F64 = 1,
    F32 = 2,
    I64 = 3,
    I32 = 4,
    U8 = 5,
}

impl DType {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(DType::F64),
            2 => Some(DType::F32),
            3 => Some(DType::I64),
            4 => Some(DType::I32),
            5 => Some(DType::U8),
            _ => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::F64 => "f64",
            DType::F32 => "f32",
            DType::I64 => "i64",
            DType::I32 => "i32",
            DType::U8 => "u8",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Not an encoded array (bad magic)")]
    BadMagic,

    #[error("Unsupported codec version {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown dtype tag {0}")]
    UnknownDType(u8),

    #[error("Element type mismatch: stored {stored}, requested {requested}")]
    DTypeMismatch { stored: DType, requested: DType },

    #[error("Dimension mismatch: stored {stored}-d array, requested {requested}-d")]
    DimensionMismatch { stored: usize, requested: usize },

    #[error("Payload length {actual} does not match shape (expected {expected})")]
    Length { expected: usize, actual: usize },

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Element types the codec can store.
pub trait Element: Copy {
    const DTYPE: DType;
    const WIDTH: usize;

    fn put(self, buf: &mut BytesMut);
    fn take(buf: &mut &[u8]) -> Self;
}

macro_rules! element {
    ($t:ty, $dtype:expr, $put:ident, $get:ident) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn put(self, buf: &mut BytesMut) {
                buf.$put(self);
            }

            fn take(buf: &mut &[u8]) -> Self {
                buf.$get()
            }
        }
    };
}

element!(f64, DType::F64, put_f64_le, get_f64_le);
element!(f32, DType::F32, put_f32_le, get_f32_le);
element!(i64, DType::I64, put_i64_le, get_i64_le);
element!(i32, DType::I32, put_i32_le, get_i32_le);
element!(u8, DType::U8, put_u8, get_u8);

pub fn encode<T, S, D>(array: &ArrayBase<S, D>) -> Bytes
where
    T: Element,
    S: Data<Elem = T>,
    D: Dimension,
{
    let shape = array.shape();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + shape.len() * 8 + array.len() * T::WIDTH);

    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u8(T::DTYPE as u8);
    buf.put_u8(shape.len() as u8);
    for &dim in shape {
        buf.put_u64_le(dim as u64);
    }
    for &value in array.iter() {
        value.put(&mut buf);
    }

    buf.freeze()
}

pub fn decode<T, D>(bytes: &[u8]) -> Result<Array<T, D>, CodecError>
where
    T: Element,
    D: Dimension,
{
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let mut buf = &bytes[MAGIC.len()..];
    let version = buf.get_u8();
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let tag = buf.get_u8();
    let stored = DType::from_tag(tag).ok_or(CodecError::UnknownDType(tag))?;
    if stored != T::DTYPE {
        return Err(CodecError::DTypeMismatch {
            stored,
            requested: T::DTYPE,
        });
    }

    let ndim = buf.get_u8() as usize;
    if let Some(requested) = D::NDIM {
        if requested != ndim {
            return Err(CodecError::DimensionMismatch {
                stored: ndim,
                requested,
            });
        }
    }

    if buf.remaining() < ndim * 8 {
        return Err(CodecError::Length {
            expected: ndim * 8,
            actual: buf.remaining(),
        });
    }
    let shape: Vec<usize> = (0..ndim).map(|_| buf.get_u64_le() as usize).collect();

    let count = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(CodecError::Length {
            expected: usize::MAX,
            actual: buf.remaining(),
        })?;
    let expected = count.checked_mul(T::WIDTH).ok_or(CodecError::Length {
        expected: usize::MAX,
        actual: buf.remaining(),
    })?;
    if buf.remaining() != expected {
        return Err(CodecError::Length {
            expected,
            actual: buf.remaining(),
        });
    }

    let data: Vec<T> = (0..count).map(|_| T::take(&mut buf)).collect();
    let array = Array::from_shape_vec(IxDyn(&shape), data)?;
    Ok(array.into_dimensionality::<D>()?)
}
