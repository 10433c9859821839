//! Scalar and buffer types for IR values.

/// Element data type of a scalar or buffer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> i64 {
        match self {
            DataType::U8 => 1,
            DataType::I32 | DataType::F32 => 4,
            DataType::I64 | DataType::F64 => 8,
        }
    }
}

/// Buffer shape: either fully known at compile time or dynamic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// All dimensions are known at compile time.
    Static(Vec<i64>),

    /// At least one dimension is only known at runtime.
    Dynamic,
}

impl Shape {
    /// Check if the shape is fully static.
    pub fn is_static(&self) -> bool {
        matches!(self, Shape::Static(_))
    }

    /// Get static dimensions if available.
    pub fn as_static(&self) -> Option<&[i64]> {
        match self {
            Shape::Static(dims) => Some(dims),
            Shape::Dynamic => None,
        }
    }
}

/// Type of a multi-dimensional buffer value.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferType {
    /// Buffer shape.
    pub shape: Shape,

    /// Element data type.
    pub elem: DataType,
}

impl BufferType {
    /// Create a buffer type with a static shape.
    pub fn new(dims: Vec<i64>, elem: DataType) -> Self {
        Self {
            shape: Shape::Static(dims),
            elem,
        }
    }

    /// Create a rank-1 byte buffer type of the given size.
    ///
    /// This is the type of a memory pool allocation.
    pub fn bytes(size: i64) -> Self {
        Self::new(vec![size], DataType::U8)
    }

    /// Buffer rank, if the shape is static.
    pub fn rank(&self) -> Option<usize> {
        self.shape.as_static().map(|dims| dims.len())
    }

    /// Check if all dimensions are known at compile time.
    pub fn has_static_shape(&self) -> bool {
        self.shape.is_static()
    }

    /// Total buffer footprint in bytes, if the shape is static.
    pub fn size_in_bytes(&self) -> Option<i64> {
        let dims = self.shape.as_static()?;
        Some(dims.iter().product::<i64>() * self.elem.size_in_bytes())
    }

    /// Check if this is a valid pool type: rank 1, byte element, static shape.
    pub fn is_byte_pool(&self) -> bool {
        self.elem == DataType::U8 && self.rank() == Some(1)
    }
}

/// Type of an IR value.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// A single scalar value.
    Scalar(DataType),

    /// A multi-dimensional buffer.
    Buffer(BufferType),
}

impl Type {
    /// Get the buffer type if this is a buffer.
    pub fn as_buffer(&self) -> Option<&BufferType> {
        match self {
            Type::Buffer(buffer) => Some(buffer),
            Type::Scalar(_) => None,
        }
    }
}
