use crate::types::PrimitiveType;

/// Types used to describe the format of vertices in arrays.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum VertexAttrType {
    Float = 0,
    Float2,
    Float3,
    Float4,
    Half,
    Half2,
    Half4,
    Int,
    Int2,
    Int4,
    UInt,
    Byte4,
    UByte4,
    /// Four unsigned bytes normalized to [0, 1] (colors, coverage).
    UByte4Norm,
    Short2,
    UShort2,
    UShort2Norm,
}

impl VertexAttrType {
    /// Size in bytes.
    pub const fn size(self) -> usize {
        match self {
            VertexAttrType::Float | VertexAttrType::Int | VertexAttrType::UInt => 4,
            VertexAttrType::Float2 | VertexAttrType::Int2 => 8,
            VertexAttrType::Float3 => 12,
            VertexAttrType::Float4 | VertexAttrType::Int4 => 16,
            VertexAttrType::Half => 2,
            VertexAttrType::Half2 => 4,
            VertexAttrType::Half4 => 8,
            VertexAttrType::Byte4 | VertexAttrType::UByte4 | VertexAttrType::UByte4Norm => 4,
            VertexAttrType::Short2 | VertexAttrType::UShort2 | VertexAttrType::UShort2Norm => 4,
        }
    }
}

/// One attribute in a vertex or instance stream.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttr {
    pub name: &'static str,
    pub ty: VertexAttrType,
}

impl VertexAttr {
    pub const fn new(name: &'static str, ty: VertexAttrType) -> Self {
        Self { name, ty }
    }
}

/// Immutable descriptor of a draw batch's geometry inputs.
///
/// Strides are the tightly packed sums of the attribute sizes; attribute
/// offsets follow declaration order. Two steps with identical attribute
/// type lists and primitive type produce identical pipeline key bits,
/// regardless of attribute names.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct GeometryStep {
    name: &'static str,
    primitive: PrimitiveType,
    vertex_attrs: Box<[VertexAttr]>,
    instance_attrs: Box<[VertexAttr]>,
}

impl GeometryStep {
    pub fn new(
        name: &'static str,
        primitive: PrimitiveType,
        vertex_attrs: impl Into<Box<[VertexAttr]>>,
        instance_attrs: impl Into<Box<[VertexAttr]>>,
    ) -> Self {
        Self {
            name,
            primitive,
            vertex_attrs: vertex_attrs.into(),
            instance_attrs: instance_attrs.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    #[inline]
    pub fn vertex_attrs(&self) -> &[VertexAttr] {
        &self.vertex_attrs
    }

    #[inline]
    pub fn instance_attrs(&self) -> &[VertexAttr] {
        &self.instance_attrs
    }

    pub fn vertex_stride(&self) -> usize {
        self.vertex_attrs.iter().map(|a| a.ty.size()).sum()
    }

    pub fn instance_stride(&self) -> usize {
        self.instance_attrs.iter().map(|a| a.ty.size()).sum()
    }

    #[inline]
    pub fn is_instanced(&self) -> bool {
        !self.instance_attrs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_sum_attribute_sizes() {
        let step = GeometryStep::new(
            "solid",
            PrimitiveType::TriangleList,
            vec![
                VertexAttr::new("pos", VertexAttrType::Float2),
                VertexAttr::new("color", VertexAttrType::UByte4Norm),
            ],
            vec![VertexAttr::new("transform", VertexAttrType::Float4)],
        );
        assert_eq!(step.vertex_stride(), 12);
        assert_eq!(step.instance_stride(), 16);
        assert!(step.is_instanced());
    }

    #[test]
    fn empty_instance_stream_means_not_instanced() {
        let step = GeometryStep::new(
            "lines",
            PrimitiveType::LineList,
            vec![VertexAttr::new("pos", VertexAttrType::Float2)],
            Vec::new(),
        );
        assert!(!step.is_instanced());
        assert_eq!(step.instance_stride(), 0);
    }
}
