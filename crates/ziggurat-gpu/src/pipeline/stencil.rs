/// Stencil comparison function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CompareOp {
    Never = 0,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Operation applied to the stencil buffer on pass/fail.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum StencilOp {
    Keep = 0,
    Zero,
    Replace,
    Invert,
    IncWrap,
    DecWrap,
    IncClamp,
    DecClamp,
}

/// Immutable user stencil state for a draw batch.
///
/// Referenced from [`PipelineInfo`](super::PipelineInfo) and never mutated
/// after construction, so it can be shared across batches and threads that
/// only read.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct StencilSettings {
    pub compare: CompareOp,
    pub pass_op: StencilOp,
    pub fail_op: StencilOp,
    pub read_mask: u16,
    pub write_mask: u16,
    pub reference: u16,
}

impl StencilSettings {
    /// Packs the op/compare selectors into one key word.
    ///
    /// Masks and reference go into separate words; see
    /// [`PipelineDesc::build`](super::PipelineDesc::build).
    pub fn key_word(&self) -> u32 {
        (self.compare as u32) | (self.pass_op as u32) << 4 | (self.fail_op as u32) << 8
    }
}
