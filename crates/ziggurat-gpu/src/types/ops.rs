/// Load operation applied to an attachment when a render pass begins.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum LoadOp {
    /// Preserve the previous contents.
    Load = 0,
    /// Clear to the pass's clear value.
    Clear = 1,
    /// Contents are undefined; cheapest when the pass overwrites everything.
    DontCare = 2,
}

/// Store operation applied to an attachment when a render pass ends.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum StoreOp {
    Store = 0,
    DontCare = 1,
}

/// A load op and a store op packed into one byte.
///
/// Layout: bits 0-3 hold the [`LoadOp`], bits 4-7 hold the [`StoreOp`].
/// This is the wire form the op stream hands to
/// [`Server::get_ops_render_pass`](crate::server::Server::get_ops_render_pass),
/// one byte for color and one for stencil.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LoadStoreOps(u8);

const STORE_OP_SHIFT: u8 = 4;

impl LoadStoreOps {
    pub const LOAD_STORE: LoadStoreOps = LoadStoreOps::new(LoadOp::Load, StoreOp::Store);
    pub const CLEAR_STORE: LoadStoreOps = LoadStoreOps::new(LoadOp::Clear, StoreOp::Store);
    pub const DONT_LOAD_STORE: LoadStoreOps = LoadStoreOps::new(LoadOp::DontCare, StoreOp::Store);
    pub const LOAD_DONT_STORE: LoadStoreOps = LoadStoreOps::new(LoadOp::Load, StoreOp::DontCare);
    pub const CLEAR_DONT_STORE: LoadStoreOps = LoadStoreOps::new(LoadOp::Clear, StoreOp::DontCare);
    pub const DONT_LOAD_DONT_STORE: LoadStoreOps =
        LoadStoreOps::new(LoadOp::DontCare, StoreOp::DontCare);

    #[inline]
    pub const fn new(load: LoadOp, store: StoreOp) -> Self {
        Self((load as u8) | ((store as u8) << STORE_OP_SHIFT))
    }

    #[inline]
    pub const fn load_op(self) -> LoadOp {
        match self.0 & ((1 << STORE_OP_SHIFT) - 1) {
            0 => LoadOp::Load,
            1 => LoadOp::Clear,
            _ => LoadOp::DontCare,
        }
    }

    #[inline]
    pub const fn store_op(self) -> StoreOp {
        match self.0 >> STORE_OP_SHIFT {
            0 => StoreOp::Store,
            _ => StoreOp::DontCare,
        }
    }

    /// The packed byte, as carried by the op stream.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        for load in [LoadOp::Load, LoadOp::Clear, LoadOp::DontCare] {
            for store in [StoreOp::Store, StoreOp::DontCare] {
                let ops = LoadStoreOps::new(load, store);
                assert_eq!(ops.load_op(), load);
                assert_eq!(ops.store_op(), store);
            }
        }
    }

    #[test]
    fn named_constants_match_packing() {
        assert_eq!(
            LoadStoreOps::CLEAR_STORE,
            LoadStoreOps::new(LoadOp::Clear, StoreOp::Store)
        );
        assert_eq!(LoadStoreOps::LOAD_STORE.bits(), 0x00);
        assert_eq!(LoadStoreOps::CLEAR_DONT_STORE.bits(), 0x11);
    }
}
