use std::fmt;

/// A remapping of the four color channels, packed 4 bits per output channel.
///
/// Each output channel (R, G, B, A in order) selects one of the input
/// channels, constant zero, or constant one. The packed form is stable and
/// participates in pipeline keys.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Swizzle(u16);

// Per-channel selectors, 4 bits each.
const SEL_R: u16 = 0;
const SEL_G: u16 = 1;
const SEL_B: u16 = 2;
const SEL_A: u16 = 3;
const SEL_ZERO: u16 = 4;
const SEL_ONE: u16 = 5;

impl Swizzle {
    pub const RGBA: Swizzle = Swizzle::pack([SEL_R, SEL_G, SEL_B, SEL_A]);
    pub const BGRA: Swizzle = Swizzle::pack([SEL_B, SEL_G, SEL_R, SEL_A]);
    /// RGB with alpha forced to one (opaque).
    pub const RGB1: Swizzle = Swizzle::pack([SEL_R, SEL_G, SEL_B, SEL_ONE]);
    /// Alpha broadcast to all channels.
    pub const AAAA: Swizzle = Swizzle::pack([SEL_A, SEL_A, SEL_A, SEL_A]);
    /// Red broadcast to all channels (single-channel formats).
    pub const RRRR: Swizzle = Swizzle::pack([SEL_R, SEL_R, SEL_R, SEL_R]);
    /// Red into alpha, color forced to zero.
    pub const A000: Swizzle = Swizzle::pack([SEL_ZERO, SEL_ZERO, SEL_ZERO, SEL_R]);

    const fn pack(sel: [u16; 4]) -> Swizzle {
        Swizzle(sel[0] | sel[1] << 4 | sel[2] << 8 | sel[3] << 12)
    }

    #[inline]
    const fn selector(self, i: usize) -> u16 {
        (self.0 >> (i * 4)) & 0xF
    }

    /// Parses a swizzle from a 4-character string over `rgba01`.
    ///
    /// Returns `None` for any other input.
    pub fn parse(s: &str) -> Option<Swizzle> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return None;
        }
        let mut sel = [0u16; 4];
        for (i, &c) in bytes.iter().enumerate() {
            sel[i] = match c {
                b'r' => SEL_R,
                b'g' => SEL_G,
                b'b' => SEL_B,
                b'a' => SEL_A,
                b'0' => SEL_ZERO,
                b'1' => SEL_ONE,
                _ => return None,
            };
        }
        Some(Swizzle::pack(sel))
    }

    /// Composes two swizzles: the result applies `a` first, then `b`.
    ///
    /// Each output channel of the result is `b`'s selector resolved through
    /// `a`'s output; constant selectors in `b` pass through unchanged. This
    /// direction is the one accumulated by
    /// [`SurfaceProxyView::merge_swizzle`](crate::proxy::SurfaceProxyView::merge_swizzle)
    /// as swizzle chains build up across rendering stages.
    pub const fn concat(a: Swizzle, b: Swizzle) -> Swizzle {
        let mut packed: u16 = 0;
        let mut i = 0;
        while i < 4 {
            let s = b.selector(i);
            let resolved = if s >= SEL_ZERO { s } else { a.selector(s as usize) };
            packed |= resolved << (i * 4);
            i += 1;
        }
        Swizzle(packed)
    }

    /// Applies the swizzle to a 4-component value.
    pub fn apply(self, rgba: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (i, v) in out.iter_mut().enumerate() {
            *v = match self.selector(i) {
                SEL_ZERO => 0.0,
                SEL_ONE => 1.0,
                s => rgba[s as usize],
            };
        }
        out
    }

    /// The packed form, stable for key serialization.
    #[inline]
    pub const fn key(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_rgba(self) -> bool {
        self == Swizzle::RGBA
    }
}

impl Default for Swizzle {
    #[inline]
    fn default() -> Self {
        Swizzle::RGBA
    }
}

impl fmt::Debug for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::with_capacity(4);
        for i in 0..4 {
            s.push(match self.selector(i) {
                SEL_R => 'r',
                SEL_G => 'g',
                SEL_B => 'b',
                SEL_A => 'a',
                SEL_ZERO => '0',
                _ => '1',
            });
        }
        write!(f, "Swizzle({s})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_named_constants() {
        assert_eq!(Swizzle::parse("rgba"), Some(Swizzle::RGBA));
        assert_eq!(Swizzle::parse("bgra"), Some(Swizzle::BGRA));
        assert_eq!(Swizzle::parse("rgb1"), Some(Swizzle::RGB1));
        assert_eq!(Swizzle::parse("000r"), Some(Swizzle::A000));
        assert_eq!(Swizzle::parse("xyzw"), None);
        assert_eq!(Swizzle::parse("rgb"), None);
    }

    #[test]
    fn identity_is_neutral_for_concat() {
        for s in [Swizzle::BGRA, Swizzle::RGB1, Swizzle::AAAA] {
            assert_eq!(Swizzle::concat(Swizzle::RGBA, s), s);
            assert_eq!(Swizzle::concat(s, Swizzle::RGBA), s);
        }
    }

    #[test]
    fn bgra_twice_is_identity() {
        assert_eq!(Swizzle::concat(Swizzle::BGRA, Swizzle::BGRA), Swizzle::RGBA);
    }

    #[test]
    fn concat_applies_left_then_right() {
        // BGRA then RGB1: swap R/B first, then force alpha to one.
        let composed = Swizzle::concat(Swizzle::BGRA, Swizzle::RGB1);
        let input = [0.1, 0.2, 0.3, 0.4];
        let expected = Swizzle::RGB1.apply(Swizzle::BGRA.apply(input));
        assert_eq!(composed.apply(input), expected);
    }

    #[test]
    fn constants_pass_through_concat() {
        // Constant selectors in the second swizzle ignore the first entirely.
        let composed = Swizzle::concat(Swizzle::BGRA, Swizzle::A000);
        assert_eq!(composed.apply([0.5, 0.6, 0.7, 0.8]), [0.0, 0.0, 0.0, 0.7]);
    }
}
