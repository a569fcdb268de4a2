//! Value formats carried through lowering.
//!
//! A [`ValueFormat`] is the resolved type of one lowered value: what kind of
//! C value it is and, for vectors and masks, the element width and grouping
//! it was derived from. A [`Shape`] is the unresolved form used by
//! descriptors, relative to the variant's base width and LMUL.

use super::axes::{ElementWidth, Lmul};

/// Kind of a lowered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A vector register group.
    Vector,
    /// A mask register, sized for the vector format it was built against.
    Mask,
    /// An element-typed scalar.
    Scalar,
    /// A compile-time immediate supplied by the caller of a macro.
    Immediate,
    /// An element count (`size_t`).
    Length,
    /// A literal known while lowering.
    Literal,
}

/// Resolved type of a lowered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueFormat {
    pub kind: ValueKind,
    pub width: ElementWidth,
    pub lmul: Lmul,
    pub signed: bool,
}

impl ValueFormat {
    pub const fn vector(width: ElementWidth, lmul: Lmul, signed: bool) -> Self {
        Self { kind: ValueKind::Vector, width, lmul, signed }
    }

    pub const fn scalar(width: ElementWidth, signed: bool) -> Self {
        Self { kind: ValueKind::Scalar, width, lmul: Lmul::M1, signed }
    }

    pub const fn immediate(width: ElementWidth) -> Self {
        Self { kind: ValueKind::Immediate, width, lmul: Lmul::M1, signed: false }
    }

    pub const fn length() -> Self {
        Self { kind: ValueKind::Length, width: ElementWidth::E64, lmul: Lmul::M1, signed: false }
    }

    pub const fn literal() -> Self {
        Self { kind: ValueKind::Literal, width: ElementWidth::E64, lmul: Lmul::M1, signed: false }
    }

    /// Mask format selecting elements of `self`.
    pub const fn mask(self) -> Self {
        Self { kind: ValueKind::Mask, signed: false, ..self }
    }

    pub const fn is_vector(self) -> bool {
        matches!(self.kind, ValueKind::Vector)
    }

    pub const fn is_mask(self) -> bool {
        matches!(self.kind, ValueKind::Mask)
    }

    /// True for every non-register kind.
    pub const fn is_scalar_like(self) -> bool {
        matches!(
            self.kind,
            ValueKind::Scalar | ValueKind::Immediate | ValueKind::Length | ValueKind::Literal
        )
    }

    pub fn with_signed(self, signed: bool) -> Self {
        Self { signed, ..self }
    }

    /// SEW/LMUL ratio, the `N` of `vboolN_t`.
    pub fn mask_ratio(self) -> u32 {
        let log2 = self.width.log2() - self.lmul.log2();
        1u32 << log2.max(0)
    }

    /// Type tag used in intrinsic names: `u32m1`, `i8mf2`, `b32`.
    pub fn type_tag(self) -> String {
        match self.kind {
            ValueKind::Mask => format!("b{}", self.mask_ratio()),
            _ => format!(
                "{}{}{}",
                if self.signed { 'i' } else { 'u' },
                self.width.bits(),
                self.lmul.suffix()
            ),
        }
    }

    /// C spelling of the type.
    pub fn c_type(self) -> String {
        let int = if self.signed { "int" } else { "uint" };
        match self.kind {
            ValueKind::Vector => {
                format!("v{}{}{}_t", int, self.width.bits(), self.lmul.suffix())
            }
            ValueKind::Mask => format!("vbool{}_t", self.mask_ratio()),
            ValueKind::Scalar | ValueKind::Immediate => format!("{}{}_t", int, self.width.bits()),
            ValueKind::Length => "size_t".to_string(),
            ValueKind::Literal => "uint64_t".to_string(),
        }
    }
}

/// Format of a descriptor operand or result, relative to the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub width_shift: i8,
    pub lmul_shift: i8,
    pub signed: bool,
}

impl Shape {
    /// Exactly the variant's width and grouping.
    pub const fn base(signed: bool) -> Self {
        Self { width_shift: 0, lmul_shift: 0, signed }
    }

    /// Same width, grouping scaled by `2^lmul_shift`.
    pub const fn grouped(lmul_shift: i8, signed: bool) -> Self {
        Self { width_shift: 0, lmul_shift, signed }
    }

    /// Resolve against a variant, returning `None` if the result is not a
    /// legal register type.
    pub fn resolve(self, width: ElementWidth, lmul: Lmul) -> Option<(ElementWidth, Lmul)> {
        let width = width.scaled(self.width_shift)?;
        let lmul = lmul.scaled(self.lmul_shift)?;
        lmul.is_valid_for(width).then_some((width, lmul))
    }

    /// Element count of this shape relative to `vl`, as a power of two.
    pub const fn count_shift(self) -> i8 {
        self.lmul_shift - self.width_shift
    }
}
