// This module defines the closed axis enumerations that span the configuration space of
// every emitted routine: element width (SEW), register grouping factor (LMUL), operand
// form (vv/vx/vi), tail policy and mask policy. It also defines the emission policy tag
// that the renderer dispatches on, derived purely from the operand form. Each axis
// parses from the spelling used on the command line and prints the spelling used in
// RVV intrinsic type names, so filters and emitted names round-trip through one place.
// The LMUL legality rule (SEW / LMUL must not exceed ELEN = 64) lives here as well
// because every support table applies it.

//! Configuration axes for RVV emulation variants.

use std::fmt;
use std::str::FromStr;

/// log2 of ELEN, the widest element the base ISA supports.
const ELEN_LOG2: i8 = 6;

/// Bit width of one vector element (SEW).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementWidth {
    E8,
    E16,
    E32,
    E64,
}

impl ElementWidth {
    pub const ALL: [ElementWidth; 4] = [Self::E8, Self::E16, Self::E32, Self::E64];

    /// Widest representable element.
    pub const MAX: ElementWidth = Self::E64;

    pub const fn bits(self) -> u32 {
        match self {
            Self::E8 => 8,
            Self::E16 => 16,
            Self::E32 => 32,
            Self::E64 => 64,
        }
    }

    pub const fn log2(self) -> i8 {
        match self {
            Self::E8 => 3,
            Self::E16 => 4,
            Self::E32 => 5,
            Self::E64 => 6,
        }
    }

    pub fn from_log2(log2: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.log2() == log2)
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.bits() == bits)
    }

    /// Width scaled by `2^shift`, if still representable.
    pub fn scaled(self, shift: i8) -> Option<Self> {
        Self::from_log2(self.log2().checked_add(shift)?)
    }

    /// All-ones mask covering one element.
    pub const fn mask(self) -> u64 {
        match self {
            Self::E64 => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }
}

impl fmt::Display for ElementWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl FromStr for ElementWidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches(['e', 'E']);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::from_bits)
            .ok_or_else(|| format!("invalid element width `{s}` (expected 8, 16, 32 or 64)"))
    }
}

/// Register grouping factor (LMUL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lmul {
    Mf8,
    Mf4,
    Mf2,
    M1,
    M2,
    M4,
    M8,
}

impl Lmul {
    pub const ALL: [Lmul; 7] = [
        Self::Mf8,
        Self::Mf4,
        Self::Mf2,
        Self::M1,
        Self::M2,
        Self::M4,
        Self::M8,
    ];

    /// Platform ceiling for register grouping.
    pub const MAX: Lmul = Self::M8;

    pub const fn log2(self) -> i8 {
        match self {
            Self::Mf8 => -3,
            Self::Mf4 => -2,
            Self::Mf2 => -1,
            Self::M1 => 0,
            Self::M2 => 1,
            Self::M4 => 2,
            Self::M8 => 3,
        }
    }

    pub fn from_log2(log2: i8) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.log2() == log2)
    }

    /// Grouping scaled by `2^shift`, if it stays within mf8..=m8.
    pub fn scaled(self, shift: i8) -> Option<Self> {
        Self::from_log2(self.log2().checked_add(shift)?)
    }

    /// Whether `width` at this grouping names a legal register type.
    pub fn is_valid_for(self, width: ElementWidth) -> bool {
        width.log2() - self.log2() <= ELEN_LOG2
    }

    /// Suffix used in intrinsic type names.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Mf8 => "mf8",
            Self::Mf4 => "mf4",
            Self::Mf2 => "mf2",
            Self::M1 => "m1",
            Self::M2 => "m2",
            Self::M4 => "m4",
            Self::M8 => "m8",
        }
    }
}

impl fmt::Display for Lmul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Lmul {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lmul = match s.to_ascii_lowercase().as_str() {
            "mf8" | "1/8" => Self::Mf8,
            "mf4" | "1/4" => Self::Mf4,
            "mf2" | "1/2" => Self::Mf2,
            "m1" | "1" => Self::M1,
            "m2" | "2" => Self::M2,
            "m4" | "4" => Self::M4,
            "m8" | "8" => Self::M8,
            _ => return Err(format!("invalid LMUL `{s}` (expected mf8..m8)")),
        };
        Ok(lmul)
    }
}

/// Kind of the second source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandForm {
    VectorVector,
    VectorScalar,
    VectorImmediate,
}

impl OperandForm {
    pub const ALL: [OperandForm; 3] = [
        Self::VectorVector,
        Self::VectorScalar,
        Self::VectorImmediate,
    ];

    /// Operand letter of the secondary source in intrinsic names.
    pub const fn letter(self) -> char {
        match self {
            Self::VectorVector => 'v',
            Self::VectorScalar => 'x',
            Self::VectorImmediate => 'i',
        }
    }

    pub const fn emission_policy(self) -> EmissionPolicy {
        match self {
            Self::VectorImmediate => EmissionPolicy::InlineMacro,
            Self::VectorVector | Self::VectorScalar => EmissionPolicy::Function,
        }
    }
}

impl fmt::Display for OperandForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.letter())
    }
}

impl FromStr for OperandForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vv" => Ok(Self::VectorVector),
            "vx" => Ok(Self::VectorScalar),
            "vi" => Ok(Self::VectorImmediate),
            _ => Err(format!("invalid operand form `{s}` (expected vv, vx or vi)")),
        }
    }
}

/// Treatment of elements past the active length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TailPolicy {
    Undisturbed,
    Agnostic,
}

impl TailPolicy {
    pub const ALL: [TailPolicy; 2] = [Self::Undisturbed, Self::Agnostic];
}

impl fmt::Display for TailPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undisturbed => "tu",
            Self::Agnostic => "ta",
        })
    }
}

impl FromStr for TailPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tu" | "undisturbed" => Ok(Self::Undisturbed),
            "ta" | "agnostic" => Ok(Self::Agnostic),
            _ => Err(format!("invalid tail policy `{s}` (expected tu or ta)")),
        }
    }
}

/// Treatment of masked-off elements.
///
/// `Unmasked` selects the intrinsic form without a mask operand at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskPolicy {
    Undisturbed,
    Agnostic,
    Unmasked,
}

impl MaskPolicy {
    pub const ALL: [MaskPolicy; 3] = [Self::Undisturbed, Self::Agnostic, Self::Unmasked];

    pub const fn is_masked(self) -> bool {
        !matches!(self, Self::Unmasked)
    }
}

impl fmt::Display for MaskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undisturbed => "mu",
            Self::Agnostic => "ma",
            Self::Unmasked => "unmasked",
        })
    }
}

impl FromStr for MaskPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mu" | "undisturbed" => Ok(Self::Undisturbed),
            "ma" | "agnostic" => Ok(Self::Agnostic),
            "unmasked" | "none" => Ok(Self::Unmasked),
            _ => Err(format!("invalid mask policy `{s}` (expected mu, ma or unmasked)")),
        }
    }
}

/// Names one axis in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    ElementWidth,
    Grouping,
    OperandForm,
    TailPolicy,
    MaskPolicy,
    /// No single axis is at fault; the combination is.
    Combination,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ElementWidth => "element width",
            Self::Grouping => "grouping factor (LMUL)",
            Self::OperandForm => "operand form",
            Self::TailPolicy => "tail policy",
            Self::MaskPolicy => "mask policy",
            Self::Combination => "axis combination",
        })
    }
}

/// How a lowered unit is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmissionPolicy {
    /// A named C function.
    Function,
    /// A statement-expression macro, so immediates fold at the call site.
    InlineMacro,
}
