//! The closed set of base operations lowered code may call.
//!
//! Vector operations map one-to-one onto RVV C intrinsics; scalar operations
//! are plain C operators used for amounts and scaled lengths.

use crate::core::ValueFormat;
use crate::ir::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseOp {
    Sll,
    Srl,
    Sra,
    And,
    Or,
    Xor,
    Not,
    Add,
    Sub,
    Rsub,
    Wmul,
    Wmulu,
    Wmulsu,
    Wadd,
    Waddu,
    Nsrl,
    Nsra,
    Reinterpret,
    Zext2,
    MvVX,
    MvVV,
    Compress,
    SlideUp,
    SlideDown,
    Merge,
    Mslt,
    LmulTrunc,
    SetVlMax,
    ScalarAnd,
    ScalarOr,
    ScalarXor,
    ScalarNot,
    ScalarAdd,
    ScalarSub,
    ScalarMul,
    ScalarDiv,
    ScalarShl,
    ScalarShr,
}

#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    /// Intrinsic stem, or the C operator for scalar operations.
    pub name: &'static str,
    pub scalar: bool,
}

impl BaseOp {
    pub const fn info(self) -> OpInfo {
        use BaseOp::*;
        match self {
            Sll => OpInfo { name: "vsll", scalar: false },
            Srl => OpInfo { name: "vsrl", scalar: false },
            Sra => OpInfo { name: "vsra", scalar: false },
            And => OpInfo { name: "vand", scalar: false },
            Or => OpInfo { name: "vor", scalar: false },
            Xor => OpInfo { name: "vxor", scalar: false },
            Not => OpInfo { name: "vnot", scalar: false },
            Add => OpInfo { name: "vadd", scalar: false },
            Sub => OpInfo { name: "vsub", scalar: false },
            Rsub => OpInfo { name: "vrsub", scalar: false },
            Wmul => OpInfo { name: "vwmul", scalar: false },
            Wmulu => OpInfo { name: "vwmulu", scalar: false },
            Wmulsu => OpInfo { name: "vwmulsu", scalar: false },
            Wadd => OpInfo { name: "vwadd", scalar: false },
            Waddu => OpInfo { name: "vwaddu", scalar: false },
            Nsrl => OpInfo { name: "vnsrl", scalar: false },
            Nsra => OpInfo { name: "vnsra", scalar: false },
            Reinterpret => OpInfo { name: "vreinterpret", scalar: false },
            Zext2 => OpInfo { name: "vzext", scalar: false },
            MvVX | MvVV => OpInfo { name: "vmv", scalar: false },
            Compress => OpInfo { name: "vcompress", scalar: false },
            SlideUp => OpInfo { name: "vslideup", scalar: false },
            SlideDown => OpInfo { name: "vslidedown", scalar: false },
            Merge => OpInfo { name: "vmerge", scalar: false },
            Mslt => OpInfo { name: "vmslt", scalar: false },
            LmulTrunc => OpInfo { name: "vlmul_trunc", scalar: false },
            SetVlMax => OpInfo { name: "vsetvlmax", scalar: false },
            ScalarAnd => OpInfo { name: "&", scalar: true },
            ScalarOr => OpInfo { name: "|", scalar: true },
            ScalarXor => OpInfo { name: "^", scalar: true },
            ScalarNot => OpInfo { name: "~", scalar: true },
            ScalarAdd => OpInfo { name: "+", scalar: true },
            ScalarSub => OpInfo { name: "-", scalar: true },
            ScalarMul => OpInfo { name: "*", scalar: true },
            ScalarDiv => OpInfo { name: "/", scalar: true },
            ScalarShl => OpInfo { name: "<<", scalar: true },
            ScalarShr => OpInfo { name: ">>", scalar: true },
        }
    }

    pub const fn is_scalar(self) -> bool {
        self.info().scalar
    }
}

/// Policy suffix of one intrinsic call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallPolicy {
    Default,
    Tu,
    Mu,
    TuMu,
}

impl CallPolicy {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Tu => "_tu",
            Self::Mu => "_mu",
            Self::TuMu => "_tumu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub(crate) u32);

impl BindingId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Argument of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arg {
    Binding(BindingId),
    /// Index into the unit's parameters.
    Param(usize),
    Literal(u64),
}

/// One lowered call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub op: BaseOp,
    /// Operand infix of the intrinsic name (`vv`, `vx`, `wx`, `v_x`, ...).
    pub operands: &'static str,
    pub args: Vec<Arg>,
    pub format: ValueFormat,
    /// Input format, for conversions whose name spells both types.
    pub source: Option<ValueFormat>,
    pub policy: CallPolicy,
    /// Graph node this binding was lowered from; `None` for derived lengths
    /// and masks shared across nodes.
    pub node: Option<NodeId>,
}

impl Binding {
    /// Intrinsic name for vector operations, operator for scalar ones.
    pub fn callee(&self) -> String {
        let info = self.op.info();
        if info.scalar {
            return info.name.to_string();
        }
        let source = self.source.unwrap_or(self.format);
        match self.op {
            BaseOp::Reinterpret | BaseOp::LmulTrunc => format!(
                "__riscv_{}_v_{}_{}",
                info.name,
                source.type_tag(),
                self.format.type_tag()
            ),
            BaseOp::Mslt => format!(
                "__riscv_{}_{}_{}_{}",
                info.name,
                self.operands,
                source.type_tag(),
                self.format.type_tag()
            ),
            BaseOp::SetVlMax => format!(
                "__riscv_{}_e{}{}",
                info.name,
                source.width.bits(),
                source.lmul.suffix()
            ),
            _ => format!(
                "__riscv_{}_{}_{}{}",
                info.name,
                self.operands,
                self.format.type_tag(),
                self.policy.suffix()
            ),
        }
    }
}
