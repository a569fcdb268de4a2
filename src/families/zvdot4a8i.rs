//! Zvdot4a8i: packed 4x8-bit dot product with 32-bit accumulation.
//!
//! Every 32-bit element of `vs2` and `vs1` holds four bytes. The emulation
//! multiplies the byte streams with a widening multiply and then folds the
//! products back to one sum per 32-bit lane in two narrow/widen-add rounds:
//!
//! ```text
//! vs2, vs1 (e32, L, vl)
//!   -> reinterpret e8              (e8,  L,  4vl)
//!   -> widening multiply           (e16, 2L, 4vl)
//!   -> reinterpret e32, lo/hi e16  (e16, L,  2vl)
//!   -> widening add                (e32, 2L, 2vl)
//!   -> reinterpret e64, lo/hi e32  (e32, L,  vl)
//!   -> lo + hi + vd
//! ```

use crate::core::{ElementWidth, OperandForm, Shape};
use crate::ir::{AddSign, ArithOp, Half, MulSign, OpGraph, OperandRole};

use super::{Family, OperandDecl, OperationDescriptor, SupportTable};

const FAMILY: &str = "zvdot4a8i";

/// Signedness of the byte lanes of each source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lanes {
    SignedSigned,
    UnsignedUnsigned,
    SignedUnsigned,
    UnsignedSigned,
}

impl Lanes {
    const fn signed(self) -> (bool, bool) {
        match self {
            Self::SignedSigned => (true, true),
            Self::UnsignedUnsigned => (false, false),
            Self::SignedUnsigned => (true, false),
            Self::UnsignedSigned => (false, true),
        }
    }
}

fn dot(name: &'static str, lanes: Lanes, forms: &[OperandForm]) -> OperationDescriptor {
    let (vs2_signed, vs1_signed) = lanes.signed();
    let acc_signed = lanes != Lanes::UnsignedUnsigned;

    let mut g = OpGraph::new();
    let acc = g.operand(OperandRole::Accumulator);
    let vs2 = g.operand(OperandRole::Primary);
    let vs1 = g.operand(OperandRole::Secondary);
    let vs1 = g.splat(vs1, vs2);

    let a = g.reinterpret(vs2, -2);
    let b = g.reinterpret(vs1, -2);
    let products = match lanes {
        Lanes::SignedSigned => g.widen_mul(MulSign::Signed, a, b),
        Lanes::UnsignedUnsigned => g.widen_mul(MulSign::Unsigned, a, b),
        Lanes::SignedUnsigned => g.widen_mul(MulSign::SignedUnsigned, a, b),
        // The signed operand always goes first.
        Lanes::UnsignedSigned => g.widen_mul(MulSign::SignedUnsigned, b, a),
    };

    let pairs = g.reinterpret(products, 1);
    let lo = g.narrow(Half::Low, pairs);
    let hi = g.narrow(Half::High, pairs);
    let add_sign = if acc_signed { AddSign::Signed } else { AddSign::Unsigned };
    let sums = g.widen_add(add_sign, lo, hi);

    let quads = g.reinterpret(sums, 1);
    let lo = g.narrow(Half::Low, quads);
    let hi = g.narrow(Half::High, quads);
    let total = g.arith(ArithOp::Add, lo, hi);
    let result = g.arith(ArithOp::Add, total, acc);
    g.set_root(result);

    OperationDescriptor {
        family: FAMILY,
        name,
        operands: vec![
            OperandDecl::new(OperandRole::Accumulator, Shape::base(acc_signed)),
            OperandDecl::new(OperandRole::Primary, Shape::base(vs2_signed)),
            OperandDecl::new(OperandRole::Secondary, Shape::base(vs1_signed)),
        ],
        result: Shape::base(acc_signed),
        graph: g,
        support: SupportTable::new(forms)
            .widths(&[ElementWidth::E32])
            .peak_grouping(1),
    }
}

pub fn family() -> Family {
    let both = [OperandForm::VectorVector, OperandForm::VectorScalar];
    Family {
        name: FAMILY,
        summary: "packed 4x8-bit integer dot product",
        descriptors: vec![
            dot("dot4a", Lanes::SignedSigned, &both),
            dot("dot4au", Lanes::UnsignedUnsigned, &both),
            dot("dot4asu", Lanes::SignedUnsigned, &both),
            // Only the scalar form exists for unsigned x signed.
            dot("dot4aus", Lanes::UnsignedSigned, &[OperandForm::VectorScalar]),
        ],
    }
}
