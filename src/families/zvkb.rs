//! Zvkb: vector cryptography bit-manipulation.
//!
//! Rotates, and-not and the two in-element reversals, all expressed with
//! shifts and logical operations available in the base V extension.

use crate::core::{ElementWidth, OperandForm, Shape};
use crate::ir::{ArithOp, ConstExpr, NodeId, OpGraph, OperandRole, ShiftDir};

use super::{Family, OperandDecl, OperationDescriptor, SupportTable};

const FAMILY: &str = "zvkb";

fn unary(name: &'static str, graph: OpGraph) -> OperationDescriptor {
    OperationDescriptor {
        family: FAMILY,
        name,
        operands: vec![OperandDecl::new(OperandRole::Primary, Shape::base(false))],
        result: Shape::base(false),
        graph,
        support: SupportTable::new(&[OperandForm::VectorVector]),
    }
}

/// `x rot n = (x >> n) | (x << ((w - n) & (w - 1)))` for right rotates, with
/// the shift directions swapped for left rotates.
///
/// The complement is masked so that `n = 0` never asks for a full-width
/// shift; the shift by `n` itself relies on RVV using only the low
/// `log2(SEW)` bits of the amount.
fn rotate(name: &'static str, dir: ShiftDir, forms: &[OperandForm]) -> OperationDescriptor {
    let opposite = match dir {
        ShiftDir::Left => ShiftDir::Right,
        ShiftDir::Right => ShiftDir::Left,
    };

    let mut g = OpGraph::new();
    let x = g.operand(OperandRole::Primary);
    let n = g.operand(OperandRole::Secondary);
    let bits = g.constant(ConstExpr::ElementBits);
    let shift_mask = g.constant(ConstExpr::ShiftMask);
    let complement = g.arith(ArithOp::RevSub, n, bits);
    let complement = g.and(complement, shift_mask);
    let near = g.shift(dir, x, n);
    let far = g.shift(opposite, x, complement);
    let result = g.or(near, far);
    g.set_root(result);

    OperationDescriptor {
        family: FAMILY,
        name,
        operands: vec![
            OperandDecl::new(OperandRole::Primary, Shape::base(false)),
            OperandDecl::amount(Shape::base(false)),
        ],
        result: Shape::base(false),
        graph: g,
        support: SupportTable::new(forms),
    }
}

fn andn() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let x = g.operand(OperandRole::Primary);
    let y = g.operand(OperandRole::Secondary);
    let not_y = g.invert(y);
    let result = g.and(x, not_y);
    g.set_root(result);

    OperationDescriptor {
        family: FAMILY,
        name: "andn",
        operands: vec![
            OperandDecl::new(OperandRole::Primary, Shape::base(false)),
            OperandDecl::new(OperandRole::Secondary, Shape::base(false)),
        ],
        result: Shape::base(false),
        graph: g,
        support: SupportTable::new(&[OperandForm::VectorVector, OperandForm::VectorScalar]),
    }
}

/// One swap step: `((x >> s) & m) | ((x & m) << s)`.
fn swap_step(g: &mut OpGraph, x: NodeId, shift: u64, mask: u64) -> NodeId {
    let s = g.constant(ConstExpr::Literal(shift));
    let m = g.constant(ConstExpr::Pattern(mask));
    let high = g.shift(ShiftDir::Right, x, s);
    let high = g.and(high, m);
    let low = g.and(x, m);
    let low = g.shift(ShiftDir::Left, low, s);
    g.or(high, low)
}

fn brev8() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let mut x = g.operand(OperandRole::Primary);
    for (shift, mask) in [
        (4, 0x0f0f_0f0f_0f0f_0f0f),
        (2, 0x3333_3333_3333_3333),
        (1, 0x5555_5555_5555_5555),
    ] {
        x = swap_step(&mut g, x, shift, mask);
    }
    g.set_root(x);
    unary("brev8", g)
}

/// Byte reversal swaps halves of ever smaller chunks; a step only exists
/// for elements wider than the chunk it splits.
fn rev8() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let mut x = g.operand(OperandRole::Primary);
    for (above, shift, mask) in [
        (ElementWidth::E32, 32, 0x0000_0000_ffff_ffff),
        (ElementWidth::E16, 16, 0x0000_ffff_0000_ffff),
        (ElementWidth::E8, 8, 0x00ff_00ff_00ff_00ff),
    ] {
        let swapped = swap_step(&mut g, x, shift, mask);
        x = g.width_switch(above, swapped, x);
    }
    g.set_root(x);
    unary("rev8", g)
}

pub fn family() -> Family {
    Family {
        name: FAMILY,
        summary: "vector cryptography bit-manipulation",
        descriptors: vec![
            rotate(
                "ror",
                ShiftDir::Right,
                &[
                    OperandForm::VectorVector,
                    OperandForm::VectorScalar,
                    OperandForm::VectorImmediate,
                ],
            ),
            rotate(
                "rol",
                ShiftDir::Left,
                &[OperandForm::VectorVector, OperandForm::VectorScalar],
            ),
            andn(),
            brev8(),
            rev8(),
        ],
    }
}
