//! Zvabd: vector absolute value.

use crate::core::{OperandForm, Shape};
use crate::ir::{ArithOp, ConstExpr, OpGraph, OperandRole};

use super::{Family, OperandDecl, OperationDescriptor, SupportTable};

const FAMILY: &str = "zvabd";

/// `vs2 < 0 ? 0 - vs2 : vs2`.
fn abs() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let vs2 = g.operand(OperandRole::Primary);
    let zero = g.constant(ConstExpr::Literal(0));
    let negative = g.less_than(vs2, zero);
    let negated = g.arith(ArithOp::RevSub, vs2, zero);
    let magnitude = g.merge(vs2, negated, negative);
    let result = g.commit(magnitude);
    g.set_root(result);

    OperationDescriptor {
        family: FAMILY,
        name: "abs",
        operands: vec![OperandDecl::new(OperandRole::Primary, Shape::base(true))],
        result: Shape::base(true),
        graph: g,
        support: SupportTable::new(&[OperandForm::VectorVector]).all_policies(),
    }
}

pub fn family() -> Family {
    Family {
        name: FAMILY,
        summary: "vector absolute value",
        descriptors: vec![abs()],
    }
}
