//! Zvzip: interleave, deinterleave and pairing.
//!
//! `vl` always counts elements of the `(w, L)` side: zip reads `vl`
//! elements from each source and writes `2 * vl`, unzip reads `2 * vl` and
//! writes `vl`.

use crate::core::{ElementWidth, OperandForm, Shape};
use crate::ir::{ConstExpr, NodeId, OpGraph, OperandRole, ShiftDir, SlideDir};

use super::{Family, OperandDecl, OperationDescriptor, SupportTable};

const FAMILY: &str = "zvzip";

/// Mask bit `i` set for even `i`.
const EVEN_LANES: u8 = 0x55;
/// Mask bit `i` set for odd `i`.
const ODD_LANES: u8 = 0xaa;

fn table() -> SupportTable {
    SupportTable::new(&[OperandForm::VectorVector]).all_policies()
}

fn binary(name: &'static str, graph: OpGraph, result: Shape, peak: i8) -> OperationDescriptor {
    OperationDescriptor {
        family: FAMILY,
        name,
        operands: vec![
            OperandDecl::new(OperandRole::Primary, Shape::base(false)),
            OperandDecl::new(OperandRole::Secondary, Shape::base(false)),
        ],
        result,
        graph,
        support: table().peak_grouping(peak),
    }
}

/// Zero-extend both sources to double width and move `vs1` into the high
/// half, which becomes the odd lane once relabeled at the original width.
fn zip_widening(g: &mut OpGraph, vs2: NodeId, vs1: NodeId) -> NodeId {
    let even = g.zero_extend(vs2);
    let odd = g.zero_extend(vs1);
    let bits = g.constant(ConstExpr::ElementBits);
    let odd = g.shift(ShiftDir::Left, odd, bits);
    let pairs = g.or(even, odd);
    g.reinterpret(pairs, -1)
}

/// Without a wider element, work on 32-bit halves. After zero extension
/// every source element occupies four halves, and slides move them into
/// place before a merge picks the odd source for the upper two:
///
/// ```text
/// a:  [a.lo, 0, a.hi, 0] -> slide down 1 under 0b0110      -> [a.lo, a.hi, 0,    0   ]
/// b:  [b.lo, 0, b.hi, 0] -> slide up 2, up 1 under 0b1000  -> [..,   ..,   b.lo, b.hi]
/// merge under 0b1100                                       -> [a.lo, a.hi, b.lo, b.hi]
/// ```
fn zip_halves(g: &mut OpGraph, vs2: NodeId, vs1: NodeId) -> NodeId {
    let spread = |g: &mut OpGraph, source: NodeId| {
        let halves = g.reinterpret(source, -1);
        let wide = g.zero_extend(halves);
        g.reinterpret(wide, -1)
    };
    let a = spread(g, vs2);
    let b = spread(g, vs1);

    let a_mask = g.lane_mask(0x66, a);
    let a_part = g.slide(SlideDir::Down, a, 1, Some(a), Some(a_mask));

    let b_up = g.slide(SlideDir::Up, b, 2, Some(b), None);
    let b_mask = g.lane_mask(0x88, b);
    let b_part = g.slide(SlideDir::Up, b, 1, Some(b_up), Some(b_mask));

    let select = g.lane_mask(0xcc, a);
    let merged = g.merge(a_part, b_part, select);
    g.reinterpret(merged, 1)
}

fn zip() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let vs2 = g.operand(OperandRole::Primary);
    let vs1 = g.operand(OperandRole::Secondary);
    let narrow = zip_widening(&mut g, vs2, vs1);
    let wide = zip_halves(&mut g, vs2, vs1);
    let zipped = g.width_switch(ElementWidth::E32, wide, narrow);
    let result = g.commit(zipped);
    g.set_root(result);
    binary("zip", g, Shape::grouped(1, false), 1)
}

fn unzip(name: &'static str, pattern: u8) -> OperationDescriptor {
    let mut g = OpGraph::new();
    let vs2 = g.operand(OperandRole::Primary);
    let select = g.lane_mask(pattern, vs2);
    let packed = g.compress(vs2, select);
    let half = g.truncate(packed);
    let result = g.commit(half);
    g.set_root(result);

    OperationDescriptor {
        family: FAMILY,
        name,
        operands: vec![OperandDecl::new(OperandRole::Primary, Shape::grouped(1, false))],
        result: Shape::base(false),
        graph: g,
        support: table().peak_grouping(1),
    }
}

/// `r[2i] = vs2[2i]`, `r[2i+1] = vs1[2i]`.
fn paire() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let vs2 = g.operand(OperandRole::Primary);
    let vs1 = g.operand(OperandRole::Secondary);
    let shifted = g.slide(SlideDir::Up, vs1, 1, Some(vs2), None);
    let odd = g.lane_mask(ODD_LANES, vs2);
    let paired = g.merge(vs2, shifted, odd);
    let result = g.commit(paired);
    g.set_root(result);
    binary("paire", g, Shape::base(false), 0)
}

/// `r[2i] = vs2[2i+1]`, `r[2i+1] = vs1[2i+1]`.
fn pairo() -> OperationDescriptor {
    let mut g = OpGraph::new();
    let vs2 = g.operand(OperandRole::Primary);
    let vs1 = g.operand(OperandRole::Secondary);
    let shifted = g.slide(SlideDir::Down, vs2, 1, None, None);
    let even = g.lane_mask(EVEN_LANES, vs1);
    let paired = g.merge(vs1, shifted, even);
    let result = g.commit(paired);
    g.set_root(result);
    binary("pairo", g, Shape::base(false), 0)
}

pub fn family() -> Family {
    Family {
        name: FAMILY,
        summary: "vector interleave, deinterleave and pairing",
        descriptors: vec![
            zip(),
            unzip("unzipe", EVEN_LANES),
            unzip("unzipo", ODD_LANES),
            paire(),
            pairo(),
        ],
    }
}
