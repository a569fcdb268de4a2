// This module implements the lowering engine. Given an operation descriptor and one of
// its concrete variants, it resolves the formal parameters (operands plus the vm/vd
// policy parameters and vl), schedules the reachable part of the operation graph in a
// single post-order pass, and lowers every node into at most a few bindings onto the
// base-operation catalogue. Each value carries its resolved format and its element
// count relative to vl, so widening, narrowing, reinterpreting and truncating nodes
// rescale the active length they pass on. Results are memoized by node index, which
// makes shared subtrees lower exactly once, and derived values (scaled lengths, the
// vsetvlmax used by lane masks, the lane masks themselves) are created at most once per
// unit. Inconsistencies are reported with the descriptor, the variant and the node.

//! Lowering of descriptors into emission units.

use hashbrown::HashMap;
use log::{debug, trace};

use crate::core::{
    ElementWidth, EmissionPolicy, GenError, GenResult, Lmul, MaskPolicy, TailPolicy, ValueFormat,
    ValueKind,
};
use crate::expand::ConcreteVariant;
use crate::families::OperationDescriptor;
use crate::ir::{
    AddSign, ArithOp, BitOp, Half, MulSign, Node, NodeId, OperandRole, ShiftDir, SignChange,
    SlideDir,
};

pub mod catalogue;

pub use catalogue::{Arg, BaseOp, Binding, BindingId, CallPolicy, OpInfo};

/// What a unit parameter stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Operand(OperandRole),
    /// `vm`, present for masked policies.
    Mask,
    /// `vd`, present when tail or mask elements are undisturbed.
    Dest,
    /// `vl`, always last.
    Length,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub format: ValueFormat,
    pub kind: ParamKind,
}

/// The lowering of one concrete variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionUnit {
    pub name: String,
    pub family: &'static str,
    pub descriptor: &'static str,
    pub variant: ConcreteVariant,
    pub params: Vec<Param>,
    pub result: ValueFormat,
    pub bindings: Vec<Binding>,
    pub ret: Arg,
}

impl EmissionUnit {
    pub fn emission(&self) -> EmissionPolicy {
        self.variant.emission()
    }

    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.get(id.index())
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Whether any binding or the return value reads parameter `index`.
    pub fn uses_param(&self, index: usize) -> bool {
        self.ret == Arg::Param(index)
            || self
                .bindings
                .iter()
                .any(|b| b.args.contains(&Arg::Param(index)))
    }
}

fn policy_suffix(tail: TailPolicy, mask: MaskPolicy) -> &'static str {
    match (tail, mask) {
        (TailPolicy::Agnostic, MaskPolicy::Unmasked) => "",
        (TailPolicy::Undisturbed, MaskPolicy::Unmasked) => "_tu",
        (TailPolicy::Agnostic, MaskPolicy::Agnostic) => "_m",
        (TailPolicy::Agnostic, MaskPolicy::Undisturbed) => "_mu",
        (TailPolicy::Undisturbed, MaskPolicy::Agnostic) => "_tum",
        (TailPolicy::Undisturbed, MaskPolicy::Undisturbed) => "_tumu",
    }
}

/// Deterministic unit name, e.g. `__riscv_vror_vx_u32m1` or
/// `__riscv_vzip_vv_u16m2_tumu`.
pub fn unit_name(
    descriptor: &OperationDescriptor,
    variant: &ConcreteVariant,
    result: ValueFormat,
) -> String {
    let forms: String = descriptor
        .operands
        .iter()
        .filter_map(|decl| match decl.role {
            OperandRole::Primary => Some('v'),
            OperandRole::Secondary => Some(variant.form().letter()),
            OperandRole::Accumulator => None,
        })
        .collect();
    format!(
        "__riscv_v{}_{}_{}{}",
        descriptor.name,
        forms,
        result.type_tag(),
        policy_suffix(variant.tail(), variant.mask())
    )
}

#[derive(Debug, Clone, Copy)]
struct Lowered {
    arg: Arg,
    format: ValueFormat,
    /// log2 of the element count relative to `vl`.
    count: i8,
}

impl Lowered {
    fn literal(value: u64) -> Self {
        Self { arg: Arg::Literal(value), format: ValueFormat::literal(), count: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Derived {
    Length(i8),
    VlMax(ValueFormat),
    LaneMask(u8, ValueFormat),
}

type Step<T> = Result<T, String>;

fn same_shape(a: ValueFormat, b: ValueFormat) -> Step<()> {
    if a.width == b.width && a.lmul == b.lmul {
        Ok(())
    } else {
        Err(format!("operand shapes differ: {} vs {}", a.type_tag(), b.type_tag()))
    }
}

fn widened(format: ValueFormat) -> Step<ValueFormat> {
    let width = format
        .width
        .scaled(1)
        .ok_or_else(|| format!("widening {} exceeds the widest element", format.type_tag()))?;
    let lmul = format
        .lmul
        .scaled(1)
        .ok_or_else(|| format!("widening {} exceeds LMUL {}", format.type_tag(), Lmul::MAX))?;
    Ok(ValueFormat::vector(width, lmul, format.signed))
}

fn narrowed(format: ValueFormat) -> Step<ValueFormat> {
    let width = format
        .width
        .scaled(-1)
        .ok_or_else(|| format!("narrowing {} below e8", format.type_tag()))?;
    let lmul = format
        .lmul
        .scaled(-1)
        .filter(|l| l.is_valid_for(width))
        .ok_or_else(|| format!("narrowing {} below the smallest grouping", format.type_tag()))?;
    Ok(ValueFormat::vector(width, lmul, format.signed))
}

/// Format of a scalar computation over `a` and `b`.
fn scalar_format(a: Lowered, b: Option<Lowered>) -> ValueFormat {
    let candidates = std::iter::once(a).chain(b);
    let mut format = ValueFormat::literal();
    for value in candidates {
        match value.format.kind {
            ValueKind::Scalar => return value.format,
            ValueKind::Immediate | ValueKind::Length => format = ValueFormat::length(),
            _ => {}
        }
    }
    format
}

fn fold(op: BaseOp, x: u64, y: u64) -> Option<u64> {
    Some(match op {
        BaseOp::ScalarAnd => x & y,
        BaseOp::ScalarOr => x | y,
        BaseOp::ScalarXor => x ^ y,
        BaseOp::ScalarAdd => x.wrapping_add(y),
        BaseOp::ScalarSub => x.wrapping_sub(y),
        BaseOp::ScalarMul => x.wrapping_mul(y),
        BaseOp::ScalarDiv => x.checked_div(y)?,
        BaseOp::ScalarShl => x.checked_shl(u32::try_from(y).ok()?)?,
        BaseOp::ScalarShr => x.checked_shr(u32::try_from(y).ok()?)?,
        _ => return None,
    })
}

struct Lowerer<'d> {
    descriptor: &'d OperationDescriptor,
    variant: ConcreteVariant,
    result: ValueFormat,
    params: Vec<Param>,
    /// (role, parameter index, count) per declared operand.
    operands: Vec<(OperandRole, usize, i8)>,
    vl: usize,
    vd: Option<usize>,
    vm: Option<usize>,
    bindings: Vec<Binding>,
    memo: Vec<Option<Lowered>>,
    derived: HashMap<Derived, Lowered>,
    node: Option<NodeId>,
}

impl<'d> Lowerer<'d> {
    fn new(descriptor: &'d OperationDescriptor, variant: ConcreteVariant) -> Step<Self> {
        let (width, lmul, form) = (variant.width(), variant.lmul(), variant.form());
        let (rw, rl) = descriptor
            .result
            .resolve(width, lmul)
            .ok_or("declared result shape has no register type for this variant")?;
        let result = ValueFormat::vector(rw, rl, descriptor.result.signed);

        let mut params = Vec::new();
        let mut vm = None;
        let mut vd = None;
        if variant.mask().is_masked() {
            vm = Some(params.len());
            params.push(Param { name: "vm", format: result.mask(), kind: ParamKind::Mask });
        }
        if variant.tail() == TailPolicy::Undisturbed || variant.mask() == MaskPolicy::Undisturbed {
            vd = Some(params.len());
            params.push(Param { name: "vd", format: result, kind: ParamKind::Dest });
        }

        let mut operands = Vec::new();
        for decl in &descriptor.operands {
            let format = decl.format(width, lmul, form).ok_or_else(|| {
                format!("operand {:?} has no register type for this variant", decl.role)
            })?;
            operands.push((decl.role, params.len(), decl.shape.count_shift()));
            params.push(Param {
                name: decl.name(form),
                format,
                kind: ParamKind::Operand(decl.role),
            });
        }

        let vl = params.len();
        params.push(Param { name: "vl", format: ValueFormat::length(), kind: ParamKind::Length });

        Ok(Self {
            descriptor,
            variant,
            result,
            params,
            operands,
            vl,
            vd,
            vm,
            bindings: Vec::new(),
            memo: vec![None; descriptor.graph.len()],
            derived: HashMap::new(),
            node: None,
        })
    }

    fn node(&self, id: NodeId) -> Step<&'d Node> {
        self.descriptor
            .graph
            .node(id)
            .ok_or_else(|| format!("reference to missing node {id}"))
    }

    /// Children that are lowered under this variant.
    fn live_children(&self, node: &Node) -> Vec<NodeId> {
        match *node {
            Node::WidthSwitch { above, wide, narrow } => {
                vec![if self.variant.width() > above { wide } else { narrow }]
            }
            _ => node.children().collect(),
        }
    }

    /// Post-order of the nodes reachable from `root`.
    fn schedule(&self, root: NodeId) -> Result<Vec<NodeId>, (NodeId, String)> {
        let len = self.descriptor.graph.len();
        let mut seen = vec![false; len];
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            let node = self.node(id).map_err(|e| (id, e))?;
            if seen[id.index()] {
                continue;
            }
            seen[id.index()] = true;
            stack.push((id, true));
            for child in self.live_children(node).into_iter().rev() {
                if child.index() >= len {
                    return Err((id, format!("reference to missing node {child}")));
                }
                if !seen[child.index()] {
                    stack.push((child, false));
                }
            }
        }
        Ok(order)
    }

    fn get(&self, id: NodeId) -> Step<Lowered> {
        self.memo
            .get(id.index())
            .copied()
            .flatten()
            .ok_or_else(|| format!("child {id} was never lowered"))
    }

    fn vector(&self, id: NodeId) -> Step<Lowered> {
        let value = self.get(id)?;
        if value.format.is_vector() {
            Ok(value)
        } else {
            Err(format!("{id} is not a vector"))
        }
    }

    /// A mask selecting elements of `target`.
    fn mask_for(&self, id: NodeId, target: ValueFormat) -> Step<Lowered> {
        let value = self.get(id)?;
        if value.format.is_mask() && value.format.mask_ratio() == target.mask_ratio() {
            Ok(value)
        } else {
            Err(format!("{id} is not a mask for {}", target.type_tag()))
        }
    }

    fn operand_param(&self, role: OperandRole) -> Step<(usize, i8)> {
        self.operands
            .iter()
            .find(|(r, _, _)| *r == role)
            .map(|(_, index, count)| (*index, *count))
            .ok_or_else(|| format!("operand {role:?} is not declared"))
    }

    fn emit(
        &mut self,
        op: BaseOp,
        operands: &'static str,
        args: Vec<Arg>,
        format: ValueFormat,
        source: Option<ValueFormat>,
        policy: CallPolicy,
    ) -> Arg {
        let id = BindingId(self.bindings.len() as u32);
        let binding = Binding { op, operands, args, format, source, policy, node: self.node };
        trace!("  b{} = {} {:?}", id.index(), binding.callee(), binding.args);
        self.bindings.push(binding);
        Arg::Binding(id)
    }

    /// Emit a binding shared by several nodes.
    fn emit_derived(
        &mut self,
        op: BaseOp,
        operands: &'static str,
        args: Vec<Arg>,
        format: ValueFormat,
        source: Option<ValueFormat>,
    ) -> Arg {
        let node = self.node.take();
        let arg = self.emit(op, operands, args, format, source, CallPolicy::Default);
        self.node = node;
        arg
    }

    /// `vl` scaled by `2^count`.
    fn vl(&mut self, count: i8) -> Arg {
        if count == 0 {
            return Arg::Param(self.vl);
        }
        if let Some(value) = self.derived.get(&Derived::Length(count)) {
            return value.arg;
        }
        let factor = 1u64 << u32::from(count.unsigned_abs());
        let op = if count > 0 { BaseOp::ScalarMul } else { BaseOp::ScalarDiv };
        let arg = self.emit_derived(
            op,
            "",
            vec![Arg::Param(self.vl), Arg::Literal(factor)],
            ValueFormat::length(),
            None,
        );
        self.derived.insert(
            Derived::Length(count),
            Lowered { arg, format: ValueFormat::length(), count: 0 },
        );
        arg
    }

    fn vlmax(&mut self, format: ValueFormat) -> Arg {
        if let Some(value) = self.derived.get(&Derived::VlMax(format)) {
            return value.arg;
        }
        let arg = self.emit_derived(BaseOp::SetVlMax, "", Vec::new(), ValueFormat::length(), Some(format));
        self.derived.insert(
            Derived::VlMax(format),
            Lowered { arg, format: ValueFormat::length(), count: 0 },
        );
        arg
    }

    /// Byte pattern broadcast over a full register and relabeled as a mask.
    fn lane_mask(&mut self, pattern: u8, mask: ValueFormat) -> Arg {
        if let Some(value) = self.derived.get(&Derived::LaneMask(pattern, mask)) {
            return value.arg;
        }
        let bytes = ValueFormat::vector(ElementWidth::E8, Lmul::M1, false);
        let vlmax = self.vlmax(bytes);
        let splat = self.emit_derived(
            BaseOp::MvVX,
            "v_x",
            vec![Arg::Literal(u64::from(pattern)), vlmax],
            bytes,
            None,
        );
        let arg = self.emit_derived(BaseOp::Reinterpret, "v", vec![splat], mask, Some(bytes));
        self.derived.insert(Derived::LaneMask(pattern, mask), Lowered { arg, format: mask, count: 0 });
        arg
    }

    fn vector_binary(&mut self, op: BaseOp, v: Lowered, a: Lowered) -> Step<Lowered> {
        let operands = if a.format.is_vector() {
            same_shape(v.format, a.format)?;
            if v.count != a.count {
                return Err("vector operands have different active lengths".to_string());
            }
            "vv"
        } else if a.format.is_scalar_like() {
            "vx"
        } else {
            return Err("a mask is not a valid arithmetic operand".to_string());
        };
        let vl = self.vl(v.count);
        let arg = self.emit(op, operands, vec![v.arg, a.arg, vl], v.format, None, CallPolicy::Default);
        Ok(Lowered { arg, format: v.format, count: v.count })
    }

    fn scalar_binary(&mut self, op: BaseOp, a: Lowered, b: Lowered) -> Step<Lowered> {
        if !a.format.is_scalar_like() || !b.format.is_scalar_like() {
            return Err("scalar operation over a register value".to_string());
        }
        if let (Arg::Literal(x), Arg::Literal(y)) = (a.arg, b.arg) {
            return fold(op, x, y)
                .map(Lowered::literal)
                .ok_or_else(|| format!("cannot fold {x} {} {y}", op.info().name));
        }
        let format = scalar_format(a, Some(b));
        let arg = self.emit(op, "", vec![a.arg, b.arg], format, None, CallPolicy::Default);
        Ok(Lowered { arg, format, count: 0 })
    }

    fn commutative(&mut self, vop: BaseOp, sop: BaseOp, l: Lowered, r: Lowered) -> Step<Lowered> {
        if l.format.is_vector() {
            self.vector_binary(vop, l, r)
        } else if r.format.is_vector() {
            self.vector_binary(vop, r, l)
        } else {
            self.scalar_binary(sop, l, r)
        }
    }

    fn lower_node(&mut self, node: &Node) -> Step<Lowered> {
        let width = self.variant.width();
        match *node {
            Node::Operand(role) => {
                let (index, count) = self.operand_param(role)?;
                Ok(Lowered { arg: Arg::Param(index), format: self.params[index].format, count })
            }

            Node::Constant(value) => Ok(Lowered::literal(value.evaluate(width))),

            Node::Shift { dir, value, amount } => {
                let (v, a) = (self.get(value)?, self.get(amount)?);
                if v.format.is_vector() {
                    let op = match dir {
                        ShiftDir::Left => BaseOp::Sll,
                        ShiftDir::Right if v.format.signed => BaseOp::Sra,
                        ShiftDir::Right => BaseOp::Srl,
                    };
                    self.vector_binary(op, v, a)
                } else {
                    let op = match dir {
                        ShiftDir::Left => BaseOp::ScalarShl,
                        ShiftDir::Right => BaseOp::ScalarShr,
                    };
                    self.scalar_binary(op, v, a)
                }
            }

            Node::Bitwise { op, lhs, rhs } => {
                let (l, r) = (self.get(lhs)?, self.get(rhs)?);
                let (vop, sop) = match op {
                    BitOp::And => (BaseOp::And, BaseOp::ScalarAnd),
                    BitOp::Or => (BaseOp::Or, BaseOp::ScalarOr),
                    BitOp::Xor => (BaseOp::Xor, BaseOp::ScalarXor),
                };
                self.commutative(vop, sop, l, r)
            }

            Node::Invert(value) => {
                let v = self.get(value)?;
                if v.format.is_vector() {
                    let vl = self.vl(v.count);
                    let arg = self.emit(BaseOp::Not, "v", vec![v.arg, vl], v.format, None, CallPolicy::Default);
                    Ok(Lowered { arg, ..v })
                } else if let Arg::Literal(x) = v.arg {
                    Ok(Lowered::literal(!x & width.mask()))
                } else if v.format.is_scalar_like() {
                    let format = scalar_format(v, None);
                    let arg = self.emit(BaseOp::ScalarNot, "", vec![v.arg], format, None, CallPolicy::Default);
                    Ok(Lowered { arg, format, count: 0 })
                } else {
                    Err("cannot invert a mask".to_string())
                }
            }

            Node::Arith { op, lhs, rhs } => {
                let (l, r) = (self.get(lhs)?, self.get(rhs)?);
                match (l.format.is_vector(), r.format.is_vector(), op) {
                    (true, _, ArithOp::Add) => self.vector_binary(BaseOp::Add, l, r),
                    (false, true, ArithOp::Add) => self.vector_binary(BaseOp::Add, r, l),
                    (true, _, ArithOp::Sub) => self.vector_binary(BaseOp::Sub, l, r),
                    (true, true, ArithOp::RevSub) => self.vector_binary(BaseOp::Sub, r, l),
                    (true, false, ArithOp::RevSub) => self.vector_binary(BaseOp::Rsub, l, r),
                    (false, true, ArithOp::Sub) => self.vector_binary(BaseOp::Rsub, r, l),
                    (false, true, ArithOp::RevSub) => self.vector_binary(BaseOp::Sub, r, l),
                    (false, false, ArithOp::Add) => self.scalar_binary(BaseOp::ScalarAdd, l, r),
                    (false, false, ArithOp::Sub) => self.scalar_binary(BaseOp::ScalarSub, l, r),
                    (false, false, ArithOp::RevSub) => self.scalar_binary(BaseOp::ScalarSub, r, l),
                }
            }

            Node::WidenMul { sign, lhs, rhs } => {
                let (l, r) = (self.vector(lhs)?, self.vector(rhs)?);
                let (op, want, signed) = match sign {
                    MulSign::Signed => (BaseOp::Wmul, (true, true), true),
                    MulSign::Unsigned => (BaseOp::Wmulu, (false, false), false),
                    MulSign::SignedUnsigned => (BaseOp::Wmulsu, (true, false), true),
                };
                self.widening(op, want, signed, l, r)
            }

            Node::WidenAdd { sign, lhs, rhs } => {
                let (l, r) = (self.vector(lhs)?, self.vector(rhs)?);
                let (op, signed) = match sign {
                    AddSign::Signed => (BaseOp::Wadd, true),
                    AddSign::Unsigned => (BaseOp::Waddu, false),
                };
                self.widening(op, (signed, signed), signed, l, r)
            }

            Node::NarrowExtract { half, value } => {
                let v = self.vector(value)?;
                let format = narrowed(v.format)?;
                let shift = match half {
                    Half::Low => 0,
                    Half::High => u64::from(format.width.bits()),
                };
                let op = if v.format.signed { BaseOp::Nsra } else { BaseOp::Nsrl };
                let vl = self.vl(v.count);
                let arg = self.emit(op, "wx", vec![v.arg, Arg::Literal(shift), vl], format, None, CallPolicy::Default);
                Ok(Lowered { arg, format, count: v.count })
            }

            Node::Reinterpret { value, width_shift, sign } => {
                let mut v = self.vector(value)?;
                let signed = match sign {
                    SignChange::Keep => v.format.signed,
                    SignChange::ToSigned => true,
                    SignChange::ToUnsigned => false,
                };
                // Sign and width are relabeled by separate intrinsics.
                if signed != v.format.signed {
                    let format = v.format.with_signed(signed);
                    let arg = self.emit(BaseOp::Reinterpret, "v", vec![v.arg], format, Some(v.format), CallPolicy::Default);
                    v = Lowered { arg, format, count: v.count };
                }
                if width_shift != 0 {
                    let to = v
                        .format
                        .width
                        .scaled(width_shift)
                        .filter(|w| v.format.lmul.is_valid_for(*w))
                        .ok_or_else(|| format!("cannot reinterpret {} by 2^{width_shift}", v.format.type_tag()))?;
                    let format = ValueFormat::vector(to, v.format.lmul, signed);
                    let count = v.count + v.format.width.log2() - to.log2();
                    let arg = self.emit(BaseOp::Reinterpret, "v", vec![v.arg], format, Some(v.format), CallPolicy::Default);
                    v = Lowered { arg, format, count };
                }
                Ok(v)
            }

            Node::ZeroExtend(value) => {
                let v = self.vector(value)?;
                if v.format.signed {
                    return Err("zero extension of a signed vector".to_string());
                }
                let format = widened(v.format)?;
                let vl = self.vl(v.count);
                let arg = self.emit(BaseOp::Zext2, "vf2", vec![v.arg, vl], format, None, CallPolicy::Default);
                Ok(Lowered { arg, format, count: v.count })
            }

            Node::Splat { value, like } => {
                let like = self.vector(like)?;
                let v = self.get(value)?;
                if v.format.is_vector() {
                    same_shape(v.format, like.format)?;
                    return Ok(v);
                }
                if !v.format.is_scalar_like() {
                    return Err("cannot broadcast a mask".to_string());
                }
                let signed = if v.format.kind == ValueKind::Scalar { v.format.signed } else { like.format.signed };
                let format = ValueFormat::vector(like.format.width, like.format.lmul, signed);
                let vl = self.vl(like.count);
                let arg = self.emit(BaseOp::MvVX, "v_x", vec![v.arg, vl], format, None, CallPolicy::Default);
                Ok(Lowered { arg, format, count: like.count })
            }

            Node::Compress { value, mask } => {
                let v = self.vector(value)?;
                let m = self.mask_for(mask, v.format)?;
                let vl = self.vl(v.count);
                let arg = self.emit(BaseOp::Compress, "vm", vec![v.arg, m.arg, vl], v.format, None, CallPolicy::Default);
                Ok(Lowered { arg, ..v })
            }

            Node::Slide { dir, value, offset, dest, mask } => {
                let v = self.vector(value)?;
                let dest = dest.map(|d| self.vector(d)).transpose()?;
                let mask = mask.map(|m| self.mask_for(m, v.format)).transpose()?;
                if let Some(d) = dest {
                    if d.format != v.format {
                        return Err(format!(
                            "slide destination {} does not match source {}",
                            d.format.type_tag(),
                            v.format.type_tag()
                        ));
                    }
                }
                let offset = Arg::Literal(u64::from(offset));
                let (args, policy) = match (dir, dest, mask) {
                    (_, Some(d), Some(m)) => (vec![m.arg, d.arg, v.arg, offset], CallPolicy::Mu),
                    (_, None, Some(_)) => {
                        return Err("masked slide needs a destination for inactive elements".to_string())
                    }
                    (SlideDir::Up, Some(d), None) => (vec![d.arg, v.arg, offset], CallPolicy::Default),
                    (SlideDir::Up, None, None) => {
                        return Err("slide up needs a destination for vacated elements".to_string())
                    }
                    (SlideDir::Down, None, None) => (vec![v.arg, offset], CallPolicy::Default),
                    (SlideDir::Down, Some(_), None) => {
                        return Err("unmasked slide down takes no destination".to_string())
                    }
                };
                let op = match dir {
                    SlideDir::Up => BaseOp::SlideUp,
                    SlideDir::Down => BaseOp::SlideDown,
                };
                let vl = self.vl(v.count);
                let mut args = args;
                args.push(vl);
                let arg = self.emit(op, "vx", args, v.format, None, policy);
                Ok(Lowered { arg, ..v })
            }

            Node::Merge { on_false, on_true, mask } => {
                let (f, t) = (self.vector(on_false)?, self.vector(on_true)?);
                if f.format != t.format || f.count != t.count {
                    return Err(format!(
                        "merge sources differ: {} vs {}",
                        f.format.type_tag(),
                        t.format.type_tag()
                    ));
                }
                let m = self.mask_for(mask, f.format)?;
                let vl = self.vl(f.count);
                let arg = self.emit(BaseOp::Merge, "vvm", vec![f.arg, t.arg, m.arg, vl], f.format, None, CallPolicy::Default);
                Ok(Lowered { arg, ..f })
            }

            Node::LaneMask { pattern, like } => {
                let like = self.get(like)?;
                if !(like.format.is_vector() || like.format.is_mask()) {
                    return Err("lane mask must be sized by a register value".to_string());
                }
                let format = like.format.mask();
                let arg = self.lane_mask(pattern, format);
                Ok(Lowered { arg, format, count: like.count })
            }

            Node::LessThan { lhs, rhs } => {
                let l = self.vector(lhs)?;
                let r = self.get(rhs)?;
                if !l.format.signed {
                    return Err("signed comparison of an unsigned vector".to_string());
                }
                let operands = if r.format.is_vector() {
                    same_shape(l.format, r.format)?;
                    "vv"
                } else if r.format.is_scalar_like() {
                    "vx"
                } else {
                    return Err("cannot compare against a mask".to_string());
                };
                let format = l.format.mask();
                let vl = self.vl(l.count);
                let arg = self.emit(BaseOp::Mslt, operands, vec![l.arg, r.arg, vl], format, Some(l.format), CallPolicy::Default);
                Ok(Lowered { arg, format, count: l.count })
            }

            Node::Truncate(value) => {
                let v = self.vector(value)?;
                let lmul = v
                    .format
                    .lmul
                    .scaled(-1)
                    .filter(|l| l.is_valid_for(v.format.width))
                    .ok_or_else(|| format!("cannot truncate {}", v.format.type_tag()))?;
                let format = ValueFormat::vector(v.format.width, lmul, v.format.signed);
                let arg = self.emit(BaseOp::LmulTrunc, "v", vec![v.arg], format, Some(v.format), CallPolicy::Default);
                Ok(Lowered { arg, format, count: v.count - 1 })
            }

            Node::WidthSwitch { above, wide, narrow } => {
                self.get(if width > above { wide } else { narrow })
            }

            Node::Commit(value) => self.commit(value),
        }
    }

    fn widening(
        &mut self,
        op: BaseOp,
        (lhs_signed, rhs_signed): (bool, bool),
        signed: bool,
        l: Lowered,
        r: Lowered,
    ) -> Step<Lowered> {
        same_shape(l.format, r.format)?;
        if l.count != r.count {
            return Err("widening operands have different active lengths".to_string());
        }
        if l.format.signed != lhs_signed || r.format.signed != rhs_signed {
            return Err(format!(
                "{} does not accept {} x {}",
                op.info().name,
                l.format.type_tag(),
                r.format.type_tag()
            ));
        }
        let format = widened(l.format)?.with_signed(signed);
        let vl = self.vl(l.count);
        let arg = self.emit(op, "vv", vec![l.arg, r.arg, vl], format, None, CallPolicy::Default);
        Ok(Lowered { arg, format, count: l.count })
    }

    /// Apply the variant's tail and mask policy to a finished result.
    fn commit(&mut self, value: NodeId) -> Step<Lowered> {
        let v = self.vector(value)?;
        if v.format != self.result {
            return Err(format!(
                "committed value {} does not match the result {}",
                v.format.type_tag(),
                self.result.type_tag()
            ));
        }
        let tail = self.variant.tail();
        let mask = self.variant.mask();
        if tail == TailPolicy::Agnostic && mask != MaskPolicy::Undisturbed {
            return Ok(v);
        }

        let vd = Arg::Param(self.vd.ok_or("policy needs vd but none was declared")?);
        let vl = self.vl(v.count);
        let arg = match (tail, mask) {
            (TailPolicy::Undisturbed, MaskPolicy::Unmasked | MaskPolicy::Agnostic) => {
                self.emit(BaseOp::MvVV, "v_v", vec![vd, v.arg, vl], v.format, None, CallPolicy::Tu)
            }
            (tail, _) => {
                let vm = Arg::Param(self.vm.ok_or("policy needs vm but none was declared")?);
                if tail == TailPolicy::Undisturbed {
                    self.emit(BaseOp::Merge, "vvm", vec![vd, vd, v.arg, vm, vl], v.format, None, CallPolicy::Tu)
                } else {
                    self.emit(BaseOp::Merge, "vvm", vec![vd, v.arg, vm, vl], v.format, None, CallPolicy::Default)
                }
            }
        };
        Ok(Lowered { arg, ..v })
    }
}

/// Lower one concrete variant of `descriptor`.
pub fn lower(descriptor: &OperationDescriptor, variant: &ConcreteVariant) -> GenResult<EmissionUnit> {
    let graph = &descriptor.graph;
    let fail = |node: NodeId, reason: String| GenError::Lowering {
        descriptor: format!("{}/{}", descriptor.family, descriptor.name),
        variant: variant.to_string(),
        node,
        op: graph.node(node).map(Node::mnemonic).unwrap_or("?"),
        reason,
    };
    let root = graph.root().ok_or_else(|| GenError::MalformedDescription {
        descriptor: format!("{}/{}", descriptor.family, descriptor.name),
        node: None,
        reason: "graph has no root".to_string(),
    })?;

    let mut lowerer = Lowerer::new(descriptor, *variant).map_err(|e| fail(root, e))?;
    let order = lowerer.schedule(root).map_err(|(node, e)| fail(node, e))?;
    for id in order {
        let node = lowerer.node(id).map_err(|e| fail(id, e))?;
        lowerer.node = Some(id);
        let value = lowerer.lower_node(node).map_err(|e| fail(id, e))?;
        lowerer.memo[id.index()] = Some(value);
    }

    let ret = lowerer.get(root).map_err(|e| fail(root, e))?;
    if ret.format != lowerer.result || ret.count != descriptor.result.count_shift() {
        return Err(fail(
            root,
            format!(
                "result is {} at count 2^{}, declared {} at count 2^{}",
                ret.format.type_tag(),
                ret.count,
                lowerer.result.type_tag(),
                descriptor.result.count_shift()
            ),
        ));
    }

    let unit = EmissionUnit {
        name: unit_name(descriptor, variant, lowerer.result),
        family: descriptor.family,
        descriptor: descriptor.name,
        variant: *variant,
        params: lowerer.params,
        result: lowerer.result,
        bindings: lowerer.bindings,
        ret: ret.arg,
    };
    debug!("lowered {} ({} bindings)", unit.name, unit.bindings.len());
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::{expand, Filters};
    use crate::families;

    fn unit(family: &str, name: &str, filters: Filters) -> EmissionUnit {
        let family = families::load(family).unwrap();
        let descriptor = family.descriptor(name).unwrap();
        let variant = expand(descriptor, &filters).unwrap()[0];
        lower(descriptor, &variant).unwrap()
    }

    fn e32m1() -> Filters {
        Filters {
            widths: Some(vec![ElementWidth::E32]),
            lmuls: Some(vec![Lmul::M1]),
            ..Filters::default()
        }
    }

    fn callees(unit: &EmissionUnit) -> Vec<String> {
        unit.bindings.iter().map(Binding::callee).collect()
    }

    #[test]
    fn test_rotate_vx_lowering() {
        let filters = Filters {
            forms: Some(vec![crate::core::OperandForm::VectorScalar]),
            ..e32m1()
        };
        let unit = unit("zvkb", "ror", filters);
        assert_eq!(unit.name, "__riscv_vror_vx_u32m1");
        assert_eq!(
            callees(&unit),
            vec!["__riscv_vsrl_vx_u32m1", "-", "&", "__riscv_vsll_vx_u32m1", "__riscv_vor_vv_u32m1"]
        );
        let names: Vec<_> = unit.params.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["vs2", "rs1", "vl"]);
    }

    #[test]
    fn test_rotate_vv_complement_is_per_element() {
        let unit = unit("zvkb", "ror", e32m1());
        assert_eq!(unit.name, "__riscv_vror_vv_u32m1");
        let calls = callees(&unit);
        assert!(calls.contains(&"__riscv_vrsub_vx_u32m1".to_string()));
        assert!(calls.contains(&"__riscv_vand_vx_u32m1".to_string()));
    }

    #[test]
    fn test_shared_subtree_lowered_once() {
        // Both shifts read vs2; the parameter is referenced, never recomputed.
        let unit = unit("zvkb", "ror", e32m1());
        let shifts = unit
            .bindings
            .iter()
            .filter(|b| matches!(b.op, BaseOp::Sll | BaseOp::Srl))
            .count();
        assert_eq!(shifts, 2);
    }

    #[test]
    fn test_dot_pipeline_widths_and_lengths() {
        let unit = unit("zvdot4a8i", "dot4au", e32m1());
        assert_eq!(unit.name, "__riscv_vdot4au_vv_u32m1");
        let calls = callees(&unit);
        assert!(calls.contains(&"__riscv_vwmulu_vv_u16m2".to_string()));
        assert!(calls.contains(&"__riscv_vnsrl_wx_u16m1".to_string()));
        assert!(calls.contains(&"__riscv_vwaddu_vv_u32m2".to_string()));
        assert!(calls.contains(&"__riscv_vnsrl_wx_u32m1".to_string()));
        // vl * 4 for the byte stage and vl * 2 for the halfword stage, once each.
        let scaled: Vec<_> = unit
            .bindings
            .iter()
            .filter(|b| b.op == BaseOp::ScalarMul)
            .map(|b| b.args[1])
            .collect();
        assert_eq!(scaled, vec![Arg::Literal(4), Arg::Literal(2)]);
        let params: Vec<_> = unit.params.iter().map(|p| p.name).collect();
        assert_eq!(params, vec!["vd", "vs2", "vs1", "vl"]);
    }

    #[test]
    fn test_policy_parameters() {
        let filters = Filters {
            tail_policies: Some(vec![TailPolicy::Undisturbed]),
            mask_policies: Some(vec![MaskPolicy::Undisturbed]),
            ..e32m1()
        };
        let unit = unit("zvzip", "paire", filters);
        assert_eq!(unit.name, "__riscv_vpaire_vv_u32m1_tumu");
        let params: Vec<_> = unit.params.iter().map(|p| p.name).collect();
        assert_eq!(params, vec!["vm", "vd", "vs2", "vs1", "vl"]);
        assert_eq!(
            callees(&unit).last().map(String::as_str),
            Some("__riscv_vmerge_vvm_u32m1_tu")
        );
    }

    #[test]
    fn test_lane_masks_are_shared() {
        let filters = Filters { widths: Some(vec![ElementWidth::E64]), ..e32m1() };
        let unit = unit("zvzip", "zip", filters);
        let vlmax = unit.bindings.iter().filter(|b| b.op == BaseOp::SetVlMax).count();
        assert_eq!(vlmax, 1);
        assert!(callees(&unit).contains(&"__riscv_vslidedown_vx_u32m2_mu".to_string()));
    }

    #[test]
    fn test_rev8_at_e8_is_identity() {
        let filters = Filters {
            widths: Some(vec![ElementWidth::E8]),
            lmuls: Some(vec![Lmul::M1]),
            ..Filters::default()
        };
        let unit = unit("zvkb", "rev8", filters);
        assert!(unit.bindings.is_empty());
        assert_eq!(unit.ret, Arg::Param(0));
        assert!(!unit.uses_param(1));
    }
}
