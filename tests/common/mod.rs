//! Shared helpers for integration tests.
//!
//! [`Machine`] is a reference evaluator for emission units: it models the
//! base RVV intrinsics the lowering targets on a register file of
//! configurable VLEN and executes a unit's bindings in order. Agnostic
//! elements are filled with all ones, so a test that reads past the active
//! length of a tail-agnostic result sees garbage rather than a lucky zero.

#![allow(dead_code)]

pub mod check;

use rvv_emugen::core::{ElementWidth, Lmul, MaskPolicy, OperandForm, TailPolicy, ValueFormat};
use rvv_emugen::expand::{expand, Filters};
use rvv_emugen::families;
use rvv_emugen::lower::{lower, Arg, BaseOp, Binding, CallPolicy, EmissionUnit};

pub const VLEN: u32 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Vector { format: ValueFormat, bytes: Vec<u8> },
    /// One bit per element index, `vlen` bits.
    Mask(Vec<bool>),
    Scalar(u64),
}

impl Value {
    pub fn format(&self) -> Option<ValueFormat> {
        match self {
            Value::Vector { format, .. } => Some(*format),
            _ => None,
        }
    }

    /// All elements of a vector, zero-extended.
    pub fn elements(&self) -> Vec<u64> {
        match self {
            Value::Vector { format, bytes } => {
                let size = (format.width.bits() / 8) as usize;
                bytes.chunks(size).map(read_le).collect()
            }
            other => panic!("not a vector: {other:?}"),
        }
    }

    /// The first `n` elements.
    pub fn lanes(&self, n: usize) -> Vec<u64> {
        self.elements().into_iter().take(n).collect()
    }

    pub fn scalar(&self) -> u64 {
        match self {
            Value::Scalar(x) => *x,
            other => panic!("not a scalar: {other:?}"),
        }
    }

    pub fn bits(&self) -> &[bool] {
        match self {
            Value::Mask(bits) => bits,
            other => panic!("not a mask: {other:?}"),
        }
    }

    fn vector(&self) -> (ValueFormat, &[u8]) {
        match self {
            Value::Vector { format, bytes } => (*format, bytes),
            other => panic!("not a vector: {other:?}"),
        }
    }
}

fn read_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn write_le(bytes: &mut [u8], value: u64) {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (value >> (8 * i)) as u8;
    }
}

fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn sign_extend(value: u64, bits: u32) -> i128 {
    let shift = 128 - bits;
    (((value as u128) << shift) as i128) >> shift
}

/// Reference model of the base V extension.
#[derive(Debug, Clone, Copy)]
pub struct Machine {
    pub vlen: u32,
}

impl Default for Machine {
    fn default() -> Self {
        Self { vlen: VLEN }
    }
}

/// Working copy of a vector being written element by element.
struct Dest {
    format: ValueFormat,
    bytes: Vec<u8>,
}

impl Dest {
    fn sew(&self) -> u32 {
        self.format.width.bits()
    }

    fn len(&self) -> usize {
        self.bytes.len() / (self.sew() / 8) as usize
    }

    fn set(&mut self, i: usize, value: u64) {
        let size = (self.sew() / 8) as usize;
        write_le(&mut self.bytes[i * size..(i + 1) * size], value);
    }

    fn finish(self) -> Value {
        Value::Vector { format: self.format, bytes: self.bytes }
    }
}

fn element(format: ValueFormat, bytes: &[u8], i: usize) -> u64 {
    let size = (format.width.bits() / 8) as usize;
    bytes.get(i * size..(i + 1) * size).map(read_le).unwrap_or(0)
}

impl Machine {
    pub fn new(vlen: u32) -> Self {
        Self { vlen }
    }

    pub fn register_bytes(&self, lmul: Lmul) -> usize {
        let bytes = (self.vlen / 8) as usize;
        let log2 = lmul.log2();
        if log2 >= 0 {
            bytes << log2
        } else {
            bytes >> (-log2)
        }
    }

    pub fn vlmax(&self, format: ValueFormat) -> usize {
        self.register_bytes(format.lmul) / (format.width.bits() / 8) as usize
    }

    /// A vector register group holding `elems`, zero beyond them.
    pub fn vector(&self, format: ValueFormat, elems: &[u64]) -> Value {
        let mut dest = Dest { format, bytes: vec![0; self.register_bytes(format.lmul)] };
        assert!(elems.len() <= dest.len(), "{} elements do not fit {}", elems.len(), format.type_tag());
        for (i, e) in elems.iter().enumerate() {
            dest.set(i, e & width_mask(format.width.bits()));
        }
        dest.finish()
    }

    pub fn mask(&self, bits: &[bool]) -> Value {
        let mut all = bits.to_vec();
        all.resize(self.vlen as usize, false);
        Value::Mask(all)
    }

    /// Fresh output with every element agnostic.
    fn agnostic(&self, format: ValueFormat) -> Dest {
        Dest { format, bytes: vec![0xff; self.register_bytes(format.lmul)] }
    }

    /// Output starting from an undisturbed destination.
    fn undisturbed(&self, format: ValueFormat, vd: &Value) -> Dest {
        let (_, bytes) = vd.vector();
        Dest { format, bytes: bytes.to_vec() }
    }

    /// Execute `unit` with named arguments.
    pub fn run(&self, unit: &EmissionUnit, args: &[(&str, Value)]) -> Value {
        let params: Vec<Value> = unit
            .params
            .iter()
            .map(|p| {
                args.iter()
                    .find(|(name, _)| *name == p.name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| panic!("{}: missing argument {}", unit.name, p.name))
            })
            .collect();

        let mut values: Vec<Value> = Vec::with_capacity(unit.bindings.len());
        for binding in &unit.bindings {
            let inputs: Vec<Value> = binding
                .args
                .iter()
                .map(|a| resolve(*a, &params, &values))
                .collect();
            values.push(self.eval(binding, &inputs));
        }
        resolve(unit.ret, &params, &values)
    }

    fn eval(&self, b: &Binding, args: &[Value]) -> Value {
        let out = b.format;
        let sew = out.width.bits();
        let keep = width_mask(sew);
        let vl = |n: usize| args[n].scalar() as usize;

        match b.op {
            BaseOp::Sll | BaseOp::Srl | BaseOp::Sra | BaseOp::And | BaseOp::Or | BaseOp::Xor
            | BaseOp::Add | BaseOp::Sub | BaseOp::Rsub => {
                assert_eq!(b.policy, CallPolicy::Default);
                let (_, x) = args[0].vector();
                let rhs = |i: usize| match &args[1] {
                    Value::Vector { format, bytes } => element(*format, bytes, i),
                    Value::Scalar(s) => *s & keep,
                    Value::Mask(_) => panic!("mask operand to {:?}", b.op),
                };
                let mut dest = self.agnostic(out);
                for i in 0..vl(2) {
                    let a = element(out, x, i);
                    let y = rhs(i);
                    let shamt = (y & u64::from(sew - 1)) as u32;
                    let r = match b.op {
                        BaseOp::Sll => a << shamt,
                        BaseOp::Srl => a >> shamt,
                        BaseOp::Sra => (sign_extend(a, sew) >> shamt) as u64,
                        BaseOp::And => a & y,
                        BaseOp::Or => a | y,
                        BaseOp::Xor => a ^ y,
                        BaseOp::Add => a.wrapping_add(y),
                        BaseOp::Sub => a.wrapping_sub(y),
                        _ => y.wrapping_sub(a),
                    };
                    dest.set(i, r & keep);
                }
                dest.finish()
            }

            BaseOp::Not => {
                let (_, x) = args[0].vector();
                let mut dest = self.agnostic(out);
                for i in 0..vl(1) {
                    dest.set(i, !element(out, x, i) & keep);
                }
                dest.finish()
            }

            BaseOp::Wmul | BaseOp::Wmulu | BaseOp::Wmulsu | BaseOp::Wadd | BaseOp::Waddu => {
                let (lf, l) = args[0].vector();
                let (rf, r) = args[1].vector();
                let half = sew / 2;
                assert_eq!(lf.width.bits(), half);
                assert_eq!(rf.width.bits(), half);
                let (ls, rs) = match b.op {
                    BaseOp::Wmul | BaseOp::Wadd => (true, true),
                    BaseOp::Wmulsu => (true, false),
                    _ => (false, false),
                };
                let ext = |v: u64, signed: bool| {
                    if signed {
                        sign_extend(v, half)
                    } else {
                        i128::from(v)
                    }
                };
                let mut dest = self.agnostic(out);
                for i in 0..vl(2) {
                    let a = ext(element(lf, l, i), ls);
                    let c = ext(element(rf, r, i), rs);
                    let r = match b.op {
                        BaseOp::Wadd | BaseOp::Waddu => a + c,
                        _ => a * c,
                    };
                    dest.set(i, (r as u64) & keep);
                }
                dest.finish()
            }

            BaseOp::Nsrl | BaseOp::Nsra => {
                let (wf, w) = args[0].vector();
                let wide = wf.width.bits();
                assert_eq!(wide, sew * 2);
                let shamt = (args[1].scalar() & u64::from(wide - 1)) as u32;
                let mut dest = self.agnostic(out);
                for i in 0..vl(2) {
                    let v = element(wf, w, i);
                    let r = if b.op == BaseOp::Nsra {
                        (sign_extend(v, wide) >> shamt) as u64
                    } else {
                        v >> shamt
                    };
                    dest.set(i, r & keep);
                }
                dest.finish()
            }

            BaseOp::Reinterpret => {
                let (_, bytes) = args[0].vector();
                if out.is_mask() {
                    let bits = (0..self.vlen as usize)
                        .map(|i| bytes.get(i / 8).is_some_and(|byte| (byte >> (i % 8)) & 1 == 1))
                        .collect();
                    Value::Mask(bits)
                } else {
                    assert_eq!(bytes.len(), self.register_bytes(out.lmul));
                    Value::Vector { format: out, bytes: bytes.to_vec() }
                }
            }

            BaseOp::LmulTrunc => {
                let (_, bytes) = args[0].vector();
                Value::Vector { format: out, bytes: bytes[..self.register_bytes(out.lmul)].to_vec() }
            }

            BaseOp::Zext2 => {
                let (nf, n) = args[0].vector();
                assert_eq!(nf.width.bits() * 2, sew);
                let mut dest = self.agnostic(out);
                for i in 0..vl(1) {
                    dest.set(i, element(nf, n, i));
                }
                dest.finish()
            }

            BaseOp::MvVX => {
                let x = args[0].scalar() & keep;
                let mut dest = self.agnostic(out);
                for i in 0..vl(1) {
                    dest.set(i, x);
                }
                dest.finish()
            }

            BaseOp::MvVV => {
                assert_eq!(b.policy, CallPolicy::Tu);
                let mut dest = self.undisturbed(out, &args[0]);
                let (_, x) = args[1].vector();
                for i in 0..vl(2) {
                    dest.set(i, element(out, x, i));
                }
                dest.finish()
            }

            BaseOp::Compress => {
                let (_, x) = args[0].vector();
                let m = args[1].bits();
                let mut dest = self.agnostic(out);
                let mut next = 0;
                for i in 0..vl(2) {
                    if m[i] {
                        dest.set(next, element(out, x, i));
                        next += 1;
                    }
                }
                dest.finish()
            }

            BaseOp::SlideUp | BaseOp::SlideDown => {
                let (vm, vd, src, off, n) = match (b.op, b.policy) {
                    (_, CallPolicy::Mu) => (Some(args[0].bits()), Some(&args[1]), &args[2], &args[3], vl(4)),
                    (BaseOp::SlideUp, CallPolicy::Default) => (None, Some(&args[0]), &args[1], &args[2], vl(3)),
                    (BaseOp::SlideDown, CallPolicy::Default) => (None, None, &args[0], &args[1], vl(2)),
                    other => panic!("unsupported slide {other:?}"),
                };
                let (_, x) = src.vector();
                let off = off.scalar() as usize;
                let vlmax = self.vlmax(out);
                let mut dest = match vd {
                    Some(vd) => {
                        let mut dest = self.undisturbed(out, vd);
                        // Elements past vl are tail agnostic.
                        for i in n..dest.len() {
                            dest.set(i, keep);
                        }
                        dest
                    }
                    None => self.agnostic(out),
                };
                for i in 0..n {
                    if vm.is_some_and(|m| !m[i]) {
                        continue;
                    }
                    let value = match b.op {
                        BaseOp::SlideUp if i < off => continue,
                        BaseOp::SlideUp => element(out, x, i - off),
                        _ if i + off < vlmax => element(out, x, i + off),
                        _ => 0,
                    };
                    dest.set(i, value);
                }
                dest.finish()
            }

            BaseOp::Merge => {
                let (mut dest, rest) = match b.policy {
                    CallPolicy::Default => (self.agnostic(out), args),
                    CallPolicy::Tu => (self.undisturbed(out, &args[0]), &args[1..]),
                    other => panic!("unsupported merge policy {other:?}"),
                };
                let (_, f) = rest[0].vector();
                let (_, t) = rest[1].vector();
                let m = rest[2].bits();
                for i in 0..rest[3].scalar() as usize {
                    dest.set(i, if m[i] { element(out, t, i) } else { element(out, f, i) });
                }
                dest.finish()
            }

            BaseOp::Mslt => {
                let (lf, l) = args[0].vector();
                let bits = lf.width.bits();
                let rhs = |i: usize| match &args[1] {
                    Value::Vector { format, bytes } => sign_extend(element(*format, bytes, i), bits),
                    Value::Scalar(s) => sign_extend(*s & width_mask(bits), bits),
                    Value::Mask(_) => panic!("mask operand to vmslt"),
                };
                let n = vl(2);
                let result = (0..self.vlen as usize)
                    .map(|i| if i < n { sign_extend(element(lf, l, i), bits) < rhs(i) } else { true })
                    .collect();
                Value::Mask(result)
            }

            BaseOp::SetVlMax => {
                let source = b.source.unwrap_or_else(|| panic!("vsetvlmax without a type"));
                Value::Scalar(self.vlmax(source) as u64)
            }

            BaseOp::ScalarNot => Value::Scalar(!args[0].scalar()),

            op => {
                let (x, y) = (args[0].scalar(), args[1].scalar());
                Value::Scalar(match op {
                    BaseOp::ScalarAnd => x & y,
                    BaseOp::ScalarOr => x | y,
                    BaseOp::ScalarXor => x ^ y,
                    BaseOp::ScalarAdd => x.wrapping_add(y),
                    BaseOp::ScalarSub => x.wrapping_sub(y),
                    BaseOp::ScalarMul => x.wrapping_mul(y),
                    BaseOp::ScalarDiv => x / y,
                    BaseOp::ScalarShl => x << y,
                    BaseOp::ScalarShr => x >> y,
                    other => panic!("unhandled {other:?}"),
                })
            }
        }
    }
}

fn resolve(arg: Arg, params: &[Value], values: &[Value]) -> Value {
    match arg {
        Arg::Param(i) => params[i].clone(),
        Arg::Binding(id) => values[id.index()].clone(),
        Arg::Literal(x) => Value::Scalar(x),
    }
}

pub fn filters(width: ElementWidth, lmul: Lmul, form: OperandForm) -> Filters {
    Filters {
        widths: Some(vec![width]),
        lmuls: Some(vec![lmul]),
        forms: Some(vec![form]),
        tail_policies: Some(vec![TailPolicy::Agnostic]),
        mask_policies: Some(vec![MaskPolicy::Unmasked]),
    }
}

/// Lower every variant of one instruction selected by `filters`.
pub fn lower_all(family: &str, name: &str, filters: &Filters) -> Vec<EmissionUnit> {
    let family = families::load(family).unwrap_or_else(|e| panic!("{e}"));
    let descriptor = family
        .descriptor(name)
        .unwrap_or_else(|| panic!("no instruction {name} in {}", family.name));
    expand(descriptor, filters)
        .unwrap_or_else(|e| panic!("{e}"))
        .iter()
        .map(|v| lower(descriptor, v).unwrap_or_else(|e| panic!("{e}")))
        .collect()
}

/// Lower the single variant of `name` at one width, grouping and form,
/// tail agnostic and unmasked.
pub fn lower_one(family: &str, name: &str, width: ElementWidth, lmul: Lmul, form: OperandForm) -> EmissionUnit {
    let mut units = lower_all(family, name, &filters(width, lmul, form));
    assert_eq!(units.len(), 1);
    units.remove(0)
}

/// Format of parameter `name` of `unit`.
pub fn param_format(unit: &EmissionUnit, name: &str) -> ValueFormat {
    unit.params
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.format)
        .unwrap_or_else(|| panic!("{} has no parameter {name}", unit.name))
}

/// Mask of `n` elements from `f(i)`.
pub fn mask_of(machine: &Machine, n: usize, f: impl Fn(usize) -> bool) -> Value {
    let bits: Vec<bool> = (0..n).map(f).collect();
    machine.mask(&bits)
}
