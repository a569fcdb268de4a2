// This module holds the hand-authored semantic descriptions, grouped by RISC-V extension
// family. An OperationDescriptor names one instruction, declares its operands in explicit
// calling order (role plus a format relative to the variant), the format of its result,
// the arena operation graph computing that result from the operands, and a declarative
// SupportTable listing the axis values it accepts plus the closed-form grouping
// constraint. Families are built on demand by name and validated as a whole when loaded:
// graph structure, operand roles, policy wiring, and a dry-run lowering of every
// admissible width and grouping plus every tail and mask policy pair, so that
// authoring defects surface before any user filter is applied.

//! Semantic descriptions of the emulated instruction families.

use log::debug;

use crate::core::{
    ElementWidth, GenError, GenResult, Lmul, MaskPolicy, OperandForm, Shape, TailPolicy,
    ValueFormat,
};
use crate::expand::{expand, ConcreteVariant, Filters};
use crate::ir::{well_formed, Node, OpGraph, OperandRole};
use crate::lower::lower;

pub mod zvabd;
pub mod zvdot4a8i;
pub mod zvkb;
pub mod zvzip;

/// Families known to the generator, in listing order.
pub const FAMILY_NAMES: [&str; 4] = ["zvkb", "zvdot4a8i", "zvzip", "zvabd"];

/// C type of a scalar secondary operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarSlot {
    /// Same type as one element.
    Element,
    /// `size_t`, for shift and rotate amounts.
    Length,
}

/// One formal operand of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandDecl {
    pub role: OperandRole,
    pub shape: Shape,
    pub scalar: ScalarSlot,
}

impl OperandDecl {
    pub const fn new(role: OperandRole, shape: Shape) -> Self {
        Self { role, shape, scalar: ScalarSlot::Element }
    }

    /// Secondary operand whose scalar form is a `size_t` amount.
    pub const fn amount(shape: Shape) -> Self {
        Self { role: OperandRole::Secondary, shape, scalar: ScalarSlot::Length }
    }

    /// Parameter name in emitted code.
    pub fn name(&self, form: OperandForm) -> &'static str {
        match (self.role, form) {
            (OperandRole::Primary, _) => "vs2",
            (OperandRole::Accumulator, _) => "vd",
            (OperandRole::Secondary, OperandForm::VectorVector) => "vs1",
            (OperandRole::Secondary, OperandForm::VectorScalar) => "rs1",
            (OperandRole::Secondary, OperandForm::VectorImmediate) => "uimm",
        }
    }

    /// Resolved format of this operand under one variant.
    pub fn format(&self, width: ElementWidth, lmul: Lmul, form: OperandForm) -> Option<ValueFormat> {
        let (w, l) = self.shape.resolve(width, lmul)?;
        let format = match (self.role, form) {
            (OperandRole::Secondary, OperandForm::VectorScalar) => match self.scalar {
                ScalarSlot::Element => ValueFormat::scalar(w, self.shape.signed),
                ScalarSlot::Length => ValueFormat::length(),
            },
            (OperandRole::Secondary, OperandForm::VectorImmediate) => ValueFormat::immediate(w),
            _ => ValueFormat::vector(w, l, self.shape.signed),
        };
        Some(format)
    }
}

/// Declarative constraint table of one descriptor.
///
/// A point is admitted when every axis value is listed and the closed-form
/// predicate holds: LMUL names a legal register type for the width, and the
/// peak intermediate grouping `LMUL * 2^peak_grouping` does not exceed m8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportTable {
    pub widths: Vec<ElementWidth>,
    pub lmuls: Vec<Lmul>,
    /// Forms in declaration order.
    pub forms: Vec<OperandForm>,
    pub tail_policies: Vec<TailPolicy>,
    pub mask_policies: Vec<MaskPolicy>,
    pub peak_grouping: i8,
}

impl SupportTable {
    /// Every width and grouping, unmasked and tail agnostic only.
    pub fn new(forms: &[OperandForm]) -> Self {
        Self {
            widths: ElementWidth::ALL.to_vec(),
            lmuls: Lmul::ALL.to_vec(),
            forms: forms.to_vec(),
            tail_policies: vec![TailPolicy::Agnostic],
            mask_policies: vec![MaskPolicy::Unmasked],
            peak_grouping: 0,
        }
    }

    pub fn widths(mut self, widths: &[ElementWidth]) -> Self {
        self.widths = widths.to_vec();
        self
    }

    pub fn peak_grouping(mut self, peak: i8) -> Self {
        self.peak_grouping = peak;
        self
    }

    /// Accept every tail and mask policy.
    pub fn all_policies(mut self) -> Self {
        self.tail_policies = TailPolicy::ALL.to_vec();
        self.mask_policies = MaskPolicy::ALL.to_vec();
        self
    }

    /// Whether anything beyond the tail-agnostic unmasked form is offered.
    pub fn has_policies(&self) -> bool {
        self.tail_policies.iter().any(|t| *t != TailPolicy::Agnostic)
            || self.mask_policies.iter().any(|m| m.is_masked())
    }

    /// Width and grouping half of the predicate.
    pub fn admits_shape(&self, width: ElementWidth, lmul: Lmul) -> bool {
        self.widths.contains(&width)
            && self.lmuls.contains(&lmul)
            && lmul.is_valid_for(width)
            && lmul.scaled(self.peak_grouping).is_some()
    }

    pub fn admits(
        &self,
        width: ElementWidth,
        lmul: Lmul,
        form: OperandForm,
        tail: TailPolicy,
        mask: MaskPolicy,
    ) -> bool {
        self.admits_shape(width, lmul)
            && self.forms.contains(&form)
            && self.tail_policies.contains(&tail)
            && self.mask_policies.contains(&mask)
    }
}

/// Authored definition of one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub family: &'static str,
    /// Mnemonic without the leading `v`, e.g. `ror`.
    pub name: &'static str,
    /// Formal operands in calling order.
    pub operands: Vec<OperandDecl>,
    pub result: Shape,
    pub graph: OpGraph,
    pub support: SupportTable,
}

impl OperationDescriptor {
    pub fn operand(&self, role: OperandRole) -> Option<(usize, &OperandDecl)> {
        self.operands.iter().enumerate().find(|(_, d)| d.role == role)
    }

    fn malformed(&self, node: Option<crate::ir::NodeId>, reason: impl Into<String>) -> GenError {
        GenError::MalformedDescription {
            descriptor: format!("{}/{}", self.family, self.name),
            node,
            reason: reason.into(),
        }
    }

    /// Variants lowered by [`validate`](Self::validate).
    ///
    /// Every width, grouping and form under the first policy pair the table
    /// admits, then one variant per form for each remaining pair so that
    /// every commit path is exercised.
    pub fn dry_run_variants(&self) -> GenResult<Vec<ConcreteVariant>> {
        let mut variants = Vec::new();
        for tail in &self.support.tail_policies {
            for mask in &self.support.mask_policies {
                let filters = Filters {
                    tail_policies: Some(vec![*tail]),
                    mask_policies: Some(vec![*mask]),
                    ..Filters::default()
                };
                let expanded =
                    expand(self, &filters).map_err(|e| self.malformed(None, e.to_string()))?;
                if variants.is_empty() {
                    variants = expanded;
                    continue;
                }
                for form in &self.support.forms {
                    variants.extend(expanded.iter().find(|v| v.form() == *form).copied());
                }
            }
        }
        Ok(variants)
    }

    /// Load-time checks, run before any expansion.
    pub fn validate(&self) -> GenResult<()> {
        well_formed(&self.graph).map_err(|e| self.malformed(e.node(), e.to_string()))?;

        for (i, decl) in self.operands.iter().enumerate() {
            if self.operands[..i].iter().any(|d| d.role == decl.role) {
                return Err(self.malformed(None, format!("operand role {:?} declared twice", decl.role)));
            }
        }
        if self.operand(OperandRole::Primary).is_none() {
            return Err(self.malformed(None, "no primary operand declared"));
        }

        let mut commits = false;
        for (id, node) in self.graph.iter() {
            match node {
                Node::Operand(role) if self.operand(*role).is_none() => {
                    return Err(self.malformed(Some(id), format!("operand {role:?} is not declared")));
                }
                Node::Commit(_) => commits = true,
                _ => {}
            }
        }
        if self.support.has_policies() && !commits {
            return Err(self.malformed(None, "policies are supported but nothing commits them"));
        }
        if self.support.has_policies() && self.operand(OperandRole::Accumulator).is_some() {
            return Err(self.malformed(None, "an accumulator cannot share vd with a policy destination"));
        }

        let variants = self.dry_run_variants()?;
        for variant in &variants {
            lower(self, variant).map_err(|e| match e {
                GenError::Lowering { node, reason, variant, .. } => {
                    self.malformed(Some(node), format!("[{variant}] {reason}"))
                }
                other => other,
            })?;
        }
        debug!("{}/{}: validated {} shapes", self.family, self.name, variants.len());
        Ok(())
    }
}

/// A named group of descriptors emitted into one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    pub name: &'static str,
    pub summary: &'static str,
    pub descriptors: Vec<OperationDescriptor>,
}

impl Family {
    pub fn descriptor(&self, name: &str) -> Option<&OperationDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn validate(&self) -> GenResult<()> {
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            if self.descriptors[..i].iter().any(|d| d.name == descriptor.name) {
                return Err(descriptor.malformed(None, "descriptor name is not unique in its family"));
            }
            descriptor.validate()?;
        }
        Ok(())
    }
}

/// Build and validate a family by name.
pub fn load(name: &str) -> GenResult<Family> {
    let family = match name.to_ascii_lowercase().as_str() {
        "zvkb" => zvkb::family(),
        "zvdot4a8i" => zvdot4a8i::family(),
        "zvzip" => zvzip::family(),
        "zvabd" => zvabd::family(),
        _ => {
            return Err(GenError::UnknownFamily {
                name: name.to_string(),
                available: FAMILY_NAMES.join(", "),
            })
        }
    };
    family.validate()?;
    debug!("loaded family {} ({} descriptors)", family.name, family.descriptors.len());
    Ok(family)
}
