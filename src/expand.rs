//! Variant expansion.
//!
//! [`expand`] turns a descriptor and a set of user filters into the ordered
//! list of [`ConcreteVariant`]s to lower. The filtered axes are walked by a
//! lazy odometer ([`VariantIter`]) and each point is kept only if the
//! descriptor's [`SupportTable`] admits it. Order is width ascending, LMUL
//! ascending, then forms, tail policies and mask policies in the table's
//! declared order.

use std::fmt;

use log::debug;

use crate::core::{
    Axis, ElementWidth, EmissionPolicy, GenError, GenResult, Lmul, MaskPolicy, OperandForm,
    TailPolicy,
};
use crate::families::{OperationDescriptor, SupportTable};

/// Requested axis values; `None` means "whatever the descriptor allows".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub widths: Option<Vec<ElementWidth>>,
    pub lmuls: Option<Vec<Lmul>>,
    pub forms: Option<Vec<OperandForm>>,
    pub tail_policies: Option<Vec<TailPolicy>>,
    pub mask_policies: Option<Vec<MaskPolicy>>,
}

/// One fully resolved configuration of a descriptor.
///
/// Only [`expand`] creates these, so every value lies inside the support
/// table of the descriptor it was expanded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcreteVariant {
    width: ElementWidth,
    lmul: Lmul,
    form: OperandForm,
    tail: TailPolicy,
    mask: MaskPolicy,
}

impl ConcreteVariant {
    pub fn width(&self) -> ElementWidth {
        self.width
    }

    pub fn lmul(&self) -> Lmul {
        self.lmul
    }

    pub fn form(&self) -> OperandForm {
        self.form
    }

    pub fn tail(&self) -> TailPolicy {
        self.tail
    }

    pub fn mask(&self) -> MaskPolicy {
        self.mask
    }

    /// Rendering policy, a pure function of the operand form.
    pub fn emission(&self) -> EmissionPolicy {
        self.form.emission_policy()
    }
}

impl fmt::Display for ConcreteVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "e{}{} {} {} {}",
            self.width.bits(),
            self.lmul,
            self.form,
            self.tail,
            self.mask
        )
    }
}

/// Lazy Cartesian product of the selected axis values, filtered by a table.
pub struct VariantIter<'a> {
    table: &'a SupportTable,
    widths: Vec<ElementWidth>,
    lmuls: Vec<Lmul>,
    forms: Vec<OperandForm>,
    tails: Vec<TailPolicy>,
    masks: Vec<MaskPolicy>,
    /// Odometer digits, most significant first.
    digits: [usize; 5],
    done: bool,
}

impl<'a> VariantIter<'a> {
    pub fn new(
        table: &'a SupportTable,
        widths: Vec<ElementWidth>,
        lmuls: Vec<Lmul>,
        forms: Vec<OperandForm>,
        tails: Vec<TailPolicy>,
        masks: Vec<MaskPolicy>,
    ) -> Self {
        let done = widths.is_empty()
            || lmuls.is_empty()
            || forms.is_empty()
            || tails.is_empty()
            || masks.is_empty();
        Self { table, widths, lmuls, forms, tails, masks, digits: [0; 5], done }
    }

    fn radix(&self) -> [usize; 5] {
        [
            self.widths.len(),
            self.lmuls.len(),
            self.forms.len(),
            self.tails.len(),
            self.masks.len(),
        ]
    }

    fn advance(&mut self) {
        let radix = self.radix();
        for axis in (0..5).rev() {
            self.digits[axis] += 1;
            if self.digits[axis] < radix[axis] {
                return;
            }
            self.digits[axis] = 0;
        }
        self.done = true;
    }
}

impl Iterator for VariantIter<'_> {
    type Item = ConcreteVariant;

    fn next(&mut self) -> Option<ConcreteVariant> {
        while !self.done {
            let [w, l, f, t, m] = self.digits;
            let candidate = ConcreteVariant {
                width: self.widths[w],
                lmul: self.lmuls[l],
                form: self.forms[f],
                tail: self.tails[t],
                mask: self.masks[m],
            };
            self.advance();
            let admitted = self.table.admits(
                candidate.width,
                candidate.lmul,
                candidate.form,
                candidate.tail,
                candidate.mask,
            );
            if admitted {
                return Some(candidate);
            }
        }
        None
    }
}

/// Intersect `available` with `requested`, keeping the order of `available`.
fn select<T: Copy + PartialEq>(available: Vec<T>, requested: Option<&[T]>) -> Vec<T> {
    match requested {
        None => available,
        Some(requested) => available.into_iter().filter(|v| requested.contains(v)).collect(),
    }
}

fn describe<T: fmt::Display>(values: Option<&[T]>) -> String {
    match values {
        None => "any".to_string(),
        Some(values) => values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "),
    }
}

/// Expand `descriptor` under `filters` into its admissible variants.
pub fn expand(descriptor: &OperationDescriptor, filters: &Filters) -> GenResult<Vec<ConcreteVariant>> {
    let table = &descriptor.support;
    let error = |axis: Axis, requested: String| GenError::Configuration {
        family: descriptor.family.to_string(),
        descriptor: descriptor.name.to_string(),
        axis,
        requested,
    };

    // Axis values that take part in at least one admitted shape.
    let widths = ElementWidth::ALL
        .into_iter()
        .filter(|w| Lmul::ALL.iter().any(|l| table.admits_shape(*w, *l)))
        .collect();
    let lmuls = Lmul::ALL
        .into_iter()
        .filter(|l| ElementWidth::ALL.iter().any(|w| table.admits_shape(*w, *l)))
        .collect();

    let widths = select(widths, filters.widths.as_deref());
    if widths.is_empty() {
        return Err(error(Axis::ElementWidth, describe(filters.widths.as_deref())));
    }
    let lmuls = select(lmuls, filters.lmuls.as_deref());
    if lmuls.is_empty() {
        return Err(error(Axis::Grouping, describe(filters.lmuls.as_deref())));
    }
    let forms = select(table.forms.clone(), filters.forms.as_deref());
    if forms.is_empty() {
        return Err(error(Axis::OperandForm, describe(filters.forms.as_deref())));
    }
    let tails = select(table.tail_policies.clone(), filters.tail_policies.as_deref());
    if tails.is_empty() {
        return Err(error(Axis::TailPolicy, describe(filters.tail_policies.as_deref())));
    }
    let masks = select(table.mask_policies.clone(), filters.mask_policies.as_deref());
    if masks.is_empty() {
        return Err(error(Axis::MaskPolicy, describe(filters.mask_policies.as_deref())));
    }

    let variants: Vec<ConcreteVariant> =
        VariantIter::new(table, widths, lmuls, forms, tails, masks).collect();
    if variants.is_empty() {
        return Err(if filters.lmuls.is_some() {
            error(Axis::Grouping, describe(filters.lmuls.as_deref()))
        } else if filters.widths.is_some() {
            error(Axis::ElementWidth, describe(filters.widths.as_deref()))
        } else {
            error(Axis::Combination, "any".to_string())
        });
    }

    debug!(
        "{}/{}: expanded {} variants",
        descriptor.family,
        descriptor.name,
        variants.len()
    );
    Ok(variants)
}
