// This module provides the arena-based generation session. GenerationSession owns a
// reference to a bumpalo arena and carries all state shared by the families generated in
// one run: the emitted names (interned in the arena and tracked in a hashbrown set so a
// second unit with the same name is rejected), and SessionStats counting families,
// descriptors, units, bindings and macros, plus a per-intrinsic call breakdown.
// generate_family runs the whole pipeline for one family: registry lookup and load-time
// validation, variant expansion under the user filters, lowering of every variant, and
// rendering of the family section. A family's text is only produced after every one of
// its units lowered successfully.

//! Arena-based generation session.

use bumpalo::Bump;
use hashbrown::{HashMap, HashSet};
use log::{debug, info};
use std::cell::RefCell;
use std::fmt;

use super::axes::Axis;
use super::error::{GenError, GenResult};
use crate::emit::{render_family, RenderOptions};
use crate::expand::{expand, Filters};
use crate::families::{self, OperationDescriptor};
use crate::lower::{lower, EmissionUnit};

/// One run of the generator.
pub struct GenerationSession<'arena> {
    arena: &'arena Bump,

    stats: RefCell<SessionStats>,

    /// Strings interned in the arena.
    interned: RefCell<HashSet<&'arena str>>,

    /// Names of every unit emitted so far.
    claimed: RefCell<HashSet<&'arena str>>,
}

impl<'arena> GenerationSession<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned: RefCell::new(HashSet::new()),
            claimed: RefCell::new(HashSet::new()),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }
        let interned = self.arena.alloc_str(s);
        strings.insert(interned);
        interned
    }

    /// Reserve an emitted name; every name may be claimed once per session.
    pub fn claim_name(&self, name: &str) -> GenResult<&'arena str> {
        let interned = self.intern_str(name);
        if !self.claimed.borrow_mut().insert(interned) {
            return Err(GenError::DuplicateName { name: name.to_string() });
        }
        Ok(interned)
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.borrow().contains(name)
    }

    fn record_unit(&self, unit: &EmissionUnit) {
        let mut stats = self.stats.borrow_mut();
        stats.units += 1;
        stats.bindings += unit.bindings.len();
        if unit.emission() == super::EmissionPolicy::InlineMacro {
            stats.macros += 1;
        }
        if stats.largest_unit_bindings < unit.bindings.len() {
            stats.largest_unit_bindings = unit.bindings.len();
            stats.largest_unit_name = unit.name.clone();
        }
        for binding in &unit.bindings {
            if !binding.op.is_scalar() {
                *stats.call_counts.entry(binding.op.info().name).or_insert(0) += 1;
            }
        }
    }

    /// Expand and lower every selected descriptor of `family`.
    ///
    /// Descriptors with no admissible variant under `filters` are skipped;
    /// the family fails with the first such error only if nothing remains.
    pub fn lower_family(
        &self,
        family: &families::Family,
        filters: &Filters,
        only: &[String],
    ) -> GenResult<Vec<EmissionUnit>> {
        let selected: Vec<&OperationDescriptor> = family
            .descriptors
            .iter()
            .filter(|d| only.is_empty() || only.iter().any(|o| o == d.name))
            .collect();
        if selected.is_empty() {
            return Err(GenError::Configuration {
                family: family.name.to_string(),
                descriptor: "*".to_string(),
                axis: Axis::Combination,
                requested: format!("instructions {}", only.join(", ")),
            });
        }

        let mut units = Vec::new();
        let mut first_rejection = None;
        for descriptor in selected {
            let variants = match expand(descriptor, filters) {
                Ok(variants) => variants,
                Err(e @ GenError::Configuration { .. }) => {
                    debug!("{}/{}: skipped, {}", family.name, descriptor.name, e);
                    first_rejection.get_or_insert(e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for variant in &variants {
                units.push(lower(descriptor, variant)?);
            }
            self.stats.borrow_mut().descriptors += 1;
        }

        match first_rejection {
            Some(e) if units.is_empty() => Err(e),
            _ => Ok(units),
        }
    }

    /// Generate the header section of one family.
    pub fn generate_family(
        &self,
        name: &str,
        filters: &Filters,
        only: &[String],
        options: &RenderOptions,
    ) -> GenResult<String> {
        let family = families::load(name)?;
        let units = self.lower_family(&family, filters, only)?;

        for unit in &units {
            self.claim_name(&unit.name)?;
        }
        for unit in &units {
            self.record_unit(unit);
        }
        self.stats.borrow_mut().families += 1;

        info!("{}: generated {} units", family.name, units.len());
        Ok(render_family(family.name, family.summary, &units, options))
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Generation statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub families: usize,

    /// Descriptors that produced at least one unit.
    pub descriptors: usize,

    pub units: usize,

    /// Total bindings across all units.
    pub bindings: usize,

    /// Units rendered as macros.
    pub macros: usize,

    /// Calls per intrinsic stem.
    pub call_counts: HashMap<&'static str, usize>,

    pub largest_unit_bindings: usize,

    pub largest_unit_name: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generation Session Statistics:")?;
        writeln!(f, "  Families: {}", self.families)?;
        writeln!(f, "  Descriptors: {}", self.descriptors)?;
        writeln!(f, "  Units: {} ({} macros)", self.units, self.macros)?;
        writeln!(f, "  Bindings: {}", self.bindings)?;

        if !self.largest_unit_name.is_empty() {
            writeln!(
                f,
                "  Largest unit: {} ({} bindings)",
                self.largest_unit_name, self.largest_unit_bindings
            )?;
        }

        if !self.call_counts.is_empty() {
            writeln!(f, "  Intrinsic breakdown:")?;
            let mut sorted: Vec<_> = self.call_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (name, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", name, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ElementWidth, Lmul, OperandForm};

    fn e32m1() -> Filters {
        Filters {
            widths: Some(vec![ElementWidth::E32]),
            lmuls: Some(vec![Lmul::M1]),
            ..Filters::default()
        }
    }

    #[test]
    fn test_string_interning() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        let s1 = session.intern_str("vror");
        let s2 = session.intern_str("vror");
        let s3 = session.intern_str("vrol");

        assert_eq!(s1.as_ptr(), s2.as_ptr());
        assert_ne!(s1.as_ptr(), s3.as_ptr());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);

        session.claim_name("__riscv_vror_vv_u8m1").unwrap();
        let err = session.claim_name("__riscv_vror_vv_u8m1").unwrap_err();
        assert!(matches!(err, GenError::DuplicateName { .. }));
    }

    #[test]
    fn test_same_family_twice_collides() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let options = RenderOptions::default();

        session.generate_family("zvabd", &e32m1(), &[], &options).unwrap();
        let err = session.generate_family("zvabd", &e32m1(), &[], &options).unwrap_err();
        assert!(matches!(err, GenError::DuplicateName { .. }));
    }

    #[test]
    fn test_partial_filters_skip_descriptors() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let filters = Filters { forms: Some(vec![OperandForm::VectorImmediate]), ..e32m1() };

        let text = session
            .generate_family("zvkb", &filters, &[], &RenderOptions::default())
            .unwrap();
        assert!(text.contains("#define __riscv_vror_vi_u32m1"));
        assert!(!text.contains("vandn"));

        let stats = session.stats();
        assert_eq!(stats.units, 1);
        assert_eq!(stats.macros, 1);
        assert_eq!(stats.descriptors, 1);
    }

    #[test]
    fn test_only_selects_instructions() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        let only = vec!["andn".to_string()];

        let text = session
            .generate_family("zvkb", &e32m1(), &only, &RenderOptions::default())
            .unwrap();
        assert!(text.contains("__riscv_vandn_vv_u32m1"));
        assert!(text.contains("__riscv_vandn_vx_u32m1"));
        assert!(!text.contains("vror"));

        let err = session
            .generate_family("zvabd", &e32m1(), &only, &RenderOptions::default())
            .unwrap_err();
        assert_eq!(err.axis(), Some(Axis::Combination));
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = GenerationSession::new(&arena);
        session
            .generate_family("zvabd", &e32m1(), &[], &RenderOptions::default())
            .unwrap();

        let stats = session.stats();
        assert_eq!(stats.families, 1);
        // abs under two tail policies and three mask policies.
        assert_eq!(stats.units, 6);
        assert!(session.is_claimed("__riscv_vabs_v_i32m1_tumu"));

        let output = format!("{}", stats);
        assert!(output.contains("Units: 6 (0 macros)"));
        assert!(output.contains("vmslt"));
    }
}
