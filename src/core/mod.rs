// This module gathers the shared vocabulary of the generator: the configuration axes
// (element width, grouping factor, operand form, tail and mask policy) together with the
// emission policy derived from them, the value formats and relative shapes carried
// through lowering, the error taxonomy, and the arena-based generation session that ties
// a run together. Everything else in the crate (descriptions, expansion, lowering and
// rendering) is written against these types.

//! Core types of the RVV emulation generator.
//!
//! # Key Components
//!
//! ## Axes (`axes`)
//! - Closed enumerations for SEW, LMUL, operand form, tail and mask policy
//! - Parsing from command-line spellings, printing in intrinsic spellings
//!
//! ## Formats (`format`)
//! - [`ValueFormat`]: resolved C type of a lowered value
//! - [`Shape`]: operand and result types relative to a variant
//!
//! ## Session (`session`)
//! - Arena-backed name interning and uniqueness
//! - Generation statistics

pub mod axes;
pub mod error;
pub mod format;
pub mod session;

pub use axes::{Axis, ElementWidth, EmissionPolicy, Lmul, MaskPolicy, OperandForm, TailPolicy};

pub use error::{GenError, GenResult};

pub use format::{Shape, ValueFormat, ValueKind};

pub use session::{GenerationSession, SessionStats};
