//! rvv-emugen - RISC-V vector extension emulation generator.
//!
//! Generates C headers that emulate instructions from newer RISC-V vector
//! extensions (Zvkb, Zvdot4a8i, Zvzip, Zvabd) using only base V-extension
//! intrinsics, for every supported element width, grouping factor, operand
//! form and policy.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use rvv_emugen::core::GenerationSession;
//! use rvv_emugen::emit::{render_header, RenderOptions};
//! use rvv_emugen::expand::Filters;
//!
//! let arena = Bump::new();
//! let session = GenerationSession::new(&arena);
//! let section = session.generate_family("zvkb", &Filters::default(), &[], &RenderOptions::default())?;
//! let header = render_header(&["zvkb"], &[section]);
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - arena operation graph used by the descriptions
//! - [`families`] - hand-authored descriptions, one module per extension
//! - [`expand`] - support tables turned into concrete variants
//! - [`lower`] - variants lowered onto the base-intrinsic catalogue
//! - [`emit`] - emission units rendered as C functions or macros
//! - [`core`] - axes, formats, errors and the generation session

pub mod core;
pub mod emit;
pub mod expand;
pub mod families;
pub mod ir;
pub mod lower;

pub use crate::core::{
    Axis, ElementWidth, EmissionPolicy, GenError, GenResult, GenerationSession, Lmul, MaskPolicy,
    OperandForm, SessionStats, TailPolicy,
};
pub use emit::RenderOptions;
pub use expand::{expand, ConcreteVariant, Filters};
pub use lower::{lower, EmissionUnit};
