// This module renders lowered emission units as C source. Every unit becomes either a
// function definition or, for immediate forms whose last operand must stay a
// compile-time constant, a statement-expression macro. The choice is made here from the
// unit's emission policy and nowhere else. Bindings are printed in order as one
// declaration each: vector bindings as intrinsic calls, scalar bindings as plain C
// expressions. Parameters a unit never reads are explicitly voided so that generated
// headers compile cleanly with -Wunused-parameter. Family sections are assembled into a
// single header with an include guard and the standard includes.

//! C rendering of emission units.

pub mod srcgen;

use crate::core::{EmissionPolicy, ValueKind};
use crate::fmtln;
use crate::lower::{Arg, Binding, EmissionUnit};

pub use srcgen::Formatter;

/// Rendering switches shared by every unit of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Prefixed verbatim onto each function signature.
    pub attributes: Vec<String>,
    pub prototypes: bool,
    pub definitions: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { attributes: Vec::new(), prototypes: false, definitions: true }
    }
}

impl RenderOptions {
    fn prefix(&self) -> String {
        self.attributes.iter().map(|a| format!("{a} ")).collect()
    }
}

/// C spelling of a literal argument.
pub fn literal(value: u64) -> String {
    if value > u64::from(u32::MAX) {
        format!("{value:#x}ULL")
    } else if value > 64 {
        format!("{value:#x}")
    } else {
        value.to_string()
    }
}

/// Prefix of macro locals. Reserved for the implementation, so no caller
/// argument can shadow a local it initialises.
const MACRO_LOCAL: &str = "__emu_";

/// How names are spelled inside one rendered body.
#[derive(Clone, Copy)]
enum Scope {
    Function,
    Macro,
}

impl Scope {
    fn temp(self, index: usize) -> String {
        match self {
            Self::Function => format!("t{index}"),
            Self::Macro => format!("{MACRO_LOCAL}t{index}"),
        }
    }

    fn arg(self, unit: &EmissionUnit, arg: Arg) -> String {
        match arg {
            Arg::Binding(id) => self.temp(id.index()),
            Arg::Literal(value) => literal(value),
            Arg::Param(index) => {
                let param = &unit.params[index];
                match self {
                    Self::Function => param.name.to_string(),
                    // Immediates are substituted so they stay constant expressions.
                    Self::Macro if param.format.kind == ValueKind::Immediate => {
                        format!("({})", param.name)
                    }
                    Self::Macro => format!("{MACRO_LOCAL}{}", param.name),
                }
            }
        }
    }
}

fn expression(unit: &EmissionUnit, binding: &Binding, scope: Scope) -> String {
    let args: Vec<String> = binding.args.iter().map(|a| scope.arg(unit, *a)).collect();
    let callee = binding.callee();
    if !binding.op.is_scalar() {
        return format!("{callee}({})", args.join(", "));
    }
    match args.as_slice() {
        [value] => format!("{callee}{value}"),
        [lhs, rhs] => format!("{lhs} {callee} {rhs}"),
        _ => format!("{callee}({})", args.join(", ")),
    }
}

fn bindings(unit: &EmissionUnit, scope: Scope, fmt: &mut Formatter) {
    for (index, binding) in unit.bindings.iter().enumerate() {
        fmtln!(
            fmt,
            "{} {} = {};",
            binding.format.c_type(),
            scope.temp(index),
            expression(unit, binding, scope)
        );
    }
}

fn signature(unit: &EmissionUnit, options: &RenderOptions) -> String {
    let params: Vec<String> = unit
        .params
        .iter()
        .map(|p| format!("{} {}", p.format.c_type(), p.name))
        .collect();
    format!(
        "{}{} {}({})",
        options.prefix(),
        unit.result.c_type(),
        unit.name,
        params.join(", ")
    )
}

pub fn render_prototype(unit: &EmissionUnit, options: &RenderOptions, fmt: &mut Formatter) {
    fmtln!(fmt, "{};", signature(unit, options));
}

pub fn render_function(unit: &EmissionUnit, options: &RenderOptions, fmt: &mut Formatter) {
    fmtln!(fmt, "{} {{", signature(unit, options));
    fmt.indent(|fmt| {
        for (index, param) in unit.params.iter().enumerate() {
            if !unit.uses_param(index) {
                fmtln!(fmt, "(void){};", param.name);
            }
        }
        bindings(unit, Scope::Function, fmt);
        fmtln!(fmt, "return {};", Scope::Function.arg(unit, unit.ret));
    });
    fmtln!(fmt, "}");
}

/// Render as a GNU statement-expression macro. Register and length
/// parameters are evaluated once into locals.
pub fn render_macro(unit: &EmissionUnit, fmt: &mut Formatter) {
    let names: Vec<&str> = unit.params.iter().map(|p| p.name).collect();
    let mut body = Formatter::new();
    fmtln!(body, "#define {}({}) __extension__({{", unit.name, names.join(", "));
    body.indent(|body| {
        for (index, param) in unit.params.iter().enumerate() {
            if param.format.kind == ValueKind::Immediate || !unit.uses_param(index) {
                continue;
            }
            fmtln!(body, "{} {}{} = ({});", param.format.c_type(), MACRO_LOCAL, param.name, param.name);
        }
        bindings(unit, Scope::Macro, body);
        fmtln!(body, "{};", Scope::Macro.arg(unit, unit.ret));
    });
    fmtln!(body, "})");
    fmt.continued(body);
}

/// Render one unit according to its emission policy.
pub fn render_unit(unit: &EmissionUnit, options: &RenderOptions, fmt: &mut Formatter) {
    match unit.emission() {
        EmissionPolicy::Function => render_function(unit, options, fmt),
        EmissionPolicy::InlineMacro => render_macro(unit, fmt),
    }
}

/// Render the section of one family: a banner, prototypes for function
/// units if requested, then definitions.
pub fn render_family(
    name: &str,
    summary: &str,
    units: &[EmissionUnit],
    options: &RenderOptions,
) -> String {
    let mut fmt = Formatter::new();
    fmtln!(fmt, "/* ===== {}: {} ===== */", name, summary);

    let functions = units.iter().filter(|u| u.emission() == EmissionPolicy::Function);
    if options.prototypes {
        fmt.empty_line();
        fmt.comment("prototypes");
        for unit in functions {
            render_prototype(unit, options, &mut fmt);
        }
    }

    if options.definitions {
        let mut current = None;
        for unit in units {
            fmt.empty_line();
            if current != Some(unit.descriptor) {
                fmt.comment(format!("{} {}", unit.family, unit.descriptor));
                current = Some(unit.descriptor);
            }
            render_unit(unit, options, &mut fmt);
        }
    }
    fmt.finish()
}

/// Include guard derived from the families in the header.
fn guard(families: &[&str]) -> String {
    let mut guard = String::from("RVV_EMU");
    for family in families {
        guard.push('_');
        guard.push_str(&family.to_ascii_uppercase());
    }
    guard.push_str("_H");
    guard
}

/// Assemble a complete header from rendered family sections.
pub fn render_header(families: &[&str], sections: &[String]) -> String {
    let guard = guard(families);
    let mut fmt = Formatter::new();
    fmtln!(fmt, "/* Generated by emugen. Do not edit. */");
    fmtln!(fmt, "#ifndef {}", guard);
    fmtln!(fmt, "#define {}", guard);
    fmt.empty_line();
    fmtln!(fmt, "#include <stdint.h>");
    fmtln!(fmt, "#include <stddef.h>");
    fmtln!(fmt, "#include <riscv_vector.h>");
    let mut out = fmt.finish();
    for section in sections {
        out.push('\n');
        out.push_str(section);
    }
    out.push('\n');
    out.push_str(&format!("#endif /* {guard} */\n"));
    out
}
