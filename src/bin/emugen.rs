//! Emulation header generator.
//!
//! ```text
//! emugen --family zvkb --sew 32 --lmul m1 --attribute static --attribute inline -o zvkb_emu.h
//! ```

use bumpalo::Bump;
use clap::Parser;
use log::{error, info};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use rvv_emugen::core::{
    ElementWidth, GenError, GenResult, GenerationSession, Lmul, MaskPolicy, OperandForm,
    TailPolicy,
};
use rvv_emugen::emit::{render_header, RenderOptions};
use rvv_emugen::expand::Filters;
use rvv_emugen::families::{self, FAMILY_NAMES};

#[derive(Parser, Debug)]
#[command(
    name = "emugen",
    version,
    about = "Generate C emulation headers for RISC-V vector extensions"
)]
struct Cli {
    /// Instruction family to generate (repeatable, default: all)
    #[arg(short, long = "family")]
    families: Vec<String>,

    /// Restrict to these LMULs (mf8..m8)
    #[arg(long = "lmul")]
    lmuls: Vec<Lmul>,

    /// Restrict to these element widths (8, 16, 32, 64)
    #[arg(long = "sew")]
    widths: Vec<ElementWidth>,

    /// Restrict to these operand forms (vv, vx, vi)
    #[arg(long = "form")]
    forms: Vec<OperandForm>,

    /// Restrict to these tail policies (tu, ta)
    #[arg(long = "tail-policy")]
    tail_policies: Vec<TailPolicy>,

    /// Restrict to these mask policies (mu, ma, unmasked)
    #[arg(long = "mask-policy")]
    mask_policies: Vec<MaskPolicy>,

    /// Only generate these instructions, by mnemonic without the leading `v`
    #[arg(long)]
    only: Vec<String>,

    /// Attribute prefixed verbatim onto every function signature (repeatable)
    #[arg(short, long = "attribute")]
    attributes: Vec<String>,

    /// Emit prototypes for function units
    #[arg(short, long)]
    prototypes: bool,

    /// Do not emit definitions
    #[arg(long)]
    no_definitions: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the available families and exit
    #[arg(long)]
    list_families: bool,
}

fn some<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

impl Cli {
    fn filters(&self) -> Filters {
        Filters {
            widths: some(self.widths.clone()),
            lmuls: some(self.lmuls.clone()),
            forms: some(self.forms.clone()),
            tail_policies: some(self.tail_policies.clone()),
            mask_policies: some(self.mask_policies.clone()),
        }
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            attributes: self.attributes.clone(),
            prototypes: self.prototypes,
            definitions: !self.no_definitions,
        }
    }
}

fn list_families() -> GenResult<()> {
    let mut stdout = io::stdout().lock();
    for name in FAMILY_NAMES {
        let family = families::load(name)?;
        let names: Vec<&str> = family.descriptors.iter().map(|d| d.name).collect();
        writeln!(stdout, "{:<10} {} ({})", family.name, family.summary, names.join(", "))?;
    }
    Ok(())
}

/// Generate every requested family and write the header only if all of
/// them succeeded.
///
/// Families named with `--family` must produce something. Families picked
/// by default are skipped when the filters leave them nothing to emit.
fn run(cli: &Cli) -> GenResult<bool> {
    let explicit = !cli.families.is_empty();
    let requested: Vec<&str> = if explicit {
        cli.families.iter().map(String::as_str).collect()
    } else {
        FAMILY_NAMES.to_vec()
    };
    let filters = cli.filters();
    let options = cli.render_options();

    let arena = Bump::new();
    let session = GenerationSession::new(&arena);
    let mut generated = Vec::new();
    let mut sections = Vec::new();
    let mut first_skip = None;
    let mut ok = true;

    for name in requested {
        match session.generate_family(name, &filters, &cli.only, &options) {
            Ok(section) => {
                generated.push(name);
                sections.push(section);
            }
            Err(e @ GenError::Configuration { .. }) if !explicit => {
                info!("{name}: skipped, {e}");
                first_skip.get_or_insert(e);
            }
            Err(e @ (GenError::Configuration { .. } | GenError::Lowering { .. })) => {
                error!("{name}: {e}");
                ok = false;
            }
            Err(e) => return Err(e),
        }
    }
    if generated.is_empty() {
        if let Some(e) = first_skip {
            error!("nothing to generate: {e}");
        }
        ok = false;
    }
    if !ok {
        return Ok(false);
    }

    let header = render_header(&generated, &sections);
    match &cli.output {
        Some(path) => {
            fs::write(path, header)?;
            info!("wrote {}", path.display());
        }
        None => io::stdout().lock().write_all(header.as_bytes())?,
    }
    info!("{}", session.stats());
    Ok(true)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = if cli.list_families { list_families().map(|()| true) } else { run(&cli) };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
