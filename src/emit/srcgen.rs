//! Line-oriented source formatter.
//!
//! Generated C is built line by line with an indentation level tracked by the
//! formatter, so renderers only describe structure.

/// Write one formatted line: `fmtln!(fmt, "{} = {};", lhs, rhs)`.
#[macro_export]
macro_rules! fmtln {
    ($fmt:ident, $fmtstring:expr, $($fmtargs:expr),*) => {
        $fmt.line(format!($fmtstring, $($fmtargs),*))
    };

    ($fmt:ident, $arg:expr) => {
        $fmt.line($arg)
    };
}

const INDENT: &str = "  ";

#[derive(Debug, Default)]
pub struct Formatter {
    indent: usize,
    lines: Vec<String>,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` one indentation level deeper.
    pub fn indent<T>(&mut self, f: impl FnOnce(&mut Formatter) -> T) -> T {
        self.indent += 1;
        let ret = f(self);
        self.indent -= 1;
        ret
    }

    pub fn line(&mut self, contents: impl AsRef<str>) {
        let contents = contents.as_ref();
        if contents.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", INDENT.repeat(self.indent), contents));
        }
    }

    pub fn empty_line(&mut self) {
        self.lines.push(String::new());
    }

    /// A `//` comment at the current indentation.
    pub fn comment(&mut self, contents: impl AsRef<str>) {
        self.line(format!("// {}", contents.as_ref()));
    }

    /// Append the lines of `other`, ending all but the last with a line
    /// continuation.
    pub fn continued(&mut self, other: Formatter) {
        let count = other.lines.len();
        for (i, line) in other.lines.into_iter().enumerate() {
            if i + 1 < count {
                self.line(format!("{line} \\"));
            } else {
                self.line(line);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
