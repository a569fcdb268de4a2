//! FileCheck-style validation of generated headers.
//!
//! Directives are written one per line, the way they would appear in a C
//! test file:
//!
//! ```text
//! // CHECK: vuint32m1_t __riscv_vror_vx_u32m1(
//! // CHECK-NEXT: vuint32m1_t t0 = __riscv_vsrl_vx_u32m1(vs2, rs1, vl);
//! // CHECK-NOT: vror_vi
//! ```

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub enum CheckDirective {
    /// Match on some later line.
    Check(String),
    /// Match on the line right after the previous match.
    CheckNext(String),
    /// Must not appear between the previous match and the next one.
    CheckNot(String),
    /// The next line is empty.
    CheckEmpty,
}

pub fn parse(directives: &str) -> Vec<CheckDirective> {
    let mut out = Vec::new();
    for line in directives.lines() {
        let trimmed = line.trim().trim_start_matches("//").trim();
        if let Some(pattern) = trimmed.strip_prefix("CHECK-NEXT:") {
            out.push(CheckDirective::CheckNext(pattern.trim().to_string()));
        } else if let Some(pattern) = trimmed.strip_prefix("CHECK-NOT:") {
            out.push(CheckDirective::CheckNot(pattern.trim().to_string()));
        } else if trimmed.starts_with("CHECK-EMPTY") {
            out.push(CheckDirective::CheckEmpty);
        } else if let Some(pattern) = trimmed.strip_prefix("CHECK:") {
            out.push(CheckDirective::Check(pattern.trim().to_string()));
        }
    }
    out
}

pub fn validate(output: &str, directives: &[CheckDirective]) -> Result<(), String> {
    let lines: VecDeque<&str> = output.lines().collect();
    let mut line_idx = 0;
    let mut forbidden: Vec<&str> = Vec::new();

    let region_clean = |from: usize, to: usize, forbidden: &[&str]| -> Result<(), String> {
        for line in lines.iter().take(to).skip(from) {
            if let Some(pattern) = forbidden.iter().find(|p| line.contains(**p)) {
                return Err(format!("CHECK-NOT: '{}' found in '{}'", pattern, line));
            }
        }
        Ok(())
    };

    for directive in directives {
        match directive {
            CheckDirective::Check(pattern) => {
                let found = lines
                    .iter()
                    .skip(line_idx)
                    .position(|line| line.contains(pattern.as_str()))
                    .ok_or_else(|| format!("CHECK: pattern '{}' not found in output", pattern))?;
                region_clean(line_idx, line_idx + found, &forbidden)?;
                forbidden.clear();
                line_idx += found + 1;
            }

            CheckDirective::CheckNext(pattern) => {
                let line = lines
                    .get(line_idx)
                    .ok_or_else(|| format!("CHECK-NEXT: no more lines, expected '{}'", pattern))?;
                if !line.contains(pattern.as_str()) {
                    return Err(format!("CHECK-NEXT: expected '{}' but got '{}'", pattern, line));
                }
                line_idx += 1;
            }

            CheckDirective::CheckNot(pattern) => forbidden.push(pattern),

            CheckDirective::CheckEmpty => {
                if let Some(line) = lines.get(line_idx) {
                    if !line.trim().is_empty() {
                        return Err(format!("CHECK-EMPTY: expected empty line but got '{}'", line));
                    }
                }
                line_idx += 1;
            }
        }
    }
    region_clean(line_idx, lines.len(), &forbidden)
}

/// Panic with the failing directive if `output` does not satisfy `directives`.
pub fn filecheck(output: &str, directives: &str) {
    let directives = parse(directives);
    if let Err(e) = validate(output, &directives) {
        panic!("{e}\n--- output ---\n{output}");
    }
}
