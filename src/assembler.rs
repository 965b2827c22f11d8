/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The top-level entry point: wires the lexer, operand parser, pass one and
//! pass two together into one `assemble()` call.

use std::collections::HashMap;

use crate::ast::ParsedLine;
use crate::catalog::Catalogs;
use crate::emitter;
use crate::lexer::{self, RawLine};
use crate::operand_parser::parse_operand;
use crate::symbols;

/// Per-call configuration. Defaults to text base 0, data base 0x2000, XLEN 32.
#[derive(Debug, Clone, Copy)]
pub struct AssemblerConfig {
    pub text_base: u64,
    pub data_base: u64,
    pub xlen: u8,
    /// Governs whether a bare numeric operand in a CSR-instruction position
    /// is accepted as a CSR number.
    pub allow_numeric_csr: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            text_base: 0,
            data_base: 0x2000,
            xlen: 32,
            allow_numeric_csr: false,
        }
    }
}

/// The full result of assembling one source file. `errors` are already
/// formatted `Line N: message` strings; a non-empty `errors` list does not
/// mean `text_bytes`/`data_bytes` are empty: assembly accumulates and keeps
/// going past a bad line.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AssemblyResult {
    pub success: bool,
    pub text_base: u64,
    pub data_base: u64,
    pub text_bytes: Vec<u8>,
    pub data_bytes: Vec<u8>,
    pub line_to_first_address: HashMap<usize, u64>,
    pub address_to_line: HashMap<u64, usize>,
    pub labels: HashMap<String, u64>,
    pub data_labels: HashMap<String, u64>,
    pub constants: HashMap<String, i64>,
    pub errors: Vec<String>,
}

/// Assembles `source` against `catalogs`. A malformed-beyond-parsing source
/// file (one the grammar itself rejects) is reported as a single error line
/// rather than aborting, matching the "accumulate, never throw" policy even
/// at the lexing stage.
pub fn assemble(source: &str, catalogs: &Catalogs, config: &AssemblerConfig) -> AssemblyResult {
    let raw_lines = match lexer::lex(source) {
        Ok(lines) => lines,
        Err(e) => {
            log::warn!("lex error: {e}");
            return AssemblyResult {
                errors: vec![format!("Line 1: {e}")],
                ..Default::default()
            };
        }
    };

    let mut lines: Vec<ParsedLine> = raw_lines
        .into_iter()
        .map(|raw| to_parsed_line(raw, config.allow_numeric_csr))
        .collect();

    let constants = symbols::gather_constants(&lines);
    symbols::substitute_constants(&mut lines, &constants);

    let resolved = symbols::resolve_addresses(&lines, catalogs, config.xlen, config.text_base, config.data_base);
    let output = emitter::emit(&lines, catalogs, &resolved, config.xlen, config.text_base, config.data_base);

    log::debug!(
        "assembly complete: {} text bytes, {} data bytes, {} error(s)",
        output.text_bytes.len(),
        output.data_bytes.len(),
        output.errors.len()
    );

    let data_labels = resolved
        .labels
        .iter()
        .filter(|(_, &addr)| addr >= config.data_base)
        .map(|(name, &addr)| (name.clone(), addr))
        .collect();

    let errors: Vec<String> = output.errors.into_iter().map(|e| e.to_string()).collect();

    AssemblyResult {
        success: errors.is_empty(),
        text_base: config.text_base,
        data_base: config.data_base,
        text_bytes: output.text_bytes,
        data_bytes: output.data_bytes,
        line_to_first_address: output.line_to_first_address,
        address_to_line: output.address_to_line,
        labels: resolved.labels,
        data_labels,
        constants,
        errors,
    }
}

fn to_parsed_line(raw: RawLine, allow_numeric_csr: bool) -> ParsedLine {
    ParsedLine {
        line_number: raw.line_number,
        label: raw.label,
        directive: raw.directive,
        mnemonic: raw.mnemonic,
        operands: raw
            .operand_tokens
            .iter()
            .map(|tok| parse_operand(tok, allow_numeric_csr))
            .collect(),
        section: raw.section,
        rm_suffix: raw.rm_suffix,
        aq_suffix: raw.aq_suffix,
        rl_suffix: raw.rl_suffix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_addi() {
        let catalogs = Catalogs::load_default();
        let result = assemble("addi x5, x6, 10\n", &catalogs, &AssemblerConfig::default());
        assert_eq!(result.text_bytes, vec![0x93, 0x02, 0xA3, 0x00]);
        assert!(result.errors.is_empty());
        assert!(result.success);
        assert_eq!(result.text_base, 0);
        assert_eq!(result.data_base, 0x2000);
    }

    #[test]
    fn data_labels_are_filtered_by_data_base() {
        let catalogs = Catalogs::load_default();
        let source = "top:\naddi x1, x0, 1\n.data\nbottom:\n.word 1\n";
        let result = assemble(source, &catalogs, &AssemblerConfig::default());
        assert!(result.labels.contains_key("top"));
        assert!(!result.data_labels.contains_key("top"));
        assert!(result.data_labels.contains_key("bottom"));
    }

    #[test]
    fn failed_assembly_reports_success_false() {
        let catalogs = Catalogs::load_default();
        let result = assemble("bogus x1, x2\n", &catalogs, &AssemblerConfig::default());
        assert!(!result.success);
    }

    #[test]
    fn assembles_forward_branch() {
        let catalogs = Catalogs::load_default();
        let source = "beq x1, x2, done\naddi x3, x0, 1\ndone:\naddi x4, x0, 2\n";
        let result = assemble(source, &catalogs, &AssemblerConfig::default());
        let word0 = u32::from_le_bytes(result.text_bytes[0..4].try_into().unwrap());
        assert_eq!(word0, 0x00208463);
        assert_eq!(result.labels.get("done"), Some(&8));
    }

    #[test]
    fn equ_constant_substitutes_into_immediate() {
        let catalogs = Catalogs::load_default();
        let source = ".equ BASE, 100\naddi x5, x0, BASE\n";
        let result = assemble(source, &catalogs, &AssemblerConfig::default());
        assert_eq!(result.constants.get("BASE"), Some(&100));
        assert!(result.errors.is_empty());
        assert_eq!(result.text_bytes.len(), 4);
    }

    #[test]
    fn unknown_mnemonic_is_reported_without_aborting() {
        let catalogs = Catalogs::load_default();
        let source = "bogus x1, x2\naddi x1, x0, 1\n";
        let result = assemble(source, &catalogs, &AssemblerConfig::default());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Line 1:"));
        assert_eq!(result.text_bytes.len(), 4);
    }
}
