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

//! Pass one: the symbol and size resolver. Two sub-passes: gather `.equ`
//! constants, then walk addresses.

use std::collections::HashMap;

use crate::ast::{Operand, ParsedLine, Section};
use crate::catalog::Catalogs;
use crate::operand_parser::parse_int_literal;

/// Mnemonics whose final operand must be a `Mem` to take the native
/// encoding; otherwise they are forced through pseudo-expansion.
const FORCED_PSEUDO_LOAD_STORE: &[&str] = &[
    "LB", "LH", "LW", "LD", "LBU", "LHU", "LWU", "SB", "SH", "SW", "SD", "FLW", "FLD", "FSW", "FSD",
];

pub fn requires_mem_operand(mnemonic: &str) -> bool {
    FORCED_PSEUDO_LOAD_STORE.contains(&mnemonic)
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSymbols {
    pub labels: HashMap<String, u64>,
    pub constants: HashMap<String, i64>,
    pub text_size: u64,
    pub data_size: u64,
}

/// Pass 0: gathers `.equ NAME, expr` constants in source order, so a
/// later constant may reference an earlier one.
pub fn gather_constants(lines: &[ParsedLine]) -> HashMap<String, i64> {
    let mut constants = HashMap::new();
    for line in lines {
        if let Some(directive) = &line.directive {
            if directive.name == ".equ" {
                if let Some(name) = directive.args.first() {
                    let expr = directive.args[1..].join(" ");
                    if let Some(value) = evaluate_expr(&expr, &constants) {
                        constants.insert(name.clone(), value);
                    }
                }
            }
        }
    }
    constants
}

/// Evaluates a left-to-right `+`/`-`/`*` expression over integer literals and
/// already-known constants. Whitespace-separated tokens only; the
/// expressions this assembler's `.equ` directives carry are simple sums of a
/// named constant and a literal, not a general-purpose arithmetic grammar.
pub fn evaluate_expr(expr: &str, constants: &HashMap<String, i64>) -> Option<i64> {
    let tokens: Vec<&str> = expr.split_whitespace().collect();
    let first = *tokens.first()?;
    let mut acc = resolve_atom(first, constants)?;
    let mut i = 1;
    while i + 1 < tokens.len() {
        let op = tokens[i];
        let rhs = resolve_atom(tokens[i + 1], constants)?;
        acc = match op {
            "+" => acc + rhs,
            "-" => acc - rhs,
            "*" => acc * rhs,
            _ => return None,
        };
        i += 2;
    }
    Some(acc)
}

fn resolve_atom(tok: &str, constants: &HashMap<String, i64>) -> Option<i64> {
    constants.get(tok).copied().or_else(|| parse_int_literal(tok))
}

/// Replaces any `Operand::Label` bound to a known `.equ` constant with the
/// constant's `Operand::Imm` (names bound by `.equ` resolve as immediates).
/// Run once, before the address walk, so pass one's size calculation and
/// pass two's encoding both see the resolved form.
pub fn substitute_constants(lines: &mut [ParsedLine], constants: &HashMap<String, i64>) {
    for line in lines.iter_mut() {
        for operand in line.operands.iter_mut() {
            if let Operand::Label(name) = operand {
                if let Some(value) = constants.get(name) {
                    *operand = Operand::Imm(*value);
                }
            }
        }
    }
}

/// Pass 1: the address walk. Mutates nothing in `lines`; returns the
/// resolved label table and final section sizes.
pub fn resolve_addresses(
    lines: &[ParsedLine],
    catalogs: &Catalogs,
    xlen: u8,
    text_base: u64,
    data_base: u64,
) -> ResolvedSymbols {
    let mut labels = HashMap::new();
    let mut text_addr = text_base;
    let mut data_addr = data_base;
    let mut section = Section::Text;

    for line in lines {
        if let Some(d) = &line.directive {
            match d.name.as_str() {
                ".text" => section = Section::Text,
                ".data" => section = Section::Data,
                _ => {}
            }
        }

        if let Some(label) = &line.label {
            let addr = match section {
                Section::Text => text_addr,
                Section::Data => data_addr,
            };
            labels.insert(label.clone(), addr);
        }

        match section {
            Section::Text => {
                if let Some(mnemonic) = &line.mnemonic {
                    text_addr += instruction_size(catalogs, xlen, mnemonic, &line.operands) as u64;
                }
            }
            Section::Data => {
                if let Some(directive) = &line.directive {
                    data_addr += crate::directives::directive_length(directive, data_addr) as u64;
                }
            }
        }
    }

    log::debug!(
        "pass one: {} labels, text size {} bytes, data size {} bytes",
        labels.len(),
        text_addr - text_base,
        data_addr - data_base
    );

    ResolvedSymbols {
        labels,
        constants: HashMap::new(),
        text_size: text_addr - text_base,
        data_size: data_addr - data_base,
    }
}

/// The size, in bytes, this line's instruction will occupy once emitted.
/// Forced-pseudo load/store forms and anything without a native catalog
/// entry fall through to a pseudo trial expansion.
pub fn instruction_size(catalogs: &Catalogs, xlen: u8, mnemonic: &str, operands: &[Operand]) -> usize {
    let last_is_mem = matches!(operands.last(), Some(Operand::Mem { .. }));
    let must_pseudo = requires_mem_operand(mnemonic) && !last_is_mem;

    if !must_pseudo {
        if let Some(record) = catalogs.lookup(mnemonic, xlen) {
            return if record.is_compressed() { 2 } else { 4 };
        }
    }

    crate::pseudo::trial_word_count(catalogs, xlen, mnemonic, operands)
        .map(|words| words * 4)
        .unwrap_or(4)
}
