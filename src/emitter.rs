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

//! Pass two, the emitter. Walks the parsed lines a second time with the
//! symbol table from pass one now final, choosing between native encoding
//! and pseudo-expansion, and records the address/line maps.

use std::collections::HashMap;

use crate::ast::{Operand, ParsedLine, Section, VtypeFieldName};
use crate::catalog::{Catalogs, InstructionRecord};
use crate::errors::SourceError;
use crate::pseudo::{self, ExpansionContext};
use crate::symbols::{requires_mem_operand, ResolvedSymbols};

#[derive(Debug, Clone, Default)]
pub struct EmitOutput {
    pub text_bytes: Vec<u8>,
    pub data_bytes: Vec<u8>,
    pub line_to_first_address: HashMap<usize, u64>,
    pub address_to_line: HashMap<u64, usize>,
    pub errors: Vec<SourceError>,
}

fn is_register_name(name: &str) -> bool {
    matches!(name, "rd" | "rs1" | "rs2" | "rs3" | "vd" | "vs1" | "vs2" | "vs3")
}

fn operand_scalar(op: &Operand, current_addr: u64, labels: &HashMap<String, u64>) -> i64 {
    match op {
        Operand::IntReg(r) | Operand::FpReg(r) | Operand::VecReg(r) => *r as i64,
        Operand::Csr(v) => *v as i64,
        Operand::Imm(v) => *v,
        Operand::RoundMode(v) => *v as i64,
        Operand::VtypeField(_, v) => *v as i64,
        Operand::Label(name) => labels
            .get(name)
            .map(|addr| *addr as i64 - current_addr as i64)
            .unwrap_or(0),
        Operand::Mem { offset, .. } => *offset,
    }
}

/// Maps a line's already-classified operands onto `record.operands`, the
/// catalog's name list authored in source order, flattening any `Mem`
/// operand into its two sub-values (base register, offset) by field kind.
/// This is what reorders operands to match each format: the reordering
/// lives in the catalog's operand-name order, not in per-format code here.
fn build_value_map(
    record: &InstructionRecord,
    operands: &[Operand],
    current_addr: u64,
    labels: &HashMap<String, u64>,
) -> HashMap<String, i64> {
    let mut values = HashMap::new();
    let mut names = record.operands.iter();

    for op in operands {
        match op {
            Operand::Mem { offset, base, .. } => {
                for _ in 0..2 {
                    if let Some(name) = names.next() {
                        let v = if is_register_name(name) { *base as i64 } else { *offset };
                        values.insert(name.clone(), v);
                    }
                }
            }
            _ => {
                if let Some(name) = names.next() {
                    values.insert(name.clone(), operand_scalar(op, current_addr, labels));
                }
            }
        }
    }

    values
}

fn is_vset_vli(mnemonic: &str) -> bool {
    mnemonic == "VSETVLI" || mnemonic == "VSETIVLI"
}

/// `VSETVLI`/`VSETIVLI` special case: the catalog's operand list is
/// `[imm, rs1, rd]` but source syntax is `rd, rs1, e32, m1, ta, ma` (or an
/// immediate AVL for `VSETIVLI`). The only instruction-specific branch in
/// the emitter.
fn build_vset_value_map(operands: &[Operand]) -> HashMap<String, i64> {
    let mut sew = 0i64;
    let mut lmul = 0i64;
    let mut ta = 0i64;
    let mut ma = 0i64;
    let mut rd = 0i64;
    let mut rs1_or_avl = 0i64;
    let mut regs_seen = 0;

    for op in operands {
        match op {
            Operand::VtypeField(field, v) => match field {
                VtypeFieldName::Sew => sew = *v as i64,
                VtypeFieldName::Lmul => lmul = *v as i64,
                VtypeFieldName::Ta => ta = *v as i64,
                VtypeFieldName::Ma => ma = *v as i64,
            },
            Operand::IntReg(r) => {
                if regs_seen == 0 {
                    rd = *r as i64;
                } else {
                    rs1_or_avl = *r as i64;
                }
                regs_seen += 1;
            }
            Operand::Imm(v) => rs1_or_avl = *v,
            _ => {}
        }
    }

    let vtype = (ma << 7) | (ta << 6) | (sew << 3) | lmul;
    let mut values = HashMap::new();
    values.insert("rd".to_string(), rd);
    values.insert("rs1".to_string(), rs1_or_avl);
    values.insert("imm".to_string(), vtype);
    values
}

/// Applies the rounding-mode / atomic-ordering suffixes, defaulting `rm` to
/// 7 (`dyn`) for FP arithmetic instructions that lack an explicit suffix.
fn apply_suffixes(
    values: &mut HashMap<String, i64>,
    mnemonic: &str,
    rm_suffix: Option<u8>,
    aq_suffix: Option<u8>,
    rl_suffix: Option<u8>,
) {
    if let Some(rm) = rm_suffix {
        values.insert("rm".to_string(), rm as i64);
    } else if crate::encoder::is_fp_mnemonic(mnemonic) {
        values.insert("rm".to_string(), 7);
    }
    if let Some(aq) = aq_suffix {
        values.insert("aq".to_string(), aq as i64);
    }
    if let Some(rl) = rl_suffix {
        values.insert("rl".to_string(), rl as i64);
    }
}

fn push_le(bytes: &mut Vec<u8>, word: u32, width: u8) {
    let le = word.to_le_bytes();
    bytes.extend_from_slice(&le[..width as usize]);
}

pub fn emit(
    lines: &[ParsedLine],
    catalogs: &Catalogs,
    resolved: &ResolvedSymbols,
    xlen: u8,
    text_base: u64,
    data_base: u64,
) -> EmitOutput {
    let mut out = EmitOutput::default();
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

        match section {
            Section::Text => {
                let Some(mnemonic) = &line.mnemonic else { continue };
                emit_instruction_line(
                    line,
                    mnemonic,
                    catalogs,
                    resolved,
                    xlen,
                    &mut text_addr,
                    &mut out,
                );
            }
            Section::Data => {
                if let Some(directive) = &line.directive {
                    let (bytes, dir_errors) = crate::directives::emit_directive_bytes(directive, data_addr);
                    for msg in dir_errors {
                        log::warn!("line {}: {}", line.line_number, msg);
                        out.errors.push(SourceError::new(line.line_number, msg));
                    }
                    data_addr += bytes.len() as u64;
                    out.data_bytes.extend(bytes);
                }
            }
        }
    }

    out
}

#[allow(clippy::too_many_arguments)]
fn emit_instruction_line(
    line: &ParsedLine,
    mnemonic: &str,
    catalogs: &Catalogs,
    resolved: &ResolvedSymbols,
    xlen: u8,
    text_addr: &mut u64,
    out: &mut EmitOutput,
) {
    let last_is_mem = matches!(line.operands.last(), Some(Operand::Mem { .. }));
    let must_pseudo = requires_mem_operand(mnemonic) && !last_is_mem;

    let native = if must_pseudo { None } else { catalogs.lookup(mnemonic, xlen) };

    if let Some(record) = native {
        let mut values = if is_vset_vli(mnemonic) {
            build_vset_value_map(&line.operands)
        } else {
            build_value_map(&record, &line.operands, *text_addr, &resolved.labels)
        };
        apply_suffixes(&mut values, mnemonic, line.rm_suffix, line.aq_suffix, line.rl_suffix);

        let word = crate::encoder::encode(&record, &values);
        let width = if record.is_compressed() { 2 } else { 4 };

        out.line_to_first_address.entry(line.line_number).or_insert(*text_addr);
        out.address_to_line.insert(*text_addr, line.line_number);
        push_le(&mut out.text_bytes, word, width);
        *text_addr += width as u64;
        return;
    }

    let is_pseudo = mnemonic == "FENCE" || mnemonic == "LI" || catalogs.pseudo(mnemonic).is_some();
    if !is_pseudo {
        let msg = format!("Unknown instruction '{mnemonic}'");
        log::warn!("line {}: {}", line.line_number, msg);
        out.errors.push(SourceError::new(line.line_number, msg));
        return;
    }

    let ctx = ExpansionContext { labels: &resolved.labels, current_addr: *text_addr };
    match pseudo::expand(catalogs, xlen, mnemonic, &line.operands, &ctx) {
        Ok(words) => {
            out.line_to_first_address.entry(line.line_number).or_insert(*text_addr);
            for w in words {
                let width = if w.is_compressed { 2 } else { 4 };
                out.address_to_line.insert(*text_addr, line.line_number);
                push_le(&mut out.text_bytes, w.word, width);
                *text_addr += width as u64;
            }
        }
        Err(e) => {
            let msg = format!("Failed to encode '{mnemonic}': {e}");
            log::warn!("line {}: {}", line.line_number, msg);
            out.errors.push(SourceError::new(line.line_number, msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ParsedLine;
    use crate::catalog::Catalogs;
    use crate::symbols::{self, ResolvedSymbols};

    fn line(n: usize, label: Option<&str>, mnemonic: Option<&str>, operands: Vec<Operand>) -> ParsedLine {
        ParsedLine {
            line_number: n,
            label: label.map(String::from),
            directive: None,
            mnemonic: mnemonic.map(String::from),
            operands,
            section: Section::Text,
            rm_suffix: None,
            aq_suffix: None,
            rl_suffix: None,
        }
    }

    #[test]
    fn emits_addi() {
        let catalogs = Catalogs::load_default();
        let lines = vec![line(1, None, Some("ADDI"), vec![Operand::IntReg(5), Operand::IntReg(6), Operand::Imm(10)])];
        let resolved = symbols::resolve_addresses(&lines, &catalogs, 32, 0, 0x2000);
        let output = emit(&lines, &catalogs, &resolved, 32, 0, 0x2000);
        assert_eq!(output.text_bytes, vec![0x93, 0x02, 0xA3, 0x00]);
        assert_eq!(output.address_to_line.get(&0), Some(&1));
        assert!(output.errors.is_empty());
    }

    #[test]
    fn unknown_instruction_is_recorded_and_does_not_advance() {
        let catalogs = Catalogs::load_default();
        let lines = vec![
            line(1, None, Some("BOGUS"), vec![]),
            line(2, None, Some("ADDI"), vec![Operand::IntReg(1), Operand::IntReg(0), Operand::Imm(1)]),
        ];
        let resolved = ResolvedSymbols::default();
        let output = emit(&lines, &catalogs, &resolved, 32, 0, 0);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.text_bytes.len(), 4);
        assert_eq!(output.address_to_line.get(&0), Some(&2));
    }

    #[test]
    fn branch_to_forward_label() {
        let catalogs = Catalogs::load_default();
        let lines = vec![
            line(1, None, Some("BEQ"), vec![Operand::IntReg(1), Operand::IntReg(2), Operand::Label("done".into())]),
            line(2, None, Some("ADDI"), vec![Operand::IntReg(3), Operand::IntReg(0), Operand::Imm(1)]),
            line(3, Some("done"), Some("ADDI"), vec![Operand::IntReg(4), Operand::IntReg(0), Operand::Imm(2)]),
        ];
        let resolved = symbols::resolve_addresses(&lines, &catalogs, 32, 0, 0x2000);
        let output = emit(&lines, &catalogs, &resolved, 32, 0, 0x2000);
        let word0 = u32::from_le_bytes(output.text_bytes[0..4].try_into().unwrap());
        assert_eq!(word0, 0x00208463);
    }
}
