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

//! Component 6: the data-driven bit encoder. Given a catalog entry and a map
//! of operand values, produces the 16- or 32-bit instruction word.

use crate::ast::OperandValueMap;
use crate::bitfield::{parse_imm_range, write_field};
use crate::catalog::{FieldCategory, InstructionRecord};

/// Encodes `record` with the operand values in `values`. Never fails: a
/// missing operand just contributes zero to the relevant field. Out-of-range
/// or missing operands are the caller's own operand validation responsibility,
/// not a second error channel here.
pub fn encode(record: &InstructionRecord, values: &OperandValueMap) -> u32 {
    let mut word = record.base_word();

    for field in &record.fields {
        match field.category {
            FieldCategory::Opcode | FieldCategory::Funct | FieldCategory::Other => {
                // never overwritten except the two documented exceptions,
                // applied after this loop.
                continue;
            }
            FieldCategory::Rd => {
                let v = values
                    .get("rd")
                    .or_else(|| values.get("vd"))
                    .or_else(|| values.get("vs3"))
                    .copied()
                    .unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Rs1 => {
                // vector-immediate forms (e.g. VADD.VI) fall back to imm.
                let v = values
                    .get("rs1")
                    .or_else(|| values.get("imm"))
                    .copied()
                    .unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Rs2 => {
                let v = values.get("rs2").copied().unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Rs3 => {
                let v = values.get("rs3").copied().unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Immediate => {
                let imm = values.get("imm").copied().unwrap_or(0);
                let (hi, lo) = parse_imm_range(&field.name).unwrap_or((field.width() as u32 - 1, 0));
                let width = hi - lo + 1;
                let mask: i64 = if width >= 64 { -1 } else { (1i64 << width) - 1 };
                let slice = (imm >> lo) & mask;
                write_field(&mut word, field, slice as u64);
            }
            FieldCategory::Csr => {
                let v = values.get("csr").copied().unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Shamt => {
                let v = values
                    .get("shamt")
                    .or_else(|| values.get("imm"))
                    .copied()
                    .unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Rm => {
                let v = values.get("rm").copied().unwrap_or(7);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Aq => {
                let v = values.get("aq").copied().unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Rl => {
                let v = values.get("rl").copied().unwrap_or(0);
                write_field(&mut word, field, v as u64);
            }
            FieldCategory::Vm => {
                let v = values.get("vm").copied().unwrap_or(1);
                write_field(&mut word, field, v as u64);
            }
        }
    }

    apply_funct_field_exceptions(record, values, &mut word);
    word
}

/// The two exceptions to "never overwrite funct/opcode fields": R4-type
/// fused multiply-add encodes `rs3 << 2` into what the catalog marks as a
/// fully-variable `funct7`, and FP instructions with an explicit
/// rounding-mode operand encode `rm` into `funct3` bits 12-14.
fn apply_funct_field_exceptions(record: &InstructionRecord, values: &OperandValueMap, word: &mut u32) {
    if record.format.eq_ignore_ascii_case("R4") {
        if let Some(field) = record
            .fields
            .iter()
            .find(|f| f.start_bit == 31 && f.end_bit == 25 && !f.is_literal())
        {
            let rs3 = values.get("rs3").copied().unwrap_or(0);
            write_field(word, field, ((rs3 as u64) << 2) & 0x7f);
        }
    }

    if is_fp_mnemonic(&record.mnemonic) {
        if let Some(rm) = values.get("rm") {
            if let Some(field) = record
                .fields
                .iter()
                .find(|f| f.start_bit == 14 && f.end_bit == 12 && !f.is_literal())
            {
                write_field(word, field, *rm as u64);
            }
        }
    }
}

pub(crate) fn is_fp_mnemonic(mnemonic: &str) -> bool {
    let m = mnemonic.to_ascii_uppercase();
    m.starts_with('F')
        && !m.starts_with("FENCE")
        && !m.starts_with("FMV")
        && !m.starts_with("FCLASS")
        && m != "FEQ.S"
        && m != "FEQ.D"
        && m != "FLT.S"
        && m != "FLT.D"
        && m != "FLE.S"
        && m != "FLE.D"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalogs;
    use std::collections::HashMap;

    #[test]
    fn encodes_addi() {
        let catalogs = Catalogs::load_default();
        let record = catalogs.lookup("ADDI", 32).unwrap();
        let mut values = HashMap::new();
        values.insert("rd".to_string(), 5);
        values.insert("rs1".to_string(), 6);
        values.insert("imm".to_string(), 10);
        let word = encode(&record, &values);
        assert_eq!(word, 0x00A30293);
    }

    #[test]
    fn encodes_srai_shift_amount() {
        let catalogs = Catalogs::load_default();
        let record = catalogs.lookup("SRAI", 32).unwrap();
        let mut values = HashMap::new();
        values.insert("rd".to_string(), 1);
        values.insert("rs1".to_string(), 1);
        values.insert("shamt".to_string(), 2);
        let word = encode(&record, &values);
        // funct7 = 0100000, shamt = 00010
        assert_eq!((word >> 20) & 0xfff, 0b0100000_00010);
    }
}
