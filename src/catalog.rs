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

//! The catalog loader. Ingests the instruction table and the
//! pseudo-instruction table and builds the three lookup indexes. Catalogs
//! are built once and are immutable afterwards; `Catalogs` is `Send + Sync`
//! so a host can share one instance across concurrent calls.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::errors::CatalogError;

/// Bit-field semantic category.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldCategory {
    Opcode,
    Funct,
    Rd,
    Rs1,
    Rs2,
    Rs3,
    Immediate,
    Csr,
    Shamt,
    Rm,
    Aq,
    Rl,
    Vm,
    /// Any category the catalog names that the core has no special handling
    /// for (e.g. future extension bits); treated as a literal-only field.
    Other,
}

impl FieldCategory {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "opcode" => FieldCategory::Opcode,
            "funct" => FieldCategory::Funct,
            "rd" => FieldCategory::Rd,
            "rs1" => FieldCategory::Rs1,
            "rs2" => FieldCategory::Rs2,
            "rs3" => FieldCategory::Rs3,
            "immediate" | "offset" => FieldCategory::Immediate,
            "csr" => FieldCategory::Csr,
            "shamt" => FieldCategory::Shamt,
            "rm" => FieldCategory::Rm,
            "aq" => FieldCategory::Aq,
            "rl" => FieldCategory::Rl,
            "vm" => FieldCategory::Vm,
            _ => FieldCategory::Other,
        }
    }
}

/// A named bit range inside an instruction word, with the literal-or-variable
/// pattern for that sub-range (`'0'`/`'1'`/`'x'`, MSB first).
#[derive(Debug, Clone)]
pub struct EncodingField {
    pub name: String,
    pub start_bit: u8,
    pub end_bit: u8,
    pub category: FieldCategory,
    pub pattern: String,
}

impl EncodingField {
    pub fn width(&self) -> u8 {
        self.start_bit - self.end_bit + 1
    }

    /// A field with no `x` in its pattern is a pure literal used by the
    /// decoder to match candidates; funct/opcode fields are usually (but not
    /// always, see the R4/FP exceptions in the encoder) literal.
    pub fn is_literal(&self) -> bool {
        !self.pattern.contains('x')
    }
}

#[derive(Debug, Clone)]
pub struct InstructionRecord {
    pub mnemonic: String,
    pub extension: String,
    pub format: String,
    pub category: String,
    pub width: u8,
    pub mask: String,
    pub fields: Vec<EncodingField>,
    pub operands: Vec<String>,
}

impl InstructionRecord {
    pub fn is_compressed(&self) -> bool {
        self.width == 16
    }

    /// The literal base pattern: every `x` in the mask replaced by `0`.
    pub fn base_word(&self) -> u32 {
        let literal: String = self.mask.chars().map(|c| if c == 'x' { '0' } else { c }).collect();
        u32::from_str_radix(&literal, 2).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct PseudoRecord {
    pub mnemonic: String,
    pub pseudo_format: String,
    pub base_instructions: Vec<String>,
    pub required_extensions: Vec<String>,
}

impl PseudoRecord {
    /// Operand count implied by the pseudo-format string, e.g. `"mv rd, rs"`
    /// has two operands. Used to pick among candidates with the same
    /// mnemonic but different arities.
    pub fn operand_count(&self) -> usize {
        match self.pseudo_format.split_once(char::is_whitespace) {
            Some((_, rest)) if !rest.trim().is_empty() => {
                rest.split(',').filter(|s| !s.trim().is_empty()).count()
            }
            _ => 0,
        }
    }

    pub fn last_operand_name(&self) -> Option<String> {
        let rest = self.pseudo_format.split_once(char::is_whitespace)?.1;
        rest.split(',').next_back().map(|s| s.trim().to_string())
    }
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "startBit")]
    start_bit: u8,
    #[serde(rename = "endBit")]
    end_bit: u8,
    value: String,
    category: String,
}

#[derive(Deserialize)]
struct RawInstruction {
    mnemonic: String,
    extension: String,
    format: String,
    category: String,
    encoding: String,
    operands: Vec<String>,
    #[serde(rename = "encodingFields")]
    encoding_fields: Vec<RawField>,
    #[allow(dead_code)]
    #[serde(default)]
    #[serde(rename = "instructionCount")]
    instruction_count: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPseudo {
    mnemonic: String,
    pseudoinstruction: String,
    #[serde(rename = "baseInstructions")]
    base_instructions: Vec<String>,
    #[serde(default)]
    #[serde(rename = "requiredExtensions")]
    required_extensions: Vec<String>,
}

/// Extension preference order for a 64-bit-wide caller.
const XLEN64_EXT_ORDER: &[&str] = &[
    "RV64I", "RV64M", "RV64A", "RV64F", "RV64D", "RV64B", "RV64C", "RV64V", "RV64Zfh", "RV32I",
    "RV32M", "RV32A", "RV32F", "RV32D", "RV32B", "RV32C", "RV32V", "RV32Zfh",
];

/// Extension preference order for a 32-bit-wide caller.
const XLEN32_EXT_ORDER: &[&str] = &[
    "RV32I", "RV32M", "RV32A", "RV32F", "RV32D", "RV32B", "RV32C", "RV32V", "RV32Zfh",
];

pub fn extension_order_for_xlen(xlen: u8) -> &'static [&'static str] {
    if xlen == 64 { XLEN64_EXT_ORDER } else { XLEN32_EXT_ORDER }
}

#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub instructions: Vec<Arc<InstructionRecord>>,
    by_mnemonic: HashMap<String, Arc<InstructionRecord>>,
    by_mnemonic_ext: HashMap<(String, String), Arc<InstructionRecord>>,
    pseudo_by_mnemonic: HashMap<String, Vec<Arc<PseudoRecord>>>,
}

impl Catalogs {
    pub fn load(instructions_json: &str, pseudo_json: &str) -> Result<Catalogs, CatalogError> {
        let raw_instructions: Vec<RawInstruction> = serde_json::from_str(instructions_json)?;
        let raw_pseudo: Vec<RawPseudo> = serde_json::from_str(pseudo_json)?;

        let mut catalogs = Catalogs::default();

        for raw in raw_instructions {
            let record = build_instruction_record(raw)?;
            let record = Arc::new(record);
            catalogs.instructions.push(record.clone());

            let key = record.mnemonic.to_ascii_uppercase();
            catalogs
                .by_mnemonic_ext
                .entry((key.clone(), record.extension.clone()))
                .or_insert_with(|| record.clone());

            catalogs
                .by_mnemonic
                .entry(key)
                .and_modify(|existing| {
                    if !existing.extension.starts_with("RV32") && record.extension.starts_with("RV32") {
                        *existing = record.clone();
                    }
                })
                .or_insert(record);
        }

        for raw in raw_pseudo {
            let key = raw.mnemonic.to_ascii_uppercase();
            let record = Arc::new(PseudoRecord {
                mnemonic: raw.mnemonic,
                pseudo_format: raw.pseudoinstruction,
                base_instructions: raw.base_instructions,
                required_extensions: raw.required_extensions,
            });
            catalogs.pseudo_by_mnemonic.entry(key).or_default().push(record);
        }

        log::debug!(
            "catalog loaded: {} instructions, {} pseudo mnemonics",
            catalogs.instructions.len(),
            catalogs.pseudo_by_mnemonic.len()
        );

        Ok(catalogs)
    }

    /// Loads the crate's embedded default catalog. A representative subset
    /// of the full manual table, covering every format tag and field
    /// category named in the data model.
    pub fn load_default() -> Catalogs {
        Catalogs::load(
            include_str!("../data/instructions.json"),
            include_str!("../data/pseudo.json"),
        )
        .expect("embedded default catalog is well-formed")
    }

    /// Looks up a mnemonic's native instruction record, preferring the
    /// extension order for the caller's XLEN and falling back to whatever
    /// extension first registered the mnemonic.
    pub fn lookup(&self, mnemonic: &str, xlen: u8) -> Option<Arc<InstructionRecord>> {
        let key = mnemonic.to_ascii_uppercase();
        for ext in extension_order_for_xlen(xlen) {
            if let Some(rec) = self.by_mnemonic_ext.get(&(key.clone(), (*ext).to_string())) {
                return Some(rec.clone());
            }
        }
        self.by_mnemonic.get(&key).cloned()
    }

    pub fn lookup_ext(&self, mnemonic: &str, extension: &str) -> Option<Arc<InstructionRecord>> {
        self.by_mnemonic_ext
            .get(&(mnemonic.to_ascii_uppercase(), extension.to_string()))
            .cloned()
    }

    pub fn pseudo(&self, mnemonic: &str) -> Option<&[Arc<PseudoRecord>]> {
        self.pseudo_by_mnemonic
            .get(&mnemonic.to_ascii_uppercase())
            .map(|v| v.as_slice())
    }

    pub fn is_known_mnemonic(&self, mnemonic: &str) -> bool {
        let key = mnemonic.to_ascii_uppercase();
        self.by_mnemonic.contains_key(&key) || self.pseudo_by_mnemonic.contains_key(&key)
    }
}

fn build_instruction_record(raw: RawInstruction) -> Result<InstructionRecord, CatalogError> {
    let width = raw.encoding.len();
    if width != 16 && width != 32 {
        return Err(CatalogError::BadWidth {
            mnemonic: raw.mnemonic,
            width,
        });
    }

    let mut fields = Vec::with_capacity(raw.encoding_fields.len());
    for f in raw.encoding_fields {
        if f.start_bit < f.end_bit {
            return Err(CatalogError::BadFieldRange {
                mnemonic: raw.mnemonic,
                field: f.name,
                start: f.start_bit,
                end: f.end_bit,
            });
        }
        let expected = (f.start_bit - f.end_bit + 1) as usize;
        if f.value.len() != expected {
            return Err(CatalogError::FieldPatternLength {
                mnemonic: raw.mnemonic,
                field: f.name,
                got: f.value.len(),
                expected,
            });
        }
        fields.push(EncodingField {
            name: f.name,
            start_bit: f.start_bit,
            end_bit: f.end_bit,
            category: FieldCategory::parse(&f.category),
            pattern: f.value,
        });
    }

    Ok(InstructionRecord {
        mnemonic: raw.mnemonic,
        extension: raw.extension,
        format: raw.format,
        category: raw.category,
        width: width as u8,
        mask: raw.encoding,
        fields,
        operands: raw.operands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_loads() {
        let catalogs = Catalogs::load_default();
        assert!(catalogs.lookup("ADDI", 32).is_some());
        assert!(catalogs.lookup("ADDI", 64).is_some());
    }

    #[test]
    fn rv32_wins_default_index() {
        let catalogs = Catalogs::load_default();
        let rec = catalogs.by_mnemonic.get("SLLI").unwrap();
        assert!(rec.extension.starts_with("RV32"));
    }

    #[test]
    fn xlen_sensitive_lookup_prefers_rv64() {
        let catalogs = Catalogs::load_default();
        let rec = catalogs.lookup("SLLI", 64).unwrap();
        assert_eq!(rec.extension, "RV64I");
    }
}
