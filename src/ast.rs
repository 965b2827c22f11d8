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

//! The parsed-line AST produced by the lexer and consumed by the operand
//! parser, pass one and pass two.

use std::collections::HashMap;

/// Which byte buffer a line's bytes land in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Section {
    Text,
    Data,
}

/// Register class a `Mem` operand's base register belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BaseKind {
    Int,
    Fp,
}

/// One field of a `vsetvli`/`vsetivli` vtype immediate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VtypeFieldName {
    Sew,
    Lmul,
    Ta,
    Ma,
}

/// Exhaustive tagged-variant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    IntReg(u8),
    FpReg(u8),
    VecReg(u8),
    Csr(u16),
    /// Parsed integer value. Hex literals longer than 10 characters (i.e.
    /// needing more than 32 bits of magnitude) are kept as the verbatim
    /// string alongside the best-effort parsed value so 64-bit immediates
    /// never lose precision on a host whose integer parsing narrows early.
    Imm(i64),
    Label(String),
    Mem {
        offset: i64,
        base: u8,
        kind: BaseKind,
    },
    RoundMode(u8),
    VtypeField(VtypeFieldName, u32),
}

impl Operand {
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Operand::Label(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_imm(&self) -> Option<i64> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }
}

/// A `.directive name, args...` line, already section-independent.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
}

/// One physical source line. Comment-only and blank lines are retained as
/// no-op entries (label/instruction/directive all `None`) so line numbers
/// stay in sync with the emitted address-to-line map.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub line_number: usize,
    pub label: Option<String>,
    pub directive: Option<Directive>,
    /// Uppercased base mnemonic with any rounding/atomic-ordering suffix
    /// already stripped. `None` for label-only/directive-only/blank lines.
    pub mnemonic: Option<String>,
    pub operands: Vec<Operand>,
    pub section: Section,
    /// Rounding-mode suffix parsed off the mnemonic, e.g. `.RNE`.
    pub rm_suffix: Option<u8>,
    /// Atomic-ordering suffix parsed off the mnemonic, e.g. `.AQ`/`.RL`/`.AQRL`.
    pub aq_suffix: Option<u8>,
    pub rl_suffix: Option<u8>,
}

impl ParsedLine {
    pub fn empty(line_number: usize, section: Section) -> Self {
        Self {
            line_number,
            label: None,
            directive: None,
            mnemonic: None,
            operands: Vec::new(),
            section,
            rm_suffix: None,
            aq_suffix: None,
            rl_suffix: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.label.is_none() && self.directive.is_none() && self.mnemonic.is_none()
    }
}

/// Map of operand-name → value handed to the bit encoder/decoder. Values are
/// signed so immediates, register ids and CSR numbers share one
/// representation; the encoder masks to each field's width.
pub type OperandValueMap = HashMap<String, i64>;
