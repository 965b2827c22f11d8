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

use thiserror::Error;

/// Errors raised while loading the instruction/pseudo-instruction catalogs.
///
/// These are host/programmer errors, not source errors: a malformed catalog
/// has no source line to attach a diagnostic to, and there is no sensible
/// partial catalog to keep assembling against, so it is a hard `Result::Err`
/// rather than an accumulated line message.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse instruction catalog JSON: {0}")]
    InstructionJson(#[from] serde_json::Error),

    #[error("Instruction '{mnemonic}' has encoding width {width}, expected 16 or 32")]
    BadWidth { mnemonic: String, width: usize },

    #[error("Instruction '{mnemonic}' field '{field}' has start_bit {start} < end_bit {end}")]
    BadFieldRange {
        mnemonic: String,
        field: String,
        start: u8,
        end: u8,
    },

    #[error("Instruction '{mnemonic}' field '{field}' pattern length ({got}) does not match its bit range ({expected})")]
    FieldPatternLength {
        mnemonic: String,
        field: String,
        got: usize,
        expected: usize,
    },
}

/// A single source-level diagnostic, always rendered as `Line N: <message>`
/// per the assembler's "accumulate, never throw" error policy.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceError {
    pub line: usize,
    pub message: String,
}

impl SourceError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

/// Internal decode-time error, used only by the single-word decoder which is a
/// pure function and has no accumulation list of its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No catalog entry matches word 0x{word:08x} under xlen {xlen}")]
    NoMatch { word: u32, xlen: u8 },
}
