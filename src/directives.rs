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

//! Data-section directive byte emission. Sizes are exact and known ahead of
//! emission (needed by pass one); emission itself never aborts. An invalid
//! value becomes zero bytes of the directive's intended width, keeping
//! subsequent addresses aligned with what pass one already computed.

use crate::ast::Directive;
use crate::operand_parser::parse_int_literal;

/// The byte length this directive will occupy once emitted. `current_addr`
/// is needed only by `.align`, whose padding depends on where the cursor
/// currently sits.
pub fn directive_length(directive: &Directive, current_addr: u64) -> usize {
    match directive.name.as_str() {
        ".byte" => directive.args.len(),
        ".half" => directive.args.len() * 2,
        ".word" => directive.args.len() * 4,
        ".dword" | ".quad" => directive.args.len() * 8,
        ".float" => directive.args.len() * 4,
        ".double" => directive.args.len() * 8,
        ".space" => directive.args.first().and_then(|s| parse_int_literal(s)).filter(|n| *n > 0).unwrap_or(0) as usize,
        ".align" => align_padding(directive, current_addr) as usize,
        ".ascii" => string_bytes(directive).len(),
        ".asciz" | ".string" => string_bytes(directive).len() + 1,
        _ => 0,
    }
}

fn align_padding(directive: &Directive, current_addr: u64) -> u64 {
    let p = directive.args.first().and_then(|s| parse_int_literal(s)).unwrap_or(0).max(0) as u32;
    let align = 1u64 << p;
    let rem = current_addr % align;
    if rem == 0 { 0 } else { align - rem }
}

fn string_bytes(directive: &Directive) -> Vec<u8> {
    parse_string_literal(&directive.args.join(","))
}

fn parse_string_literal(raw: &str) -> Vec<u8> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => bytes.push(b'\n'),
                Some('r') => bytes.push(b'\r'),
                Some('t') => bytes.push(b'\t'),
                Some('0') => bytes.push(0),
                Some('\\') => bytes.push(b'\\'),
                Some('"') => bytes.push(b'"'),
                Some('\'') => bytes.push(b'\''),
                Some(other) => bytes.extend(other.to_string().as_bytes()),
                None => {}
            }
        } else {
            bytes.extend(c.to_string().as_bytes());
        }
    }
    bytes
}

/// Emits this directive's bytes. Returns the bytes and any per-value error
/// messages (without the `Line N:` prefix; the caller attaches that).
pub fn emit_directive_bytes(directive: &Directive, current_addr: u64) -> (Vec<u8>, Vec<String>) {
    let mut bytes = Vec::new();
    let mut errors = Vec::new();

    match directive.name.as_str() {
        ".byte" => emit_ints(directive, 1, &mut bytes, &mut errors),
        ".half" => emit_ints(directive, 2, &mut bytes, &mut errors),
        ".word" => emit_ints(directive, 4, &mut bytes, &mut errors),
        ".dword" | ".quad" => emit_ints(directive, 8, &mut bytes, &mut errors),
        ".float" => emit_floats(directive, &mut bytes, &mut errors),
        ".double" => emit_doubles(directive, &mut bytes, &mut errors),
        ".space" => {
            let n = directive.args.first().and_then(|s| parse_int_literal(s)).filter(|n| *n > 0).unwrap_or(0);
            bytes.resize(n as usize, 0);
        }
        ".align" => {
            let n = align_padding(directive, current_addr);
            bytes.resize(n as usize, 0);
        }
        ".ascii" => bytes = string_bytes(directive),
        ".asciz" | ".string" => {
            bytes = string_bytes(directive);
            bytes.push(0);
        }
        _ => {}
    }

    (bytes, errors)
}

fn emit_ints(directive: &Directive, width: usize, bytes: &mut Vec<u8>, errors: &mut Vec<String>) {
    for arg in &directive.args {
        match parse_int_literal(arg) {
            Some(v) => {
                let le = (v as i128).to_le_bytes();
                bytes.extend_from_slice(&le[..width]);
            }
            None => {
                errors.push(format!("Invalid directive value '{arg}'"));
                bytes.resize(bytes.len() + width, 0);
            }
        }
    }
}

fn emit_floats(directive: &Directive, bytes: &mut Vec<u8>, errors: &mut Vec<String>) {
    for arg in &directive.args {
        match arg.trim().parse::<f32>() {
            Ok(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            Err(_) => {
                errors.push(format!("Invalid directive value '{arg}'"));
                bytes.resize(bytes.len() + 4, 0);
            }
        }
    }
}

fn emit_doubles(directive: &Directive, bytes: &mut Vec<u8>, errors: &mut Vec<String>) {
    for arg in &directive.args {
        match arg.trim().parse::<f64>() {
            Ok(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            Err(_) => {
                errors.push(format!("Invalid directive value '{arg}'"));
                bytes.resize(bytes.len() + 8, 0);
            }
        }
    }
}
