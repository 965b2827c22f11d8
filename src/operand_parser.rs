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

//! The operand parser. Classifies one raw operand token into the tagged
//! `Operand` variant. The dispatch order below is the contract: later
//! alternatives never preempt earlier ones.

use crate::ast::{BaseKind, Operand, VtypeFieldName};

const INT_ABI: &[&str] = &[
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

const FP_ABI: &[&str] = &[
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

/// Parses a single operand token. `allow_numeric_csr` guards numeric CSR
/// parsing so a bare immediate like `0x300` used in a non-CSR position is
/// never swallowed as a CSR number.
pub fn parse_operand(token: &str, allow_numeric_csr: bool) -> Operand {
    let t = token.trim();

    if let Some(inner) = bare_paren(t) {
        if let Some(r) = int_reg_id(inner) {
            return Operand::Mem { offset: 0, base: r, kind: BaseKind::Int };
        }
    }

    if let Some((off_str, reg_str)) = split_offset_paren(t) {
        if let Some(offset) = parse_int_literal(off_str) {
            if let Some(r) = int_reg_id(reg_str) {
                return Operand::Mem { offset, base: r, kind: BaseKind::Int };
            }
            if let Some(r) = fp_reg_id(reg_str) {
                return Operand::Mem { offset, base: r, kind: BaseKind::Fp };
            }
        }
    }

    if let Some(r) = int_reg_id(t) {
        return Operand::IntReg(r);
    }
    if let Some(r) = fp_reg_id(t) {
        return Operand::FpReg(r);
    }
    if let Some(r) = vec_reg_id(t) {
        return Operand::VecReg(r);
    }
    if let Some(csr) = named_csr(t) {
        return Operand::Csr(csr);
    }
    if allow_numeric_csr {
        if let Some(v) = parse_int_literal(t) {
            if (0..=0xFFF).contains(&v) {
                return Operand::Csr(v as u16);
            }
        }
    }
    if let Some(rm) = rounding_mode(t) {
        return Operand::RoundMode(rm);
    }
    if let Some((field, v)) = vtype_field(t) {
        return Operand::VtypeField(field, v);
    }
    if is_identifier(t) {
        return Operand::Label(t.to_string());
    }

    Operand::Imm(parse_int_literal(t).unwrap_or(0))
}

fn is_identifier(t: &str) -> bool {
    let mut chars = t.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn bare_paren(t: &str) -> Option<&str> {
    if t.starts_with('(') && t.ends_with(')') && t.len() > 2 {
        Some(t[1..t.len() - 1].trim())
    } else {
        None
    }
}

fn split_offset_paren(t: &str) -> Option<(&str, &str)> {
    let open = t.find('(')?;
    if open == 0 || !t.ends_with(')') {
        return None;
    }
    let offset = t[..open].trim();
    let reg = t[open + 1..t.len() - 1].trim();
    if offset.is_empty() {
        return None;
    }
    Some((offset, reg))
}

fn int_reg_id(tok: &str) -> Option<u8> {
    let l = tok.to_ascii_lowercase();
    if let Some(rest) = l.strip_prefix('x') {
        if let Ok(n) = rest.parse::<u8>() {
            if n <= 31 {
                return Some(n);
            }
        }
    }
    if l == "fp" {
        return Some(8);
    }
    INT_ABI.iter().position(|&n| n == l).map(|i| i as u8)
}

fn fp_reg_id(tok: &str) -> Option<u8> {
    let l = tok.to_ascii_lowercase();
    if let Some(rest) = l.strip_prefix('f') {
        if let Ok(n) = rest.parse::<u8>() {
            if n <= 31 {
                return Some(n);
            }
        }
    }
    FP_ABI.iter().position(|&n| n == l).map(|i| i as u8)
}

fn vec_reg_id(tok: &str) -> Option<u8> {
    let l = tok.to_ascii_lowercase();
    let rest = l.strip_prefix('v')?;
    let n: u8 = rest.parse().ok()?;
    (n <= 31).then_some(n)
}

fn named_csr(tok: &str) -> Option<u16> {
    let csr = match tok.to_ascii_lowercase().as_str() {
        "fflags" => 0x001,
        "frm" => 0x002,
        "fcsr" => 0x003,
        "cycle" => 0xC00,
        "time" => 0xC01,
        "instret" => 0xC02,
        "cycleh" => 0xC80,
        "timeh" => 0xC81,
        "instreth" => 0xC82,
        "sstatus" => 0x100,
        "sie" => 0x104,
        "stvec" => 0x105,
        "scounteren" => 0x106,
        "sscratch" => 0x140,
        "sepc" => 0x141,
        "scause" => 0x142,
        "stval" => 0x143,
        "sip" => 0x144,
        "satp" => 0x180,
        "mstatus" => 0x300,
        "misa" => 0x301,
        "medeleg" => 0x302,
        "mideleg" => 0x303,
        "mie" => 0x304,
        "mtvec" => 0x305,
        "mcounteren" => 0x306,
        "mscratch" => 0x340,
        "mepc" => 0x341,
        "mcause" => 0x342,
        "mtval" => 0x343,
        "mip" => 0x344,
        "mvendorid" => 0xF11,
        "marchid" => 0xF12,
        "mimpid" => 0xF13,
        "mhartid" => 0xF14,
        _ => return None,
    };
    Some(csr)
}

fn rounding_mode(tok: &str) -> Option<u8> {
    match tok.to_ascii_lowercase().as_str() {
        "rne" => Some(0),
        "rtz" => Some(1),
        "rdn" => Some(2),
        "rup" => Some(3),
        "rmm" => Some(4),
        "dyn" => Some(7),
        _ => None,
    }
}

fn vtype_field(tok: &str) -> Option<(VtypeFieldName, u32)> {
    use VtypeFieldName::*;
    let v = match tok.to_ascii_lowercase().as_str() {
        "e8" => (Sew, 0),
        "e16" => (Sew, 1),
        "e32" => (Sew, 2),
        "e64" => (Sew, 3),
        "m1" => (Lmul, 0),
        "m2" => (Lmul, 1),
        "m4" => (Lmul, 2),
        "m8" => (Lmul, 3),
        "mf2" => (Lmul, 7),
        "mf4" => (Lmul, 6),
        "mf8" => (Lmul, 5),
        "tu" => (Ta, 0),
        "ta" => (Ta, 1),
        "mu" => (Ma, 0),
        "ma" => (Ma, 1),
        _ => return None,
    };
    Some(v)
}

/// Parses decimal/hex/binary integers with optional sign, and the character
/// literal forms `'x'` / `'\n'` / `'\r'` / `'\t'` / `'\0'` / `'\\'` / `'\''`.
pub fn parse_int_literal(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return parse_char_literal(&s[1..s.len() - 1]);
    }

    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };

    Some(if neg { -value } else { value })
}

fn parse_char_literal(inner: &str) -> Option<i64> {
    let mut chars = inner.chars();
    let c = chars.next()?;
    if c == '\\' {
        let esc = chars.next()?;
        let code = match esc {
            'n' => 10,
            'r' => 13,
            't' => 9,
            '0' => 0,
            '\\' => 92,
            '\'' => 39,
            _ => return None,
        };
        Some(code)
    } else {
        Some(c as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_int_register_forms() {
        assert_eq!(parse_operand("x5", false), Operand::IntReg(5));
        assert_eq!(parse_operand("a0", false), Operand::IntReg(10));
        assert_eq!(parse_operand("zero", false), Operand::IntReg(0));
        assert_eq!(parse_operand("fp", false), Operand::IntReg(8));
    }

    #[test]
    fn parses_mem_offset_forms() {
        assert_eq!(
            parse_operand("8(x1)", false),
            Operand::Mem { offset: 8, base: 1, kind: BaseKind::Int }
        );
        assert_eq!(
            parse_operand("-4(sp)", false),
            Operand::Mem { offset: -4, base: 2, kind: BaseKind::Int }
        );
        assert_eq!(
            parse_operand("(x3)", false),
            Operand::Mem { offset: 0, base: 3, kind: BaseKind::Int }
        );
    }

    #[test]
    fn parses_label_vs_immediate() {
        assert_eq!(parse_operand("done", false), Operand::Label("done".to_string()));
        assert_eq!(parse_operand("42", false), Operand::Imm(42));
        assert_eq!(parse_operand("0x12345", false), Operand::Imm(0x12345));
        assert_eq!(parse_operand("-10", false), Operand::Imm(-10));
    }

    #[test]
    fn parses_csr_and_rounding_and_vtype() {
        assert_eq!(parse_operand("mstatus", false), Operand::Csr(0x300));
        assert_eq!(parse_operand("rne", false), Operand::RoundMode(0));
        assert_eq!(parse_operand("e32", false), Operand::VtypeField(VtypeFieldName::Sew, 2));
        assert_eq!(parse_operand("0x300", true), Operand::Csr(0x300));
        assert_eq!(parse_operand("0x300", false), Operand::Imm(0x300));
    }

    #[test]
    fn parses_char_literal() {
        assert_eq!(parse_operand("'x'", false), Operand::Imm('x' as i64));
        assert_eq!(parse_operand("'\\n'", false), Operand::Imm(10));
    }
}
