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

//! Pseudo-instruction expansion. `FENCE` and `LI` are special-cased;
//! everything else in the pseudo table drives a generic template-substitution
//! engine over the base-instruction strings.

use std::collections::HashMap;

use crate::ast::Operand;
use crate::catalog::{Catalogs, InstructionRecord, PseudoRecord};
use crate::operand_parser::parse_int_literal;

/// One emitted word of a pseudo-instruction expansion.
#[derive(Debug, Clone, Copy)]
pub struct ExpandedWord {
    pub word: u32,
    pub is_compressed: bool,
}

/// Address context a pseudo-expansion needs to resolve `symbol - pc` offsets.
/// `current_addr` is the address of the *first* word this expansion will
/// emit; each subsequent template's local address is derived by the caller.
pub struct ExpansionContext<'a> {
    pub labels: &'a HashMap<String, u64>,
    pub current_addr: u64,
}

/// Pass one's trial expansion: the word count a pseudo will emit, computed
/// without needing final label addresses (candidate/tier selection never
/// depends on where a label resolves to, only on operand shape).
pub fn trial_word_count(catalogs: &Catalogs, xlen: u8, mnemonic: &str, operands: &[Operand]) -> Option<usize> {
    match mnemonic {
        "FENCE" => Some(1),
        "LI" => {
            let imm = operands.get(1).and_then(Operand::as_imm)?;
            Some(li_template(imm, 0).len())
        }
        _ => {
            let candidate = select_candidate(catalogs, mnemonic, operands)?;
            Some(candidate.base_instructions.len())
        }
    }
}

/// Pass two's real expansion: produces the actual words.
pub fn expand(
    catalogs: &Catalogs,
    xlen: u8,
    mnemonic: &str,
    operands: &[Operand],
    ctx: &ExpansionContext,
) -> Result<Vec<ExpandedWord>, String> {
    match mnemonic {
        "FENCE" => Ok(vec![expand_fence(operands)]),
        "LI" => expand_li(catalogs, xlen, operands),
        _ => expand_catalog_driven(catalogs, xlen, mnemonic, operands, ctx),
    }
}

fn fence_mask(letters: &str) -> i64 {
    let mut m = 0i64;
    for c in letters.chars() {
        m |= match c.to_ascii_lowercase() {
            'i' => 0b1000,
            'o' => 0b0100,
            'r' => 0b0010,
            'w' => 0b0001,
            _ => 0,
        };
    }
    m
}

/// `FENCE`: parses optional `pred, succ` letters from `{i,o,r,w}`, default all
/// four; single-argument form sets `pred = succ`.
fn expand_fence(operands: &[Operand]) -> ExpandedWord {
    let letters: Vec<String> = operands
        .iter()
        .filter_map(|o| match o {
            Operand::Label(s) => Some(s.clone()),
            _ => None,
        })
        .collect();

    let (pred, succ) = match letters.len() {
        0 => (0b1111, 0b1111),
        1 => {
            let m = fence_mask(&letters[0]);
            (m, m)
        }
        _ => (fence_mask(&letters[0]), fence_mask(&letters[1])),
    };

    let word = ((pred << 24) | (succ << 20) | 0x0F) as u32;
    ExpandedWord { word, is_compressed: false }
}

fn fits_signed_32(v: i64) -> bool {
    v >= i32::MIN as i64 && v <= i32::MAX as i64
}

fn values3(rd: u8, rs1: u8, imm: i64) -> HashMap<String, i64> {
    let mut m = HashMap::new();
    m.insert("rd".to_string(), rd as i64);
    m.insert("rs1".to_string(), rs1 as i64);
    m.insert("imm".to_string(), imm);
    m
}

fn values_imm(rd: u8, imm: i64) -> HashMap<String, i64> {
    let mut m = HashMap::new();
    m.insert("rd".to_string(), rd as i64);
    m.insert("imm".to_string(), imm);
    m
}

fn values_shamt(rd: u8, rs1: u8, shamt: i64) -> HashMap<String, i64> {
    let mut m = HashMap::new();
    m.insert("rd".to_string(), rd as i64);
    m.insert("rs1".to_string(), rs1 as i64);
    m.insert("shamt".to_string(), shamt);
    m
}

fn values_rr(rd: u8, rs1: u8, rs2: u8) -> HashMap<String, i64> {
    let mut m = HashMap::new();
    m.insert("rd".to_string(), rd as i64);
    m.insert("rs1".to_string(), rs1 as i64);
    m.insert("rs2".to_string(), rs2 as i64);
    m
}

/// `LI rd, imm`'s three tiers, returned as an ordered list of (base mnemonic,
/// operand-value map) pairs. Recurses once for the RV64 64-bit split,
/// materializing the lower 32 bits into the fixed scratch register `31`/`t6`.
fn li_template(imm: i64, rd: u8) -> Vec<(&'static str, HashMap<String, i64>)> {
    let mut out = Vec::new();

    if (-2048..=2047).contains(&imm) {
        out.push(("ADDI", values3(rd, 0, imm)));
        return out;
    }

    if fits_signed_32(imm) {
        let upper20 = imm.wrapping_add(0x800) >> 12;
        let lower12 = imm - (upper20 << 12);
        out.push(("LUI", values_imm(rd, upper20 << 12)));
        if lower12 != 0 {
            out.push(("ADDI", values3(rd, rd, lower12)));
        }
        return out;
    }

    const SCRATCH: u8 = 31;
    let upper32 = imm >> 32;
    let lower32u = (imm as u64 & 0xFFFF_FFFF) as u32;
    let lower32s = lower32u as i32 as i64;

    out.extend(li_template(upper32, rd));
    out.push(("SLLI", values_shamt(rd, rd, 32)));
    out.extend(li_template(lower32s, SCRATCH));
    if lower32s < 0 {
        out.push(("SLLI", values_shamt(SCRATCH, SCRATCH, 32)));
        out.push(("SRLI", values_shamt(SCRATCH, SCRATCH, 32)));
    }
    out.push(("ADD", values_rr(rd, rd, SCRATCH)));
    out
}

fn expand_li(catalogs: &Catalogs, xlen: u8, operands: &[Operand]) -> Result<Vec<ExpandedWord>, String> {
    let rd = match operands.first() {
        Some(Operand::IntReg(r)) => *r,
        _ => return Err("LI requires an integer-register destination".to_string()),
    };
    let imm = operands
        .get(1)
        .and_then(Operand::as_imm)
        .ok_or_else(|| "LI requires an immediate operand".to_string())?;

    encode_steps(catalogs, xlen, li_template(imm, rd))
}

fn encode_steps(
    catalogs: &Catalogs,
    xlen: u8,
    steps: Vec<(&'static str, HashMap<String, i64>)>,
) -> Result<Vec<ExpandedWord>, String> {
    let mut words = Vec::with_capacity(steps.len());
    for (mnemonic, values) in steps {
        let record = catalogs
            .lookup(mnemonic, xlen)
            .ok_or_else(|| format!("catalog missing base instruction '{mnemonic}'"))?;
        let word = crate::encoder::encode(&record, &values);
        words.push(ExpandedWord { word, is_compressed: record.is_compressed() });
    }
    Ok(words)
}

/// Candidate selection for the generic (non-special-cased) pseudo table:
/// operand-count match, RV32-tag tiebreak, and the symbol-vs-`Mem` skip rule.
pub fn select_candidate(catalogs: &Catalogs, mnemonic: &str, operands: &[Operand]) -> Option<std::sync::Arc<PseudoRecord>> {
    let candidates = catalogs.pseudo(mnemonic)?;
    let count = operands.len();
    let caller_last_is_mem = matches!(operands.last(), Some(Operand::Mem { .. }));

    let mut filtered: Vec<std::sync::Arc<PseudoRecord>> = candidates
        .iter()
        .filter(|c| c.operand_count() == count)
        .filter(|c| {
            let last_expects_symbol = matches!(c.last_operand_name().as_deref(), Some("symbol") | Some("offset"));
            !(last_expects_symbol && caller_last_is_mem)
        })
        .cloned()
        .collect();

    if filtered.is_empty() {
        return None;
    }

    filtered.sort_by_key(|c| !c.required_extensions.iter().any(|e| e.starts_with("RV32")));
    Some(filtered.remove(0))
}

fn pseudo_operand_names(pseudo_format: &str) -> Vec<String> {
    match pseudo_format.split_once(char::is_whitespace) {
        Some((_, rest)) if !rest.trim().is_empty() => {
            rest.split(',').map(|s| s.trim().to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn is_register_name(name: &str) -> bool {
    matches!(name, "rd" | "rs1" | "rs2" | "rs3" | "vd" | "vs1" | "vs2" | "vs3")
}

fn resolve_named(op: &Operand, ctx: &ExpansionContext) -> i64 {
    match op {
        Operand::IntReg(r) | Operand::FpReg(r) | Operand::VecReg(r) => *r as i64,
        Operand::Csr(v) => *v as i64,
        Operand::Imm(v) => *v,
        Operand::RoundMode(v) => *v as i64,
        Operand::VtypeField(_, v) => *v as i64,
        Operand::Label(name) => symbol_offset(name, ctx),
        Operand::Mem { offset, .. } => *offset,
    }
}

fn symbol_offset(name: &str, ctx: &ExpansionContext) -> i64 {
    match ctx.labels.get(name) {
        Some(addr) => *addr as i64 - ctx.current_addr as i64,
        None => 0,
    }
}

fn mem_form(tok: &str) -> Option<(&str, &str)> {
    if !tok.ends_with(')') {
        return None;
    }
    let open = tok.find('(')?;
    if open == 0 || !tok[..open].contains('[') {
        return None;
    }
    Some((&tok[..open], &tok[open + 1..tok.len() - 1]))
}

fn bracket_only(tok: &str) -> Option<&str> {
    if tok.contains('[') && tok.ends_with(']') {
        Some(tok)
    } else {
        None
    }
}

fn arithmetic(tok: &str) -> Option<(&str, char, &str)> {
    let parts: Vec<&str> = tok.split_whitespace().collect();
    if parts.len() == 3 && (parts[1] == "+" || parts[1] == "-") {
        Some((parts[0], parts[1].chars().next().unwrap(), parts[2]))
    } else {
        None
    }
}

fn literal_register(tok: &str) -> Option<u8> {
    tok.strip_prefix('x').and_then(|n| n.parse::<u8>().ok())
}

fn resolve_operand_expr(tok: &str, name_map: &HashMap<&str, &Operand>, ctx: &ExpansionContext) -> Result<i64, String> {
    if let Some(op) = name_map.get(tok) {
        return Ok(resolve_named(op, ctx));
    }
    if let Some(n) = literal_register(tok) {
        return Ok(n as i64);
    }
    parse_int_literal(tok).ok_or_else(|| format!("cannot resolve pseudo template operand '{tok}'"))
}

/// Resolves `name[hi:lo]` / `name@GOT[hi:lo]` against the symbol offset the
/// bracketed name refers to. The `[31:12]` slice applies the `+0x800`
/// rounding trick; other ranges are a plain bit slice of the same offset,
/// which reconstructs exactly when paired with a rounded high part.
fn resolve_bracket(expr: &str, name_map: &HashMap<&str, &Operand>, ctx: &ExpansionContext) -> Result<i64, String> {
    let bracket_start = expr.find('[').ok_or_else(|| format!("malformed slice expression '{expr}'"))?;
    let name_part = expr[..bracket_start].split('@').next().unwrap_or(&expr[..bracket_start]);
    let inner = &expr[bracket_start + 1..expr.len() - 1];
    let (hi_s, lo_s) = inner
        .split_once(':')
        .ok_or_else(|| format!("malformed bit range in '{expr}'"))?;
    let hi: u32 = hi_s.trim().parse().map_err(|_| format!("bad hi in '{expr}'"))?;
    let lo: u32 = lo_s.trim().parse().map_err(|_| format!("bad lo in '{expr}'"))?;

    let offset = resolve_operand_expr(name_part, name_map, ctx)?;

    if hi == 31 && lo == 12 {
        let upper20 = offset.wrapping_add(0x800) >> 12;
        Ok(upper20 << 12)
    } else {
        let width = hi - lo + 1;
        let mask: i64 = if width >= 64 { -1 } else { (1i64 << width) - 1 };
        Ok((offset >> lo) & mask)
    }
}

/// Resolves one comma-separated operand expression of a base-instruction
/// template and assigns it to the next one or two unfilled operand names of
/// `record.operands`, by semantic kind (register vs. immediate) so that a
/// memory-form token's two sub-values land on the right field regardless of
/// which order the catalog lists them in.
fn expand_template(
    template: &str,
    record: &InstructionRecord,
    name_map: &HashMap<&str, &Operand>,
    ctx: &ExpansionContext,
) -> Result<HashMap<String, i64>, String> {
    let rest = template.split_once(char::is_whitespace).map(|(_, r)| r.trim()).unwrap_or("");
    let tokens: Vec<&str> = if rest.is_empty() { Vec::new() } else { rest.split(',').map(str::trim).collect() };

    let mut values = HashMap::new();
    let mut op_names = record.operands.iter();

    for tok in tokens {
        if let Some((bracket, reg)) = mem_form(tok) {
            let imm_val = resolve_bracket(bracket, name_map, ctx)?;
            let reg_val = resolve_operand_expr(reg, name_map, ctx)?;
            for _ in 0..2 {
                if let Some(name) = op_names.next() {
                    let v = if is_register_name(name) { reg_val } else { imm_val };
                    values.insert(name.clone(), v);
                }
            }
        } else if let Some(bracket) = bracket_only(tok) {
            let v = resolve_bracket(bracket, name_map, ctx)?;
            if let Some(name) = op_names.next() {
                values.insert(name.clone(), v);
            }
        } else if let Some((a, op, b)) = arithmetic(tok) {
            let av = resolve_operand_expr(a, name_map, ctx)?;
            let bv = resolve_operand_expr(b, name_map, ctx)?;
            let v = if op == '+' { av + bv } else { av - bv };
            if let Some(name) = op_names.next() {
                values.insert(name.clone(), v);
            }
        } else {
            let v = resolve_operand_expr(tok, name_map, ctx)?;
            if let Some(name) = op_names.next() {
                values.insert(name.clone(), v);
            }
        }
    }

    Ok(values)
}

fn expand_catalog_driven(
    catalogs: &Catalogs,
    xlen: u8,
    mnemonic: &str,
    operands: &[Operand],
    ctx: &ExpansionContext,
) -> Result<Vec<ExpandedWord>, String> {
    let candidate = select_candidate(catalogs, mnemonic, operands)
        .ok_or_else(|| format!("no pseudo-instruction candidate matches '{mnemonic}' with {} operand(s)", operands.len()))?;

    let operand_names = pseudo_operand_names(&candidate.pseudo_format);
    let mut name_map: HashMap<&str, &Operand> = HashMap::new();
    for (name, op) in operand_names.iter().zip(operands.iter()) {
        name_map.insert(name.as_str(), op);
    }

    let mut words = Vec::with_capacity(candidate.base_instructions.len());

    // Every template in this expansion resolves `symbol[hi:lo]` against the
    // *same* base address: the pseudo-instruction's own starting address,
    // not each template's own advancing position. An `auipc`+`addi`/`lw` pair
    // splits one shared offset into upper/lower halves; if the second
    // template's offset were taken relative to its own (already-advanced)
    // address, the two halves would no longer sum to the original target.
    for template in &candidate.base_instructions {
        let template_mnemonic = template.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
        let record = catalogs
            .lookup(&template_mnemonic, xlen)
            .ok_or_else(|| format!("catalog missing base instruction '{template_mnemonic}' for pseudo '{mnemonic}'"))?;
        let values = expand_template(template, &record, &name_map, ctx)?;
        let word = crate::encoder::encode(&record, &values);
        words.push(ExpandedWord { word, is_compressed: record.is_compressed() });
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalogs;

    #[test]
    fn li_small_immediate_is_one_addi() {
        let catalogs = Catalogs::load_default();
        let operands = vec![Operand::IntReg(10), Operand::Imm(42)];
        let words = expand_li(&catalogs, 32, &operands).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, 0x02A00513);
    }

    #[test]
    fn li_large_immediate_is_lui_addi() {
        let catalogs = Catalogs::load_default();
        let operands = vec![Operand::IntReg(10), Operand::Imm(0x12345)];
        let words = expand_li(&catalogs, 32, &operands).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, 0x00012537);
        assert_eq!(words[1].word, 0x34550513);
    }

    #[test]
    fn fence_defaults_to_all_four() {
        let word = expand_fence(&[]).word;
        assert_eq!(word, (0b1111 << 24) | (0b1111 << 20) | 0x0F);
    }

    #[test]
    fn fence_single_argument_sets_pred_and_succ() {
        let word = expand_fence(&[Operand::Label("rw".to_string())]).word;
        assert_eq!(word, (0b0011 << 24) | (0b0011 << 20) | 0x0F);
    }
}
