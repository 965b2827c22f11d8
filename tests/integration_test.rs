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

use risc_v_asm::{assemble, decode, AssemblerConfig, Catalogs};

fn word_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn test_addi_encodes_exact_word() {
    let catalogs = Catalogs::load_default();
    let result = assemble("addi x5, x6, 10\n", &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.text_bytes, vec![0x93, 0x02, 0xA3, 0x00]);
}

#[test]
fn test_branch_to_forward_label_resolves_correct_offset() {
    let catalogs = Catalogs::load_default();
    let source = "beq x1, x2, done\naddi x3, x0, 1\ndone:\naddi x4, x0, 2\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.labels.get("done"), Some(&8));
    assert_eq!(word_at(&result.text_bytes, 0), 0x00208463);
}

#[test]
fn test_li_small_immediate_expands_to_single_addi() {
    let catalogs = Catalogs::load_default();
    let result = assemble("li x10, 42\n", &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.text_bytes.len(), 4);
    assert_eq!(word_at(&result.text_bytes, 0), 0x02A00513);
}

#[test]
fn test_li_large_immediate_expands_to_lui_addi_pair() {
    let catalogs = Catalogs::load_default();
    let result = assemble("li x10, 0x12345\n", &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.text_bytes.len(), 8);
    assert_eq!(word_at(&result.text_bytes, 0), 0x00012537);
    assert_eq!(word_at(&result.text_bytes, 4), 0x34550513);
}

#[test]
fn test_data_and_text_with_la_resolves_symbol_address() {
    let catalogs = Catalogs::load_default();
    let source = ".data\nmsg:\n.asciz \"hi\"\n.text\nla a0, msg\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.data_labels.get("msg"), Some(&0x2000));
    assert_eq!(result.text_bytes.len(), 8);

    let auipc = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    let addi = decode(&catalogs, word_at(&result.text_bytes, 4), 32).unwrap();

    assert_eq!(auipc.mnemonic, "AUIPC");
    assert_eq!(addi.mnemonic, "ADDI");
    assert_eq!(auipc.operand_values.get("rd"), Some(&10));
    assert_eq!(addi.operand_values.get("rd"), Some(&10));
    assert_eq!(addi.operand_values.get("rs1"), Some(&10));

    let upper = auipc.operand_values.get("imm").copied().unwrap_or(0);
    let lower = addi.operand_values.get("imm").copied().unwrap_or(0);
    assert_eq!(upper + lower, 0x2000);
}

#[test]
fn test_lw_with_symbol_falls_back_to_pseudo_expansion() {
    let catalogs = Catalogs::load_default();
    let source = ".data\nval:\n.word 5\n.text\nlw a0, val\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.text_bytes.len(), 8);

    let auipc = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    let lw = decode(&catalogs, word_at(&result.text_bytes, 4), 32).unwrap();

    assert_eq!(auipc.mnemonic, "AUIPC");
    assert_eq!(lw.mnemonic, "LW");
    assert_eq!(lw.operand_values.get("rd"), Some(&10));
}

#[test]
fn test_lw_without_symbol_uses_native_encoding() {
    let catalogs = Catalogs::load_default();
    let result = assemble("lw a0, 4(sp)\n", &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.text_bytes.len(), 4);

    let decoded = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    assert_eq!(decoded.mnemonic, "LW");
    assert_eq!(decoded.operand_values.get("rd"), Some(&10));
    assert_eq!(decoded.operand_values.get("rs1"), Some(&2));
    assert_eq!(decoded.operand_values.get("imm"), Some(&4));
}

#[test]
fn test_decoder_masks_shamt_by_xlen() {
    let catalogs = Catalogs::load_default();
    let cfg64 = AssemblerConfig {
        xlen: 64,
        ..AssemblerConfig::default()
    };
    let result = assemble("srli x1, x1, 33\n", &catalogs, &cfg64);

    assert!(result.success, "errors: {:?}", result.errors);
    let decoded = decode(&catalogs, word_at(&result.text_bytes, 0), 64).unwrap();
    assert_eq!(decoded.mnemonic, "SRLI");
    assert_eq!(decoded.operand_values.get("shamt"), Some(&33));
}

#[test]
fn test_equ_constant_substitutes_into_immediate_operand() {
    let catalogs = Catalogs::load_default();
    let source = ".equ STRIDE, 4\naddi x5, x0, STRIDE\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.constants.get("STRIDE"), Some(&4));
    let decoded = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    assert_eq!(decoded.operand_values.get("imm"), Some(&4));
}

#[test]
fn test_unknown_mnemonic_is_collected_without_aborting_assembly() {
    let catalogs = Catalogs::load_default();
    let source = "frobnicate x1, x2\naddi x1, x0, 1\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Line 1:"));
    assert_eq!(result.text_bytes.len(), 4);
}

#[test]
fn test_fence_default_and_argument_forms_differ() {
    let catalogs = Catalogs::load_default();
    let default_result = assemble("fence\n", &catalogs, &AssemblerConfig::default());
    let narrow_result = assemble("fence r, w\n", &catalogs, &AssemblerConfig::default());

    assert!(default_result.success, "errors: {:?}", default_result.errors);
    assert!(narrow_result.success, "errors: {:?}", narrow_result.errors);
    assert_ne!(
        word_at(&default_result.text_bytes, 0),
        word_at(&narrow_result.text_bytes, 0)
    );
}

#[test]
fn test_csr_instruction_round_trips_through_decode() {
    let catalogs = Catalogs::load_default();
    let result = assemble("csrrw x5, mstatus, x6\n", &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    let decoded = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    assert_eq!(decoded.mnemonic, "CSRRW");
    assert_eq!(decoded.operand_values.get("rd"), Some(&5));
    assert_eq!(decoded.operand_values.get("rs1"), Some(&6));
}

#[test]
fn test_call_expands_to_auipc_jalr_pair_targeting_label() {
    let catalogs = Catalogs::load_default();
    let source = "call target\naddi x0, x0, 0\ntarget:\naddi x1, x0, 1\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.text_bytes.len(), 12);

    let auipc = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    let jalr = decode(&catalogs, word_at(&result.text_bytes, 4), 32).unwrap();
    assert_eq!(auipc.mnemonic, "AUIPC");
    assert_eq!(jalr.mnemonic, "JALR");
    assert_eq!(auipc.operand_values.get("rd"), Some(&1));
    assert_eq!(jalr.operand_values.get("rd"), Some(&1));
    assert_eq!(jalr.operand_values.get("rs1"), Some(&1));

    let upper = auipc.operand_values.get("imm").copied().unwrap_or(0);
    let lower = jalr.operand_values.get("imm").copied().unwrap_or(0);
    assert_eq!(upper + lower, 8);
}

#[test]
fn test_tail_expands_to_auipc_jalr_pair_using_x6_scratch() {
    let catalogs = Catalogs::load_default();
    let source = "tail target\naddi x0, x0, 0\ntarget:\naddi x1, x0, 1\n";
    let result = assemble(source, &catalogs, &AssemblerConfig::default());

    assert!(result.success, "errors: {:?}", result.errors);
    let auipc = decode(&catalogs, word_at(&result.text_bytes, 0), 32).unwrap();
    let jalr = decode(&catalogs, word_at(&result.text_bytes, 4), 32).unwrap();
    assert_eq!(auipc.mnemonic, "AUIPC");
    assert_eq!(jalr.mnemonic, "JALR");
    assert_eq!(auipc.operand_values.get("rd"), Some(&6));
    assert_eq!(jalr.operand_values.get("rd"), Some(&0));
    assert_eq!(jalr.operand_values.get("rs1"), Some(&6));
}
