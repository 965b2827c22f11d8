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

//! The lexer/line splitter. Turns source text into structured, section-tagged
//! lines, leaving operand tokens as raw strings; their classification into
//! the tagged `Operand` variant happens in `operand_parser`.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::ast::{Directive, Section};

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct LineParser;

/// A line after structural lexing but before operand classification.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub line_number: usize,
    pub label: Option<String>,
    pub directive: Option<Directive>,
    /// Base mnemonic with any rounding/atomic-ordering suffix already split
    /// off, uppercased.
    pub mnemonic: Option<String>,
    pub operand_tokens: Vec<String>,
    pub section: Section,
    pub rm_suffix: Option<u8>,
    pub aq_suffix: Option<u8>,
    pub rl_suffix: Option<u8>,
}

/// Splits `.RNE`/`.RTZ`/`.RDN`/`.RUP`/`.RMM`/`.DYN`/`.AQ`/`.RL`/`.AQRL` off the
/// end of a mnemonic. Any other trailing dot-segment (e.g. FP width `.S`/`.D`,
/// AMO width `.W`) is part of the mnemonic itself and is left alone.
fn split_suffixes(raw: &str) -> (String, Option<u8>, Option<u8>, Option<u8>) {
    let upper = raw.to_ascii_uppercase();
    let known: &[(&str, Option<u8>, Option<u8>, Option<u8>)] = &[
        (".AQRL", None, Some(1), Some(1)),
        (".AQ", None, Some(1), None),
        (".RL", None, None, Some(1)),
        (".RNE", Some(0), None, None),
        (".RTZ", Some(1), None, None),
        (".RDN", Some(2), None, None),
        (".RUP", Some(3), None, None),
        (".RMM", Some(4), None, None),
        (".DYN", Some(7), None, None),
    ];
    for (suffix, rm, aq, rl) in known {
        if upper.ends_with(suffix) {
            let base_len = raw.len() - suffix.len();
            return (upper[..base_len].to_string(), *rm, *aq, *rl);
        }
    }
    (upper, None, None, None)
}

/// Parses the full source text into structured lines. Comments (`#` to EOL)
/// and blank lines are stripped by the grammar; because every retained line
/// carries its true source line number (from pest's span), no placeholder
/// entries are needed to keep later line numbers accurate.
pub fn lex(source: &str) -> Result<Vec<RawLine>, pest::error::Error<Rule>> {
    let pairs = LineParser::parse(Rule::program, source)?;
    let mut lines = Vec::new();
    let mut section = Section::Text;

    for program_pair in pairs {
        for line_pair in program_pair.into_inner() {
            if line_pair.as_rule() != Rule::line {
                continue;
            }
            let line_number = line_pair.as_span().start_pos().line_col().0;
            let mut label = None;
            let mut directive = None;
            let mut mnemonic = None;
            let mut operand_tokens = Vec::new();
            let mut rm_suffix = None;
            let mut aq_suffix = None;
            let mut rl_suffix = None;

            for inner in line_pair.into_inner() {
                match inner.as_rule() {
                    Rule::label_def => {
                        label = Some(label_text(inner));
                    }
                    Rule::body => {
                        for body_inner in inner.into_inner() {
                            match body_inner.as_rule() {
                                Rule::directive_line => {
                                    directive = Some(build_directive(body_inner));
                                }
                                Rule::instruction_line => {
                                    let (m, ops) = build_instruction(body_inner);
                                    let (base, rm, aq, rl) = split_suffixes(&m);
                                    mnemonic = Some(base);
                                    rm_suffix = rm;
                                    aq_suffix = aq;
                                    rl_suffix = rl;
                                    operand_tokens = ops;
                                }
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }

            if let Some(d) = &directive {
                match d.name.as_str() {
                    ".text" => section = Section::Text,
                    ".data" => section = Section::Data,
                    _ => {}
                }
            }

            if label.is_none() && directive.is_none() && mnemonic.is_none() {
                continue;
            }

            lines.push(RawLine {
                line_number,
                label,
                directive,
                mnemonic,
                operand_tokens,
                section,
                rm_suffix,
                aq_suffix,
                rl_suffix,
            });
        }
    }

    Ok(lines)
}

fn label_text(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

fn build_directive(pair: Pair<Rule>) -> Directive {
    let mut name = String::new();
    let mut args = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::directive_name => name = inner.as_str().trim_start_matches('.').to_ascii_lowercase(),
            Rule::directive_args => {
                for arg in inner.into_inner() {
                    if arg.as_rule() == Rule::arg_token {
                        args.push(arg.as_str().trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }
    Directive {
        name: format!(".{name}"),
        args,
    }
}

fn build_instruction(pair: Pair<Rule>) -> (String, Vec<String>) {
    let mut mnemonic = String::new();
    let mut tokens = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::mnemonic => mnemonic = inner.as_str().to_string(),
            Rule::operand_list => {
                for op in inner.into_inner() {
                    if op.as_rule() == Rule::operand_token {
                        tokens.push(op.as_str().trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }
    (mnemonic, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_simple_instruction() {
        let lines = lex("addi x5, x6, 10\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].mnemonic.as_deref(), Some("ADDI"));
        assert_eq!(lines[0].operand_tokens, vec!["x5", "x6", "10"]);
    }

    #[test]
    fn lexes_label_and_comment() {
        let lines = lex("done: # a comment\n    addi x4, x0, 2\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].label.as_deref(), Some("done"));
        assert_eq!(lines[1].mnemonic.as_deref(), Some("ADDI"));
        assert_eq!(lines[1].line_number, 2);
    }

    #[test]
    fn splits_rounding_suffix() {
        let lines = lex("fadd.s.rne f1, f2, f3\n").unwrap();
        assert_eq!(lines[0].mnemonic.as_deref(), Some("FADD.S"));
        assert_eq!(lines[0].rm_suffix, Some(0));
    }

    #[test]
    fn splits_atomic_suffix() {
        let lines = lex("amoadd.w.aqrl x1, x2, (x3)\n").unwrap();
        assert_eq!(lines[0].mnemonic.as_deref(), Some("AMOADD.W"));
        assert_eq!(lines[0].aq_suffix, Some(1));
        assert_eq!(lines[0].rl_suffix, Some(1));
    }

    #[test]
    fn tracks_section_directive() {
        let lines = lex(".data\nmsg: .asciz \"Hi\"\n.text\nmain: nop\n").unwrap();
        let data_line = lines.iter().find(|l| l.label.as_deref() == Some("msg")).unwrap();
        assert_eq!(data_line.section, Section::Data);
        let text_line = lines.iter().find(|l| l.label.as_deref() == Some("main")).unwrap();
        assert_eq!(text_line.section, Section::Text);
    }
}
