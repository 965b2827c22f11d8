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

//! A two-pass RISC-V assembler and single-instruction decoder for a
//! configurable ISA variant (RV32I/RV64I plus M, A, F, D, Q, C, V, B,
//! Zicsr, Zifencei, Zfh).
//!
//! The entry points are [`assembler::assemble`] and [`decoder::decode`],
//! both pure functions of their inputs and an immutable [`catalog::Catalogs`]
//! value built once via [`catalog::Catalogs::load`] or
//! [`catalog::Catalogs::load_default`].

pub mod assembler;
pub mod ast;
pub mod bitfield;
pub mod catalog;
pub mod decoder;
pub mod directives;
pub mod emitter;
pub mod encoder;
pub mod errors;
pub mod lexer;
pub mod operand_parser;
pub mod pseudo;
pub mod symbols;

pub use assembler::{assemble, AssemblerConfig, AssemblyResult};
pub use catalog::Catalogs;
pub use decoder::{decode, DecodedInstruction};
