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

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use risc_v_asm::{assembler, Catalogs};

#[derive(ClapParser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file to a raw binary image or a JSON result dump.
    Assemble {
        #[clap(short, long)]
        input: PathBuf,
        #[clap(short, long)]
        output: PathBuf,
        #[clap(long, default_value_t = 32)]
        xlen: u8,
        #[clap(long, default_value_t = 0)]
        text_base: u64,
        #[clap(long, default_value_t = 0x2000)]
        data_base: u64,
        #[clap(long)]
        allow_numeric_csr: bool,
        /// Write the full `AssemblyResult` (bytes, maps, errors) as JSON
        /// instead of a raw binary image.
        #[clap(long)]
        json: bool,
        /// Path to a custom instruction catalog JSON; defaults to the
        /// crate's embedded catalog.
        #[clap(long)]
        instructions: Option<PathBuf>,
        #[clap(long)]
        pseudo: Option<PathBuf>,
    },
    /// Decode a single hex instruction word.
    Decode {
        word: String,
        #[clap(long, default_value_t = 32)]
        xlen: u8,
        #[clap(long)]
        instructions: Option<PathBuf>,
        #[clap(long)]
        pseudo: Option<PathBuf>,
    },
}

fn load_catalogs(instructions: &Option<PathBuf>, pseudo: &Option<PathBuf>) -> Result<Catalogs> {
    match (instructions, pseudo) {
        (Some(i), Some(p)) => {
            let instructions_json = fs::read_to_string(i)
                .with_context(|| format!("Failed to read instruction catalog: {}", i.display()))?;
            let pseudo_json = fs::read_to_string(p)
                .with_context(|| format!("Failed to read pseudo catalog: {}", p.display()))?;
            Ok(Catalogs::load(&instructions_json, &pseudo_json)?)
        }
        _ => Ok(Catalogs::load_default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    match opts.command {
        Commands::Assemble {
            input,
            output,
            xlen,
            text_base,
            data_base,
            allow_numeric_csr,
            json,
            instructions,
            pseudo,
        } => {
            let catalogs = load_catalogs(&instructions, &pseudo)?;
            let source = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read input file: {}", input.display()))?;

            let config = assembler::AssemblerConfig {
                text_base,
                data_base,
                xlen,
                allow_numeric_csr,
            };
            let result = assembler::assemble(&source, &catalogs, &config);

            if json {
                let dump = serde_json::to_string_pretty(&result)?;
                fs::write(&output, dump)?;
            } else {
                let mut image = result.text_bytes.clone();
                image.extend(result.data_bytes.clone());
                fs::write(&output, image)?;
            }

            for error in &result.errors {
                eprintln!("{error}");
            }
            println!(
                "Assembled {} to {} ({} text bytes, {} data bytes, {} error(s))",
                input.display(),
                output.display(),
                result.text_bytes.len(),
                result.data_bytes.len(),
                result.errors.len()
            );
            Ok(())
        }
        Commands::Decode { word, xlen, instructions, pseudo } => {
            let catalogs = load_catalogs(&instructions, &pseudo)?;
            let trimmed = word.trim_start_matches("0x").trim_start_matches("0X");
            let parsed = u32::from_str_radix(trimmed, 16)
                .with_context(|| format!("'{word}' is not a valid hex instruction word"))?;

            let decoded = risc_v_asm::decode(&catalogs, parsed, xlen)?;
            println!("mnemonic: {}", decoded.mnemonic);
            println!("asm: {}", decoded.asm);
            for (name, value) in &decoded.operand_values {
                println!("  {name} = {value}");
            }
            Ok(())
        }
    }
}
