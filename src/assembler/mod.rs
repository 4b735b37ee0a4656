// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-pass assembler driver.
//!
//! One [`Assembler`] context is built per [`assemble`] call. Pass one sizes
//! every statement and establishes symbols, macros and segments; pass two
//! evaluates strictly and writes bytes through the linker. Statement
//! handling lives in the `asmline_*` modules, grouped by concern.

mod asmline_conditionals;
mod asmline_directives;
mod asmline_directives_data;
mod asmline_directives_layout;
mod asmline_directives_log;
mod asmline_directives_loops;
mod asmline_directives_scope;
mod asmline_directives_text;
mod asmline_eval;
mod asmline_macros;
pub mod cli;
pub mod collaborators;
mod engine;
pub mod output;
mod passes;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::core::assembler::conditional::{ConditionalContext, ConditionalStack};
use crate::core::assembler::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, PassCounts, Severity,
};
use crate::core::cpu::{CpuHandler, OperandEvaluator, ResolveRequest, ResolveResult};
use crate::core::expr::{EvalContext, EvalError, EvalPolicy, Evaluated};
use crate::core::linker::{Linker, SegmentSpec};
use crate::core::macro_processor::MacroTable;
use crate::core::registry::CpuRegistry;
use crate::core::stream::{FrameEnd, FrameId, StreamEvent, StreamManager};
use crate::core::symbol_table::{SymbolTable, SymbolTableResult};
use crate::core::text_utils::normalize_name;
use crate::core::tokenizer::{OperatorKind, Span, Token, TokenKind, DEFAULT_LOCAL_LABEL_CHAR};
use crate::core::value::Value;

pub use collaborators::{
    BlockProcessor, FsSourceProvider, JsonBlockProcessor, LogFacade, LogLevel, Logger, MemoryLogger,
    MemorySourceProvider, RawBlockProcessor, SourceProvider,
};

use cli::Cli;
use engine::{Assembler, Continuation};

/// Name of the segment created when none is configured.
pub const DEFAULT_SEGMENT: &str = "DEFAULT";

/// Library-level configuration for one assembly run.
#[derive(Clone)]
pub struct AssemblerOptions {
    /// CPU selected before the first statement; the registry default if unset.
    pub cpu: Option<String>,
    /// Segments declared before the source runs. The first one is active.
    pub segments: Vec<SegmentSpec>,
    /// Symbols defined before each pass.
    pub defines: Vec<(String, Value)>,
    pub local_label_char: char,
    /// Interprets raw `.DEFINE` blocks.
    pub block_processor: Rc<dyn BlockProcessor>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            cpu: None,
            segments: Vec::new(),
            defines: Vec::new(),
            local_label_char: DEFAULT_LOCAL_LABEL_CHAR,
            block_processor: Rc::new(RawBlockProcessor),
        }
    }
}

impl std::fmt::Debug for AssemblerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblerOptions")
            .field("cpu", &self.cpu)
            .field("segments", &self.segments)
            .field("defines", &self.defines)
            .field("local_label_char", &self.local_label_char)
            .finish_non_exhaustive()
    }
}

/// Assemble `main_name` and everything it includes into one linked image.
pub fn assemble(
    main_name: &str,
    options: &AssemblerOptions,
    sources: &dyn SourceProvider,
    logger: &mut dyn Logger,
) -> Result<AsmRunReport, AsmRunError> {
    let text = sources.read_source_file(main_name).map_err(|err| {
        AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Io,
                "Cannot read source file",
                Some(&format!("{main_name}: {err}")),
            ),
            Vec::new(),
            Vec::new(),
        )
    })?;
    let assembler = Assembler::new(main_name, &text, options, sources, logger)?;
    assembler.run()
}

/// Parse the command line, assemble and write the requested outputs.
pub fn run() -> Result<AsmRunReport, AsmRunError> {
    use clap::Parser;
    let cli = Cli::parse();
    run_with_cli(&cli)
}

pub fn run_with_cli(cli: &Cli) -> Result<AsmRunReport, AsmRunError> {
    let config = cli::validate_cli(cli)?;
    let options = config.assembler_options();
    let root = config
        .input_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let provider = FsSourceProvider::new(root);
    let mut logger = LogFacade;
    let report = assemble(&config.input_name, &options, &provider, &mut logger)?;
    if config.warning_policy.treat_warnings_as_errors && report.warning_count() > 0 {
        return Err(AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Cli,
                "Warnings treated as errors",
                Some(&report.warning_count().to_string()),
            ),
            report.diagnostics().to_vec(),
            report.source_lines().to_vec(),
        ));
    }
    output::write_outputs(&config, &report)?;
    Ok(report)
}
