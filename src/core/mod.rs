// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-independent assembler core: lexing, expressions, symbols, token
//! streams, macros, the CPU handler contract and the segment linker.

pub mod assembler;
pub mod cpu;
pub mod expr;
pub mod expr_functions;
pub mod expr_rpn;
pub mod imagestore;
pub mod linker;
pub mod macro_processor;
pub mod registry;
pub mod report;
pub mod stream;
pub mod symbol_table;
pub mod text_utils;
pub mod tokenizer;
pub mod value;
