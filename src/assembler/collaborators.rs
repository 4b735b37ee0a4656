// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Host collaborators: where source text comes from, where `.LOG` output
//! goes and how `.DEFINE` blocks are interpreted.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::value::Value;

/// Log target used for messages produced by source directives.
pub const SOURCE_LOG_TARGET: &str = "polyasm::source";

/// Sink for `.LOG`, `.WARN` and `.ERR` output.
pub trait Logger {
    fn log(&mut self, message: &str);
    fn warn(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

/// Forwards source messages to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl Logger for LogFacade {
    fn log(&mut self, message: &str) {
        log::info!(target: SOURCE_LOG_TARGET, "{message}");
    }

    fn warn(&mut self, message: &str) {
        log::warn!(target: SOURCE_LOG_TARGET, "{message}");
    }

    fn error(&mut self, message: &str) {
        log::error!(target: SOURCE_LOG_TARGET, "{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Records every message; used by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    pub entries: Vec<(LogLevel, String)>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, level: LogLevel) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(lvl, _)| *lvl == level)
            .map(|(_, msg)| msg.as_str())
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&mut self, message: &str) {
        self.entries.push((LogLevel::Info, message.to_string()));
    }

    fn warn(&mut self, message: &str) {
        self.entries.push((LogLevel::Warn, message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.entries.push((LogLevel::Error, message.to_string()));
    }
}

/// Resolves `.INCLUDE` and `.INCBIN` names and the main file.
pub trait SourceProvider {
    fn read_source_file(&self, name: &str) -> io::Result<String>;
    fn read_binary_file(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Reads files relative to a root directory. Absolute names are used as is.
#[derive(Debug, Clone)]
pub struct FsSourceProvider {
    root: PathBuf,
}

impl FsSourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl SourceProvider for FsSourceProvider {
    fn read_source_file(&self, name: &str) -> io::Result<String> {
        let path = self.resolve(name);
        log::trace!("reading source {}", path.display());
        fs::read_to_string(path)
    }

    fn read_binary_file(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(name);
        log::trace!("reading binary {}", path.display());
        fs::read(path)
    }
}

/// In-memory files keyed by name.
#[derive(Debug, Default, Clone)]
pub struct MemorySourceProvider {
    text: HashMap<String, String>,
    binary: HashMap<String, Vec<u8>>,
    reads: RefCell<Vec<String>>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, name: &str, text: &str) -> Self {
        self.text.insert(name.to_string(), text.to_string());
        self
    }

    pub fn with_binary(mut self, name: &str, bytes: &[u8]) -> Self {
        self.binary.insert(name.to_string(), bytes.to_vec());
        self
    }

    /// Names requested so far, in order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.borrow().clone()
    }

    fn not_found(name: &str) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("{name}: no such file"))
    }
}

impl SourceProvider for MemorySourceProvider {
    fn read_source_file(&self, name: &str) -> io::Result<String> {
        self.reads.borrow_mut().push(name.to_string());
        self.text
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name))
    }

    fn read_binary_file(&self, name: &str) -> io::Result<Vec<u8>> {
        self.reads.borrow_mut().push(name.to_string());
        self.binary
            .get(name)
            .cloned()
            .or_else(|| self.text.get(name).map(|text| text.as_bytes().to_vec()))
            .ok_or_else(|| Self::not_found(name))
    }
}

/// Turns the raw text of a `.DEFINE` block into a value.
pub trait BlockProcessor {
    fn process(&self, name: &str, text: &str) -> Result<Value, String>;
}

/// Binds the block text as a string.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBlockProcessor;

impl BlockProcessor for RawBlockProcessor {
    fn process(&self, _name: &str, text: &str) -> Result<Value, String> {
        Ok(Value::from_bytes(text.as_bytes()))
    }
}

/// Parses the block as JSON. Objects become arrays of `[key, value]` pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBlockProcessor;

impl BlockProcessor for JsonBlockProcessor {
    fn process(&self, name: &str, text: &str) -> Result<Value, String> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| format!("Invalid JSON in block '{name}': {err}"))?;
        Ok(Value::from_json(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_logger_keeps_levels_apart() {
        let mut logger = MemoryLogger::new();
        logger.log("one");
        logger.warn("two");
        logger.error("three");
        logger.log("four");
        assert_eq!(logger.messages(LogLevel::Info), vec!["one", "four"]);
        assert_eq!(logger.messages(LogLevel::Warn), vec!["two"]);
        assert_eq!(logger.messages(LogLevel::Error), vec!["three"]);
    }

    #[test]
    fn memory_provider_serves_text_and_binary() {
        let provider = MemorySourceProvider::new()
            .with_source("main.asm", "nop")
            .with_binary("font.bin", &[1, 2, 3]);
        assert_eq!(provider.read_source_file("main.asm").unwrap(), "nop");
        assert_eq!(provider.read_binary_file("font.bin").unwrap(), vec![1, 2, 3]);
        assert_eq!(provider.read_binary_file("main.asm").unwrap(), b"nop".to_vec());
        let err = provider.read_source_file("missing.asm").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(provider.reads().len(), 4);
    }

    #[test]
    fn json_blocks_become_values() {
        let value = JsonBlockProcessor
            .process("cfg", r#"{"a": [1, 2], "b": "x"}"#)
            .unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Array(vec![
                    Value::Str("a".to_string()),
                    Value::Array(vec![Value::Number(1), Value::Number(2)]),
                ]),
                Value::Array(vec![Value::Str("b".to_string()), Value::Str("x".to_string())]),
            ])
        );
        assert!(JsonBlockProcessor
            .process("cfg", "{oops")
            .unwrap_err()
            .starts_with("Invalid JSON in block 'cfg'"));
        assert_eq!(
            RawBlockProcessor.process("t", "hi").unwrap(),
            Value::Str("hi".to_string())
        );
    }
}
