// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

/// What to do when a stream frame runs out.
pub(crate) enum Continuation {
    /// The main source file.
    Source,
    Include { name: String },
    Macro { name: String },
    Loop(LoopState),
    /// Braced `.NAMESPACE` body.
    Namespace,
}

/// Remaining iterations of a `.FOR` or `.REPEAT` loop.
pub(crate) struct LoopState {
    pub(crate) cache_key: String,
    pub(crate) variable: Option<String>,
    pub(crate) items: Vec<Value>,
    pub(crate) next: usize,
}

pub(crate) struct Assembler<'a> {
    pub(crate) options: &'a AssemblerOptions,
    pub(crate) sources: &'a dyn SourceProvider,
    pub(crate) logger: &'a mut dyn Logger,
    pub(crate) main_name: String,
    pub(crate) main_text: Rc<str>,
    /// Lines of every file read so far, for diagnostics.
    pub(crate) file_lines: HashMap<String, Rc<Vec<String>>>,
    pub(crate) registry: CpuRegistry,
    pub(crate) cpu: Box<dyn CpuHandler>,
    pub(crate) stream: StreamManager,
    pub(crate) symbols: SymbolTable,
    pub(crate) macros: MacroTable,
    pub(crate) conditionals: ConditionalStack,
    pub(crate) linker: Linker,
    pub(crate) pass: u8,
    pub(crate) pc: u32,
    /// `None` until a segment is selected when no segments are configured.
    pub(crate) active_segment: Option<String>,
    pub(crate) segment_pcs: HashMap<String, u32>,
    /// Lowest address emitted outside any segment in pass one.
    pub(crate) default_origin: Option<u32>,
    pub(crate) continuations: HashMap<FrameId, Continuation>,
    pub(crate) next_scope_key: usize,
    pub(crate) next_block_key: usize,
    pub(crate) macro_depth: usize,
    pub(crate) last_global: Option<String>,
    pub(crate) anon_labels: Vec<i64>,
    pub(crate) anon_seen: usize,
    /// Instruction sizes chosen in pass one, by ordinal.
    pub(crate) instruction_lengths: Vec<u32>,
    pub(crate) instruction_index: usize,
    pub(crate) listing: bool,
    pub(crate) current_file: String,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) counts: PassCounts,
    pub(crate) last_eval_error: RefCell<Option<EvalError>>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(
        main_name: &str,
        text: &str,
        options: &'a AssemblerOptions,
        sources: &'a dyn SourceProvider,
        logger: &'a mut dyn Logger,
    ) -> Result<Self, AsmRunError> {
        let registry = crate::registry_defaults::build_default_registry();
        let main_lines: Vec<String> = text.lines().map(str::to_string).collect();
        let cpu = Self::initial_cpu(&registry, options).map_err(|err| {
            AsmRunError::new(err, Vec::new(), main_lines.clone())
        })?;
        let mut file_lines = HashMap::new();
        file_lines.insert(main_name.to_string(), Rc::new(main_lines));
        Ok(Self {
            options,
            sources,
            logger,
            main_name: main_name.to_string(),
            main_text: Rc::from(text),
            file_lines,
            registry,
            cpu,
            stream: StreamManager::new(),
            symbols: SymbolTable::new(),
            macros: MacroTable::new(),
            conditionals: ConditionalStack::new(),
            linker: Linker::new(),
            pass: 1,
            pc: 0,
            active_segment: None,
            segment_pcs: HashMap::new(),
            default_origin: None,
            continuations: HashMap::new(),
            next_scope_key: 0,
            next_block_key: 0,
            macro_depth: 0,
            last_global: None,
            anon_labels: Vec::new(),
            anon_seen: 0,
            instruction_lengths: Vec::new(),
            instruction_index: 0,
            listing: true,
            current_file: main_name.to_string(),
            diagnostics: Vec::new(),
            counts: PassCounts::new(),
            last_eval_error: RefCell::new(None),
        })
    }

    pub(crate) fn initial_cpu(
        registry: &CpuRegistry,
        options: &AssemblerOptions,
    ) -> Result<Box<dyn CpuHandler>, AsmError> {
        match &options.cpu {
            Some(name) => registry.handler_by_name(name).map_err(|err| {
                AsmError::new(AsmErrorKind::Cli, &err.to_string(), None).with_help(format!(
                    "known CPUs: {}",
                    registry.cpu_name_list().join(", ")
                ))
            }),
            None => registry
                .default_cpu()
                .ok_or_else(|| AsmError::new(AsmErrorKind::Cli, "No CPU registered", None))
                .and_then(|cpu| {
                    registry
                        .handler(cpu)
                        .map_err(|err| AsmError::new(AsmErrorKind::Cli, &err.to_string(), None))
                }),
        }
    }

    /// Run both passes and link the result.
    pub(crate) fn run(mut self) -> Result<AsmRunReport, AsmRunError> {
        for pass in 1..=2 {
            if let Err(err) = self.run_pass(pass) {
                return Err(self.into_error(err));
            }
        }
        let image = match self.linker.link() {
            Ok(image) => image,
            Err(err) => return Err(self.into_error(err.into())),
        };
        log::debug!(
            "linked {} byte(s) at ${:04X} from {} segment(s)",
            image.bytes.len(),
            image.origin,
            image.placements.len()
        );
        let lines = self.main_lines();
        Ok(AsmRunReport::new(
            image,
            self.symbols.exported(),
            self.diagnostics,
            lines,
            self.counts,
        ))
    }

    fn main_lines(&self) -> Vec<String> {
        self.file_lines
            .get(&self.main_name)
            .map(|lines| lines.as_ref().clone())
            .unwrap_or_default()
    }

    fn into_error(mut self, err: AsmError) -> AsmRunError {
        let diag = self.diagnostic(Severity::Error, err.clone());
        self.diagnostics.push(diag);
        self.counts.errors += 1;
        let lines = self.main_lines();
        AsmRunError::new(err, self.diagnostics, lines)
    }

    /// Diagnostic located in the file currently being read. Lines of other
    /// files travel with the diagnostic since the report only keeps the main
    /// file's lines.
    pub(crate) fn diagnostic(&self, severity: Severity, err: AsmError) -> Diagnostic {
        let line = err.span().map(|span| span.line);
        let file = self.current_file.clone();
        let source = match line {
            Some(line) if file != self.main_name => self
                .file_lines
                .get(&file)
                .and_then(|lines| lines.get(line.saturating_sub(1) as usize).cloned()),
            _ => None,
        };
        Diagnostic::from_error(severity, err, Some(file)).with_source(source)
    }

    pub(crate) fn warning(&mut self, err: AsmError) {
        let diag = self.diagnostic(Severity::Warning, err);
        self.diagnostics.push(diag);
        self.counts.warnings += 1;
    }

    pub(crate) fn is_final_pass(&self) -> bool {
        self.pass > 1
    }

    pub(crate) fn allocate_scope_key(&mut self) -> usize {
        let key = self.next_scope_key;
        self.next_scope_key += 1;
        key
    }

    pub(crate) fn allocate_block_key(&mut self, kind: &str) -> String {
        let key = format!("{kind}#{}", self.next_block_key);
        self.next_block_key += 1;
        key
    }

    pub(crate) fn remember_file(&mut self, name: &str, text: &str) {
        self.file_lines
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(text.lines().map(str::to_string).collect()));
    }

    // ----- program counter and output -----

    pub(crate) fn set_pc(&mut self, value: i64, span: Span) -> Result<(), AsmError> {
        self.pc = u32::try_from(value).map_err(|_| {
            AsmError::new(
                AsmErrorKind::Directive,
                "Address out of range",
                Some(&value.to_string()),
            )
            .with_span(span)
        })?;
        Ok(())
    }

    pub(crate) fn advance_pc(&mut self, length: u32, span: Span) -> Result<(), AsmError> {
        self.pc = self.pc.checked_add(length).ok_or_else(|| {
            AsmError::new(AsmErrorKind::Segment, "Program counter overflow", None).with_span(span)
        })?;
        Ok(())
    }

    /// Emit bytes at the PC. Pass one only sizes; pass two writes through the
    /// linker.
    pub(crate) fn emit(&mut self, bytes: &[u8], span: Span) -> Result<(), AsmError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let length = u32::try_from(bytes.len()).map_err(|_| {
            AsmError::new(AsmErrorKind::Segment, "Output too large", None).with_span(span)
        })?;
        if self.is_final_pass() {
            self.linker
                .write_bytes(self.pc, bytes)
                .map_err(|err| AsmError::from(err).with_span(span))?;
            return self.advance_pc(length, span);
        }
        self.reserve(length, span)
    }

    /// Pass-one stand-in for `emit`: account for `length` output bytes
    /// without building them.
    pub(crate) fn reserve(&mut self, length: u32, span: Span) -> Result<(), AsmError> {
        if length > 0 && self.active_segment.is_none() {
            let origin = self.default_origin.map_or(self.pc, |low| low.min(self.pc));
            self.default_origin = Some(origin);
        }
        self.advance_pc(length, span)
    }

    /// Check that `count` bytes fit in the address space after the PC.
    pub(crate) fn output_length(&self, count: i64, span: Span) -> Result<u32, AsmError> {
        u32::try_from(count)
            .ok()
            .filter(|length| self.pc.checked_add(*length).is_some())
            .ok_or_else(|| {
                AsmError::new(AsmErrorKind::Directive, "Count out of range", Some(&count.to_string()))
                    .with_span(span)
            })
    }

    /// Switch to segment `name`, saving the PC of the segment being left.
    pub(crate) fn select_segment(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        let key = normalize_name(name);
        let leaving = self
            .active_segment
            .clone()
            .unwrap_or_else(|| DEFAULT_SEGMENT.to_string());
        if key == leaving {
            return Ok(());
        }
        let implicit_default =
            key == DEFAULT_SEGMENT && !self.linker.has_segment(&key) && self.options.segments.is_empty();
        if !implicit_default {
            self.linker
                .use_segment(&key)
                .map_err(|err| AsmError::from(err).with_span(span))?;
        }
        self.segment_pcs.insert(leaving, self.pc);
        self.pc = match self.segment_pcs.get(&key) {
            Some(pc) => *pc,
            None => self.linker.segment(&key).map_or(0, |seg| seg.start()),
        };
        self.active_segment = (!implicit_default).then_some(key);
        Ok(())
    }

    // ----- labels -----

    /// Define a label at the PC. Names without a `.` become the base for
    /// local labels that follow.
    pub(crate) fn define_label(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        self.define_address(name, span)?;
        if !name.contains('.') {
            self.last_global = Some(normalize_name(name));
        }
        Ok(())
    }

    pub(crate) fn define_address(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        let pc = i64::from(self.pc);
        if self.is_final_pass() {
            self.check_phase(name, pc, span);
        }
        match self.symbols.define(name, Value::Number(pc)) {
            SymbolTableResult::Ok => Ok(()),
            SymbolTableResult::Duplicate => Err(AsmError::new(
                AsmErrorKind::Symbol,
                "Symbol already defined",
                Some(&normalize_name(name)),
            )
            .with_span(span)),
            _ => Err(AsmError::new(
                AsmErrorKind::Symbol,
                "Cannot define symbol",
                Some(&normalize_name(name)),
            )
            .with_span(span)),
        }
    }

    /// Warn when a label settles at a different address than pass one saw.
    fn check_phase(&mut self, name: &str, pc: i64, span: Span) {
        let current = self.symbols.current_scope();
        let previous = self
            .symbols
            .entry(name)
            .filter(|sym| sym.scope == current && sym.pass < self.pass)
            .and_then(|sym| sym.value.as_number());
        if let Some(old) = previous.filter(|old| *old != pc) {
            self.warning(
                AsmError::new(
                    AsmErrorKind::Symbol,
                    &format!(
                        "Label '{}' moved from ${old:04X} to ${pc:04X} between passes",
                        normalize_name(name)
                    ),
                    None,
                )
                .with_span(span)
                .with_help("an operand size changed after pass one; add a .W or .B hint"),
            );
        }
    }

    pub(crate) fn define_anonymous_label(&mut self) {
        let pc = i64::from(self.pc);
        let final_pass = self.is_final_pass();
        match self.anon_labels.get_mut(self.anon_seen) {
            Some(slot) if final_pass => *slot = pc,
            _ => {
                self.anon_labels.truncate(self.anon_seen);
                self.anon_labels.push(pc);
            }
        }
        self.anon_seen += 1;
    }

    pub(crate) fn expand_local_name(&self, local: &str) -> String {
        match &self.last_global {
            Some(global) => format!("{global}.{}", normalize_name(local)),
            None => normalize_name(local),
        }
    }
}
