// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::rc::Rc;

use super::{
    assemble, AssemblerOptions, JsonBlockProcessor, LogLevel, MemoryLogger, MemorySourceProvider,
};
use crate::core::assembler::error::{AsmErrorKind, AsmRunError, AsmRunReport, Severity};
use crate::core::linker::SegmentSpec;
use crate::core::value::Value;

const MAIN: &str = "main.asm";

fn run_with(
    source: &str,
    options: &AssemblerOptions,
    provider: MemorySourceProvider,
    logger: &mut MemoryLogger,
) -> Result<AsmRunReport, AsmRunError> {
    let provider = provider.with_source(MAIN, source);
    assemble(MAIN, options, &provider, logger)
}

fn assemble_ok(source: &str) -> AsmRunReport {
    assemble_ok_with(source, &AssemblerOptions::default())
}

fn assemble_ok_with(source: &str, options: &AssemblerOptions) -> AsmRunReport {
    let mut logger = MemoryLogger::new();
    match run_with(source, options, MemorySourceProvider::new(), &mut logger) {
        Ok(report) => report,
        Err(err) => panic!("assembly failed: {err} {:?}", err.diagnostics()),
    }
}

fn assemble_err(source: &str) -> AsmRunError {
    let mut logger = MemoryLogger::new();
    match run_with(source, &AssemblerOptions::default(), MemorySourceProvider::new(), &mut logger) {
        Ok(report) => panic!("expected failure, got {:02X?}", report.bytes()),
        Err(err) => err,
    }
}

fn bytes(source: &str) -> Vec<u8> {
    assemble_ok(source).bytes().to_vec()
}

fn warnings(report: &AsmRunReport) -> Vec<&str> {
    report
        .diagnostics()
        .iter()
        .filter(|diag| diag.severity() == Severity::Warning)
        .map(|diag| diag.message())
        .collect()
}

// ----- expressions and data -----

#[test]
fn operators_follow_c_precedence() {
    assert_eq!(
        bytes(".DB 10 + 2 * 6, (10 + 2) * 6, 12 & 10 ^ 6 | 3, 5 + 2 << 1"),
        vec![22, 72, 15, 14]
    );
}

#[test]
fn forward_references_resolve_in_pass_two() {
    let report = assemble_ok(
        "    .ORG $1000\n    .DW target\n    .DB 1\ntarget: .DB 2\n",
    );
    assert_eq!(report.origin(), 0x1000);
    assert_eq!(report.bytes(), &[0x03, 0x10, 0x01, 0x02]);
    assert_eq!(report.symbol("TARGET"), Some(&Value::Number(0x1003)));
}

#[test]
fn data_widths_are_little_endian() {
    assert_eq!(
        bytes(".DB 1, \"AB\"\n.DW $1234\n.DL $01020304\n"),
        vec![1, b'A', b'B', 0x34, 0x12, 0x04, 0x03, 0x02, 0x01]
    );
}

#[test]
fn byte_values_out_of_range_fail() {
    let err = assemble_err(".DB 256\n");
    assert!(err.to_string().contains("out of range"), "{err}");
}

#[test]
fn division_by_zero_is_an_error() {
    let err = assemble_err(".DB 4 / (2 - 2)\n");
    assert_eq!(err.to_string(), "Division by zero");
    assert_eq!(err.error().kind(), AsmErrorKind::Expression);
}

#[test]
fn undefined_symbols_suggest_a_close_name() {
    let err = assemble_err("counter = 1\n.DB countr\n");
    assert!(err.to_string().starts_with("Undefined symbol"), "{err}");
    assert_eq!(err.error().kind(), AsmErrorKind::Symbol);
    assert_eq!(err.error().suggestion(), Some("COUNTER"));
    assert_eq!(err.diagnostics().last().map(|d| d.line()), Some(2));
}

#[test]
fn builtin_functions_are_callable_with_and_without_dot() {
    assert_eq!(
        bytes(".DB .MIN(3, 1, 2), max(3, 9), len(\"abc\"), .IIF(0, 5, 6)\n.TEXT .STR(42)\n"),
        vec![1, 9, 3, 6, b'4', b'2']
    );
}

#[test]
fn percent_after_an_operand_is_modulo() {
    assert_eq!(bytes("x = 7\n.DB x %10, %101\n"), vec![7, 5]);
}

#[test]
fn hex_directive_reads_digit_groups() {
    assert_eq!(bytes(".HEX DE AD BEEF\n"), vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn text_forms_add_terminators_and_prefixes() {
    assert_eq!(
        bytes(".TEXT \"hi\"\n.CSTR \"hi\"\n.PSTR \"hi\"\n.PSTRL \"hi\"\n"),
        vec![b'h', b'i', b'h', b'i', 0, 2, b'h', b'i', 2, 0, b'h', b'i']
    );
}

#[test]
fn fill_and_align_pad_the_output() {
    let report = assemble_ok(".ORG $1001\n.DB 1\n.ALIGN 4, $FF\n.DB 2\n.FILL 2, $EE\n");
    assert_eq!(report.origin(), 0x1001);
    assert_eq!(report.bytes(), &[1, 0xFF, 0xFF, 2, 0xEE, 0xEE]);
}

#[test]
fn align_to_a_forward_boundary_pads_in_pass_two() {
    assert_eq!(
        bytes(".DB 1\n.ALIGN page\n.DB 2\npage = 4\n"),
        vec![1, 0, 0, 0, 2]
    );
}

#[test]
fn align_fill_value_must_fit_in_a_byte() {
    let err = assemble_err(".DB 1\n.ALIGN 4, $100\n");
    assert!(err.to_string().contains("does not fit in a byte"), "{err}");
}

#[test]
fn fill_counts_beyond_the_address_space_fail() {
    let err = assemble_err(".FILL $7FFFFFFFFFFF, 1\n");
    assert!(err.to_string().starts_with("Count out of range"), "{err}");
    let err = assemble_err(".ORG $FFFFFFFF\n.FILL 2\n");
    assert!(err.to_string().starts_with("Count out of range"), "{err}");
}

// ----- instructions and labels -----

#[test]
fn instruction_only_program_links_at_its_origin() {
    let report = assemble_ok("    .ORG $C000\n    NOP\n");
    assert_eq!(report.origin(), 0xC000);
    assert_eq!(report.bytes(), &[0xEA]);
    assert_eq!(bytes("    NOP\n    INX\n"), vec![0xEA, 0xE8]);
}

#[test]
fn encodes_6502_instructions() {
    let report = assemble_ok(
        "    .ORG $C000\nstart: LDA #$01\n    STA $0200\n    JMP start\n",
    );
    assert_eq!(
        report.bytes(),
        &[0xA9, 0x01, 0x8D, 0x00, 0x02, 0x4C, 0x00, 0xC0]
    );
}

#[test]
fn width_hint_forces_absolute_addressing() {
    assert_eq!(bytes("LDA $20\nLDA.W $20\n"), vec![0xA5, 0x20, 0xAD, 0x20, 0x00]);
}

#[test]
fn forward_operands_keep_their_pass_one_size() {
    let report = assemble_ok("    LDA zp\n    NOP\nzp = $10\n");
    assert_eq!(report.bytes(), &[0xAD, 0x10, 0x00, 0xEA]);
    assert!(warnings(&report).is_empty(), "{:?}", warnings(&report));
}

#[test]
fn local_and_anonymous_labels_resolve_branches() {
    let source = "main: LDX #3\n:loop DEX\n    BNE :loop\n:\n    DEY\n    BNE :-\n";
    assert_eq!(
        bytes(source),
        vec![0xA2, 0x03, 0xCA, 0xD0, 0xFD, 0x88, 0xD0, 0xFD]
    );
    let report = assemble_ok(source);
    assert_eq!(report.symbol("MAIN.LOOP"), Some(&Value::Number(2)));
}

#[test]
fn unknown_mnemonic_without_colon_is_a_label() {
    let report = assemble_ok("    NOP\nhere NOP\n    .DW here\n");
    assert_eq!(report.bytes(), &[0xEA, 0xEA, 0x01, 0x00]);
}

#[test]
fn duplicate_labels_are_rejected() {
    let err = assemble_err("a: NOP\na: NOP\n");
    assert_eq!(err.to_string(), "Symbol already defined: A");
}

#[test]
fn moved_label_between_passes_warns() {
    let report = assemble_ok("    .FILL n\nafter: .DB 1\nn = 2\n");
    assert_eq!(report.bytes(), &[0, 0, 1]);
    assert_eq!(
        warnings(&report),
        vec!["Label 'AFTER' moved from $0000 to $0002 between passes"]
    );
}

// ----- segments -----

#[test]
fn configured_segments_are_linked_with_gaps_filled() {
    let options = AssemblerOptions {
        segments: vec![SegmentSpec::new("CODE", 0, 2), SegmentSpec::new("DATA", 4, 2)],
        ..AssemblerOptions::default()
    };
    let report = assemble_ok_with(".DB $AA, $BB\n.SEGMENT DATA\n.DB $CC, $DD\n", &options);
    assert_eq!(report.bytes(), &[0xAA, 0xBB, 0, 0, 0xCC, 0xDD]);
    assert_eq!(report.placements().len(), 2);
    assert_eq!(report.placements()[1].offset, 4);
}

#[test]
fn later_segments_win_where_they_overlap() {
    let options = AssemblerOptions {
        segments: vec![SegmentSpec::new("CODE", 0, 4), SegmentSpec::new("DATA", 2, 2)],
        ..AssemblerOptions::default()
    };
    let report = assemble_ok_with(".DB $AA, $BB\n.SEGMENT DATA\n.DB $CC, $DD\n", &options);
    assert_eq!(report.bytes(), &[0xAA, 0xBB, 0xCC, 0xDD]);
}

#[test]
fn source_declared_segment_sets_the_origin() {
    let report = assemble_ok(
        ".SEGMENT vectors { start: $FFFA, size: 6 }\n.DW $1111, $2222, $3333\n",
    );
    assert_eq!(report.origin(), 0xFFFA);
    assert_eq!(report.bytes(), &[0x11, 0x11, 0x22, 0x22, 0x33, 0x33]);
}

#[test]
fn fixed_segment_overflow_is_an_error() {
    let err = assemble_err(".SEGMENT tiny { start: 0, size: 1 }\n.DB 1, 2\n");
    assert_eq!(err.error().kind(), AsmErrorKind::Segment);
}

// ----- conditionals -----

#[test]
fn conditional_chain_picks_the_first_true_branch() {
    let source = "mode = 2\n.IF mode == 1\n.DB 1\n.ELSEIF mode == 2\n.DB 2\n.ELSE\n.DB 3\n.END\n";
    assert_eq!(bytes(source), vec![2]);
}

#[test]
fn skipped_branches_do_not_define_or_emit() {
    let source = ".IF 0\nskipped: .DB 1\n.MACRO inner() {\n.IF 1\n.END\n}\n.END\n.DB .DEF(skipped)\n";
    assert_eq!(bytes(source), vec![0]);
}

#[test]
fn unterminated_if_is_reported() {
    let err = assemble_err(".IF 1\n.DB 1\n");
    assert!(err.to_string().starts_with("Unterminated .IF block"), "{err}");
    assert_eq!(err.error().kind(), AsmErrorKind::Conditional);
}

#[test]
fn stray_end_is_reported() {
    let err = assemble_err(".DB 1\n.END\n");
    assert_eq!(err.error().kind(), AsmErrorKind::Conditional);
}

// ----- loops, macros and scopes -----

#[test]
fn loops_bind_their_variable_per_iteration() {
    assert_eq!(
        bytes(".REPEAT 3 AS i {\n.DB i\n}\n.FOR x OF [1, 2, 3] {\n.DB x * 2\n}\n"),
        vec![0, 1, 2, 2, 4, 6]
    );
}

#[test]
fn loop_labels_stay_inside_each_iteration() {
    assert_eq!(bytes(".REPEAT 2 {\nhere: .DB 1\n}\n"), vec![1, 1]);
    let err = assemble_err(".REPEAT 2 AS i {\n.DB i\n}\n.DB i\n");
    assert!(err.to_string().starts_with("Undefined symbol"), "{err}");
}

#[test]
fn macros_substitute_arguments() {
    let source = ".MACRO store(value) {\n.DB value, value + 1\n}\nstore 5\nstore(10)\n";
    assert_eq!(bytes(source), vec![5, 6, 10, 11]);
}

#[test]
fn macro_rest_parameter_collects_extra_arguments() {
    let source = ".MACRO bytes(first, ...rest) {\n.DB first, rest[1], .LEN(rest)\n}\nbytes 1, 2, 3, 4\n";
    assert_eq!(bytes(source), vec![1, 3, 3]);
}

#[test]
fn macro_labels_are_private_to_each_call() {
    let source = ".MACRO mark(n) {\nspot: .DB n\n}\nmark 1\nmark 2\n";
    assert_eq!(bytes(source), vec![1, 2]);
    let err = assemble_err(&format!("{source}.DW spot\n"));
    assert!(err.to_string().starts_with("Undefined symbol"), "{err}");
}

#[test]
fn runaway_macro_recursion_stops() {
    let err = assemble_err(".MACRO boom() {\nboom\n}\nboom\n");
    assert_eq!(err.error().kind(), AsmErrorKind::Macro);
    assert!(err.to_string().contains("depth limit"), "{err}");
}

#[test]
fn macro_redefinition_is_rejected() {
    let err = assemble_err(".MACRO m() {\n.DB 1\n}\n.MACRO m() {\n.DB 2\n}\n");
    assert_eq!(err.error().kind(), AsmErrorKind::Macro);
}

#[test]
fn namespaces_qualify_their_symbols() {
    let report = assemble_ok(".NAMESPACE io {\nport = $D000\n}\n.DW io::port\n");
    assert_eq!(report.bytes(), &[0x00, 0xD0]);
    assert_eq!(report.symbol("io::port"), Some(&Value::Number(0xD000)));
}

// ----- defines, options and CPU selection -----

#[test]
fn define_binds_tokens_evaluated_on_use() {
    assert_eq!(bytes("width = 4\n.DEFINE area width * 2\n.DB area + 1\n"), vec![9]);
}

#[test]
fn define_block_goes_through_the_block_processor() {
    let options = AssemblerOptions {
        block_processor: Rc::new(JsonBlockProcessor),
        ..AssemblerOptions::default()
    };
    let report = assemble_ok_with(".DEFINE table\n[1, 2, 3]\n.END\n.DB table[1], len(table)\n", &options);
    assert_eq!(report.bytes(), &[2, 3]);
}

#[test]
fn predefined_symbols_are_visible_from_the_start() {
    let options = AssemblerOptions {
        defines: vec![("FLAG".to_string(), Value::Number(7))],
        ..AssemblerOptions::default()
    };
    let report = assemble_ok_with(".IF .DEF(flag)\n.DB flag\n.END\n", &options);
    assert_eq!(report.bytes(), &[7]);
}

#[test]
fn option_switches_the_local_label_character() {
    let report = assemble_ok(
        ".OPTION local_label_style \"@\"\nmain: .DB 0\n@skip .DB 1\n.DW @skip\n",
    );
    assert_eq!(report.bytes(), &[0, 1, 1, 0]);
}

#[test]
fn cpu_directive_selects_by_alias() {
    assert_eq!(bytes(".CPU \"mos6502\"\nNOP\n"), vec![0xEA]);
    let err = assemble_err(".CPU \"z80\"\n");
    assert!(err.to_string().contains("unknown CPU"), "{err}");
    assert!(err
        .error()
        .help()
        .is_some_and(|help| help.starts_with("known CPUs:") && help.contains("6502")));
}

// ----- files and logging -----

#[test]
fn include_and_incbin_read_through_the_provider() {
    let provider = MemorySourceProvider::new()
        .with_source("defs.inc", "VALUE = 7\n.DB VALUE\n")
        .with_binary("blob.bin", &[1, 2, 3, 4, 5]);
    let mut logger = MemoryLogger::new();
    let report = run_with(
        ".INCLUDE \"defs.inc\"\n.INCBIN \"blob.bin\", 1, 3\n.DB VALUE + 1\n",
        &AssemblerOptions::default(),
        provider,
        &mut logger,
    )
    .expect("assemble");
    assert_eq!(report.bytes(), &[7, 2, 3, 4, 8]);
}

#[test]
fn missing_include_fails_in_pass_two() {
    let err = assemble_err(".INCLUDE \"nowhere.inc\"\n");
    assert_eq!(err.error().kind(), AsmErrorKind::Io);
    assert!(err.to_string().starts_with("Cannot read include file"), "{err}");
}

#[test]
fn log_directives_reach_the_logger_once() {
    let mut logger = MemoryLogger::new();
    let report = run_with(
        "x = 3\n.LOG \"sum\", x + 1\n.WARN \"careful\"\n.LIST OFF\n.LOG \"hidden\"\n",
        &AssemblerOptions::default(),
        MemorySourceProvider::new(),
        &mut logger,
    )
    .expect("assemble");
    assert_eq!(logger.messages(LogLevel::Info), vec!["sum, 4"]);
    assert_eq!(logger.messages(LogLevel::Warn), vec!["careful"]);
    assert_eq!(report.warning_count(), 1);
}

#[test]
fn err_directive_stops_the_run() {
    let mut logger = MemoryLogger::new();
    let err = run_with(
        ".ERR \"stop here\"\n",
        &AssemblerOptions::default(),
        MemorySourceProvider::new(),
        &mut logger,
    )
    .unwrap_err();
    assert_eq!(err.error().kind(), AsmErrorKind::User);
    assert_eq!(err.to_string(), "stop here");
    assert_eq!(logger.messages(LogLevel::Error), vec!["stop here"]);
}

// ----- whole runs -----

#[test]
fn repeated_runs_are_identical() {
    let source = "    .ORG $0800\nstart: LDX #0\n:loop INX\n    BNE :loop\n    JMP start\nmsg: .CSTR \"ok\"\n";
    let first = assemble_ok(source);
    let second = assemble_ok(source);
    assert_eq!(first.bytes(), second.bytes());
    assert_eq!(first.symbols(), second.symbols());
}

#[test]
fn instruction_program_without_layout_directives_is_stable() {
    let source = "start: LDX count\n:loop INX\n    BNE :loop\n    JMP start\ndone:\ncount = $40\n";
    let first = assemble_ok(source);
    let second = assemble_ok(source);
    assert_eq!(first.bytes(), second.bytes());
    assert_eq!(first.symbols(), second.symbols());
    assert_eq!(
        first.bytes(),
        &[0xAE, 0x40, 0x00, 0xE8, 0xD0, 0xFD, 0x4C, 0x00, 0x00]
    );
    // pass-one sizes hold, so the last label sits at the end of the image
    assert_eq!(first.symbol("DONE"), Some(&Value::Number(9)));
    assert!(warnings(&first).is_empty(), "{:?}", warnings(&first));
}

#[test]
fn report_counts_lines_and_exports_sorted_symbols() {
    let report = assemble_ok("b = 2\na = 1\n.DB a, b\n");
    assert_eq!(report.counts().lines, 3);
    assert_eq!(report.error_count(), 0);
    let names: Vec<&str> = report.symbols().iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
}
