// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for polyasm.

use std::io::{self, Write};

use clap::Parser;
use log::LevelFilter;
use serde_json::json;
use simple_logger::SimpleLogger;

use polyasm::assembler::cli::{validate_cli, Cli, CliConfig, OutputFormat};
use polyasm::core::assembler::error::{Diagnostic, Severity};

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn diagnostic_json(diag: &Diagnostic) -> serde_json::Value {
    json!({
        "code": diag.code(),
        "severity": severity_to_str(diag.severity()),
        "message": diag.message(),
        "file": diag.file(),
        "line": diag.line(),
        "col_start": diag.column(),
        "col_end": diag.col_end(),
        "notes": diag.notes(),
        "help": diag.help(),
        "fixits": diag.fixits().iter().map(|fixit| {
            json!({
                "file": fixit.file.clone(),
                "line": fixit.line,
                "col_start": fixit.col_start,
                "col_end": fixit.col_end,
                "replacement": fixit.replacement.clone(),
            })
        }).collect::<Vec<_>>(),
    })
}

fn format_diagnostic(
    diag: &Diagnostic,
    source_lines: &[String],
    use_color: bool,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => diagnostic_json(diag).to_string(),
        OutputFormat::Text => diag.format_with_context(Some(source_lines), use_color),
    }
}

fn emit_diagnostics(config: &CliConfig, diagnostics: &[Diagnostic], source_lines: &[String]) {
    let use_color = std::env::var("NO_COLOR").is_err();
    let mut err = io::stderr().lock();
    for diag in diagnostics {
        if diag.severity() == Severity::Warning && !config.warning_policy.emit_warnings {
            continue;
        }
        let line = format_diagnostic(diag, source_lines, use_color, config.output_format);
        let _ = writeln!(err, "{line}");
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = SimpleLogger::new()
        .with_level(log_level(cli.verbose))
        .env()
        .init()
    {
        eprintln!("Failed to start logger: {err}");
    }

    let cli_config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match polyasm::assembler::run_with_cli(&cli) {
        Ok(report) => {
            if !cli_config.quiet {
                emit_diagnostics(&cli_config, report.diagnostics(), report.source_lines());
            }
            log::info!(
                "{} byte(s) at ${:04X}, {} warning(s)",
                report.bytes().len(),
                report.origin(),
                report.warning_count()
            );
        }
        Err(err) => {
            emit_diagnostics(&cli_config, err.diagnostics(), err.source_lines());
            if !err
                .diagnostics()
                .iter()
                .any(|diag| diag.severity() == Severity::Error)
            {
                eprintln!("{err}");
            }
            std::process::exit(1);
        }
    }
}
