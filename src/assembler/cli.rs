// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{ArgAction, Parser, ValueEnum};
use serde_json::Value as JsonValue;

use super::collaborators::{BlockProcessor, JsonBlockProcessor, RawBlockProcessor};
use super::AssemblerOptions;
use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::linker::SegmentSpec;
use crate::core::tokenizer::DEFAULT_LOCAL_LABEL_CHAR;
use crate::core::value::Value;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Retargetable two-pass assembler.

Writes a raw binary image by default (INPUT with a .bin extension).
Use -o/--outfile to name the binary, -x/--hex for Intel HEX output and
-m/--map for a JSON map of segment placements and exported symbols.
Segments are given as NAME:START:SIZE[:PAD[:grow]]; numbers may be decimal,
$hex or 0xhex. Without segments the image grows from the lowest address
written.";

#[derive(Parser, Debug)]
#[command(
    name = "polyasm",
    version = VERSION,
    about = "Retargetable two-pass assembler with macros, scoped symbols and a segment linker",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "INPUT", long_help = "Main source file.")]
    pub input: PathBuf,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Diagnostic output format. text is default; json prints one object per diagnostic."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostics for successful runs. Errors are still reported."
    )]
    pub quiet: bool,
    #[arg(
        short = 'w',
        long = "no-warn",
        action = ArgAction::SetTrue,
        conflicts_with = "warn_error",
        long_help = "Suppress warning diagnostics."
    )]
    pub no_warn: bool,
    #[arg(
        long = "Werror",
        action = ArgAction::SetTrue,
        long_help = "Treat warnings as errors (non-zero exit status)."
    )]
    pub warn_error: bool,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        long_help = "Raise the log level: -v for info, -vv for debug, -vvv for trace."
    )]
    pub verbose: u8,
    #[arg(
        long = "cpu",
        value_name = "ID",
        long_help = "Select the initial CPU. In-source .CPU directives can still override it."
    )]
    pub cpu: Option<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Binary output file. A .bin extension is added when FILE has none."
    )]
    pub outfile: Option<String>,
    #[arg(
        short = 'x',
        long = "hex",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit an Intel HEX file. FILE is optional; when omitted, the input base is used with a .hex extension."
    )]
    pub hex_name: Option<String>,
    #[arg(
        short = 'm',
        long = "map",
        value_name = "FILE",
        long_help = "Write segment placements and exported symbols as JSON."
    )]
    pub map_file: Option<PathBuf>,
    #[arg(
        long = "segment",
        value_name = "NAME:START:SIZE[:PAD[:grow]]",
        action = ArgAction::Append,
        long_help = "Declare a segment (repeatable). The first segment is active at the start of the source."
    )]
    pub segments: Vec<String>,
    #[arg(
        long = "config",
        value_name = "FILE",
        long_help = "JSON file with \"cpu\", \"segments\" and \"defines\" keys. Command-line values take precedence."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VAL]",
        action = ArgAction::Append,
        long_help = "Predefine a symbol (repeatable). If VAL is omitted, defaults to 1. VAL may be a number or a quoted string."
    )]
    pub defines: Vec<String>,
    #[arg(
        long = "local-label-char",
        value_name = "C",
        long_help = "Character that introduces local labels. Allowed: ':' and '@'."
    )]
    pub local_label_char: Option<char>,
    #[arg(
        long = "define-processor",
        value_enum,
        default_value_t = BlockFormat::Raw,
        long_help = "How .DEFINE blocks are read: raw keeps the text, json parses it into a value."
    )]
    pub define_processor: BlockFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BlockFormat {
    #[default]
    Raw,
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WarningPolicy {
    pub emit_warnings: bool,
    pub treat_warnings_as_errors: bool,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub input_path: PathBuf,
    /// Input file name relative to its directory; source reads are rooted
    /// there.
    pub input_name: String,
    pub cpu: Option<String>,
    pub segments: Vec<SegmentSpec>,
    pub defines: Vec<(String, Value)>,
    pub local_label_char: char,
    pub block_format: BlockFormat,
    pub bin_path: Option<PathBuf>,
    pub hex_path: Option<PathBuf>,
    pub map_path: Option<PathBuf>,
    pub quiet: bool,
    pub verbose: u8,
    pub output_format: OutputFormat,
    pub warning_policy: WarningPolicy,
}

impl CliConfig {
    pub fn assembler_options(&self) -> AssemblerOptions {
        let block_processor: Rc<dyn BlockProcessor> = match self.block_format {
            BlockFormat::Raw => Rc::new(RawBlockProcessor),
            BlockFormat::Json => Rc::new(JsonBlockProcessor),
        };
        AssemblerOptions {
            cpu: self.cpu.clone(),
            segments: self.segments.clone(),
            defines: self.defines.clone(),
            local_label_char: self.local_label_char,
            block_processor,
        }
    }
}

fn cli_error(message: impl Into<String>) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(AsmErrorKind::Cli, &message.into(), None),
        Vec::new(),
        Vec::new(),
    )
}

/// Decimal, `$hex` or `0xhex`.
pub fn parse_cli_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('$') {
        return u32::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    text.parse().ok()
}

/// Parse `NAME:START:SIZE[:PAD[:grow]]`. A size of 0 makes the segment
/// resizable.
pub fn parse_segment_arg(arg: &str) -> Result<SegmentSpec, String> {
    const FORMAT: &str = "expected NAME:START:SIZE[:PAD[:grow]]";
    let parts: Vec<&str> = arg.split(':').collect();
    if !(3..=5).contains(&parts.len()) || parts[0].is_empty() {
        return Err(format!("Invalid --segment '{arg}': {FORMAT}"));
    }
    let number = |text: &str, what: &str| {
        parse_cli_number(text).ok_or_else(|| format!("Invalid {what} '{text}' in --segment '{arg}'"))
    };
    let start = number(parts[1], "start")?;
    let size = number(parts[2], "size")?;
    let pad = match parts.get(3) {
        Some(text) => u8::try_from(number(text, "pad")?)
            .map_err(|_| format!("Pad '{text}' in --segment '{arg}' does not fit in a byte"))?,
        None => 0,
    };
    let grow = match parts.get(4) {
        Some(flag) if flag.eq_ignore_ascii_case("grow") => true,
        Some(flag) => return Err(format!("Invalid flag '{flag}' in --segment '{arg}': {FORMAT}")),
        None => size == 0,
    };
    Ok(SegmentSpec::new(parts[0].to_ascii_uppercase(), start, size)
        .with_pad(pad)
        .resizable(grow))
}

/// Parse `NAME[=VAL]`; VAL defaults to 1.
pub fn parse_define_arg(arg: &str) -> Result<(String, Value), String> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (arg.trim(), None),
    };
    let valid_name = name
        .bytes()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == b'_')
        && name.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'_');
    if !valid_name {
        return Err(format!("Invalid symbol name in -D '{arg}'"));
    }
    let value = match value {
        None => Value::Number(1),
        Some(text) => match text
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            Some(quoted) => Value::from_bytes(quoted.as_bytes()),
            None => {
                let negative = text.starts_with('-');
                let digits = text.trim_start_matches('-');
                let number = parse_cli_number(digits)
                    .ok_or_else(|| format!("Invalid value in -D '{arg}'"))?;
                let number = i64::from(number);
                Value::Number(if negative { -number } else { number })
            }
        },
    };
    Ok((name.to_string(), value))
}

/// Settings read from a `--config` file.
#[derive(Debug, Default)]
pub struct FileConfig {
    pub cpu: Option<String>,
    pub segments: Vec<SegmentSpec>,
    pub defines: Vec<(String, Value)>,
}

fn json_u32(json: &JsonValue, key: &str, context: &str) -> Result<Option<u32>, String> {
    match json.get(key) {
        None => Ok(None),
        Some(JsonValue::String(text)) => parse_cli_number(text)
            .map(Some)
            .ok_or_else(|| format!("{context}: invalid {key} '{text}'")),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("{context}: {key} must be an unsigned number")),
    }
}

/// Parse the JSON configuration document.
pub fn parse_config_json(text: &str) -> Result<FileConfig, String> {
    let root: JsonValue =
        serde_json::from_str(text).map_err(|err| format!("Invalid config JSON: {err}"))?;
    let Some(object) = root.as_object() else {
        return Err("Config must be a JSON object".to_string());
    };
    let mut config = FileConfig::default();
    for key in object.keys() {
        if !matches!(key.as_str(), "cpu" | "segments" | "defines") {
            return Err(format!("Unknown config key '{key}'"));
        }
    }
    if let Some(cpu) = object.get("cpu") {
        let cpu = cpu
            .as_str()
            .ok_or_else(|| "Config 'cpu' must be a string".to_string())?;
        config.cpu = Some(cpu.to_string());
    }
    if let Some(segments) = object.get("segments") {
        let segments = segments
            .as_array()
            .ok_or_else(|| "Config 'segments' must be an array".to_string())?;
        for (index, segment) in segments.iter().enumerate() {
            let context = format!("segments[{index}]");
            let name = segment
                .get("name")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| format!("{context}: missing name"))?;
            let start = json_u32(segment, "start", &context)?
                .ok_or_else(|| format!("{context}: missing start"))?;
            let size = json_u32(segment, "size", &context)?.unwrap_or(0);
            let pad = json_u32(segment, "pad", &context)?.unwrap_or(0);
            let pad = u8::try_from(pad).map_err(|_| format!("{context}: pad must fit in a byte"))?;
            let resizable = match segment.get("resizable") {
                None => size == 0,
                Some(flag) => flag
                    .as_bool()
                    .ok_or_else(|| format!("{context}: resizable must be true or false"))?,
            };
            config.segments.push(
                SegmentSpec::new(name.to_ascii_uppercase(), start, size)
                    .with_pad(pad)
                    .resizable(resizable),
            );
        }
    }
    if let Some(defines) = object.get("defines") {
        let defines = defines
            .as_object()
            .ok_or_else(|| "Config 'defines' must be an object".to_string())?;
        for (name, value) in defines {
            config.defines.push((name.clone(), Value::from_json(value)));
        }
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<FileConfig, AsmRunError> {
    let text = fs::read_to_string(path)
        .map_err(|err| cli_error(format!("Cannot read config {}: {err}", path.display())))?;
    parse_config_json(&text).map_err(|msg| cli_error(format!("{}: {msg}", path.display())))
}

/// Output path from an optional name: empty means `base` with `extension`,
/// a name without extension gets one.
pub fn resolve_output_path(base: &Path, name: &str, extension: &str) -> PathBuf {
    if name.is_empty() {
        return base.with_extension(extension);
    }
    let path = PathBuf::from(name);
    if path.extension().is_none() {
        return path.with_extension(extension);
    }
    path
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let input_name = cli
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| cli_error("Invalid input file name"))?;

    let file_config = match &cli.config {
        Some(path) => read_config(path)?,
        None => FileConfig::default(),
    };

    let mut segments = Vec::new();
    for arg in &cli.segments {
        segments.push(parse_segment_arg(arg).map_err(cli_error)?);
    }
    if segments.is_empty() {
        segments = file_config.segments;
    }
    for (index, spec) in segments.iter().enumerate() {
        if segments[..index].iter().any(|other| other.name == spec.name) {
            return Err(cli_error(format!("Segment {} declared more than once", spec.name)));
        }
    }

    let mut defines = file_config.defines;
    for arg in &cli.defines {
        let (name, value) = parse_define_arg(arg).map_err(cli_error)?;
        defines.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        defines.push((name, value));
    }

    let local_label_char = cli.local_label_char.unwrap_or(DEFAULT_LOCAL_LABEL_CHAR);
    if !matches!(local_label_char, ':' | '@') {
        return Err(cli_error(format!(
            "Invalid --local-label-char '{local_label_char}'; use ':' or '@'"
        )));
    }

    let base = cli.input.with_extension("");
    let hex_path = cli
        .hex_name
        .as_deref()
        .map(|name| resolve_output_path(&base, name, "hex"));
    let map_path = cli.map_file.clone();
    let bin_path = match &cli.outfile {
        Some(name) => Some(resolve_output_path(&base, name, "bin")),
        None if hex_path.is_none() && map_path.is_none() => Some(base.with_extension("bin")),
        None => None,
    };

    Ok(CliConfig {
        input_path: cli.input.clone(),
        input_name,
        cpu: cli.cpu.clone().or(file_config.cpu),
        segments,
        defines,
        local_label_char,
        block_format: cli.define_processor,
        bin_path,
        hex_path,
        map_path,
        quiet: cli.quiet,
        verbose: cli.verbose,
        output_format: cli.format,
        warning_policy: WarningPolicy {
            emit_warnings: !cli.no_warn,
            treat_warnings_as_errors: cli.warn_error,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn validate_cli_defaults_to_binary_next_to_input() {
        let cli = Cli::parse_from(["polyasm", "src/prog.asm"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.input_name, "prog.asm");
        assert_eq!(config.bin_path, Some(PathBuf::from("src/prog.bin")));
        assert_eq!(config.hex_path, None);
        assert_eq!(config.local_label_char, DEFAULT_LOCAL_LABEL_CHAR);
        assert!(config.warning_policy.emit_warnings);
    }

    #[test]
    fn validate_cli_hex_only_skips_binary() {
        let cli = Cli::parse_from(["polyasm", "prog.asm", "-x"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.hex_path, Some(PathBuf::from("prog.hex")));
        assert_eq!(config.bin_path, None);

        let cli = Cli::parse_from(["polyasm", "prog.asm", "-x", "out/rom", "-o", "rom.img"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.hex_path, Some(PathBuf::from("out/rom.hex")));
        assert_eq!(config.bin_path, Some(PathBuf::from("rom.img")));
    }

    #[test]
    fn validate_cli_sets_warning_policy_and_format() {
        let cli = Cli::parse_from(["polyasm", "prog.asm", "--Werror", "--format", "json", "-vv"]);
        let config = validate_cli(&cli).expect("validate cli");
        assert!(config.warning_policy.treat_warnings_as_errors);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.verbose, 2);
    }

    #[test]
    fn no_warn_conflicts_with_werror() {
        assert!(Cli::try_parse_from(["polyasm", "prog.asm", "-w", "--Werror"]).is_err());
    }

    #[test]
    fn segment_args_parse_numbers_and_flags() {
        let spec = parse_segment_arg("code:$8000:0x1000:$FF").expect("segment");
        assert_eq!(spec.name, "CODE");
        assert_eq!((spec.start, spec.size, spec.pad), (0x8000, 0x1000, 0xFF));
        assert!(!spec.resizable);

        let spec = parse_segment_arg("zp:0:256:0:grow").expect("segment");
        assert!(spec.resizable);
        assert!(parse_segment_arg("zp:0:256:0:shrink").is_err());
        assert!(parse_segment_arg("zp:$10000x").is_err());
        assert!(parse_segment_arg("zp:0:256:300").is_err());
    }

    #[test]
    fn define_args_default_to_one() {
        assert_eq!(parse_define_arg("DEBUG").unwrap(), ("DEBUG".to_string(), Value::Number(1)));
        assert_eq!(parse_define_arg("BASE=$C000").unwrap().1, Value::Number(0xC000));
        assert_eq!(parse_define_arg("OFS=-4").unwrap().1, Value::Number(-4));
        assert_eq!(
            parse_define_arg("NAME=\"hi\"").unwrap().1,
            Value::Str("hi".to_string())
        );
        assert!(parse_define_arg("1X=2").is_err());
        assert!(parse_define_arg("X=oops").is_err());
    }

    #[test]
    fn config_json_reads_cpu_segments_and_defines() {
        let config = parse_config_json(
            r#"{
                "cpu": "6502",
                "segments": [
                    {"name": "code", "start": "$C000", "size": 16384, "pad": 255},
                    {"name": "bss", "start": 512}
                ],
                "defines": {"SCREEN": 1024, "TITLE": "demo"}
            }"#,
        )
        .expect("config");
        assert_eq!(config.cpu.as_deref(), Some("6502"));
        assert_eq!(config.segments.len(), 2);
        assert_eq!(config.segments[0].start, 0xC000);
        assert_eq!(config.segments[0].pad, 0xFF);
        assert!(config.segments[1].resizable);
        assert!(config
            .defines
            .contains(&("SCREEN".to_string(), Value::Number(1024))));
    }

    #[test]
    fn config_json_rejects_unknown_keys() {
        let err = parse_config_json(r#"{"cpus": "6502"}"#).unwrap_err();
        assert_eq!(err, "Unknown config key 'cpus'");
        assert!(parse_config_json("[1, 2]").is_err());
    }

    #[test]
    fn cli_segments_override_config_segments() {
        let dir = std::env::temp_dir().join(format!("polyasm-cli-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("layout.json");
        fs::write(&path, r#"{"cpu": "6502", "segments": [{"name": "a", "start": 0}]}"#)
            .expect("write config");
        let path_arg = path.to_string_lossy().to_string();

        let cli = Cli::parse_from(["polyasm", "prog.asm", "--config", &path_arg]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.segments[0].name, "A");
        assert_eq!(config.cpu.as_deref(), Some("6502"));

        let cli = Cli::parse_from([
            "polyasm",
            "prog.asm",
            "--config",
            &path_arg,
            "--segment",
            "b:$100:16",
            "--cpu",
            "m6502",
        ]);
        let config = validate_cli(&cli).expect("validate cli");
        assert_eq!(config.segments.len(), 1);
        assert_eq!(config.segments[0].name, "B");
        assert_eq!(config.cpu.as_deref(), Some("m6502"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn validate_cli_rejects_bad_local_label_char() {
        let cli = Cli::parse_from(["polyasm", "prog.asm", "--local-label-char", "%"]);
        let err = validate_cli(&cli).unwrap_err();
        assert_eq!(err.to_string(), "Invalid --local-label-char '%'; use ':' or '@'");
    }
}
