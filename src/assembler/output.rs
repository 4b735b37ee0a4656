// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Output files: raw binary, Intel HEX and the JSON map.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::json;

use super::cli::CliConfig;
use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError, AsmRunReport};
use crate::core::imagestore::{write_bin_file, write_hex_file};

fn format_addr(addr: u32) -> String {
    if addr > 0xFFFF {
        format!("{addr:06X}")
    } else {
        format!("{addr:04X}")
    }
}

fn output_error(what: &str, path: &Path, err: std::io::Error, report: &AsmRunReport) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(
            AsmErrorKind::Io,
            &format!("Error writing {what}: {err}"),
            Some(path.to_string_lossy().as_ref()),
        ),
        Vec::new(),
        report.source_lines().to_vec(),
    )
}

/// Segment placements and exported symbols of a run.
pub fn map_json(report: &AsmRunReport) -> serde_json::Value {
    let segments: Vec<serde_json::Value> = report
        .placements()
        .iter()
        .map(|placement| {
            json!({
                "name": placement.name,
                "offset": placement.offset,
                "length": placement.length,
                "pad_length": placement.pad_length,
                "origin": format!("${}", format_addr(placement.origin)),
                "size": placement.size,
            })
        })
        .collect();
    let symbols: Vec<serde_json::Value> = report
        .symbols()
        .iter()
        .map(|(name, value)| {
            json!({
                "name": name,
                "type": value.type_name(),
                "value": value.to_json(),
            })
        })
        .collect();
    json!({
        "origin": format!("${}", format_addr(report.origin())),
        "length": report.bytes().len(),
        "segments": segments,
        "symbols": symbols,
    })
}

fn write_with<F>(what: &str, path: &Path, report: &AsmRunReport, write: F) -> Result<(), AsmRunError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path).map_err(|err| output_error(what, path, err, report))?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|()| out.flush())
        .map_err(|err| output_error(what, path, err, report))?;
    log::info!("wrote {what} {}", path.display());
    Ok(())
}

/// Write every output `config` asks for.
pub fn write_outputs(config: &CliConfig, report: &AsmRunReport) -> Result<(), AsmRunError> {
    if let Some(path) = &config.bin_path {
        write_with("binary file", path, report, |out| {
            write_bin_file(out, report.image())
        })?;
    }
    if let Some(path) = &config.hex_path {
        write_with("hex file", path, report, |out| {
            write_hex_file(out, report.image(), None)
        })?;
    }
    if let Some(path) = &config.map_path {
        let text = match serde_json::to_string_pretty(&map_json(report)) {
            Ok(text) => text,
            Err(err) => {
                return Err(AsmRunError::new(
                    AsmError::new(AsmErrorKind::Io, &format!("Error encoding map: {err}"), None),
                    Vec::new(),
                    report.source_lines().to_vec(),
                ))
            }
        };
        fs::write(path, text + "\n").map_err(|err| output_error("map file", path, err, report))?;
        log::info!("wrote map file {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembler::error::PassCounts;
    use crate::core::linker::{LinkedImage, Placement};
    use crate::core::value::Value;

    fn sample_report() -> AsmRunReport {
        let image = LinkedImage {
            origin: 0x10,
            bytes: vec![0xAA, 0xBB, 0, 0, 0xCC, 0xDD],
            placements: vec![Placement {
                name: "CODE".to_string(),
                offset: 0,
                length: 2,
                pad_length: 0,
                origin: 0x10,
                size: 2,
            }],
        };
        AsmRunReport::new(
            image,
            vec![("START".to_string(), Value::Number(0x10))],
            Vec::new(),
            Vec::new(),
            PassCounts::new(),
        )
    }

    #[test]
    fn map_lists_segments_and_symbols() {
        let map = map_json(&sample_report());
        assert_eq!(map["origin"], "$0010");
        assert_eq!(map["length"], 6);
        assert_eq!(map["segments"][0]["name"], "CODE");
        assert_eq!(map["segments"][0]["origin"], "$0010");
        assert_eq!(map["symbols"][0]["name"], "START");
        assert_eq!(map["symbols"][0]["type"], "number");
        assert_eq!(map["symbols"][0]["value"], 16);
    }

    #[test]
    fn addresses_widen_past_sixteen_bits() {
        assert_eq!(format_addr(0xFFFF), "FFFF");
        assert_eq!(format_addr(0x1_0000), "010000");
    }
}
