// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Intel HEX and raw binary writers for linked images.

use std::io::{self, Write};

use crate::core::linker::LinkedImage;

const LINE_LIMIT: usize = 32;

/// Write `image` as Intel HEX. Data records never cross a 64K boundary; an
/// extended linear address record precedes each upper-address change.
/// `go_addr` adds a start segment address record.
pub fn write_hex_file<W: Write>(
    mut out: W,
    image: &LinkedImage,
    go_addr: Option<u16>,
) -> io::Result<()> {
    let mut current_ela: Option<u16> = None;
    let mut addr = image.origin;
    let mut remaining = image.bytes.as_slice();

    while !remaining.is_empty() {
        let ela = (addr >> 16) as u16;
        if current_ela != Some(ela) {
            if ela != 0 || current_ela.is_some() {
                write_extended_linear_address_record(&mut out, ela)?;
            }
            current_ela = Some(ela);
        }
        let to_boundary = 0x1_0000 - (addr & 0xFFFF) as usize;
        let count = remaining.len().min(LINE_LIMIT).min(to_boundary);
        let (chunk, rest) = remaining.split_at(count);
        write_data_record(&mut out, (addr & 0xFFFF) as u16, chunk)?;
        addr = addr.wrapping_add(count as u32);
        remaining = rest;
    }

    if let Some(go) = go_addr {
        let mut csum: u8 = 0;
        csum = csum.wrapping_add(4);
        csum = csum.wrapping_add(3);
        csum = csum.wrapping_add((go >> 8) as u8);
        csum = csum.wrapping_add((go & 0xff) as u8);
        csum = (!csum).wrapping_add(1);
        writeln!(out, ":040000030000{:04X}{:02X}", go, csum)?;
    }

    writeln!(out, ":00000001FF")?;
    Ok(())
}

/// Write the image bytes verbatim; the origin is implied by the caller.
pub fn write_bin_file<W: Write>(mut out: W, image: &LinkedImage) -> io::Result<()> {
    out.write_all(&image.bytes)
}

fn write_data_record<W: Write>(out: &mut W, line_addr: u16, data: &[u8]) -> io::Result<()> {
    let mut checksum: u8 = data.len() as u8;
    checksum = checksum.wrapping_add((line_addr >> 8) as u8);
    checksum = checksum.wrapping_add((line_addr & 0xff) as u8);
    let mut hex_data = String::with_capacity(data.len() * 2);
    for val in data {
        hex_data.push(hex_digit((val >> 4) & 0x0f));
        hex_data.push(hex_digit(val & 0x0f));
        checksum = checksum.wrapping_add(*val);
    }
    checksum = (!checksum).wrapping_add(1);
    writeln!(
        out,
        ":{:02X}{:04X}00{}{:02X}",
        data.len(),
        line_addr,
        hex_data,
        checksum
    )
}

fn hex_digit(val: u8) -> char {
    match val {
        0..=9 => (b'0' + val) as char,
        _ => (b'A' + (val - 10)) as char,
    }
}

fn write_extended_linear_address_record<W: Write>(out: &mut W, upper: u16) -> io::Result<()> {
    let mut csum: u8 = 0;
    csum = csum.wrapping_add(2); // length
    csum = csum.wrapping_add(4); // record type 04
    csum = csum.wrapping_add((upper >> 8) as u8);
    csum = csum.wrapping_add((upper & 0xff) as u8);
    csum = (!csum).wrapping_add(1);
    writeln!(out, ":02000004{:04X}{:02X}", upper, csum)
}
