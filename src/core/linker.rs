// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Segment linker.
//!
//! Segments are named, addressed byte regions. Writes go to the active
//! segment only and are bounds-checked against it; a resizable segment grows
//! instead of failing. [`Linker::link`] overlays every segment, padded to its
//! declared size, onto one zero-filled image spanning all segments. Later
//! segments win where they overlap.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    pub name: String,
    pub start: u32,
    pub size: u32,
    pub pad: u8,
    pub resizable: bool,
}

impl SegmentSpec {
    pub fn new(name: impl Into<String>, start: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            pad: 0,
            resizable: false,
        }
    }

    pub fn with_pad(mut self, pad: u8) -> Self {
        self.pad = pad;
        self
    }

    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    DuplicateSegment(String),
    MissingSegment(String),
    NoActiveSegment,
    BelowStart { segment: String, addr: u32, start: u32 },
    PastEnd { segment: String, addr: u32, size: u32 },
    ImageTooLarge,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::DuplicateSegment(name) => {
                write!(f, "Segment '{name}' already defined with a different layout")
            }
            LinkError::MissingSegment(name) => write!(f, "Unknown segment '{name}'"),
            LinkError::NoActiveSegment => write!(f, "No active segment for output"),
            LinkError::BelowStart {
                segment,
                addr,
                start,
            } => write!(
                f,
                "Write to ${addr:04X} is below the start ${start:04X} of segment '{segment}'"
            ),
            LinkError::PastEnd {
                segment,
                addr,
                size,
            } => write!(
                f,
                "Write to ${addr:04X} is past the end of segment '{segment}' (size {size})"
            ),
            LinkError::ImageTooLarge => write!(f, "Linked image is too large for this host"),
        }
    }
}

impl std::error::Error for LinkError {}

#[derive(Debug, Clone)]
pub struct Segment {
    spec: SegmentSpec,
    bytes: Vec<u8>,
}

impl Segment {
    fn new(spec: SegmentSpec) -> Self {
        Self {
            spec,
            bytes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &SegmentSpec {
        &self.spec
    }

    pub fn start(&self) -> u32 {
        self.spec.start
    }

    pub fn size(&self) -> u32 {
        self.spec.size
    }

    /// Bytes from the start up to the highest address written.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn write(&mut self, addr: u32, value: u8) -> Result<(), LinkError> {
        let offset = addr
            .checked_sub(self.spec.start)
            .ok_or_else(|| LinkError::BelowStart {
                segment: self.spec.name.clone(),
                addr,
                start: self.spec.start,
            })?;
        if offset >= self.spec.size {
            if !self.spec.resizable {
                return Err(LinkError::PastEnd {
                    segment: self.spec.name.clone(),
                    addr,
                    size: self.spec.size,
                });
            }
            self.spec.size = offset + 1;
        }
        let index = usize::try_from(offset).map_err(|_| LinkError::ImageTooLarge)?;
        if index >= self.bytes.len() {
            self.bytes.resize(index + 1, self.spec.pad);
        }
        self.bytes[index] = value;
        Ok(())
    }

    /// Segment bytes padded out to the declared size.
    fn padded(&self) -> Result<Vec<u8>, LinkError> {
        let size = usize::try_from(self.spec.size).map_err(|_| LinkError::ImageTooLarge)?;
        let mut data = self.bytes.clone();
        if data.len() < size {
            data.resize(size, self.spec.pad);
        }
        Ok(data)
    }

    fn end(&self) -> u64 {
        u64::from(self.spec.start) + self.bytes.len().max(self.spec.size as usize) as u64
    }
}

/// Final position of one segment in the linked image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    pub offset: u32,
    pub length: u32,
    pub pad_length: u32,
    pub origin: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkedImage {
    pub origin: u32,
    pub bytes: Vec<u8>,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Default)]
pub struct Linker {
    segments: Vec<Segment>,
    active: Option<usize>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a segment. Redeclaring an identical layout is accepted so the
    /// same declaration can be seen in both passes.
    pub fn add_segment(&mut self, spec: SegmentSpec) -> Result<(), LinkError> {
        if let Some(existing) = self.segments.iter().find(|seg| seg.name() == spec.name) {
            if existing.spec.start == spec.start
                && existing.spec.pad == spec.pad
                && existing.spec.resizable == spec.resizable
                && (existing.spec.size == spec.size || spec.resizable)
            {
                return Ok(());
            }
            return Err(LinkError::DuplicateSegment(spec.name));
        }
        log::debug!(
            "segment {} at ${:04X} size {}{}",
            spec.name,
            spec.start,
            spec.size,
            if spec.resizable { " (resizable)" } else { "" }
        );
        self.segments.push(Segment::new(spec));
        Ok(())
    }

    pub fn use_segment(&mut self, name: &str) -> Result<(), LinkError> {
        let index = self
            .position(name)
            .ok_or_else(|| LinkError::MissingSegment(name.to_string()))?;
        self.active = Some(index);
        Ok(())
    }

    pub fn has_segment(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.position(name).map(|index| &self.segments[index])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn active_segment(&self) -> Option<&Segment> {
        self.active.map(|index| &self.segments[index])
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), LinkError> {
        let index = self.active.ok_or(LinkError::NoActiveSegment)?;
        self.segments[index].write(addr, value)
    }

    pub fn write_bytes(&mut self, addr: u32, values: &[u8]) -> Result<(), LinkError> {
        for (ix, value) in values.iter().enumerate() {
            let offset = u32::try_from(ix).map_err(|_| LinkError::ImageTooLarge)?;
            let target = addr.checked_add(offset).ok_or(LinkError::ImageTooLarge)?;
            self.write_byte(target, *value)?;
        }
        Ok(())
    }

    pub fn link(&self) -> Result<LinkedImage, LinkError> {
        let Some(origin) = self.segments.iter().map(Segment::start).min() else {
            return Ok(LinkedImage::default());
        };
        let end = self.segments.iter().map(Segment::end).max().unwrap_or(0);
        let image_len =
            usize::try_from(end - u64::from(origin)).map_err(|_| LinkError::ImageTooLarge)?;
        let mut bytes = vec![0u8; image_len];
        let mut placements = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            let data = segment.padded()?;
            let offset = segment.start() - origin;
            let start = offset as usize;
            bytes[start..start + data.len()].copy_from_slice(&data);
            let length = u32::try_from(segment.bytes.len()).map_err(|_| LinkError::ImageTooLarge)?;
            placements.push(Placement {
                name: segment.name().to_string(),
                offset,
                length,
                pad_length: segment.size().saturating_sub(length),
                origin: segment.start(),
                size: segment.size(),
            });
        }

        Ok(LinkedImage {
            origin,
            bytes,
            placements,
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.segments
            .iter()
            .position(|seg| seg.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_segments_with_zero_gaps() {
        let mut linker = Linker::new();
        linker.add_segment(SegmentSpec::new("A", 0x10, 2)).unwrap();
        linker.add_segment(SegmentSpec::new("B", 0x14, 2)).unwrap();
        linker.use_segment("A").unwrap();
        linker.write_bytes(0x10, &[0xAA, 0xBB]).unwrap();
        linker.use_segment("B").unwrap();
        linker.write_bytes(0x14, &[0xCC, 0xDD]).unwrap();

        let image = linker.link().unwrap();
        assert_eq!(image.origin, 0x10);
        assert_eq!(image.bytes, vec![0xAA, 0xBB, 0x00, 0x00, 0xCC, 0xDD]);
        assert_eq!(image.placements.len(), 2);
        assert_eq!(image.placements[1].offset, 4);
        assert_eq!(image.placements[1].origin, 0x14);
    }

    #[test]
    fn later_segments_win_overlaps() {
        let mut linker = Linker::new();
        linker.add_segment(SegmentSpec::new("low", 0x00, 4)).unwrap();
        linker.add_segment(SegmentSpec::new("high", 0x02, 2)).unwrap();
        linker.use_segment("low").unwrap();
        linker.write_bytes(0x00, &[1, 2, 3, 4]).unwrap();
        linker.use_segment("high").unwrap();
        linker.write_bytes(0x02, &[9, 8]).unwrap();
        assert_eq!(linker.link().unwrap().bytes, vec![1, 2, 9, 8]);
    }

    #[test]
    fn pads_segments_to_declared_size() {
        let mut linker = Linker::new();
        linker
            .add_segment(SegmentSpec::new("code", 0x100, 4).with_pad(0xFF))
            .unwrap();
        linker.use_segment("code").unwrap();
        linker.write_byte(0x100, 0xEA).unwrap();
        let image = linker.link().unwrap();
        assert_eq!(image.bytes, vec![0xEA, 0xFF, 0xFF, 0xFF]);
        let placement = &image.placements[0];
        assert_eq!((placement.length, placement.pad_length, placement.size), (1, 3, 4));
    }

    #[test]
    fn bounds_are_checked_unless_resizable() {
        let mut linker = Linker::new();
        linker.add_segment(SegmentSpec::new("fixed", 0x10, 1)).unwrap();
        linker
            .add_segment(SegmentSpec::new("grow", 0x20, 0).resizable(true))
            .unwrap();
        linker.use_segment("fixed").unwrap();
        assert!(matches!(
            linker.write_byte(0x0F, 0),
            Err(LinkError::BelowStart { .. })
        ));
        assert!(matches!(
            linker.write_byte(0x11, 0),
            Err(LinkError::PastEnd { .. })
        ));
        linker.use_segment("grow").unwrap();
        linker.write_bytes(0x20, &[1, 2, 3]).unwrap();
        assert_eq!(linker.segment("grow").map(Segment::size), Some(3));
    }

    #[test]
    fn missing_segments_and_writes_without_segment_fail() {
        let mut linker = Linker::new();
        assert_eq!(
            linker.write_byte(0, 0),
            Err(LinkError::NoActiveSegment)
        );
        assert_eq!(
            linker.use_segment("nope"),
            Err(LinkError::MissingSegment("nope".to_string()))
        );
        assert_eq!(linker.link().unwrap(), LinkedImage::default());
    }

    #[test]
    fn redeclaring_identical_segment_is_accepted() {
        let mut linker = Linker::new();
        let spec = SegmentSpec::new("code", 0x800, 16);
        linker.add_segment(spec.clone()).unwrap();
        linker.add_segment(spec).unwrap();
        assert_eq!(
            linker.add_segment(SegmentSpec::new("code", 0x900, 16)),
            Err(LinkError::DuplicateSegment("code".to_string()))
        );
    }
}
