// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conditional assembly state management.
//!
//! Each `.IF` pushes a frame. A frame is *true* while its current branch is
//! selected and *passed* once any branch has been taken, so later `.ELSEIF`
//! and `.ELSE` branches are skipped. Code is assembled only while every
//! frame on the stack is true.

use crate::core::stream::FrameId;
use crate::core::tokenizer::Span;

/// Branch of a conditional block the driver is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalSubType {
    If,
    ElseIf,
    Else,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalContext {
    pub is_true: bool,
    pub has_passed: bool,
    pub sub_type: ConditionalSubType,
    /// False when an enclosing frame is not assembling; such a block never
    /// selects a branch.
    pub parent_active: bool,
    /// Stream frame that opened the block.
    pub frame: Option<FrameId>,
    pub span: Span,
    pub file: String,
}

impl ConditionalContext {
    pub fn new(
        parent_active: bool,
        condition: bool,
        frame: Option<FrameId>,
        span: Span,
        file: impl Into<String>,
    ) -> Self {
        let is_true = parent_active && condition;
        Self {
            is_true,
            has_passed: is_true,
            sub_type: ConditionalSubType::If,
            parent_active,
            frame,
            span,
            file: file.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalError {
    ElseWithoutIf(&'static str),
    ElseAfterElse(&'static str),
}

impl std::fmt::Display for ConditionalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionalError::ElseWithoutIf(name) => write!(f, "{name} found without matching .IF"),
            ConditionalError::ElseAfterElse(name) => write!(f, "{name} found after .ELSE"),
        }
    }
}

impl std::error::Error for ConditionalError {}

/// Stack of conditional assembly contexts.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    stack: Vec<ConditionalContext>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn last(&self) -> Option<&ConditionalContext> {
        self.stack.last()
    }

    /// True when the innermost frame is assembling (and therefore all of
    /// its ancestors are).
    pub fn assembling(&self) -> bool {
        self.stack.last().map_or(true, |ctx| ctx.is_true)
    }

    pub fn push(&mut self, ctx: ConditionalContext) {
        self.stack.push(ctx);
    }

    pub fn pop(&mut self) -> Option<ConditionalContext> {
        self.stack.pop()
    }

    /// Whether an `.ELSEIF` condition must be evaluated at all.
    pub fn else_if_needs_condition(&self) -> bool {
        self.stack
            .last()
            .is_some_and(|ctx| ctx.parent_active && !ctx.has_passed)
    }

    pub fn else_if(&mut self, condition: bool) -> Result<(), ConditionalError> {
        let ctx = self
            .stack
            .last_mut()
            .ok_or(ConditionalError::ElseWithoutIf(".ELSEIF"))?;
        if ctx.sub_type == ConditionalSubType::Else {
            return Err(ConditionalError::ElseAfterElse(".ELSEIF"));
        }
        ctx.sub_type = ConditionalSubType::ElseIf;
        ctx.is_true = ctx.parent_active && !ctx.has_passed && condition;
        ctx.has_passed |= ctx.is_true;
        Ok(())
    }

    pub fn else_branch(&mut self) -> Result<(), ConditionalError> {
        let ctx = self
            .stack
            .last_mut()
            .ok_or(ConditionalError::ElseWithoutIf(".ELSE"))?;
        if ctx.sub_type == ConditionalSubType::Else {
            return Err(ConditionalError::ElseAfterElse(".ELSE"));
        }
        ctx.sub_type = ConditionalSubType::Else;
        ctx.is_true = ctx.parent_active && !ctx.has_passed;
        ctx.has_passed = true;
        Ok(())
    }

    /// Remove and return blocks opened by `frame` that are still open.
    pub fn drain_frame(&mut self, frame: FrameId) -> Vec<ConditionalContext> {
        let keep = self
            .stack
            .iter()
            .position(|ctx| ctx.frame == Some(frame))
            .unwrap_or(self.stack.len());
        self.stack.split_off(keep)
    }
}
