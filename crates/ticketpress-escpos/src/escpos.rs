// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS command vocabulary and a fluent builder over it.
//
// Text is written as UTF-8 with no transcoding; the printer must be set to a
// UTF-8 capable code page.  Widths are counted in characters, not bytes.

use crate::format::{pad_line, separator};

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const LF: u8 = 0x0A;

/// ESC @: reset printer state.
pub const INIT: [u8; 2] = [ESC, 0x40];

pub const BOLD_ON: [u8; 3] = [ESC, 0x45, 0x01];
pub const BOLD_OFF: [u8; 3] = [ESC, 0x45, 0x00];
pub const UNDERLINE_ON: [u8; 3] = [ESC, 0x2D, 0x01];
pub const UNDERLINE_OFF: [u8; 3] = [ESC, 0x2D, 0x00];

/// GS ! n: character size.
pub const NORMAL_SIZE: [u8; 3] = [GS, 0x21, 0x00];
pub const DOUBLE_HEIGHT: [u8; 3] = [GS, 0x21, 0x01];
pub const DOUBLE_WIDTH: [u8; 3] = [GS, 0x21, 0x10];
pub const DOUBLE_SIZE: [u8; 3] = [GS, 0x21, 0x11];

pub const ALIGN_LEFT: [u8; 3] = [ESC, 0x61, 0x00];
pub const ALIGN_CENTER: [u8; 3] = [ESC, 0x61, 0x01];
pub const ALIGN_RIGHT: [u8; 3] = [ESC, 0x61, 0x02];

/// GS V A 3: feed 3 and full cut.
pub const CUT: [u8; 4] = [GS, 0x56, 0x41, 0x03];
/// GS V B 0: partial cut.
pub const PARTIAL_CUT: [u8; 4] = [GS, 0x56, 0x42, 0x00];

/// Builds an ESC/POS byte stream.
///
/// Every document starts with `INIT`, so leftover state from a previous
/// (possibly aborted) job never bleeds into the next one.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a builder for paper `width` characters wide.
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(2048);
        buf.extend_from_slice(&INIT);
        Self { buf, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    // === Text ===

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Text followed by a line feed.
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(LF);
        self
    }

    /// Blank line.
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(LF);
        self
    }

    /// ESC d n: print and feed `lines` lines.
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x64, lines]);
        self
    }

    // === Alignment ===

    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&ALIGN_LEFT);
        self
    }

    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&ALIGN_CENTER);
        self
    }

    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&ALIGN_RIGHT);
        self
    }

    // === Style ===

    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&BOLD_ON);
        self
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&BOLD_OFF);
        self
    }

    pub fn underline(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&UNDERLINE_ON);
        self
    }

    pub fn underline_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&UNDERLINE_OFF);
        self
    }

    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&DOUBLE_SIZE);
        self
    }

    pub fn double_height(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&DOUBLE_HEIGHT);
        self
    }

    pub fn double_width(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&DOUBLE_WIDTH);
        self
    }

    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&NORMAL_SIZE);
        self
    }

    // === Layout ===

    /// A full-width line of `ch`.
    pub fn separator(&mut self, ch: char) -> &mut Self {
        let sep = separator(ch, self.width);
        self.line(&sep)
    }

    /// `left` flush left and `right` flush right on one line.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let padded = pad_line(left, right, self.width);
        self.line(&padded)
    }

    // === Paper ===

    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&CUT);
        self
    }

    pub fn cut_partial(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&PARTIAL_CUT);
        self
    }

    /// Finish and take the bytes.
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}
