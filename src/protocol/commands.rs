//! # ESC/POS Protocol Commands
//!
//! This module implements the ESC/POS command subset spoken by generic USB
//! thermal receipt printers.
//!
//! ## Protocol Overview
//!
//! ESC/POS commands are short byte sequences starting with an escape
//! character. The subset used here covers:
//!
//! - **Initialization**: reset to power-on defaults
//! - **Text styling**: alignment, bold, glyph size
//! - **Paper control**: line feed, full cut
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`
//! - Two bytes: `ESC @`
//! - Multi-byte with parameters: `ESC a n`, `GS V m n`
//!
//! ## Bit-Exactness
//!
//! Thermal printers interpret these sequences directly in firmware; there
//! is no negotiation step. Every builder in this module must reproduce its
//! byte sequence exactly as tabulated or the device will print garbage or
//! ignore the command.

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
///
/// Most ESC/POS commands begin with ESC (0x1B). This byte signals the start
/// of a control sequence rather than printable text.
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for character-size and cutter commands:
/// - Hex: 0x1D, Decimal: 29
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print and advance one line
///
/// Prints any data in the line buffer and advances paper by the current
/// line spacing amount.
pub const LF: u8 = 0x0A;

// ============================================================================
// INITIALIZATION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Resets the printer to its power-on default state. Sent at the start of
/// each print job to ensure consistent behavior regardless of what the
/// previous job left behind.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
/// | Decimal | 27 64 |
///
/// ## Example
///
/// ```
/// use remito::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// TEXT STYLE COMMANDS
// ============================================================================

/// # Left Alignment (ESC a 0)
///
/// Left-justifies all following text.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC a 0  |
/// | Hex     | 1B 61 00 |
/// | Decimal | 27 97 0  |
#[inline]
pub fn align_left() -> Vec<u8> {
    vec![ESC, b'a', 0x00]
}

/// # Center Alignment (ESC a 1)
///
/// Center-justifies all following text.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC a 1  |
/// | Hex     | 1B 61 01 |
/// | Decimal | 27 97 1  |
#[inline]
pub fn align_center() -> Vec<u8> {
    vec![ESC, b'a', 0x01]
}

/// # Bold On (ESC E 1)
///
/// Enables emphasized (bold) printing for following text.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC E 1  |
/// | Hex     | 1B 45 01 |
/// | Decimal | 27 69 1  |
#[inline]
pub fn bold_on() -> Vec<u8> {
    vec![ESC, b'E', 0x01]
}

/// # Bold Off (ESC E 0)
///
/// Disables emphasized printing.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC E 0  |
/// | Hex     | 1B 45 00 |
/// | Decimal | 27 69 0  |
#[inline]
pub fn bold_off() -> Vec<u8> {
    vec![ESC, b'E', 0x00]
}

/// # Double-Size Glyphs (GS ! 0x11)
///
/// Selects double-width, double-height characters. The parameter byte packs
/// width multiplier in the high nibble and height multiplier in the low
/// nibble; `0x11` means 2x2.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS ! 17  |
/// | Hex     | 1D 21 11 |
/// | Decimal | 29 33 17 |
#[inline]
pub fn text_large() -> Vec<u8> {
    vec![GS, b'!', 0x11]
}

/// # Normal-Size Glyphs (GS ! 0x00)
///
/// Returns to 1x1 character size.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS ! 0   |
/// | Hex     | 1D 21 00 |
/// | Decimal | 29 33 0  |
#[inline]
pub fn text_normal() -> Vec<u8> {
    vec![GS, b'!', 0x00]
}

// ============================================================================
// PAPER CONTROL COMMANDS
// ============================================================================

/// # Line Feed (LF)
///
/// Prints the line buffer and advances one line.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | LF    |
/// | Hex     | 0A    |
/// | Decimal | 10    |
#[inline]
pub fn new_line() -> Vec<u8> {
    vec![LF]
}

/// # Full Cut with Feed (GS V A 16)
///
/// Feeds paper forward past the cutter, then performs a full cut. The feed
/// amount (16 motion units) clears the last printed line from the blade.
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | GS V A 16   |
/// | Hex     | 1D 56 41 10 |
/// | Decimal | 29 86 65 16 |
#[inline]
pub fn cut() -> Vec<u8> {
    vec![GS, b'V', b'A', 0x10]
}

// ============================================================================
// JOB FRAMING
// ============================================================================

/// Build the ordered transfer list for one text submission.
///
/// Each element is sent to the printer as its own bulk transfer, in order:
///
/// 1. [`init`] — reset printer state
/// 2. [`align_left`] — left-justify
/// 3. [`text_normal`] — 1x1 glyphs
/// 4. The UTF-8 payload bytes, unmodified, as a single transfer
/// 5. [`new_line`] twice — feed clear of the print head
/// 6. [`cut`] — full paper cut
///
/// The framing is fixed; callers wanting styled output embed ESC/POS
/// control bytes in the payload itself.
///
/// ## Example
///
/// ```
/// use remito::protocol::commands;
///
/// let frames = commands::job_frames("ABC");
/// assert_eq!(frames[3], b"ABC".to_vec());
/// assert_eq!(frames.len(), 7);
/// ```
pub fn job_frames(text: &str) -> Vec<Vec<u8>> {
    vec![
        init(),
        align_left(),
        text_normal(),
        text.as_bytes().to_vec(),
        new_line(),
        new_line(),
        cut(),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
