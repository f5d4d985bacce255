use std::io::{self, Write};

use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{self, Clear, ClearType},
};
use tracing::trace;
use unicode_width::UnicodeWidthChar;

use crate::screen::Screen;

const FALLBACK_GEOMETRY: TerminalGeometry = TerminalGeometry {
    width: 80,
    height: 24,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub width: u16,
    pub height: u16,
}

impl TerminalGeometry {
    /// Current size of the controlling terminal, or 80x24 when there is none.
    pub fn query() -> Self {
        match terminal::size() {
            Ok((width, height)) => Self { width, height },
            Err(err) => {
                trace!(%err, "no terminal size, using fallback");
                FALLBACK_GEOMETRY
            }
        }
    }
}

/// Overwrites the terminal in place from the top-left corner.
///
/// Keeps at most `height` lines of at most `width` columns. Each row is
/// cleared past its text and everything below the last row is cleared, so
/// leftovers of a longer previous screen vanish without a full clear.
pub fn render<W: Write>(out: &mut W, screen: &Screen, geometry: TerminalGeometry) -> io::Result<()> {
    let width = usize::from(geometry.width);
    queue!(out, MoveTo(0, 0))?;

    for (row, line) in screen
        .lines()
        .iter()
        .take(usize::from(geometry.height))
        .enumerate()
    {
        if row > 0 {
            // Raw mode turns off output post-processing, so return explicitly.
            queue!(out, Print("\r\n"))?;
        }
        let (visible, columns) = clip(line, width);
        queue!(out, Print(visible))?;
        // A full-width row parks the cursor on its last cell; clearing there would eat it.
        if columns < width {
            queue!(out, Clear(ClearType::UntilNewLine))?;
        }
    }

    queue!(out, Clear(ClearType::FromCursorDown))?;
    out.flush()
}

/// Longest prefix of `line` that fits in `width` terminal columns, with its column count.
///
/// Control characters come out as `?`: output paths, temp entry names and
/// command lines are written by builds, and a raw newline or ESC would move
/// the cursor outside the clipped area.
fn clip(line: &str, width: usize) -> (String, usize) {
    let mut visible = String::new();
    let mut columns = 0;
    for c in line.chars() {
        let c = if c.is_control() { '?' } else { c };
        let cells = c.width().unwrap_or(0);
        if columns + cells > width {
            break;
        }
        visible.push(c);
        columns += cells;
    }
    (visible, columns)
}
