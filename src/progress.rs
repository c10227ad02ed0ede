//! Single-line transfer progress for interactive terminals.
//!
//! The line is redrawn in place with [`crossterm`] and never affects the
//! transfer itself: drawing errors are ignored.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
    tty::IsTty,
};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

pub struct Progress {
    enabled: bool,
    drawn: bool,
    last_draw: Option<Instant>,
}

impl Progress {
    /// Progress that draws when stdout is a terminal.
    pub fn for_stdout() -> Self {
        Self {
            enabled: io::stdout().is_tty(),
            drawn: false,
            last_draw: None,
        }
    }

    /// Progress that never draws.
    pub fn hidden() -> Self {
        Self {
            enabled: false,
            drawn: false,
            last_draw: None,
        }
    }

    /// Report `done` bytes of `total` (when the total is known).
    pub fn update(&mut self, done: u64, total: Option<u64>) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        if self
            .last_draw
            .is_some_and(|last| now.duration_since(last) < REDRAW_INTERVAL)
        {
            return;
        }
        self.last_draw = Some(now);
        self.draw(&format_line(done, total));
    }

    /// Draw the final state and move to a fresh line.
    pub fn finish(&mut self, done: u64, total: Option<u64>) {
        if !self.enabled {
            return;
        }
        self.draw(&format_line(done, total));
        let mut stdout = io::stdout();
        let _ = queue!(stdout, Print("\n"));
        let _ = stdout.flush();
        self.drawn = false;
    }

    fn draw(&mut self, line: &str) {
        let mut stdout = io::stdout();
        let _ = queue!(
            stdout,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        );
        let _ = stdout.flush();
        self.drawn = true;
    }
}

impl Drop for Progress {
    // Leave the cursor on a clean line if a transfer failed mid-way.
    fn drop(&mut self) {
        if self.drawn {
            let mut stdout = io::stdout();
            let _ = queue!(stdout, Print("\n"));
            let _ = stdout.flush();
        }
    }
}

fn format_line(done: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let percent = done as f64 * 100.0 / total as f64;
            format!("{done} of {total} bytes ({percent:.1}%)")
        }
        _ => format!("{done} bytes"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
