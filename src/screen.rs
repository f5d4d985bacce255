use crate::{resolver::OutputPath, sampler::ProcessSnapshot};

pub const SEPARATOR: &str = "----";

/// Everything shown about one active build user in a cycle.
#[derive(Debug, Clone)]
pub struct UserReport {
    pub snapshot: ProcessSnapshot,
    pub output: OutputPath,
    /// Raw multi-line process listing for `snapshot.pids()`.
    pub table: String,
}

/// Ordered display rows, unclipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    lines: Vec<String>,
}

impl Screen {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

/// Summary (count and output per user), a separator, then each user's process table.
pub fn compose(reports: &[UserReport]) -> Screen {
    let mut screen = Screen::default();

    for report in reports {
        screen.push(format!("{:>4} {}", report.snapshot.pids().len(), report.output));
    }

    screen.push("");
    screen.push(SEPARATOR);
    screen.push("");

    for report in reports {
        screen.push(format!("{}: {}", report.snapshot.user().name, report.output));
        for line in report.table.lines() {
            screen.push(line);
        }
    }

    screen
}
