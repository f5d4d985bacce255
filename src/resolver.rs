use std::fmt;

use tracing::debug;

use crate::{host::HostSystem, sampler::ProcessSnapshot};

pub const UNKNOWN_OUTPUT: &str = "(unknown)";

/// Environment variable the Nix builder exports the output path in.
const OUTPUT_VAR: &str = "out";

/// Best guess at what a build user is producing, tagged with how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPath {
    Environment(String),
    TempEntry(String),
    Unknown,
}

impl OutputPath {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Environment(path) | Self::TempEntry(path) => path,
            Self::Unknown => UNKNOWN_OUTPUT,
        }
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Never fails: every tier's errors end in the next tier, the last in [`OutputPath::Unknown`].
pub fn resolve<H: HostSystem + ?Sized>(host: &mut H, snapshot: &ProcessSnapshot) -> OutputPath {
    let user = snapshot.user();
    let pid = snapshot.representative();

    if let Some(path) = from_environment(host, pid) {
        debug!(user = %user.name, pid, %path, "output from environment");
        return OutputPath::Environment(path);
    }
    if let Some(name) = newest_temp_entry(host, user.uid) {
        debug!(user = %user.name, %name, "output from temp directory");
        return OutputPath::TempEntry(name);
    }
    debug!(user = %user.name, pid, "output unknown");
    OutputPath::Unknown
}

fn from_environment<H: HostSystem + ?Sized>(host: &mut H, pid: u32) -> Option<String> {
    let vars = match host.environment(pid) {
        Ok(vars) => vars,
        Err(err) => {
            debug!(pid, %err, "environment unreadable");
            return None;
        }
    };
    vars.iter()
        .filter_map(|var| var.split_once('='))
        .find(|(key, value)| *key == OUTPUT_VAR && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn newest_temp_entry<H: HostSystem + ?Sized>(host: &H, uid: u32) -> Option<String> {
    let mut entries = match host.temp_entries(uid) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(uid, %err, "temp directory unreadable");
            return None;
        }
    };
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    entries.pop().map(|e| e.name).filter(|name| !name.is_empty())
}
