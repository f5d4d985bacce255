//! Everything the monitor asks of the operating system.
//!
//! The core only talks to [`HostSystem`]; [`LiveSystem`] answers with
//! `sysinfo`, the filesystem and `ps`.

use std::{
    fs, io,
    os::unix::fs::MetadataExt,
    path::PathBuf,
    process::Command,
    time::SystemTime,
};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

use crate::error::{MonitorError, Result};

/// A direct child of the shared temporary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempEntry {
    pub name: String,
    pub modified: SystemTime,
}

pub trait HostSystem {
    /// Raw text of the account database, one `name:pw:uid:gid:...` record per line.
    fn accounts(&self) -> Result<String>;

    /// Takes the process-table snapshot the presence and enumeration queries answer from.
    fn refresh_processes(&mut self);

    fn owns_any_process(&self, uid: u32) -> bool;

    /// PIDs owned by `uid`, in no particular order.
    fn processes_owned_by(&self, uid: u32) -> Vec<u32>;

    /// Fresh `KEY=VALUE` environment of one process.
    fn environment(&mut self, pid: u32) -> io::Result<Vec<String>>;

    fn temp_entries(&self, uid: u32) -> io::Result<Vec<TempEntry>>;

    /// Full-format listing (one row per thread) of exactly these PIDs.
    fn process_table(&self, pids: &[u32]) -> io::Result<String>;
}

pub struct LiveSystem {
    system: System,
    passwd: PathBuf,
    tmp_dir: PathBuf,
}

impl LiveSystem {
    pub fn new(passwd: PathBuf, tmp_dir: PathBuf) -> Self {
        Self {
            system: System::new(),
            passwd,
            tmp_dir,
        }
    }
}

impl HostSystem for LiveSystem {
    fn accounts(&self) -> Result<String> {
        fs::read_to_string(&self.passwd).map_err(|source| MonitorError::AccountDatabase {
            path: self.passwd.clone(),
            source,
        })
    }

    fn refresh_processes(&mut self) {
        let seen = self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_user(UpdateKind::OnlyIfNotSet)
                .without_tasks(),
        );
        debug!(processes = seen, "process table refreshed");
    }

    fn owns_any_process(&self, uid: u32) -> bool {
        self.system
            .processes()
            .values()
            .any(|p| p.user_id().is_some_and(|owner| **owner == uid))
    }

    fn processes_owned_by(&self, uid: u32) -> Vec<u32> {
        self.system
            .processes()
            .values()
            .filter(|p| p.user_id().is_some_and(|owner| **owner == uid))
            .map(|p| p.pid().as_u32())
            .collect()
    }

    fn environment(&mut self, pid: u32) -> io::Result<Vec<String>> {
        let pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_environ(UpdateKind::Always),
        );
        let process = self.system.process(pid).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("process {pid} has exited"))
        })?;
        Ok(process
            .environ()
            .iter()
            .map(|var| var.to_string_lossy().into_owned())
            .collect())
    }

    fn temp_entries(&self, uid: u32) -> io::Result<Vec<TempEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.tmp_dir)? {
            // Entries disappear while we look at them; skip those.
            let Ok(entry) = entry else { continue };
            let Ok(meta) = entry.metadata() else { continue };
            if meta.uid() != uid {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            entries.push(TempEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified,
            });
        }
        Ok(entries)
    }

    fn process_table(&self, pids: &[u32]) -> io::Result<String> {
        if pids.is_empty() {
            return Ok(String::new());
        }
        let list = pids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let output = Command::new("ps").args(["-fL", "-p", &list]).output()?;
        // ps exits non-zero once every listed pid is gone; the header is still worth showing.
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
