use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    error::Result,
    host::HostSystem,
    resolver,
    sampler,
    screen::{self, Screen, UserReport},
    users::{BuildUser, BuildUserDirectory},
};

/// One sampling pass: who is building, what, and with which processes.
pub struct Monitor<H: HostSystem> {
    host: H,
    directory: BuildUserDirectory,
    /// Last successfully read build users.
    users: Vec<BuildUser>,
}

impl<H: HostSystem> Monitor<H> {
    pub fn new(host: H, directory: BuildUserDirectory) -> Self {
        Self {
            host,
            directory,
            users: Vec::new(),
        }
    }

    /// Loads the build users; fails when the account database cannot be read.
    pub fn check_accounts(&mut self) -> Result<()> {
        self.users = self.directory.enumerate(&self.host)?;
        Ok(())
    }

    /// Once running, an unreadable account database only costs freshness.
    fn refresh_users(&mut self) {
        match self.directory.enumerate(&self.host) {
            Ok(users) => self.users = users,
            Err(err) => warn!(%err, known = self.users.len(), "keeping previous build users"),
        }
    }

    pub fn reports(&mut self) -> Vec<UserReport> {
        let started = Instant::now();
        self.refresh_users();
        let snapshots = sampler::sample(&mut self.host, &self.users);

        let reports: Vec<UserReport> = snapshots
            .into_iter()
            .map(|snapshot| {
                let output = resolver::resolve(&mut self.host, &snapshot);
                let table = self.host.process_table(snapshot.pids()).unwrap_or_else(|err| {
                    warn!(user = %snapshot.user().name, %err, "process listing failed");
                    String::new()
                });
                UserReport {
                    snapshot,
                    output,
                    table,
                }
            })
            .collect();

        debug!(
            build_users = self.users.len(),
            active = reports.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sampled"
        );
        reports
    }

    pub fn screen(&mut self) -> Screen {
        screen::compose(&self.reports())
    }

    #[cfg(test)]
    pub fn host(&self) -> &H {
        &self.host
    }
}
