use tracing::debug;

use crate::{error::Result, host::HostSystem};

/// A numbered build-slot account, e.g. `nixbld7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUser {
    pub name: String,
    pub uid: u32,
    pub slot: u64,
}

pub struct BuildUserDirectory {
    prefix: String,
}

impl BuildUserDirectory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Every build-slot account in the database, ordered by slot number.
    pub fn enumerate<H: HostSystem + ?Sized>(&self, host: &H) -> Result<Vec<BuildUser>> {
        let users = self.parse(&host.accounts()?);
        debug!(count = users.len(), prefix = %self.prefix, "build users enumerated");
        Ok(users)
    }

    fn parse(&self, database: &str) -> Vec<BuildUser> {
        let mut users: Vec<BuildUser> = database
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.split(':');
                let name = fields.next()?;
                let uid = fields.nth(1)?.trim().parse().ok()?;
                let slot = self.slot_of(name)?;
                Some(BuildUser {
                    name: name.to_string(),
                    uid,
                    slot,
                })
            })
            .collect();
        users.sort_by_key(|u| u.slot);
        users.dedup_by(|a, b| a.name == b.name);
        users
    }

    fn slot_of(&self, name: &str) -> Option<u64> {
        let digits = name.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::MonitorError, host::fake::FakeHost};

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
# build users
nixbld10:x:30010:30000:Nix build user 10:/var/empty:/sbin/nologin
nixbld1:x:30001:30000:Nix build user 1:/var/empty:/sbin/nologin
nixbld2:x:30002:30000:Nix build user 2:/var/empty:/sbin/nologin
nixbldx:x:30099:30000::/var/empty:/sbin/nologin
nixbld:x:30098:30000::/var/empty:/sbin/nologin
mynixbld3:x:1003:100::/home/mynixbld3:/bin/sh
nixbld3:x:notanumber:30000::/var/empty:/sbin/nologin

nixbld4
";

    fn names(users: &[BuildUser]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn only_prefix_plus_digits_are_build_users() {
        let host = FakeHost::with_accounts(PASSWD);
        let users = BuildUserDirectory::new("nixbld").enumerate(&host).unwrap();
        assert_eq!(names(&users), ["nixbld1", "nixbld2", "nixbld10"]);
        assert_eq!(users[0].uid, 30001);
        assert_eq!(users[2].slot, 10);
    }

    #[test]
    fn other_prefixes_are_honoured() {
        let host = FakeHost::with_accounts(
            "guixbuilder01:x:999:998::/var/empty:/bin/false\nnixbld1:x:30001:30000:::\n",
        );
        let users = BuildUserDirectory::new("guixbuilder")
            .enumerate(&host)
            .unwrap();
        assert_eq!(names(&users), ["guixbuilder01"]);
        assert_eq!(users[0].slot, 1);
    }

    #[test]
    fn unreadable_database_is_propagated() {
        let host = FakeHost::default();
        let err = BuildUserDirectory::new("nixbld")
            .enumerate(&host)
            .unwrap_err();
        assert!(matches!(err, MonitorError::AccountDatabase { .. }));
    }

    #[test]
    fn empty_database_has_no_users() {
        let host = FakeHost::with_accounts("");
        let users = BuildUserDirectory::new("nixbld").enumerate(&host).unwrap();
        assert!(users.is_empty());
    }
}
