//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

//! Backends for tests.

use std::collections::HashMap;

use super::codec::{ResourceLimit, RESOURCE_MESSAGE, RESOURCE_STORAGE};
use super::response::QuotaStatus;
use super::server::{Mailbox, SessionMailbox, SessionUser, User};
use crate::support::error::Error;

/// A user whose quotas live in memory.
pub struct MemoryUser {
    pub quotas: HashMap<String, HashMap<String, ResourceLimit>>,
    pub mailboxes: HashMap<String, Vec<String>>,
}

impl MemoryUser {
    /// A user with two roots, `Root1` and `Root2`, and these mailboxes:
    ///
    /// - `INBOX` and `日本語`, under both roots
    /// - `Archive`, under no root
    /// - `Broken`, under `Root1` and a root that doesn't exist
    pub fn example() -> Self {
        let mut quotas = HashMap::new();
        quotas.insert(
            "Root1".to_owned(),
            vec![
                (
                    RESOURCE_STORAGE.to_owned(),
                    ResourceLimit {
                        usage: 10,
                        limit: 512,
                    },
                ),
                (
                    RESOURCE_MESSAGE.to_owned(),
                    ResourceLimit {
                        usage: 3,
                        limit: 1000,
                    },
                ),
            ]
            .into_iter()
            .collect(),
        );
        quotas.insert(
            "Root2".to_owned(),
            vec![(
                RESOURCE_STORAGE.to_owned(),
                ResourceLimit {
                    usage: 0,
                    limit: 2048,
                },
            )]
            .into_iter()
            .collect(),
        );

        let both = vec!["Root1".to_owned(), "Root2".to_owned()];
        let mut mailboxes = HashMap::new();
        mailboxes.insert("INBOX".to_owned(), both.clone());
        mailboxes.insert("日本語".to_owned(), both);
        mailboxes.insert("Archive".to_owned(), vec![]);
        mailboxes.insert(
            "Broken".to_owned(),
            vec!["Root1".to_owned(), "Gone".to_owned()],
        );

        MemoryUser { quotas, mailboxes }
    }
}

impl SessionUser for MemoryUser {
    fn username(&self) -> &str {
        "azure"
    }

    fn mailbox(
        &mut self,
        name: &str,
    ) -> Result<Box<dyn SessionMailbox>, Error> {
        self.mailboxes
            .get(name)
            .map(|roots| {
                Box::new(MemoryMailbox {
                    roots: roots.clone(),
                }) as Box<dyn SessionMailbox>
            })
            .ok_or_else(|| Error::Backend(format!("No such mailbox: {}", name)))
    }

    fn as_quota_user(&mut self) -> Option<&mut dyn User> {
        Some(self)
    }
}

impl User for MemoryUser {
    fn get_quota(&mut self, root: &str) -> Result<QuotaStatus, Error> {
        self.quotas
            .get(root)
            .map(|resources| QuotaStatus {
                name: root.to_owned(),
                resources: resources.clone(),
            })
            .ok_or_else(|| {
                Error::Backend(format!("No such quota root: {}", root))
            })
    }

    fn set_quota(
        &mut self,
        root: &str,
        resources: &HashMap<String, u32>,
    ) -> Result<(), Error> {
        let old = self.quotas.remove(root).unwrap_or_default();
        let new = resources
            .iter()
            .map(|(name, &limit)| {
                let usage = old.get(name).map_or(0, |rl| rl.usage);
                (name.clone(), ResourceLimit { usage, limit })
            })
            .collect();
        self.quotas.insert(root.to_owned(), new);
        Ok(())
    }
}

struct MemoryMailbox {
    roots: Vec<String>,
}

impl SessionMailbox for MemoryMailbox {
    fn as_quota_mailbox(&self) -> Option<&dyn Mailbox> {
        Some(self)
    }
}

impl Mailbox for MemoryMailbox {
    fn list_quotas(&self) -> Result<Vec<String>, Error> {
        Ok(self.roots.clone())
    }
}

/// A user of a backend that knows nothing about quotas.
pub struct PlainUser;

struct PlainMailbox;

impl SessionUser for PlainUser {
    fn username(&self) -> &str {
        "plain"
    }

    fn mailbox(&mut self, _: &str) -> Result<Box<dyn SessionMailbox>, Error> {
        Ok(Box::new(PlainMailbox))
    }
}

impl SessionMailbox for PlainMailbox {}
