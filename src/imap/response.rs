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

//! The two responses of RFC 2087 section 5.

use std::borrow::Cow;
use std::collections::HashMap;
use std::iter::FusedIterator;
use std::slice;

use super::codec::{self, ResourceLimit};
use super::syntax::{Field, UntaggedResponse};
use crate::support::error::Error;

pub const RESPONSE_NAME: &str = "QUOTA";
pub const ROOT_RESPONSE_NAME: &str = "QUOTAROOT";

/// The usage and limits of one quota root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotaStatus {
    /// The quota root name.
    pub name: String,
    /// The resources of the root, indexed by resource name.
    pub resources: HashMap<String, ResourceLimit>,
}

impl QuotaStatus {
    /// Parse the fields of a `QUOTA` response.
    pub fn parse(fields: &[Field<'_>]) -> Result<Self, Error> {
        if fields.len() < 2 {
            return Err(Error::Arity);
        }

        let name =
            codec::parse_string(&fields[0], "Quota root must be a string")?;
        let resources = codec::decode_status_resources(
            codec::parse_resource_list(&fields[1])?,
        )?;

        Ok(QuotaStatus {
            name: name.to_owned(),
            resources,
        })
    }

    pub fn to_fields(&self) -> Vec<Field<'static>> {
        vec![
            Field::atom(self.name.clone()),
            codec::encode_status_resources(&self.resources),
        ]
    }

    pub fn to_response(&self) -> UntaggedResponse<'static> {
        UntaggedResponse {
            name: Cow::Borrowed(RESPONSE_NAME),
            fields: self.to_fields(),
        }
    }
}

/// The quota roots of one mailbox, as reported by `QUOTAROOT`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailboxQuotaRoots {
    /// The UTF-8 mailbox name.
    pub name: String,
    /// The roots of the mailbox, in the order the server reported them.
    pub roots: Vec<String>,
}

impl MailboxQuotaRoots {
    /// Parse the fields of a `QUOTAROOT` response.
    ///
    /// A mailbox with no quota roots at all is legal.
    pub fn parse(fields: &[Field<'_>]) -> Result<Self, Error> {
        let name = codec::decode_mailbox(fields.first().ok_or(Error::Arity)?)?;
        let roots = fields[1..]
            .iter()
            .map(|f| {
                codec::parse_string(f, "Quota root must be a string")
                    .map(str::to_owned)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(MailboxQuotaRoots { name, roots })
    }

    pub fn to_fields(&self) -> Vec<Field<'static>> {
        let mut fields = Vec::with_capacity(1 + self.roots.len());
        fields.push(codec::encode_mailbox(&self.name));
        fields.extend(self.roots.iter().cloned().map(Field::atom));
        fields
    }

    pub fn to_response(&self) -> UntaggedResponse<'static> {
        UntaggedResponse {
            name: Cow::Borrowed(ROOT_RESPONSE_NAME),
            fields: self.to_fields(),
        }
    }
}

/// The `QUOTA` responses within the untagged responses of one command.
///
/// This is a lazy iterator: each response is only parsed when it is reached.
/// Responses with other names are skipped. After the first parse error, the
/// iterator yields nothing further.
#[derive(Clone, Debug)]
pub struct QuotaResponse<'r, 'a> {
    lines: slice::Iter<'r, UntaggedResponse<'a>>,
    failed: bool,
}

impl<'r, 'a> QuotaResponse<'r, 'a> {
    pub fn new(lines: &'r [UntaggedResponse<'a>]) -> Self {
        QuotaResponse {
            lines: lines.iter(),
            failed: false,
        }
    }

    /// Render one `QUOTA` response per status, in order.
    pub fn to_responses(
        statuses: &[QuotaStatus],
    ) -> Vec<UntaggedResponse<'static>> {
        statuses.iter().map(QuotaStatus::to_response).collect()
    }
}

impl Iterator for QuotaResponse<'_, '_> {
    type Item = Result<QuotaStatus, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        for line in &mut self.lines {
            if let Some(fields) = line.accept_named(RESPONSE_NAME) {
                let status = QuotaStatus::parse(fields);
                self.failed = status.is_err();
                return Some(status);
            }
        }

        None
    }
}

impl FusedIterator for QuotaResponse<'_, '_> {}

/// The combined result of a `GETQUOTAROOT` command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaRootListing {
    pub mailbox: MailboxQuotaRoots,
    /// The status of each root in `mailbox.roots`, in the same order.
    pub statuses: Vec<QuotaStatus>,
}

/// The `QUOTAROOT` response together with the `QUOTA` responses that follow
/// it in reply to `GETQUOTAROOT`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaRootResponse {
    pub mailbox: MailboxQuotaRoots,
    pub quotas: Vec<QuotaStatus>,
}

impl QuotaRootResponse {
    /// Collect the responses from the untagged responses of one command.
    ///
    /// Exactly one `QUOTAROOT` response must be present.
    pub fn parse(lines: &[UntaggedResponse<'_>]) -> Result<Self, Error> {
        let mut mailbox = None;
        for line in lines {
            if let Some(fields) = line.accept_named(ROOT_RESPONSE_NAME) {
                if mailbox.is_some() {
                    return Err(Error::ProtocolViolation(
                        "Expected exactly one QUOTAROOT response, got several"
                            .to_owned(),
                    ));
                }

                mailbox = Some(MailboxQuotaRoots::parse(fields)?);
            }
        }

        let mailbox = mailbox.ok_or_else(|| {
            Error::ProtocolViolation(
                "Expected exactly one QUOTAROOT response, got none".to_owned(),
            )
        })?;
        let quotas =
            QuotaResponse::new(lines).collect::<Result<Vec<_>, Error>>()?;

        Ok(QuotaRootResponse { mailbox, quotas })
    }

    /// Match each root of the mailbox with its `QUOTA` response.
    pub fn resolve(self) -> Result<QuotaRootListing, Error> {
        let by_name = self
            .quotas
            .into_iter()
            .map(|q| (q.name.clone(), q))
            .collect::<HashMap<_, _>>();

        let statuses = self
            .mailbox
            .roots
            .iter()
            .map(|root| {
                by_name.get(root).cloned().ok_or_else(|| {
                    Error::ProtocolViolation(format!(
                        "No QUOTA response for quota root {:?}",
                        root
                    ))
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(QuotaRootListing {
            mailbox: self.mailbox,
            statuses,
        })
    }
}
