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

//! The three commands of RFC 2087 section 4.

use std::borrow::Cow;
use std::collections::HashMap;

use super::codec;
use super::syntax::{CommandLine, Field};
use crate::support::error::Error;

pub const SET_COMMAND_NAME: &str = "SETQUOTA";
pub const GET_COMMAND_NAME: &str = "GETQUOTA";
pub const GET_ROOT_COMMAND_NAME: &str = "GETQUOTAROOT";

/// A command which can be rendered to and parsed from its wire arguments.
pub trait QuotaCommand: Sized {
    /// The command name as sent on the wire.
    const NAME: &'static str;

    /// Render the arguments of this command, not including the tag or name.
    fn to_fields(&self) -> Vec<Field<'static>>;

    /// Parse the arguments of this command.
    ///
    /// Extra trailing arguments are ignored.
    fn parse(fields: &[Field<'_>]) -> Result<Self, Error>;

    fn to_command_line<'a>(&self, tag: Cow<'a, str>) -> CommandLine<'a> {
        CommandLine {
            tag,
            name: Cow::Borrowed(Self::NAME),
            args: self.to_fields(),
        }
    }
}

/// The `SETQUOTA` command. See RFC 2087 section 4.1.
///
/// The limits given here replace *all* limits on the root; resources not
/// mentioned are discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCommand {
    pub root: String,
    pub resources: HashMap<String, u32>,
}

impl QuotaCommand for SetCommand {
    const NAME: &'static str = SET_COMMAND_NAME;

    fn to_fields(&self) -> Vec<Field<'static>> {
        vec![
            Field::atom(self.root.clone()),
            codec::encode_set_resources(&self.resources),
        ]
    }

    fn parse(fields: &[Field<'_>]) -> Result<Self, Error> {
        if fields.len() < 2 {
            return Err(Error::Arity);
        }

        let root =
            codec::parse_string(&fields[0], "Quota root must be a string")?;
        let resources = codec::decode_set_resources(
            codec::parse_resource_list(&fields[1])?,
        )?;

        Ok(SetCommand {
            root: root.to_owned(),
            resources,
        })
    }
}

/// The `GETQUOTA` command. See RFC 2087 section 4.2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetCommand {
    pub root: String,
}

impl QuotaCommand for GetCommand {
    const NAME: &'static str = GET_COMMAND_NAME;

    fn to_fields(&self) -> Vec<Field<'static>> {
        vec![Field::atom(self.root.clone())]
    }

    fn parse(fields: &[Field<'_>]) -> Result<Self, Error> {
        let root = fields.first().ok_or(Error::Arity)?;
        let root = codec::parse_string(root, "Quota root must be a string")?;

        Ok(GetCommand {
            root: root.to_owned(),
        })
    }
}

/// The `GETQUOTAROOT` command. See RFC 2087 section 4.3.
///
/// `mailbox` is always the UTF-8 form; modified UTF-7 only exists on the
/// wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetRootCommand {
    pub mailbox: String,
}

impl QuotaCommand for GetRootCommand {
    const NAME: &'static str = GET_ROOT_COMMAND_NAME;

    fn to_fields(&self) -> Vec<Field<'static>> {
        vec![codec::encode_mailbox(&self.mailbox)]
    }

    fn parse(fields: &[Field<'_>]) -> Result<Self, Error> {
        let mailbox = fields.first().ok_or(Error::Arity)?;

        Ok(GetRootCommand {
            mailbox: codec::decode_mailbox(mailbox)?,
        })
    }
}

/// Any of the QUOTA commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Set(SetCommand),
    Get(GetCommand),
    GetRoot(GetRootCommand),
}

impl Command {
    /// Parse the command named `name` with the given arguments.
    ///
    /// Returns `Ok(None)` if `name` is not one of the QUOTA commands.
    pub fn parse(
        name: &str,
        fields: &[Field<'_>],
    ) -> Result<Option<Self>, Error> {
        if SET_COMMAND_NAME.eq_ignore_ascii_case(name) {
            SetCommand::parse(fields).map(Command::Set).map(Some)
        } else if GET_COMMAND_NAME.eq_ignore_ascii_case(name) {
            GetCommand::parse(fields).map(Command::Get).map(Some)
        } else if GET_ROOT_COMMAND_NAME.eq_ignore_ascii_case(name) {
            GetRootCommand::parse(fields).map(Command::GetRoot).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Command::Set(..) => SetCommand::NAME,
            Command::Get(..) => GetCommand::NAME,
            Command::GetRoot(..) => GetRootCommand::NAME,
        }
    }

    pub fn to_fields(&self) -> Vec<Field<'static>> {
        match *self {
            Command::Set(ref c) => c.to_fields(),
            Command::Get(ref c) => c.to_fields(),
            Command::GetRoot(ref c) => c.to_fields(),
        }
    }
}
