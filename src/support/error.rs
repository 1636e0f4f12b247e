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

use std::io;

use thiserror::Error;

use crate::imap::syntax::RespCondType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed field: {0}")]
    MalformedField(&'static str),
    #[error("Not enough arguments")]
    Arity,
    #[error("Number out of range: {0}")]
    NumericRange(String),
    #[error("Invalid modified UTF-7: {0}")]
    Encoding(&'static str),
    #[error("Not logged in")]
    NotAuthenticated,
    #[error("Quota not supported by this server backend")]
    UnsupportedBackend,
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Capabilities not yet known")]
    CapabilitiesUnknown,
    #[error("Too many resources in one SETQUOTA (limit {0})")]
    TooManyResources(usize),
    #[error("Server returned {cond:?}: {quip}")]
    CommandFailed { cond: RespCondType, quip: String },
    #[error("Unparsable line: {0}")]
    Parse(String),
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error was caused by the syntax of something the peer
    /// sent, as opposed to the state of the session or the backend.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            *self,
            Error::MalformedField(..)
                | Error::Arity
                | Error::NumericRange(..)
                | Error::Encoding(..)
                | Error::Parse(..)
        )
    }
}
