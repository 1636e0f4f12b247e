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

//! The client side of the QUOTA extension.
//!
//! `QuotaClient` knows nothing about connections. It is layered over a
//! `Session`, which is whatever can send one command and collect the untagged
//! responses and tagged completion that come back. `StreamSession` is a
//! simple `Session` speaking IMAP over any `BufRead`/`Write` pair.
//!
//! **`StreamSession` IS NOT A GENERAL-PURPOSE IMAP CLIENT.** It understands
//! exactly as much of the protocol as is needed to drive the QUOTA commands:
//! it assumes the server supports `LITERAL+`, ignores response codes, and
//! does not track mailbox state. Authentication is somebody else's problem;
//! whoever does it must tell the session via `set_state`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::str;

use lazy_static::lazy_static;
use regex::bytes::Regex;

use super::codec::CAPABILITY;
use super::command::{GetCommand, GetRootCommand, QuotaCommand, SetCommand};
use super::lex::LexWriter;
use super::response::{
    QuotaResponse, QuotaRootListing, QuotaRootResponse, QuotaStatus,
};
use super::syntax::{
    parse_response_line, CommandLine, Field, RespCondType, ResponseLine,
    Status, UntaggedResponse,
};
use super::SessionState;
use crate::support::error::Error;

lazy_static! {
    static ref LITERAL_AT_EOL: Regex =
        Regex::new(r#"~?\{([0-9]+)\+?\}\r\n$"#).unwrap();
}

/// Everything the server sent in reply to one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    /// Untagged data responses, in the order received. Untagged status
    /// responses (`* OK`, `* BYE`, etc) are not included.
    pub untagged: Vec<UntaggedResponse<'static>>,
    /// The tagged completion.
    pub status: Status<'static>,
}

impl Exchange {
    /// Return the untagged responses if the command completed with `OK`, and
    /// `Error::CommandFailed` otherwise.
    pub fn into_result(self) -> Result<Vec<UntaggedResponse<'static>>, Error> {
        if RespCondType::Ok == self.status.cond {
            Ok(self.untagged)
        } else {
            Err(Error::CommandFailed {
                cond: self.status.cond,
                quip: self.status.quip.into_owned(),
            })
        }
    }
}

/// A channel over which commands can be issued to a server.
pub trait Session {
    /// The current connection state.
    fn state(&self) -> SessionState;

    /// The capabilities most recently advertised by the server, or `None` if
    /// they are not known for the current state.
    fn capabilities(&self) -> Option<&[String]>;

    /// Send the command `name` with the given arguments and wait for its
    /// tagged completion.
    fn execute(
        &mut self,
        name: &str,
        args: Vec<Field<'static>>,
    ) -> Result<Exchange, Error>;
}

/// A `Session` over a byte stream.
pub struct StreamSession<R, W> {
    read: R,
    write: W,
    trace_stderr: Option<&'static str>,
    next_tag: u64,
    state: SessionState,
    capabilities: Option<Vec<String>>,
}

impl<R: BufRead, W: Write> StreamSession<R, W> {
    /// Create a new session in the not-authenticated state.
    ///
    /// If `trace_stderr` is given, everything sent and received is dumped to
    /// standard error with that prefix.
    pub fn new(read: R, write: W, trace_stderr: Option<&'static str>) -> Self {
        StreamSession {
            read,
            write,
            trace_stderr,
            next_tag: 0,
            state: SessionState::NotAuthenticated,
            capabilities: None,
        }
    }

    /// Read the server greeting.
    ///
    /// A `PREAUTH` greeting moves the session directly into the authenticated
    /// state. A `BYE` greeting fails with `CommandFailed`.
    pub fn greet(&mut self) -> Result<(), Error> {
        let mut buf = Vec::new();
        self.read_logical_line(&mut buf)?;

        let status = match parse_response_line(&buf[..buf.len() - 2])? {
            ResponseLine::UntaggedStatus(status) => status,
            r => {
                return Err(Error::ProtocolViolation(format!(
                    "Expected greeting, got {:?}",
                    r
                )))
            }
        };

        match status.cond {
            RespCondType::Ok => self.set_state(SessionState::NotAuthenticated),
            RespCondType::Preauth => {
                self.set_state(SessionState::Authenticated)
            }
            cond => {
                self.state = SessionState::Logout;
                return Err(Error::CommandFailed {
                    cond,
                    quip: status.quip.into_owned(),
                });
            }
        }

        Ok(())
    }

    /// Record a state transition made by some external means (e.g., `LOGIN`
    /// performed through `execute`).
    ///
    /// Capabilities are forgotten, since servers are allowed to advertise
    /// different ones in each state.
    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.capabilities = None;
    }

    /// Issue `CAPABILITY` and return the new capability list.
    pub fn refresh_capabilities(&mut self) -> Result<&[String], Error> {
        self.execute("CAPABILITY", vec![])?.into_result()?;
        self.capabilities.as_deref().ok_or_else(|| {
            Error::ProtocolViolation(
                "No CAPABILITY response to CAPABILITY".to_owned(),
            )
        })
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.trace(true, ">>[raw]", bytes);
        self.write.write_all(bytes)?;
        self.write.flush()?;
        Ok(())
    }

    fn read_line_raw(&mut self, dst: &mut Vec<u8>) -> Result<usize, Error> {
        let start = dst.len();
        let nread = self.read.read_until(b'\n', dst)?;
        self.trace(false, "<<[eol]", &dst[start..]);
        Ok(nread)
    }

    fn read_data_raw(
        &mut self,
        dst: &mut Vec<u8>,
        n: u32,
    ) -> Result<usize, Error> {
        let start = dst.len();
        let nread = self.read.by_ref().take(n.into()).read_to_end(dst)?;
        self.trace(true, "<<[lit]", &dst[start..]);
        if n as usize > nread {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Hit EOF before end of literal",
            )));
        }

        Ok(nread)
    }

    /// Read one line into `dst`, including any literals it contains.
    ///
    /// The final CRLF is left in `dst`.
    pub fn read_logical_line(
        &mut self,
        dst: &mut Vec<u8>,
    ) -> Result<(), Error> {
        loop {
            let nread = self.read_line_raw(dst)?;
            if !dst.ends_with(b"\r\n") {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Line didn't end with CRLF",
                )));
            }

            let literal_len = LITERAL_AT_EOL
                .captures(&dst[dst.len() - nread..])
                .and_then(|cap| cap.get(1))
                .and_then(|len| str::from_utf8(len.as_bytes()).ok())
                .and_then(|len| len.parse::<u32>().ok());

            if let Some(literal_len) = literal_len {
                self.read_data_raw(dst, literal_len)?;
            } else {
                break;
            }
        }

        Ok(())
    }

    fn trace(&self, truncate: bool, what: &str, data: &[u8]) {
        if let Some(prefix) = self.trace_stderr {
            if data.is_empty() {
                eprintln!("{} WIRE {}<empty>", prefix, what);
                return;
            }

            let (data, truncated) = if truncate {
                data.split_at(data.len().min(128))
            } else {
                (data, &[] as &[u8])
            };

            let mut start = 0;
            for split in memchr::memchr_iter(b'\n', data)
                .chain(std::iter::once(data.len() - 1))
            {
                if split < start {
                    continue;
                }

                let data = &data[start..=split];
                start = split + 1;

                let mut vis = String::new();
                for &byte in data {
                    match byte {
                        b' '..=b'~' => vis.push(byte as char),
                        b'\n' => vis.push_str("\\n"),
                        b'\r' => vis.push_str("\\r"),
                        b => vis.push_str(&format!("\\x{:02X}", b)),
                    }
                }

                eprintln!("{} WIRE {} {}", prefix, what, vis);
            }

            if !truncated.is_empty() {
                eprintln!(
                    "{} WIRE {}<{} more bytes>",
                    prefix,
                    what,
                    truncated.len()
                );
            }
        }
    }
}

impl<R: BufRead, W: Write> Session for StreamSession<R, W> {
    fn state(&self) -> SessionState {
        self.state
    }

    fn capabilities(&self) -> Option<&[String]> {
        self.capabilities.as_deref()
    }

    fn execute(
        &mut self,
        name: &str,
        args: Vec<Field<'static>>,
    ) -> Result<Exchange, Error> {
        let tag = format!("{}", self.next_tag);
        self.next_tag += 1;

        let mut command_buffer = Vec::<u8>::new();
        CommandLine {
            tag: Cow::Borrowed(&tag),
            name: Cow::Borrowed(name),
            args,
        }
        .write_to(&mut LexWriter::new(&mut command_buffer, false, true))?;
        command_buffer.extend_from_slice(b"\r\n");

        self.trace(false, ">>[cmd]", &command_buffer);
        self.write.write_all(&command_buffer)?;
        self.write.flush()?;

        let mut untagged = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            self.read_logical_line(&mut buf)?;

            // Continuation requests; nothing here needs them.
            if buf.starts_with(b"+") {
                continue;
            }

            match parse_response_line(&buf[..buf.len() - 2])?.into_owned() {
                ResponseLine::Untagged(r) => {
                    if let Some(caps) = r.accept_named("CAPABILITY") {
                        self.capabilities = Some(
                            caps.iter()
                                .filter_map(Field::as_str)
                                .map(str::to_owned)
                                .collect(),
                        );
                    }
                    untagged.push(r);
                }

                ResponseLine::UntaggedStatus(status) => {
                    if RespCondType::Bye == status.cond {
                        self.state = SessionState::Logout;
                    }
                }

                ResponseLine::Tagged {
                    tag: resp_tag,
                    status,
                } => {
                    if resp_tag != tag {
                        return Err(Error::ProtocolViolation(format!(
                            "Expected completion of {}, got {}",
                            tag, resp_tag
                        )));
                    }

                    return Ok(Exchange { untagged, status });
                }
            }
        }
    }
}

/// Issues QUOTA commands over a `Session`.
pub struct QuotaClient<S> {
    session: S,
}

impl<S: Session> QuotaClient<S> {
    pub fn new(session: S) -> Self {
        QuotaClient { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_inner(self) -> S {
        self.session
    }

    /// Whether the server advertises the QUOTA capability.
    ///
    /// This only looks at what the session already knows; it fails with
    /// `CapabilitiesUnknown` rather than asking the server.
    pub fn supports_quota(&self) -> Result<bool, Error> {
        self.session
            .capabilities()
            .map(|caps| caps.iter().any(|c| CAPABILITY.eq_ignore_ascii_case(c)))
            .ok_or(Error::CapabilitiesUnknown)
    }

    /// Replace all limits of `root` with `resources`.
    pub fn set_quota(
        &mut self,
        root: &str,
        resources: &HashMap<String, u32>,
    ) -> Result<(), Error> {
        self.run(&SetCommand {
            root: root.to_owned(),
            resources: resources.clone(),
        })?;
        Ok(())
    }

    /// Fetch the status of `root`.
    pub fn get_quota(&mut self, root: &str) -> Result<QuotaStatus, Error> {
        let untagged = self.run(&GetCommand {
            root: root.to_owned(),
        })?;

        let mut statuses = QuotaResponse::new(&untagged)
            .collect::<Result<Vec<_>, Error>>()?;
        if 1 != statuses.len() {
            return Err(Error::ProtocolViolation(format!(
                "Expected exactly one QUOTA response, got {}",
                statuses.len()
            )));
        }

        Ok(statuses.remove(0))
    }

    /// Fetch the quota roots of `mailbox` and the status of each.
    pub fn get_quota_root(
        &mut self,
        mailbox: &str,
    ) -> Result<QuotaRootListing, Error> {
        let untagged = self.run(&GetRootCommand {
            mailbox: mailbox.to_owned(),
        })?;
        QuotaRootResponse::parse(&untagged)?.resolve()
    }

    fn run<C: QuotaCommand>(
        &mut self,
        cmd: &C,
    ) -> Result<Vec<UntaggedResponse<'static>>, Error> {
        if !self.session.state().is_authenticated() {
            return Err(Error::NotAuthenticated);
        }

        self.session.execute(C::NAME, cmd.to_fields())?.into_result()
    }
}
