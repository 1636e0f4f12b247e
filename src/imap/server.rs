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

//! The server side of the QUOTA extension.
//!
//! `QuotaExtension` is meant to be hosted by a larger server: the host hands
//! it every command line, and it either declines (the command is not one of
//! ours) or runs the command against the connection's backend and returns the
//! tagged completion. `QuotaServer` is a minimal host which understands
//! nothing but the QUOTA commands, `CAPABILITY`, `NOOP` and `LOGOUT`.
//!
//! Backends opt into quota support per object: a `SessionUser` that can
//! answer quota queries returns itself from `as_quota_user`, and likewise for
//! `SessionMailbox::as_quota_mailbox`. Objects that don't cause the commands
//! to fail with `NO` instead of being silently ignored.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::str;

use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::bytes::Regex;

use super::codec::CAPABILITY;
use super::command::{
    GetCommand, GetRootCommand, QuotaCommand, SetCommand, GET_COMMAND_NAME,
    GET_ROOT_COMMAND_NAME, SET_COMMAND_NAME,
};
use super::lex::LexWriter;
use super::response::{MailboxQuotaRoots, QuotaStatus};
use super::syntax::{
    parse_command_line, CommandLine, Field, RespCondType, ResponseLine,
    Status, UntaggedResponse,
};
use super::SessionState;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::QuotaConfig;

const MAX_CMDLINE: usize = 65536;

lazy_static! {
    static ref LITERAL_AT_EOL: Regex =
        Regex::new(r#"~?\{([0-9]+)\+?\}$"#).unwrap();
}

/// Quota operations on behalf of one user.
pub trait User {
    /// Return the usage and limits of `root`.
    fn get_quota(&mut self, root: &str) -> Result<QuotaStatus, Error>;

    /// Replace all limits of `root` with `resources`.
    fn set_quota(
        &mut self,
        root: &str,
        resources: &HashMap<String, u32>,
    ) -> Result<(), Error>;
}

/// Quota operations on one mailbox.
pub trait Mailbox {
    /// Return the names of the quota roots of this mailbox, in the order they
    /// should be reported.
    fn list_quotas(&self) -> Result<Vec<String>, Error>;
}

/// The backend's view of the logged-in user of a connection.
pub trait SessionUser {
    fn username(&self) -> &str;

    /// Open the mailbox with the given UTF-8 name.
    fn mailbox(&mut self, name: &str) -> Result<Box<dyn SessionMailbox>, Error>;

    /// Return the quota interface of this user, if the backend has one.
    fn as_quota_user(&mut self) -> Option<&mut dyn User> {
        None
    }
}

/// The backend's view of a mailbox.
pub trait SessionMailbox {
    /// Return the quota interface of this mailbox, if the backend has one.
    fn as_quota_mailbox(&self) -> Option<&dyn Mailbox> {
        None
    }
}

/// What the extension needs from the connection hosting it.
pub trait Connection {
    fn state(&self) -> SessionState;

    /// The logged-in user, if any.
    fn user(&mut self) -> Option<&mut dyn SessionUser>;

    /// Send an untagged response to the client immediately.
    fn send(&mut self, response: UntaggedResponse<'static>)
        -> Result<(), Error>;

    fn log_prefix(&self) -> &LogPrefix;
}

/// Identifies which handler runs a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Set,
    Get,
    GetRoot,
}

impl HandlerKind {
    pub fn command_name(self) -> &'static str {
        match self {
            HandlerKind::Set => SET_COMMAND_NAME,
            HandlerKind::Get => GET_COMMAND_NAME,
            HandlerKind::GetRoot => GET_ROOT_COMMAND_NAME,
        }
    }
}

/// Runs one kind of command against a connection.
///
/// All untagged output is sent through the connection before `handle`
/// returns; the tagged completion is left to the caller.
pub trait Handler {
    type Command: QuotaCommand;

    fn handle(
        config: &QuotaConfig,
        cmd: &Self::Command,
        conn: &mut dyn Connection,
    ) -> Result<(), Error>;
}

pub struct SetHandler;
pub struct GetHandler;
pub struct GetRootHandler;

impl Handler for SetHandler {
    type Command = SetCommand;

    fn handle(
        config: &QuotaConfig,
        cmd: &SetCommand,
        conn: &mut dyn Connection,
    ) -> Result<(), Error> {
        let user = quota_user(conn)?;
        if cmd.resources.len() > config.max_set_resources {
            return Err(Error::TooManyResources(config.max_set_resources));
        }

        user.set_quota(&cmd.root, &cmd.resources)?;
        info!(
            "{} Set quota on {:?} ({} resources)",
            conn.log_prefix(),
            cmd.root,
            cmd.resources.len()
        );

        // RFC 2087 doesn't require the new status to be returned, but clients
        // generally expect it.
        GetHandler::handle(
            config,
            &GetCommand {
                root: cmd.root.clone(),
            },
            conn,
        )
    }
}

impl Handler for GetHandler {
    type Command = GetCommand;

    fn handle(
        _: &QuotaConfig,
        cmd: &GetCommand,
        conn: &mut dyn Connection,
    ) -> Result<(), Error> {
        let status = quota_user(conn)?.get_quota(&cmd.root)?;
        conn.send(status.to_response())
    }
}

impl Handler for GetRootHandler {
    type Command = GetRootCommand;

    fn handle(
        _: &QuotaConfig,
        cmd: &GetRootCommand,
        conn: &mut dyn Connection,
    ) -> Result<(), Error> {
        let roots = {
            let user = session_user(conn)?;
            if user.as_quota_user().is_none() {
                return Err(Error::UnsupportedBackend);
            }

            let mailbox = user.mailbox(&cmd.mailbox)?;
            let quota_mailbox = mailbox
                .as_quota_mailbox()
                .ok_or(Error::UnsupportedBackend)?;
            quota_mailbox.list_quotas()?
        };

        conn.send(
            MailboxQuotaRoots {
                name: cmd.mailbox.clone(),
                roots: roots.clone(),
            }
            .to_response(),
        )?;

        for root in &roots {
            let status = quota_user(conn)?.get_quota(root)?;
            conn.send(status.to_response())?;
        }

        Ok(())
    }
}

fn session_user(
    conn: &mut dyn Connection,
) -> Result<&mut dyn SessionUser, Error> {
    if !conn.state().is_authenticated() {
        return Err(Error::NotAuthenticated);
    }

    conn.user().ok_or(Error::NotAuthenticated)
}

fn quota_user(conn: &mut dyn Connection) -> Result<&mut dyn User, Error> {
    session_user(conn)?
        .as_quota_user()
        .ok_or(Error::UnsupportedBackend)
}

/// The QUOTA extension, ready to be hosted by a server.
#[derive(Clone, Debug, Default)]
pub struct QuotaExtension {
    config: QuotaConfig,
}

impl QuotaExtension {
    pub fn new(config: QuotaConfig) -> Self {
        QuotaExtension { config }
    }

    /// The capabilities this extension adds in the current state of `conn`.
    pub fn capabilities(&self, conn: &dyn Connection) -> Vec<&'static str> {
        if self.config.enabled && conn.state().is_authenticated() {
            vec![CAPABILITY]
        } else {
            vec![]
        }
    }

    /// Determine which handler, if any, runs the command named `name`.
    pub fn dispatch(&self, name: &str) -> Option<HandlerKind> {
        if !self.config.enabled {
            return None;
        }

        [HandlerKind::Set, HandlerKind::Get, HandlerKind::GetRoot]
            .iter()
            .copied()
            .find(|k| k.command_name().eq_ignore_ascii_case(name))
    }

    /// Run `line` if it is one of the QUOTA commands.
    ///
    /// Returns `None` if the command is not ours, and the tagged completion
    /// otherwise.
    pub fn handle_command(
        &self,
        line: &CommandLine<'_>,
        conn: &mut dyn Connection,
    ) -> Option<ResponseLine<'static>> {
        let kind = self.dispatch(&line.name)?;
        let result = match kind {
            HandlerKind::Set => self.run::<SetHandler>(&line.args, conn),
            HandlerKind::Get => self.run::<GetHandler>(&line.args, conn),
            HandlerKind::GetRoot => {
                self.run::<GetRootHandler>(&line.args, conn)
            }
        };

        Some(ResponseLine::Tagged {
            tag: Cow::Owned(line.tag.clone().into_owned()),
            status: completion(kind, result, conn.log_prefix()),
        })
    }

    fn run<H: Handler>(
        &self,
        args: &[Field<'_>],
        conn: &mut dyn Connection,
    ) -> Result<(), Error> {
        let cmd = H::Command::parse(args)?;
        H::handle(&self.config, &cmd, conn)
    }
}

fn completion(
    kind: HandlerKind,
    result: Result<(), Error>,
    log_prefix: &LogPrefix,
) -> Status<'static> {
    let name = kind.command_name();
    match result {
        Ok(()) => Status {
            cond: RespCondType::Ok,
            quip: Cow::Owned(format!("{} completed", name)),
        },
        Err(e) if e.is_parse_error() => {
            warn!("{} Rejected bad {}: {}", log_prefix, name, e);
            Status {
                cond: RespCondType::Bad,
                quip: Cow::Owned(e.to_string()),
            }
        }
        Err(Error::NotAuthenticated) => Status {
            cond: RespCondType::Bad,
            quip: Cow::Borrowed("Not logged in"),
        },
        Err(e @ Error::UnsupportedBackend) => {
            error!("{} {} failed: {}", log_prefix, name, e);
            Status {
                cond: RespCondType::No,
                quip: Cow::Owned(e.to_string()),
            }
        }
        Err(e) => {
            warn!("{} {} failed: {}", log_prefix, name, e);
            Status {
                cond: RespCondType::No,
                quip: Cow::Owned(e.to_string()),
            }
        }
    }
}

/// The `Connection` of a `QuotaServer`.
struct StreamConnection<W> {
    write: W,
    state: SessionState,
    user: Option<Box<dyn SessionUser>>,
    log_prefix: LogPrefix,
}

impl<W: Write> StreamConnection<W> {
    fn send_line(&mut self, line: &ResponseLine<'_>) -> Result<(), Error> {
        let mut buf = Vec::<u8>::new();
        line.write_to(&mut LexWriter::new(&mut buf, false, false))?;
        buf.extend_from_slice(b"\r\n");
        self.write.write_all(&buf)?;
        self.write.flush()?;
        Ok(())
    }
}

impl<W: Write> Connection for StreamConnection<W> {
    fn state(&self) -> SessionState {
        self.state
    }

    fn user(&mut self) -> Option<&mut dyn SessionUser> {
        match self.user {
            Some(ref mut user) => Some(&mut **user),
            None => None,
        }
    }

    fn send(
        &mut self,
        response: UntaggedResponse<'static>,
    ) -> Result<(), Error> {
        self.send_line(&ResponseLine::Untagged(response))
    }

    fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }
}

/// A bare-bones IMAP server hosting only the QUOTA extension.
///
/// Authentication is done by the embedder before the session starts, via
/// `log_in`; a session that starts logged in is greeted with `PREAUTH`.
pub struct QuotaServer<R, W> {
    read: R,
    conn: StreamConnection<W>,
    extension: QuotaExtension,
}

impl<R: BufRead, W: Write> QuotaServer<R, W> {
    pub fn new(
        read: R,
        write: W,
        extension: QuotaExtension,
        log_prefix: LogPrefix,
    ) -> Self {
        QuotaServer {
            read,
            conn: StreamConnection {
                write,
                state: SessionState::NotAuthenticated,
                user: None,
                log_prefix,
            },
            extension,
        }
    }

    /// Attach `user` to the session, moving it to the authenticated state.
    pub fn log_in(&mut self, user: Box<dyn SessionUser>) {
        self.conn.log_prefix.set_user(user.username().to_owned());
        info!("{} Logged in", self.conn.log_prefix);
        self.conn.user = Some(user);
        self.conn.state = SessionState::Authenticated;
    }

    /// Run the server.
    ///
    /// Blocks until an error occurs, the client logs out, or the client
    /// sends something that can't be recovered from.
    pub fn run(&mut self) -> Result<(), Error> {
        self.send_status(
            None,
            if self.conn.state.is_authenticated() {
                RespCondType::Preauth
            } else {
                RespCondType::Ok
            },
            "QUOTA server ready",
        )?;

        let mut cmdline = Vec::<u8>::new();
        while SessionState::Logout != self.conn.state {
            cmdline.clear();
            if !self.read_command(&mut cmdline)? {
                return Ok(());
            }

            let line = match parse_command_line(&cmdline) {
                Ok(line) => line,
                Err(e) => {
                    warn!("{} Bad command line: {}", self.conn.log_prefix, e);
                    if let Some(tag) = command_tag(&cmdline) {
                        let tag = tag.to_owned();
                        self.send_status(
                            Some(tag),
                            RespCondType::Bad,
                            "Unrecognised command syntax",
                        )?;
                        continue;
                    } else {
                        self.send_status(
                            None,
                            RespCondType::Bye,
                            "That doesn't look anything like \
                             an IMAP command!",
                        )?;
                        return Ok(());
                    }
                }
            };

            if let Some(response) =
                self.extension.handle_command(&line, &mut self.conn)
            {
                self.conn.send_line(&response)?;
                continue;
            }

            let tag = line.tag.clone().into_owned();
            if "CAPABILITY".eq_ignore_ascii_case(&line.name) {
                let mut caps = vec![
                    Field::atom("IMAP4rev1"),
                    Field::atom("LITERAL+"),
                ];
                caps.extend(
                    self.extension
                        .capabilities(&self.conn)
                        .into_iter()
                        .map(Field::atom),
                );
                self.conn.send(UntaggedResponse {
                    name: Cow::Borrowed("CAPABILITY"),
                    fields: caps,
                })?;
                self.send_status(
                    Some(tag),
                    RespCondType::Ok,
                    "CAPABILITY completed",
                )?;
            } else if "NOOP".eq_ignore_ascii_case(&line.name) {
                self.send_status(
                    Some(tag),
                    RespCondType::Ok,
                    "NOOP completed",
                )?;
            } else if "LOGOUT".eq_ignore_ascii_case(&line.name) {
                self.send_status(None, RespCondType::Bye, "Logging out")?;
                self.send_status(
                    Some(tag),
                    RespCondType::Ok,
                    "LOGOUT completed",
                )?;
                self.conn.state = SessionState::Logout;
                info!("{} Logged out", self.conn.log_prefix);
            } else {
                self.send_status(
                    Some(tag),
                    RespCondType::Bad,
                    "Unknown command",
                )?;
            }
        }

        Ok(())
    }

    fn send_status(
        &mut self,
        tag: Option<String>,
        cond: RespCondType,
        quip: &'static str,
    ) -> Result<(), Error> {
        let status = Status {
            cond,
            quip: Cow::Borrowed(quip),
        };
        self.conn.send_line(&match tag {
            Some(tag) => ResponseLine::Tagged {
                tag: Cow::Owned(tag),
                status,
            },
            None => ResponseLine::UntaggedStatus(status),
        })
    }

    /// Read one full command, including any literals, into `cmdline`.
    ///
    /// Literals are left inline, each preceded by its CRLF; the final line
    /// ending is removed.
    ///
    /// Returns `false` if the client hung up between commands or has been
    /// disconnected for sending an overlong command.
    fn read_command(&mut self, cmdline: &mut Vec<u8>) -> Result<bool, Error> {
        loop {
            let nread = match self.buffer_next_line(cmdline)? {
                Some(n) => n,
                None => return Ok(false),
            };

            let (length, literal_plus) =
                match check_literal(&cmdline[cmdline.len() - nread..]) {
                    Some(literal) => literal,
                    None => return Ok(true),
                };

            cmdline.extend_from_slice(b"\r\n");
            if length as usize + cmdline.len() > MAX_CMDLINE {
                self.send_status(
                    None,
                    RespCondType::Bye,
                    "Command line too long",
                )?;
                return Ok(false);
            }

            if !literal_plus {
                self.conn.write.write_all(b"+ go\r\n")?;
                self.conn.write.flush()?;
            }

            let nread = self
                .read
                .by_ref()
                .take(length.into())
                .read_to_end(cmdline)?;
            if nread != length as usize {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF reading literal",
                )));
            }
        }
    }

    /// Read the next line, appending it to `cmdline`.
    ///
    /// Returns the number of bytes added to `cmdline`, or `None` if the
    /// connection should be dropped.
    ///
    /// Both DOS newlines and sane newlines are accepted. The line ending is
    /// removed from the buffer.
    fn buffer_next_line(
        &mut self,
        cmdline: &mut Vec<u8>,
    ) -> Result<Option<usize>, Error> {
        let start = cmdline.len();
        let mut nread = self
            .read
            .by_ref()
            .take(MAX_CMDLINE as u64)
            .read_until(b'\n', cmdline)?;

        if 0 == nread {
            if 0 == start {
                info!("{} Client disconnected", self.conn.log_prefix);
                return Ok(None);
            }

            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "EOF reached before reading full line",
            )));
        }

        if cmdline.len() > MAX_CMDLINE || !cmdline.ends_with(b"\n") {
            self.send_status(None, RespCondType::Bye, "Command line too long")?;
            return Ok(None);
        }

        // Drop ending LF
        cmdline.pop();
        nread -= 1;
        // If there's an ending CR, drop that too
        if cmdline.ends_with(b"\r") {
            cmdline.pop();
            nread -= 1;
        }

        Ok(Some(nread))
    }
}

/// Check whether `line` ends with a literal, returning its length and whether
/// it is non-synchronising.
fn check_literal(line: &[u8]) -> Option<(u32, bool)> {
    LITERAL_AT_EOL.captures(line).and_then(|c| {
        let m0 = c.get(0)?;
        let len = str::from_utf8(c.get(1)?.as_bytes()).ok()?;
        let len = len.parse::<u32>().ok()?;
        Some((len, m0.as_bytes().contains(&b'+')))
    })
}

/// Extract the tag of an unparsable command line, if it has one that can be
/// used to respond.
fn command_tag(cmdline: &[u8]) -> Option<&str> {
    let tag = cmdline.split(|&b| b' ' == b).next()?;
    if tag.is_empty()
        || tag.iter().any(|&b| {
            b <= b' '
                || b >= 127
                || matches!(
                    b,
                    b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' | b'+'
                )
        })
    {
        return None;
    }

    str::from_utf8(tag).ok()
}
