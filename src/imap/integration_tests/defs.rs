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

use regex::bytes::Regex;

use crate::imap::client::{QuotaClient, Session, StreamSession};
use crate::imap::server::{QuotaExtension, QuotaServer, SessionUser};
use crate::imap::test_backend::{MemoryUser, PlainUser};
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::QuotaConfig;

pub(super) use crate::imap::syntax as s;

pub type PipeSession =
    StreamSession<io::BufReader<os_pipe::PipeReader>, os_pipe::PipeWriter>;
pub type PipeClient = QuotaClient<PipeSession>;

/// Produces the user a server starts out logged in as, if any.
pub type MakeUser = fn() -> Option<Box<dyn SessionUser>>;

pub fn memory_user() -> Option<Box<dyn SessionUser>> {
    Some(Box::new(MemoryUser::example()))
}

pub fn plain_user() -> Option<Box<dyn SessionUser>> {
    Some(Box::new(PlainUser))
}

pub fn nobody() -> Option<Box<dyn SessionUser>> {
    None
}

/// Start a server on its own thread and connect to it.
///
/// The greeting has already been consumed when this returns.
pub fn connect(name: &'static str, make_user: MakeUser) -> PipeSession {
    connect_with_config(name, make_user, QuotaConfig::default())
}

pub fn connect_with_config(
    name: &'static str,
    make_user: MakeUser,
    config: QuotaConfig,
) -> PipeSession {
    crate::init_test_log();

    let (server_in, client_out) = os_pipe::pipe().unwrap();
    let (client_in, server_out) = os_pipe::pipe().unwrap();

    std::thread::spawn(move || {
        let mut server = QuotaServer::new(
            io::BufReader::new(server_in),
            server_out,
            QuotaExtension::new(config),
            LogPrefix::new(format!("imap:{}", name)),
        );
        if let Some(user) = make_user() {
            server.log_in(user);
        }

        match server.run() {
            Ok(()) => (),
            Err(Error::Io(e))
                if io::ErrorKind::UnexpectedEof == e.kind()
                    || io::ErrorKind::BrokenPipe == e.kind() => {}
            Err(e) => panic!("Unexpected server error: {}", e),
        }
    });

    let mut session = StreamSession::new(
        io::BufReader::new(client_in),
        client_out,
        Some(name),
    );
    session.greet().unwrap();
    session
}

/// Connect as the in-memory user and negotiate capabilities.
pub fn quick_client(name: &'static str) -> PipeClient {
    let mut session = connect(name, memory_user);
    session.refresh_capabilities().unwrap();
    QuotaClient::new(session)
}

pub fn receive_line_like(session: &mut PipeSession, pat: &str) {
    let mut buf = Vec::new();
    session.read_logical_line(&mut buf).unwrap();
    assert!(
        Regex::new(pat).unwrap().is_match(&buf),
        "Expected\n\
         match: {:?}\n\
         Got:   {:?}\n",
        pat,
        String::from_utf8_lossy(&buf)
    );
}

/// Run a raw command and return its completion condition and untagged
/// responses.
pub fn raw_command(
    session: &mut PipeSession,
    name: &str,
    args: Vec<s::Field<'static>>,
) -> (s::RespCondType, Vec<s::UntaggedResponse<'static>>) {
    let exchange = session.execute(name, args).unwrap();
    (exchange.status.cond, exchange.untagged)
}
