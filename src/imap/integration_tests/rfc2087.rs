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

use std::collections::HashMap;

use super::defs::*;
use crate::imap::client::{QuotaClient, Session};
use crate::imap::codec::ResourceLimit;
use crate::imap::response::QuotaStatus;
use crate::imap::SessionState;
use crate::support::error::Error;
use crate::support::system_config::QuotaConfig;

#[test]
fn capability_declared() {
    let client = quick_client("2087capa");
    assert!(client.supports_quota().unwrap());
}

#[test]
fn capability_requires_login() {
    let mut session = connect("2087capl", nobody);
    assert_eq!(SessionState::NotAuthenticated, session.state());
    let caps = session.refresh_capabilities().unwrap().to_vec();
    assert!(caps.iter().any(|c| "IMAP4rev1" == c));

    let client = QuotaClient::new(session);
    assert!(!client.supports_quota().unwrap());
}

#[test]
fn capability_can_be_disabled() {
    let mut session = connect_with_config(
        "2087capd",
        memory_user,
        QuotaConfig {
            enabled: false,
            ..QuotaConfig::default()
        },
    );
    session.refresh_capabilities().unwrap();

    let mut client = QuotaClient::new(session);
    assert!(!client.supports_quota().unwrap());
    assert_matches!(
        Err(Error::CommandFailed {
            cond: s::RespCondType::Bad,
            ..
        }),
        client.get_quota("Root1")
    );
}

#[test]
fn get_quota() {
    let mut client = quick_client("2087getq");
    let status = client.get_quota("Root1").unwrap();

    let mut expected = HashMap::new();
    expected.insert(
        "STORAGE".to_owned(),
        ResourceLimit {
            usage: 10,
            limit: 512,
        },
    );
    expected.insert(
        "MESSAGE".to_owned(),
        ResourceLimit {
            usage: 3,
            limit: 1000,
        },
    );
    assert_eq!(
        QuotaStatus {
            name: "Root1".to_owned(),
            resources: expected,
        },
        status
    );

    assert_matches!(
        Err(Error::CommandFailed {
            cond: s::RespCondType::No,
            ..
        }),
        client.get_quota("Root3")
    );
}

#[test]
fn set_quota_replaces_all_limits() {
    let mut client = quick_client("2087setq");

    let (cond, untagged) = raw_command(
        client.session_mut(),
        "SETQUOTA",
        vec![
            s::Field::atom("Root1"),
            s::Field::List(vec![
                s::Field::atom("STORAGE"),
                s::Field::Number(1024),
            ]),
        ],
    );
    assert_eq!(s::RespCondType::Ok, cond);
    assert_eq!(1, untagged.len());
    assert_eq!("QUOTA", untagged[0].name);

    let status = client.get_quota("Root1").unwrap();
    assert_eq!(1, status.resources.len());
    assert_eq!(
        ResourceLimit {
            usage: 10,
            limit: 1024
        },
        status.resources["STORAGE"]
    );

    let mut resources = HashMap::new();
    resources.insert("MESSAGE".to_owned(), 5);
    client.set_quota("Root2", &resources).unwrap();
    let status = client.get_quota("Root2").unwrap();
    assert_eq!(1, status.resources.len());
    assert_eq!(
        ResourceLimit { usage: 0, limit: 5 },
        status.resources["MESSAGE"]
    );
}

#[test]
fn set_quota_too_many_resources() {
    let session = connect_with_config(
        "2087setm",
        memory_user,
        QuotaConfig {
            max_set_resources: 1,
            ..QuotaConfig::default()
        },
    );
    let mut client = QuotaClient::new(session);

    let mut resources = HashMap::new();
    resources.insert("STORAGE".to_owned(), 1);
    resources.insert("MESSAGE".to_owned(), 1);
    assert_matches!(
        Err(Error::CommandFailed {
            cond: s::RespCondType::No,
            ..
        }),
        client.set_quota("Root1", &resources)
    );
    assert_eq!(2, client.get_quota("Root1").unwrap().resources.len());
}

#[test]
fn get_quota_root() {
    let mut client = quick_client("2087getr");
    let listing = client.get_quota_root("INBOX").unwrap();

    assert_eq!("INBOX", listing.mailbox.name);
    assert_eq!(vec!["Root1", "Root2"], listing.mailbox.roots);
    assert_eq!(2, listing.statuses.len());
    assert_eq!("Root1", listing.statuses[0].name);
    assert_eq!(512, listing.statuses[0].resources["STORAGE"].limit);
    assert_eq!("Root2", listing.statuses[1].name);
    assert_eq!(2048, listing.statuses[1].resources["STORAGE"].limit);

    let listing = client.get_quota_root("日本語").unwrap();
    assert_eq!("日本語", listing.mailbox.name);
    assert_eq!(2, listing.statuses.len());

    let listing = client.get_quota_root("Archive").unwrap();
    assert!(listing.mailbox.roots.is_empty());
    assert!(listing.statuses.is_empty());

    assert_matches!(
        Err(Error::CommandFailed {
            cond: s::RespCondType::No,
            ..
        }),
        client.get_quota_root("Broken")
    );
}

#[test]
fn mailbox_name_on_the_wire() {
    let mut session = connect("2087mbwn", memory_user);

    session.write_raw(b"M1 GETQUOTAROOT &ZeVnLIqe-\r\n").unwrap();
    receive_line_like(
        &mut session,
        r#"^\* QUOTAROOT "&ZeVnLIqe-" Root1 Root2\r\n$"#,
    );
    receive_line_like(&mut session, r#"^\* QUOTA Root1 \("#);
    receive_line_like(&mut session, r#"^\* QUOTA Root2 \(STORAGE 0 2048\)"#);
    receive_line_like(&mut session, "^M1 OK");

    session.write_raw(b"M2 GETQUOTAROOT {5}\r\n").unwrap();
    receive_line_like(&mut session, r#"^\+ "#);
    session.write_raw(b"INBOX\r\n").unwrap();
    receive_line_like(&mut session, r#"^\* QUOTAROOT INBOX Root1 Root2\r\n$"#);
    receive_line_like(&mut session, r#"^\* QUOTA Root1 "#);
    receive_line_like(&mut session, r#"^\* QUOTA Root2 "#);
    receive_line_like(&mut session, "^M2 OK");

    session.write_raw(b"M3 GETQUOTAROOT &Jjo\r\n").unwrap();
    receive_line_like(&mut session, "^M3 BAD");
}

#[test]
fn unsupported_backend() {
    let mut session = connect("2087unsp", plain_user);
    session.refresh_capabilities().unwrap();

    for (name, args) in vec![
        ("GETQUOTA", vec![s::Field::atom("Root1")]),
        (
            "SETQUOTA",
            vec![
                s::Field::atom("Root1"),
                s::Field::List(vec![
                    s::Field::atom("STORAGE"),
                    s::Field::Number(1),
                ]),
            ],
        ),
        ("GETQUOTAROOT", vec![s::Field::atom("INBOX")]),
    ] {
        let (cond, untagged) = raw_command(&mut session, name, args);
        assert_eq!(s::RespCondType::No, cond);
        assert!(untagged.is_empty());
    }
}

#[test]
fn not_logged_in() {
    let mut session = connect("2087nlgi", nobody);

    let (cond, untagged) =
        raw_command(&mut session, "GETQUOTA", vec![s::Field::atom("Root1")]);
    assert_eq!(s::RespCondType::Bad, cond);
    assert!(untagged.is_empty());

    let mut client = QuotaClient::new(session);
    assert_matches!(Err(Error::NotAuthenticated), client.get_quota("Root1"));
    assert_matches!(
        Err(Error::NotAuthenticated),
        client.get_quota_root("INBOX")
    );
    assert_matches!(
        Err(Error::NotAuthenticated),
        client.set_quota("Root1", &HashMap::new())
    );

    // The connection is still usable
    client.session_mut().write_raw(b"X NOOP\r\n").unwrap();
    receive_line_like(client.session_mut(), "^X OK");
}

#[test]
fn bad_commands_keep_connection_open() {
    let mut session = connect("2087badc", memory_user);

    session.write_raw(b"B1 FROBNICATE\r\n").unwrap();
    receive_line_like(&mut session, "^B1 BAD");
    session.write_raw(b"B2 GETQUOTA (unclosed\r\n").unwrap();
    receive_line_like(&mut session, "^B2 BAD");
    session.write_raw(b"B3 SETQUOTA Root1 (STORAGE 4294967296)\r\n").unwrap();
    receive_line_like(&mut session, "^B3 BAD");

    session.write_raw(b"B4 GETQUOTA Root2\r\n").unwrap();
    receive_line_like(&mut session, r#"^\* QUOTA Root2 "#);
    receive_line_like(&mut session, "^B4 OK");

    session.write_raw(b"B5 LOGOUT\r\n").unwrap();
    receive_line_like(&mut session, r#"^\* BYE"#);
    receive_line_like(&mut session, "^B5 OK");
}
