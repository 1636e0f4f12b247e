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

//! Mapping between generic `Field`s and the values of the QUOTA extension.
//!
//! Everything here fails fast: the first bad field aborts decoding of the
//! whole message.

use std::borrow::Cow;
use std::collections::HashMap;

use super::syntax::Field;
use crate::mime::utf7;
use crate::support::error::Error;

/// The capability advertised by servers supporting RFC 2087.
pub const CAPABILITY: &str = "QUOTA";

/// Sum of messages' RFC822.SIZE, in units of 1024 octets.
pub const RESOURCE_STORAGE: &str = "STORAGE";
/// Number of messages.
pub const RESOURCE_MESSAGE: &str = "MESSAGE";

/// The current usage and configured limit of one resource.
///
/// There is no requirement that `usage <= limit`. A backend may well report
/// a root that is over its quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceLimit {
    pub usage: u32,
    pub limit: u32,
}

/// Interpret `field` as a non-negative 32-bit number.
pub fn parse_number(field: &Field<'_>) -> Result<u32, Error> {
    match *field {
        Field::Number(n) => Ok(n),
        Field::Atom(ref s) | Field::String(ref s) => {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::NumericRange(s.clone().into_owned()));
            }

            s.parse::<u32>()
                .map_err(|_| Error::NumericRange(s.clone().into_owned()))
        }
        Field::List(_) | Field::Nil => {
            Err(Error::MalformedField("Expected a number"))
        }
    }
}

/// Interpret `field` as a string (atom or string form), failing with
/// `what` as the explanation if it is anything else.
pub fn parse_string<'f>(
    field: &'f Field<'_>,
    what: &'static str,
) -> Result<&'f str, Error> {
    field.as_str().ok_or(Error::MalformedField(what))
}

/// Interpret `field` as a parenthesised resource list.
pub fn parse_resource_list<'f, 'a>(
    field: &'f Field<'a>,
) -> Result<&'f [Field<'a>], Error> {
    match *field {
        Field::List(ref l) => Ok(l),
        _ => Err(Error::MalformedField("Resources must be a list")),
    }
}

/// Decode a flat `(name usage limit ...)` list as found in `QUOTA`
/// responses.
pub fn decode_status_resources(
    fields: &[Field<'_>],
) -> Result<HashMap<String, ResourceLimit>, Error> {
    if 0 != fields.len() % 3 {
        return Err(Error::MalformedField(
            "Resource list is not made of name/usage/limit triples",
        ));
    }

    let mut resources = HashMap::with_capacity(fields.len() / 3);
    for triple in fields.chunks(3) {
        let name =
            parse_string(&triple[0], "Resource name must be a string")?;
        let usage = parse_number(&triple[1])?;
        let limit = parse_number(&triple[2])?;

        if resources
            .insert(name.to_owned(), ResourceLimit { usage, limit })
            .is_some()
        {
            return Err(Error::MalformedField("Duplicate resource name"));
        }
    }

    Ok(resources)
}

/// Decode a flat `(name limit ...)` list as found in `SETQUOTA` commands.
pub fn decode_set_resources(
    fields: &[Field<'_>],
) -> Result<HashMap<String, u32>, Error> {
    if 0 != fields.len() % 2 {
        return Err(Error::MalformedField(
            "Resource list is not made of name/limit pairs",
        ));
    }

    let mut resources = HashMap::with_capacity(fields.len() / 2);
    for pair in fields.chunks(2) {
        let name = parse_string(&pair[0], "Resource name must be a string")?;
        let limit = parse_number(&pair[1])?;

        if resources.insert(name.to_owned(), limit).is_some() {
            return Err(Error::MalformedField("Duplicate resource name"));
        }
    }

    Ok(resources)
}

/// Encode `resources` as a `(name usage limit ...)` list.
///
/// The order of the resources is the iteration order of the map.
pub fn encode_status_resources(
    resources: &HashMap<String, ResourceLimit>,
) -> Field<'static> {
    let mut list = Vec::with_capacity(resources.len() * 3);
    for (name, rl) in resources {
        list.push(Field::atom(name.clone()));
        list.push(Field::Number(rl.usage));
        list.push(Field::Number(rl.limit));
    }
    Field::List(list)
}

/// Encode `resources` as a `(name limit ...)` list.
pub fn encode_set_resources(
    resources: &HashMap<String, u32>,
) -> Field<'static> {
    let mut list = Vec::with_capacity(resources.len() * 2);
    for (name, &limit) in resources {
        list.push(Field::atom(name.clone()));
        list.push(Field::Number(limit));
    }
    Field::List(list)
}

/// Encode a UTF-8 mailbox name into its wire form.
pub fn encode_mailbox(name: &str) -> Field<'static> {
    Field::Atom(Cow::Owned(utf7::encode(name).into_owned()))
}

/// Decode a mailbox name from its wire form.
pub fn decode_mailbox(field: &Field<'_>) -> Result<String, Error> {
    let raw = parse_string(field, "Mailbox name must be a string")?;
    Ok(utf7::decode(raw)?.into_owned())
}
