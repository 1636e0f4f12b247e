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

//! Code for reading and writing IMAP command and response lines at the level
//! of generic fields.
//!
//! The main server has a full AST for every command it understands. An
//! extension cannot extend that AST, so here lines are only taken apart into
//! a tag, a name, and a sequence of `Field`s; interpretation of the fields is
//! up to the command and response types in `command` and `response`.
//!
//! Lines passed to the parsers here must already have their trailing CRLF
//! removed, but literals within the line are expected to be inline (i.e.,
//! `{3}\r\nfoo`), which is what `client::StreamSession` and
//! `server::QuotaServer` produce when reading logical lines.
//!
//! Numbers are never produced by the parser. A bare `42` is an atom as far as
//! the lexical syntax is concerned; it is the codec's job to decide whether a
//! position is numeric. `Field::Number` exists so that the writer does not
//! need to format numbers into strings first.

use std::borrow::Cow;
use std::io::{self, Write};
use std::str;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    combinator::{map, map_opt, map_res, opt},
    multi::{fold_many0, many0, separated_list},
    sequence::{delimited, preceded},
    IResult,
};

use super::lex::LexWriter;
use crate::support::error::Error;

include!("syntax-macros.rs");

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field<'a> {
    /// A bare atom, written as an atom if safe and as a string otherwise.
    Atom(Cow<'a, str>),
    /// A quoted string or literal.
    String(Cow<'a, str>),
    Number(u32),
    List(Vec<Field<'a>>),
    Nil,
}

impl<'a> Field<'a> {
    pub fn atom(s: impl Into<Cow<'a, str>>) -> Self {
        Field::Atom(s.into())
    }

    /// Return the textual content of this field if it is an atom or string.
    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Field::Atom(ref s) | Field::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn into_owned(self) -> Field<'static> {
        match self {
            Field::Atom(s) => Field::Atom(Cow::Owned(s.into_owned())),
            Field::String(s) => Field::String(Cow::Owned(s.into_owned())),
            Field::Number(n) => Field::Number(n),
            Field::List(l) => {
                Field::List(l.into_iter().map(Field::into_owned).collect())
            }
            Field::Nil => Field::Nil,
        }
    }

    pub fn write_to(
        &self,
        lex: &mut LexWriter<impl Write>,
    ) -> io::Result<()> {
        match *self {
            Field::Atom(ref s) => lex.astring(s),
            Field::String(ref s) => lex.string(s),
            Field::Number(ref n) => lex.num_u32(n),
            Field::List(ref l) => {
                lex.verbatim("(")?;
                write_fields(lex, l, false)?;
                lex.verbatim(")")
            }
            Field::Nil => lex.nil(),
        }
    }

    pub fn parse(i: &'a [u8]) -> IResult<&'a [u8], Field<'a>> {
        field(i)
    }
}

/// Write `fields` separated by spaces. If `leading_space` is true, a space is
/// written before the first field as well.
fn write_fields(
    lex: &mut LexWriter<impl Write>,
    fields: &[Field<'_>],
    leading_space: bool,
) -> io::Result<()> {
    for (ix, field) in fields.iter().enumerate() {
        if 0 != ix || leading_space {
            lex.verbatim(" ")?;
        }
        field.write_to(lex)?;
    }

    Ok(())
}

/// A full client command line, minus the CRLF.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub tag: Cow<'a, str>,
    pub name: Cow<'a, str>,
    pub args: Vec<Field<'a>>,
}

impl<'a> CommandLine<'a> {
    pub fn parse(i: &'a [u8]) -> IResult<&'a [u8], CommandLine<'a>> {
        let (i, cmd_tag) = tag_atom(i)?;
        let (i, _) = tag(" ")(i)?;
        let (i, name) = normal_atom(i)?;
        let (i, args) = many0(preceded(tag(" "), field))(i)?;

        Ok((
            i,
            CommandLine {
                tag: cmd_tag,
                name,
                args,
            },
        ))
    }

    pub fn write_to(&self, lex: &mut LexWriter<impl Write>) -> io::Result<()> {
        lex.verbatim(&self.tag)?;
        lex.verbatim(" ")?;
        lex.verbatim(&self.name)?;
        write_fields(lex, &self.args, true)
    }
}

simple_enum! {
    enum RespCondType {
        Ok("OK"),
        No("NO"),
        Bad("BAD"),
        Bye("BYE"),
        Preauth("PREAUTH"),
    }
}

/// The condition and human-readable text of a status response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status<'a> {
    pub cond: RespCondType,
    pub quip: Cow<'a, str>,
}

impl<'a> Status<'a> {
    pub fn into_owned(self) -> Status<'static> {
        Status {
            cond: self.cond,
            quip: Cow::Owned(self.quip.into_owned()),
        }
    }

    fn write_to(&self, lex: &mut LexWriter<impl Write>) -> io::Result<()> {
        self.cond.write_to(lex)?;
        if !self.quip.is_empty() {
            lex.verbatim(" ")?;
            lex.verbatim(&self.quip)?;
        }
        Ok(())
    }
}

/// An untagged response carrying data, e.g. `* QUOTA "" (STORAGE 10 512)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UntaggedResponse<'a> {
    pub name: Cow<'a, str>,
    pub fields: Vec<Field<'a>>,
}

impl<'a> UntaggedResponse<'a> {
    pub fn into_owned(self) -> UntaggedResponse<'static> {
        UntaggedResponse {
            name: Cow::Owned(self.name.into_owned()),
            fields: self.fields.into_iter().map(Field::into_owned).collect(),
        }
    }

    /// If this response is named `name` (case-insensitively), return its
    /// fields.
    pub fn accept_named(&self, name: &str) -> Option<&[Field<'a>]> {
        if name.eq_ignore_ascii_case(&self.name) {
            Some(&self.fields)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseLine<'a> {
    Untagged(UntaggedResponse<'a>),
    UntaggedStatus(Status<'a>),
    Tagged { tag: Cow<'a, str>, status: Status<'a> },
}

impl<'a> ResponseLine<'a> {
    pub fn parse(i: &'a [u8]) -> IResult<&'a [u8], ResponseLine<'a>> {
        alt((
            map(preceded(tag("* "), status), ResponseLine::UntaggedStatus),
            map(preceded(tag("* "), untagged_response), ResponseLine::Untagged),
            tagged_response,
        ))(i)
    }

    pub fn into_owned(self) -> ResponseLine<'static> {
        match self {
            ResponseLine::Untagged(r) => ResponseLine::Untagged(r.into_owned()),
            ResponseLine::UntaggedStatus(s) => {
                ResponseLine::UntaggedStatus(s.into_owned())
            }
            ResponseLine::Tagged { tag, status } => ResponseLine::Tagged {
                tag: Cow::Owned(tag.into_owned()),
                status: status.into_owned(),
            },
        }
    }

    pub fn write_to(&self, lex: &mut LexWriter<impl Write>) -> io::Result<()> {
        match *self {
            ResponseLine::Untagged(ref r) => {
                lex.verbatim("* ")?;
                lex.verbatim(&r.name)?;
                write_fields(lex, &r.fields, true)
            }
            ResponseLine::UntaggedStatus(ref s) => {
                lex.verbatim("* ")?;
                s.write_to(lex)
            }
            ResponseLine::Tagged { ref tag, ref status } => {
                lex.verbatim(tag)?;
                lex.verbatim(" ")?;
                status.write_to(lex)
            }
        }
    }
}

/// Parse a whole command line, failing if anything is left over.
pub fn parse_command_line(line: &[u8]) -> Result<CommandLine<'_>, Error> {
    match CommandLine::parse(line) {
        Ok((b"", cmd)) => Ok(cmd),
        Ok((rest, _)) => Err(Error::Parse(format!(
            "Unexpected trailing data: {}",
            String::from_utf8_lossy(rest)
        ))),
        Err(e) => Err(Error::Parse(e.to_string())),
    }
}

/// Parse a whole response line, failing if anything is left over.
pub fn parse_response_line(line: &[u8]) -> Result<ResponseLine<'_>, Error> {
    match ResponseLine::parse(line) {
        Ok((b"", r)) => Ok(r),
        Ok((rest, _)) => Err(Error::Parse(format!(
            "Unexpected trailing data: {}",
            String::from_utf8_lossy(rest)
        ))),
        Err(e) => Err(Error::Parse(e.to_string())),
    }
}

// ==================== COMPOSITE PARSERS ====================

fn field(i: &[u8]) -> IResult<&[u8], Field<'_>> {
    alt((
        map(list, Field::List),
        map(string, Field::String),
        map(astring_atom, |a| {
            if "NIL".eq_ignore_ascii_case(&a) {
                Field::Nil
            } else {
                Field::Atom(a)
            }
        }),
    ))(i)
}

fn list(i: &[u8]) -> IResult<&[u8], Vec<Field<'_>>> {
    delimited(tag("("), separated_list(tag(" "), field), tag(")"))(i)
}

fn status(i: &[u8]) -> IResult<&[u8], Status<'_>> {
    let (i, cond) = map_opt(normal_atom, |a| RespCondType::from_name(&a))(i)?;
    let (i, quip) = opt(preceded(tag(" "), text))(i)?;
    Ok((
        i,
        Status {
            cond,
            quip: quip.unwrap_or(Cow::Borrowed("")),
        },
    ))
}

fn untagged_response(i: &[u8]) -> IResult<&[u8], UntaggedResponse<'_>> {
    let (i, name) = normal_atom(i)?;
    let (i, fields) = many0(preceded(tag(" "), field))(i)?;
    Ok((i, UntaggedResponse { name, fields }))
}

fn tagged_response(i: &[u8]) -> IResult<&[u8], ResponseLine<'_>> {
    let (i, resp_tag) = tag_atom(i)?;
    let (i, _) = tag(" ")(i)?;
    let (i, status) = status(i)?;
    Ok((
        i,
        ResponseLine::Tagged {
            tag: resp_tag,
            status,
        },
    ))
}

// ==================== PRIMITIVE PARSERS ====================

fn normal_atom(i: &[u8]) -> IResult<&[u8], Cow<str>> {
    map_res(
        nom::bytes::complete::take_while1(|b| match b {
            0..=b' ' => false,
            127..=255 => false,
            b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' | b']' => false,
            _ => true,
        }),
        utf8,
    )(i)
}

fn astring_atom(i: &[u8]) -> IResult<&[u8], Cow<str>> {
    map_res(
        nom::bytes::complete::take_while1(|b| match b {
            0..=b' ' => false,
            127..=255 => false,
            b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' => false,
            _ => true,
        }),
        utf8,
    )(i)
}

fn tag_atom(i: &[u8]) -> IResult<&[u8], Cow<str>> {
    map_res(
        nom::bytes::complete::take_while1(|b| match b {
            0..=b' ' => false,
            127..=255 => false,
            b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' | b'+' => false,
            _ => true,
        }),
        utf8,
    )(i)
}

fn number(i: &[u8]) -> IResult<&[u8], u32> {
    map_opt(nom::character::complete::digit1, |s| {
        str::from_utf8(s).ok().and_then(|s| s.parse::<u32>().ok())
    })(i)
}

fn literal(i: &[u8]) -> IResult<&[u8], &[u8]> {
    let (i, len) = delimited(
        alt((tag("~{"), tag("{"))),
        number,
        alt((tag("+}\r\n"), tag("}\r\n"))),
    )(i)?;
    nom::bytes::complete::take(len)(i)
}

fn quoted_char(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tag("\\"), alt((tag("\\"), tag("\""))))(i)
}

fn quoted_string_content(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((quoted_char, is_not("\r\n\"\\")))(i)
}

fn quoted(i: &[u8]) -> IResult<&[u8], Cow<str>> {
    delimited(
        tag("\""),
        fold_many0(
            map_res(quoted_string_content, utf8),
            Cow::Owned(String::new()),
            |mut accum: Cow<str>, piece| {
                if accum.is_empty() {
                    piece
                } else {
                    Cow::to_mut(&mut accum).push_str(&piece);
                    accum
                }
            },
        ),
        tag("\""),
    )(i)
}

fn string(i: &[u8]) -> IResult<&[u8], Cow<str>> {
    alt((quoted, map_res(literal, utf8)))(i)
}

fn text(i: &[u8]) -> IResult<&[u8], Cow<str>> {
    map_res(is_not("\r\n"), utf8)(i)
}

fn utf8(b: &[u8]) -> Result<Cow<str>, str::Utf8Error> {
    str::from_utf8(b).map(Cow::Borrowed)
}
