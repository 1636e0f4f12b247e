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

//! IMAP's "modified UTF-7", as set by RFC 3501 section 5.1.3.
//!
//! Unlike the general-purpose UTF-7 handling in the main server, decoding here
//! is strict. Mailbox names sent with `GETQUOTAROOT` and echoed back in
//! `QUOTAROOT` must round-trip exactly, so anything that the RFC says "MUST
//! NOT" happen is rejected instead of being passed through.

use std::borrow::Cow;
use std::str;

use crate::support::error::Error;

const SHIFT_IN: u8 = b'&';
const SHIFT_IN_ESCAPED: &str = "&-";
const SHIFT_OUT: u8 = b'-';

/// Encode the given string into modified UTF-7.
///
/// The encoded string is minimal (i.e., contains no unnecessary shift
/// sequences) and normalised (never encodes a direct character and only
/// uses the special escape sequence for the shift-in character, all
/// encoded sequences have an explicit shift-out).
pub fn encode(s: &str) -> Cow<'_, str> {
    let mut transformed = String::new();

    let mut direct_start = 0;
    let mut direct_end = 0;
    for (ix, byte) in s.as_bytes().iter().copied().enumerate() {
        if is_direct(byte) {
            if ix != direct_end {
                encode_group(&mut transformed, s, direct_start, direct_end, ix);
                direct_start = ix;
            }
            direct_end = ix + 1;
        } else if SHIFT_IN == byte {
            encode_group(&mut transformed, s, direct_start, direct_end, ix);
            transformed.push_str(SHIFT_IN_ESCAPED);
            direct_start = ix + 1;
            direct_end = ix + 1;
        }
    }

    if transformed.is_empty() && direct_end == s.len() {
        Cow::Borrowed(s)
    } else {
        encode_group(&mut transformed, s, direct_start, direct_end, s.len());
        Cow::Owned(transformed)
    }
}

/// Decode the given string from modified UTF-7.
///
/// Fails with `Error::Encoding` if the input contains 8-bit or control
/// characters, an unterminated or empty-but-for-padding shift sequence,
/// invalid base64, a partial or unpaired UTF-16 code unit, a shift sequence
/// encoding printable ASCII, or two adjacent shift sequences.
pub fn decode(s: &str) -> Result<Cow<'_, str>, Error> {
    let bytes = s.as_bytes();

    if !bytes.contains(&SHIFT_IN) {
        return if bytes.iter().copied().all(is_printable) {
            Ok(Cow::Borrowed(s))
        } else {
            Err(Error::Encoding("non-printable character"))
        };
    }

    let mut transformed = String::with_capacity(s.len());
    let mut last_was_encoded = false;
    let mut ix = 0;
    while ix < bytes.len() {
        let ch = bytes[ix];
        if SHIFT_IN != ch {
            if !is_printable(ch) {
                return Err(Error::Encoding("non-printable character"));
            }

            transformed.push(ch.into());
            last_was_encoded = false;
            ix += 1;
            continue;
        }

        let start = ix + 1;
        let end = bytes[start..]
            .iter()
            .position(|&b| !is_base64_char(b))
            .map_or(bytes.len(), |len| start + len);

        if end >= bytes.len() || SHIFT_OUT != bytes[end] {
            return Err(Error::Encoding("unterminated shift sequence"));
        }

        if start == end {
            transformed.push(SHIFT_IN.into());
            last_was_encoded = false;
        } else {
            if last_was_encoded {
                return Err(Error::Encoding("adjacent shift sequences"));
            }

            decode_run(&bytes[start..end], &mut transformed)?;
            last_was_encoded = true;
        }

        ix = end + 1;
    }

    Ok(Cow::Owned(transformed))
}

fn decode_run(run: &[u8], dst: &mut String) -> Result<(), Error> {
    let utf16 = base64::decode_config(run, base64::IMAP_MUTF7)
        .map_err(|_| Error::Encoding("invalid base64"))?;
    if 0 != utf16.len() % 2 {
        return Err(Error::Encoding("partial UTF-16 code unit"));
    }

    let units = utf16
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect::<Vec<_>>();
    let decoded = String::from_utf16(&units)
        .map_err(|_| Error::Encoding("unpaired surrogate"))?;

    if decoded.bytes().any(is_printable) {
        return Err(Error::Encoding("printable ASCII in shift sequence"));
    }

    dst.push_str(&decoded);
    Ok(())
}

fn encode_group(
    dst: &mut String,
    src: &str,
    direct_start: usize,
    direct_end: usize,
    indirect_end: usize,
) {
    dst.push_str(&src[direct_start..direct_end]);

    if direct_end < indirect_end {
        let mut buf = Vec::<u8>::with_capacity((indirect_end - direct_end) * 2);
        for unit in src[direct_end..indirect_end].encode_utf16() {
            buf.extend_from_slice(&unit.to_be_bytes());
        }

        dst.push(SHIFT_IN.into());
        dst.push_str(&base64::encode_config(&buf, base64::IMAP_MUTF7));
        dst.push(SHIFT_OUT.into());
    }
}

fn is_printable(byte: u8) -> bool {
    (b' '..=b'~').contains(&byte)
}

fn is_direct(byte: u8) -> bool {
    is_printable(byte) && SHIFT_IN != byte
}

fn is_base64_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || b'+' == ch || b',' == ch
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn imap_encode() {
        assert_eq!("INBOX", encode("INBOX"));
        assert_eq!("Lost &- Found", encode("Lost & Found"));
        // Examples from RFC 3501
        assert_eq!(
            "~peter/mail/&U,BTFw-/&ZeVnLIqe-",
            encode("~peter/mail/台北/日本語")
        );
        assert_eq!("&Jjo-!", encode("☺!"));
        assert_eq!("&U,BTF2XlZyyKng-", encode("台北日本語"));
        // Misc
        assert_eq!("&AADYANwA,+AAoQCh-", encode("\x00𐀀￠¡¡"));
    }

    #[test]
    fn imap_decode() {
        assert_eq!("INBOX", decode("INBOX").unwrap());
        assert_eq!("Lost & Found", decode("Lost &- Found").unwrap());
        // Examples from RFC 3501
        assert_eq!(
            "~peter/mail/台北/日本語",
            decode("~peter/mail/&U,BTFw-/&ZeVnLIqe-").unwrap()
        );
        assert_eq!("☺!", decode("&Jjo-!").unwrap());
        assert_eq!("台北日本語", decode("&U,BTF2XlZyyKng-").unwrap());
        // Misc
        assert_eq!("\x00𐀀￠¡¡", decode("&AADYANwA,+AAoQCh-").unwrap());
    }

    #[test]
    fn decode_rejects_invalid() {
        // Unterminated
        assert_matches!(Err(Error::Encoding(_)), decode("&Jjo"));
        assert_matches!(Err(Error::Encoding(_)), decode("foo&"));
        assert_matches!(Err(Error::Encoding(_)), decode("&Jjo!"));
        // 8-bit and control characters must be encoded
        assert_matches!(Err(Error::Encoding(_)), decode("föö"));
        assert_matches!(Err(Error::Encoding(_)), decode("a\tb"));
        assert_matches!(Err(Error::Encoding(_)), decode("&-\x7f"));
        // "&AGE-" is "a", which must not be encoded
        assert_matches!(Err(Error::Encoding(_)), decode("&AGE-"));
        // Adjacent shift sequences must be merged
        assert_matches!(Err(Error::Encoding(_)), decode("&Jjo-&Jjo-"));
        // Odd number of octets
        assert_matches!(Err(Error::Encoding(_)), decode("&Jjoo-"));
        // Unpaired surrogate
        assert_matches!(Err(Error::Encoding(_)), decode("&2AA-"));
        // Bad base64 length
        assert_matches!(Err(Error::Encoding(_)), decode("&J-"));
    }

    #[test]
    fn shift_escape_does_not_count_as_encoded() {
        assert_eq!("☺&☺", decode("&Jjo-&-&Jjo-").unwrap());
    }

    proptest! {
        #[test]
        fn encoding_is_reversible(s in ".*") {
            assert_eq!(s, decode(&encode(&s)).unwrap());
        }

        #[test]
        fn decoding_never_panics(s in ".*") {
            let _ = decode(&s);
        }
    }
}
