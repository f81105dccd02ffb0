//! Font table, script, language and feature tags.

use crate::error::ParseError;
use std::fmt;

/// Generate a 4-byte tag from a byte string, so `tag!(b"GSUB")` is `0x47535542`.
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    ((chars[3] as u32) << 0)
        | ((chars[2] as u32) << 8)
        | ((chars[1] as u32) << 16)
        | ((chars[0] as u32) << 24)
}

/// Build a tag from a string of up to four printable ASCII characters, padding with spaces.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    if s.len() > 4 {
        return Err(ParseError::BadValue);
    }

    let mut tag: u32 = 0;
    let mut count = 0;

    for c in s.chars() {
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(ParseError::BadValue);
        }

        tag = (tag << 8) | (c as u32);
        count += 1;
    }

    while count < 4 {
        tag = (tag << 8) | (' ' as u32);
        count += 1;
    }

    Ok(tag)
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().any(|b| !b.is_ascii() || b.is_ascii_control()) {
            write!(f, "0x{:08x}", self.0)
        } else {
            bytes.iter().try_for_each(|&b| write!(f, "{}", char::from(b)))
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

// Tables
pub const GDEF: u32 = tag!(b"GDEF");
pub const GPOS: u32 = tag!(b"GPOS");
pub const GSUB: u32 = tag!(b"GSUB");

// Scripts
pub const ARAB: u32 = tag!(b"arab");
pub const CYRL: u32 = tag!(b"cyrl");
pub const DEVA: u32 = tag!(b"deva");
pub const DFLT: u32 = tag!(b"DFLT");
pub const GREK: u32 = tag!(b"grek");
pub const HEBR: u32 = tag!(b"hebr");
pub const LATN: u32 = tag!(b"latn");

// Languages
pub const DEU: u32 = tag!(b"DEU ");
pub const TRK: u32 = tag!(b"TRK ");
pub const URD: u32 = tag!(b"URD ");

// Features
pub const CALT: u32 = tag!(b"calt");
pub const CCMP: u32 = tag!(b"ccmp");
pub const CURS: u32 = tag!(b"curs");
pub const DLIG: u32 = tag!(b"dlig");
pub const FINA: u32 = tag!(b"fina");
pub const INIT: u32 = tag!(b"init");
pub const ISOL: u32 = tag!(b"isol");
pub const KERN: u32 = tag!(b"kern");
pub const LIGA: u32 = tag!(b"liga");
pub const LOCL: u32 = tag!(b"locl");
pub const MARK: u32 = tag!(b"mark");
pub const MEDI: u32 = tag!(b"medi");
pub const MKMK: u32 = tag!(b"mkmk");
pub const RLIG: u32 = tag!(b"rlig");
pub const SALT: u32 = tag!(b"salt");
pub const SMCP: u32 = tag!(b"smcp");
