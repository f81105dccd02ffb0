//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    /// A format field held a value the table kind does not define
    BadFormat,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
    MissingTable(u32),
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadFormat => write!(f, "unknown subtable format"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Error returned when loading or applying layout tables
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum LayoutError {
    /// A caller supplied index, glyph list or buffer was unusable
    InvalidArgument,
    Parse(ParseError),
    /// Contextual lookups recursed past the nesting limit
    TooManyNestedContexts,
    /// A metric id was encountered but no resolver is available
    NoMultipleMasterInterpreter,
    /// The glyph outline provider failed
    Outline(String),
}

impl From<ParseError> for LayoutError {
    fn from(error: ParseError) -> Self {
        LayoutError::Parse(error)
    }
}

impl From<ReadEof> for LayoutError {
    fn from(_error: ReadEof) -> Self {
        LayoutError::Parse(ParseError::BadEof)
    }
}

impl From<std::num::TryFromIntError> for LayoutError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        LayoutError::Parse(ParseError::BadValue)
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::InvalidArgument => write!(f, "invalid argument"),
            LayoutError::Parse(err) => write!(f, "layout parse: {}", err),
            LayoutError::TooManyNestedContexts => write!(f, "too many nested contexts"),
            LayoutError::NoMultipleMasterInterpreter => {
                write!(f, "no multiple master interpreter available")
            }
            LayoutError::Outline(msg) => write!(f, "glyph outline: {}", msg),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
        }
    }
}

impl std::error::Error for WriteError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;

    #[test]
    fn display_missing_table() {
        let err = ParseError::MissingTable(tag::GPOS);
        assert_eq!(err.to_string(), "font is missing 'GPOS' table");
    }

    #[test]
    fn layout_error_wraps_parse_error() {
        let err = LayoutError::from(ParseError::BadFormat);
        assert_eq!(err, LayoutError::Parse(ParseError::BadFormat));
        assert_eq!(err.to_string(), "layout parse: unknown subtable format");
    }
}
