//! The on-wire layout of an input stream, as seen by the decoding layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ParserFormat;

/// How a stream's bytes encode its elements.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    /// Elements packed LSB-first.
    LittleEndian,
    /// Elements packed MSB-first.
    BigEndian,
    /// Parquet RLE / bit-packed hybrid groups.
    ParquetRle,
}

impl StreamFormat {
    /// Parquet-RLE streams carry their own length; packed streams do not.
    pub fn is_self_describing(self) -> bool {
        matches!(self, StreamFormat::ParquetRle)
    }
}

impl From<ParserFormat> for StreamFormat {
    fn from(parser: ParserFormat) -> Self {
        match parser {
            ParserFormat::LittleEndian => StreamFormat::LittleEndian,
            ParserFormat::BigEndian => StreamFormat::BigEndian,
            ParserFormat::ParquetRle => StreamFormat::ParquetRle,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamFormat::LittleEndian => "le",
            StreamFormat::BigEndian => "be",
            StreamFormat::ParquetRle => "prle",
        };
        write!(f, "{}", name)
    }
}
