//! Headers required by generated code.

use super::snippet::HeaderSnippet;
use std::collections::BTreeSet;

/// Something generated code uses that must be declared by an include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Need {
    /// `int8_t` .. `uint64_t`
    FixedWidthInt,
    /// `std::string`
    StdString,
    /// `std::vector`
    StdVector,
    /// `strcmp`
    Strcmp,
    /// `strncpy`
    Strncpy,
    /// The runtime's row tokenizer
    Tokenize,
    /// `sscanf`
    Sscanf,
    /// `size_t`
    SizeT,
    /// The runtime's data file reader
    CsvFile,
    /// The runtime's `subdata` container
    Subdata,
    /// The runtime's directory handle
    Dir,
    /// The runtime's error type
    Error,
}

impl Need {
    /// The header declaring this need
    pub fn header(self) -> HeaderSnippet {
        match self {
            Need::FixedWidthInt => HeaderSnippet::global("stdint.h"),
            Need::StdString => HeaderSnippet::global("string"),
            Need::StdVector => HeaderSnippet::global("vector"),
            Need::Strcmp | Need::Strncpy => HeaderSnippet::global("cstring"),
            Need::Sscanf => HeaderSnippet::global("cstdio"),
            Need::SizeT => HeaderSnippet::global("stddef.h"),
            Need::Tokenize => HeaderSnippet::local("../util/strings.h"),
            Need::CsvFile | Need::Subdata => HeaderSnippet::local("../util/file.h"),
            Need::Dir => HeaderSnippet::local("../util/dir.h"),
            Need::Error => HeaderSnippet::local("../util/error.h"),
        }
    }
}

/// Headers for a list of needs
pub(crate) fn headers(needs: &[Need]) -> BTreeSet<HeaderSnippet> {
    needs.iter().map(|n| n.header()).collect()
}
