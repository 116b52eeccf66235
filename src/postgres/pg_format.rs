/// Postgres data transmission format.
///
/// Result columns always request [`Binary`][PgFormat::Binary]. Parameters
/// use [`Text`][PgFormat::Text] for the textual types and binary for
/// everything else.
///
/// <https://www.postgresql.org/docs/current/protocol-overview.html#PROTOCOL-FORMAT-CODES>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PgFormat {
    /// Text has format code zero.
    ///
    /// There is no trailing null character in the transmitted
    /// representation; embedded nulls are not allowed.
    Text,
    /// Binary has format code one.
    ///
    /// Binary representations for integers use network byte order (most
    /// significant byte first).
    Binary,
}

impl PgFormat {
    /// Return the wire format code for this format.
    pub fn format_code(self) -> u16 {
        match self {
            PgFormat::Text => 0,
            PgFormat::Binary => 1,
        }
    }

    /// Parse a wire format code.
    pub fn from_code(code: u16) -> Option<PgFormat> {
        match code {
            0 => Some(PgFormat::Text),
            1 => Some(PgFormat::Binary),
            _ => None,
        }
    }
}
