use lazy_static::lazy_static;

/// Trait to allow interacting with bit flags
pub trait FlagOperations<T> {
    /// Inserts the specified flags in-place.
    fn set(&mut self, other: T);
    /// Removes the specified flags in-place.
    fn unset(&mut self, other: T);
    /// Determine if the specified flags are set
    fn is_set(&self, other: T) -> bool;
}

impl FlagOperations<u64> for u64 {
    fn set(&mut self, other: u64) {
        *self |= other;
    }

    fn unset(&mut self, other: u64) {
        *self &= !other;
    }

    fn is_set(&self, other: u64) -> bool {
        self & other != 0
    }
}

lazy_static! {
    static ref TOKEN_TABLE: [bool; 256] = {
        let mut table = [false; 256];
        for c in 0..=255u8 {
            table[c as usize] = c.is_ascii_alphanumeric()
                || matches!(
                    c,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                );
        }
        table
    };
    static ref FORBIDDEN_VALUE_TABLE: [bool; 256] = {
        let mut table = [false; 256];
        for c in 0..=0x1fu8 {
            table[c as usize] = !matches!(c, b'\t' | b'\n' | b'\r');
        }
        table[0x7f] = true;
        table
    };
}

/// Determines if the given byte is an RFC 7230 token character.
pub fn is_token(c: u8) -> bool {
    TOKEN_TABLE[c as usize]
}

/// Determines if the given byte is linear whitespace (space or horizontal tab).
pub fn is_space_or_tab(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Determines if the given byte may not appear in a header value: a
/// control byte other than HT, CR, LF, or the DEL byte.
pub fn is_forbidden_value_octet(c: u8) -> bool {
    FORBIDDEN_VALUE_TABLE[c as usize]
}

/// Returns the input with leading and trailing linear whitespace removed.
pub fn trimmed(input: &[u8]) -> &[u8] {
    let start = input
        .iter()
        .position(|&c| !is_space_or_tab(c))
        .unwrap_or(input.len());
    let end = input
        .iter()
        .rposition(|&c| !is_space_or_tab(c))
        .map(|i| i + 1)
        .unwrap_or(start);
    &input[start..end]
}
