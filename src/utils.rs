/// Renders frame bytes or a CRC pair the way captures are read, e.g. `0F 01 01 00 01 00 F9 1E 2C F0`.
///
/// Used in trace logs and CLI frame views; an empty slice renders as `<empty>`.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }
    bytes
        .chunks(1)
        .map(hex::encode_upper)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses captured bytes written as hex, tolerating `0x` prefixes, spaces, commas and colons.
pub(crate) fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = value
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    hex::decode(compact)
}
