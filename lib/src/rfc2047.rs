// Copyright 2024 The Grove Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! RFC 2047 Q-encoding of mail header words.

/// High bit set, or ESC (ISO-2022 shift sequences).
pub(crate) fn non_ascii(byte: u8) -> bool {
    byte & 0x80 != 0 || byte == 0x1b
}

fn is_special(byte: u8) -> bool {
    non_ascii(byte) || matches!(byte, b'=' | b'?' | b'_')
}

/// Whether a header line must be Q-encoded: any non-ASCII byte, or a literal
/// `=?` that a decoder would mistake for an encoded word.
pub fn needs_encoding(line: &[u8]) -> bool {
    line.iter().any(|&b| non_ascii(b)) || line.windows(2).any(|pair| pair == b"=?")
}

/// Appends `line` to `out`, Q-encoding it as `=?<charset>?q?…?=` when
/// [`needs_encoding`] says so and copying it verbatim otherwise.
pub fn append(out: &mut Vec<u8>, line: &[u8], charset: &str) {
    if !needs_encoding(line) {
        out.extend_from_slice(line);
        return;
    }
    out.extend_from_slice(b"=?");
    out.extend_from_slice(charset.as_bytes());
    out.extend_from_slice(b"?q?");
    for &byte in line {
        // We encode ' ' as '=20' even though rfc2047 allows '_' for
        // readability, because many decoders leave the underscore in place.
        if is_special(byte) || byte == b' ' {
            out.extend_from_slice(format!("={byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
    out.extend_from_slice(b"?=");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(line: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        append(&mut out, line, "utf-8");
        out
    }

    /// A decoder strict enough to check the encoder's output shape.
    fn decode(encoded: &[u8]) -> Option<(String, Vec<u8>)> {
        let text = std::str::from_utf8(encoded).ok()?;
        let rest = text.strip_prefix("=?")?;
        let (charset, rest) = rest.split_once('?')?;
        let rest = rest
            .strip_prefix('q')
            .or_else(|| rest.strip_prefix('Q'))?
            .strip_prefix('?')?;
        let body = rest.strip_suffix("?=")?;
        let mut decoded = Vec::new();
        let mut bytes = body.bytes();
        while let Some(b) = bytes.next() {
            match b {
                b'=' => {
                    let hi = bytes.next()?;
                    let lo = bytes.next()?;
                    let hex = [hi, lo];
                    let hex = std::str::from_utf8(&hex).ok()?;
                    decoded.push(u8::from_str_radix(hex, 16).ok()?);
                }
                b'_' => decoded.push(b' '),
                _ => decoded.push(b),
            }
        }
        Some((charset.to_string(), decoded))
    }

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(encode(b"A U Thor"), b"A U Thor");
        assert!(!needs_encoding(b"plain = text ? here _"));
    }

    #[test]
    fn test_literal_encoded_word_trigger() {
        assert!(needs_encoding(b"look =?utf-8?q?fake?="));
        let encoded = encode(b"=?");
        assert_eq!(encoded, b"=?utf-8?q?=3D=3F?=");
    }

    #[test]
    fn test_encode_non_ascii() {
        // "Zoë" in UTF-8
        assert_eq!(encode(b"Zo\xc3\xab"), b"=?utf-8?q?Zo=C3=AB?=");
        // ESC triggers as well (ISO-2022)
        assert!(needs_encoding(b"\x1b$B"));
    }

    #[test]
    fn test_space_is_hex_encoded_not_underscore() {
        let encoded = encode("Zo\u{eb} B".as_bytes());
        assert!(!encoded.contains(&b'_'));
        assert!(
            std::str::from_utf8(&encoded).unwrap().contains("=20"),
            "space must be =20 encoded"
        );
    }

    #[test]
    fn test_round_trip() {
        let samples: &[&[u8]] = &[
            b"Zo\xc3\xab Author",
            b"=?not really?=",
            b"mixed: caf\xc3\xa9 = tea? _always_",
            b"\x1b$B$3$s$K$A$O\x1b(B",
            b"\xff\xfe\x00",
        ];
        for &sample in samples {
            let (charset, decoded) = decode(&encode(sample)).unwrap();
            assert_eq!(charset, "utf-8");
            assert_eq!(decoded, sample, "round trip of {sample:?}");
        }
    }
}
