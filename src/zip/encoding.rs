//! Entry name decoding.
//!
//! ZIP stores names as raw bytes. Bit 11 of the general purpose flags marks
//! UTF-8; without it the historical default is IBM code page 437. Archives
//! produced by some tools ignore both rules, so callers can force an encoding
//! by its WHATWG label.

use encoding_rs::Encoding;

use crate::{Error, Result};

/// Upper half of code page 437, indexed by `byte - 0x80`.
const CP437_HIGH: &str = concat!(
    "ÇüéâäàåçêëèïîìÄÅ",
    "ÉæÆôöòûùÿÖÜ¢£¥₧ƒ",
    "áíóúñÑªº¿⌐¬½¼¡«»",
    "░▒▓│┤╡╢╖╕╣║╗╝╜╛┐",
    "└┴┬├─┼╞╟╚╔╩╦╠═╬╧",
    "╨╤╥╙╘╒╓╫╪┘┌█▄▌▐▀",
    "αßΓπΣσµτΦΘΩδ∞φε∩",
    "≡±≥≤⌠⌡÷≈°∙·√ⁿ²■\u{a0}",
);

/// How entry names are turned into strings
#[derive(Debug, Clone, Copy, Default)]
pub enum FileNameEncoding {
    /// Use the UTF-8 flag, falling back to CP437
    #[default]
    Auto,
    /// Decode every name with this encoding
    Forced(&'static Encoding),
}

impl FileNameEncoding {
    /// Resolve an optional label such as `utf8` or `shift_jis`
    pub fn from_label(label: Option<&str>) -> Result<Self> {
        match label {
            None => Ok(Self::Auto),
            Some(label) => Encoding::for_label(label.trim().as_bytes())
                .map(Self::Forced)
                .ok_or_else(|| Error::UnknownEncoding(label.to_string())),
        }
    }

    pub fn decode(&self, raw: &[u8], utf8_flag: bool) -> String {
        match self {
            Self::Forced(encoding) => encoding.decode_without_bom_handling(raw).0.into_owned(),
            Self::Auto if utf8_flag => String::from_utf8_lossy(raw).into_owned(),
            Self::Auto => match std::str::from_utf8(raw) {
                Ok(name) => name.to_string(),
                Err(_) => decode_cp437(raw),
            },
        }
    }
}

fn decode_cp437(raw: &[u8]) -> String {
    raw.iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                CP437_HIGH
                    .chars()
                    .nth((b - 0x80) as usize)
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp437_table_is_complete() {
        assert_eq!(CP437_HIGH.chars().count(), 128);
    }

    #[test]
    fn auto_decodes_cp437_when_not_utf8() {
        let name = FileNameEncoding::Auto.decode(&[b'a', 0x81, b'.', b't'], false);
        assert_eq!(name, "aü.t");
    }

    #[test]
    fn auto_keeps_valid_utf8_without_flag() {
        let raw = "kanji-正世丕.app".as_bytes();
        assert_eq!(FileNameEncoding::Auto.decode(raw, false), "kanji-正世丕.app");
    }

    #[test]
    fn forced_label_is_used() {
        let encoding = FileNameEncoding::from_label(Some("shift_jis")).unwrap();
        // "日本" in Shift_JIS
        let raw = [0x93, 0xfa, 0x96, 0x7b];
        assert_eq!(encoding.decode(&raw, false), "日本");
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!(matches!(
            FileNameEncoding::from_label(Some("klingon")),
            Err(Error::UnknownEncoding(_))
        ));
    }
}
