use anyhow::anyhow;

use crate::error::SortError;

/// Text encoding of the input file.
///
/// The encoding defines the width of a symbol, which is the step used when scanning for
/// line boundaries, and how lines are turned into strings for comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8, the default
    #[default]
    Utf8,
    /// UTF-16, little endian
    Utf16Le,
    /// UTF-16, big endian
    Utf16Be,
}

impl Encoding {
    /// Resolve an encoding from a label such as `utf-8` or `utf-16le`. The match is case
    /// insensitive. Plain `utf-16` means little endian.
    pub fn from_label(label: &str) -> Result<Encoding, anyhow::Error> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-16" | "utf16" | "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            _ => Err(anyhow!(SortError::InvalidConfig(format!("unsupported encoding: {}", label)))),
        }
    }

    /// Number of bytes in the smallest symbol of this encoding.
    pub fn symbol_size(&self) -> usize {
        match self {
            Encoding::Utf8 => 1,
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
        }
    }

    pub fn encode(&self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => s.as_bytes().to_vec(),
            Encoding::Utf16Le => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
            Encoding::Utf16Be => s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        }
    }

    /// Append the encoded form of `s` to `buf`.
    pub(crate) fn encode_into(&self, s: &str, buf: &mut Vec<u8>) {
        match self {
            Encoding::Utf8 => buf.extend_from_slice(s.as_bytes()),
            Encoding::Utf16Le => s.encode_utf16().for_each(|u| buf.extend_from_slice(&u.to_le_bytes())),
            Encoding::Utf16Be => s.encode_utf16().for_each(|u| buf.extend_from_slice(&u.to_be_bytes())),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, anyhow::Error> {
        match self {
            Encoding::Utf8 => Ok(String::from_utf8(bytes.to_vec())?),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(anyhow!("odd number of bytes in UTF-16 data: {}", bytes.len()));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match self {
                        Encoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
                        _ => u16::from_le_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                Ok(String::from_utf16(&units)?)
            }
        }
    }
}
