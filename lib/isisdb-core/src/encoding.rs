use crate::config::ConfigError;

/// A text encoding used at the I/O boundary of a database.
///
/// Record data is Unicode in memory; bytes on disk are converted through the
/// database's configured input/output encodings. Decoding is strict: a byte
/// sequence that is not valid in the configured encoding is an error rather
/// than replacement characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    inner: &'static encoding_rs::Encoding,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("byte sequence is not valid {0}")]
    Decode(&'static str),

    #[error("text cannot be represented in {0}")]
    Encode(&'static str),
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            inner: encoding_rs::UTF_8,
        }
    }
}

impl TextEncoding {
    /// Resolve an encoding label such as `utf-8` or `cp866`.
    pub fn for_label(label: &str) -> Result<Self, ConfigError> {
        encoding_rs::Encoding::for_label(label.trim().as_bytes())
            .map(|inner| Self { inner })
            .ok_or_else(|| ConfigError::UnknownEncoding(label.to_owned()))
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, Error> {
        let (text, _, malformed) = self.inner.decode(bytes);
        if malformed {
            return Err(Error::Decode(self.name()));
        }
        Ok(text.into_owned())
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, Error> {
        let (bytes, _, unmappable) = self.inner.encode(text);
        if unmappable {
            return Err(Error::Encode(self.name()));
        }
        Ok(bytes.into_owned())
    }

    /// Number of bytes `text` occupies once encoded.
    pub fn encoded_len(&self, text: &str) -> Result<usize, Error> {
        self.encode(text).map(|b| b.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_round_trip() {
        let enc = TextEncoding::default();
        let bytes = enc.encode("Säo Paulo").unwrap();
        assert_eq!(enc.decode(&bytes).unwrap(), "Säo Paulo");
    }

    #[test]
    fn strict_decode() {
        let enc = TextEncoding::default();
        assert!(enc.decode(&[0xff, 0xfe, 0x41]).is_err());
    }

    #[test]
    fn unknown_label() {
        assert!(TextEncoding::for_label("no-such-charset").is_err());
    }
}
