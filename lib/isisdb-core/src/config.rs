use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::encoding::TextEncoding;

/// Byte order of every packed structure in the master and cross-reference
/// files. Encoded and decoded explicitly; native layout is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown text encoding {0:?}")]
    UnknownEncoding(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Typed per-database settings.
///
/// Defaults follow the classic CDS/ISIS layout; a `<db>.ini` file next to
/// the master file overrides individual keys. Unknown keys are ignored.
#[derive(Debug, Clone)]
pub struct Config {
    /// Encoding of field bytes inside the master file.
    pub input_encoding: TextEncoding,
    /// Encoding used when rendering formatted output to bytes.
    pub output_encoding: TextEncoding,
    pub byte_order: ByteOrder,
    pub block_size: usize,
    pub pointer_size: usize,
    pub ctrl_size: usize,
    /// Use the widened record leader layout.
    pub leader_xl: bool,
    /// Use the 12-byte directory entry layout instead of the 6-byte one.
    pub wide_directory: bool,
    pub subfield_delimiter: char,
    pub xrf_block: i32,
    pub xrf_offset_mask: i32,
    pub xrf_new_flag: i32,
    pub xrf_modified_flag: i32,
    pub max_line_width: usize,
    /// Extra directories searched when resolving databases and gizmo files.
    pub search_path: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_encoding: TextEncoding::default(),
            output_encoding: TextEncoding::default(),
            byte_order: ByteOrder::Little,
            block_size: 512,
            pointer_size: 4,
            ctrl_size: 64,
            leader_xl: true,
            wide_directory: false,
            subfield_delimiter: '^',
            xrf_block: 2048,
            xrf_offset_mask: 0x0000_01ff,
            xrf_new_flag: 0x0000_0400,
            xrf_modified_flag: 0x0000_0200,
            max_line_width: 79,
            search_path: Vec::new(),
        }
    }
}

impl Config {
    /// Entries per cross-reference block, net of the leading block-id slot.
    pub fn pointers_per_block(&self) -> usize {
        self.block_size / self.pointer_size - 1
    }

    /// `log2(block_size)`, used to turn block numbers into byte offsets.
    pub fn block_power(&self) -> u32 {
        self.block_size.trailing_zeros()
    }

    /// Apply overrides from an `.ini` file, when one exists.
    ///
    /// Section names are ignored; option names match case-insensitively.
    pub fn load(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loading database configuration");

        for (key, value) in parse_ini(&raw) {
            self.apply(&key, &value)?;
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key.to_ascii_uppercase().as_str() {
            "INPUT_ENCODING" => self.input_encoding = TextEncoding::for_label(value)?,
            "OUTPUT_ENCODING" => self.output_encoding = TextEncoding::for_label(value)?,
            "BYTE_ORDER" => {
                self.byte_order = match value.trim().to_ascii_lowercase().as_str() {
                    "little" => ByteOrder::Little,
                    "big" => ByteOrder::Big,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: "BYTE_ORDER".to_owned(),
                            value: value.to_owned(),
                        })
                    }
                }
            }
            "BLOCK_SIZE" => self.block_size = parse_int(key, value)? as usize,
            "POINTER_SIZE" => self.pointer_size = parse_int(key, value)? as usize,
            "CTRL_SIZE" => self.ctrl_size = parse_int(key, value)? as usize,
            "LEADER_XL" => self.leader_xl = parse_bool(key, value)?,
            "WIDE_DIRECTORY" => self.wide_directory = parse_bool(key, value)?,
            "SUBFIELD_DELIMITER" => {
                self.subfield_delimiter = value.trim().chars().next().unwrap_or('^')
            }
            "XRF_BLOCK" => self.xrf_block = parse_int(key, value)?,
            "XRF_OFFSET" => self.xrf_offset_mask = parse_int(key, value)?,
            "XRF_NEW_FLAG" => self.xrf_new_flag = parse_int(key, value)?,
            "XRF_MODIFIED_FLAG" => self.xrf_modified_flag = parse_int(key, value)?,
            "MAX_LINE_WIDTH" => self.max_line_width = parse_int(key, value)? as usize,
            "SEARCH_PATH" => {
                self.search_path = value
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "input_encoding: {}", self.input_encoding.name())?;
        writeln!(f, "output_encoding: {}", self.output_encoding.name())?;
        writeln!(f, "byte_order: {:?}", self.byte_order)?;
        writeln!(f, "block_size: {}", self.block_size)?;
        writeln!(f, "leader_xl: {}", self.leader_xl)?;
        write!(f, "max_line_width: {}", self.max_line_width)
    }
}

fn parse_int(key: &str, value: &str) -> Result<i32, ConfigError> {
    let value = value.trim();
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        value.parse::<i64>()
    };
    parsed
        .ok()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

/// Minimal `.ini` scan: `[section]` lines are skipped, `key = value` and
/// `key: value` lines yield pairs, `;`/`#` start comments.
fn parse_ini(raw: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            continue;
        }
        let split = line
            .find('=')
            .map(|i| (i, 1))
            .or_else(|| line.find(':').map(|i| (i, 1)));
        if let Some((at, skip)) = split {
            let key = line[..at].trim();
            let value = line[at + skip..].trim();
            if !key.is_empty() {
                pairs.push((key.to_owned(), value.to_owned()));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.pointers_per_block(), 127);
        assert_eq!(config.block_power(), 9);
        assert_eq!(config.subfield_delimiter, '^');
        assert!(config.leader_xl);
    }

    #[test]
    fn ini_overrides() {
        let mut config = Config::default();
        for (key, value) in parse_ini(
            "[IsisDB]\n\
             ; comment\n\
             BYTE_ORDER = big\n\
             BLOCK_SIZE = 1024\n\
             LEADER_XL = 0\n\
             SEARCH_PATH = /a;/b\n",
        ) {
            config.apply(&key, &value).unwrap();
        }
        assert_eq!(config.byte_order, ByteOrder::Big);
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.pointers_per_block(), 255);
        assert!(!config.leader_xl);
        assert_eq!(config.search_path.len(), 2);
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut config = Config::default();
        assert!(config.apply("BLOCK_SIZE", "lots").is_err());
        assert!(config.apply("BYTE_ORDER", "sideways").is_err());
        // unknown keys are ignored
        config.apply("HTTP_PORT", "8080").unwrap();
    }
}
