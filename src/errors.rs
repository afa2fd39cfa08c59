//! Definition of errors.
use std::path::Path;
use std::{io, result};

use thiserror::Error;

/// A specialized Result type for Dartdict.
pub type Result<T, E = DartError> = result::Result<T, E>;

/// Errors in Dartdict.
#[derive(Debug, Error)]
pub enum DartError {
    /// Contains [`InputError`].
    #[error(transparent)]
    Input(#[from] InputError),

    /// Contains [`ScaleError`].
    #[error(transparent)]
    Scale(#[from] ScaleError),

    /// Contains [`FormatError`].
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Error used when reading or writing a dictionary image fails.
    #[error("IoError: failed to access {target}: {source}")]
    Io {
        /// File name, or `<stream>` for caller-provided readers and writers.
        target: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl DartError {
    pub(crate) const fn input(msg: &'static str) -> Self {
        Self::Input(InputError { msg, key: None })
    }

    pub(crate) fn input_at(msg: &'static str, index: usize, key: &[u8]) -> Self {
        Self::Input(InputError {
            msg,
            key: Some((index, key.to_vec())),
        })
    }

    pub(crate) const fn scale(arg: &'static str, max: u32) -> Self {
        Self::Scale(ScaleError { arg, max })
    }

    pub(crate) const fn format(msg: &'static str, unit_index: Option<usize>) -> Self {
        Self::Format(FormatError {
            msg,
            unit_index,
            file: None,
        })
    }

    pub(crate) fn stream(source: io::Error) -> Self {
        Self::Io {
            target: "<stream>".to_string(),
            source,
        }
    }

    /// Attaches a file name to format and I/O errors.
    pub(crate) fn in_file(self, path: &Path) -> Self {
        match self {
            Self::Format(mut e) => {
                e.file = Some(path.display().to_string());
                Self::Format(e)
            }
            Self::Io { source, .. } => Self::Io {
                target: path.display().to_string(),
                source,
            },
            e => e,
        }
    }
}

/// Error used when the input keys or values are invalid.
#[derive(Debug, Error)]
#[error("InputError: {msg}{}", key_suffix(.key))]
pub struct InputError {
    msg: &'static str,
    key: Option<(usize, Vec<u8>)>,
}

impl InputError {
    /// Index and bytes of the offending key, if the error concerns one key.
    pub fn key(&self) -> Option<(usize, &[u8])> {
        self.key.as_ref().map(|(i, k)| (*i, k.as_slice()))
    }
}

fn key_suffix(key: &Option<(usize, Vec<u8>)>) -> String {
    key.as_ref().map_or_else(String::new, |(index, key)| {
        format!(" (key #{}: \"{}\")", index, key.escape_ascii())
    })
}

/// Error used when the scale of the input or the resulting array exceeds what the
/// unit encoding can address.
#[derive(Debug, Error)]
#[error("ScaleError: {arg} must be no greater than {max}")]
pub struct ScaleError {
    arg: &'static str,
    max: u32,
}

/// Error used when a dictionary image is malformed.
#[derive(Debug, Error)]
#[error("FormatError: {msg}{}{}", unit_suffix(.unit_index), file_suffix(.file))]
pub struct FormatError {
    msg: &'static str,
    unit_index: Option<usize>,
    file: Option<String>,
}

impl FormatError {
    /// Index of the offending unit, if any.
    pub const fn unit_index(&self) -> Option<usize> {
        self.unit_index
    }
}

fn unit_suffix(unit_index: &Option<usize>) -> String {
    unit_index.map_or_else(String::new, |i| format!(" at unit {}", i))
}

fn file_suffix(file: &Option<String>) -> String {
    file.as_ref()
        .map_or_else(String::new, |file| format!(" in {}", file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_display() {
        let e = DartError::input_at("keys must be sorted.", 3, b"ab\xff");
        assert_eq!(
            e.to_string(),
            "InputError: keys must be sorted. (key #3: \"ab\\xff\")"
        );
        if let DartError::Input(e) = e {
            assert_eq!(e.key(), Some((3, &b"ab\xff"[..])));
        } else {
            panic!();
        }
    }

    #[test]
    fn test_format_in_file() {
        let e = DartError::format("invalid root unit.", Some(0)).in_file(Path::new("a.dic"));
        assert_eq!(e.to_string(), "FormatError: invalid root unit. at unit 0 in a.dic");
    }

    #[test]
    fn test_display_without_context() {
        assert_eq!(
            DartError::input("the number of values must equal the number of keys.").to_string(),
            "InputError: the number of values must equal the number of keys."
        );
        assert_eq!(
            DartError::format("invalid offset.", None).to_string(),
            "FormatError: invalid offset."
        );
        assert_eq!(
            DartError::format("invalid offset.", Some(7)).to_string(),
            "FormatError: invalid offset. at unit 7"
        );
    }
}
