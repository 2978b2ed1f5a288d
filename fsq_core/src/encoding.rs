//! Encoding detection strategy and decoding helpers.
//!
//! A [`Detector`] maps raw bytes to an encoding label, or declines. One
//! detector is chosen when a forest is built and every node in that forest
//! shares it.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// Shared detector function: raw bytes in, encoding label out.
pub type DetectFn = dyn Fn(&[u8]) -> Option<String>;

/// A cheaply clonable handle on a detection function.
#[derive(Clone)]
pub struct Detector {
    name: &'static str,
    detect: Rc<DetectFn>,
}

impl Detector {
    /// Wrap an arbitrary detection function.
    pub fn new(detect: impl Fn(&[u8]) -> Option<String> + 'static) -> Self {
        Self {
            name: "custom",
            detect: Rc::new(detect),
        }
    }

    /// A detector that never guesses.
    pub fn never() -> Self {
        Self {
            name: "none",
            detect: Rc::new(|_| None),
        }
    }

    /// The best detector available in this build.
    ///
    /// Uses `chardetng` when the `detect` feature is enabled, otherwise
    /// falls back to [`Detector::never`].
    pub fn auto() -> Self {
        #[cfg(feature = "detect")]
        {
            chardet::detector()
        }
        #[cfg(not(feature = "detect"))]
        {
            log::debug!("encoding detection not compiled in, never guessing");
            Self::never()
        }
    }

    /// Short description of the strategy in use.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Guess the encoding of `bytes`.
    pub fn detect(&self, bytes: &[u8]) -> Option<String> {
        (self.detect)(bytes)
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector").field("name", &self.name).finish()
    }
}

#[cfg(feature = "detect")]
mod chardet {
    use super::Detector;
    use chardetng::EncodingDetector;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Stateful chardetng detector, reset after every guess.
    pub(super) fn detector() -> Detector {
        let state = RefCell::new(EncodingDetector::new());
        Detector {
            name: "chardetng",
            detect: Rc::new(move |bytes: &[u8]| {
                let mut state = state.borrow_mut();
                state.feed(bytes, true);
                let guess = state.guess(None, true);
                *state = EncodingDetector::new();
                Some(guess.name().to_string())
            }),
        }
    }
}

/// Strictly decode `bytes` with the encoding named by `label`.
///
/// Fails with [`Error::Decode`] when the label is unknown or the bytes are
/// malformed for that encoding.
pub fn decode(path: &Path, bytes: &[u8], label: &str) -> Result<String> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::decode(path, label))?;

    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| Error::decode(path, encoding.name()))
}

/// Decode `bytes` with the platform default text encoding (UTF-8).
pub fn decode_default(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| Error::decode(path, "UTF-8"))
}
