//! Forest configuration.

use crate::encoding::Detector;
use crate::error::{Error, Result};

/// How a forest picks its encoding detector.
#[derive(Debug, Clone, Default)]
pub enum DetectorChoice {
    /// Best detector compiled into this build, or none.
    #[default]
    Auto,
    /// Never guess; text is always read as UTF-8.
    Never,
    /// A caller-supplied detector, used as is.
    Custom(Detector),
}

impl DetectorChoice {
    /// Parse a detector name as written in config files and on the CLI.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(DetectorChoice::Auto),
            "none" | "never" => Ok(DetectorChoice::Never),
            _ => Err(Error::invalid_config(format!("Unknown detector: {}", s))),
        }
    }

    /// Turn the choice into a concrete detector.
    pub fn resolve(self) -> Detector {
        match self {
            DetectorChoice::Auto => Detector::auto(),
            DetectorChoice::Never => Detector::never(),
            DetectorChoice::Custom(detector) => detector,
        }
    }
}

/// Configuration accepted when building a [`Forest`](crate::Forest).
#[derive(Debug, Clone, Default)]
pub struct ForestConfig {
    pub detector: DetectorChoice,
}

impl ForestConfig {
    /// Use an explicit detector.
    pub fn with_detector(detector: Detector) -> Self {
        Self {
            detector: DetectorChoice::Custom(detector),
        }
    }

    /// Parse `key=value` lines.
    ///
    /// Blank lines and `#` comments are skipped. The only recognized key is
    /// `detector` (`auto`, `none`).
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::invalid_config(format!("Expected key=value: {}", line)))?;

            match key.trim() {
                "detector" => config.detector = DetectorChoice::parse(value.trim())?,
                other => {
                    return Err(Error::invalid_config(format!("Unknown key: {}", other)));
                }
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = ForestConfig::parse("detector=none\n").unwrap();
        assert!(matches!(config.detector, DetectorChoice::Never));
    }

    #[test]
    fn test_parse_config_with_comments() {
        let config = ForestConfig::parse("# comment\n\n detector = auto \n").unwrap();
        assert!(matches!(config.detector, DetectorChoice::Auto));
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        let config = ForestConfig::parse("").unwrap();
        assert!(matches!(config.detector, DetectorChoice::Auto));
    }

    #[test]
    fn test_parse_config_unknown_key() {
        assert!(ForestConfig::parse("color=auto\n").is_err());
    }

    #[test]
    fn test_parse_config_bad_line() {
        assert!(ForestConfig::parse("detector\n").is_err());
    }

    #[test]
    fn test_parse_config_unknown_detector() {
        assert!(ForestConfig::parse("detector=magic\n").is_err());
    }

    #[test]
    fn test_explicit_never_is_respected() {
        let config = ForestConfig::with_detector(Detector::never());
        let detector = config.detector.resolve();
        assert_eq!(detector.name(), "none");
        assert_eq!(detector.detect(b"anything"), None);
    }
}
