//! Production line identifiers
//!
//! A checksheet is always filled in for one physical line. The line decides
//! which sub-units (lines, laminators, trimmers, stringers) the
//! line-dependent parameters collect observations for.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Physical production line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductionLine {
    /// Line I (Line-1/Line-2, Laminator-1..4, Stringer-1..6)
    #[serde(rename = "I")]
    I,
    /// Line II (Line-3/Line-4, Laminator-5..8, Stringer-7..12)
    #[serde(rename = "II")]
    II,
}

impl ProductionLine {
    /// Wire/display label ("I" or "II")
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionLine::I => "I",
            ProductionLine::II => "II",
        }
    }

    /// All lines in declaration order
    pub fn all() -> &'static [ProductionLine] {
        &[ProductionLine::I, ProductionLine::II]
    }
}

impl fmt::Display for ProductionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductionLine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "I" | "1" => Ok(ProductionLine::I),
            "II" | "2" => Ok(ProductionLine::II),
            other => Err(Error::InvalidInput(format!(
                "unknown production line '{}' (expected I or II)",
                other
            ))),
        }
    }
}

/// Serde adapter storing an unset line as the empty string
///
/// Saved checksheets carry `"lineNumber": ""` until the operator picks a line.
pub mod optional_line {
    use super::*;

    pub fn serialize<S: Serializer>(
        line: &Option<ProductionLine>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(line.map(|l| l.as_str()).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ProductionLine>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!("I".parse::<ProductionLine>().unwrap(), ProductionLine::I);
        assert_eq!(" II ".parse::<ProductionLine>().unwrap(), ProductionLine::II);
        assert!("III".parse::<ProductionLine>().is_err());
    }

    #[test]
    fn test_serde_labels() {
        assert_eq!(serde_json::to_string(&ProductionLine::II).unwrap(), "\"II\"");
        let line: ProductionLine = serde_json::from_str("\"I\"").unwrap();
        assert_eq!(line, ProductionLine::I);
    }

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "optional_line", default)]
        line: Option<ProductionLine>,
    }

    #[test]
    fn test_optional_line_empty_string() {
        let holder: Holder = serde_json::from_str(r#"{"line": ""}"#).unwrap();
        assert!(holder.line.is_none());

        let json = serde_json::to_string(&Holder { line: None }).unwrap();
        assert_eq!(json, r#"{"line":""}"#);

        let holder: Holder = serde_json::from_str(r#"{"line": null}"#).unwrap();
        assert!(holder.line.is_none());
    }
}
