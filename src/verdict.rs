//! Binary grading outcome

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pass/fail outcome of one comparison; there is no partial credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Returns true for `Pass`
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// `1` for pass, `0` for fail
    pub fn as_int(&self) -> u8 {
        match self {
            Verdict::Pass => 1,
            Verdict::Fail => 0,
        }
    }
}

impl From<bool> for Verdict {
    fn from(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_int())
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_int())
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Verdict::Fail),
            1 => Ok(Verdict::Pass),
            other => Err(serde::de::Error::custom(format!(
                "verdict must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Pass);
        assert_eq!(Verdict::from(false), Verdict::Fail);
    }

    #[test]
    fn test_serializes_as_int() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Verdict>("0").unwrap(), Verdict::Fail);
        assert!(serde_json::from_str::<Verdict>("2").is_err());
    }
}
