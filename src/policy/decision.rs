//! Decision effects and evaluation responses.

use crate::error::{Error, ErrorKind};
use crate::expression::AttributeAssignment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a rule, policy or policy set evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Effect {
    /// Deny the request
    Deny = 0,
    /// Permit the request
    Permit,
    /// Nothing applies to the request
    NotApplicable,
    /// Evaluation failed
    Indeterminate,
    /// Evaluation failed where only Deny was possible
    #[serde(rename = "Indeterminate{D}")]
    IndeterminateD,
    /// Evaluation failed where only Permit was possible
    #[serde(rename = "Indeterminate{P}")]
    IndeterminateP,
    /// Evaluation failed where both Deny and Permit were possible
    #[serde(rename = "Indeterminate{DP}")]
    IndeterminateDP,
}

/// Every effect in code order.
pub const EFFECTS: [Effect; 7] = [
    Effect::Deny,
    Effect::Permit,
    Effect::NotApplicable,
    Effect::Indeterminate,
    Effect::IndeterminateD,
    Effect::IndeterminateP,
    Effect::IndeterminateDP,
];

impl Effect {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Effect by numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        EFFECTS.get(code as usize).copied()
    }

    /// Get the string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Deny => "Deny",
            Effect::Permit => "Permit",
            Effect::NotApplicable => "NotApplicable",
            Effect::Indeterminate => "Indeterminate",
            Effect::IndeterminateD => "Indeterminate{D}",
            Effect::IndeterminateP => "Indeterminate{P}",
            Effect::IndeterminateDP => "Indeterminate{DP}",
        }
    }

    /// Check if this is one of the indeterminate effects.
    pub fn is_indeterminate(self) -> bool {
        matches!(
            self,
            Effect::Indeterminate
                | Effect::IndeterminateD
                | Effect::IndeterminateP
                | Effect::IndeterminateDP
        )
    }

    /// Check if the effect is a final decision carrying obligations.
    pub fn is_decisive(self) -> bool {
        matches!(self, Effect::Deny | Effect::Permit)
    }
}

impl Default for Effect {
    fn default() -> Self {
        Effect::NotApplicable
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Effect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EFFECTS
            .iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidEffectName {
                    name: s.to_string(),
                })
            })
    }
}

/// Result of an evaluation: effect, the error explaining an indeterminate
/// effect and obligations of a decisive one.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Effect
    pub effect: Effect,
    /// Error which led to indeterminate effect
    pub status: Option<Error>,
    /// Obligations to calculate for the decision
    pub obligations: Vec<AttributeAssignment>,
}

impl Response {
    /// Response with the effect only.
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            status: None,
            obligations: Vec::new(),
        }
    }

    /// Not applicable response.
    pub fn not_applicable() -> Self {
        Self::new(Effect::NotApplicable)
    }

    /// Decisive response with obligations.
    pub fn with_obligations(effect: Effect, obligations: Vec<AttributeAssignment>) -> Self {
        Self {
            effect,
            status: None,
            obligations,
        }
    }

    /// Indeterminate response with its cause.
    pub fn with_status(effect: Effect, status: Error) -> Self {
        Self {
            effect,
            status: Some(status),
            obligations: Vec::new(),
        }
    }

    /// Bind the status (if any) to the given source.
    pub(crate) fn bind(mut self, src: impl Into<String>) -> Self {
        if let Some(err) = self.status.take() {
            self.status = Some(err.bind(src));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_codes() {
        for (i, e) in EFFECTS.iter().enumerate() {
            assert_eq!(e.code() as usize, i);
            assert_eq!(Effect::from_code(i as u8), Some(*e));
        }
        assert_eq!(Effect::from_code(7), None);
    }

    #[test]
    fn test_effect_from_str() {
        assert_eq!("Permit".parse::<Effect>().unwrap(), Effect::Permit);
        assert_eq!(
            "indeterminate{dp}".parse::<Effect>().unwrap(),
            Effect::IndeterminateDP
        );
        let err = "allow".parse::<Effect>().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidEffectName { .. }));
    }

    #[test]
    fn test_effect_serialization() {
        let json = serde_json::to_string(&Effect::IndeterminateP).unwrap();
        assert_eq!(json, "\"Indeterminate{P}\"");

        let parsed: Effect = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Effect::IndeterminateP);
    }

    #[test]
    fn test_effect_classes() {
        assert!(Effect::Deny.is_decisive());
        assert!(!Effect::NotApplicable.is_decisive());
        assert!(Effect::IndeterminateDP.is_indeterminate());
        assert!(!Effect::Permit.is_indeterminate());
    }
}
