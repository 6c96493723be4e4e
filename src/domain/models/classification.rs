use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TRANSLATED_TEXT_KEY: &str = "translated_text";
pub const STATUS_KEY: &str = "status";

/// Which side of the deal an ad was posted by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Party {
    Buyer,
    Seller,
    Other(String),
}

impl Party {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "buyer" => Party::Buyer,
            "seller" => Party::Seller,
            _ => Party::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Party::Buyer => "buyer",
            Party::Seller => "seller",
            Party::Other(s) => s,
        }
    }
}

impl From<String> for Party {
    fn from(s: String) -> Self {
        Party::parse(&s)
    }
}

impl From<Party> for String {
    fn from(party: Party) -> Self {
        party.as_str().to_string()
    }
}

/// Presence check on a raw classifier answer: it must be an object holding
/// `translated_text` and `status`. Values are not inspected.
pub fn check_required_keys(raw: &Value) -> Result<(), String> {
    let object = raw
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;
    let missing: Vec<&str> = [TRANSLATED_TEXT_KEY, STATUS_KEY]
        .into_iter()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing keys: {}", missing.join(", ")))
    }
}

/// Typed view over the JSON object produced by the classifier assistant.
///
/// Only `translated_text` and `status` are interpreted. Everything else
/// (prices, quantities, phone numbers...) is carried through untouched in
/// `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    translated_text: String,
    status: Party,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl ClassificationResult {
    pub fn translated_text(&self) -> &str {
        &self.translated_text
    }

    pub fn status(&self) -> &Party {
        &self.status
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Checks that `raw` carries the two required keys as strings and splits it
    /// into the typed result. Never fails: shape problems become `Invalid`.
    pub fn validate(raw: Value) -> ClassificationOutcome {
        if let Err(reason) = check_required_keys(&raw) {
            return ClassificationOutcome::Invalid { reason, raw };
        }

        let mut attributes = raw.as_object().cloned().unwrap_or_default();
        let translated_text = match attributes.remove(TRANSLATED_TEXT_KEY) {
            Some(Value::String(s)) => s,
            _ => {
                return ClassificationOutcome::Invalid {
                    reason: format!("'{}' is not a string", TRANSLATED_TEXT_KEY),
                    raw,
                }
            }
        };
        let status = match attributes.remove(STATUS_KEY) {
            Some(Value::String(s)) => Party::parse(&s),
            _ => {
                return ClassificationOutcome::Invalid {
                    reason: format!("'{}' is not a string", STATUS_KEY),
                    raw,
                }
            }
        };

        ClassificationOutcome::Valid(Self {
            translated_text,
            status,
            attributes,
        })
    }
}

/// Result of validating a classifier response.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Valid(ClassificationResult),
    Invalid { reason: String, raw: Value },
}

impl ClassificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ClassificationOutcome::Valid(_))
    }

    pub fn into_result(self) -> Option<ClassificationResult> {
        match self {
            ClassificationOutcome::Valid(result) => Some(result),
            ClassificationOutcome::Invalid { .. } => None,
        }
    }
}
