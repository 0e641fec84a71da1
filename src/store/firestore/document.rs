//! Translation between cards and Firestore documents
//!
//! Card documents look like:
//!
//! ```json
//! {
//!   "fields": {
//!     "frontSide":  { "stringValue": "einsehen" },
//!     "backSide":   { "stringValue": "to realize" },
//!     "level":      { "integerValue": "3" },
//!     "lastReview": { "mapValue": { "fields": {
//!         "epochSecond": { "integerValue": "1714557600" },
//!         "nano":        { "integerValue": "0" } } } }
//!   }
//! }
//! ```
//!
//! `lastReview` is also accepted as a `timestampValue`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::store::{Result, StoreError};

/// A Firestore document (only the parts cards use)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

/// A Firestore value. Exactly one variant key is present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(Option<String>),
    BooleanValue(bool),
    /// Int64 values travel as decimal strings
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    MapValue(MapValue),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

pub fn encode_card(card: &Card) -> Document {
    let last_review = card.last_review();
    let mut review_fields = BTreeMap::new();
    review_fields.insert(
        "epochSecond".to_string(),
        Value::IntegerValue(last_review.timestamp().to_string()),
    );
    review_fields.insert(
        "nano".to_string(),
        Value::IntegerValue(last_review.timestamp_subsec_nanos().to_string()),
    );

    let mut fields = BTreeMap::new();
    fields.insert(
        "frontSide".to_string(),
        Value::StringValue(card.front_side().to_string()),
    );
    fields.insert(
        "backSide".to_string(),
        Value::StringValue(card.back_side().to_string()),
    );
    fields.insert(
        "level".to_string(),
        Value::IntegerValue(card.level().to_string()),
    );
    fields.insert(
        "lastReview".to_string(),
        Value::MapValue(MapValue {
            fields: review_fields,
        }),
    );

    Document { name: None, fields }
}

pub fn decode_card(document: &Document) -> Result<Card> {
    let fields = &document.fields;

    let front_side = string_field(fields, "frontSide")?;
    let back_side = string_field(fields, "backSide")?;
    let level = integer_field(fields, "level")?;
    let level = i32::try_from(level)
        .map_err(|_| StoreError::Decode(format!("level out of range: {}", level)))?;
    let last_review = timestamp_field(fields, "lastReview")?;

    Card::builder()
        .front_side(front_side)
        .back_side(back_side)
        .level(level)
        .last_review(last_review)
        .build()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn field<'a>(fields: &'a BTreeMap<String, Value>, name: &str) -> Result<&'a Value> {
    fields
        .get(name)
        .ok_or_else(|| StoreError::Decode(format!("missing field '{}'", name)))
}

fn string_field(fields: &BTreeMap<String, Value>, name: &str) -> Result<String> {
    match field(fields, name)? {
        Value::StringValue(s) => Ok(s.clone()),
        other => Err(StoreError::Decode(format!("field '{}' is not a string: {:?}", name, other))),
    }
}

fn integer_field(fields: &BTreeMap<String, Value>, name: &str) -> Result<i64> {
    match field(fields, name)? {
        Value::IntegerValue(s) => s
            .parse()
            .map_err(|_| StoreError::Decode(format!("field '{}' is not an integer: {}", name, s))),
        other => Err(StoreError::Decode(format!("field '{}' is not an integer: {:?}", name, other))),
    }
}

fn timestamp_field(fields: &BTreeMap<String, Value>, name: &str) -> Result<DateTime<Utc>> {
    match field(fields, name)? {
        Value::MapValue(map) => {
            let seconds = integer_field(&map.fields, "epochSecond")?;
            let nanos = match map.fields.get("nano") {
                Some(_) => integer_field(&map.fields, "nano")?,
                None => 0,
            };
            let nanos = u32::try_from(nanos)
                .map_err(|_| StoreError::Decode(format!("invalid nano value: {}", nanos)))?;
            DateTime::from_timestamp(seconds, nanos)
                .ok_or_else(|| StoreError::Decode(format!("timestamp out of range: {}", seconds)))
        }
        Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Decode(format!("invalid timestamp '{}': {}", s, e))),
        other => Err(StoreError::Decode(format!("field '{}' is not a timestamp: {:?}", name, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_card() -> Card {
        Card::builder()
            .front_side("einsehen")
            .back_side("понять, изучить, убедиться")
            .level(3)
            .last_review(Utc.timestamp_opt(1_714_557_600, 250).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_stored_document() {
        let raw = r#"{
            "name": "projects/p/databases/(default)/documents/users/coden/deck/einsehen",
            "fields": {
                "frontSide": {"stringValue": "einsehen"},
                "backSide": {"stringValue": "понять, изучить, убедиться"},
                "level": {"integerValue": "3"},
                "lastReview": {"mapValue": {"fields": {
                    "epochSecond": {"integerValue": "1714557600"},
                    "nano": {"integerValue": "250"}
                }}}
            },
            "createTime": "2024-05-01T10:00:00Z",
            "updateTime": "2024-05-01T10:00:00Z"
        }"#;
        let document: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(decode_card(&document).unwrap(), sample_card());
    }

    #[test]
    fn test_encode_wire_shape() {
        let json = serde_json::to_value(encode_card(&sample_card())).unwrap();
        assert!(json.get("name").is_none());
        assert_eq!(json["fields"]["level"]["integerValue"], "3");
        assert_eq!(
            json["fields"]["lastReview"]["mapValue"]["fields"]["epochSecond"]["integerValue"],
            "1714557600"
        );
        assert_eq!(json["fields"]["frontSide"]["stringValue"], "einsehen");
    }

    #[test]
    fn test_decode_timestamp_value() {
        let mut document = encode_card(&sample_card());
        document.fields.insert(
            "lastReview".to_string(),
            Value::TimestampValue("2024-05-01T10:00:00Z".to_string()),
        );
        let card = decode_card(&document).unwrap();
        assert_eq!(card.last_review().timestamp(), 1_714_557_600);
    }

    #[test]
    fn test_decode_missing_field() {
        let mut document = encode_card(&sample_card());
        document.fields.remove("backSide");
        assert!(matches!(decode_card(&document), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_type() {
        let mut document = encode_card(&sample_card());
        document
            .fields
            .insert("level".to_string(), Value::StringValue("three".to_string()));
        assert!(matches!(decode_card(&document), Err(StoreError::Decode(_))));
    }
}
