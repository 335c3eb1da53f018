//! Record normalization
//!
//! Merges the search-only side-channel fields into the detail record,
//! producing one self-contained record per profile. Pure function. Returns
//! `None` only when the detail payload lacks the nested profile object: a
//! stale or garbage payload can follow a successful-looking call, and the
//! caller handles it by refreshing the token and refetching.

use serde_json::Value;

use crate::api::types::{DetailEnvelope, NormalizedRecord, SearchStub};

/// Merge a detail payload with its search stub.
///
/// Stub-derived fields overwrite any detail field of the same name: the
/// search response is the authority on ranking and region data. All fields
/// are attached or no record is produced; a partial record never exists.
pub fn normalize(envelope: DetailEnvelope, stub: &SearchStub) -> Option<NormalizedRecord> {
    let mut detail = envelope.profile?;

    detail.extra.insert(
        "is_first_name_female".to_string(),
        to_value(&stub.is_first_name_female),
    );
    detail
        .extra
        .insert("sub_region".to_string(), to_value(&stub.sub_region));
    detail
        .extra
        .insert("region".to_string(), to_value(&stub.region));
    detail
        .extra
        .insert("weight".to_string(), to_value(&stub.weight));
    detail
        .extra
        .insert("match_score".to_string(), to_value(&stub.match_score));

    let profile_id = detail.id;
    let payload = serde_json::to_value(detail).ok()?;

    Some(NormalizedRecord {
        profile_id,
        payload,
    })
}

fn to_value<T: serde::Serialize>(field: &T) -> Value {
    serde_json::to_value(field).unwrap_or(Value::Null)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stub() -> SearchStub {
        SearchStub {
            profile_id: 42,
            is_first_name_female: Some(false),
            sub_region: Some("Northern Europe".to_string()),
            region: Some("EMEA".to_string()),
            weight: Some(12),
            match_score: Some(json!("0.87")),
        }
    }

    fn envelope(profile: Value) -> DetailEnvelope {
        serde_json::from_value(json!({ "profile": profile })).unwrap()
    }

    #[test]
    fn test_merges_stub_fields_into_detail() {
        let record = normalize(
            envelope(json!({"id": 42, "full_name": "Linus"})),
            &stub(),
        )
        .unwrap();

        assert_eq!(record.profile_id, 42);
        assert_eq!(record.payload["id"], json!(42));
        assert_eq!(record.payload["full_name"], json!("Linus"));
        assert_eq!(record.payload["region"], json!("EMEA"));
        assert_eq!(record.payload["sub_region"], json!("Northern Europe"));
        assert_eq!(record.payload["weight"], json!(12));
        assert_eq!(record.payload["match_score"], json!("0.87"));
        assert_eq!(record.payload["is_first_name_female"], json!(false));
    }

    #[test]
    fn test_stub_fields_win_over_detail_fields() {
        let record = normalize(
            envelope(json!({"id": 42, "region": "stale-value"})),
            &stub(),
        )
        .unwrap();

        assert_eq!(record.payload["region"], json!("EMEA"));
    }

    #[test]
    fn test_missing_profile_object_is_malformed() {
        let malformed: DetailEnvelope = serde_json::from_value(json!({"error": "oops"})).unwrap();
        assert!(normalize(malformed, &stub()).is_none());
    }

    #[test]
    fn test_absent_stub_fields_are_attached_as_null() {
        let empty_stub = SearchStub {
            profile_id: 42,
            is_first_name_female: None,
            sub_region: None,
            region: None,
            weight: None,
            match_score: None,
        };

        let record = normalize(envelope(json!({"id": 42})), &empty_stub).unwrap();
        assert_eq!(record.payload["region"], Value::Null);
        assert_eq!(record.payload["weight"], Value::Null);
    }
}
