//! Open record model and string normalisation helpers.

use serde_json::{Map, Value};

/// An inventory record as exchanged with either upstream system.
///
/// Schemas are owned by the upstream APIs, so records stay open: adapters
/// touch the fields they know about and pass everything else through.
/// Field order is preserved.
pub type Record = Map<String, Value>;

/// Display name of the canonical fallback site and manufacturer.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Slug of the canonical fallback site and manufacturer.
pub const UNKNOWN_SLUG: &str = "unknown";

/// Builds a sink slug: lower-cased, spaces replaced by dashes.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Title-cases a name: the first letter of every alphabetic run is upper-cased,
/// the rest lower-cased.
///
/// `"CISCO SYSTEMS"` becomes `"Cisco Systems"` and `"f5 networks"` becomes
/// `"F5 Networks"`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_word = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Normalises a display name for name → id lookups.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Extracts a sink id from a foreign-key value.
///
/// Incoming records carry plain integer ids after adaptation, while sink
/// read responses nest references as objects (`{"id": 7, "name": ...}`).
pub fn reference_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Object(map) => map.get("id").and_then(Value::as_i64),
        _ => None,
    }
}

/// Returns a string field, treating `null` and non-strings as absent.
pub fn text_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// Best-effort human name of a record for log lines.
pub fn display_name(record: &Record) -> String {
    ["name", "model", "display"]
        .iter()
        .find_map(|field| text_field(record, field))
        .map(str::to_string)
        .or_else(|| record.get("id").map(Value::to_string))
        .unwrap_or_else(|| "<unnamed>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn slug_replaces_spaces_and_lowercases() {
        assert_eq!(slugify("Palo Alto Networks"), "palo-alto-networks");
        assert_eq!(slugify("unknown"), "unknown");
        assert_eq!(slugify("ASR 1001-X"), "asr-1001-x");
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("CISCO"), "Cisco");
        assert_eq!(title_case("palo alto networks"), "Palo Alto Networks");
        assert_eq!(title_case("f5"), "F5");
        assert_eq!(title_case("hewlett-packard"), "Hewlett-Packard");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  NYC-DC1 "), "nyc-dc1");
    }

    #[test]
    fn reference_id_accepts_plain_and_nested() {
        assert_eq!(reference_id(&json!(7)), Some(7));
        assert_eq!(reference_id(&json!({"id": 9, "name": "core1"})), Some(9));
        assert_eq!(reference_id(&json!("core1")), None);
        assert_eq!(reference_id(&Value::Null), None);
    }

    #[test]
    fn display_name_falls_back() {
        let named = json!({"name": "edge1"}).as_object().cloned().unwrap();
        assert_eq!(display_name(&named), "edge1");

        let model = json!({"model": "MX480"}).as_object().cloned().unwrap();
        assert_eq!(display_name(&model), "MX480");

        let bare = json!({"id": 4}).as_object().cloned().unwrap();
        assert_eq!(display_name(&bare), "4");

        assert_eq!(display_name(&Record::new()), "<unnamed>");
    }

    proptest! {
        #[test]
        fn slug_has_no_spaces_or_uppercase(name in "[A-Za-z0-9 ]{0,40}") {
            let slug = slugify(&name);
            prop_assert!(!slug.contains(' '));
            prop_assert_eq!(slug.to_lowercase(), slug.clone());
            prop_assert_eq!(slugify(&slug), slug);
        }

        #[test]
        fn title_case_is_stable(name in "[a-zA-Z ]{0,40}") {
            let once = title_case(&name);
            prop_assert_eq!(title_case(&once), once.clone());
            prop_assert_eq!(normalize(&once), normalize(&name));
        }
    }
}
