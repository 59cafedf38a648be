use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A publication exactly as a collaborator handed it over.
///
/// Keys and value shapes depend on the source; a [`FieldMap`] says where to look.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Value::String(value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First key in `keys` that holds usable text.
    fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k).and_then(text))
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        RawRecord(map)
    }
}

/// Where a source keeps each semantic field, in order of preference.
#[derive(Debug)]
pub struct FieldMap {
    pub title: &'static [&'static str],
    pub authors: &'static [&'static str],
    pub journal: &'static [&'static str],
    pub date: &'static [&'static str],
    pub link: &'static [&'static str],
    pub citation_id: &'static [&'static str],
}

/// Normalized publication metadata.
///
/// Field order here is the key order of the written JSON objects. Fields without content are
/// never serialized.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationRecord {
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Authors", skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(rename = "Journal", skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(rename = "Publication date", skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(rename = "Link", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "Citation ID", skip_serializing_if = "Option::is_none")]
    pub citation_id: Option<String>,
}

impl PublicationRecord {
    pub fn is_empty(&self) -> bool {
        *self == PublicationRecord::default()
    }

    /// Whether the record goes into the "Journal" bucket.
    pub fn has_journal(&self) -> bool {
        self.journal.as_deref().is_some_and(|j| !j.trim().is_empty())
    }
}

/// Map a raw record onto the common shape, dropping every field that has no content.
pub fn normalize(raw: &RawRecord, fields: &FieldMap) -> PublicationRecord {
    PublicationRecord {
        title: raw.first_text(fields.title),
        authors: raw.first_text(fields.authors),
        journal: raw.first_text(fields.journal),
        publication_date: raw.first_text(fields.date),
        link: raw.first_text(fields.link),
        citation_id: raw.first_text(fields.citation_id),
    }
}

/// Render a JSON value as field text. Null, empty and structured values have none.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Null | Value::Bool(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: FieldMap = FieldMap {
        title: &["title"],
        authors: &["authors", "inventors"],
        journal: &["publication"],
        date: &["year"],
        link: &["link"],
        citation_id: &["citation_id"],
    };

    fn raw(v: Value) -> RawRecord {
        match v {
            Value::Object(map) => RawRecord::from(map),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn maps_all_fields() {
        let r = normalize(
            &raw(json!({
                "title": "Deep Learning",
                "authors": "Y LeCun, Y Bengio, G Hinton",
                "publication": "Nature 521 (7553), 436-444, 2015",
                "year": "2015",
                "link": "https://scholar.google.com/x",
                "citation_id": "abc:123",
                "cited_by": {"value": 5},
            })),
            &FIELDS,
        );
        assert_eq!(r.title.as_deref(), Some("Deep Learning"));
        assert_eq!(r.authors.as_deref(), Some("Y LeCun, Y Bengio, G Hinton"));
        assert_eq!(r.journal.as_deref(), Some("Nature 521 (7553), 436-444, 2015"));
        assert_eq!(r.publication_date.as_deref(), Some("2015"));
        assert_eq!(r.link.as_deref(), Some("https://scholar.google.com/x"));
        assert_eq!(r.citation_id.as_deref(), Some("abc:123"));
        assert!(r.has_journal());
    }

    #[test]
    fn title_only_record_serializes_to_single_key() {
        let r = normalize(&raw(json!({"title": "A", "publication": "", "year": null})), &FIELDS);
        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out, json!({"Title": "A"}));
        assert!(!r.has_journal());
    }

    #[test]
    fn falls_back_to_later_keys() {
        let r = normalize(&raw(json!({"authors": "  ", "inventors": "J Doe"})), &FIELDS);
        assert_eq!(r.authors.as_deref(), Some("J Doe"));
    }

    #[test]
    fn numeric_year_and_author_arrays_become_text() {
        let r = normalize(
            &raw(json!({"year": 2019, "authors": ["A Smith", "", "B Jones"]})),
            &FIELDS,
        );
        assert_eq!(r.publication_date.as_deref(), Some("2019"));
        assert_eq!(r.authors.as_deref(), Some("A Smith, B Jones"));
    }

    #[test]
    fn record_without_fields_is_empty() {
        let r = normalize(&raw(json!({"unrelated": "x", "title": null})), &FIELDS);
        assert!(r.is_empty());
        assert_eq!(serde_json::to_string(&r).unwrap(), "{}");
    }

    #[test]
    fn key_order_is_fixed() {
        let r = normalize(
            &raw(json!({"citation_id": "c", "year": "2020", "title": "T", "publication": "J"})),
            &FIELDS,
        );
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"Title":"T","Journal":"J","Publication date":"2020","Citation ID":"c"}"#
        );
    }

    fn field() -> impl proptest::strategy::Strategy<Value = Option<String>> {
        proptest::option::of(proptest::prop_oneof!["[ \t]{0,3}", "[A-Za-z0-9 ]{0,12}"])
    }

    #[test]
    fn never_emits_empty_fields() {
        proptest::proptest!(|(t in field(), a in field(), p in field(), y in field())| {
            let mut map = Map::new();
            for (k, v) in [("title", t), ("authors", a), ("publication", p), ("year", y)] {
                map.insert(k.to_string(), v.map(Value::String).unwrap_or(Value::Null));
            }
            let r = normalize(&RawRecord::from(map), &FIELDS);
            let out = serde_json::to_value(&r).unwrap();
            for (_, v) in out.as_object().unwrap() {
                let s = v.as_str().unwrap();
                proptest::prop_assert!(!s.trim().is_empty());
            }
            proptest::prop_assert_eq!(r.has_journal(), r.journal.is_some());
        })
    }
}
