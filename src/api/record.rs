//! Entity record extraction
//!
//! Person entries arrive as douban JSON feed objects, where text values are
//! wrapped as `{"$t": "..."}` and links are a list of `{"@rel", "@href"}`
//! objects. Each stored field is read through a static table of extractors,
//! so a missing attribute only blanks that one field.

use crate::graph::EntityRecord;
use serde_json::Value;

/// A raw record as returned by the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord(pub Value);

impl RawRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

type Extractor = fn(&Value) -> Option<String>;
type Setter = fn(&mut EntityRecord, String);

/// Field name, how to read it from a raw record, and where to store it
pub const FIELD_MAP: &[(&str, Extractor, Setter)] = &[
    ("id", extract_id, set_id),
    ("uid_text", extract_uid, set_uid_text),
    ("location", extract_location, set_location),
    ("display_name", extract_title, set_display_name),
    ("icon_url", extract_icon, set_icon_url),
    ("homepage_url", extract_homepage, set_homepage_url),
    ("description", extract_content, set_description),
];

/// Decodes a raw record into an entity record
///
/// Fields that are absent or of the wrong shape are left as `None` and
/// logged at debug level; extraction never fails as a whole.
pub fn extract_record(raw: &RawRecord) -> EntityRecord {
    let mut record = EntityRecord::default();
    for (name, extract, set) in FIELD_MAP {
        match extract(raw.value()) {
            Some(value) => set(&mut record, value),
            None => tracing::debug!("Record field '{}' missing or malformed", name),
        }
    }
    record
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.get("$t")?.as_str().map(str::to_string)
}

fn link(value: &Value, rel: &str) -> Option<String> {
    value
        .get("link")?
        .as_array()?
        .iter()
        .find(|l| l.get("@rel").and_then(Value::as_str) == Some(rel))?
        .get("@href")?
        .as_str()
        .map(str::to_string)
}

fn last_segment(uri: &str) -> Option<String> {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_id(value: &Value) -> Option<String> {
    link(value, "self")
        .or_else(|| text(value, "id"))
        .and_then(|uri| last_segment(&uri))
        .filter(|segment| segment.chars().all(|c| c.is_ascii_digit()))
}

fn extract_uid(value: &Value) -> Option<String> {
    text(value, "db:uid")
}

fn extract_location(value: &Value) -> Option<String> {
    text(value, "db:location")
}

fn extract_title(value: &Value) -> Option<String> {
    text(value, "title")
}

fn extract_icon(value: &Value) -> Option<String> {
    link(value, "icon")
}

fn extract_homepage(value: &Value) -> Option<String> {
    link(value, "homepage")
}

fn extract_content(value: &Value) -> Option<String> {
    text(value, "content")
}

fn set_id(record: &mut EntityRecord, value: String) {
    record.id = value.parse().ok();
}

fn set_uid_text(record: &mut EntityRecord, value: String) {
    record.uid_text = Some(value);
}

fn set_location(record: &mut EntityRecord, value: String) {
    record.location = Some(value);
}

fn set_display_name(record: &mut EntityRecord, value: String) {
    record.display_name = Some(value);
}

fn set_icon_url(record: &mut EntityRecord, value: String) {
    record.icon_url = Some(value);
}

fn set_homepage_url(record: &mut EntityRecord, value: String) {
    record.homepage_url = Some(value);
}

fn set_description(record: &mut EntityRecord, value: String) {
    record.description = Some(value);
}
