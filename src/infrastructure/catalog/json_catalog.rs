//! JSON catalog source
//!
//! Reads signature definitions from a JSON document. The document is either
//! an array of signature records or an object with a `signatures` array.
//! Each segment element is an object with a single tag:
//!
//! ```json
//! { "id": "gif89a", "mimetype": "image/gif", "parent": "gif",
//!   "format": [ { "constant": { "string": "GIF89a" } },
//!               { "any": { "min": 0 } } ] }
//! ```

use crate::domain::entities::{ContentSignature, Length, Segment};
use crate::domain::repositories::{CatalogError, CatalogSource};
use crate::domain::services::DefinitionPolicy;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Origin {
    Path(PathBuf),
    Text(String),
}

/// Catalog loaded from a JSON file or string
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    origin: Origin,
    name: String,
    policy: DefinitionPolicy,
}

impl JsonCatalog {
    /// Catalog read from `path` when loaded
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            origin: Origin::Path(path),
            policy: DefinitionPolicy::Strict,
        }
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Text(text.into()),
            name: name.into(),
            policy: DefinitionPolicy::Strict,
        }
    }

    /// Under the lenient policy malformed records are logged and skipped
    pub fn with_policy(mut self, policy: DefinitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn read(&self) -> Result<String, CatalogError> {
        match &self.origin {
            Origin::Path(path) => std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            }),
            Origin::Text(text) => Ok(text.clone()),
        }
    }

    fn records(&self, text: &str) -> Result<Vec<Value>, CatalogError> {
        let parse_error = |message: String| CatalogError::Parse {
            source_name: self.name.clone(),
            message,
        };

        match serde_json::from_str::<Value>(text).map_err(|e| parse_error(e.to_string()))? {
            Value::Array(records) => Ok(records),
            Value::Object(mut document) => match document.remove("signatures") {
                Some(Value::Array(records)) => Ok(records),
                _ => Err(parse_error("expected a `signatures` array".to_string())),
            },
            _ => Err(parse_error("expected an array of signatures".to_string())),
        }
    }
}

impl CatalogSource for JsonCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<ContentSignature>, CatalogError> {
        let text = self.read()?;
        let records = self.records(&text)?;
        let mut signatures = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            match decode_signature(record, index) {
                Ok(signature) => signatures.push(signature),
                Err(e) if self.policy == DefinitionPolicy::Lenient => {
                    tracing::warn!(catalog = %self.name, error = %e, "skipping malformed signature");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(catalog = %self.name, signatures = signatures.len(), "parsed JSON catalog");
        Ok(signatures)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignatureRecord {
    id: String,
    #[serde(default)]
    title: Option<String>,
    mimetype: String,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default, alias = "technical-parent")]
    parent: Option<String>,
    format: Vec<SegmentRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SegmentRecord {
    Any(AnyRecord),
    Constant(ConstantRecord),
    Key(KeyRecord),
    Value(SpanRecord),
    Eos(EmptyRecord),
    Range(RangeRecord),
    Sequence(Vec<SegmentRecord>),
    Repeat(RepeatRecord),
    Choice(Vec<SegmentRecord>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnyRecord {
    length: Option<u64>,
    min: Option<u64>,
    max: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstantRecord {
    hex: Option<String>,
    string: Option<String>,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyRecord {
    prefix: String,
    #[serde(default)]
    min: u64,
    max: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpanRecord {
    #[serde(default)]
    min: u64,
    max: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyRecord {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RangeRecord {
    hex_min: String,
    hex_max: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepeatRecord {
    #[serde(default = "one")]
    min: i64,
    max: Option<i64>,
    segments: Vec<SegmentRecord>,
}

fn one() -> i64 {
    1
}

fn decode_signature(record: Value, index: usize) -> Result<ContentSignature, CatalogError> {
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("#{}", index), str::to_string);

    let record: SignatureRecord = serde_json::from_value(record).map_err(|e| CatalogError::Schema {
        id: id.clone(),
        message: e.to_string(),
    })?;

    let format = record
        .format
        .into_iter()
        .map(|segment| segment.into_segment(&id))
        .collect::<Result<Vec<_>, _>>()?;

    let mut signature = ContentSignature::new(record.id, record.mimetype, format);
    if let Some(title) = record.title {
        signature = signature.with_title(title);
    }
    if let Some(parent) = record.parent {
        signature = signature.with_parent(parent);
    }
    if record.is_abstract {
        signature = signature.into_abstract();
    }
    Ok(signature)
}

fn bound(max: Option<u64>) -> Length {
    max.map_or(Length::INFINITE, Length::finite)
}

impl SegmentRecord {
    fn into_segment(self, id: &str) -> Result<Segment, CatalogError> {
        let schema = |message: &str| CatalogError::Schema {
            id: id.to_string(),
            message: message.to_string(),
        };
        let definition = |e: crate::core::SignatureDefinitionError| CatalogError::Definition(e.in_signature(id));
        let children = |records: Vec<SegmentRecord>| {
            records
                .into_iter()
                .map(|r| r.into_segment(id))
                .collect::<Result<Vec<_>, _>>()
        };

        let segment = match self {
            SegmentRecord::Any(AnyRecord { length, min, max }) => match (length, min, max) {
                (Some(length), None, None) => Segment::any(length),
                (None, min, max) => Segment::any_between(min.unwrap_or(0), bound(max)),
                _ => return Err(schema("`any` takes either `length` or `min`/`max`")),
            },
            SegmentRecord::Constant(ConstantRecord {
                hex,
                string,
                encoding,
            }) => match (hex, string) {
                (Some(hex), None) if encoding.is_none() => Segment::constant_hex(&hex).map_err(definition)?,
                (None, Some(text)) => Segment::constant_text(&text, encoding.as_deref()).map_err(definition)?,
                (Some(_), None) => return Err(schema("`encoding` applies to `string` constants only")),
                _ => return Err(schema("`constant` takes exactly one of `hex` or `string`")),
            },
            SegmentRecord::Key(KeyRecord { prefix, min, max }) => Segment::key_between(prefix, min, bound(max)),
            SegmentRecord::Value(SpanRecord { min, max }) => Segment::value_between(min, bound(max)),
            SegmentRecord::Eos(EmptyRecord {}) => Segment::eos(),
            SegmentRecord::Range(RangeRecord { hex_min, hex_max }) => {
                Segment::range_hex(&hex_min, &hex_max).map_err(definition)?
            }
            SegmentRecord::Sequence(records) => Segment::sequence(children(records)?),
            SegmentRecord::Repeat(RepeatRecord { min, max, segments }) => {
                Segment::repeat(children(segments)?, min, max)
            }
            SegmentRecord::Choice(records) => Segment::choice(children(records)?),
        };
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load(text: &str) -> Result<Vec<ContentSignature>, CatalogError> {
        JsonCatalog::from_text("test", text).load()
    }

    #[test]
    fn test_decodes_every_segment_kind() {
        let signatures = load(
            r#"[{
                "id": "all", "mimetype": "application/x-all", "title": "Everything",
                "format": [
                    { "constant": { "hex": "CA FE" } },
                    { "constant": { "string": "ab", "encoding": "UTF-16LE" } },
                    { "range": { "hexMin": "00", "hexMax": "7F" } },
                    { "any": { "length": 2 } },
                    { "key": { "prefix": "k=", "max": 4 } },
                    { "value": { "min": 1 } },
                    { "repeat": { "max": 3, "segments": [ { "constant": { "string": ";" } } ] } },
                    { "choice": [ { "constant": { "string": "x" } }, { "sequence": [ { "eos": {} } ] } ] }
                ]
            }]"#,
        )
        .unwrap();

        let format = signatures[0].format();
        assert_eq!(signatures[0].title(), "Everything");
        assert_eq!(format[0], Segment::constant(vec![0xCA, 0xFE]));
        assert_eq!(format[1], Segment::constant(vec![b'a', 0, b'b', 0]));
        assert_eq!(format[2], Segment::range(vec![0x00], vec![0x7F]));
        assert_eq!(format[3], Segment::any(2));
        assert_eq!(format[4], Segment::key_between("k=", 0, Length::finite(4)));
        assert_eq!(format[5], Segment::value_between(1, Length::INFINITE));
        assert_eq!(
            format[6],
            Segment::repeat(vec![Segment::constant(";")], 1, Some(3))
        );
        assert_eq!(
            format[7],
            Segment::choice(vec![
                Segment::constant("x"),
                Segment::sequence(vec![Segment::eos()]),
            ])
        );
    }

    #[test]
    fn test_parent_alias_and_abstract() {
        let signatures = load(
            r#"{ "signatures": [
                { "id": "image", "mimetype": "image/*", "abstract": true, "format": [ { "any": { "length": 1 } } ] },
                { "id": "gif", "mimetype": "image/gif", "technical-parent": "image", "format": [ { "constant": { "string": "GIF" } } ] }
            ] }"#,
        )
        .unwrap();

        assert!(signatures[0].is_abstract());
        assert_eq!(signatures[1].parent(), Some("image"));
    }

    #[test]
    fn test_errors_name_the_signature() {
        let err = load(r#"[{ "id": "bad", "mimetype": "x/y", "format": [ { "constant": { "hex": "ZZ" } } ] }]"#)
            .unwrap_err();
        assert!(err.to_string().contains("bad"));

        let err = load(r#"[{ "id": "shape", "mimetype": "x/y", "format": [ { "bogus": {} } ] }]"#).unwrap_err();
        assert!(matches!(err, CatalogError::Schema { ref id, .. } if id == "shape"));
    }

    #[test]
    fn test_lenient_policy_skips_malformed_records() {
        let signatures = JsonCatalog::from_text(
            "test",
            r#"[
                { "id": "bad", "mimetype": "x/y", "format": [ { "constant": {} } ] },
                { "id": "good", "mimetype": "x/z", "format": [ { "constant": { "string": "ok" } } ] }
            ]"#,
        )
        .with_policy(DefinitionPolicy::Lenient)
        .load()
        .unwrap();

        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].id(), "good");
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[{ "id": "txt", "mimetype": "text/plain", "format": [ { "constant": { "string": "hi" } } ] }]"#)
            .unwrap();
        file.flush().unwrap();

        let signatures = JsonCatalog::from_path(file.path()).load().unwrap();
        assert_eq!(signatures[0].id(), "txt");

        let missing = JsonCatalog::from_path("/nonexistent/catalog.json").load();
        assert!(matches!(missing, Err(CatalogError::Io { .. })));
    }

    #[test]
    fn test_rejects_non_array_document() {
        assert!(matches!(load("42"), Err(CatalogError::Parse { .. })));
        assert!(matches!(load("{ \"id\": 1 }"), Err(CatalogError::Parse { .. })));
        assert!(matches!(load("[1, 2"), Err(CatalogError::Parse { .. })));
    }
}
