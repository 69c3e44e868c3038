//! Path-addressed updates for object-shaped node values.
//!
//! Paths are dot-separated keys. Array elements are addressed either by a
//! numeric segment or with brackets, so `steps.0.name` and `steps[0].name`
//! are the same path. The empty path addresses the whole value.
//!
//! Updates never create structure: every segment must already exist in the
//! value being updated.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed path into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    segments: Vec<Segment>,
}

impl DataPath {
    /// Parses a path. Returns `None` for malformed input such as empty
    /// segments or non-numeric brackets.
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = Vec::new();
        if path.is_empty() {
            return Some(Self { segments });
        }

        for part in path.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if key.is_empty() && rest.is_empty() {
                return None;
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']')?;
                let index = rest.get(1..close)?.parse::<usize>().ok()?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return None;
                }
            }
        }

        Some(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a copy of `base` with the addressed location replaced by
    /// `value`, or `None` if the path does not resolve. `base` is untouched.
    pub fn replace(&self, base: &Value, value: Value) -> Option<Value> {
        let mut updated = base.clone();
        *self.locate_mut(&mut updated)? = value;
        Some(updated)
    }

    /// Looks up the addressed location.
    pub fn get<'v>(&self, base: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(base, |current, segment| match (current, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get(key),
                (Value::Array(items), Segment::Index(index)) => items.get(*index),
                (Value::Array(items), Segment::Key(key)) => items.get(key.parse::<usize>().ok()?),
                _ => None,
            })
    }

    fn locate_mut<'v>(&self, base: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = base;
        for segment in &self.segments {
            current = match (current, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get_mut(key)?,
                (Value::Array(items), Segment::Index(index)) => items.get_mut(*index)?,
                (Value::Array(items), Segment::Key(key)) => {
                    items.get_mut(key.parse::<usize>().ok()?)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> Value {
        json!({
            "name": "infra",
            "settings": { "visibility": "private", "topics": ["k8s", "ops"] },
            "owners": [{ "login": "ana" }, { "login": "raj" }]
        })
    }

    #[test]
    fn replaces_nested_key() {
        let base = repo();
        let path = DataPath::parse("settings.visibility").unwrap();
        let updated = path.replace(&base, json!("public")).unwrap();

        assert_eq!(updated["settings"]["visibility"], json!("public"));
        // Copy-on-write: the original value is unchanged.
        assert_eq!(base["settings"]["visibility"], json!("private"));
        assert_eq!(updated["name"], base["name"]);
    }

    #[test]
    fn bracket_and_dot_indices_agree() {
        let base = repo();
        let bracket = DataPath::parse("owners[1].login").unwrap();
        let dotted = DataPath::parse("owners.1.login").unwrap();

        assert_eq!(bracket.get(&base), Some(&json!("raj")));
        assert_eq!(
            bracket.replace(&base, json!("lee")),
            dotted.replace(&base, json!("lee"))
        );
    }

    #[test]
    fn nested_brackets_parse() {
        let base = json!({ "grid": [[1, 2], [3, 4]] });
        let path = DataPath::parse("grid[1][0]").unwrap();
        assert_eq!(path.get(&base), Some(&json!(3)));
    }

    #[test]
    fn missing_segments_do_not_create_structure() {
        let base = repo();
        for path in ["settings.archived", "owners[5].login", "name.first", "owners.x"] {
            let parsed = DataPath::parse(path).unwrap();
            assert!(parsed.replace(&base, json!(true)).is_none(), "{path}");
        }
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for path in ["a..b", ".a", "a.", "a[x]", "a[1", "a[1]b"] {
            assert!(DataPath::parse(path).is_none(), "{path}");
        }
    }

    #[test]
    fn empty_path_replaces_whole_value() {
        let path = DataPath::parse("").unwrap();
        assert!(path.is_root());
        assert_eq!(path.replace(&repo(), json!(7)), Some(json!(7)));
    }
}
