//! Untyped source values and type-directed assignment into record slots.

use bytes::Bytes;

use super::BindError;
use super::schema::{Record, Slot};

/// An uploaded multipart file held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Client-supplied file name. Never used as a storage name.
    pub file_name: String,
    /// Client-declared content type. Not trusted.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Extension of the client file name including the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A scalar pulled out of a wire payload or a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Str(String),
    Int(i64),
    Bool(bool),
    File(UploadedFile),
}

impl SourceValue {
    /// Converts a decoded JSON value. Arrays, objects and non-integral
    /// numbers have no scalar form and yield `None`.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(SourceValue::Null),
            serde_json::Value::Bool(b) => Some(SourceValue::Bool(b)),
            serde_json::Value::Number(n) => n.as_i64().map(SourceValue::Int),
            serde_json::Value::String(s) => Some(SourceValue::Str(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

/// Writes `value` into field `index` of `record`.
///
/// `Null` clears optional strings and leaves every other kind untouched.
pub fn assign<R: Record>(record: &mut R, index: usize, value: SourceValue) -> Result<(), BindError> {
    let field = &R::FIELDS[index];
    let slot = record.slot_mut(index);
    assert_eq!(
        slot.kind(),
        field.kind,
        "{}: descriptor for `{}` disagrees with its slot",
        std::any::type_name::<R>(),
        field.name
    );

    let invalid = || BindError::Invalid { field: field.name };

    match (slot, value) {
        (Slot::OptStr(target), SourceValue::Null) => *target = None,
        (_, SourceValue::Null) => {}
        (Slot::Str(target), SourceValue::Str(v)) => *target = v,
        (Slot::OptStr(target), SourceValue::Str(v)) => *target = Some(v),
        (Slot::I32(target), SourceValue::Int(v)) => {
            *target = i32::try_from(v).map_err(|_| invalid())?;
        }
        (Slot::I32(target), SourceValue::Str(v)) => {
            *target = v.trim().parse().map_err(|_| invalid())?;
        }
        (Slot::I64(target), SourceValue::Int(v)) => *target = v,
        (Slot::I64(target), SourceValue::Str(v)) => {
            *target = v.trim().parse().map_err(|_| invalid())?;
        }
        (Slot::Bool(target), SourceValue::Bool(v)) => *target = v,
        (Slot::Bool(target), SourceValue::Str(v)) => {
            *target = parse_bool(&v).ok_or_else(invalid)?;
        }
        (Slot::File(target), SourceValue::File(file)) => *target = Some(file),
        _ => return Err(invalid()),
    }

    Ok(())
}

/// Accepts the same spellings as the usual `1/t/true` family.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::schema::{Field, FieldKind, View};

    #[derive(Debug, Default)]
    struct Probe {
        name: String,
        nick: Option<String>,
        small: i32,
        big: i64,
        flag: bool,
    }

    impl Record for Probe {
        const FIELDS: &'static [Field] = &[
            Field::new("name", FieldKind::Str),
            Field::new("nick", FieldKind::OptStr),
            Field::new("small", FieldKind::I32),
            Field::new("big", FieldKind::I64),
            Field::new("flag", FieldKind::Bool),
        ];

        fn slot_mut(&mut self, index: usize) -> Slot<'_> {
            match index {
                0 => Slot::Str(&mut self.name),
                1 => Slot::OptStr(&mut self.nick),
                2 => Slot::I32(&mut self.small),
                3 => Slot::I64(&mut self.big),
                4 => Slot::Bool(&mut self.flag),
                _ => crate::binding::no_such_slot::<Self>(index),
            }
        }

        fn slot(&self, index: usize) -> View<'_> {
            match index {
                0 => View::Str(&self.name),
                1 => View::OptStr(self.nick.as_deref()),
                2 => View::I32(self.small),
                3 => View::I64(self.big),
                4 => View::Bool(self.flag),
                _ => crate::binding::no_such_slot::<Self>(index),
            }
        }
    }

    #[test]
    fn test_assign_scalars() {
        let mut p = Probe::default();
        assign(&mut p, 0, SourceValue::Str("alice".into())).unwrap();
        assign(&mut p, 1, SourceValue::Str("al".into())).unwrap();
        assign(&mut p, 2, SourceValue::Int(42)).unwrap();
        assign(&mut p, 3, SourceValue::Str(" 9000000000 ".into())).unwrap();
        assign(&mut p, 4, SourceValue::Str("T".into())).unwrap();

        assert_eq!(p.name, "alice");
        assert_eq!(p.nick.as_deref(), Some("al"));
        assert_eq!(p.small, 42);
        assert_eq!(p.big, 9_000_000_000);
        assert!(p.flag);
    }

    #[test]
    fn test_null_leaves_value_and_clears_option() {
        let mut p = Probe {
            name: "kept".into(),
            nick: Some("gone".into()),
            ..Default::default()
        };
        assign(&mut p, 0, SourceValue::Null).unwrap();
        assign(&mut p, 1, SourceValue::Null).unwrap();

        assert_eq!(p.name, "kept");
        assert_eq!(p.nick, None);
    }

    #[test]
    fn test_mismatched_value_names_field() {
        let mut p = Probe::default();

        let err = assign(&mut p, 2, SourceValue::Str("abc".into())).unwrap_err();
        assert_eq!(err.to_string(), "small is invalid");

        let err = assign(&mut p, 2, SourceValue::Int(i64::MAX)).unwrap_err();
        assert_eq!(err.to_string(), "small is invalid");

        let err = assign(&mut p, 0, SourceValue::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "name is invalid");
    }

    #[test]
    fn test_from_json_rejects_compound_values() {
        assert_eq!(
            SourceValue::from_json(serde_json::json!(7)),
            Some(SourceValue::Int(7))
        );
        assert_eq!(SourceValue::from_json(serde_json::json!(1.5)), None);
        assert_eq!(SourceValue::from_json(serde_json::json!([1])), None);
        assert_eq!(SourceValue::from_json(serde_json::json!({"a": 1})), None);
    }

    #[test]
    fn test_uploaded_file_extension() {
        let file = UploadedFile {
            file_name: "me.final.PNG".into(),
            content_type: None,
            bytes: Bytes::from_static(b"x"),
        };
        assert_eq!(file.extension().as_deref(), Some(".PNG"));

        let bare = UploadedFile {
            file_name: "README".into(),
            ..file
        };
        assert_eq!(bare.extension(), None);
    }
}
