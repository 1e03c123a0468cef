//! Declarative validation over a populated record.

use std::sync::LazyLock;

use regex::Regex;

use super::BindError;
use super::schema::{Record, Rules, View};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern is valid")
});

/// Checks every field's rules plus the record's cross-field rules.
///
/// All failing fields are reported, joined as `"<a> is invalid, <b> is invalid"`.
pub fn validate<R: Record>(record: &R) -> Result<(), BindError> {
    let mut failed: Vec<&'static str> = R::FIELDS
        .iter()
        .enumerate()
        .filter(|(index, field)| !field.rules.admits(record.slot(*index)))
        .map(|(_, field)| field.name)
        .collect();

    for name in record.cross_check() {
        if !failed.contains(&name) {
            failed.push(name);
        }
    }

    if failed.is_empty() {
        return Ok(());
    }

    let message = failed
        .iter()
        .map(|name| format!("{name} is invalid"))
        .collect::<Vec<_>>()
        .join(", ");
    Err(BindError::Validation(message))
}

impl Rules {
    /// Empty strings and absent files only fail `required`; other rules
    /// apply to present values.
    pub fn admits(&self, view: View<'_>) -> bool {
        match view {
            View::Str(s) => self.admits_str(Some(s).filter(|s| !s.is_empty())),
            View::OptStr(s) => self.admits_str(s.filter(|s| !s.is_empty())),
            View::I32(n) => self.admits_int(i64::from(n)),
            View::I64(n) => self.admits_int(n),
            View::Bool(_) => true,
            View::File(file) => !self.required || file.is_some(),
        }
    }

    fn admits_str(&self, value: Option<&str>) -> bool {
        let Some(s) = value else {
            return !self.required;
        };

        let chars = s.chars().count();
        if self.min_len.is_some_and(|min| chars < min) || self.max_len.is_some_and(|max| chars > max) {
            return false;
        }
        !self.email || EMAIL.is_match(s)
    }

    fn admits_int(&self, n: i64) -> bool {
        if self.required && n == 0 {
            return false;
        }
        !(self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::schema::{Field, FieldKind, Slot};

    #[derive(Debug, Default)]
    struct Form {
        username: String,
        email: String,
        age: i32,
        confirm: String,
    }

    impl Record for Form {
        const FIELDS: &'static [Field] = &[
            Field::new("username", FieldKind::Str).required().len(3, 5),
            Field::new("email", FieldKind::Str).required().email(),
            Field::new("age", FieldKind::I32).min(0).max(130),
            Field::new("confirm", FieldKind::Str),
        ];

        fn slot_mut(&mut self, index: usize) -> Slot<'_> {
            match index {
                0 => Slot::Str(&mut self.username),
                1 => Slot::Str(&mut self.email),
                2 => Slot::I32(&mut self.age),
                3 => Slot::Str(&mut self.confirm),
                _ => crate::binding::no_such_slot::<Self>(index),
            }
        }

        fn slot(&self, index: usize) -> View<'_> {
            match index {
                0 => View::Str(&self.username),
                1 => View::Str(&self.email),
                2 => View::I32(self.age),
                3 => View::Str(&self.confirm),
                _ => crate::binding::no_such_slot::<Self>(index),
            }
        }

        fn cross_check(&self) -> Vec<&'static str> {
            if self.confirm != self.username {
                vec!["confirm"]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let form = Form {
            username: "bob".into(),
            email: "bob@example.com".into(),
            age: 30,
            confirm: "bob".into(),
        };
        assert!(validate(&form).is_ok());
    }

    #[test]
    fn test_reports_every_failing_field_in_order() {
        let form = Form {
            username: "bo".into(),
            email: "not-an-email".into(),
            age: 200,
            confirm: "x".into(),
        };

        let err = validate(&form).unwrap_err();
        assert_eq!(
            err.to_string(),
            "username is invalid, email is invalid, age is invalid, confirm is invalid"
        );
    }

    #[test]
    fn test_required_and_length_bounds() {
        let form = Form {
            username: "toolong".into(),
            email: String::new(),
            age: 0,
            confirm: "toolong".into(),
        };

        let err = validate(&form).unwrap_err();
        assert_eq!(err.to_string(), "username is invalid, email is invalid");
    }

    #[test]
    fn test_email_shapes() {
        let rules = Field::new("e", FieldKind::Str).email().rules;
        assert!(rules.admits(View::Str("john@example.com")));
        assert!(rules.admits(View::Str("a.b+c@sub.example.org")));
        assert!(!rules.admits(View::Str("john@example")));
        assert!(!rules.admits(View::Str("jo hn@example.com")));
        assert!(!rules.admits(View::Str("@example.com")));
        // empty is only rejected by `required`
        assert!(rules.admits(View::Str("")));
    }
}
