//! Field descriptors and the `Record` trait.
//!
//! A record type declares its wire shape once, as a `const` slice of
//! [`Field`]s. Binders and scanners only ever consult this descriptor.

use super::value::UploadedFile;

/// Where a value comes from. Each source has its own tag namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Json,
    Form,
    File,
    Query,
    Column,
}

/// Storage kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    OptStr,
    I32,
    I64,
    Bool,
    File,
}

/// Wire keys per source. `None` means the field is not bound from that source.
#[derive(Debug, Clone, Copy)]
pub struct Tags {
    pub json: Option<&'static str>,
    pub form: Option<&'static str>,
    pub file: Option<&'static str>,
    pub query: Option<&'static str>,
    pub column: Option<&'static str>,
}

impl Tags {
    pub const NONE: Tags = Tags {
        json: None,
        form: None,
        file: None,
        query: None,
        column: None,
    };
}

/// Declarative validation rules, checked after binding.
#[derive(Debug, Clone, Copy)]
pub struct Rules {
    pub required: bool,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub email: bool,
}

impl Rules {
    pub const NONE: Rules = Rules {
        required: false,
        min_len: None,
        max_len: None,
        min: None,
        max: None,
        email: false,
    };
}

/// One field of a record: its name, kind, wire tags and rules.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub tags: Tags,
    pub rules: Rules,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            tags: Tags::NONE,
            rules: Rules::NONE,
        }
    }

    pub const fn json(mut self, key: &'static str) -> Self {
        self.tags.json = Some(key);
        self
    }

    pub const fn form(mut self, key: &'static str) -> Self {
        self.tags.form = Some(key);
        self
    }

    pub const fn file(mut self, key: &'static str) -> Self {
        self.tags.file = Some(key);
        self
    }

    pub const fn query(mut self, key: &'static str) -> Self {
        self.tags.query = Some(key);
        self
    }

    pub const fn column(mut self, key: &'static str) -> Self {
        self.tags.column = Some(key);
        self
    }

    pub const fn required(mut self) -> Self {
        self.rules.required = true;
        self
    }

    /// Character-count bounds for string fields.
    pub const fn len(mut self, min: usize, max: usize) -> Self {
        self.rules.min_len = Some(min);
        self.rules.max_len = Some(max);
        self
    }

    pub const fn min_len(mut self, min: usize) -> Self {
        self.rules.min_len = Some(min);
        self
    }

    pub const fn min(mut self, min: i64) -> Self {
        self.rules.min = Some(min);
        self
    }

    pub const fn max(mut self, max: i64) -> Self {
        self.rules.max = Some(max);
        self
    }

    pub const fn email(mut self) -> Self {
        self.rules.email = true;
        self
    }

    /// The wire key of this field for `source`, if tagged.
    pub fn tag(&self, source: Source) -> Option<&'static str> {
        match source {
            Source::Json => self.tags.json,
            Source::Form => self.tags.form,
            Source::File => self.tags.file,
            Source::Query => self.tags.query,
            Source::Column => self.tags.column,
        }
    }
}

/// Mutable, typed access to one field of a record.
pub enum Slot<'a> {
    Str(&'a mut String),
    OptStr(&'a mut Option<String>),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Bool(&'a mut bool),
    File(&'a mut Option<UploadedFile>),
}

impl Slot<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            Slot::Str(_) => FieldKind::Str,
            Slot::OptStr(_) => FieldKind::OptStr,
            Slot::I32(_) => FieldKind::I32,
            Slot::I64(_) => FieldKind::I64,
            Slot::Bool(_) => FieldKind::Bool,
            Slot::File(_) => FieldKind::File,
        }
    }
}

/// Read-only view of one field, used by validation.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Str(&'a str),
    OptStr(Option<&'a str>),
    I32(i32),
    I64(i64),
    Bool(bool),
    File(Option<&'a UploadedFile>),
}

/// A statically described record that can be populated from untyped sources.
///
/// `FIELDS[i]` describes the field exposed by `slot_mut(i)` / `slot(i)`.
/// Implementations must keep the two in the same order and of the same kind;
/// a mismatch is a programming error and panics at bind time.
pub trait Record: Default + Send + 'static {
    const FIELDS: &'static [Field];

    fn slot_mut(&mut self, index: usize) -> Slot<'_>;

    fn slot(&self, index: usize) -> View<'_>;

    /// Names of fields failing rules that span more than one field.
    fn cross_check(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Panics for an index outside a record's descriptor.
pub fn no_such_slot<R: Record>(index: usize) -> ! {
    panic!(
        "{} has {} fields, no slot {}",
        std::any::type_name::<R>(),
        R::FIELDS.len(),
        index
    )
}
