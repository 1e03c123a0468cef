//! Request records bound from the wire, and response shapes.

use serde::{Deserialize, Serialize};

use crate::binding::{Field, FieldKind, Record, Slot, UploadedFile, View, no_such_slot};

/// Credentials posted to the login endpoint (JSON or multipart).
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Record for LoginRequest {
    const FIELDS: &'static [Field] = &[
        Field::new("email", FieldKind::Str)
            .json("email")
            .form("email")
            .required()
            .email(),
        Field::new("password", FieldKind::Str)
            .json("password")
            .form("password")
            .required()
            .min_len(6),
    ];

    fn slot_mut(&mut self, index: usize) -> Slot<'_> {
        match index {
            0 => Slot::Str(&mut self.email),
            1 => Slot::Str(&mut self.password),
            _ => no_such_slot::<Self>(index),
        }
    }

    fn slot(&self, index: usize) -> View<'_> {
        match index {
            0 => View::Str(&self.email),
            1 => View::Str(&self.password),
            _ => no_such_slot::<Self>(index),
        }
    }
}

/// Sign-up form. Files only arrive through multipart.
#[derive(Debug, Clone, Default)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<UploadedFile>,
    pub license_front: Option<UploadedFile>,
    pub license_back: Option<UploadedFile>,
}

impl Record for SignUpRequest {
    const FIELDS: &'static [Field] = &[
        Field::new("username", FieldKind::Str)
            .json("username")
            .form("username")
            .required()
            .len(3, 30),
        Field::new("email", FieldKind::Str)
            .json("email")
            .form("email")
            .required()
            .email(),
        Field::new("password", FieldKind::Str)
            .json("password")
            .form("password")
            .required()
            .min_len(6),
        Field::new("avatar", FieldKind::File).file("avatar"),
        Field::new("license_front", FieldKind::File).file("license_front"),
        Field::new("license_back", FieldKind::File).file("license_back"),
    ];

    fn slot_mut(&mut self, index: usize) -> Slot<'_> {
        match index {
            0 => Slot::Str(&mut self.username),
            1 => Slot::Str(&mut self.email),
            2 => Slot::Str(&mut self.password),
            3 => Slot::File(&mut self.avatar),
            4 => Slot::File(&mut self.license_front),
            5 => Slot::File(&mut self.license_back),
            _ => no_such_slot::<Self>(index),
        }
    }

    fn slot(&self, index: usize) -> View<'_> {
        match index {
            0 => View::Str(&self.username),
            1 => View::Str(&self.email),
            2 => View::Str(&self.password),
            3 => View::File(self.avatar.as_ref()),
            4 => View::File(self.license_front.as_ref()),
            5 => View::File(self.license_back.as_ref()),
            _ => no_such_slot::<Self>(index),
        }
    }

    // The password may not repeat the username or the email.
    fn cross_check(&self) -> Vec<&'static str> {
        if !self.password.is_empty()
            && (self.password == self.username || self.password == self.email)
        {
            vec!["password"]
        } else {
            Vec::new()
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// `?limit=&offset=` for list endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationQuery {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Record for PaginationQuery {
    const FIELDS: &'static [Field] = &[
        Field::new("limit", FieldKind::I64)
            .query("limit")
            .min(1)
            .max(MAX_PAGE_LIMIT),
        Field::new("offset", FieldKind::I64).query("offset").min(0),
    ];

    fn slot_mut(&mut self, index: usize) -> Slot<'_> {
        match index {
            0 => Slot::I64(&mut self.limit),
            1 => Slot::I64(&mut self.offset),
            _ => no_such_slot::<Self>(index),
        }
    }

    fn slot(&self, index: usize) -> View<'_> {
        match index {
            0 => View::I64(self.limit),
            1 => View::I64(self.offset),
            _ => no_such_slot::<Self>(index),
        }
    }
}

/// An access/refresh token pair issued together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of the welcome endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
