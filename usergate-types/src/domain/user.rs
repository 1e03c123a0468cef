//! User domain model and its row records.

use serde::{Deserialize, Serialize};

use crate::binding::{Field, FieldKind, Record, Slot, View, no_such_slot};

pub const STATUS_INACTIVE: i32 = 0;
pub const STATUS_ACTIVE: i32 = 1;
pub const STATUS_PENDING: i32 = 2;
pub const STATUS_BANNED: i32 = 3;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// A user account as exposed by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub id: i64,
    pub username: String,
    pub email: String,
    pub status: i32,
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
}

impl Record for User {
    const FIELDS: &'static [Field] = &[
        Field::new("uuid", FieldKind::Str).column("uuid"),
        Field::new("id", FieldKind::I64).column("id"),
        Field::new("username", FieldKind::Str).column("username"),
        Field::new("email", FieldKind::Str).column("email"),
        Field::new("status", FieldKind::I32).column("status"),
        Field::new("avatar", FieldKind::OptStr).column("avatar"),
    ];

    fn slot_mut(&mut self, index: usize) -> Slot<'_> {
        match index {
            0 => Slot::Str(&mut self.uuid),
            1 => Slot::I64(&mut self.id),
            2 => Slot::Str(&mut self.username),
            3 => Slot::Str(&mut self.email),
            4 => Slot::I32(&mut self.status),
            5 => Slot::OptStr(&mut self.avatar),
            _ => no_such_slot::<Self>(index),
        }
    }

    fn slot(&self, index: usize) -> View<'_> {
        match index {
            0 => View::Str(&self.uuid),
            1 => View::I64(self.id),
            2 => View::Str(&self.username),
            3 => View::Str(&self.email),
            4 => View::I32(self.status),
            5 => View::OptStr(self.avatar.as_deref()),
            _ => no_such_slot::<Self>(index),
        }
    }
}

/// A user row together with its stored password hash. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

impl Record for UserCredentials {
    const FIELDS: &'static [Field] = &[
        Field::new("uuid", FieldKind::Str).column("uuid"),
        Field::new("id", FieldKind::I64).column("id"),
        Field::new("username", FieldKind::Str).column("username"),
        Field::new("email", FieldKind::Str).column("email"),
        Field::new("status", FieldKind::I32).column("status"),
        Field::new("avatar", FieldKind::OptStr).column("avatar"),
        Field::new("password", FieldKind::Str).column("password"),
    ];

    fn slot_mut(&mut self, index: usize) -> Slot<'_> {
        match index {
            6 => Slot::Str(&mut self.password_hash),
            _ => self.user.slot_mut(index),
        }
    }

    fn slot(&self, index: usize) -> View<'_> {
        match index {
            6 => View::Str(&self.password_hash),
            _ => self.user.slot(index),
        }
    }
}

/// Login statistics kept per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: i64,
    pub last_login: Option<String>,
    pub login_count: i32,
}

impl Record for UserStats {
    const FIELDS: &'static [Field] = &[
        Field::new("user_id", FieldKind::I64).column("user_id"),
        Field::new("last_login", FieldKind::OptStr).column("last_login"),
        Field::new("login_count", FieldKind::I32).column("login_count"),
    ];

    fn slot_mut(&mut self, index: usize) -> Slot<'_> {
        match index {
            0 => Slot::I64(&mut self.user_id),
            1 => Slot::OptStr(&mut self.last_login),
            2 => Slot::I32(&mut self.login_count),
            _ => no_such_slot::<Self>(index),
        }
    }

    fn slot(&self, index: usize) -> View<'_> {
        match index {
            0 => View::I64(self.user_id),
            1 => View::OptStr(self.last_login.as_deref()),
            2 => View::I32(self.login_count),
            _ => no_such_slot::<Self>(index),
        }
    }
}

/// A user merged with its (possibly missing) stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithStats {
    #[serde(flatten)]
    pub user: User,
    pub stats: Option<UserStats>,
}

/// Data needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingPlan, Source, SourceValue};

    #[test]
    fn test_credentials_extend_user_columns() {
        let plan = BindingPlan::build::<UserCredentials, _>(
            Source::Column,
            &["uuid", "id", "username", "email", "status", "password"],
        );
        let mut creds = UserCredentials::default();
        plan.apply(
            &mut creds,
            vec![
                SourceValue::Str("u-1".into()),
                SourceValue::Int(3),
                SourceValue::Str("johndoe".into()),
                SourceValue::Str("john@example.com".into()),
                SourceValue::Int(1),
                SourceValue::Str("$argon2id$...".into()),
            ],
        )
        .unwrap();

        assert_eq!(creds.user.id, 3);
        assert_eq!(creds.user.email, "john@example.com");
        assert_eq!(creds.password_hash, "$argon2id$...");
        assert_eq!(creds.user.avatar, None);
    }

    #[test]
    fn test_user_with_stats_flattens_user() {
        let item = UserWithStats {
            user: User {
                uuid: "u-1".into(),
                id: 1,
                username: "johndoe".into(),
                email: "john@example.com".into(),
                status: STATUS_ACTIVE,
                ..Default::default()
            },
            stats: None,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["username"], "johndoe");
        assert!(json["stats"].is_null());
        assert!(json.get("token").is_none());
    }
}
