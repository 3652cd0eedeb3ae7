//! The `User` resource and its search filter.

use crate::{
    core::{TaggedObject, Value},
    reflect::{ClassDecl, EnumDescriptor, RestObject},
    storage::{ColumnType, Comparison, Condition, Row, TableSchema},
};

use super::list::ObjectsList;

pub const USERS_TABLE: &str = "users";

pub static USERS_SCHEMA: TableSchema = TableSchema {
    name: USERS_TABLE,
    columns: &[
        (column::CREATED_AT, ColumnType::Integer),
        (column::UPDATED_AT, ColumnType::Integer),
        (column::FIRST_NAME, ColumnType::Text),
        (column::LAST_NAME, ColumnType::Text),
        (column::EMAIL, ColumnType::Text),
        (column::STATUS, ColumnType::Integer),
    ],
};

pub static USER_STATUS: EnumDescriptor = EnumDescriptor {
    name: "UserStatus",
    constants: &[("ACTIVE", 0), ("DISABLED", 1)],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserStatus {
    Active = 0,
    Disabled = 1,
}

impl UserStatus {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(UserStatus::Active),
            1 => Some(UserStatus::Disabled),
            _ => None,
        }
    }
}

impl From<UserStatus> for Value {
    fn from(status: UserStatus) -> Self {
        Value::Int(status as i64)
    }
}

mod column {
    pub const ID: &str = "id";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const STATUS: &str = "status";
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: Option<UserStatus>,
}

impl User {
    pub fn from_row(row: &Row) -> Self {
        let int = |name: &str| row.get(name).and_then(Value::as_i64);
        let text = |name: &str| row.get(name).and_then(Value::to_text);
        Self {
            id: int(column::ID),
            created_at: int(column::CREATED_AT),
            updated_at: int(column::UPDATED_AT),
            first_name: text(column::FIRST_NAME),
            last_name: text(column::LAST_NAME),
            status: int(column::STATUS).and_then(UserStatus::from_i64),
        }
    }

    /// Columns for the fields that are set, timestamps and id excluded.
    pub fn changes(&self) -> Row {
        let mut row = Row::new();
        if let Some(first_name) = &self.first_name {
            row.insert(column::FIRST_NAME.to_string(), first_name.as_str().into());
        }
        if let Some(last_name) = &self.last_name {
            row.insert(column::LAST_NAME.to_string(), last_name.as_str().into());
        }
        if let Some(status) = self.status {
            row.insert(column::STATUS.to_string(), status.into());
        }
        row
    }

    pub fn id_filter(id: i64) -> Row {
        let mut row = Row::new();
        row.insert(column::ID.to_string(), Value::Int(id));
        row
    }

    pub(crate) fn stamp(row: &mut Row, created: bool, now: i64) {
        if created {
            row.insert(column::CREATED_AT.to_string(), Value::Int(now));
        }
        row.insert(column::UPDATED_AT.to_string(), Value::Int(now));
    }
}

impl RestObject for User {
    const TYPE_NAME: &'static str = "User";

    fn declare(decl: &mut ClassDecl<Self>) {
        decl.enumeration(&USER_STATUS)
            .property("id", "int", |u, v| u.id = v.as_i64())
            .property("createdAt", "int", |u, v| u.created_at = v.as_i64())
            .describe("Date of first creation (unix timestamp)")
            .property("updatedAt", "int", |u, v| u.updated_at = v.as_i64())
            .describe("Date of last update (unix timestamp)")
            .property("firstName", "string", |u, v| u.first_name = v.to_text())
            .property("lastName", "string", |u, v| u.last_name = v.to_text())
            .property("status", "UserStatus", |u, v| {
                u.status = v.as_i64().and_then(UserStatus::from_i64)
            });
    }

    fn to_value(&self) -> Value {
        TaggedObject::typed(Self::TYPE_NAME)
            .with("id", self.id)
            .with("createdAt", self.created_at)
            .with("updatedAt", self.updated_at)
            .with("firstName", self.first_name.clone())
            .with("lastName", self.last_name.clone())
            .with("status", self.status)
            .into()
    }
}

/// Timestamp bounds of a user search. Unset bounds are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserFilter {
    pub created_at_greater_than_or_equal: Option<i64>,
    pub created_at_less_than_or_equal: Option<i64>,
    pub updated_at_greater_than_or_equal: Option<i64>,
    pub updated_at_less_than_or_equal: Option<i64>,
}

impl UserFilter {
    pub fn conditions(&self) -> Vec<Condition> {
        [
            (column::CREATED_AT, Comparison::Ge, self.created_at_greater_than_or_equal),
            (column::CREATED_AT, Comparison::Le, self.created_at_less_than_or_equal),
            (column::UPDATED_AT, Comparison::Ge, self.updated_at_greater_than_or_equal),
            (column::UPDATED_AT, Comparison::Le, self.updated_at_less_than_or_equal),
        ]
        .into_iter()
        .filter_map(|(column, op, bound)| bound.map(|bound| Condition::new(column, op, bound)))
        .collect()
    }
}

impl RestObject for UserFilter {
    const TYPE_NAME: &'static str = "UserFilter";

    fn declare(decl: &mut ClassDecl<Self>) {
        decl.property("createdAtGreaterThanOrEqual", "int", |f, v| {
            f.created_at_greater_than_or_equal = v.as_i64()
        })
        .property("createdAtLessThanOrEqual", "int", |f, v| {
            f.created_at_less_than_or_equal = v.as_i64()
        })
        .property("updatedAtGreaterThanOrEqual", "int", |f, v| {
            f.updated_at_greater_than_or_equal = v.as_i64()
        })
        .property("updatedAtLessThanOrEqual", "int", |f, v| {
            f.updated_at_less_than_or_equal = v.as_i64()
        });
    }

    fn to_value(&self) -> Value {
        TaggedObject::typed(Self::TYPE_NAME)
            .with(
                "createdAtGreaterThanOrEqual",
                self.created_at_greater_than_or_equal,
            )
            .with("createdAtLessThanOrEqual", self.created_at_less_than_or_equal)
            .with(
                "updatedAtGreaterThanOrEqual",
                self.updated_at_greater_than_or_equal,
            )
            .with("updatedAtLessThanOrEqual", self.updated_at_less_than_or_equal)
            .into()
    }
}

pub type UsersList = ObjectsList<User>;

impl RestObject for UsersList {
    const TYPE_NAME: &'static str = "UsersList";

    // The kind vocabulary has no list kind, so `objects` is published with
    // its element class.
    fn declare(decl: &mut ClassDecl<Self>) {
        decl.class::<User>()
            .property("objects", "User", |list, v| {
                if !v.is_null() {
                    list.objects.extend(User::from_value(&v).ok());
                }
            })
            .describe("Users on the requested page")
            .property("totalCount", "int", |list, v| {
                list.total_count = v.as_i64().unwrap_or_default()
            });
    }

    fn to_value(&self) -> Value {
        self.to_tagged(Self::TYPE_NAME, User::to_value)
    }
}
