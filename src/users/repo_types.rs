use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Verification state of an account. Blocking is tracked separately by
/// `User::is_blocked`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unverified,
    Verified,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unverified => "unverified",
            Status::Verified => "verified",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unverified" => Some(Status::Unverified),
            "verified" => Some(Status::Verified),
            _ => None,
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed
    pub created_at: OffsetDateTime,
    pub status: Status,
    pub is_blocked: bool,
    pub last_logged_in_at: Option<OffsetDateTime>,
    pub last_activity_at: Option<OffsetDateTime>,
}

impl User {
    /// Status as shown to people: a blocked account reads "Blocked"
    /// whatever its verification state.
    pub fn status_label(&self) -> &'static str {
        if self.is_blocked {
            return "Blocked";
        }
        match self.status {
            Status::Unverified => "Unverified",
            Status::Verified => "Verified",
        }
    }
}

/// Row shape returned by `sqlx`; `status` is stored as text.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub status: String,
    pub is_blocked: bool,
    pub last_logged_in_at: Option<OffsetDateTime>,
    pub last_activity_at: Option<OffsetDateTime>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
            status: Status::parse(&r.status).unwrap_or_default(),
            is_blocked: r.is_blocked,
            last_logged_in_at: r.last_logged_in_at,
            last_activity_at: r.last_activity_at,
        }
    }
}

/// Values needed to insert a freshly registered user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}
