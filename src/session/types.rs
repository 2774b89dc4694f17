//! Identity types
//!
//! Shapes exchanged with the `/auth` and `/users` endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role assigned by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

/// Account lifecycle status; new sign-ups start as `Pending`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Inactive,
    Pending,
}

/// The signed-in user, as returned by `/users/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub exercise_frequency: Option<String>,
    #[serde(default)]
    pub smoking_status: Option<String>,
    #[serde(default)]
    pub alcohol_consumption: Option<String>,
    #[serde(default)]
    pub user_status: Option<UserStatus>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Full name when set, email otherwise
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Registration payload for `/auth/signup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupData {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub dob: NaiveDate,
    pub nationality: String,
    pub phone: String,
    pub city: String,
    pub country: String,
    pub occupation: String,
    pub marital_status: String,
    pub sleep_hours: f64,
    pub exercise_frequency: String,
    pub smoking_status: String,
    pub alcohol_consumption: String,
}

/// Login response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Only sent by the admin login endpoint
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Where the identity state machine currently is
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Anonymous,
    /// A stored or fresh token is being checked against `/users/me`
    Loading,
    Authenticated(User),
}

impl AuthState {
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}
