//! Auth calls: login, registration, current user, logout.
//!
//! Successful login/registration persists the returned token and user id
//! in the gateway's session. Logout only clears local state; the API has
//! no logout endpoint and a 401 never clears the session on its own.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use super::unwrap_data;
use crate::gateway::{Gateway, GatewayError, RequestOptions};
use crate::session::{SessionError, SessionStore};

/// User as returned by the API. Fields beyond `id`, `name` and `email`
/// are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "numeric_id")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ids arrive as JSON numbers or numeric strings.
fn numeric_id<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().ok_or_else(|| D::Error::custom(format!("user id {n} is not an integer"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("user id {s:?} is not numeric"))),
        other => Err(D::Error::custom(format!("user id must be a number, got {other}"))),
    }
}

/// Outcome of a login or registration call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub token: Option<String>,
    /// `None` when the response has no user or the user has no usable id.
    pub user: Option<User>,
}

impl AuthResult {
    #[must_use]
    pub fn from_body(body: &Value) -> Self {
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);
        let user = body
            .get("user")
            .cloned()
            .and_then(|u| serde_json::from_value::<User>(u).ok());
        Self { token, user }
    }

    fn persist(&self, session: &SessionStore) -> Result<(), SessionError> {
        let user_id = self.user.as_ref().map(|u| u.id);
        match (&self.token, user_id) {
            (Some(token), _) => session.set_session(token, user_id),
            (None, Some(id)) => session.set_user_id(Some(id)),
            (None, None) => Ok(()),
        }
    }
}

/// Fields of `POST /api/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// `POST /api/login`.
///
/// # Errors
///
/// Returns the gateway error for failed calls, or [`GatewayError::Session`]
/// if the returned session could not be stored.
pub async fn login(gateway: &Gateway, email: &str, password: &str) -> Result<AuthResult, GatewayError> {
    let body = gateway
        .request("/api/login", RequestOptions::post(json!({ "email": email, "password": password })))
        .await?;
    let result = AuthResult::from_body(&body);
    result.persist(gateway.session())?;
    tracing::info!(user_id = ?result.user.as_ref().map(|u| u.id), has_token = result.token.is_some(), "logged in");
    Ok(result)
}

/// `POST /api/register`.
///
/// # Errors
///
/// Same as [`login`].
pub async fn register(gateway: &Gateway, registration: &Registration) -> Result<AuthResult, GatewayError> {
    let body = gateway
        .request("/api/register", RequestOptions::post(serde_json::to_value(registration)?))
        .await?;
    let result = AuthResult::from_body(&body);
    result.persist(gateway.session())?;
    tracing::info!(user_id = ?result.user.as_ref().map(|u| u.id), "registered");
    Ok(result)
}

/// `GET /api/user`. Stores the user id, which login responses may omit.
///
/// # Errors
///
/// Returns the gateway error, or [`GatewayError::Decode`] if the body is
/// not a user with an id.
pub async fn current_user(gateway: &Gateway) -> Result<User, GatewayError> {
    let body = gateway.request("/api/user", RequestOptions::get()).await?;
    let user: User = serde_json::from_value(unwrap_data(body))?;
    gateway.session().set_user_id(Some(user.id))?;
    Ok(user)
}

/// Clear the local session.
///
/// # Errors
///
/// Returns [`GatewayError::Session`] if storage could not be updated.
pub fn logout(gateway: &Gateway) -> Result<(), GatewayError> {
    gateway.session().clear_session()?;
    tracing::info!("logged out");
    Ok(())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
