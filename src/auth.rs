use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::database as db;
use crate::routes::ApiError;

pub const TOKEN_COOKIE: &str = "token";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_time: String,
}

/// Caller identified by a valid session token, either
/// `Authorization: Bearer <token>` or the `token` cookie.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

/// An [`AuthenticatedUser`] with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

fn presented_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    bearer.or_else(|| req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string()))
}

async fn authenticate(
    token: Option<String>,
    pool: Option<web::Data<SqlitePool>>,
) -> Result<AuthenticatedUser, ApiError> {
    let token =
        token.ok_or_else(|| ApiError::Unauthorized("Authentication token is required".into()))?;
    let pool = pool.ok_or_else(|| ApiError::Internal("database pool is not configured".into()))?;

    match db::find_session_user(pool.get_ref(), &token).await? {
        Some(user) => Ok(AuthenticatedUser { user, token }),
        None => Err(ApiError::Unauthorized(
            "Token is invalid or has been revoked".into(),
        )),
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = presented_token(req);
        let pool = req.app_data::<web::Data<SqlitePool>>().cloned();
        Box::pin(authenticate(token, pool))
    }
}

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = presented_token(req);
        let pool = req.app_data::<web::Data<SqlitePool>>().cloned();
        Box::pin(async move {
            let caller = authenticate(token, pool).await?;
            if caller.user.role != Role::Admin {
                log::info!("User {} denied admin access", caller.user.id);
                return Err(ApiError::Forbidden("Administrator access required".into()));
            }
            Ok(AdminUser(caller))
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_bearer_header_is_preferred() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc"))
            .cookie(Cookie::new(TOKEN_COOKIE, "from-cookie"))
            .to_http_request();
        assert_eq!(presented_token(&req).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_fallback() {
        let req = TestRequest::default()
            .cookie(Cookie::new(TOKEN_COOKIE, "from-cookie"))
            .to_http_request();
        assert_eq!(presented_token(&req).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_no_token() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwdw=="))
            .to_http_request();
        assert_eq!(presented_token(&req), None);
    }
}
