use actix_web::{HttpResponse, delete, get, post, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::ApiError;
use crate::auth::{AdminUser, AuthenticatedUser, Role, User};
use crate::database as db;

#[derive(Deserialize, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Serialize, Deserialize, Debug)]
pub struct IssuedCredential {
    pub user: User,
    pub token: String,
}

/// Creates a user and hands back its first session token.
#[post("/users")]
pub async fn create_user_handler(
    admin: AdminUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let name = body.name.trim();
    let email = body.email.trim().to_lowercase();
    if name.is_empty() || !email.contains('@') {
        return Err(ApiError::InvalidArgument(
            "A name and a valid email are required".into(),
        ));
    }

    let user = match db::create_user(pool.get_ref(), name, &email, body.role).await {
        Ok(user) => user,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::InvalidArgument(format!(
                "Email {email} is already registered"
            )));
        }
        Err(e) => return Err(e.into()),
    };
    let token = db::create_session(pool.get_ref(), user.id).await?;
    log::info!("Admin {} created user {}", admin.0.user.id, user.id);

    Ok(HttpResponse::Created().json(IssuedCredential { user, token }))
}

/// Deletes the caller's account. Sessions, submissions and the solved list
/// go with it.
#[delete("/users/me")]
pub async fn delete_me_handler(
    caller: AuthenticatedUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let user_id = caller.user.id;
    if user_id == db::BOOTSTRAP_ADMIN_ID {
        return Err(ApiError::InvalidState(
            "The bootstrap administrator cannot be deleted".into(),
        ));
    }

    match db::delete_user(pool.get_ref(), user_id).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::NotFound(format!("User {user_id} not found."))),
        Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
            return Err(ApiError::InvalidState(
                "Users who authored problems cannot be deleted".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }
    log::info!("User {user_id} deleted their account");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Deleted successfully" })))
}

#[get("/users/me")]
pub async fn get_me_handler(caller: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(caller.user)
}

/// Revokes the token the request was made with.
#[delete("/sessions/current")]
pub async fn logout_handler(
    caller: AuthenticatedUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    db::revoke_session(pool.get_ref(), &caller.token).await?;
    log::info!("User {} logged out", caller.user.id);
    Ok(HttpResponse::NoContent().finish())
}
