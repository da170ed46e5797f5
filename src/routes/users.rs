use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};

use crate::{
    avatar::{self, AvatarStyle},
    error::{AppError, AppResult, OptionExt},
    state::AppState,
    types::{ApiResponse, CreateUserRequest, DeletedUser, UpdateUserRequest, User},
};

const USER_COLUMNS: &str = "id, name, email, age, gender, avatar_url, created_at";

fn user_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::BadRequest(format!("Invalid user id: {}", e.body_text())))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(body)| body).map_err(|e| AppError::BadRequest(e.body_text()))
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    let users: Vec<User> =
        sqlx::query_as(&format!("SELECT {} FROM users ORDER BY created_at DESC, id DESC", USER_COLUMNS))
            .fetch_all(&state.db)
            .await?;
    Ok(Json(ApiResponse::new("Users retrieved successfully", users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ApiResponse<User>>> {
    let id = user_id(path)?;
    let user: User = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("User")?;
    Ok(Json(ApiResponse::new("User retrieved successfully", user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let req = json_body(payload)?;
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    let avatar_url = avatar::generate(&name, req.gender, state.config.avatar.style, &mut rand::thread_rng());

    let user: User = sqlx::query_as(&format!(
        "INSERT INTO users (name, email, age, gender, avatar_url) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&name)
    .bind(&email)
    .bind(req.age)
    .bind(req.gender)
    .bind(&avatar_url)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = user.id, "User created");
    Ok((StatusCode::CREATED, Json(ApiResponse::new("User created successfully", user))))
}

pub async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<User>>> {
    let id = user_id(path)?;
    let req = json_body(payload)?;
    let name = req.name.as_deref().map(str::trim);

    let current: User = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("User")?;

    // A new avatar only when an input of the configured derivation changed
    let merged_name = name.unwrap_or(&current.name);
    let merged_gender = req.gender.or(current.gender);
    let style = state.config.avatar.style;
    let stale = match style {
        AvatarStyle::Initials => avatar::initials(merged_name) != avatar::initials(&current.name),
        AvatarStyle::Portrait => merged_gender != current.gender,
    };
    let avatar_url =
        stale.then(|| avatar::generate(merged_name, merged_gender, style, &mut rand::thread_rng()));

    let user: User = sqlx::query_as(&format!(
        r#"UPDATE users SET
               name = COALESCE(?1, name),
               email = COALESCE(?2, email),
               age = COALESCE(?3, age),
               gender = COALESCE(?4, gender),
               avatar_url = COALESCE(?5, avatar_url)
           WHERE id = ?6
           RETURNING {}"#,
        USER_COLUMNS
    ))
    .bind(name)
    .bind(req.email.as_deref().map(str::trim))
    .bind(req.age)
    .bind(req.gender)
    .bind(avatar_url)
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_not_found("User")?;

    tracing::info!(user_id = user.id, "User updated");
    Ok(Json(ApiResponse::new("User updated successfully", user)))
}

/// Re-derives the avatar from the user's current name and gender.
pub async fn regenerate_avatar(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ApiResponse<User>>> {
    let id = user_id(path)?;
    let current: User = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("User")?;

    let avatar_url =
        avatar::generate(&current.name, current.gender, state.config.avatar.style, &mut rand::thread_rng());

    let user: User =
        sqlx::query_as(&format!("UPDATE users SET avatar_url = ?1 WHERE id = ?2 RETURNING {}", USER_COLUMNS))
            .bind(&avatar_url)
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_not_found("User")?;

    Ok(Json(ApiResponse::new("Avatar updated successfully", user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ApiResponse<DeletedUser>>> {
    let id = user_id(path)?;
    let result = sqlx::query("DELETE FROM users WHERE id = ?1").bind(id).execute(&state.db).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = id, "User deleted");
    Ok(Json(ApiResponse::new("User deleted successfully", DeletedUser { id })))
}
