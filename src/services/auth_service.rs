use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::auth::{LoginRequest, LoginResponse, MeResponse, RegisterRequest},
    entity::{
        roles::{Column as RoleCol, Entity as Roles},
        user_roles::ActiveModel as UserRoleActive,
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult, map_unique_violation},
    middleware::auth::AuthUser,
    models::User,
    rbac,
    response::ApiResponse,
    session::issue_token,
    state::AppState,
    validation::FieldErrors,
};

pub const DEFAULT_ROLE: &str = "customer";
const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(AppError::internal)?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::internal("Invalid password hash"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    errors.email("email", &payload.email);
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    if let Some(name) = &payload.name {
        if name.chars().count() > 120 {
            errors.add("name", "must be at most 120 characters");
        }
    }
    errors.finish()
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    validate_registration(&payload)?;
    let email = payload.email.trim().to_lowercase();

    let exists = Users::find()
        .filter(UserCol::Email.eq(email.clone()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        name: Set(payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
        password_hash: Set(password_hash),
        role: Set(DEFAULT_ROLE.to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| map_unique_violation(e, "Email is already taken"))?;

    // Shoppers get the default role when it has been provisioned.
    if let Some(role) = Roles::find()
        .filter(RoleCol::Name.eq(DEFAULT_ROLE))
        .one(&state.orm)
        .await?
    {
        UserRoleActive {
            user_id: Set(user.id),
            role_id: Set(role.id),
            created_at: NotSet,
        }
        .insert(&state.orm)
        .await?;
    }

    audit::record(
        state,
        Some(user.id),
        AuditEntry::new("user_register", "users").entity(user.id),
    )
    .await;

    Ok(ApiResponse::ok("User created", User::from(user)))
}

/// Checks credentials and issues a session token.
pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthenticated),
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthenticated);
    }

    let token = issue_token(
        &state.config.session_secret,
        state.config.session_ttl_hours,
        user.id,
        &user.email,
        &user.role,
    )?;

    audit::record(
        state,
        Some(user.id),
        AuditEntry::new("user_login", "users").entity(user.id),
    )
    .await;

    Ok(ApiResponse::ok(
        "Logged in",
        LoginResponse {
            token,
            user: User::from(user),
        },
    ))
}

pub async fn me(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<MeResponse>> {
    let user = Users::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let roles = user
        .find_related(Roles)
        .order_by_asc(RoleCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    let permissions = rbac::permissions_for(state, user.id).await?.to_vec();

    Ok(ApiResponse::ok(
        "Current user",
        MeResponse {
            user: User::from(user),
            roles,
            permissions,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn registration_rules() {
        let bad = RegisterRequest {
            email: "nope".into(),
            password: "short".into(),
            name: None,
        };
        match validate_registration(&bad) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("email").is_some());
                assert!(errors.get("password").is_some());
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let good = RegisterRequest {
            email: "owner@petshop.test".into(),
            password: "long enough".into(),
            name: Some("Pat".into()),
        };
        assert!(validate_registration(&good).is_ok());
    }
}
