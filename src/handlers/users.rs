use crate::cache::{user_key, MY_STOCKS_KEY};
use crate::error::{AppError, Result};
use crate::models::{NewUser, ProfileUpdate, User};
use crate::state::AppState;
use crate::validation;

/// Registers a portfolio owner. Usernames and emails stay reserved even
/// after the owning user is deleted.
pub async fn create_user(state: &AppState, mut user: NewUser) -> Result<User> {
    validation::check(&user)?;

    if state
        .db
        .identity_taken(Some(&user.username), Some(&user.email), None)
        .await?
    {
        return Err(AppError::Conflict(
            "username or email already exists".to_string(),
        ));
    }

    let local_currency = user
        .local_currency
        .take()
        .unwrap_or_else(|| state.config.default_currency.clone())
        .to_uppercase();
    let created = state
        .db
        .create_user(&user.username, &user.email, &local_currency)
        .await?;
    tracing::info!("Created user {} ({})", created.id, created.username);
    Ok(created)
}

pub async fn get_profile(state: &AppState, user_id: i64) -> Result<User> {
    state
        .db
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn update_profile(
    state: &AppState,
    user_id: i64,
    mut update: ProfileUpdate,
) -> Result<User> {
    validation::check(&update)?;
    update.local_currency = update.local_currency.map(|c| c.to_uppercase());

    let current = get_profile(state, user_id).await?;
    if update.is_empty() {
        return Ok(current);
    }

    if (update.username.is_some() || update.email.is_some())
        && state
            .db
            .identity_taken(
                update.username.as_deref(),
                update.email.as_deref(),
                Some(user_id),
            )
            .await?
    {
        return Err(AppError::Conflict(
            "Username or email already exists".to_string(),
        ));
    }

    let updated = state
        .db
        .update_user(user_id, &update)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    // A currency change invalidates every figure in the cached report
    state
        .reports
        .remove(&user_key(MY_STOCKS_KEY, user_id))
        .await;
    Ok(updated)
}

pub async fn delete_profile(state: &AppState, user_id: i64) -> Result<()> {
    if !state.db.soft_delete_user(user_id).await? {
        return Err(AppError::not_found("User"));
    }
    tracing::info!("Deleted user {}", user_id);

    state
        .reports
        .remove(&user_key(MY_STOCKS_KEY, user_id))
        .await;
    Ok(())
}
