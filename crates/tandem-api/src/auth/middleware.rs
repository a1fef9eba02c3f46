use crate::auth::models::UserContext;
use crate::error::HttpAppError;
use crate::state::AuthState;
use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tandem_core::AppError;

/// Verify `token` and mirror its user into the store
pub async fn authenticate(auth: &AuthState, token: &str) -> Result<UserContext, AppError> {
    let profile = auth.jwt.verify(token)?.into_profile()?;
    let user = auth.store.users.upsert_user(profile).await?;
    Ok(UserContext {
        user_id: user.id,
        username: user.username,
    })
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        )),
    }
}

async fn run_authenticated(
    auth: &AuthState,
    token: &str,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(auth, token).await {
        Ok(ctx) => {
            tracing::debug!(user_id = %ctx.user_id, "Request authenticated");
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(Some(token)) => token.to_string(),
        Ok(None) => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response()
        }
        Err(e) => return HttpAppError(e).into_response(),
    };

    run_authenticated(&auth, &token, request, next).await
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Handshake authentication for `/ws`: the `Authorization` header, or a `token` query
/// parameter for browser clients that cannot set headers. Runs before the upgrade so a
/// rejected handshake never reaches the socket.
pub async fn ws_auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let from_query = Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty());

    let token = match bearer_token(request.headers()) {
        Ok(Some(token)) => token.to_string(),
        Ok(None) => match from_query {
            Some(token) => token,
            None => {
                return HttpAppError(AppError::Unauthorized("Missing token".to_string()))
                    .into_response()
            }
        },
        Err(e) => return HttpAppError(e).into_response(),
    };

    run_authenticated(&auth, &token, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }
}
