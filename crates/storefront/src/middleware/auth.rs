//! Authentication extractors.
//!
//! Identity comes from an `Authorization: Bearer <access token>` header,
//! verified against Auth0. Client-supplied emails are never trusted here.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::services::VerifiedUser;
use crate::state::AppState;

/// Extractor that requires a verified identity.
///
/// Rejects with `401` if the header is missing or the token is not accepted.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(user): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.user_id)
/// }
/// ```
pub struct RequireUser(pub VerifiedUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing access token.".to_string()))?;

        verify(state, token).await.map(Self)
    }
}

/// Extractor that verifies a token when one is presented.
///
/// No header means a guest. A header with a rejected token is still a `401`:
/// a shopper who thinks they are signed in should find out.
pub struct OptionalUser(pub Option<VerifiedUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => verify(state, token).await.map(|user| Self(Some(user))),
            None => Ok(Self(None)),
        }
    }
}

async fn verify(state: &AppState, token: &str) -> Result<VerifiedUser, AppError> {
    let user = state.auth0().verify_access_token(token).await?;
    set_sentry_user(&user.user_id);
    Ok(user)
}

/// The token from an `Authorization: Bearer` header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/account/orders");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("bearer abc"))), Some("abc"));
    }

    #[test]
    fn test_bearer_token_missing_or_wrong_scheme() {
        assert_eq!(bearer_token(&parts(None)), None);
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer   "))), None);
    }

    #[tokio::test]
    async fn test_require_user_without_header() {
        let state = AppState::new(crate::config::tests::test_config()).unwrap();
        let mut parts = parts(None);

        let result = RequireUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_optional_user_without_header_is_guest() {
        let state = AppState::new(crate::config::tests::test_config()).unwrap();
        let mut parts = parts(None);

        let OptionalUser(user) = OptionalUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
