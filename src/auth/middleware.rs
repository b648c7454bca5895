//! Route guards. Each guard resolves the request's session context, applies
//! the pure auth decision, and on denial answers with the redirect before
//! the guarded handler ever runs.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::{self, AuthDecision, SessionContext};
use crate::core::app_state::AppState;

/// Extract the bearer token carried by a request, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn context_for(state: &AppState, headers: &HeaderMap) -> SessionContext {
    bearer_token(headers)
        .and_then(|token| state.sessions.get(token))
        .unwrap_or_default()
}

/// Guard for patient-facing routes. Inserts the patient id and the session
/// context as request extensions. Admins holding a patient marker pass.
pub async fn patient_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = context_for(&state, req.headers());
    if let AuthDecision::Denied { redirect } = auth::require_login(&ctx, auth::LOGIN_URL) {
        return Redirect::to(redirect).into_response();
    }
    let Some(patient_id) = auth::patient_scope(&ctx) else {
        return Redirect::to(auth::LOGIN_URL).into_response();
    };

    req.extensions_mut().insert(patient_id);
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Guard for admin-only routes.
pub async fn admin_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = context_for(&state, req.headers());
    if let AuthDecision::Denied { redirect } = auth::require_admin(&ctx, auth::LOGIN_URL) {
        return Redirect::to(redirect).into_response();
    }

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Guard for routes any authenticated principal may call.
pub async fn login_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = context_for(&state, req.headers());
    if let AuthDecision::Denied { redirect } = auth::require_login(&ctx, auth::LOGIN_URL) {
        return Redirect::to(redirect).into_response();
    }

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parses_the_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc-123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc-123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }
}
