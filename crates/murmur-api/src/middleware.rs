use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::auth::AppState;
use crate::session::SessionContext;

/// Resolve the session cookie and attach a `SessionContext` snapshot to the
/// request. Runs on every route.
pub async fn session_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = match jar.get(&state.cookies.name) {
        Some(cookie) => state.sessions.lookup(cookie.value()).await,
        None => SessionContext::default(),
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Redirect anonymous callers to the sign-in page. Signed-in callers get an
/// `AuthenticatedUser` extension.
pub async fn require_auth(mut req: Request, next: Next) -> Response {
    let user = req
        .extensions()
        .get::<SessionContext>()
        .and_then(SessionContext::authenticated_user);

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => {
            debug!("Unauthorized request to {}", req.uri().path());
            found("/signin")
        }
    }
}

/// `302 Found` to `location`. Every redirect in the app, form posts included.
pub fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
