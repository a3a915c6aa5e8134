use std::sync::Arc;

use axum::{Form, extract::State, response::Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;

use murmur_types::api::CredentialsForm;

use crate::credentials::CredentialStore;
use crate::error::{ApiError, blocking};
use crate::messages::MessageStore;
use crate::middleware::found;
use crate::session::{SessionContext, SessionStore};

pub const DEFAULT_COOKIE_NAME: &str = "murmur.sid";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub credentials: CredentialStore,
    pub messages: Arc<MessageStore>,
    pub sessions: Arc<SessionStore>,
    pub cookies: CookieSettings,
}

/// How the session cookie is written. `secure` depends on whether the
/// deployment terminates TLS in front of us.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            secure: false,
        }
    }
}

impl AppStateInner {
    /// Swap whatever session the request carried for a fresh authenticated one.
    async fn start_session(&self, jar: CookieJar, previous: Option<&str>, username: &str) -> CookieJar {
        if let Some(token) = previous {
            self.sessions.revoke(token).await;
        }

        let token = self.sessions.sign_in(username).await;
        let max_age = time::Duration::seconds(self.sessions.ttl().num_seconds());

        let cookie = Cookie::build((self.cookies.name.clone(), token))
            .http_only(true)
            .path("/")
            .secure(self.cookies.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build();

        jar.add(cookie)
    }
}

/// POST /signin
pub async fn sign_in(
    State(state): State<AppState>,
    ctx: SessionContext,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Response), ApiError> {
    let username = form.username.trim().to_string();
    let password = form.password;

    let check = state.clone();
    let name = username.clone();
    let authenticated =
        blocking(move || check.credentials.verify_credentials(&name, &password)).await?;

    if !authenticated {
        info!("Sign-in rejected");
        return Ok((jar, found("/signin")));
    }

    let jar = state.start_session(jar, ctx.token.as_deref(), &username).await;
    info!("{} signed in", username);
    Ok((jar, found("/")))
}

/// POST /newuser: register, then sign straight in.
pub async fn new_user(
    State(state): State<AppState>,
    ctx: SessionContext,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Response), ApiError> {
    let username = form.username.trim().to_string();
    let password = form.password;

    if username.is_empty() || password.is_empty() {
        return Ok((jar, found("/newuser")));
    }

    let create = state.clone();
    let name = username.clone();
    let created = blocking(move || create.credentials.create_new_user(&name, &password)).await?;

    if !created {
        info!("Registration rejected, username taken");
        return Ok((jar, found("/newuser")));
    }

    let jar = state.start_session(jar, ctx.token.as_deref(), &username).await;
    info!("{} registered", username);
    Ok((jar, found("/")))
}

/// POST /signout
pub async fn sign_out(
    State(state): State<AppState>,
    ctx: SessionContext,
    jar: CookieJar,
) -> (CookieJar, Response) {
    if let Some(token) = ctx.token.as_deref() {
        state.sessions.revoke(token).await;
    }
    if let Some(username) = ctx.username.as_deref() {
        info!("{} signed out", username);
    }

    let cookie = Cookie::build((state.cookies.name.clone(), "")).path("/").build();
    (jar.remove(cookie), found("/signin"))
}
