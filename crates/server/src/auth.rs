use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use tradeflow_core::config::AuthConfig;
use tradeflow_core::domain::principal::Principal;

/// Reads the identity an upstream proxy attached to the request and stores it as a
/// [`Principal`] extension. Requests without a usable identity pass through untouched;
/// handlers decide whether they need one.
pub async fn attach_principal(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(principal) = principal_from_headers(&auth, request.headers()) {
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

pub fn principal_from_headers(auth: &AuthConfig, headers: &HeaderMap) -> Option<Principal> {
    if let Some(secret) = &auth.proxy_secret {
        if header_value(headers, &auth.proxy_secret_header) != Some(secret.expose_secret()) {
            if header_value(headers, &auth.person_header).is_some() {
                warn!(
                    event_name = "auth.proxy_secret.mismatch",
                    "identity headers ignored: proxy secret missing or wrong"
                );
            }
            return None;
        }
    }

    let raw_person = header_value(headers, &auth.person_header)?;
    let Some(person_id) = raw_person.parse::<i64>().ok().filter(|id| *id > 0) else {
        debug!(
            event_name = "auth.person_header.invalid",
            "identity header is not a positive person id"
        );
        return None;
    };
    let role = header_value(headers, &auth.role_header).unwrap_or_default();

    Some(Principal::new(person_id, role))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim)
}

/// The caller's identity if the proxy supplied one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurrentPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}
