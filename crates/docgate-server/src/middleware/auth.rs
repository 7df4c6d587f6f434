use axum::body::Body;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::Credential;

fn skip_credential(path: &str) -> bool {
    matches!(path, "/healthz" | "/metrics")
}

/// Reads the bearer credential off the request for the handlers. Verification
/// happens inside the envelope so that rejected credentials are still audited.
pub async fn credential_middleware(mut request: Request<Body>, next: Next) -> Response {
    if skip_credential(request.uri().path()) {
        return next.run(request).await;
    }

    let credential = match request.headers().get(AUTHORIZATION) {
        None => Credential::Missing,
        Some(value) => match value.to_str() {
            Ok(header) => Credential::from_header(Some(header)),
            Err(_) => Credential::Malformed,
        },
    };
    request.extensions_mut().insert(credential);

    next.run(request).await
}
