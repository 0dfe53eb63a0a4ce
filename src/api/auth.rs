// Shared-secret admin authentication
use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use log::{debug, warn};

use crate::error::{Error, Result};

/// Extract the bearer token from the Authorization header
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Mutating endpoints require `Authorization: Bearer {admin_password}`
pub fn require_admin(req: &HttpRequest, admin_password: &str) -> Result<()> {
    match bearer_token(req) {
        Some(token) if !admin_password.is_empty() && token == admin_password => {
            debug!("Admin request authorized: {} {}", req.method(), req.path());
            Ok(())
        }
        Some(_) => {
            warn!("Rejected admin request with wrong credentials: {} {}", req.method(), req.path());
            Err(Error::Unauthorized)
        }
        None => {
            warn!("Rejected admin request without credentials: {} {}", req.method(), req.path());
            Err(Error::Unauthorized)
        }
    }
}

/// Check a password submitted to the login endpoint
pub fn check_password(submitted: &str, admin_password: &str) -> Result<()> {
    if submitted.is_empty() {
        return Err(Error::Validation("Password is required".to_string()));
    }
    if submitted != admin_password {
        return Err(Error::Unauthorized);
    }
    Ok(())
}
