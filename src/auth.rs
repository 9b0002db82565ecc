//! Account registration and password hashing

use crate::db::Database;
use crate::error::ServiceError;
use crate::logging;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Deserialize;

const SALT_LEN: usize = 16;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    MissingFields,
    EmailTaken,
}

/// Argon2id with default parameters, stored as a PHC string
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt_bytes: [u8; SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create an account unless the email is already registered.
/// An existing account is never modified.
pub fn register_user(db: &Database, request: &RegisterRequest) -> Result<RegisterOutcome, ServiceError> {
    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Ok(RegisterOutcome::MissingFields);
    }

    if db.find_user_by_email(&email)?.is_some() {
        logging::log_auth(&format!("Registration rejected, email already registered: {}", email));
        return Ok(RegisterOutcome::EmailTaken);
    }

    let full_name = request
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let hashed = hash_password(&request.password)?;
    match db.create_user(&email, &hashed, full_name) {
        Ok(user) => {
            logging::log_auth(&format!("Registered user id={}", user.id));
            Ok(RegisterOutcome::Created)
        }
        // Lost a race with a concurrent registration for the same email
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(RegisterOutcome::EmailTaken)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: Some("Grace Hopper".to_string()),
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("correct horse").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password(&stored, "correct horse"));
        assert!(!verify_password(&stored, "battery staple"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("not-a-hash", "x"));
        assert!(!verify_password("@@@$@@@", "x"));
        assert!(!verify_password("$argon2id$v=19$m=19456,t=2,p=1$bm9wZQ", "x"));
    }

    #[test]
    fn test_stored_hash_is_not_a_fast_digest() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, &request("ada@example.com", "analytical")).unwrap();

        let user = db.find_user_by_email("ada@example.com").unwrap().unwrap();
        let parsed = PasswordHash::new(&user.hashed_password).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(parsed.params.get_decimal("m").unwrap() >= 19 * 1024);
        assert!(!user.hashed_password.contains("analytical"));
    }

    #[test]
    fn test_register_then_duplicate() {
        let db = Database::open_in_memory().unwrap();

        let first = register_user(&db, &request("grace@example.com", "cobol4ever")).unwrap();
        assert_eq!(first, RegisterOutcome::Created);

        let second = register_user(&db, &request("  Grace@Example.com ", "other")).unwrap();
        assert_eq!(second, RegisterOutcome::EmailTaken);

        let user = db.find_user_by_email("grace@example.com").unwrap().unwrap();
        assert!(verify_password(&user.hashed_password, "cobol4ever"));
        assert!(!verify_password(&user.hashed_password, "other"));
    }

    #[test]
    fn test_register_requires_email_and_password() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            register_user(&db, &request(" ", "pw")).unwrap(),
            RegisterOutcome::MissingFields
        );
        assert_eq!(
            register_user(&db, &request("a@b.c", "")).unwrap(),
            RegisterOutcome::MissingFields
        );
    }
}
