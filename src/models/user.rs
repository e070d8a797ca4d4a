//! Users, reference data and the authenticated actor

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::Role;
use crate::error::AppError;

/// Staff member as known to the lending core (managed elsewhere)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    /// National identity number, used as the return-time check
    #[serde(skip_serializing)]
    pub dni: String,
    pub full_name: String,
    pub role: Role,
}

/// Area, grade or section reference row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reference {
    pub id: i32,
    pub name: String,
}

/// Identity of the caller, decoded from the bearer token issued by the
/// identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorClaims {
    pub sub: String,
    pub actor_id: i32,
    pub role: Role,
    pub exp: i64,
}

impl ActorClaims {
    /// Parse and verify a bearer token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.actor_id,
            role: self.role,
        }
    }
}

/// The acting user of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i32, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrador
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn test_claims_round_trip_through_token() {
        let claims = ActorClaims {
            sub: "docente1".to_string(),
            actor_id: 7,
            role: Role::Docente,
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        let decoded = ActorClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.actor(), Actor::new(7, Role::Docente));
        assert!(ActorClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_require_admin() {
        assert!(Actor::new(1, Role::Administrador).require_admin().is_ok());
        assert!(matches!(
            Actor::new(2, Role::Docente).require_admin(),
            Err(AppError::Authorization(_))
        ));
    }
}
