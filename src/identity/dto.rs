use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identity::services::Principal;

/// Wire form of a resolved principal, as delivered by the external OAuth
/// callback layer. The provider discriminator is free-form on purpose: an
/// unknown provider must reach the service layer as a typed rejection, not
/// as a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrincipalPayload {
    pub provider: String,
    pub sub: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub login: Option<String>,
    pub email: Option<String>,
}

impl PrincipalPayload {
    /// Narrow the free-form payload down to a recognized provider.
    pub fn into_principal(self) -> Result<Principal, Error> {
        match self.provider.as_str() {
            "google" => Ok(Principal::Google {
                sub: self.sub,
                name: self.name,
                email: self.email,
            }),
            "github" => Ok(Principal::Github {
                id: self.id,
                login: self.login,
                email: self.email,
            }),
            other => Err(Error::UnsupportedPrincipal(other.to_string())),
        }
    }
}

/// Response of the username endpoint.
#[derive(Debug, Serialize)]
pub struct UsernameResponse {
    pub name: String,
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn google_payload_becomes_a_google_principal() {
        let payload: PrincipalPayload = serde_json::from_str(
            r#"{"provider":"google","sub":"g1","name":"Ann","email":"ann@x.com"}"#,
        )
        .expect("parse");

        let principal = payload.into_principal().expect("recognized provider");
        assert_eq!(
            principal,
            Principal::Google {
                sub: Some("g1".into()),
                name: Some("Ann".into()),
                email: Some("ann@x.com".into()),
            }
        );
    }

    #[test]
    fn github_payload_becomes_a_github_principal() {
        let payload: PrincipalPayload = serde_json::from_str(
            r#"{"provider":"github","id":"42","login":"ann","email":"ann@x.com"}"#,
        )
        .expect("parse");

        let principal = payload.into_principal().expect("recognized provider");
        assert_eq!(
            principal,
            Principal::Github {
                id: Some("42".into()),
                login: Some("ann".into()),
                email: Some("ann@x.com".into()),
            }
        );
    }

    #[test]
    fn unknown_provider_is_rejected_as_unsupported() {
        let payload = PrincipalPayload {
            provider: "gitlab".into(),
            ..PrincipalPayload::default()
        };

        let err = payload.into_principal().unwrap_err();
        assert!(matches!(err, Error::UnsupportedPrincipal(p) if p == "gitlab"));
    }
}
