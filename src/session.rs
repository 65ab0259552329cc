//! Upload session and the remote-service boundary.
//!
//! There is no shared login singleton: a [`Session`] value is passed
//! explicitly to every collaborator call, and a refreshed token comes back as
//! an explicit value on the [`UploadReceipt`] rather than mutating anything
//! behind the caller's back. The remote service itself lives behind the
//! [`Uploader`] trait; this crate never owns the wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which deployment of the remote service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Devel,
    Staging,
    Prod,
}

impl Environment {
    /// API host (auth, profile).
    pub fn api_host(self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:8009",
            Environment::Devel => "https://devel-api.tidepool.io",
            Environment::Staging => "https://staging-api.tidepool.io",
            Environment::Prod => "https://api.tidepool.io",
        }
    }

    /// Data ingestion host.
    pub fn upload_host(self) -> &'static str {
        match self {
            Environment::Local => "http://localhost:9122",
            Environment::Devel => "https://devel-uploads.tidepool.io",
            Environment::Staging => "https://staging-uploads.tidepool.io",
            Environment::Prod => "https://uploads.tidepool.io",
        }
    }
}

/// One authenticated upload session.
///
/// Immutable by convention: token refresh produces a new value via
/// [`Session::with_token`] or [`Session::absorb`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    environment: Environment,
    host: String,
    upload_host: String,
    token: Option<String>,
    user_id: Option<String>,
}

impl Session {
    /// Session against the stock hosts for `environment`, not yet
    /// authenticated.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            host: environment.api_host().to_string(),
            upload_host: environment.upload_host().to_string(),
            token: None,
            user_id: None,
        }
    }

    /// Session with explicit hosts (self-hosted deployments, tests).
    pub fn with_hosts(
        environment: Environment,
        host: impl Into<String>,
        upload_host: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            host: host.into(),
            upload_host: upload_host.into(),
            token: None,
            user_id: None,
        }
    }

    /// Attach the credentials the auth service handed back.
    pub fn authenticated(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.user_id = Some(user_id.into());
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn upload_host(&self) -> &str {
        &self.upload_host
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// New session carrying a refreshed token.
    pub fn with_token(&self, token: impl Into<String>) -> Session {
        let mut next = self.clone();
        next.token = Some(token.into());
        next
    }

    /// Fold an upload receipt back in: if the service rotated the token, the
    /// returned session carries the new one.
    pub fn absorb(&self, receipt: &UploadReceipt) -> Session {
        match &receipt.refreshed_token {
            Some(token) => self.with_token(token),
            None => self.clone(),
        }
    }
}

/// One normalized record ready for upload.
///
/// Timestamp construction (timezone handling included) happens upstream;
/// `time` arrives here as a finished ISO-8601 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
    pub value: f64,
    pub units: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

/// What the remote service said about an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Records the service accepted.
    pub accepted: usize,
    /// Rotated session token, when the service issued one.
    pub refreshed_token: Option<String>,
}

/// Remote upload collaborator — the final pipeline stage's sole external
/// effect. Retry/backoff policy, if any, lives behind this trait, not in the
/// pipeline.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, session: &Session, records: &[Record]) -> Result<UploadReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environments_pair_api_and_upload_hosts() {
        assert_eq!(Environment::Prod.api_host(), "https://api.tidepool.io");
        assert_eq!(Environment::Prod.upload_host(), "https://uploads.tidepool.io");
        assert_eq!(Environment::Local.upload_host(), "http://localhost:9122");
    }

    #[test]
    fn session_authentication_and_accessors() {
        let session = Session::new(Environment::Staging).authenticated("tok-1", "user-9");
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some("tok-1"));
        assert_eq!(session.user_id(), Some("user-9"));
        assert_eq!(session.host(), "https://staging-api.tidepool.io");
    }

    #[test]
    fn token_refresh_is_a_new_value_not_a_side_effect() {
        let original = Session::new(Environment::Devel).authenticated("old", "u");
        let refreshed = original.with_token("new");
        assert_eq!(original.token(), Some("old"));
        assert_eq!(refreshed.token(), Some("new"));
        assert_eq!(refreshed.user_id(), Some("u"));
    }

    #[test]
    fn absorb_applies_a_rotated_token_only_when_present() {
        let session = Session::new(Environment::Local).authenticated("tok", "u");

        let unchanged = session.absorb(&UploadReceipt { accepted: 3, refreshed_token: None });
        assert_eq!(unchanged.token(), Some("tok"));

        let rotated = session
            .absorb(&UploadReceipt { accepted: 3, refreshed_token: Some("tok-2".into()) });
        assert_eq!(rotated.token(), Some("tok-2"));
    }

    #[test]
    fn record_serializes_with_service_field_names() {
        let record = Record {
            kind: "smbg".into(),
            time: "2014-01-15T08:30:00".into(),
            value: 5.4,
            units: "mmol/L".into(),
            device_id: "dexcom-g4-1234".into(),
        };
        let yaml = serde_yaml_ng::to_string(&record).unwrap();
        assert!(yaml.contains("type: smbg"));
        assert!(yaml.contains("deviceId: dexcom-g4-1234"));
        let back: Record = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, record);
    }
}
