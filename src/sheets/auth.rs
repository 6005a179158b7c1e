use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::SheetError;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Where the service identity comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// A service-account JSON key file.
    KeyFile(PathBuf),
    /// The GCE / Cloud Run metadata server's default service account.
    MetadataServer,
}

impl CredentialSource {
    pub fn from_key_file(path: Option<PathBuf>) -> Self {
        match path {
            Some(p) => CredentialSource::KeyFile(p),
            None => CredentialSource::MetadataServer,
        }
    }
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fetch a fresh OAuth access token for the spreadsheet scope.
pub async fn access_token(
    client: &reqwest::Client,
    source: &CredentialSource,
) -> Result<String, SheetError> {
    match source {
        CredentialSource::KeyFile(path) => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                SheetError::Credentials(format!("cannot read {}: {}", path.display(), e))
            })?;
            let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
                SheetError::Credentials(format!("{} is not a service account key: {}", path.display(), e))
            })?;
            service_account_token(client, &key).await
        }
        CredentialSource::MetadataServer => metadata_token(client).await,
    }
}

async fn service_account_token(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
) -> Result<String, SheetError> {
    let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
    let assertion = signed_assertion(key, token_uri)?;

    let resp = client
        .post(token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;
    read_token(resp).await
}

fn signed_assertion(key: &ServiceAccountKey, token_uri: &str) -> Result<String, SheetError> {
    let now = Utc::now();
    let claims = Claims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: token_uri,
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SheetError::Credentials(format!("invalid private key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SheetError::Credentials(format!("JWT signing failed: {}", e)))
}

async fn metadata_token(client: &reqwest::Client) -> Result<String, SheetError> {
    let resp = client
        .get(METADATA_TOKEN_URL)
        .query(&[("scopes", SHEETS_SCOPE)])
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| SheetError::Credentials(format!("metadata server unreachable: {}", e)))?;
    read_token(resp).await
}

async fn read_token(resp: reqwest::Response) -> Result<String, SheetError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SheetError::Credentials(format!(
            "token endpoint returned {}: {}",
            status,
            body.trim()
        )));
    }
    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| SheetError::Credentials(format!("malformed token response: {}", e)))?;
    Ok(token.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_file_means_metadata_server() {
        assert!(matches!(
            CredentialSource::from_key_file(None),
            CredentialSource::MetadataServer
        ));
        assert!(matches!(
            CredentialSource::from_key_file(Some("/k.json".into())),
            CredentialSource::KeyFile(_)
        ));
    }

    #[test]
    fn bad_private_key_is_a_credentials_error() {
        let key = ServiceAccountKey {
            client_email: "svc@example.iam.gserviceaccount.com".into(),
            private_key: "not a pem".into(),
            token_uri: None,
        };
        let err = signed_assertion(&key, DEFAULT_TOKEN_URI).unwrap_err();
        assert!(matches!(err, SheetError::Credentials(_)));
    }

    #[tokio::test]
    async fn unreadable_key_file_is_a_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CredentialSource::KeyFile(dir.path().join("missing.json"));
        let err = access_token(&reqwest::Client::new(), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::Credentials(_)));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"type":"authorized_user"}"#).unwrap();
        let err = access_token(&reqwest::Client::new(), &CredentialSource::KeyFile(path))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::Credentials(_)));
    }
}
