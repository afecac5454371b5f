//! Plugging a custom signing scheme into the engine: a keyed-HMAC API-key
//! signer that binds the signature to the payload hash.

use async_trait::async_trait;
use http::request::Parts;
use reqflow_core::hash::hex_hmac_sha256;
use reqflow_core::{
    Context, Error, OsEnv, ProvideCredential, Result, SignRequest, Signer, SigningCredential,
};
use std::time::Duration;

// Define a custom credential type
#[derive(Clone, Debug)]
struct ApiKey {
    key_id: String,
    secret: String,
}

impl SigningCredential for ApiKey {
    fn is_valid(&self) -> bool {
        !self.key_id.is_empty() && !self.secret.is_empty()
    }
}

// Load the credential from the environment
#[derive(Debug)]
struct ApiKeyProvider;

#[async_trait]
impl ProvideCredential for ApiKeyProvider {
    type Credential = ApiKey;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let (Some(key_id), Some(secret)) = (ctx.env_var("MY_API_KEY"), ctx.env_var("MY_API_SECRET"))
        else {
            return Ok(None);
        };

        Ok(Some(ApiKey { key_id, secret }))
    }
}

// Sign the request: key id in one header, an HMAC over method, path and
// payload hash in another.
#[derive(Debug)]
struct ApiKeySigner;

#[async_trait]
impl SignRequest for ApiKeySigner {
    type Credential = ApiKey;

    async fn sign_request(
        &self,
        _ctx: &Context,
        parts: &mut Parts,
        payload_hash: &str,
        credential: Option<&Self::Credential>,
        _expires_in: Option<Duration>,
    ) -> Result<()> {
        let cred = credential
            .ok_or_else(|| Error::credential("no api key available to sign the request"))?;

        let string_to_sign = format!("{}\n{}\n{}", parts.method, parts.uri.path(), payload_hash);
        let signature = hex_hmac_sha256(cred.secret.as_bytes(), string_to_sign.as_bytes());

        parts.headers.insert("x-api-key", cred.key_id.parse()?);
        parts.headers.insert("x-api-signature", signature.parse()?);

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let ctx = Context::new().with_env(OsEnv);
    let signer = Signer::new(ctx, ApiKeyProvider, ApiKeySigner);

    let mut parts = http::Request::builder()
        .method("GET")
        .uri("https://api.example.com/v1/users")
        .body(())
        .expect("request must be valid")
        .into_parts()
        .0;

    let payload_hash = reqflow_core::hash::hex_sha256(b"");
    match signer.sign(&mut parts, &payload_hash, None).await {
        Ok(_) => {
            println!("Request signed successfully!");
            println!("Headers: {:?}", parts.headers);
        }
        Err(e) => {
            eprintln!("Failed to sign request: {e}");
        }
    }

    Ok(())
}
