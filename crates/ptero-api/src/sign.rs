use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// API key pair configured on the panel for this integration.
///
/// The public half travels in clear inside the bearer token; the private
/// half only ever feeds the HMAC.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub public_key: String,
    pub private_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }
}

/// Compute the bearer token for one request.
///
/// The panel verifies `HMAC-SHA256(private_key, url || body)` where `url`
/// is the full URL including the query string and `body` is the exact
/// serialized JSON payload (empty string for bodyless requests). The
/// token is `public_key.base64(digest)`.
pub fn bearer_token(credentials: &Credentials, url: &str, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(credentials.private_key.as_bytes())
        .expect("HMAC accepts any key size");
    mac.update(url.as_bytes());
    mac.update(body.as_bytes());
    let digest = mac.finalize().into_bytes();
    format!("{}.{}", credentials.public_key, BASE64.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("pub_abc", "priv_secret")
    }

    #[test]
    fn token_is_deterministic() {
        let url = "https://panel.example.com/api/admin/servers/7/suspend?action=suspend";
        let a = bearer_token(&creds(), url, "");
        let b = bearer_token(&creds(), url, "");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_body_contributes_nothing_to_the_digest() {
        // The scheme signs the concatenation, so a bodyless request is
        // signed over the bare URL.
        let url = "https://panel.example.com/api/admin/nodes";
        assert_eq!(bearer_token(&creds(), url, ""), bearer_token(&creds(), "", url));
    }

    #[test]
    fn token_carries_public_key_and_base64_digest() {
        let token = bearer_token(&creds(), "https://panel.example.com/api/admin/users", "{}");
        let (public, digest) = token.split_once('.').unwrap();
        assert_eq!(public, "pub_abc");
        // SHA-256 digest is 32 bytes, 44 chars in standard base64.
        assert_eq!(digest.len(), 44);
        assert_eq!(BASE64.decode(digest).unwrap().len(), 32);
    }

    #[test]
    fn any_component_changes_the_digest() {
        let url = "https://panel.example.com/api/admin/users";
        let base = bearer_token(&creds(), url, r#"{"email":"a@b.c"}"#);

        let other_body = bearer_token(&creds(), url, r#"{"email":"x@y.z"}"#);
        assert_ne!(base, other_body);

        let other_url = bearer_token(&creds(), "https://panel.example.com/api/admin/nodes", r#"{"email":"a@b.c"}"#);
        assert_ne!(base, other_url);

        let other_key = Credentials::new("pub_abc", "priv_other");
        assert_ne!(base, bearer_token(&other_key, url, r#"{"email":"a@b.c"}"#));
    }

    #[test]
    fn query_string_is_part_of_the_signed_url() {
        let with = bearer_token(&creds(), "https://p/api/admin/servers/1/suspend?action=suspend", "");
        let without = bearer_token(&creds(), "https://p/api/admin/servers/1/suspend", "");
        let (_, with_digest) = with.split_once('.').unwrap();
        let (_, without_digest) = without.split_once('.').unwrap();
        assert_ne!(with_digest, without_digest);
    }
}
