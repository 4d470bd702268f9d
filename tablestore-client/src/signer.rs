//! Request signing (§6): the canonical signing string and its HMAC-SHA1 +
//! Base64 signature, computed the same way for every action.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Holds the signing secret and produces a signature for one request's
/// vendor-prefixed headers. Cheap to clone; carries no mutable state.
#[derive(Clone)]
pub struct Signer {
    access_key_secret: String,
}

impl Signer {
    pub fn new(access_key_secret: impl Into<String>) -> Self {
        Signer { access_key_secret: access_key_secret.into() }
    }

    /// Builds the canonical signing string (§6): the path, a literal
    /// `"POST"`, an empty line, then every `x-ots-` header sorted ascending
    /// bytewise by name, one `name:value\n` per line. Headers not prefixed
    /// `x-ots-` are ignored even if passed in, since the signing string
    /// never contains them.
    pub fn signing_string(&self, path: &str, headers: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> =
            headers.iter().filter(|(name, _)| name.starts_with("x-ots-")).collect();
        sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut out = String::new();
        out.push_str(path);
        out.push('\n');
        out.push_str("POST");
        out.push('\n');
        out.push('\n');
        for (name, value) in sorted {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Base64(HMAC-SHA1(secret, signing_string)).
    pub fn sign(&self, path: &str, headers: &[(&str, &str)]) -> String {
        let signing_string = self.signing_string(path, headers);
        let mut mac = HmacSha1::new_from_slice(self.access_key_secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(signing_string.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_string_sorts_headers_and_excludes_others() {
        let signer = Signer::new("secret");
        let s = signer.signing_string(
            "/GetRow",
            &[
                ("x-ots-date", "2024-01-01T00:00:00.000Z"),
                ("x-ots-accesskeyid", "ak"),
                ("content-type", "application/x.pb2"),
            ],
        );
        assert_eq!(
            s,
            "/GetRow\nPOST\n\nx-ots-accesskeyid:ak\nx-ots-date:2024-01-01T00:00:00.000Z\n"
        );
    }

    #[test]
    fn same_inputs_sign_deterministically() {
        let signer = Signer::new("secret");
        let headers = [("x-ots-accesskeyid", "ak"), ("x-ots-date", "d")];
        assert_eq!(signer.sign("/PutRow", &headers), signer.sign("/PutRow", &headers));
    }

    #[test]
    fn different_secrets_sign_differently() {
        let headers = [("x-ots-accesskeyid", "ak")];
        assert_ne!(
            Signer::new("secret-a").sign("/PutRow", &headers),
            Signer::new("secret-b").sign("/PutRow", &headers),
        );
    }
}
