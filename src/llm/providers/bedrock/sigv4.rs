//! AWS Signature Version 4 request signing (spec §4.4), scoped to exactly
//! what Bedrock's `InvokeModel`/`InvokeModelWithResponseStream` need: a
//! single signed `POST` with a JSON body and no query parameters.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub struct SigV4Signer<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
    pub service: &'a str,
}

pub struct SignedHeaders {
    pub headers: Vec<(String, String)>,
}

impl<'a> SigV4Signer<'a> {
    /// Signs a POST request and returns the headers to attach, including
    /// `Authorization`, `X-Amz-Date`, and (if present) the session token.
    pub fn sign(&self, method: &str, host: &str, path: &str, payload: &[u8], timestamp: chrono::DateTime<chrono::Utc>) -> SignedHeaders {
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = timestamp.format("%Y%m%d").to_string();

        let payload_hash = hex(&Sha256::digest(payload));

        let mut signed_header_names = vec!["content-type", "host", "x-amz-content-sha256", "x-amz-date"];
        if self.session_token.is_some() {
            signed_header_names.push("x-amz-security-token");
        }
        signed_header_names.sort_unstable();

        let canonical_headers = {
            let mut lines = Vec::new();
            for name in &signed_header_names {
                let value = match *name {
                    "content-type" => "application/json".to_string(),
                    "host" => host.to_string(),
                    "x-amz-content-sha256" => payload_hash.clone(),
                    "x-amz-date" => amz_date.clone(),
                    "x-amz-security-token" => self.session_token.unwrap_or_default().to_string(),
                    _ => unreachable!(),
                };
                lines.push(format!("{name}:{value}\n"));
            }
            lines.concat()
        };
        let signed_headers = signed_header_names.join(";");

        let canonical_request = format!(
            "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
            path = path,
        );
        let canonical_request_hash = hex(&Sha256::digest(canonical_request.as_bytes()));

        let credential_scope = format!("{date_stamp}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!("AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{canonical_request_hash}");

        let signing_key = derive_signing_key(self.secret_access_key, &date_stamp, self.region, self.service);
        let signature = hex(&hmac_sign(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id,
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization),
            ("X-Amz-Date".to_string(), amz_date),
            ("X-Amz-Content-Sha256".to_string(), payload_hash),
        ];
        if let Some(token) = self.session_token {
            headers.push(("X-Amz-Security-Token".to_string(), token.to_string()));
        }

        SignedHeaders { headers }
    }
}

fn hmac_sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sign(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sign(&k_date, region.as_bytes());
    let k_service = hmac_sign(&k_region, service.as_bytes());
    hmac_sign(&k_service, b"aws4_request")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signature_is_deterministic_for_the_same_inputs() {
        let signer = SigV4Signer {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            session_token: None,
            region: "us-east-1",
            service: "bedrock",
        };
        let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let a = signer.sign("POST", "bedrock-runtime.us-east-1.amazonaws.com", "/model/x/invoke", b"{}", ts);
        let b = signer.sign("POST", "bedrock-runtime.us-east-1.amazonaws.com", "/model/x/invoke", b"{}", ts);

        assert_eq!(a.headers, b.headers);
    }

    #[test]
    fn signature_changes_with_payload() {
        let signer = SigV4Signer {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            session_token: None,
            region: "us-east-1",
            service: "bedrock",
        };
        let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let a = signer.sign("POST", "host", "/path", b"{\"a\":1}", ts);
        let b = signer.sign("POST", "host", "/path", b"{\"a\":2}", ts);

        let sig_a = a.headers.iter().find(|(k, _)| k == "Authorization").unwrap();
        let sig_b = b.headers.iter().find(|(k, _)| k == "Authorization").unwrap();
        assert_ne!(sig_a.1, sig_b.1);
    }

    #[test]
    fn includes_session_token_header_when_present() {
        let signer = SigV4Signer {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "secret",
            session_token: Some("token-value"),
            region: "us-east-1",
            service: "bedrock",
        };
        let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let signed = signer.sign("POST", "host", "/path", b"{}", ts);
        assert!(signed.headers.iter().any(|(k, v)| k == "X-Amz-Security-Token" && v == "token-value"));
    }
}
