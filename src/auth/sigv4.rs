use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::fmt;

pub const SIGN_V4_ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const SERVICE_TYPE_S3: &str = "s3";
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SCOPE_DATE_FORMAT: &str = "%Y%m%d";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
}

/// Signs admin API requests with AWS Signature Version 4.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: SERVICE_TYPE_S3.to_string(),
        }
    }

    /// Signs a body-less request. `url` must carry the query string produced
    /// by [`canonical_query_string`] so the signed and sent forms agree.
    pub fn sign(&self, method: &str, url: &Url, now: DateTime<Utc>) -> SignedHeaders {
        let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
        let host = host_header(url);
        let headers = [
            ("host", host.as_str()),
            ("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256),
            ("x-amz-date", amz_date.as_str()),
        ];

        let authorization = self.authorization(
            method,
            url.path(),
            url.query().unwrap_or(""),
            &headers,
            EMPTY_PAYLOAD_SHA256,
            now,
        );

        SignedHeaders {
            authorization,
            amz_date,
            content_sha256: EMPTY_PAYLOAD_SHA256.to_string(),
        }
    }

    pub fn authorization(
        &self,
        method: &str,
        path: &str,
        canonical_query: &str,
        headers: &[(&str, &str)],
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> String {
        let (canonical, signed_headers) =
            canonical_request(method, path, canonical_query, headers, payload_hash);

        let scope = self.scope(now);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            SIGN_V4_ALGORITHM,
            now.format(AMZ_DATE_FORMAT),
            scope,
            hex_sha256(canonical.as_bytes())
        );

        let key = signing_key(&self.credentials.secret_key, now, &self.region, &self.service);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            SIGN_V4_ALGORITHM, self.credentials.access_key, scope, signed_headers, signature
        )
    }

    fn scope(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            now.format(SCOPE_DATE_FORMAT),
            self.region,
            self.service
        )
    }
}

pub fn signing_key(secret: &str, now: DateTime<Utc>, region: &str, service: &str) -> Vec<u8> {
    let date = now.format(SCOPE_DATE_FORMAT).to_string();
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Returns the canonical request and the `SignedHeaders` list.
pub fn canonical_request(
    method: &str,
    path: &str,
    canonical_query: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
) -> (String, String) {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), trim_all(v)))
        .collect();
    normalized.sort();

    let canonical_headers: String = normalized
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_headers = normalized
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let path = if path.is_empty() { "/" } else { path };
    let canonical = [
        method,
        path,
        canonical_query,
        canonical_headers.as_str(),
        signed_headers.as_str(),
        payload_hash,
    ]
    .join("\n");

    (canonical, signed_headers)
}

/// Encodes and sorts query parameters the way SigV4 expects them.
pub fn canonical_query_string(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 encoding: everything but `A-Za-z0-9-_.~` is percent-encoded.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn trim_all(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
