//! Shared Key request signing and SAS URL tokens for Azure Blob Storage.
//! Reference: https://learn.microsoft.com/rest/api/storageservices/authorize-with-shared-key

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use urlencoding::encode;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// SAS/Shared Key API version the canonical strings are built against.
pub const API_VERSION: &str = "2021-08-06";

/// Storage account credential: the account name plus its decoded access key.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    pub fn from_base64(account: impl Into<String>, key_base64: &str) -> Result<Self> {
        let key = BASE64.decode(key_base64).map_err(|e| {
            AppError::BadRequest(format!("Invalid storage access key: {}", e))
        })?;
        Ok(Self {
            account: account.into(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn hmac(&self, string_to_sign: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// `Authorization` header value for a canonical request string.
    pub fn authorization(&self, string_to_sign: &str) -> String {
        format!("SharedKey {}:{}", self.account, self.hmac(string_to_sign))
    }

    /// Read-only service SAS query string for one blob, valid until `expiry`.
    ///
    /// These are access-convenience tokens, not security tokens; callers
    /// default the validity to years.
    pub fn sas_query(&self, container: &str, blob: &str, expiry: DateTime<Utc>) -> String {
        let se = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let canonical_resource = format!("/blob/{}/{}/{}", self.account, container, blob);

        // Field order fixed by the service SAS spec for this version:
        // sp, st, se, resource, si, sip, spr, sv, sr, snapshot, ses,
        // rscc, rscd, rsce, rscl, rsct.
        let string_to_sign = [
            "r",
            "",
            se.as_str(),
            canonical_resource.as_str(),
            "",
            "",
            "",
            API_VERSION,
            "b",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ]
        .join("\n");

        let signature = self.hmac(&string_to_sign);
        format!(
            "sv={}&sp=r&sr=b&se={}&sig={}",
            API_VERSION,
            encode(&se),
            encode(&signature)
        )
    }
}

/// Canonical request builder for Shared Key authorization.
pub struct RequestSigner<'a> {
    method: &'a str,
    content_length: usize,
    content_type: &'a str,
    if_match: &'a str,
    if_none_match: &'a str,
    /// x-ms-* headers included in the request
    ms_headers: Vec<(String, String)>,
    /// `/{account}/{container}[/{blob}]` plus newline-separated query pairs
    canonical_resource: String,
}

impl<'a> RequestSigner<'a> {
    pub fn new(method: &'a str, canonical_resource: String) -> Self {
        Self {
            method,
            content_length: 0,
            content_type: "",
            if_match: "",
            if_none_match: "",
            ms_headers: Vec::new(),
            canonical_resource,
        }
    }

    pub fn content(mut self, length: usize, content_type: &'a str) -> Self {
        self.content_length = length;
        self.content_type = content_type;
        self
    }

    pub fn conditions(mut self, if_match: &'a str, if_none_match: &'a str) -> Self {
        self.if_match = if_match;
        self.if_none_match = if_none_match;
        self
    }

    pub fn ms_headers(mut self, headers: &[(String, String)]) -> Self {
        self.ms_headers = headers.to_vec();
        self
    }

    /// Canonical string per the 2015+ Shared Key format. The Date slot stays
    /// empty because requests always carry x-ms-date.
    pub fn string_to_sign(&self) -> String {
        let mut headers = self.ms_headers.clone();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k.to_lowercase(), v))
            .collect();

        let content_length = if self.content_length == 0 {
            String::new()
        } else {
            self.content_length.to_string()
        };

        format!(
            "{}\n\n\n{}\n\n{}\n\n\n{}\n{}\n\n\n{}{}",
            self.method.to_uppercase(),
            content_length,
            self.content_type,
            self.if_match,
            self.if_none_match,
            canonical_headers,
            self.canonical_resource
        )
    }

    pub fn authorization(&self, credential: &SharedKeyCredential) -> String {
        credential.authorization(&self.string_to_sign())
    }
}
