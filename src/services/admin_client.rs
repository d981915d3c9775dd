use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::AUTHORIZATION, Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    auth::{canonical_query_string, Credentials, RequestSigner},
    config::Config,
    errors::{AppError, Result},
    models::{Bucket, UsageQuery, UsageReport, User},
};

const MAX_ERROR_BODY: usize = 512;

/// Read-only view of the gateway admin API used by the pollers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn get_usage(&self, query: &UsageQuery) -> Result<UsageReport>;

    async fn list_buckets_with_stat(&self) -> Result<Vec<Bucket>>;

    /// Ids of every user known to the gateway.
    async fn get_users(&self) -> Result<Vec<String>>;

    async fn get_user(&self, uid: &str) -> Result<User>;
}

pub struct RgwAdminClient {
    http: Client,
    base: Url,
    signer: RequestSigner,
}

impl RgwAdminClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_options(
            &config.endpoint,
            Credentials {
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
            },
            &config.signing_region,
            config.connection_timeout(),
            config.insecure,
        )
    }

    pub fn with_options(
        endpoint: &str,
        credentials: Credentials,
        signing_region: &str,
        timeout: Duration,
        insecure: bool,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| AppError::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            http,
            base,
            signer: RequestSigner::new(credentials, signing_region),
        })
    }

    fn admin_url(&self, resource: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("format", "json"));
        all.extend_from_slice(params);

        let raw = format!(
            "{}/admin/{}?{}",
            self.base.as_str().trim_end_matches('/'),
            resource,
            canonical_query_string(&all)
        );

        Url::parse(&raw).map_err(|e| AppError::Config(format!("Invalid admin URL '{}': {}", raw, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = self.admin_url(resource, params)?;
        let signed = self.signer.sign("GET", &url, Utc::now());

        tracing::debug!("GET {}", url.path());

        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::AdminApi {
                status: status.as_u16(),
                path: url.path().to_string(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AdminApi for RgwAdminClient {
    async fn get_usage(&self, query: &UsageQuery) -> Result<UsageReport> {
        let show_summary = if query.show_summary { "true" } else { "false" };
        self.get_json("usage", &[("show-summary", show_summary), ("start", query.start.as_str())])
            .await
    }

    async fn list_buckets_with_stat(&self) -> Result<Vec<Bucket>> {
        self.get_json("bucket", &[("stats", "true")]).await
    }

    async fn get_users(&self) -> Result<Vec<String>> {
        self.get_json("metadata/user", &[]).await
    }

    async fn get_user(&self, uid: &str) -> Result<User> {
        self.get_json("user", &[("uid", uid)]).await
    }
}
