//! HTTP side of the device, the cloud catalog and the storefront.

use std::future::Future;

use anyhow::{Context, anyhow, bail};
use pedalboard_core::catalog::{CloudPlugin, FeaturedPlugin, LocalPlugin, StoreProduct};
use pedalboard_core::types::PluginMetadata;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::ClientConfig;

/// Device lookups the router needs while applying commands.
pub trait DeviceApi: Send + Sync + 'static {
    fn plugin_metadata(
        &self,
        uri: &str,
        version: &str,
    ) -> impl Future<Output = anyhow::Result<PluginMetadata>> + Send;

    fn snapshot_name(&self, id: i32) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// The four lists the catalog is built from.
pub trait CatalogSource: Send + Sync + 'static {
    fn installed(&self) -> impl Future<Output = anyhow::Result<Vec<LocalPlugin>>> + Send;
    fn cloud(&self) -> impl Future<Output = anyhow::Result<Vec<CloudPlugin>>> + Send;
    fn featured(&self) -> impl Future<Output = anyhow::Result<Vec<FeaturedPlugin>>> + Send;
    fn storefront(&self) -> impl Future<Output = anyhow::Result<Vec<StoreProduct>>> + Send;
}

#[derive(Debug, Deserialize)]
struct SnapshotNameResponse {
    ok: bool,
    #[serde(default)]
    name: String,
}

/// reqwest-backed client for the device REST endpoints and the remote
/// catalogs.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    device: Url,
    cloud: Option<Url>,
    store: Option<Url>,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        let parse = |url: &str| Url::parse(url).with_context(|| format!("invalid URL '{}'", url));

        Ok(Self {
            client,
            device: parse(&config.device_url)?,
            cloud: config
                .cloud_url
                .as_deref()
                .map(|url| parse(&as_base(url)))
                .transpose()?,
            store: config
                .store_url
                .as_deref()
                .map(|url| parse(&as_base(url)))
                .transpose()?,
        })
    }

    pub fn device_url(&self) -> &Url {
        &self.device
    }

    fn device_endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.device
            .join(path)
            .with_context(|| format!("invalid device path '{}'", path))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()?;
        response
            .json()
            .await
            .with_context(|| format!("invalid JSON from {}", url))
    }

    async fn device_get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        let mut url = self.device_endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        expect_ok(path, self.get_json(url).await?)
    }

    async fn device_post(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> anyhow::Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?
            .error_for_status()?;
        let value = response
            .json()
            .await
            .with_context(|| format!("invalid JSON from {}", path))?;
        expect_ok(path, value)
    }

    fn remote(&self, base: Option<&Url>, what: &str, path: &str) -> anyhow::Result<Url> {
        let base = base.ok_or_else(|| anyhow!("{} is not configured", what))?;
        base.join(path)
            .with_context(|| format!("invalid {} path '{}'", what, path))
    }

    pub async fn add_plugin(
        &self,
        instance: &str,
        uri: &str,
        x: f64,
        y: f64,
    ) -> anyhow::Result<Value> {
        self.device_get(
            &format!("/effect/add/{}", trim_id(instance)),
            &[
                ("uri", uri.to_string()),
                ("x", x.to_string()),
                ("y", y.to_string()),
            ],
        )
        .await
    }

    pub async fn remove_plugin(&self, instance: &str) -> anyhow::Result<()> {
        self.device_get(&format!("/effect/remove/{}", trim_id(instance)), &[])
            .await
            .map(drop)
    }

    pub async fn set_parameter(
        &self,
        instance: &str,
        symbol: &str,
        value: f64,
    ) -> anyhow::Result<()> {
        let path = format!("/effect/parameter/set/{},{}", trim_id(instance), symbol);
        let request = self
            .client
            .post(self.device_endpoint(&path)?)
            .body(value.to_string());
        self.device_post(&path, request).await.map(drop)
    }

    pub async fn set_bypass(&self, instance: &str, bypassed: bool) -> anyhow::Result<()> {
        let path = format!(
            "/effect/bypass/{},{}",
            trim_id(instance),
            u8::from(bypassed)
        );
        self.device_get(&path, &[]).await.map(drop)
    }

    pub async fn connect(&self, source: &str, target: &str) -> anyhow::Result<()> {
        let path = format!("/effect/connect/{},{}", trim_id(source), trim_id(target));
        self.device_get(&path, &[]).await.map(drop)
    }

    pub async fn disconnect(&self, source: &str, target: &str) -> anyhow::Result<()> {
        let path = format!("/effect/disconnect/{},{}", trim_id(source), trim_id(target));
        self.device_get(&path, &[]).await.map(drop)
    }

    /// Add several plugins in one request.
    pub async fn add_bulk(&self, uris: &[String]) -> anyhow::Result<Value> {
        let path = "/effect/bulk/";
        let request = self.client.post(self.device_endpoint(path)?).json(uris);
        self.device_post(path, request).await
    }

    pub async fn set_position(&self, instance: &str, x: f64, y: f64) -> anyhow::Result<()> {
        self.device_get(
            &format!("/effect/position/{}", trim_id(instance)),
            &[("x", x.to_string()), ("y", y.to_string())],
        )
        .await
        .map(drop)
    }

    pub async fn set_pedalboard_size(&self, width: i32, height: i32) -> anyhow::Result<()> {
        self.device_get(
            "/pedalboard/size",
            &[("width", width.to_string()), ("height", height.to_string())],
        )
        .await
        .map(drop)
    }

    pub async fn save_pedalboard(&self, title: &str, as_new: bool) -> anyhow::Result<Value> {
        let path = "/pedalboard/save";
        let request = self.client.post(self.device_endpoint(path)?).form(&[
            ("title", title.to_string()),
            ("asNew", u8::from(as_new).to_string()),
        ]);
        self.device_post(path, request).await
    }

    pub async fn load_pedalboard(&self, id: &str) -> anyhow::Result<()> {
        self.device_get(&format!("/pedalboard/load/{}", id), &[])
            .await
            .map(drop)
    }

    pub async fn list_pedalboards(&self) -> anyhow::Result<Value> {
        self.device_get("/pedalboard/list", &[]).await
    }

    pub async fn search_pedalboards(&self, term: &str) -> anyhow::Result<Value> {
        self.device_get("/pedalboard/search/", &[("term", term.to_string())])
            .await
    }

    pub async fn remove_pedalboard(&self, id: &str) -> anyhow::Result<()> {
        self.device_get(&format!("/pedalboard/remove/{}", id), &[])
            .await
            .map(drop)
    }

    pub async fn get_pedalboard(&self, id: &str) -> anyhow::Result<Value> {
        self.device_get(&format!("/pedalboard/get/{}", id), &[]).await
    }

    pub async fn banks(&self) -> anyhow::Result<Value> {
        self.device_get("/banks", &[]).await
    }

    pub async fn save_banks(&self, banks: &Value) -> anyhow::Result<()> {
        let path = "/banks/save";
        let request = self.client.post(self.device_endpoint(path)?).json(banks);
        self.device_post(path, request).await.map(drop)
    }
}

impl DeviceApi for HttpApi {
    async fn plugin_metadata(&self, uri: &str, version: &str) -> anyhow::Result<PluginMetadata> {
        let mut url = self.device_endpoint("/effect/get")?;
        url.query_pairs_mut()
            .append_pair("uri", uri)
            .append_pair("version", version);
        self.get_json(url)
            .await
            .with_context(|| format!("failed to fetch metadata for {}", uri))
    }

    async fn snapshot_name(&self, id: i32) -> anyhow::Result<String> {
        let mut url = self.device_endpoint("/snapshot/name")?;
        url.query_pairs_mut().append_pair("id", &id.to_string());
        let response: SnapshotNameResponse = self.get_json(url).await?;
        if !response.ok {
            bail!("device has no snapshot {}", id);
        }
        Ok(response.name)
    }
}

impl CatalogSource for HttpApi {
    async fn installed(&self) -> anyhow::Result<Vec<LocalPlugin>> {
        self.get_json(self.device_endpoint("/effect/list")?).await
    }

    async fn cloud(&self) -> anyhow::Result<Vec<CloudPlugin>> {
        let url = self.remote(self.cloud.as_ref(), "cloud catalog", "lv2/plugins")?;
        self.get_json(url).await
    }

    async fn featured(&self) -> anyhow::Result<Vec<FeaturedPlugin>> {
        let url = self.remote(self.cloud.as_ref(), "cloud catalog", "lv2/plugins/featured")?;
        self.get_json(url).await
    }

    async fn storefront(&self) -> anyhow::Result<Vec<StoreProduct>> {
        let url = self.remote(self.store.as_ref(), "storefront", "products")?;
        self.get_json(url).await
    }
}

/// Endpoints answer `false` when the device refused the operation.
fn expect_ok(path: &str, value: Value) -> anyhow::Result<Value> {
    match value {
        Value::Bool(false) => Err(anyhow!("device rejected {}", path)),
        Value::Object(ref map) if map.get("ok") == Some(&Value::Bool(false)) => {
            Err(anyhow!("device rejected {}", path))
        }
        other => Ok(other),
    }
}

/// Remote bases are joined with relative paths, so keep their last segment.
fn as_base(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Instance and port ids start with `/`; the endpoints expect them without.
fn trim_id(id: &str) -> &str {
    id.trim_start_matches('/')
}
