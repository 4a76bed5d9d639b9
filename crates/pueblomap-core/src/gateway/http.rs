//! REST gateway backed by `reqwest`.

use super::{
    BoxFuture, ElementSource, GatewayError, GatewayResponse, PersistenceGateway, SourceError,
    SourceResult,
};
use crate::elements::{Building, Npc, Zone};
use crate::update::{BuildingUpdate, NpcUpdate, ZoneUpdate};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Talks to the map service over HTTP.
///
/// Writes go to `PUT {base}/{resource}/{id}`, reads to `GET {base}/{collection}`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url =
            Url::parse(base_url).map_err(|e| GatewayError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn put(&self, resource: &str, id: &str, body: Value) -> Result<GatewayResponse, GatewayError> {
        let url = self.endpoint(&[resource, id])?;
        log::debug!("PUT {}", url);
        let response = self.client.put(url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(GatewayResponse::ok(None));
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, resource: &'static str, id: &str, body: Value) -> BoxFuture<'_, GatewayResponse> {
        let id = id.to_string();
        Box::pin(async move {
            match self.put(resource, &id, body).await {
                Ok(response) => {
                    if !response.success {
                        log::warn!("{} {} rejected: {}", resource, id, response.error_message());
                    }
                    response
                }
                Err(e) => {
                    log::warn!("{} {} update failed: {}", resource, id, e);
                    GatewayResponse::failure(e.to_string())
                }
            }
        })
    }

    /// Fetch a collection. Accepts a bare array or an envelope with a `data` array.
    async fn get<T: DeserializeOwned>(&self, collection: &str) -> SourceResult<Vec<T>> {
        let url = self.endpoint(&[collection])?;
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(GatewayError::from)?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let format_error = |message: String| SourceError::Format {
            resource: collection.to_string(),
            message,
        };
        let value: Value = serde_json::from_str(&text).map_err(GatewayError::from)?;
        let items = match value {
            Value::Array(_) => value,
            Value::Object(mut envelope) => match envelope.remove("data") {
                Some(data @ Value::Array(_)) => data,
                _ => return Err(format_error("expected a `data` array".to_string())),
            },
            _ => return Err(format_error("expected an array".to_string())),
        };
        serde_json::from_value(items).map_err(|e| format_error(e.to_string()))
    }
}

impl PersistenceGateway for HttpGateway {
    fn update_building(&self, id: &str, update: &BuildingUpdate) -> BoxFuture<'_, GatewayResponse> {
        self.write("building", id, serde_json::to_value(update).unwrap_or_default())
    }

    fn update_pueblo(&self, id: &str, update: &ZoneUpdate) -> BoxFuture<'_, GatewayResponse> {
        self.write("pueblo", id, serde_json::to_value(update).unwrap_or_default())
    }

    fn update_npc(&self, id: &str, update: &NpcUpdate) -> BoxFuture<'_, GatewayResponse> {
        self.write("npc", id, serde_json::to_value(update).unwrap_or_default())
    }
}

impl ElementSource for HttpGateway {
    fn fetch_buildings(&self) -> BoxFuture<'_, SourceResult<Vec<Building>>> {
        Box::pin(self.get("buildings"))
    }

    fn fetch_zones(&self) -> BoxFuture<'_, SourceResult<Vec<Zone>>> {
        Box::pin(self.get("pueblos"))
    }

    fn fetch_npcs(&self) -> BoxFuture<'_, SourceResult<Vec<Npc>>> {
        Box::pin(self.get("npcs"))
    }
}
