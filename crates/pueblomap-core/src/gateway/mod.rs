//! Persistence service abstraction.
//!
//! The editor talks to the map backend through two traits:
//! [`PersistenceGateway`] writes partial updates and [`ElementSource`]
//! reads the current element records.

mod http;
mod memory;

pub use http::HttpGateway;
pub use memory::{MemoryGateway, RecordedCall};

use crate::elements::{Building, ElementKind, ElementSnapshot, Npc, Zone};
use crate::transform::{WorldBounds, WorldPoint};
use crate::update::{BuildingUpdate, ElementUpdate, NpcUpdate, ZoneUpdate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Transport-level gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors reading element records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Unexpected {resource} payload: {message}")]
    Format { resource: String, message: String },
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Result type for element reads.
pub type SourceResult<T> = Result<T, SourceError>;

/// Boxed future for gateway operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Outcome of a write as reported by the persistence service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayResponse {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// The error message, with a generic fallback when the service gave none.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Writes partial element updates.
///
/// Implementations never fail at the Rust level: transport problems are
/// reported as an unsuccessful [`GatewayResponse`].
pub trait PersistenceGateway: Send + Sync {
    fn update_building(&self, id: &str, update: &BuildingUpdate) -> BoxFuture<'_, GatewayResponse>;

    /// Zones are called "pueblos" by the service.
    fn update_pueblo(&self, id: &str, update: &ZoneUpdate) -> BoxFuture<'_, GatewayResponse>;

    fn update_npc(&self, id: &str, update: &NpcUpdate) -> BoxFuture<'_, GatewayResponse>;

    fn update_building_coords(&self, id: &str, area: WorldBounds) -> BoxFuture<'_, GatewayResponse> {
        self.update_building(
            id,
            &BuildingUpdate {
                area: Some(area),
                ..Default::default()
            },
        )
    }

    fn update_pueblo_polygon(
        &self,
        id: &str,
        polygon: Vec<WorldPoint>,
    ) -> BoxFuture<'_, GatewayResponse> {
        self.update_pueblo(
            id,
            &ZoneUpdate {
                polygon: Some(polygon),
                ..Default::default()
            },
        )
    }

    fn update_npc_coords(&self, id: &str, position: WorldPoint) -> BoxFuture<'_, GatewayResponse> {
        self.update_npc(
            id,
            &NpcUpdate {
                position: Some(position),
                ..Default::default()
            },
        )
    }

    fn update_name(&self, kind: ElementKind, id: &str, name: &str) -> BoxFuture<'_, GatewayResponse> {
        self.update(id, &ElementUpdate::name(kind, name))
    }

    /// Dispatch on the update's kind.
    fn update(&self, id: &str, update: &ElementUpdate) -> BoxFuture<'_, GatewayResponse> {
        match update {
            ElementUpdate::Building(u) => self.update_building(id, u),
            ElementUpdate::Zone(u) => self.update_pueblo(id, u),
            ElementUpdate::Npc(u) => self.update_npc(id, u),
        }
    }
}

/// Reads the element records the editor displays.
pub trait ElementSource: Send + Sync {
    fn fetch_buildings(&self) -> BoxFuture<'_, SourceResult<Vec<Building>>>;

    fn fetch_zones(&self) -> BoxFuture<'_, SourceResult<Vec<Zone>>>;

    fn fetch_npcs(&self) -> BoxFuture<'_, SourceResult<Vec<Npc>>>;

    /// All three collections.
    fn fetch_snapshot(&self) -> BoxFuture<'_, SourceResult<ElementSnapshot>> {
        Box::pin(async move {
            let buildings = self.fetch_buildings().await?;
            let zones = self.fetch_zones().await?;
            let npcs = self.fetch_npcs().await?;
            Ok(ElementSnapshot {
                buildings,
                zones,
                npcs,
            })
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    /// Simple blocking executor for tests.
    pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(result) => return result,
                Poll::Pending => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_parsing() {
        let ok: GatewayResponse =
            serde_json::from_value(json!({ "success": true, "data": { "id": "1" } })).unwrap();
        assert!(ok.success);
        assert_eq!(ok.error, None);

        let failed: GatewayResponse =
            serde_json::from_value(json!({ "success": false, "error": "locked" })).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error_message(), "locked");
    }

    #[test]
    fn test_failure_without_message() {
        let response = GatewayResponse {
            success: false,
            ..Default::default()
        };
        assert_eq!(response.error_message(), "Unknown error");
    }
}
