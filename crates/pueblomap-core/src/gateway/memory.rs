//! In-memory gateway for tests and offline sessions.

use super::{BoxFuture, ElementSource, GatewayResponse, PersistenceGateway, SourceError, SourceResult};
use crate::elements::{Building, ElementKind, ElementSnapshot, MapDocument, Npc, Zone};
use crate::update::{BuildingUpdate, ElementUpdate, NpcUpdate, ZoneUpdate};
use serde_json::Value;
use std::sync::{Mutex, RwLock};

/// A write received by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub kind: ElementKind,
    pub id: String,
    pub body: Value,
}

/// Keeps elements in memory and applies updates to them.
#[derive(Default)]
pub struct MemoryGateway {
    document: RwLock<MapDocument>,
    calls: Mutex<Vec<RecordedCall>>,
    failure: RwLock<Option<String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: ElementSnapshot) -> Self {
        Self {
            document: RwLock::new(MapDocument::from_snapshot(snapshot)),
            ..Self::default()
        }
    }

    /// Make every following write fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(message.into());
        }
    }

    /// Undo [`fail_with`](Self::fail_with).
    pub fn succeed(&self) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = None;
        }
    }

    /// Writes received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Current element records.
    pub fn snapshot(&self) -> ElementSnapshot {
        self.document
            .read()
            .map(|doc| doc.to_snapshot())
            .unwrap_or_default()
    }

    fn write(&self, id: &str, update: ElementUpdate) -> BoxFuture<'_, GatewayResponse> {
        let id = id.to_string();
        Box::pin(async move {
            let body = update.to_json();
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(RecordedCall {
                    kind: update.kind(),
                    id: id.clone(),
                    body: body.clone(),
                });
            }

            if let Some(message) = self.failure.read().ok().and_then(|f| f.clone()) {
                return GatewayResponse::failure(message);
            }

            let mut doc = match self.document.write() {
                Ok(doc) => doc,
                Err(e) => return GatewayResponse::failure(format!("Lock error: {}", e)),
            };
            if doc.apply_update(&id, &update) {
                GatewayResponse::ok(Some(body))
            } else {
                GatewayResponse::failure(format!("{} {} not found", update.kind().resource(), id))
            }
        })
    }

    fn read<T>(&self, pick: impl FnOnce(ElementSnapshot) -> Vec<T> + 'static) -> BoxFuture<'_, SourceResult<Vec<T>>>
    where
        T: 'static,
    {
        Box::pin(async move {
            let doc = self
                .document
                .read()
                .map_err(|e| SourceError::Unavailable(format!("Lock error: {}", e)))?;
            Ok(pick(doc.to_snapshot()))
        })
    }
}

impl PersistenceGateway for MemoryGateway {
    fn update_building(&self, id: &str, update: &BuildingUpdate) -> BoxFuture<'_, GatewayResponse> {
        self.write(id, ElementUpdate::Building(update.clone()))
    }

    fn update_pueblo(&self, id: &str, update: &ZoneUpdate) -> BoxFuture<'_, GatewayResponse> {
        self.write(id, ElementUpdate::Zone(update.clone()))
    }

    fn update_npc(&self, id: &str, update: &NpcUpdate) -> BoxFuture<'_, GatewayResponse> {
        self.write(id, ElementUpdate::Npc(update.clone()))
    }
}

impl ElementSource for MemoryGateway {
    fn fetch_buildings(&self) -> BoxFuture<'_, SourceResult<Vec<Building>>> {
        self.read(|s| s.buildings)
    }

    fn fetch_zones(&self) -> BoxFuture<'_, SourceResult<Vec<Zone>>> {
        self.read(|s| s.zones)
    }

    fn fetch_npcs(&self) -> BoxFuture<'_, SourceResult<Vec<Npc>>> {
        self.read(|s| s.npcs)
    }
}
