//! Edit session and save orchestration.

use crate::elements::{ElementCoords, ElementKey, ElementKind};
use crate::gateway::{BoxFuture, GatewayResponse, PersistenceGateway};
use crate::update::{BuildingUpdate, ElementUpdate, NpcUpdate, ZoneUpdate};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// The single element being edited, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditingSession {
    current: Option<ElementKey>,
}

impl EditingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit `id`, ending any previous edit. Returns the previous target.
    pub fn start(&mut self, id: ElementKey) -> Option<ElementKey> {
        self.current.replace(id)
    }

    pub fn clear(&mut self) -> Option<ElementKey> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&ElementKey> {
        self.current.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_editing_element(&self, id: &ElementKey) -> bool {
        self.current.as_ref() == Some(id)
    }
}

/// Last successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSaved {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: String,
    pub timestamp_ms: u64,
}

/// Shared in-flight flag. Clones observe the same state, so a renderer can
/// keep one and read it while a save holds the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SaveStatus {
    saving: Arc<AtomicBool>,
}

impl SaveStatus {
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    fn begin(&self) -> SavingGuard<'_> {
        self.saving.store(true, Ordering::Release);
        SavingGuard { status: self }
    }
}

/// Clears the flag when the request completes or is dropped.
struct SavingGuard<'a> {
    status: &'a SaveStatus,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.status.saving.store(false, Ordering::Release);
    }
}

/// Routes committed edits to the persistence gateway and tracks their outcome.
pub struct EditingOrchestrator<G: PersistenceGateway> {
    gateway: Arc<G>,
    session: EditingSession,
    status: SaveStatus,
    save_error: Option<String>,
    last_saved: Option<LastSaved>,
}

impl<G: PersistenceGateway> EditingOrchestrator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            session: EditingSession::new(),
            status: SaveStatus::default(),
            save_error: None,
            last_saved: None,
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn session(&self) -> &EditingSession {
        &self.session
    }

    pub fn is_saving(&self) -> bool {
        self.status.is_saving()
    }

    /// Handle that reports saves in flight.
    pub fn save_status(&self) -> SaveStatus {
        self.status.clone()
    }

    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    pub fn last_saved(&self) -> Option<&LastSaved> {
        self.last_saved.as_ref()
    }

    /// Make `id` the edit target. A previous target is dropped silently.
    pub fn start_editing(&mut self, kind: ElementKind, id: impl Into<String>) {
        let key = ElementKey::new(kind, id);
        log::debug!("Editing {}", key);
        self.session.start(key);
        self.save_error = None;
    }

    pub fn cancel_editing(&mut self) {
        if let Some(key) = self.session.clear() {
            log::debug!("Stopped editing {}", key);
        }
        self.save_error = None;
    }

    /// End the edit of `id` if it is the current target.
    pub fn forget(&mut self, id: &ElementKey) {
        if self.session.is_editing_element(id) {
            self.session.clear();
        }
    }

    pub async fn save_building(&mut self, id: &str, update: BuildingUpdate) -> bool {
        self.save(id, ElementUpdate::Building(update)).await
    }

    pub async fn save_zone(&mut self, id: &str, update: ZoneUpdate) -> bool {
        self.save(id, ElementUpdate::Zone(update)).await
    }

    pub async fn save_npc(&mut self, id: &str, update: NpcUpdate) -> bool {
        self.save(id, ElementUpdate::Npc(update)).await
    }

    /// Send `update` for element `id`. Returns whether the service accepted it.
    pub async fn save(&mut self, id: &str, update: ElementUpdate) -> bool {
        if update.is_empty() {
            log::debug!("Nothing to save for {} {}", update.kind(), id);
            return false;
        }
        let gateway = Arc::clone(&self.gateway);
        self.track(update.kind(), id, gateway.update(id, &update)).await
    }

    pub async fn save_element_name(&mut self, kind: ElementKind, id: &str, name: &str) -> bool {
        let gateway = Arc::clone(&self.gateway);
        self.track(kind, id, gateway.update_name(kind, id, name)).await
    }

    pub async fn save_element_coords(&mut self, id: &str, coords: ElementCoords) -> bool {
        let kind = coords.kind();
        let gateway = Arc::clone(&self.gateway);
        let request = match coords {
            ElementCoords::Area(area) => gateway.update_building_coords(id, area),
            ElementCoords::Polygon(polygon) => gateway.update_pueblo_polygon(id, polygon),
            ElementCoords::Point(position) => gateway.update_npc_coords(id, position),
        };
        self.track(kind, id, request).await
    }

    async fn track(
        &mut self,
        kind: ElementKind,
        id: &str,
        request: BoxFuture<'_, GatewayResponse>,
    ) -> bool {
        self.save_error = None;
        let response = {
            let _saving = self.status.begin();
            request.await
        };

        if response.success {
            log::info!("Saved {} {}", kind, id);
            self.last_saved = Some(LastSaved {
                kind,
                id: id.to_string(),
                timestamp_ms: now_ms(),
            });
            true
        } else {
            let message = response.error_message();
            log::warn!("Failed to save {} {}: {}", kind, id, message);
            self.save_error = Some(message);
            false
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::tests::sample_snapshot;
    use crate::gateway::MemoryGateway;
    use crate::gateway::testing::block_on;
    use crate::transform::{WorldBounds, WorldPoint};
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    /// Completes on the second poll.
    #[derive(Default)]
    struct YieldOnce {
        yielded: bool,
    }

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.yielded {
                Poll::Ready(())
            } else {
                self.yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    /// Accepts every write after one round trip.
    struct SlowGateway;

    impl SlowGateway {
        fn respond(&self) -> BoxFuture<'_, GatewayResponse> {
            Box::pin(async {
                YieldOnce::default().await;
                GatewayResponse::ok(None)
            })
        }
    }

    impl PersistenceGateway for SlowGateway {
        fn update_building(&self, _: &str, _: &BuildingUpdate) -> BoxFuture<'_, GatewayResponse> {
            self.respond()
        }

        fn update_pueblo(&self, _: &str, _: &ZoneUpdate) -> BoxFuture<'_, GatewayResponse> {
            self.respond()
        }

        fn update_npc(&self, _: &str, _: &NpcUpdate) -> BoxFuture<'_, GatewayResponse> {
            self.respond()
        }
    }

    fn orchestrator() -> EditingOrchestrator<MemoryGateway> {
        EditingOrchestrator::new(Arc::new(MemoryGateway::with_snapshot(sample_snapshot())))
    }

    #[test]
    fn test_single_edit_slot() {
        let mut session = EditingSession::new();
        assert_eq!(session.start(ElementKey::building("1")), None);
        assert_eq!(
            session.start(ElementKey::npc("2")),
            Some(ElementKey::building("1"))
        );
        assert!(session.is_editing_element(&ElementKey::npc("2")));
        assert!(!session.is_editing_element(&ElementKey::building("1")));
    }

    #[test]
    fn test_start_editing_overwrites_and_clears_error() {
        let mut editing = orchestrator();
        editing.gateway().fail_with("offline");
        editing.start_editing(ElementKind::Building, "b1");
        assert!(!block_on(editing.save_element_name(ElementKind::Building, "b1", "Inn")));
        assert_eq!(editing.save_error(), Some("offline"));

        editing.start_editing(ElementKind::Npc, "n1");
        assert_eq!(editing.session().current(), Some(&ElementKey::npc("n1")));
        assert_eq!(editing.save_error(), None);
    }

    #[test]
    fn test_save_success_records_last_saved() {
        let mut editing = orchestrator();
        let saved = block_on(editing.save_building(
            "b2",
            BuildingUpdate {
                name: Some("Smithy".to_string()),
                ..Default::default()
            },
        ));
        assert!(saved);
        assert!(!editing.is_saving());
        assert_eq!(editing.save_error(), None);

        let last = editing.last_saved().unwrap();
        assert_eq!(last.kind, ElementKind::Building);
        assert_eq!(last.id, "b2");
        assert!(last.timestamp_ms > 0);
    }

    #[test]
    fn test_is_saving_visible_while_request_pending() {
        let mut editing = EditingOrchestrator::new(Arc::new(SlowGateway));
        let status = editing.save_status();
        let mut cx = Context::from_waker(Waker::noop());

        {
            let mut save = pin!(editing.save_element_name(ElementKind::Building, "b1", "Inn"));
            assert!(save.as_mut().poll(&mut cx).is_pending());
            assert!(status.is_saving());
            assert_eq!(save.as_mut().poll(&mut cx), Poll::Ready(true));
            assert!(!status.is_saving());
        }

        assert!(!editing.is_saving());
        assert_eq!(editing.last_saved().map(|s| s.id.as_str()), Some("b1"));
    }

    #[test]
    fn test_dropped_save_clears_flag() {
        let mut editing = EditingOrchestrator::new(Arc::new(SlowGateway));
        let status = editing.save_status();
        let mut cx = Context::from_waker(Waker::noop());

        {
            let mut save = pin!(editing.save_element_name(ElementKind::Npc, "n1", "Cook"));
            assert!(save.as_mut().poll(&mut cx).is_pending());
            assert!(status.is_saving());
        }

        assert!(!status.is_saving());
        assert_eq!(editing.last_saved(), None);
    }

    #[test]
    fn test_save_failure_keeps_error() {
        let mut editing = orchestrator();
        let saved = block_on(editing.save_npc(
            "ghost",
            NpcUpdate {
                name: Some("Nobody".to_string()),
                ..Default::default()
            },
        ));
        assert!(!saved);
        assert!(!editing.is_saving());
        assert_eq!(editing.save_error(), Some("npc ghost not found"));
        assert_eq!(editing.last_saved(), None);
    }

    #[test]
    fn test_save_coords_uses_matching_endpoint() {
        let mut editing = orchestrator();
        assert!(block_on(editing.save_element_coords(
            "z1",
            ElementCoords::Polygon(vec![
                WorldPoint::new(0.0, 0.0),
                WorldPoint::new(10.0, 0.0),
                WorldPoint::new(10.0, 10.0),
            ]),
        )));
        assert!(block_on(editing.save_element_coords(
            "b1",
            ElementCoords::Area(WorldBounds::from_xz(0.0, 0.0, 4.0, 4.0)),
        )));

        let calls = editing.gateway().calls();
        assert_eq!(calls[0].kind, ElementKind::Zone);
        assert!(calls[0].body.get("polygon").is_some());
        assert_eq!(calls[1].kind, ElementKind::Building);
        assert!(calls[1].body.get("area").is_some());
    }

    #[test]
    fn test_empty_update_not_sent() {
        let mut editing = orchestrator();
        assert!(!block_on(editing.save_zone("z1", ZoneUpdate::default())));
        assert!(editing.gateway().calls().is_empty());
    }

    #[test]
    fn test_cancel_editing() {
        let mut editing = orchestrator();
        editing.start_editing(ElementKind::Zone, "z1");
        editing.cancel_editing();
        assert!(!editing.session().is_editing());
        assert!(editing.gateway().calls().is_empty());
    }
}
