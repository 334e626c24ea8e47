//! Active document context and the switch operation.

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::actor::fs::WatchHandle;
use crate::actor::sse::SubscriberRegistry;
use crate::config::{State, StateStore};
use crate::core::DocumentRef;
use crate::reload::message::ChangeEvent;
use crate::render::Renderer;

use super::Workspace;

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("unknown document `{0}`")]
    NotFound(String),
}

/// Everything request handlers and the event server share.
///
/// Exactly one document is active. It is replaced only by
/// [`AppContext::switch`]; readers load it without locking.
pub struct AppContext {
    workspace: Workspace,
    state: StateStore,
    active: ArcSwap<DocumentRef>,
    switch_lock: Mutex<()>,
    watcher: WatchHandle,
    registry: Arc<SubscriberRegistry>,
    renderer: Renderer,
}

impl AppContext {
    pub fn new(
        workspace: Workspace,
        state: StateStore,
        active: DocumentRef,
        watcher: WatchHandle,
        registry: Arc<SubscriberRegistry>,
        renderer: Renderer,
    ) -> Self {
        Self {
            workspace,
            state,
            active: ArcSwap::from_pointee(active),
            switch_lock: Mutex::new(()),
            watcher,
            registry,
            renderer,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn state(&self) -> State {
        self.state.snapshot()
    }

    pub fn active(&self) -> Arc<DocumentRef> {
        self.active.load_full()
    }

    pub fn watcher(&self) -> &WatchHandle {
        &self.watcher
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Documents shown in listings.
    pub fn visible_documents(&self) -> Vec<DocumentRef> {
        self.workspace.visible_documents(&self.state.snapshot())
    }

    /// Make `key` the active document.
    ///
    /// An unknown key changes nothing. Otherwise the context is updated,
    /// `lastDocument` is persisted, the watcher is rebuilt for the new tree
    /// and one `switch` event is broadcast.
    pub async fn switch(&self, key: &str) -> Result<Arc<DocumentRef>, SwitchError> {
        let _guard = self.switch_lock.lock().await;

        let document = self
            .workspace
            .find(&self.state.snapshot(), key)
            .ok_or_else(|| SwitchError::NotFound(key.trim().to_string()))?;
        let document = Arc::new(document);

        self.active.store(Arc::clone(&document));

        let last = document.id.key();
        if let Err(e) = self.state.update(|state| state.last_document = Some(last)) {
            crate::log!("warning"; "failed to save state: {:#}", anyhow::Error::from(e));
        }

        if self.watcher.is_enabled() && !self.watcher.watch((*document).clone()).await {
            crate::log!("watch"; "live reload paused for {}", document.id);
        }

        crate::log!("serve"; "switched to {}", document.id);
        self.registry.broadcast(&ChangeEvent::switch(document.name()));
        Ok(document)
    }
}
