//! Base for entities backed by a [`Coordinator`].
//!
//! Holds the identity every AldesConnect entity shares (config entry, product
//! serial number and reference), and the publish step that hands state to the
//! engine once the entity has been added.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tracing::trace;

use super::ConfigEntry;
use super::Error;
use super::coordinator::Coordinator;
use super::coordinator::ListenerId;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::SensorState;

/// Where entities publish their state.
pub trait StateSink: Send + Sync {
    fn write_state(&self, entity_id: String, state: SensorState);
}

/// Publishes queued by coordinator callbacks, waiting to be sent to the engine.
///
/// Coordinator listeners run synchronously and cannot await a bounded
/// channel, so they write here and the integration flushes with
/// backpressure once the refresh has fanned out.
#[derive(Default)]
pub struct StateBuffer {
    pending: Mutex<Vec<(String, SensorState)>>,
}

impl StateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send every queued state to the engine, oldest first.
    ///
    /// Waits for channel capacity instead of dropping. Returns how many
    /// states were sent.
    pub async fn flush(&self, tx: &FromIntegrationSender) -> Result<usize, Error> {
        let pending = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        let count = pending.len();
        for (entity_id, state) in pending {
            tx.send(FromIntegrationMessage::SensorStateChanged { entity_id, state })
                .await
                .map_err(|_| Error::EngineClosed)?;
        }
        Ok(count)
    }
}

impl StateSink for StateBuffer {
    fn write_state(&self, entity_id: String, state: SensorState) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((entity_id, state));
    }
}

/// Entities that react to coordinator refreshes.
pub trait CoordinatorListener {
    fn handle_coordinator_update(&mut self);
}

/// Shared part of every AldesConnect entity.
pub struct CoordinatorEntity<C: Coordinator> {
    coordinator: Arc<C>,
    config_entry: ConfigEntry,
    product_serial_number: String,
    reference: String,
    sink: Option<Arc<dyn StateSink>>,
}

impl<C: Coordinator> CoordinatorEntity<C> {
    pub fn new(
        coordinator: Arc<C>,
        config_entry: ConfigEntry,
        product_serial_number: String,
        reference: String,
    ) -> Self {
        Self {
            coordinator,
            config_entry,
            product_serial_number,
            reference,
            sink: None,
        }
    }

    pub fn coordinator(&self) -> &Arc<C> {
        &self.coordinator
    }

    pub fn config_entry(&self) -> &ConfigEntry {
        &self.config_entry
    }

    pub fn product_serial_number(&self) -> &str {
        &self.product_serial_number
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Connect the entity to the engine. Until then, `write_state` is a no-op.
    pub fn attach(&mut self, sink: Arc<dyn StateSink>) {
        self.sink = Some(sink);
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Publish `state` for `entity_id`. Returns whether a sink received it.
    pub fn write_state(&self, entity_id: String, state: SensorState) -> bool {
        match &self.sink {
            Some(sink) => {
                sink.write_state(entity_id, state);
                true
            }
            None => {
                trace!("{} not added yet, state not published", entity_id);
                false
            }
        }
    }
}

/// Subscribe `entity` to `coordinator` refreshes.
///
/// The listener only keeps a weak reference: once the integration drops the
/// entity, refreshes skip it.
pub fn subscribe_entity<E, C>(entity: &Arc<Mutex<E>>, coordinator: &C) -> ListenerId
where
    E: CoordinatorListener + Send + 'static,
    C: Coordinator + ?Sized,
{
    let weak = Arc::downgrade(entity);
    coordinator.subscribe(Arc::new(move || {
        let Some(entity) = weak.upgrade() else {
            return;
        };
        let mut entity = entity.lock().unwrap_or_else(PoisonError::into_inner);
        entity.handle_coordinator_update();
    }))
}
