use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::algorithms::AlgorithmId;
use crate::context::{ContextState, StreamingContext};
use crate::engine::DigestEngine;
use crate::error::*;
use crate::key::{KeyHandle, KeyStore, MemoryKeyStore};
use crate::provider::{Provider, SoftwareProvider};

/// Opaque reference to a context owned by a [`ContextRegistry`].
///
/// Handles carry the generation of their slot, so a handle to a retired context is never
/// confused with a newer context occupying the same slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle {
    index: u32,
    generation: u32,
}

impl ContextHandle {
    /// Pack the handle into a single integer, for callers across a runtime boundary.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Self {
        ContextHandle {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

type SharedContext = Arc<Mutex<StreamingContext>>;

#[derive(Default)]
struct Slot {
    generation: u32,
    context: Option<SharedContext>,
}

#[derive(Default)]
struct Slots {
    entries: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Slots {
    /// Store a context in a slot reserved by the caller.
    fn insert(&mut self, context: SharedContext) -> ContextHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.entries.push(Slot::default());
                (self.entries.len() - 1) as u32
            }
        };
        let slot = &mut self.entries[index as usize];
        slot.context = Some(context);
        ContextHandle {
            index,
            generation: slot.generation,
        }
    }

    fn lookup(
        &self,
        handle: ContextHandle,
        operation: &'static str,
    ) -> Result<&SharedContext, Error> {
        let slot = match self.entries.get(handle.index as usize) {
            Some(slot) => slot,
            None => bail!(DigestError::InvalidContextHandle),
        };
        if handle.generation < slot.generation {
            bail!(DigestError::ContextFinalized(operation));
        }
        match slot.context.as_ref() {
            Some(context) if handle.generation == slot.generation => Ok(context),
            _ => bail!(DigestError::InvalidContextHandle),
        }
    }

    fn get(
        &self,
        handle: ContextHandle,
        operation: &'static str,
    ) -> Result<SharedContext, Error> {
        self.lookup(handle, operation).map(Arc::clone)
    }

    fn remove(
        &mut self,
        handle: ContextHandle,
        operation: &'static str,
    ) -> Result<SharedContext, Error> {
        self.lookup(handle, operation)?;
        self.vacate(handle.index)
            .ok_or_else(|| DigestError::InvalidContextHandle.into())
    }

    /// Vacate the slot if it still holds `context`. A no-op if the handle was retired meanwhile.
    fn retire(&mut self, handle: ContextHandle, context: &SharedContext) {
        let current = matches!(
            self.lookup(handle, "update"),
            Ok(held) if Arc::ptr_eq(held, context)
        );
        if current {
            self.vacate(handle.index);
        }
    }

    fn vacate(&mut self, index: u32) -> Option<SharedContext> {
        let slot = &mut self.entries[index as usize];
        let context = slot.context.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(context)
    }
}

/// Arena of live contexts, addressed through opaque handles.
///
/// This is the surface a managed-runtime binding uses: it never hands out references to
/// contexts, only [`ContextHandle`]s, and it never keeps references to caller buffers.
///
/// The arena lock only guards handle bookkeeping. Each context has its own lock, so hashing
/// through one handle never blocks operations on another.
pub struct ContextRegistry<P: Provider = SoftwareProvider, S: KeyStore = MemoryKeyStore> {
    engine: DigestEngine<P>,
    key_store: S,
    slots: Mutex<Slots>,
}

impl ContextRegistry<SoftwareProvider, MemoryKeyStore> {
    pub fn new() -> Self {
        Self::with_engine(DigestEngine::new(), MemoryKeyStore::new())
    }
}

impl Default for ContextRegistry<SoftwareProvider, MemoryKeyStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Provider, S: KeyStore> ContextRegistry<P, S> {
    pub fn with_engine(engine: DigestEngine<P>, key_store: S) -> Self {
        ContextRegistry {
            engine,
            key_store,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn engine(&self) -> &DigestEngine<P> {
        &self.engine
    }

    pub fn key_store(&self) -> &S {
        &self.key_store
    }

    /// Number of contexts that have been opened and not yet finalized or discarded.
    pub fn live_contexts(&self) -> usize {
        self.slots.lock().live
    }

    fn admit(
        &self,
        create: impl FnOnce() -> Result<StreamingContext, Error>,
    ) -> Result<ContextHandle, Error> {
        let max = self.engine.options().max_live_contexts;
        {
            let mut slots = self.slots.lock();
            ensure!(
                slots.live < max,
                DigestError::EngineInitFailure(format!("{} contexts already open", max))
            );
            slots.live += 1;
        }
        let context = match create() {
            Ok(context) => context,
            Err(e) => {
                self.slots.lock().live -= 1;
                return Err(e);
            }
        };
        let mut slots = self.slots.lock();
        let handle = slots.insert(Arc::new(Mutex::new(context)));
        debug!(handle = handle.to_raw(), live = slots.live, "context registered");
        Ok(handle)
    }

    pub fn open_digest(&self, algorithm: AlgorithmId) -> Result<ContextHandle, Error> {
        self.admit(|| self.engine.create_digest(algorithm))
    }

    pub fn open_hmac(
        &self,
        algorithm: AlgorithmId,
        key_handle: KeyHandle,
    ) -> Result<ContextHandle, Error> {
        self.admit(|| {
            self.engine
                .create_hmac_from_handle(algorithm, key_handle, &self.key_store)
        })
    }

    pub fn update(
        &self,
        handle: ContextHandle,
        data: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), Error> {
        let context = self.slots.lock().get(handle, "update")?;
        let mut guard = context.lock();
        let res = guard.update(data, offset, length);
        let retired = guard.state() == ContextState::Finalized;
        drop(guard);
        if retired {
            self.slots.lock().retire(handle, &context);
        }
        res
    }

    /// Finalize the context and retire its handle, whatever the outcome.
    pub fn finalize(
        &self,
        handle: ContextHandle,
        output_capacity: usize,
    ) -> Result<Vec<u8>, Error> {
        let context = self.slots.lock().remove(handle, "finalize")?;
        let mut context = context.lock();
        context.finalize(output_capacity)
    }

    /// Finalize into `out[offset..offset + length]` and retire the handle.
    pub fn finalize_into(
        &self,
        handle: ContextHandle,
        out: &mut [u8],
        offset: usize,
        length: usize,
    ) -> Result<usize, Error> {
        let context = self.slots.lock().remove(handle, "finalize")?;
        let mut context = context.lock();
        context.finalize_into(out, offset, length)
    }

    /// Release the context without producing output.
    pub fn discard(&self, handle: ContextHandle) -> Result<(), Error> {
        let context = self.slots.lock().remove(handle, "discard")?;
        context.lock().discard();
        Ok(())
    }
}
