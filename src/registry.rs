use std::sync::{Mutex, OnceLock};

use crate::backend::{self, BackendFactory};
use crate::dims::Dimensions;
use crate::error::{EngineError, EngineResult};
use crate::instance::Instance;
use crate::resource::Capabilities;
use crate::Handle;

/// Process-wide table of live instances, lazily initialised on first
/// `create_instance`.
pub(crate) struct Registry {
    slots: Vec<Option<Instance>>,
    free_list: Vec<usize>,
    factories: Vec<Box<dyn BackendFactory>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            factories: backend::default_factory_chain(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        &mut self,
        tip_count: usize,
        partials_count: usize,
        compact_count: usize,
        state_count: usize,
        pattern_count: usize,
        eigen_count: usize,
        matrix_count: usize,
        rate_count: usize,
        resource_list: &[usize],
        requirement_flags: Capabilities,
    ) -> EngineResult<Handle> {
        let backend = self
            .factories
            .iter()
            .find_map(|factory| factory.create(state_count, resource_list, requirement_flags))
            .ok_or(EngineError::NoBackendAccepted)?;
        log::info!(
            "creating instance: tips={tip_count} states={state_count} patterns={pattern_count} \
             rates={rate_count} backend={}",
            backend.name()
        );
        let dims = Dimensions::new(
            tip_count,
            partials_count,
            compact_count,
            state_count,
            pattern_count,
            eigen_count,
            matrix_count,
            rate_count,
            backend.vector_width(),
        );
        let instance = Instance::new(dims, backend);

        let index = match self.free_list.pop() {
            Some(index) => {
                self.slots[index] = Some(instance);
                index
            }
            None => {
                self.slots.push(Some(instance));
                self.slots.len() - 1
            }
        };
        Ok(index as Handle)
    }

    fn slot(&self, handle: Handle) -> EngineResult<usize> {
        let index = usize::try_from(handle).map_err(|_| EngineError::UnknownInstance(handle))?;
        if self.slots.get(index).map(Option::is_some).unwrap_or(false) {
            Ok(index)
        } else {
            Err(EngineError::UnknownInstance(handle))
        }
    }

    fn get(&self, handle: Handle) -> EngineResult<&Instance> {
        let index = self.slot(handle)?;
        Ok(self.slots[index].as_ref().expect("checked by slot()"))
    }

    fn get_mut(&mut self, handle: Handle) -> EngineResult<&mut Instance> {
        let index = self.slot(handle)?;
        Ok(self.slots[index].as_mut().expect("checked by slot()"))
    }

    fn finalize(&mut self, handle: Handle) -> EngineResult<()> {
        let index = self.slot(handle)?;
        self.slots[index] = None;
        self.free_list.push(index);
        log::info!("finalized instance {handle}");
        Ok(())
    }
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn lock() -> std::sync::MutexGuard<'static, Registry> {
    REGISTRY
        .get_or_init(|| Mutex::new(Registry::new()))
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn create_instance(
    tip_count: usize,
    partials_count: usize,
    compact_count: usize,
    state_count: usize,
    pattern_count: usize,
    eigen_count: usize,
    matrix_count: usize,
    rate_count: usize,
    resource_list: &[usize],
    requirement_flags: Capabilities,
) -> EngineResult<Handle> {
    lock().create(
        tip_count,
        partials_count,
        compact_count,
        state_count,
        pattern_count,
        eigen_count,
        matrix_count,
        rate_count,
        resource_list,
        requirement_flags,
    )
}

pub(crate) fn with_instance<T>(
    handle: Handle,
    f: impl FnOnce(&Instance) -> EngineResult<T>,
) -> EngineResult<T> {
    f(lock().get(handle)?)
}

pub(crate) fn with_instance_mut<T>(
    handle: Handle,
    f: impl FnOnce(&mut Instance) -> EngineResult<T>,
) -> EngineResult<T> {
    f(lock().get_mut(handle)?)
}

pub(crate) fn finalize(handle: Handle) -> EngineResult<()> {
    lock().finalize(handle)
}
