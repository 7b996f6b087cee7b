//! Bounded LRU cache of [`WorkflowInstance`]s (§4.F "worker cache"). Holding
//! a run's state machine and parked task-executor continuations across
//! activations is what lets the server send "sticky" incremental
//! activations instead of full history replay on every task.

use crate::workflow::{WorkflowInstance, WorkflowRegistration};
use lru::LruCache;
use sdk_core_protos::activation::WorkflowActivation;
use sdk_core_protos::commands::WorkflowCommand;
use std::num::NonZeroUsize;

/// What the cache needs from the caller to start a run it doesn't already
/// hold: the workflow type's registration, looked up by the caller (the
/// cache itself knows nothing about the `sdk` crate's registry).
pub trait WorkflowInstanceFactory {
    fn registration_for(&self, workflow_type: &str) -> Option<WorkflowRegistration>;
}

pub struct WorkflowCache {
    instances: LruCache<String, WorkflowInstance>,
}

impl WorkflowCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { instances: LruCache::new(capacity) }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.instances.contains(run_id)
    }

    /// Applies one activation, creating the instance first if this is its
    /// initial task. Evicting the *run itself* (a `RemoveFromCache` job) is
    /// handled by [`WorkflowInstance::apply_activation`]; this method only
    /// drops the entry afterward if the instance reports it is now evicted
    /// or finished, and separately evicts whatever the LRU displaces to
    /// make room for a new entry.
    pub fn apply_activation(
        &mut self,
        activation: WorkflowActivation,
        workflow_type: &str,
        info_for_new_run: impl FnOnce() -> crate::workflow::WfInfoSeed,
        factory: &dyn WorkflowInstanceFactory,
    ) -> Result<Vec<WorkflowCommand>, CacheError> {
        if !self.instances.contains(&activation.run_id) {
            let registration = factory
                .registration_for(workflow_type)
                .ok_or_else(|| CacheError::UnknownWorkflowType(workflow_type.to_string()))?;
            let seed = info_for_new_run();
            let info = seed.into_info(workflow_type.to_string(), activation.run_id.clone());
            if let Some((_, evicted)) = self.instances.push(activation.run_id.clone(), WorkflowInstance::new(info, registration)) {
                evicted.cancel_for_eviction();
            }
        }

        let run_id = activation.run_id.clone();
        let instance = self.instances.get_mut(&run_id).expect("just inserted or already present");
        let commands = instance.apply_activation(activation);

        if instance.is_evicted() || instance.is_finished() {
            self.instances.pop(&run_id);
        }
        Ok(commands)
    }

    /// Forcibly evicts every cached instance (worker shutdown). Returns the
    /// run ids evicted, so the caller can surface them if it needs to.
    pub fn evict_all(&mut self) -> Vec<String> {
        let run_ids: Vec<String> = self.instances.iter().map(|(k, _)| k.clone()).collect();
        for run_id in &run_ids {
            if let Some(instance) = self.instances.pop(run_id) {
                instance.cancel_for_eviction();
            }
        }
        run_ids
    }

    pub fn evict(&mut self, run_id: &str) -> bool {
        if let Some(instance) = self.instances.pop(run_id) {
            instance.cancel_for_eviction();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no workflow registered for type `{0}`")]
    UnknownWorkflowType(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{WfInfoSeed, WorkflowHandlers};
    use futures_util::future::LocalBoxFuture;
    use sdk_core_protos::activation::WorkflowActivationJob;
    use sdk_core_protos::failure::Failure;
    use sdk_core_protos::payload::Payload;
    use sdk_core_protos::Timestamp;
    use std::collections::HashMap;

    struct EchoFactory;
    impl WorkflowInstanceFactory for EchoFactory {
        fn registration_for(&self, workflow_type: &str) -> Option<WorkflowRegistration> {
            if workflow_type != "Echo" {
                return None;
            }
            let main: Box<dyn FnOnce(crate::workflow::WfHandles, Vec<Payload>) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>> =
                Box::new(|_handles, args| Box::pin(async move { Ok(args.into_iter().next()) }));
            Some(WorkflowRegistration { main, handlers: WorkflowHandlers::default() })
        }
    }

    fn init_activation(run_id: &str) -> WorkflowActivation {
        WorkflowActivation {
            run_id: run_id.to_string(),
            timestamp: Timestamp::now(),
            is_replaying: false,
            history_length: 1,
            history_size_bytes: 0,
            jobs: vec![WorkflowActivationJob::InitializeWorkflow {
                workflow_type: "Echo".to_string(),
                workflow_id: format!("wf-{run_id}"),
                arguments: vec![],
                randomness_seed: 1,
                headers: HashMap::new(),
            }],
        }
    }

    fn seed() -> WfInfoSeed {
        WfInfoSeed::default()
    }

    #[test]
    fn unknown_workflow_type_is_an_error() {
        let mut cache = WorkflowCache::new(NonZeroUsize::new(2).unwrap());
        let err = cache.apply_activation(init_activation("r1"), "Ghost", seed, &EchoFactory).unwrap_err();
        assert_eq!(err, CacheError::UnknownWorkflowType("Ghost".to_string()));
    }

    #[test]
    fn finished_run_is_dropped_from_cache() {
        let mut cache = WorkflowCache::new(NonZeroUsize::new(2).unwrap());
        cache.apply_activation(init_activation("r1"), "Echo", seed, &EchoFactory).unwrap();
        assert!(!cache.contains("r1"), "Echo completes on its first poll, so nothing should remain cached");
    }

    #[test]
    fn capacity_overflow_evicts_least_recently_used() {
        let mut cache = WorkflowCache::new(NonZeroUsize::new(1).unwrap());
        // A long-lived run that never completes on init (waits on a signal).
        struct WaitingFactory;
        impl WorkflowInstanceFactory for WaitingFactory {
            fn registration_for(&self, _workflow_type: &str) -> Option<WorkflowRegistration> {
                let main: Box<dyn FnOnce(crate::workflow::WfHandles, Vec<Payload>) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>> =
                    Box::new(|handles, _args| {
                        Box::pin(async move {
                            let (_seq, rx) = handles.machines.borrow_mut().start_timer(std::time::Duration::from_secs(3600), None).unwrap();
                            let _ = rx.await;
                            Ok(None)
                        })
                    });
                Some(WorkflowRegistration { main, handlers: WorkflowHandlers::default() })
            }
        }
        cache.apply_activation(init_activation("r1"), "Wait", seed, &WaitingFactory).unwrap();
        assert!(cache.contains("r1"));
        cache.apply_activation(init_activation("r2"), "Wait", seed, &WaitingFactory).unwrap();
        assert!(cache.contains("r2"));
        assert!(!cache.contains("r1"), "r1 should have been evicted to make room for r2");
    }
}
