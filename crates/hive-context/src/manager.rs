//! Context lifecycle manager.
//!
//! Owns the six built-in contexts and exposes the transitions the host calls
//! at unit-of-work boundaries:
//!
//! | Scope | Begin | End | Restore |
//! |---|---|---|---|
//! | Application + Singleton | [`begin_application`](ContextManager::begin_application) | [`end_application`](ContextManager::end_application) | n/a |
//! | Session | [`begin_session`](ContextManager::begin_session) | [`end_session`](ContextManager::end_session) | [`restore_session`](ContextManager::restore_session) |
//! | Conversation | [`begin_conversation`](ContextManager::begin_conversation) | [`end_conversation`](ContextManager::end_conversation) | [`restore_conversation`](ContextManager::restore_conversation) |
//! | Request + Dependent | [`begin_request`](ContextManager::begin_request) | [`end_request`](ContextManager::end_request) | [`restore_request`](ContextManager::restore_request) |
//!
//! Begin and restore transitions require the application scope to be active
//! and fail with a fatal [`LifecycleError`] otherwise. End transitions always
//! run to completion and return a [`DestructionReport`] instead of failing.
//!
//! Session, conversation, request and dependent state is held per calling
//! thread, so each thread drives its own unit of work; application and
//! singleton state is shared. The composite `is_*_active` queries read the
//! calling thread's view of the individual atomic flags every time; nothing
//! is cached.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use hive_core::errors::panic_message;
use hive_core::{
    ContainerError, ContainerService, ConversationId, Contextual, Instance, InstanceResolver,
    LifecycleError, RequestId, ScopeKind, SessionId,
};
use parking_lot::RwLock;
use tracing::{instrument, trace, warn};

use crate::context::Context;
use crate::report::DestructionReport;
use crate::store::{BeanStore, ConcurrentBeanStore};

const DEFAULT_SINGLETON_CAPACITY: usize = 64;

/// Owns every built-in context and drives scope transitions.
///
/// Constructed once per container and shared by reference.
pub struct ContextManager {
    application: Context,
    singleton: Context,
    session: Context,
    conversation: Context,
    request: Context,
    dependent: Context,
    singleton_capacity: usize,
    services: RwLock<Vec<Weak<dyn ContainerService>>>,
}

impl ContextManager {
    /// Create a manager with all contexts inactive.
    #[must_use]
    pub fn new() -> Self {
        Self {
            application: Context::new(ScopeKind::Application),
            singleton: Context::new(ScopeKind::Singleton),
            session: Context::new(ScopeKind::Session),
            conversation: Context::new(ScopeKind::Conversation),
            request: Context::new(ScopeKind::Request),
            dependent: Context::new(ScopeKind::Dependent),
            singleton_capacity: DEFAULT_SINGLETON_CAPACITY,
            services: RwLock::new(Vec::new()),
        }
    }

    /// Initial capacity of the singleton store created by `begin_application`.
    #[must_use]
    pub fn with_singleton_capacity(mut self, capacity: usize) -> Self {
        self.singleton_capacity = capacity;
        self
    }

    /// Register a service whose `cleanup` runs when the application ends.
    ///
    /// Only a weak handle is kept: services typically hold the manager
    /// themselves. A service dropped before the application ends is skipped.
    pub fn register_service<S: ContainerService + 'static>(&self, service: &Arc<S>) {
        trace!(service = service.name(), "registering container service");
        let service: Weak<S> = Arc::downgrade(service);
        self.services.write().push(service);
    }

    /// The context serving `scope`.
    pub fn context(&self, scope: ScopeKind) -> &Context {
        match scope {
            ScopeKind::Application => &self.application,
            ScopeKind::Singleton => &self.singleton,
            ScopeKind::Session => &self.session,
            ScopeKind::Conversation => &self.conversation,
            ScopeKind::Request => &self.request,
            ScopeKind::Dependent => &self.dependent,
        }
    }

    // ── Application ─────────────────────────────────────────────────────

    /// Attach the application store and start the application and singleton
    /// scopes. Must precede every other transition.
    pub fn begin_application(&self, store: Arc<dyn BeanStore>) -> Result<(), LifecycleError> {
        if self.application.is_active() {
            return Err(LifecycleError::ApplicationAlreadyActive);
        }
        trace!("starting application");
        self.application.set_store(Some(store));
        self.application.set_active(true);
        self.singleton
            .set_store(Some(Arc::new(ConcurrentBeanStore::with_capacity(self.singleton_capacity))));
        self.singleton.set_active(true);
        Ok(())
    }

    /// Destroy the application and singleton scopes, run every registered
    /// service's cleanup, then clean up the calling thread's remaining
    /// contexts. Units of work still running on other threads keep their own
    /// stores until they end them.
    ///
    /// Safe to call when already ended: there is nothing left to destroy.
    #[instrument(level = "trace", skip_all)]
    pub fn end_application(&self) -> DestructionReport {
        trace!(was_active = self.application.is_active(), "ending application");
        let mut report = DestructionReport::new();

        report.merge(self.application.destroy());
        self.application.set_active(false);
        self.application.set_store(None);

        report.merge(self.singleton.destroy());
        self.singleton.set_active(false);
        self.singleton.set_store(None);

        let services: Vec<Arc<dyn ContainerService>> =
            self.services.read().iter().filter_map(Weak::upgrade).collect();
        for service in services {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| service.cleanup())) {
                let error = ContainerError::Cleanup {
                    service: service.name().to_string(),
                    message: panic_message(payload.as_ref()),
                };
                warn!(service = service.name(), error = %error, "container service cleanup failed");
                report.record_failure(error);
            }
        }

        report.merge(self.cleanup());
        report
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// Attach a fresh session store and activate the session scope.
    pub fn begin_session(&self, id: &SessionId, store: Arc<dyn BeanStore>) -> Result<(), LifecycleError> {
        self.require_application("begin_session")?;
        trace!(session = %id, "starting session");
        self.session.set_store(Some(store));
        self.session.set_active(true);
        Ok(())
    }

    /// Reattach a previously persisted session store. Destroys nothing.
    pub fn restore_session(&self, id: &SessionId, store: Arc<dyn BeanStore>) -> Result<(), LifecycleError> {
        self.require_application("restore_session")?;
        trace!(session = %id, "restoring session");
        self.session.set_store(Some(store));
        self.session.set_active(true);
        Ok(())
    }

    /// Destroy the session's instances and deactivate it.
    ///
    /// The session is forced active first so that a store which was attached
    /// without activation is still torn down.
    pub fn end_session(&self, id: &SessionId, store: Arc<dyn BeanStore>) -> DestructionReport {
        trace!(session = %id, "ending session");
        self.session.set_store(Some(store));
        self.session.set_active(true);
        let report = self.session.destroy();
        self.session.set_store(None);
        self.session.set_active(false);
        report
    }

    // ── Conversation ────────────────────────────────────────────────────

    /// Attach a fresh conversation store and activate the conversation scope.
    pub fn begin_conversation(
        &self,
        id: &ConversationId,
        store: Arc<dyn BeanStore>,
    ) -> Result<(), LifecycleError> {
        self.require_application("begin_conversation")?;
        trace!(conversation = %id, "starting conversation");
        self.conversation.set_store(Some(store));
        self.conversation.set_active(true);
        Ok(())
    }

    /// Reattach a long-running conversation's store. Destroys nothing.
    pub fn restore_conversation(
        &self,
        id: &ConversationId,
        store: Arc<dyn BeanStore>,
    ) -> Result<(), LifecycleError> {
        self.require_application("restore_conversation")?;
        trace!(conversation = %id, "restoring conversation");
        self.conversation.set_store(Some(store));
        self.conversation.set_active(true);
        Ok(())
    }

    /// Destroy the conversation's instances and deactivate it.
    pub fn end_conversation(&self, id: &ConversationId, store: Arc<dyn BeanStore>) -> DestructionReport {
        trace!(conversation = %id, "ending conversation");
        self.conversation.set_store(Some(store));
        self.conversation.set_active(true);
        let report = self.conversation.destroy();
        self.conversation.set_store(None);
        self.conversation.set_active(false);
        report
    }

    // ── Request ─────────────────────────────────────────────────────────

    /// Attach the request store and activate the request and dependent scopes.
    #[instrument(level = "trace", skip(self, store), fields(request = %id))]
    pub fn begin_request(&self, id: &RequestId, store: Arc<dyn BeanStore>) -> Result<(), LifecycleError> {
        self.require_application("begin_request")?;
        trace!("starting request");
        self.request.set_store(Some(store));
        self.request.set_active(true);
        self.dependent.set_active(true);
        Ok(())
    }

    /// Reattach a request store (e.g. after an async hand-off) without
    /// destroying anything.
    pub fn restore_request(&self, id: &RequestId, store: Arc<dyn BeanStore>) -> Result<(), LifecycleError> {
        self.require_application("restore_request")?;
        trace!(request = %id, "restoring request");
        self.request.set_store(Some(store));
        self.request.set_active(true);
        self.dependent.set_active(true);
        Ok(())
    }

    /// Tear down the request.
    ///
    /// The dependent scope is deactivated and its instances destroyed before
    /// the request store is touched: dependent destroy callbacks may still
    /// reach collaborators that live in the request store.
    #[instrument(level = "trace", skip(self, store), fields(request = %id))]
    pub fn end_request(&self, id: &RequestId, store: Arc<dyn BeanStore>) -> DestructionReport {
        trace!("ending request");
        self.request.set_store(Some(store));
        self.dependent.set_active(false);

        let mut report = self.dependent.destroy();
        report.merge(self.request.destroy());

        self.request.set_active(false);
        self.request.set_store(None);
        report
    }

    // ── Composite queries ───────────────────────────────────────────────

    /// Singleton, application, request and dependent are all active.
    pub fn is_request_active(&self) -> bool {
        self.singleton.is_active()
            && self.application.is_active()
            && self.request.is_active()
            && self.dependent.is_active()
    }

    /// Singleton, application and dependent are all active.
    pub fn is_application_active(&self) -> bool {
        self.singleton.is_active() && self.application.is_active() && self.dependent.is_active()
    }

    /// Singleton, application, session, conversation and dependent are all active.
    pub fn is_conversation_active(&self) -> bool {
        self.singleton.is_active()
            && self.application.is_active()
            && self.session.is_active()
            && self.conversation.is_active()
            && self.dependent.is_active()
    }

    /// Singleton, application, session and dependent are all active.
    pub fn is_session_active(&self) -> bool {
        self.singleton.is_active()
            && self.application.is_active()
            && self.session.is_active()
            && self.dependent.is_active()
    }

    // ── Cleanup ─────────────────────────────────────────────────────────

    /// Destroy, detach and deactivate every context as seen from the calling
    /// thread, innermost first.
    ///
    /// Every context is visited regardless of failures in earlier ones.
    #[instrument(level = "trace", skip_all)]
    pub fn cleanup(&self) -> DestructionReport {
        let mut report = DestructionReport::new();
        for context in [
            &self.dependent,
            &self.request,
            &self.conversation,
            &self.session,
            &self.singleton,
            &self.application,
        ] {
            report.merge(context.cleanup());
        }
        report
    }

    fn require_application(&self, operation: &'static str) -> Result<(), LifecycleError> {
        if self.application.is_active() {
            Ok(())
        } else {
            Err(LifecycleError::ApplicationNotActive { operation })
        }
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceResolver for ContextManager {
    fn resolve(&self, bean: &Arc<dyn Contextual>) -> hive_core::Result<Instance> {
        Ok(self.context(bean.scope()).get_or_create(bean)?)
    }
}

impl std::fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("application", &self.application.is_active())
            .field("singleton", &self.singleton.is_active())
            .field("session", &self.session.is_active())
            .field("conversation", &self.conversation.is_active())
            .field("request", &self.request.is_active())
            .field("dependent", &self.dependent.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use hive_core::{BeanId, BoxError, CapabilitySet, ContextError};
    use parking_lot::Mutex;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Bean whose destroy callback appends to a shared journal.
    #[derive(Debug)]
    struct JournalBean {
        id: BeanId,
        scope: ScopeKind,
        journal: Journal,
    }

    impl JournalBean {
        fn new(id: &str, scope: ScopeKind, journal: &Journal) -> Arc<dyn Contextual> {
            Arc::new(Self {
                id: BeanId::new(id),
                scope,
                journal: Arc::clone(journal),
            })
        }
    }

    impl Contextual for JournalBean {
        fn id(&self) -> &BeanId {
            &self.id
        }
        fn scope(&self) -> ScopeKind {
            self.scope
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new()
        }
        fn create_instance(&self) -> Result<Instance, BoxError> {
            Ok(Arc::new(self.id.to_string()))
        }
        fn destroy_instance(&self, _instance: Instance) -> Result<(), BoxError> {
            self.journal.lock().push(format!("destroy:{}:{}", self.scope, self.id));
            Ok(())
        }
    }

    /// Store double that journals removals next to the destroy calls.
    struct JournalStore {
        inner: ConcurrentBeanStore,
        journal: Journal,
    }

    impl BeanStore for JournalStore {
        fn get(&self, id: &BeanId) -> Option<crate::store::ContextualInstance> {
            self.inner.get(id)
        }
        fn put(&self, id: BeanId, instance: crate::store::ContextualInstance) {
            self.inner.put(id, instance);
        }
        fn remove(&self, id: &BeanId) -> Option<crate::store::ContextualInstance> {
            self.journal.lock().push(format!("remove:{id}"));
            self.inner.remove(id)
        }
        fn contains(&self, id: &BeanId) -> bool {
            self.inner.contains(id)
        }
        fn entries(&self) -> Vec<(BeanId, crate::store::ContextualInstance)> {
            self.inner.entries()
        }
        fn clear(&self) {
            self.inner.clear();
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    /// Bean counting destroy calls.
    #[derive(Debug)]
    struct Counted {
        id: BeanId,
        scope: ScopeKind,
        destroyed: Arc<AtomicUsize>,
    }

    impl Contextual for Counted {
        fn id(&self) -> &BeanId {
            &self.id
        }
        fn scope(&self) -> ScopeKind {
            self.scope
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new()
        }
        fn create_instance(&self) -> Result<Instance, BoxError> {
            Ok(Arc::new(()))
        }
        fn destroy_instance(&self, _instance: Instance) -> Result<(), BoxError> {
            let _ = self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    mockall::mock! {
        Service {}
        impl ContainerService for Service {
            fn name(&self) -> &str;
            fn cleanup(&self);
        }
    }

    fn store() -> Arc<dyn BeanStore> {
        Arc::new(ConcurrentBeanStore::new())
    }

    fn started() -> ContextManager {
        let manager = ContextManager::new();
        manager.begin_application(store()).unwrap();
        manager
    }

    #[test]
    fn new_manager_has_nothing_active() {
        let manager = ContextManager::new();
        assert!(!manager.is_application_active());
        assert!(!manager.is_request_active());
        assert!(!manager.is_session_active());
        assert!(!manager.is_conversation_active());
        for scope in ScopeKind::all() {
            assert!(!manager.context(*scope).is_active());
        }
    }

    #[test]
    fn begin_application_activates_application_and_singleton() {
        let manager = started();
        assert!(manager.context(ScopeKind::Application).is_active());
        assert!(manager.context(ScopeKind::Singleton).is_active());
        assert!(manager.context(ScopeKind::Singleton).store().is_some());
        // Dependent only starts with a request.
        assert!(!manager.is_application_active());
    }

    #[test]
    fn begin_application_twice_is_fatal() {
        let manager = started();
        let err = manager.begin_application(store()).unwrap_err();
        assert_eq!(err, LifecycleError::ApplicationAlreadyActive);
        assert!(ContainerError::from(err).is_fatal());
    }

    #[test]
    fn begin_application_after_end_is_allowed() {
        let manager = started();
        let _ = manager.end_application();
        manager.begin_application(store()).unwrap();
        assert!(manager.context(ScopeKind::Application).is_active());
    }

    #[test]
    fn request_before_application_is_fatal() {
        let manager = ContextManager::new();
        let err = manager.begin_request(&RequestId::from("r1"), store()).unwrap_err();
        assert_matches!(err, LifecycleError::ApplicationNotActive { operation: "begin_request" });
        assert_matches!(
            manager.restore_session(&SessionId::from("s1"), store()),
            Err(LifecycleError::ApplicationNotActive { .. })
        );
        assert_matches!(
            manager.begin_conversation(&ConversationId::from("c1"), store()),
            Err(LifecycleError::ApplicationNotActive { .. })
        );
        assert!(!manager.context(ScopeKind::Request).is_active());
    }

    #[test]
    fn begin_then_end_request_clears_state() {
        let manager = started();
        let id = RequestId::from("r1");
        let request_store = store();
        manager.begin_request(&id, request_store.clone()).unwrap();
        assert!(manager.is_request_active());
        assert!(manager.is_application_active());

        let report = manager.end_request(&id, request_store);
        assert!(report.is_clean());
        assert!(!manager.is_request_active());
        assert!(manager.context(ScopeKind::Request).store().is_none());
        assert!(!manager.context(ScopeKind::Dependent).is_active());
    }

    #[test]
    fn begin_then_end_session_clears_state() {
        let manager = started();
        let id = SessionId::from("s1");
        let session_store = store();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        manager.begin_session(&id, session_store.clone()).unwrap();
        assert!(manager.is_session_active());

        let _ = manager.end_session(&id, session_store);
        assert!(!manager.is_session_active());
        assert!(manager.context(ScopeKind::Session).store().is_none());
    }

    #[test]
    fn begin_then_end_conversation_clears_state() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        manager.begin_session(&SessionId::from("s1"), store()).unwrap();
        let id = ConversationId::from("c1");
        let conversation_store = store();
        manager.begin_conversation(&id, conversation_store.clone()).unwrap();
        assert!(manager.is_conversation_active());

        let _ = manager.end_conversation(&id, conversation_store);
        assert!(!manager.is_conversation_active());
        assert!(manager.is_session_active());
        assert!(manager.context(ScopeKind::Conversation).store().is_none());
    }

    #[test]
    fn end_application_nulls_stores() {
        let manager = started();
        let _ = manager.end_application();
        assert!(!manager.context(ScopeKind::Application).is_active());
        assert!(!manager.context(ScopeKind::Singleton).is_active());
        assert!(manager.context(ScopeKind::Application).store().is_none());
        assert!(manager.context(ScopeKind::Singleton).store().is_none());
    }

    #[test]
    fn end_application_destroys_application_and_singleton_instances() {
        let manager = started();
        let destroyed = Arc::new(AtomicUsize::new(0));
        for (id, scope) in [("config", ScopeKind::Application), ("clock", ScopeKind::Singleton)] {
            let bean: Arc<dyn Contextual> = Arc::new(Counted {
                id: BeanId::new(id),
                scope,
                destroyed: destroyed.clone(),
            });
            let _ = manager.resolve(&bean).unwrap();
        }

        let report = manager.end_application();
        assert_eq!(report.destroyed(), 2);
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn end_application_is_idempotent() {
        let manager = started();
        let first = manager.end_application();
        let second = manager.end_application();
        assert!(first.is_clean());
        assert!(second.is_clean());
        assert_eq!(second.destroyed(), 0);
        assert!(!manager.context(ScopeKind::Application).is_active());
    }

    #[test]
    fn end_application_runs_service_cleanup() {
        let manager = started();
        let mut service = MockService::new();
        let _ = service.expect_name().return_const("proxy-pool".to_string());
        let _ = service.expect_cleanup().times(1).return_const(());
        let service = Arc::new(service);
        manager.register_service(&service);

        let report = manager.end_application();
        assert!(report.is_clean());
    }

    #[test]
    fn panicking_service_cleanup_is_contained() {
        struct Broken;
        impl ContainerService for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn cleanup(&self) {
                panic!("cannot clean");
            }
        }

        let manager = started();
        let broken = Broken;
        let mut healthy = MockService::new();
        let _ = healthy.expect_name().return_const("healthy".to_string());
        let _ = healthy.expect_cleanup().times(1).return_const(());
        let (broken, healthy) = (Arc::new(broken), Arc::new(healthy));
        manager.register_service(&broken);
        manager.register_service(&healthy);

        let report = manager.end_application();
        assert_eq!(report.failures().len(), 1);
        assert_matches!(
            &report.failures()[0],
            ContainerError::Cleanup { service, message } if service == "broken" && message == "cannot clean"
        );
    }

    #[test]
    fn dropped_service_is_skipped() {
        let manager = started();
        let mut service = MockService::new();
        let _ = service.expect_name().return_const("gone".to_string());
        let _ = service.expect_cleanup().never();
        manager.register_service(&Arc::new(service));

        let report = manager.end_application();
        assert!(report.is_clean());
    }

    #[test]
    fn is_request_active_requires_every_flag() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        assert!(manager.is_request_active());

        for scope in [
            ScopeKind::Singleton,
            ScopeKind::Application,
            ScopeKind::Request,
            ScopeKind::Dependent,
        ] {
            manager.context(scope).set_active(false);
            assert!(!manager.is_request_active(), "{scope} inactive must fail the query");
            manager.context(scope).set_active(true);
            assert!(manager.is_request_active());
        }
    }

    #[test]
    fn is_session_active_requires_every_flag() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        manager.begin_session(&SessionId::from("s1"), store()).unwrap();

        for scope in [
            ScopeKind::Singleton,
            ScopeKind::Application,
            ScopeKind::Session,
            ScopeKind::Dependent,
        ] {
            manager.context(scope).set_active(false);
            assert!(!manager.is_session_active(), "{scope} inactive must fail the query");
            manager.context(scope).set_active(true);
        }
        assert!(manager.is_session_active());
    }

    #[test]
    fn is_conversation_active_requires_every_flag() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        manager.begin_session(&SessionId::from("s1"), store()).unwrap();
        manager.begin_conversation(&ConversationId::from("c1"), store()).unwrap();
        assert!(manager.is_conversation_active());

        for scope in [
            ScopeKind::Singleton,
            ScopeKind::Application,
            ScopeKind::Session,
            ScopeKind::Conversation,
            ScopeKind::Dependent,
        ] {
            manager.context(scope).set_active(false);
            assert!(!manager.is_conversation_active(), "{scope} inactive must fail the query");
            manager.context(scope).set_active(true);
        }
        assert!(manager.is_conversation_active());
    }

    #[test]
    fn is_application_active_requires_every_flag() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        assert!(manager.is_application_active());

        for scope in [ScopeKind::Singleton, ScopeKind::Application, ScopeKind::Dependent] {
            manager.context(scope).set_active(false);
            assert!(!manager.is_application_active(), "{scope} inactive must fail the query");
            manager.context(scope).set_active(true);
        }
        manager.context(ScopeKind::Request).set_active(false);
        assert!(manager.is_application_active(), "request is not part of the query");
    }

    #[test]
    fn concurrent_requests_keep_separate_state() {
        let manager = started();
        let basket: Arc<dyn Contextual> = Arc::new(Counted {
            id: BeanId::new("basket"),
            scope: ScopeKind::Request,
            destroyed: Arc::new(AtomicUsize::new(0)),
        });
        let (mine, theirs) = (Arc::new(ConcurrentBeanStore::new()), Arc::new(ConcurrentBeanStore::new()));
        let (started_other, ended_mine) = (Barrier::new(2), Barrier::new(2));
        manager.begin_request(&RequestId::from("r1"), mine.clone()).unwrap();

        std::thread::scope(|s| {
            let _ = s.spawn(|| {
                let id = RequestId::from("r2");
                manager.begin_request(&id, theirs.clone()).unwrap();
                let _ = manager.resolve(&basket).unwrap();
                let _ = started_other.wait();
                let _ = ended_mine.wait();
                assert!(manager.is_request_active(), "ending r1 must not end r2");
                let report = manager.end_request(&id, theirs.clone());
                assert_eq!(report.destroyed(), 1);
            });

            let _ = started_other.wait();
            assert!(mine.is_empty());
            assert_eq!(theirs.len(), 1);
            let _ = manager.end_request(&RequestId::from("r1"), mine.clone());
            assert!(!manager.is_request_active());
            let _ = ended_mine.wait();
        });

        assert!(theirs.is_empty());
        assert!(manager.context(ScopeKind::Request).store().is_none());
    }

    #[test]
    fn restore_conversation_activates_without_destroying() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        manager.begin_session(&SessionId::from("s1"), store()).unwrap();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let persisted = Arc::new(ConcurrentBeanStore::new());
        let bean: Arc<dyn Contextual> = Arc::new(Counted {
            id: BeanId::new("wizard"),
            scope: ScopeKind::Conversation,
            destroyed: destroyed.clone(),
        });
        let kept: Instance = Arc::new(());
        persisted.put(
            bean.id().clone(),
            crate::store::ContextualInstance::new(bean.clone(), kept.clone()),
        );

        manager
            .restore_conversation(&ConversationId::from("c1"), persisted.clone())
            .unwrap();

        assert!(manager.is_conversation_active());
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&manager.resolve(&bean).unwrap(), &kept));
        assert_eq!(persisted.len(), 1);
    }

    #[test]
    fn restore_request_activates_without_destroying() {
        let manager = started();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let persisted = Arc::new(ConcurrentBeanStore::new());
        let bean: Arc<dyn Contextual> = Arc::new(Counted {
            id: BeanId::new("upload"),
            scope: ScopeKind::Request,
            destroyed: destroyed.clone(),
        });
        let kept: Instance = Arc::new(());
        persisted.put(
            bean.id().clone(),
            crate::store::ContextualInstance::new(bean.clone(), kept.clone()),
        );

        manager.restore_request(&RequestId::from("r1"), persisted.clone()).unwrap();

        assert!(manager.is_request_active());
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&manager.resolve(&bean).unwrap(), &kept));
        assert_matches!(
            manager.restore_request(&RequestId::from("r1"), persisted.clone()),
            Ok(())
        );
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn end_request_destroys_dependents_before_request_store() {
        let manager = started();
        let journal: Journal = Arc::default();
        let id = RequestId::from("r1");
        let request_store: Arc<dyn BeanStore> = Arc::new(JournalStore {
            inner: ConcurrentBeanStore::new(),
            journal: journal.clone(),
        });
        manager.begin_request(&id, request_store.clone()).unwrap();

        let request_bean = JournalBean::new("basket", ScopeKind::Request, &journal);
        let dependent_bean = JournalBean::new("formatter", ScopeKind::Dependent, &journal);
        let _ = manager.resolve(&request_bean).unwrap();
        let _ = manager.resolve(&dependent_bean).unwrap();

        let report = manager.end_request(&id, request_store);
        assert_eq!(report.destroyed(), 2);
        assert_eq!(
            *journal.lock(),
            vec![
                "destroy:dependent:formatter".to_string(),
                "destroy:request:basket".to_string(),
                "remove:basket".to_string(),
            ]
        );
    }

    #[test]
    fn restore_session_activates_without_destroying() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let persisted = Arc::new(ConcurrentBeanStore::new());
        let bean: Arc<dyn Contextual> = Arc::new(Counted {
            id: BeanId::new("prefs"),
            scope: ScopeKind::Session,
            destroyed: destroyed.clone(),
        });
        persisted.put(
            bean.id().clone(),
            crate::store::ContextualInstance::new(bean.clone(), Arc::new(())),
        );

        manager.restore_session(&SessionId::from("s1"), persisted.clone()).unwrap();

        assert!(manager.is_session_active());
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert!(manager.context(ScopeKind::Session).get(&bean).unwrap().is_some());
    }

    #[test]
    fn end_session_forces_active_before_destroying() {
        let manager = started();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let bean: Arc<dyn Contextual> = Arc::new(Counted {
            id: BeanId::new("prefs"),
            scope: ScopeKind::Session,
            destroyed: destroyed.clone(),
        });
        let session_store = Arc::new(ConcurrentBeanStore::new());
        session_store.put(
            bean.id().clone(),
            crate::store::ContextualInstance::new(bean, Arc::new(())),
        );

        // The session was never activated on this thread.
        assert!(!manager.context(ScopeKind::Session).is_active());
        let report = manager.end_session(&SessionId::from("s1"), session_store.clone());

        assert_eq!(report.destroyed(), 1);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(session_store.is_empty());
        assert!(!manager.context(ScopeKind::Session).is_active());
    }

    #[test]
    fn resolve_against_inactive_scope_fails() {
        let manager = started();
        let bean: Arc<dyn Contextual> = Arc::new(Counted {
            id: BeanId::new("basket"),
            scope: ScopeKind::Request,
            destroyed: Arc::default(),
        });
        let err = manager.resolve(&bean).unwrap_err();
        assert_matches!(err, ContainerError::Context(ContextError::NotActive(ScopeKind::Request)));
    }

    #[test]
    fn cleanup_visits_every_context() {
        let manager = started();
        manager.begin_request(&RequestId::from("r1"), store()).unwrap();
        manager.begin_session(&SessionId::from("s1"), store()).unwrap();
        manager.begin_conversation(&ConversationId::from("c1"), store()).unwrap();
        let destroyed = Arc::new(AtomicUsize::new(0));
        for scope in ScopeKind::all() {
            let bean: Arc<dyn Contextual> = Arc::new(Counted {
                id: BeanId::new(format!("{scope}-bean")),
                scope: *scope,
                destroyed: destroyed.clone(),
            });
            let _ = manager.resolve(&bean).unwrap();
        }

        let report = manager.cleanup();
        assert_eq!(report.destroyed(), ScopeKind::all().len());
        for scope in ScopeKind::all() {
            let context = manager.context(*scope);
            assert!(!context.is_active());
            assert!(context.store().is_none());
        }
    }

    #[test]
    fn debug_lists_flags() {
        let manager = started();
        let debug = format!("{manager:?}");
        assert!(debug.contains("application: true"));
        assert!(debug.contains("request: false"));
    }
}
