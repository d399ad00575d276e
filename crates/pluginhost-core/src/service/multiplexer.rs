//! Maps (plugin package, service class) to at most one live instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use pluginhost_protocols::{
    AttachContext, ComponentName, ErrorSink, Intent, PluginError, RuntimeResolver, ServiceHost,
    StartResult,
};

use super::{ServiceRecord, ServiceState};
use crate::runtime::ResolverChain;

fn record_key(package: &str, class: &str) -> String {
    format!("{}/{}", package, class)
}

/// Registry of live plugin services and their proxy bookkeeping.
pub struct ServiceMultiplexer {
    host_package: String,
    runtimes: Arc<dyn RuntimeResolver>,
    errors: Arc<dyn ErrorSink>,
    records: DashMap<String, Arc<ServiceRecord>>,
    /// Every proxy that has fronted a service, kept for terminating on quit.
    proxies: DashMap<ComponentName, Arc<dyn ServiceHost>>,
    quit_requested: AtomicBool,
    kill_on_quit: AtomicBool,
}

impl ServiceMultiplexer {
    pub fn new(
        host_package: impl Into<String>,
        runtimes: Arc<dyn RuntimeResolver>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            host_package: host_package.into(),
            runtimes,
            errors,
            records: DashMap::new(),
            proxies: DashMap::new(),
            quit_requested: AtomicBool::new(false),
            kill_on_quit: AtomicBool::new(false),
        }
    }

    /// The live record for `(package, class)`, if any.
    pub fn resolve(&self, package: &str, class: &str) -> Option<Arc<ServiceRecord>> {
        self.records
            .get(&record_key(package, class))
            .map(|entry| entry.clone())
    }

    /// Return the live record, creating and attaching the instance first if
    /// there is none.
    ///
    /// Failures are reported to the error sink and never leave a partially
    /// constructed record behind.
    pub fn load_or_create(
        &self,
        package: &str,
        class: &str,
        proxy: Arc<dyn ServiceHost>,
        process: &str,
    ) -> Result<Arc<ServiceRecord>, PluginError> {
        if let Some(existing) = self.resolve(package, class) {
            return Ok(existing);
        }

        self.proxies
            .entry(proxy.component().clone())
            .or_insert_with(|| proxy.clone());
        let record = match self.create(package, class, proxy.clone(), process) {
            Ok(record) => record,
            Err(err) => {
                self.report(package, &err);
                self.stop_proxy_if_idle(proxy.as_ref());
                return Err(err);
            }
        };

        let record = self
            .records
            .entry(record_key(package, class))
            .or_insert(record)
            .clone();
        info!(
            plugin = %package,
            service = %class,
            proxy = %record.proxy().component(),
            "service created"
        );
        Ok(record)
    }

    fn create(
        &self,
        package: &str,
        class: &str,
        proxy: Arc<dyn ServiceHost>,
        process: &str,
    ) -> Result<Arc<ServiceRecord>, PluginError> {
        if !self.runtimes.is_installed(package) {
            return Err(PluginError::NotInstalled(package.to_string()));
        }
        let runtime = self
            .runtimes
            .resolve_runtime(package)
            .ok_or_else(|| PluginError::RuntimeNotReady(package.to_string()))?;

        let ctor = ResolverChain::for_runtime(runtime.as_ref()).resolve_service(class)?;
        let component = ComponentName::new(package, class);
        let ctx = AttachContext {
            component: component.clone(),
            host_package: self.host_package.clone(),
            proxy: proxy.component().clone(),
            process: process.to_string(),
        };
        let mut instance = ctor(&ctx)?;
        instance.on_create()?;

        let record = ServiceRecord::new(component, proxy, instance);
        record.advance(ServiceState::Created);
        Ok(Arc::new(record))
    }

    /// Returns the new bind count.
    pub fn bind(&self, package: &str, class: &str, intent: &Intent) -> Result<u32, PluginError> {
        let record = self.require(package, class)?;
        if let Err(err) = record.with_instance(|service| service.on_bind(intent)) {
            self.report(package, &err);
            self.fail(&record);
            return Err(err);
        }
        let count = record.increment_bind();
        debug!(plugin = %package, service = %class, bind_count = count, "service bound");
        Ok(count)
    }

    /// Returns the new bind count, or `None` if the service is not live.
    pub fn unbind(&self, package: &str, class: &str, intent: &Intent) -> Option<u32> {
        let record = self.resolve(package, class)?;
        let count = record.decrement_bind();
        record.with_instance(|service| service.on_unbind(intent));
        debug!(plugin = %package, service = %class, bind_count = count, "service unbound");
        self.try_destroy(&record);
        Some(count)
    }

    /// Deliver a start command to the live instance.
    pub fn start(
        &self,
        package: &str,
        class: &str,
        intent: &Intent,
        start_id: u32,
    ) -> Result<StartResult, PluginError> {
        let record = self.require(package, class)?;
        let result = record.with_instance(|service| service.on_start_command(intent, start_id));
        match result {
            Ok(result) => {
                record.advance(ServiceState::Started);
                record.set_self_launch(result.restarts_on_kill());
                info!(
                    plugin = %package,
                    service = %class,
                    start_id,
                    ?result,
                    state = ?record.state(),
                    "service started"
                );
                Ok(result)
            }
            Err(err) => {
                self.report(package, &err);
                self.fail(&record);
                Err(err)
            }
        }
    }

    /// STARTED to STOPPED, then destroy if nothing is bound.
    pub fn stop(&self, package: &str, class: &str) -> bool {
        let Some(record) = self.resolve(package, class) else {
            return false;
        };
        record.advance(ServiceState::Stopped);
        record.set_self_launch(false);
        debug!(plugin = %package, service = %class, "service stopped");
        self.try_destroy(&record)
    }

    /// Destroy `record` if nothing is bound and it is live.
    ///
    /// On success the record leaves the registry, and its proxy stops once
    /// it fronts nothing else.
    pub fn try_destroy(&self, record: &Arc<ServiceRecord>) -> bool {
        if record.bind_count() > 0 {
            debug!(service = %record.component(), bind_count = record.bind_count(), "still bound, not destroying");
            return false;
        }
        if record.state() == ServiceState::Default || !record.advance(ServiceState::Destroyed) {
            return false;
        }

        record.with_instance(|service| service.on_destroy());
        self.remove(record);
        info!(service = %record.component(), "service destroyed");
        self.stop_proxy_if_idle(record.proxy().as_ref());
        if self.records.is_empty() && self.is_quitting() {
            self.finish_quit();
        }
        true
    }

    /// Destroy every unbound service and stop idle proxies.
    ///
    /// Services still bound are destroyed on their last unbind; with
    /// `kill_process` the process is terminated once the last one goes,
    /// or straight away when nothing is live.
    pub fn quit(&self, kill_process: bool) -> usize {
        self.quit_requested.store(true, Ordering::SeqCst);
        if kill_process {
            self.kill_on_quit.store(true, Ordering::SeqCst);
        }
        let destroyed = self
            .records()
            .iter()
            .filter(|record| self.try_destroy(record))
            .count();
        info!(destroyed, remaining = self.records.len(), kill_process, "quit requested");

        // The last destroy already finished the quit; still set means
        // nothing was live to drain.
        if self.records.is_empty() && self.is_quitting() {
            if kill_process {
                self.terminate_all();
            }
            self.finish_quit();
        }
        destroyed
    }

    /// A quit is waiting on bound services to drain.
    pub(crate) fn is_quitting(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }

    /// Services whose last start asked to be recreated after a kill.
    pub fn self_launch_services(&self) -> Vec<ComponentName> {
        self.records
            .iter()
            .filter(|entry| entry.is_self_launch())
            .map(|entry| entry.component().clone())
            .collect()
    }

    pub fn records(&self) -> Vec<Arc<ServiceRecord>> {
        self.records.iter().map(|entry| entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tear down a record whose own callback failed.
    fn fail(&self, record: &Arc<ServiceRecord>) {
        if record.advance(ServiceState::Destroyed) {
            record.with_instance(|service| service.on_destroy());
        }
        self.remove(record);
        warn!(service = %record.component(), "service torn down after failure");
        self.stop_proxy_if_idle(record.proxy().as_ref());
        if self.records.is_empty() && self.is_quitting() {
            self.finish_quit();
        }
    }

    fn terminate_all(&self) {
        for entry in self.proxies.iter() {
            info!(proxy = %entry.key(), "nothing to drain, terminating process");
            entry.value().stop_self();
            entry.value().kill_process();
        }
    }

    fn finish_quit(&self) {
        self.quit_requested.store(false, Ordering::SeqCst);
        self.kill_on_quit.store(false, Ordering::SeqCst);
        debug!("quit drained");
    }

    fn remove(&self, record: &Arc<ServiceRecord>) {
        let component = record.component();
        self.records.remove_if(&record_key(&component.package, &component.class), |_, live| {
            Arc::ptr_eq(live, record)
        });
    }

    fn stop_proxy_if_idle(&self, proxy: &dyn ServiceHost) {
        let busy = self
            .records
            .iter()
            .any(|entry| entry.proxy().component() == proxy.component());
        if busy {
            return;
        }
        debug!(proxy = %proxy.component(), "proxy idle, stopping");
        proxy.stop_self();
        if self.kill_on_quit.load(Ordering::SeqCst) {
            info!(proxy = %proxy.component(), "terminating process");
            proxy.kill_process();
        }
    }

    fn require(&self, package: &str, class: &str) -> Result<Arc<ServiceRecord>, PluginError> {
        self.resolve(package, class)
            .ok_or_else(|| PluginError::ComponentNotFound(record_key(package, class)))
    }

    fn report(&self, package: &str, err: &PluginError) {
        error!(plugin = %package, code = %err.code(), error = %err, "service failure");
        self.errors
            .deliver(false, package, err.code(), &err.to_string());
    }
}
