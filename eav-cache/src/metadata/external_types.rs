//! Application type <-> scheme registry.
//!
//! Deserializing an object into a concrete application type needs to know
//! which type a scheme id stands for. The registry is filled once per domain
//! by scanning the application's types for the [`ExternalType`] marker and
//! resolving each declared scheme name through the metadata provider.
//!
//! The registry is independent of cache enablement: disabling the metadata
//! cache leaves it intact, only a full reset clears it.

use async_trait::async_trait;
use eav_core::{EavResult, MetadataError, Scheme, SchemeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Marker for application types stored as EAV objects.
pub trait ExternalType {
    /// Name of the scheme the type is persisted under.
    const SCHEME_NAME: &'static str;
}

/// One application type offered to the registry scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTypeDescriptor {
    pub type_name: String,
    /// Scheme name from the marker; `None` for unmarked types.
    pub scheme_name: Option<String>,
}

impl ExternalTypeDescriptor {
    /// Describe a marked type.
    pub fn of<T: ExternalType>() -> Self {
        Self {
            type_name: std::any::type_name::<T>().to_string(),
            scheme_name: Some(T::SCHEME_NAME.to_string()),
        }
    }

    /// Describe a type that carries no marker. The scan ignores it.
    pub fn unmarked(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            scheme_name: None,
        }
    }

    /// Describe a type by explicit names.
    pub fn named(type_name: impl Into<String>, scheme_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            scheme_name: Some(scheme_name.into()),
        }
    }
}

/// Source of the application types available for registration.
pub trait TypeCatalog: Send + Sync {
    fn types(&self) -> Vec<ExternalTypeDescriptor>;
}

impl TypeCatalog for Vec<ExternalTypeDescriptor> {
    fn types(&self) -> Vec<ExternalTypeDescriptor> {
        self.clone()
    }
}

impl TypeCatalog for [ExternalTypeDescriptor] {
    fn types(&self) -> Vec<ExternalTypeDescriptor> {
        self.to_vec()
    }
}

/// Metadata lookups the cache needs from the database layer.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch a scheme by name. `Ok(None)` means the scheme does not exist.
    async fn scheme_by_name(&self, name: &str) -> EavResult<Option<Scheme>>;
}

/// A resolved application type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTypeBinding {
    pub type_name: String,
    pub scheme_id: SchemeId,
    pub scheme_name: String,
}

/// Outcome of a registry scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Types bound to a scheme by this scan.
    pub registered: usize,
    /// Marked types that could not be bound.
    pub skipped: usize,
    /// True when an earlier scan had already filled the registry.
    pub already_initialized: bool,
}

#[derive(Debug, Default)]
struct Bindings {
    by_scheme_name: HashMap<String, ExternalTypeBinding>,
    by_scheme_id: HashMap<SchemeId, ExternalTypeBinding>,
    scheme_by_type: HashMap<String, SchemeId>,
}

impl Bindings {
    fn insert(&mut self, binding: ExternalTypeBinding) -> Result<(), MetadataError> {
        if let Some(existing) = self.by_scheme_id.get(&binding.scheme_id) {
            if existing.type_name != binding.type_name {
                return Err(MetadataError::AlreadyRegistered {
                    scheme_id: binding.scheme_id,
                    type_name: existing.type_name.clone(),
                });
            }
        }

        // Rebinding a type to a different scheme drops the old scheme's entries
        if let Some(old_scheme) = self.scheme_by_type.get(&binding.type_name).copied() {
            if old_scheme != binding.scheme_id {
                self.remove_scheme(old_scheme);
            }
        }

        self.scheme_by_type
            .insert(binding.type_name.clone(), binding.scheme_id);
        self.by_scheme_name
            .insert(binding.scheme_name.clone(), binding.clone());
        self.by_scheme_id.insert(binding.scheme_id, binding);
        Ok(())
    }

    fn remove_scheme(&mut self, scheme_id: SchemeId) -> Option<ExternalTypeBinding> {
        let binding = self.by_scheme_id.remove(&scheme_id)?;
        self.scheme_by_type.remove(&binding.type_name);
        if self
            .by_scheme_name
            .get(&binding.scheme_name)
            .is_some_and(|b| b.scheme_id == scheme_id)
        {
            self.by_scheme_name.remove(&binding.scheme_name);
        }
        Some(binding)
    }
}

/// Three-way mapping between application types and schemes.
#[derive(Debug, Default)]
pub struct ExternalTypeRegistry {
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
    bindings: RwLock<Bindings>,
}

impl ExternalTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Scan `catalog` and bind every marked type to its scheme.
    ///
    /// Runs at most once until [`ExternalTypeRegistry::reset`]. Concurrent
    /// callers wait for the first scan and then return without rescanning.
    /// A type whose scheme is missing or whose lookup fails is logged and
    /// skipped; the rest of the scan proceeds.
    pub async fn initialize<C, P>(&self, catalog: &C, provider: &P) -> ScanReport
    where
        C: TypeCatalog + ?Sized,
        P: MetadataProvider + ?Sized,
    {
        if self.is_initialized() {
            return ScanReport {
                already_initialized: true,
                ..Default::default()
            };
        }

        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return ScanReport {
                already_initialized: true,
                ..Default::default()
            };
        }

        let mut report = ScanReport::default();
        for descriptor in catalog.types() {
            let Some(scheme_name) = descriptor.scheme_name else {
                continue;
            };

            let scheme = match provider.scheme_by_name(&scheme_name).await {
                Ok(Some(scheme)) => scheme,
                Ok(None) => {
                    tracing::warn!(
                        type_name = %descriptor.type_name,
                        scheme_name = %scheme_name,
                        "Scheme not found, skipping external type"
                    );
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        type_name = %descriptor.type_name,
                        scheme_name = %scheme_name,
                        error = %e,
                        "Scheme lookup failed, skipping external type"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let binding = ExternalTypeBinding {
                type_name: descriptor.type_name,
                scheme_id: scheme.id,
                scheme_name: scheme.name,
            };
            match self.bindings.write().insert(binding) {
                Ok(()) => report.registered += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Conflicting external type, skipping");
                    report.skipped += 1;
                }
            }
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            registered = report.registered,
            skipped = report.skipped,
            "External type registry initialized"
        );
        report
    }

    /// Bind a type outside of the bootstrap scan.
    pub fn register(
        &self,
        type_name: impl Into<String>,
        scheme: &Scheme,
    ) -> Result<(), MetadataError> {
        self.bindings.write().insert(ExternalTypeBinding {
            type_name: type_name.into(),
            scheme_id: scheme.id,
            scheme_name: scheme.name.clone(),
        })
    }

    /// Application type stored under `scheme_id`.
    pub fn resolve_type_by_scheme(&self, scheme_id: SchemeId) -> Option<ExternalTypeBinding> {
        self.bindings.read().by_scheme_id.get(&scheme_id).cloned()
    }

    /// Application type stored under the scheme called `scheme_name`.
    pub fn resolve_type_by_scheme_name(&self, scheme_name: &str) -> Option<ExternalTypeBinding> {
        self.bindings.read().by_scheme_name.get(scheme_name).cloned()
    }

    /// Scheme an application type is stored under.
    pub fn resolve_scheme_by_type(&self, type_name: &str) -> Option<SchemeId> {
        self.bindings.read().scheme_by_type.get(type_name).copied()
    }

    /// Drop the binding for a scheme, e.g. after the scheme was altered.
    pub fn remove_scheme(&self, scheme_id: SchemeId) -> Option<ExternalTypeBinding> {
        self.bindings.write().remove_scheme(scheme_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.read().by_scheme_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wipe all bindings and allow the next `initialize` to scan again.
    pub fn reset(&self) {
        *self.bindings.write() = Bindings::default();
        self.initialized.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eav_core::EavError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct Invoice;
    impl ExternalType for Invoice {
        const SCHEME_NAME: &'static str = "Invoice";
    }

    struct Customer;
    impl ExternalType for Customer {
        const SCHEME_NAME: &'static str = "Customer";
    }

    #[derive(Default)]
    struct StaticProvider {
        schemes: HashMap<String, Scheme>,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn with(mut self, scheme: Scheme) -> Self {
            self.schemes.insert(scheme.name.clone(), scheme);
            self
        }

        fn failing_on(mut self, name: &str) -> Self {
            self.failing.push(name.to_string());
            self
        }
    }

    #[async_trait]
    impl MetadataProvider for StaticProvider {
        async fn scheme_by_name(&self, name: &str) -> EavResult<Option<Scheme>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|f| f == name) {
                return Err(EavError::from(MetadataError::LookupFailed {
                    name: name.to_string(),
                    reason: "boom".to_string(),
                }));
            }
            Ok(self.schemes.get(name).cloned())
        }
    }

    #[tokio::test]
    async fn test_scan_registers_marked_types() {
        let registry = ExternalTypeRegistry::new();
        let provider = StaticProvider::default()
            .with(Scheme::new(1, "Invoice"))
            .with(Scheme::new(2, "Customer"));
        let catalog = vec![
            ExternalTypeDescriptor::of::<Invoice>(),
            ExternalTypeDescriptor::of::<Customer>(),
            ExternalTypeDescriptor::unmarked("Helper"),
        ];

        let report = registry.initialize(&catalog, &provider).await;

        assert_eq!(report.registered, 2);
        assert_eq!(report.skipped, 0);
        assert!(registry.is_initialized());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let invoice = std::any::type_name::<Invoice>();
        assert_eq!(registry.resolve_scheme_by_type(invoice), Some(1));
        assert_eq!(registry.resolve_type_by_scheme(1).unwrap().type_name, invoice);
        assert_eq!(
            registry.resolve_type_by_scheme_name("Customer").unwrap().scheme_id,
            2
        );
    }

    #[tokio::test]
    async fn test_scan_skips_failures_and_continues() {
        let registry = ExternalTypeRegistry::new();
        let provider = StaticProvider::default()
            .with(Scheme::new(2, "Customer"))
            .failing_on("Broken");
        let catalog = vec![
            ExternalTypeDescriptor::named("Broken", "Broken"),
            ExternalTypeDescriptor::named("Ghost", "DoesNotExist"),
            ExternalTypeDescriptor::of::<Customer>(),
        ];

        let report = registry.initialize(&catalog, &provider).await;

        assert_eq!(report.registered, 1);
        assert_eq!(report.skipped, 2);
        assert!(registry.resolve_type_by_scheme(2).is_some());
        assert!(registry.resolve_scheme_by_type("Broken").is_none());
    }

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let registry = ExternalTypeRegistry::new();
        let provider = StaticProvider::default().with(Scheme::new(1, "Invoice"));
        let catalog = vec![ExternalTypeDescriptor::of::<Invoice>()];

        registry.initialize(&catalog, &provider).await;
        let second = registry.initialize(&catalog, &provider).await;

        assert!(second.already_initialized);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_scans_once() {
        let registry = Arc::new(ExternalTypeRegistry::new());
        let provider = Arc::new(StaticProvider::default().with(Scheme::new(1, "Invoice")));
        let catalog = Arc::new(vec![ExternalTypeDescriptor::of::<Invoice>()]);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let provider = Arc::clone(&provider);
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move { registry.initialize(&*catalog, &*provider).await })
            })
            .collect();

        let mut registered = 0;
        for task in tasks {
            registered += task.await.unwrap().registered;
        }

        assert_eq!(registered, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_allows_rescan() {
        let registry = ExternalTypeRegistry::new();
        let provider = StaticProvider::default().with(Scheme::new(1, "Invoice"));
        let catalog = vec![ExternalTypeDescriptor::of::<Invoice>()];

        registry.initialize(&catalog, &provider).await;
        registry.reset();
        assert!(!registry.is_initialized());
        assert!(registry.is_empty());

        let report = registry.initialize(&catalog, &provider).await;
        assert_eq!(report.registered, 1);
    }

    #[test]
    fn test_register_conflict_rejected() {
        let registry = ExternalTypeRegistry::new();
        let scheme = Scheme::new(5, "Order");

        registry.register("app::Order", &scheme).unwrap();
        registry.register("app::Order", &scheme).unwrap();
        let err = registry.register("app::OtherOrder", &scheme).unwrap_err();

        assert!(matches!(err, MetadataError::AlreadyRegistered { scheme_id: 5, .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_scheme_clears_all_directions() {
        let registry = ExternalTypeRegistry::new();
        registry.register("app::Order", &Scheme::new(5, "Order")).unwrap();

        let removed = registry.remove_scheme(5).unwrap();
        assert_eq!(removed.type_name, "app::Order");
        assert!(registry.resolve_type_by_scheme(5).is_none());
        assert!(registry.resolve_type_by_scheme_name("Order").is_none());
        assert!(registry.resolve_scheme_by_type("app::Order").is_none());
    }

    #[test]
    fn test_rebinding_type_moves_scheme() {
        let registry = ExternalTypeRegistry::new();
        registry.register("app::Order", &Scheme::new(5, "Order")).unwrap();
        registry.register("app::Order", &Scheme::new(6, "OrderV2")).unwrap();

        assert_eq!(registry.resolve_scheme_by_type("app::Order"), Some(6));
        assert!(registry.resolve_type_by_scheme(5).is_none());
        assert_eq!(registry.len(), 1);
    }
}
