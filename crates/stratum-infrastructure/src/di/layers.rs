//! Layer bootstrapper
//!
//! Three layers, constructed strictly in order: Infrastructure registers
//! repositories, Domain registers providers and services that may depend on
//! infrastructure tokens, Application registers entry-point handlers that
//! may depend on domain tokens. Registration is idempotent; an
//! already-bound token keeps its existing (possibly cached) binding.
//!
//! After registering, each layer eagerly resolves every declared
//! constructor. A count mismatch fails the whole bootstrap with a
//! `LAYER_RESOLUTION` error naming the layer and the expected-vs-resolved
//! counts; partial registration is never silently tolerated.

use std::fmt;

use tracing::{debug, info};

use stratum_domain::error::{Error, Result};

use super::registry::{FactoryFn, Lifecycle, ServiceRegistry};

/// The three bootstrap layers, in construction order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Infrastructure,
    Domain,
    Application,
}

impl Layer {
    /// Layer name as reported in errors
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Infrastructure => "Infrastructure",
            Self::Domain => "Domain",
            Self::Application => "Application",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared constructor: token, explicit dependency list, factory
#[derive(Clone)]
pub struct ConstructorSpec {
    token: String,
    dependencies: Vec<String>,
    factory: FactoryFn,
}

impl ConstructorSpec {
    /// Constructor with no declared dependencies
    pub fn new<T, F>(token: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            token: token.into(),
            dependencies: Vec::new(),
            factory: ServiceRegistry::erase(factory),
        }
    }

    /// Constructor with an explicit ordered dependency list
    pub fn with_dependencies<T, F>(
        token: impl Into<String>,
        dependencies: &[&str],
        factory: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            token: token.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            factory: ServiceRegistry::erase(factory),
        }
    }

    /// Registration token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Declared dependencies
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Debug for ConstructorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorSpec")
            .field("token", &self.token)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Constructors declared for one layer
#[derive(Debug, Clone)]
pub struct LayerPlan {
    layer: Layer,
    constructors: Vec<ConstructorSpec>,
}

impl LayerPlan {
    /// Empty plan for a layer
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            constructors: Vec::new(),
        }
    }

    /// Add a constructor, builder style
    pub fn with_constructor(mut self, spec: ConstructorSpec) -> Self {
        self.constructors.push(spec);
        self
    }

    /// Add a constructor
    pub fn push(&mut self, spec: ConstructorSpec) {
        self.constructors.push(spec);
    }

    /// Layer this plan belongs to
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Number of declared constructors
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

/// Outcome of one layer's bootstrap
#[derive(Debug, Clone, Copy)]
pub struct LayerReport {
    /// Layer that was bootstrapped
    pub layer: Layer,
    /// Constructors the plan declared
    pub declared: usize,
    /// Constructors newly registered (declared minus skipped)
    pub registered: usize,
    /// Tokens skipped because they were already bound
    pub skipped: usize,
}

/// Register and validate one layer
///
/// Registration skips already-bound tokens, so re-bootstrapping a layer
/// never clobbers an existing cached instance. The validation pass then
/// resolves every declared constructor eagerly.
pub fn bootstrap_layer(registry: &ServiceRegistry, plan: &LayerPlan) -> Result<LayerReport> {
    let mut skipped = 0usize;
    for spec in &plan.constructors {
        if registry.contains(spec.token()) {
            debug!(layer = %plan.layer, token = spec.token(), "token already bound; skipping re-registration");
            skipped += 1;
            continue;
        }
        registry.bind_erased(
            spec.token(),
            Lifecycle::Singleton,
            spec.dependencies.clone(),
            spec.factory.clone(),
        );
    }

    let declared = plan.constructors.len();
    let mut resolved = 0usize;
    let mut failures = Vec::new();
    for spec in &plan.constructors {
        match registry.resolve_raw(spec.token()) {
            Ok(_) => resolved += 1,
            Err(err) => failures.push(serde_json::json!({
                "token": spec.token(),
                "error": err.to_string(),
            })),
        }
    }

    if resolved != declared {
        return Err(Error::layer_resolution(plan.layer.as_str(), "bootstrap", declared, resolved)
            .with_metadata(serde_json::json!({
                "layer": plan.layer.as_str(),
                "operation": "bootstrap",
                "expected": declared,
                "resolved": resolved,
                "failures": failures,
            }))
            .with_component("bootstrapper")
            .with_operation("bootstrap_layer"));
    }

    let report = LayerReport {
        layer: plan.layer,
        declared,
        registered: declared - skipped,
        skipped,
    };
    info!(
        layer = %plan.layer,
        declared,
        registered = report.registered,
        skipped,
        "layer bootstrapped"
    );
    Ok(report)
}

/// Bootstrap all three layers in their fixed order
///
/// No layer begins before its predecessor's validation pass completes.
pub fn bootstrap_layers(
    registry: &ServiceRegistry,
    infrastructure: &LayerPlan,
    domain: &LayerPlan,
    application: &LayerPlan,
) -> Result<[LayerReport; 3]> {
    let infra = bootstrap_layer(registry, infrastructure)?;
    let domain = bootstrap_layer(registry, domain)?;
    let app = bootstrap_layer(registry, application)?;
    Ok([infra, domain, app])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stratum_domain::ErrorKind;

    struct Repo;
    struct Service(#[allow(dead_code)] Arc<Repo>);

    #[test]
    fn layers_resolve_in_order() {
        let registry = ServiceRegistry::new();
        let infrastructure = LayerPlan::new(Layer::Infrastructure)
            .with_constructor(ConstructorSpec::new("repo", |_| Ok(Repo)));
        let domain = LayerPlan::new(Layer::Domain).with_constructor(
            ConstructorSpec::with_dependencies("service", &["repo"], |r| {
                Ok(Service(r.resolve::<Repo>("repo")?))
            }),
        );
        let application = LayerPlan::new(Layer::Application);

        let reports = bootstrap_layers(&registry, &infrastructure, &domain, &application).unwrap();
        assert_eq!(reports[0].declared, 1);
        assert_eq!(reports[1].declared, 1);
        assert_eq!(reports[2].declared, 0);
        assert!(registry.resolve::<Service>("service").is_ok());
    }

    #[test]
    fn count_mismatch_reports_expected_and_resolved() {
        let registry = ServiceRegistry::new();
        let application = LayerPlan::new(Layer::Application)
            .with_constructor(ConstructorSpec::new("route-a", |_| Ok(Repo)))
            .with_constructor(ConstructorSpec::new("route-b", |_| Ok(Repo)))
            .with_constructor(ConstructorSpec::with_dependencies(
                "route-c",
                &["missing-service"],
                |_| Ok(Repo),
            ));

        let err = bootstrap_layer(&registry, &application).unwrap_err();
        assert_eq!(err.kind, ErrorKind::LayerResolution);
        assert!(err.message.contains("expected=3"));
        assert!(err.message.contains("resolved=2"));
        let failures = &err.metadata.as_ref().unwrap()["failures"];
        assert_eq!(failures.as_array().unwrap().len(), 1);
        assert_eq!(failures[0]["token"], "route-c");
    }

    #[test]
    fn rebootstrap_keeps_the_cached_singleton() {
        let registry = ServiceRegistry::new();
        let plan = LayerPlan::new(Layer::Infrastructure)
            .with_constructor(ConstructorSpec::new("repo", |_| Ok(Repo)));

        bootstrap_layer(&registry, &plan).unwrap();
        let first = registry.resolve::<Repo>("repo").unwrap();

        let report = bootstrap_layer(&registry, &plan).unwrap();
        assert_eq!(report.skipped, 1);
        let second = registry.resolve::<Repo>("repo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
