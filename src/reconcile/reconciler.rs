//! Endpoint reconciliation.
//!
//! Each pass reads the whole configuration tree, merges defaults, resolves
//! certificates and diffs the result against the bindings of the previous
//! pass. A pass is prepared without touching any state and committed only
//! when every endpoint resolved; an error leaves bindings and the default
//! certificate as they were.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::certificates::{
    CertificateResolver, CertificateStore, DefaultCertificate, DeveloperCertificateLocator, ServerCertificate,
};
use crate::config::schema::{ConfigurationReader, EndpointDeclaration, DEFAULT_CERTIFICATE_NAME};
use crate::config::{ConfigTree, HostEnvironment};
use crate::error::ReconcileError;
use crate::net::{
    parse_url, BindingSummary, EndpointConfiguration, HttpsOptions, ListenOptions, SniCertificateSelector, SniOptions,
};
use crate::observability::metrics;
use crate::reconcile::builder::EndpointBuilder;
use crate::reconcile::state::DefaultCertificateState;

/// Runs for every binding before its own settings apply.
pub type EndpointDefaultsCallback = Box<dyn Fn(&mut ListenOptions) + Send + Sync>;

/// Runs for every TLS binding before its certificate is resolved.
pub type HttpsDefaultsCallback = Box<dyn Fn(&mut HttpsOptions) + Send + Sync>;

/// Bindings to tear down and bring up after a pass.
#[derive(Debug, Clone, Default)]
pub struct ReloadPlan {
    pub stopped: Vec<Arc<ListenOptions>>,
    pub started: Vec<Arc<ListenOptions>>,
}

impl ReloadPlan {
    pub fn is_empty(&self) -> bool {
        self.stopped.is_empty() && self.started.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            stopped: self.stopped.iter().map(|b| b.describe()).collect(),
            started: self.started.iter().map(|b| b.describe()).collect(),
        }
    }
}

/// Serializable form of a [`ReloadPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub stopped: Vec<BindingSummary>,
    pub started: Vec<BindingSummary>,
}

struct Loader {
    config: ConfigTree,
    builder: EndpointBuilder,
    loaded: bool,
}

impl Loader {
    fn new(config: ConfigTree) -> Self {
        Self {
            config,
            builder: EndpointBuilder::new(),
            loaded: false,
        }
    }
}

/// A prepared, not yet committed pass.
struct Pass {
    default: Option<Arc<DefaultCertificate>>,
    config_backed: Vec<Arc<ListenOptions>>,
    code_backed: Vec<Arc<ListenOptions>>,
    stopped: Vec<Arc<ListenOptions>>,
    started: Vec<Arc<ListenOptions>>,
}

/// Computes which bindings to start and stop as configuration changes.
///
/// Reloads are not serialized internally; callers drive one pass at a time.
///
/// Code-backed bindings are materialised once. A binding that called
/// `use_https()` keeps the default certificate installed at that time and is
/// never rebound when the default later changes; only configuration-backed
/// endpoints follow the default across reloads.
pub struct Reconciler {
    loader: Loader,
    resolver: CertificateResolver,
    default_certificate: Arc<DefaultCertificateState>,
    endpoint_defaults: Option<EndpointDefaultsCallback>,
    https_defaults: Option<HttpsDefaultsCallback>,
    config_backed: Vec<Arc<ListenOptions>>,
    code_backed: Vec<Arc<ListenOptions>>,
}

impl Reconciler {
    pub fn new(config: ConfigTree, environment: HostEnvironment) -> Self {
        Self {
            loader: Loader::new(config),
            resolver: CertificateResolver::new(environment),
            default_certificate: Arc::new(DefaultCertificateState::new()),
            endpoint_defaults: None,
            https_defaults: None,
            config_backed: Vec::new(),
            code_backed: Vec::new(),
        }
    }

    pub fn with_certificate_store(mut self, store: Arc<dyn CertificateStore>) -> Self {
        self.resolver.set_store(store);
        self
    }

    pub fn with_developer_certificate_locator(mut self, locator: DeveloperCertificateLocator) -> Self {
        self.resolver.set_locator(locator);
        self
    }

    /// Replace the loader with one reading `config`.
    ///
    /// Registrations not yet applied are discarded and the next `load()` runs again.
    pub fn configure(&mut self, config: ConfigTree) -> &mut EndpointBuilder {
        let discarded = self.loader.builder.pending_count();
        if discarded > 0 {
            tracing::debug!(discarded, "Loader replaced, discarding pending registrations");
        }
        self.loader = Loader::new(config);
        &mut self.loader.builder
    }

    /// Registration surface of the current loader.
    pub fn endpoints(&mut self) -> &mut EndpointBuilder {
        &mut self.loader.builder
    }

    pub fn configure_endpoint_defaults<F>(&mut self, configure: F) -> &mut Self
    where
        F: Fn(&mut ListenOptions) + Send + Sync + 'static,
    {
        self.endpoint_defaults = Some(Box::new(configure));
        self
    }

    pub fn configure_https_defaults<F>(&mut self, configure: F) -> &mut Self
    where
        F: Fn(&mut HttpsOptions) + Send + Sync + 'static,
    {
        self.https_defaults = Some(Box::new(configure));
        self
    }

    /// Swap in a new configuration tree for the next pass, keeping registrations.
    pub fn update_configuration(&mut self, config: ConfigTree) {
        self.loader.config = config;
    }

    pub fn configuration(&self) -> &ConfigTree {
        &self.loader.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loader.loaded
    }

    /// Run the first pass and apply programmatic registrations.
    ///
    /// A no-op once it has succeeded for the current loader.
    pub fn load(&mut self) -> Result<(), ReconcileError> {
        if self.loader.loaded {
            return Ok(());
        }
        self.run(true)?;
        self.loader.loaded = true;
        Ok(())
    }

    /// Re-read the configuration and return the bindings to stop and start.
    ///
    /// After the first load, registrations made since are applied as well.
    pub fn reload(&mut self) -> Result<ReloadPlan, ReconcileError> {
        let apply_pending = self.loader.loaded;
        self.run(apply_pending)
    }

    /// Every current binding, configuration-backed first.
    pub fn bindings(&self) -> impl Iterator<Item = &Arc<ListenOptions>> {
        self.config_backed.iter().chain(self.code_backed.iter())
    }

    pub fn config_bindings(&self) -> &[Arc<ListenOptions>] {
        &self.config_backed
    }

    pub fn code_bindings(&self) -> &[Arc<ListenOptions>] {
        &self.code_backed
    }

    pub fn default_certificate(&self) -> Option<Arc<DefaultCertificate>> {
        self.default_certificate.current()
    }

    /// Shared handle on the default certificate slot.
    pub fn default_certificate_state(&self) -> Arc<DefaultCertificateState> {
        Arc::clone(&self.default_certificate)
    }

    fn run(&mut self, apply_pending: bool) -> Result<ReloadPlan, ReconcileError> {
        match self.prepare(apply_pending) {
            Ok(pass) => Ok(self.commit(pass)),
            Err(e) => {
                metrics::record_reload_failure();
                Err(e)
            }
        }
    }

    fn prepare(&mut self, apply_pending: bool) -> Result<Pass, ReconcileError> {
        let reader = ConfigurationReader::read(&self.loader.config)?;
        validate_certificate_references(&reader)?;

        let default = self
            .resolver
            .load_default(reader.default_certificate(), reader.development_certificate())
            .map_err(|e| ReconcileError::certificate(DEFAULT_CERTIFICATE_NAME, e))?
            .map(Arc::new);
        let default_changed = self.default_certificate.differs_from(default.as_deref());
        if default_changed {
            tracing::debug!("Default certificate changed, endpoints using it will rebind");
        }

        let mut carried = self.config_backed.clone();
        let mut config_backed = Vec::with_capacity(reader.endpoints.len());
        let mut started = Vec::new();

        for mut declaration in reader.endpoints {
            declaration.merge_defaults(&reader.endpoint_defaults);

            let matched = carried.iter().position(|previous| {
                previous
                    .declaration()
                    .is_some_and(|p| declaration.is_same_endpoint(p))
                    && !(default_changed && previous.uses_default_certificate())
            });
            if let Some(index) = matched {
                tracing::debug!(endpoint = %declaration.name, "Endpoint unchanged, keeping binding");
                config_backed.push(carried.remove(index));
                continue;
            }

            let binding = Arc::new(self.build_endpoint(declaration, default.as_deref())?);
            config_backed.push(Arc::clone(&binding));
            started.push(binding);
        }

        let code_backed = if apply_pending {
            self.apply_pending(default.as_deref())?
        } else {
            Vec::new()
        };
        started.extend(code_backed.iter().cloned());

        Ok(Pass {
            default,
            config_backed,
            code_backed,
            stopped: carried,
            started,
        })
    }

    fn commit(&mut self, pass: Pass) -> ReloadPlan {
        self.default_certificate.replace(pass.default);
        self.config_backed = pass.config_backed;
        self.code_backed.extend(pass.code_backed);

        for binding in &pass.stopped {
            tracing::info!(
                endpoint = %binding.display_name(),
                address = %binding.address(),
                "Stopping endpoint"
            );
        }
        for binding in &pass.started {
            tracing::info!(
                endpoint = %binding.display_name(),
                address = %binding.address(),
                protocols = %binding.protocols,
                tls = binding.is_tls(),
                "Starting endpoint"
            );
        }

        let bound = self.config_backed.len() + self.code_backed.len();
        metrics::record_reload(pass.started.len(), pass.stopped.len(), bound);
        tracing::debug!(
            started = pass.started.len(),
            stopped = pass.stopped.len(),
            bound,
            "Reconciliation complete"
        );

        ReloadPlan {
            stopped: pass.stopped,
            started: pass.started,
        }
    }

    fn build_endpoint(
        &mut self,
        declaration: EndpointDeclaration,
        default: Option<&DefaultCertificate>,
    ) -> Result<ListenOptions, ReconcileError> {
        let parsed = parse_url(&declaration.url).map_err(|source| ReconcileError::Address {
            endpoint: declaration.name.clone(),
            source,
        })?;
        let is_https = parsed.is_https();

        let mut options = ListenOptions::new(parsed.address);
        if let Some(configure) = &self.endpoint_defaults {
            configure(&mut options);
        }
        if let Some(protocols) = declaration.protocols {
            options.protocols = protocols;
        }

        let mut https = HttpsOptions::default();
        let mut sni_uses_default = false;
        if is_https {
            if let Some(configure) = &self.https_defaults {
                configure(&mut https);
            }
            if let Some(ssl_protocols) = declaration.ssl_protocols {
                https.ssl_protocols = ssl_protocols;
            }
            if let Some(mode) = declaration.client_certificate_mode {
                https.client_certificate_mode = mode;
            }

            let explicit = self
                .resolver
                .resolve(declaration.certificate.as_ref(), &declaration.name)
                .map_err(|e| ReconcileError::certificate(&declaration.name, e))?;
            if let Some(certificate) = &explicit {
                https.server_certificate = Some(Arc::clone(certificate));
            }

            if !declaration.sni.is_empty() {
                let (selector, uses_default) = self.build_sni_selector(&declaration, explicit.as_ref(), default)?;
                https.server_certificate_selector = Some(Arc::new(selector));
                sni_uses_default = uses_default;
            }
        }

        if let Some(callback) = self.loader.builder.callback_mut(&declaration.name) {
            tracing::debug!(endpoint = %declaration.name, "Invoking endpoint configuration callback");
            let mut view = EndpointConfiguration::new(
                &declaration.name,
                is_https,
                &mut options,
                &mut https,
                declaration.config_section(),
            );
            callback(&mut view);
        }

        if is_https && options.https_options().is_none() {
            options.attach_https(https);
        }
        let uses_default = finalize_https(&mut options, self.https_defaults.as_ref(), default, &declaration.name)?;
        options.set_uses_default_certificate(uses_default || sni_uses_default);

        if declaration.inherited().any() {
            tracing::debug!(
                endpoint = %declaration.name,
                inherited = ?declaration.inherited(),
                "Endpoint inherits endpoint defaults"
            );
        }
        options.set_declaration(declaration);
        Ok(options)
    }

    fn build_sni_selector(
        &self,
        declaration: &EndpointDeclaration,
        endpoint_certificate: Option<&Arc<ServerCertificate>>,
        default: Option<&DefaultCertificate>,
    ) -> Result<(SniCertificateSelector, bool), ReconcileError> {
        let mut uses_default = false;
        let mut entries = Vec::with_capacity(declaration.sni.len());

        for sni in &declaration.sni {
            let label = format!("{}:Sni:{}", declaration.name, sni.host);
            let explicit = self
                .resolver
                .resolve(sni.certificate.as_ref(), &label)
                .map_err(|e| ReconcileError::certificate(&label, e))?;

            let certificate = match (explicit, endpoint_certificate, default) {
                (Some(certificate), _, _) => certificate,
                (None, Some(certificate), _) => Arc::clone(certificate),
                (None, None, Some(default)) => {
                    uses_default = true;
                    Arc::clone(&default.certificate)
                }
                (None, None, None) => {
                    return Err(ReconcileError::MissingSniCertificate {
                        endpoint: declaration.name.clone(),
                        host: sni.host.to_string(),
                    })
                }
            };

            entries.push((
                sni.host.clone(),
                SniOptions {
                    certificate,
                    protocols: sni.protocols.or(declaration.protocols).unwrap_or_default(),
                    ssl_protocols: sni.ssl_protocols.or(declaration.ssl_protocols).unwrap_or_default(),
                    client_certificate_mode: sni
                        .client_certificate_mode
                        .or(declaration.client_certificate_mode)
                        .unwrap_or_default(),
                },
            ));
        }

        Ok((SniCertificateSelector::new(entries), uses_default))
    }

    /// Materialise programmatic registrations. On failure they are kept for the next pass.
    fn apply_pending(&mut self, default: Option<&DefaultCertificate>) -> Result<Vec<Arc<ListenOptions>>, ReconcileError> {
        let mut pending = self.loader.builder.take_pending();
        let endpoint_defaults = self.endpoint_defaults.as_ref();
        let https_defaults = self.https_defaults.as_ref();

        let built = pending
            .iter_mut()
            .map(|item| -> Result<Arc<ListenOptions>, ReconcileError> {
                if !item.prepared {
                    if let Some(configure) = endpoint_defaults {
                        configure(&mut item.options);
                    }
                    if let Some(configure) = item.configure.take() {
                        configure(&mut item.options);
                    }
                    item.prepared = true;
                }
                let mut options = item.options.clone();
                let label = options.display_name();
                let uses_default = finalize_https(&mut options, https_defaults, default, &label)?;
                options.set_uses_default_certificate(uses_default);
                Ok(Arc::new(options))
            })
            .collect::<Result<Vec<_>, _>>();

        if built.is_err() {
            self.loader.builder.restore_pending(pending);
        }
        built
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("loaded", &self.loader.loaded)
            .field("builder", &self.loader.builder)
            .field("resolver", &self.resolver)
            .field("default_certificate", &self.default_certificate)
            .field("config_backed", &self.config_backed.len())
            .field("code_backed", &self.code_backed.len())
            .finish()
    }
}

/// Reject malformed certificate entries before any endpoint is built.
fn validate_certificate_references(reader: &ConfigurationReader) -> Result<(), ReconcileError> {
    for declaration in &reader.endpoints {
        if let Some(certificate) = &declaration.certificate {
            certificate
                .reference(&declaration.name)
                .map_err(|e| ReconcileError::certificate(&declaration.name, e))?;
        }
        for sni in &declaration.sni {
            if let Some(certificate) = &sni.certificate {
                let label = format!("{}:Sni:{}", declaration.name, sni.host);
                certificate
                    .reference(&label)
                    .map_err(|e| ReconcileError::certificate(&label, e))?;
            }
        }
    }
    Ok(())
}

/// Attach requested TLS and enforce that it has a certificate source.
///
/// Falls back to the default certificate; returns whether the binding serves it.
fn finalize_https(
    options: &mut ListenOptions,
    https_defaults: Option<&HttpsDefaultsCallback>,
    default: Option<&DefaultCertificate>,
    endpoint: &str,
) -> Result<bool, ReconcileError> {
    if options.https_requested() {
        let mut https = HttpsOptions::default();
        if let Some(configure) = https_defaults {
            configure(&mut https);
        }
        options.attach_https(https);
    }

    let Some(https) = options.https_mut() else {
        return Ok(false);
    };
    if !https.has_certificate_source() {
        let default = default.ok_or_else(|| ReconcileError::MissingCertificate {
            endpoint: endpoint.to_string(),
        })?;
        https.server_certificate = Some(Arc::clone(&default.certificate));
    }

    Ok(match (default, &https.server_certificate) {
        (Some(default), Some(certificate)) => Arc::ptr_eq(&default.certificate, certificate),
        _ => false,
    })
}
