//! Reconciliation behaviour across loads and reloads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use endpoint_reconciler::certificates::{CertificateError, DefaultCertificateOrigin};
use endpoint_reconciler::config::SchemaError;
use endpoint_reconciler::net::{BindAddress, ClientCertificateMode, HttpProtocols, SslProtocols};
use endpoint_reconciler::ReconcileError;

mod common;

use common::{bare_reconciler, tree, Harness};

fn names(bindings: &[Arc<endpoint_reconciler::net::ListenOptions>]) -> Vec<String> {
    let mut names: Vec<String> = bindings.iter().map(|b| b.display_name()).collect();
    names.sort();
    names
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&calls), calls)
}

#[test]
fn load_is_idempotent() {
    let mut reconciler = bare_reconciler(&[("Endpoints:Web:Url", "http://*:5000")]);
    let (calls, seen) = counter();
    reconciler
        .endpoints()
        .endpoint("Web", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap()
        .listen_localhost(6000);

    reconciler.load().unwrap();
    let first: Vec<_> = reconciler.bindings().cloned().collect();
    reconciler.load().unwrap();
    let second: Vec<_> = reconciler.bindings().cloned().collect();

    assert!(reconciler.is_loaded());
    assert_eq!(first.len(), 2);
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reconciler.code_bindings().len(), 1);
}

#[test]
fn identical_reload_changes_nothing() {
    let harness = Harness::new().with_file("server.pem", "cert.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Api:Url", "http://localhost:5000"),
        ("Certificates:Default:Path", "cert.pem"),
        ("Certificates:Default:Password", "x"),
    ]);
    let (calls, seen) = counter();
    reconciler
        .endpoints()
        .endpoint("web", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    reconciler.load().unwrap();
    let before: Vec<_> = reconciler.config_bindings().to_vec();

    let plan = reconciler.reload().unwrap();
    assert!(plan.is_empty(), "unexpected plan: {:?}", plan.summary());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(before
        .iter()
        .zip(reconciler.config_bindings())
        .all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[test]
fn changing_default_protocols_rebinds_only_inheriting_endpoints() {
    let mut reconciler = bare_reconciler(&[
        ("EndpointDefaults:Protocols", "Http1"),
        ("Endpoints:Implicit:Url", "http://*:5000"),
        ("Endpoints:Explicit:Url", "http://*:5001"),
        ("Endpoints:Explicit:Protocols", "Http2"),
    ]);
    reconciler.load().unwrap();

    reconciler.update_configuration(tree(&[
        ("EndpointDefaults:Protocols", "Http1AndHttp2"),
        ("Endpoints:Implicit:Url", "http://*:5000"),
        ("Endpoints:Explicit:Url", "http://*:5001"),
        ("Endpoints:Explicit:Protocols", "Http2"),
    ]));
    let plan = reconciler.reload().unwrap();

    assert_eq!(names(&plan.stopped), ["Implicit"]);
    assert_eq!(names(&plan.started), ["Implicit"]);
    assert_eq!(plan.stopped[0].protocols, HttpProtocols::Http1);
    assert_eq!(plan.started[0].protocols, HttpProtocols::Http1AndHttp2);
}

#[test]
fn both_certificate_sources_are_rejected_before_binding() {
    let harness = Harness::new().with_file("plain.pem", "plain.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Plain:Url", "http://*:5000"),
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Certificate:Path", "plain.pem"),
        ("Endpoints:Web:Certificate:Subject", "plain.test"),
    ]);
    let (calls, seen) = counter();
    reconciler
        .endpoints()
        .endpoint("Plain", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let err = reconciler.load().unwrap_err();
    match err {
        ReconcileError::Certificate { endpoint, source } => {
            assert_eq!(endpoint, "Web");
            assert!(matches!(source, CertificateError::ConflictingSources(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(reconciler.bindings().count(), 0);
    assert!(!reconciler.is_loaded());
}

#[test]
fn endpoint_without_certificate_uses_configured_default() {
    let harness = Harness::new()
        .with_file("plain.pem", "default.pem")
        .with_development_certificate("devcert.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Certificates:Default:Path", "default.pem"),
        ("Certificates:Development:Password", "devpass"),
    ]);
    reconciler.load().unwrap();

    let web = &reconciler.config_bindings()[0];
    let https = web.https_options().unwrap();
    assert_eq!(https.server_certificate.as_ref().unwrap().subject(), "CN=plain.test");
    assert!(web.uses_default_certificate());
    assert_eq!(
        reconciler.default_certificate().unwrap().origin,
        DefaultCertificateOrigin::Configured
    );
}

#[test]
fn development_certificate_backs_endpoints_without_default() {
    let harness = Harness::new().with_development_certificate("devcert.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://localhost:5001"),
        ("Certificates:Development:Password", "devpass"),
    ]);
    reconciler.load().unwrap();

    let web = &reconciler.config_bindings()[0];
    assert_eq!(web.address(), &BindAddress::Localhost(5001));
    let certificate = web.https_options().unwrap().server_certificate.clone().unwrap();
    assert_eq!(certificate.subject(), "CN=localhost");
    assert!(matches!(
        reconciler.default_certificate().unwrap().origin,
        DefaultCertificateOrigin::Development { .. }
    ));
}

#[test]
fn unrecognised_development_certificate_is_ignored() {
    let harness = Harness::new().with_development_certificate("localhost-unmarked.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Certificates:Development:Password", "devpass"),
    ]);

    let err = reconciler.load().unwrap_err();
    assert!(matches!(err, ReconcileError::MissingCertificate { endpoint } if endpoint == "Web"));
    assert!(reconciler.default_certificate().is_none());
}

#[test]
fn secure_endpoint_without_any_certificate_fails() {
    let mut reconciler = bare_reconciler(&[("Endpoints:Web:Url", "https://*:5001")]);
    let err = reconciler.reload().unwrap_err();
    assert!(matches!(err, ReconcileError::MissingCertificate { .. }));
    assert!(!err.is_configuration_error());
    assert_eq!(reconciler.bindings().count(), 0);
}

#[test]
fn identical_endpoints_under_different_names_stay_distinct() {
    let mut reconciler = bare_reconciler(&[
        ("Endpoints:A:Url", "http://*:5000"),
        ("Endpoints:A:Protocols", "Http1"),
        ("Endpoints:B:Url", "http://*:5000"),
        ("Endpoints:B:Protocols", "Http1"),
    ]);
    let plan = reconciler.reload().unwrap();
    assert_eq!(names(&plan.started), ["A", "B"]);

    reconciler.update_configuration(tree(&[
        ("Endpoints:A:Url", "http://*:5000"),
        ("Endpoints:A:Protocols", "Http1"),
    ]));
    let plan = reconciler.reload().unwrap();
    assert_eq!(names(&plan.stopped), ["B"]);
    assert!(plan.started.is_empty());
    assert_eq!(names(reconciler.config_bindings()), ["A"]);
}

#[test]
fn removed_endpoint_is_stopped() {
    let mut reconciler = bare_reconciler(&[
        ("Endpoints:Web:Url", "http://*:5000"),
        ("Endpoints:Admin:Url", "http://localhost:5050"),
    ]);
    reconciler.load().unwrap();
    let admin = reconciler
        .config_bindings()
        .iter()
        .find(|b| b.endpoint_name() == Some("Admin"))
        .cloned()
        .unwrap();

    reconciler.update_configuration(tree(&[("Endpoints:Web:Url", "http://*:5000")]));
    let plan = reconciler.reload().unwrap();

    assert_eq!(plan.stopped.len(), 1);
    assert!(Arc::ptr_eq(&plan.stopped[0], &admin));
    assert!(plan.started.is_empty());
}

#[test]
fn changed_endpoint_reinvokes_only_its_callback() {
    let mut reconciler = bare_reconciler(&[
        ("Endpoints:Web:Url", "http://*:5000"),
        ("Endpoints:Api:Url", "http://*:5001"),
    ]);
    let (web_calls, web_seen) = counter();
    let (api_calls, api_seen) = counter();
    reconciler
        .endpoints()
        .endpoint("Web", move |_| {
            web_seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap()
        .endpoint("Api", move |_| {
            api_seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    reconciler.load().unwrap();

    reconciler.update_configuration(tree(&[
        ("Endpoints:Web:Url", "http://*:5080"),
        ("Endpoints:Api:Url", "http://*:5001"),
    ]));
    let plan = reconciler.reload().unwrap();

    assert_eq!(names(&plan.stopped), ["Web"]);
    assert_eq!(plan.started[0].address(), &BindAddress::AnyIp(5080));
    assert_eq!(web_calls.load(Ordering::SeqCst), 2);
    assert_eq!(api_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn wrong_default_password_fails_and_keeps_bindings() {
    let harness = Harness::new().with_file("server.pem", "cert.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Certificates:Default:Path", "cert.pem"),
        ("Certificates:Default:Password", "x"),
    ]);
    reconciler.load().unwrap();

    let web = Arc::clone(&reconciler.config_bindings()[0]);
    assert_eq!(web.address(), &BindAddress::AnyIp(5001));
    assert!(web.is_tls());
    let certificate = web.https_options().unwrap().server_certificate.clone().unwrap();
    assert_eq!(certificate.subject(), "CN=example.test");

    reconciler.update_configuration(tree(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Certificates:Default:Path", "cert.pem"),
        ("Certificates:Default:Password", "wrong"),
    ]));
    let err = reconciler.reload().unwrap_err();
    assert!(matches!(err, ReconcileError::MissingCertificate { .. }));

    assert_eq!(reconciler.config_bindings().len(), 1);
    assert!(Arc::ptr_eq(&reconciler.config_bindings()[0], &web));
    let default = reconciler.default_certificate().unwrap();
    assert_eq!(default.certificate.thumbprint(), certificate.thumbprint());
}

#[test]
fn wrong_explicit_password_is_fatal() {
    let harness = Harness::new().with_file("server.pem", "cert.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Certificate:Path", "cert.pem"),
        ("Endpoints:Web:Certificate:Password", "wrong"),
    ]);
    let err = reconciler.load().unwrap_err();
    match err {
        ReconcileError::Certificate { endpoint, source } => {
            assert_eq!(endpoint, "Web");
            assert!(matches!(source, CertificateError::Decrypt(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn default_certificate_change_rebinds_dependent_endpoints() {
    let harness = Harness::new()
        .with_file("plain.pem", "default.pem")
        .with_file("server.pem", "next.pem")
        .with_file("store.pem", "api.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Api:Url", "https://*:5002"),
        ("Endpoints:Api:Certificate:Path", "api.pem"),
        ("Certificates:Default:Path", "default.pem"),
    ]);
    reconciler.load().unwrap();

    reconciler.update_configuration(tree(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Api:Url", "https://*:5002"),
        ("Endpoints:Api:Certificate:Path", "api.pem"),
        ("Certificates:Default:Path", "next.pem"),
        ("Certificates:Default:Password", "x"),
    ]));
    let plan = reconciler.reload().unwrap();

    assert_eq!(names(&plan.stopped), ["Web"]);
    assert_eq!(names(&plan.started), ["Web"]);
    let subject = plan.started[0]
        .https_options()
        .and_then(|h| h.server_certificate.as_ref())
        .map(|c| c.subject().to_string());
    assert_eq!(subject.as_deref(), Some("CN=example.test"));
}

#[test]
fn removing_explicit_certificate_falls_back_to_default() {
    let harness = Harness::new()
        .with_file("plain.pem", "default.pem")
        .with_file("store.pem", "web.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Certificate:Path", "web.pem"),
        ("Certificates:Default:Path", "default.pem"),
    ]);
    reconciler.load().unwrap();
    assert!(!reconciler.config_bindings()[0].uses_default_certificate());

    reconciler.update_configuration(tree(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Certificates:Default:Path", "default.pem"),
    ]));
    let plan = reconciler.reload().unwrap();
    assert_eq!(names(&plan.started), ["Web"]);
    assert!(plan.started[0].uses_default_certificate());
}

#[test]
fn named_certificate_reference_change_rebinds() {
    let harness = Harness::new()
        .with_file("plain.pem", "a.pem")
        .with_file("store.pem", "b.pem");
    let config = |path: &'static str| {
        vec![
            ("Endpoints:Web:Url", "https://*:5001"),
            ("Endpoints:Web:Certificate", "Shared"),
            ("Certificates:Shared:Path", path),
        ]
    };
    let mut reconciler = harness.reconciler(&config("a.pem"));
    reconciler.load().unwrap();

    reconciler.update_configuration(tree(&config("b.pem")));
    let plan = reconciler.reload().unwrap();
    assert_eq!(names(&plan.started), ["Web"]);
}

#[test]
fn store_certificate_as_default() {
    let harness = Harness::new()
        .with_store_certificate("store.pem")
        .with_store_certificate("client-only.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Certificates:Default:Subject", "store.test"),
        ("Certificates:Default:Store", "My"),
        ("Certificates:Default:Location", "currentuser"),
    ]);
    reconciler.load().unwrap();

    let default = reconciler.default_certificate().unwrap();
    assert_eq!(default.certificate.subject(), "CN=store.test");
    assert!(default.certificate.allows_server_auth());
}

#[test]
fn invalid_store_location_is_fatal_even_for_default() {
    let harness = Harness::new();
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "http://*:5000"),
        ("Certificates:Default:Subject", "store.test"),
        ("Certificates:Default:Location", "Basement"),
    ]);
    let err = reconciler.load().unwrap_err();
    assert!(err.is_configuration_error());
    assert!(matches!(
        err,
        ReconcileError::Certificate {
            source: CertificateError::InvalidStoreLocation(_),
            ..
        }
    ));
}

#[test]
fn store_miss_for_default_is_soft() {
    let harness = Harness::new();
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "http://*:5000"),
        ("Certificates:Default:Subject", "nothing.test"),
    ]);
    reconciler.load().unwrap();
    assert!(reconciler.default_certificate().is_none());
    assert_eq!(reconciler.bindings().count(), 1);
}

#[test]
fn registrations_after_load_apply_on_next_reload() {
    let mut reconciler = bare_reconciler(&[("Endpoints:Web:Url", "http://*:5000")]);
    reconciler.load().unwrap();
    assert!(reconciler.code_bindings().is_empty());

    reconciler.endpoints().listen_localhost(7000);
    reconciler.endpoints().listen_unix_socket("/tmp/shop.sock").unwrap();
    let plan = reconciler.reload().unwrap();

    let addresses: Vec<String> = plan.started.iter().map(|b| b.address().to_string()).collect();
    assert_eq!(addresses, ["localhost:7000", "unix:/tmp/shop.sock"]);
    assert!(plan.stopped.is_empty());
    assert_eq!(reconciler.code_bindings().len(), 2);
    assert_eq!(reconciler.endpoints().pending_count(), 0);
}

#[test]
fn replacing_the_loader_discards_pending_registrations() {
    let mut reconciler = bare_reconciler(&[("Endpoints:Web:Url", "http://*:5000")]);
    reconciler.endpoints().listen_localhost(7000).listen_handle(9);

    reconciler
        .configure(tree(&[("Endpoints:Api:Url", "http://*:5001")]))
        .listen_any_ip(7001);
    reconciler.load().unwrap();

    assert_eq!(names(reconciler.config_bindings()), ["Api"]);
    let code: Vec<String> = reconciler.code_bindings().iter().map(|b| b.address().to_string()).collect();
    assert_eq!(code, ["*:7001"]);
}

#[test]
fn code_backed_https_uses_default_certificate() {
    let harness = Harness::new().with_file("plain.pem", "default.pem");
    let mut reconciler = harness.reconciler(&[("Certificates:Default:Path", "default.pem")]);
    reconciler.configure_endpoint_defaults(|options| options.protocols = HttpProtocols::Http2);
    reconciler.configure_https_defaults(|https| {
        https.client_certificate_mode = ClientCertificateMode::AllowCertificate;
    });
    reconciler.endpoints().listen_any_ip_with(5003, |options| {
        options.use_https();
    });
    reconciler.load().unwrap();

    let binding = &reconciler.code_bindings()[0];
    assert_eq!(binding.protocols, HttpProtocols::Http2);
    let https = binding.https_options().unwrap();
    assert_eq!(https.client_certificate_mode, ClientCertificateMode::AllowCertificate);
    assert_eq!(https.server_certificate.as_ref().unwrap().subject(), "CN=plain.test");
    assert!(binding.uses_default_certificate());
}

#[test]
fn code_backed_https_without_default_keeps_registration() {
    let mut reconciler = bare_reconciler(&[]);
    reconciler.endpoints().listen_localhost_with(5003, |options| {
        options.use_https();
    });

    let err = reconciler.load().unwrap_err();
    assert!(matches!(err, ReconcileError::MissingCertificate { endpoint } if endpoint == "localhost:5003"));
    assert_eq!(reconciler.endpoints().pending_count(), 1);
    assert!(reconciler.code_bindings().is_empty());
}

#[test]
fn endpoint_settings_merge_from_defaults() {
    let harness = Harness::new().with_file("plain.pem", "default.pem");
    let mut reconciler = harness.reconciler(&[
        ("EndpointDefaults:SslProtocols", "Tls13"),
        ("EndpointDefaults:ClientCertificateMode", "RequireCertificate"),
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:ClientCertificateMode", "NoCertificate"),
        ("Certificates:Default:Path", "default.pem"),
    ]);
    reconciler.load().unwrap();

    let https = reconciler.config_bindings()[0].https_options().unwrap().clone();
    assert_eq!(https.ssl_protocols, SslProtocols::TLS13);
    assert_eq!(https.client_certificate_mode, ClientCertificateMode::NoCertificate);
}

#[test]
fn sni_entries_select_certificates_by_host() {
    let harness = Harness::new()
        .with_file("plain.pem", "default.pem")
        .with_file("store.pem", "store.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Sni:*.store.test:Certificate:Path", "store.pem"),
        ("Endpoints:Web:Sni:*:Protocols", "Http1"),
        ("Certificates:Default:Path", "default.pem"),
    ]);
    reconciler.load().unwrap();

    let web = &reconciler.config_bindings()[0];
    let https = web.https_options().unwrap();
    assert!(https.server_certificate.is_none());
    let selector = https.server_certificate_selector.clone().unwrap();
    assert_eq!(selector.select(Some("shop.store.test")).unwrap().subject(), "CN=store.test");
    assert_eq!(selector.select(Some("other.test")).unwrap().subject(), "CN=plain.test");
    assert!(web.uses_default_certificate());
}

#[test]
fn sni_entry_without_any_certificate_fails() {
    let mut reconciler = bare_reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Sni:a.test:Protocols", "Http1"),
    ]);
    let err = reconciler.load().unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::MissingSniCertificate { endpoint, host } if endpoint == "Web" && host == "a.test"
    ));
}

#[test]
fn unix_socket_endpoints_from_configuration() {
    let mut reconciler = bare_reconciler(&[("Endpoints:Sock:Url", "http://unix:/run/shop.sock")]);
    reconciler.load().unwrap();
    assert_eq!(
        reconciler.config_bindings()[0].address(),
        &BindAddress::UnixSocket("/run/shop.sock".into())
    );
}

#[test]
fn sni_entry_uses_named_certificate() {
    let harness = Harness::new()
        .with_file("plain.pem", "default.pem")
        .with_file("store.pem", "shop.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Sni:shop.test:Certificate", "Shop"),
        ("Certificates:Shop:Path", "shop.pem"),
        ("Certificates:Default:Path", "default.pem"),
    ]);
    reconciler.load().unwrap();

    let https = reconciler.config_bindings()[0].https_options().unwrap().clone();
    let selector = https.server_certificate_selector.unwrap();
    assert_eq!(selector.select(Some("shop.test")).unwrap().subject(), "CN=store.test");
}

#[test]
fn sni_entry_with_unknown_certificate_name_is_rejected() {
    let harness = Harness::new().with_file("plain.pem", "default.pem");
    let mut reconciler = harness.reconciler(&[
        ("Endpoints:Web:Url", "https://*:5001"),
        ("Endpoints:Web:Sni:shop.test:Certificate", "DoesNotExist"),
        ("Certificates:Default:Path", "default.pem"),
    ]);

    let err = reconciler.load().unwrap_err();
    assert!(err.is_configuration_error());
    assert!(matches!(
        err,
        ReconcileError::Schema(SchemaError::UnknownCertificate { ref name, .. }) if name == "DoesNotExist"
    ));
    assert_eq!(reconciler.bindings().count(), 0);
}

#[test]
fn code_backed_binding_keeps_its_default_certificate() {
    let harness = Harness::new()
        .with_file("plain.pem", "default.pem")
        .with_file("store.pem", "next.pem");
    let mut reconciler = harness.reconciler(&[("Certificates:Default:Path", "default.pem")]);
    reconciler.endpoints().listen_localhost_with(5003, |options| {
        options.use_https();
    });
    reconciler.load().unwrap();
    let binding = Arc::clone(&reconciler.code_bindings()[0]);

    reconciler.update_configuration(tree(&[("Certificates:Default:Path", "next.pem")]));
    let plan = reconciler.reload().unwrap();

    assert!(plan.is_empty());
    assert_eq!(reconciler.default_certificate().unwrap().certificate.subject(), "CN=store.test");
    assert!(Arc::ptr_eq(&reconciler.code_bindings()[0], &binding));
    let subject = binding
        .https_options()
        .and_then(|h| h.server_certificate.as_ref())
        .map(|c| c.subject().to_string());
    assert_eq!(subject.as_deref(), Some("CN=plain.test"));
}
