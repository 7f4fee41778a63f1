// tests/install_pipeline.rs

//! End-to-end batch installs: index, cache, fetcher and installer together.

mod common;

use common::{standard_workspace, stub_content, write_file, Workspace};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use stubkit::cache::CacheStore;
use stubkit::definitions::DefinitionIndex;
use stubkit::fetch::{FetchError, HttpFetcher, LocalFetcher, RetryPolicy, RetryingFetcher, StubFetcher};
use stubkit::installer::Installer;
use stubkit::pipeline::{FailureReason, PackageOutcome, Pipeline};
use stubkit::resolver::ResolutionRequest;
use stubkit::version::Version;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LEFT_PAD: &str = "npm/left-pad_v1.x.x/flow_v0.261.x-/left-pad_v1.x.x.js";

fn tool() -> Version {
    Version::new(0, 265, 0)
}

fn pkg(name: &str, major: u64, minor: u64) -> ResolutionRequest {
    ResolutionRequest::package(name, Version::new(major, minor, 0), tool())
}

fn pipeline(ws: &Workspace, fetcher: Arc<dyn StubFetcher>, force: bool) -> Pipeline {
    let index = DefinitionIndex::build(&ws.definitions).unwrap();
    Pipeline::new(
        Arc::new(index),
        Arc::new(CacheStore::open(&ws.cache).unwrap()),
        fetcher,
        Installer::new(&ws.install, force),
    )
}

fn local(ws: &Workspace) -> Arc<dyn StubFetcher> {
    Arc::new(LocalFetcher::new(&ws.definitions))
}

fn quick_retries() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_mixed_batch_installs_layout() {
    let ws = standard_workspace();
    let report = pipeline(&ws, local(&ws), false)
        .run(vec![
            pkg("left-pad", 1, 3),
            pkg("@babel/core", 7, 2),
            pkg("lib", 1, 4),
            pkg("unknown", 1, 0),
            ResolutionRequest::environment("node", tool()),
        ])
        .await;

    let labels: Vec<_> = report.packages.iter().map(|p| p.outcome.label()).collect();
    assert_eq!(
        labels,
        ["installed", "installed", "installed", "not found", "installed"]
    );
    assert!(!report.is_success());

    assert_eq!(
        fs::read_to_string(ws.install.join("npm/left-pad_v1.x.x.js")).unwrap(),
        stub_content(LEFT_PAD)
    );
    assert!(ws.install.join("npm/@babel/core_v7.x.x.js").is_file());
    assert_eq!(
        fs::read_to_string(ws.install.join("npm/lib_v^1.2.0.js")).unwrap(),
        stub_content("npm/lib_v^1.2.0/flow_all/lib_v^1.2.0.js")
    );
    assert!(ws.install.join("environments/node.js").is_file());

    // Test files are never installed
    assert!(!ws.install.join("npm/test_left-pad.js").exists());
}

#[tokio::test]
async fn test_rerun_after_cache_clear_is_up_to_date() {
    let ws = standard_workspace();
    let requests = vec![pkg("left-pad", 1, 3), pkg("@babel/core", 7, 0)];

    let first = pipeline(&ws, local(&ws), false).run(requests.clone()).await;
    assert!(first.is_success());

    let cleared = CacheStore::open(&ws.cache).unwrap().clear().unwrap();
    assert_eq!(cleared.removed, 2);

    let second = pipeline(&ws, local(&ws), false).run(requests).await;
    assert!(second.is_success());
    assert_eq!(second.summary().up_to_date, 2);
    assert_eq!(second.cache.fetches, 2);
}

#[tokio::test]
async fn test_local_edit_is_kept_unless_forced() {
    let ws = standard_workspace();
    write_file(&ws.install, "npm/left-pad_v1.x.x.js", "// my own tweaks\n");

    let report = pipeline(&ws, local(&ws), false)
        .run(vec![pkg("left-pad", 1, 3), pkg("@babel/core", 7, 0)])
        .await;
    assert!(matches!(
        report.packages[0].outcome,
        PackageOutcome::Failed(FailureReason::WouldOverwrite(_))
    ));
    assert!(report.packages[1].outcome.is_success());
    assert_eq!(
        fs::read_to_string(ws.install.join("npm/left-pad_v1.x.x.js")).unwrap(),
        "// my own tweaks\n"
    );

    let forced = pipeline(&ws, local(&ws), true)
        .run(vec![pkg("left-pad", 1, 3)])
        .await;
    assert_eq!(forced.packages[0].outcome.label(), "overwritten");
    assert_eq!(
        fs::read_to_string(ws.install.join("npm/left-pad_v1.x.x.js")).unwrap(),
        stub_content(LEFT_PAD)
    );
}

#[tokio::test]
async fn test_registry_fetch_retries_transient_errors() {
    let ws = standard_workspace();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/registry/{LEFT_PAD}")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/registry/{LEFT_PAD}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(stub_content(LEFT_PAD)))
        .mount(&server)
        .await;

    let http = HttpFetcher::new(
        &format!("{}/registry", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    let fetcher = Arc::new(RetryingFetcher::new(Arc::new(http), quick_retries()));

    let report = pipeline(&ws, fetcher, false)
        .run(vec![pkg("left-pad", 1, 3)])
        .await;

    assert!(report.is_success(), "{:?}", report.packages[0].outcome);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(
        fs::read_to_string(ws.install.join("npm/left-pad_v1.x.x.js")).unwrap(),
        stub_content(LEFT_PAD)
    );
}

#[tokio::test]
async fn test_registry_content_must_match_fingerprint() {
    let ws = standard_workspace();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/registry/{LEFT_PAD}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("// tampered"))
        .mount(&server)
        .await;

    let http = HttpFetcher::new(
        &format!("{}/registry", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    let report = pipeline(&ws, Arc::new(http), false)
        .run(vec![pkg("left-pad", 1, 3)])
        .await;

    assert!(matches!(
        report.packages[0].outcome,
        PackageOutcome::Failed(FailureReason::Fetch(FetchError::Malformed { .. }))
    ));
    assert!(!ws.install.join("npm/left-pad_v1.x.x.js").exists());

    let cache = CacheStore::open(&ws.cache).unwrap();
    let index = DefinitionIndex::build(&ws.definitions).unwrap();
    let entry = &index.lookup("left-pad")[1];
    assert!(cache.get(&entry.fingerprint).await.is_none());
}

#[tokio::test]
async fn test_registry_missing_stub_fails_only_that_package() {
    let ws = standard_workspace();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry/environments/node/flow_v0.261.x-/node.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(stub_content("environments/node/flow_v0.261.x-/node.js")),
        )
        .mount(&server)
        .await;

    let http = HttpFetcher::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let fetcher = Arc::new(RetryingFetcher::new(Arc::new(http), quick_retries()));
    let report = pipeline(&ws, fetcher, false)
        .run(vec![
            pkg("left-pad", 1, 3),
            ResolutionRequest::environment("node", tool()),
        ])
        .await;

    // 404 is permanent: no retries
    assert!(matches!(
        report.packages[0].outcome,
        PackageOutcome::Failed(FailureReason::Fetch(FetchError::NotFound(_)))
    ));
    assert!(report.packages[1].outcome.is_success());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
