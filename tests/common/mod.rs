#![allow(dead_code)]

use relaunch::supervisor::LineSink;
use relaunch::Config;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ASSET: &str = "app.sh";

/// A release feed served from a local mock server.
///
/// The relaunch client is blocking, so the mock server lives on its own
/// runtime and tests drive the code under test from the plain test thread.
pub struct MockFeed {
    server: MockServer,
    runtime: Runtime,
}

impl MockFeed {
    pub fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    pub fn feed_url(&self) -> String {
        format!("{}/releases/latest", self.server.uri())
    }

    pub fn asset_url(&self, name: &str) -> String {
        format!("{}/download/{}", self.server.uri(), name)
    }

    pub fn reset(&self) {
        self.runtime.block_on(self.server.reset());
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    /// Replace whatever was served with a release carrying one asset.
    pub fn publish(&self, tag: &str, name: &str, body: &[u8]) {
        self.reset();
        self.mount(
            Mock::given(method("GET"))
                .and(path("/releases/latest"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "tag_name": tag,
                    "assets": [{
                        "name": name,
                        "browser_download_url": self.asset_url(name),
                        "size": body.len(),
                    }]
                }))),
        );
        self.mount(
            Mock::given(method("GET"))
                .and(path(format!("/download/{}", name)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec())),
        );
    }

    pub fn requests_to(&self, request_path: &str) -> usize {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

pub fn config(dir: &Path, feed: &MockFeed) -> Config {
    Config {
        feed_url: feed.feed_url(),
        asset_name: ASSET.to_string(),
        artifact_path: dir.join("1.jar"),
        staging_path: dir.join("2.jar"),
        poll_interval_secs: 60,
        launcher: Vec::new(),
        shutdown_grace_secs: 2,
        request_timeout_secs: 5,
    }
}

/// A build that keeps running until it is signalled.
pub fn long_running(version: &str) -> Vec<u8> {
    format!("#!/bin/sh\necho {}\nexec sleep 30\n", version).into_bytes()
}

pub fn quiet() -> LineSink {
    Arc::new(|_: &str| {})
}

pub fn capture() -> (LineSink, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let sink: LineSink = Arc::new(move |line: &str| captured.lock().unwrap().push(line.to_string()));
    (sink, seen)
}

pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}
