//! Drives the public discovery API with an in-memory browser session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hls_discovery::discovery::{EarlyExitPolicy, SelectionPolicy};
use hls_discovery::{
    BrowserResult, BrowserSession, DiscoveryError, DiscoveryRequest, DiscoveryResult,
    NavigationOutcome, NetworkEvent, discover_manifest, discover_with_session,
};
use hls_discovery::{Config, DiscoveryConfig};

/// Session whose page "loads" a fixed list of URLs spread over several polls
struct PlaybackSession {
    timeline: Vec<Vec<NetworkEvent>>,
    cursor: usize,
    log: Arc<Mutex<Vec<String>>>,
}

impl PlaybackSession {
    fn new(timeline: Vec<Vec<NetworkEvent>>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                timeline,
                cursor: 0,
                log: log.clone(),
            },
            log,
        )
    }
}

#[async_trait]
impl BrowserSession for PlaybackSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> BrowserResult<NavigationOutcome> {
        self.log.lock().unwrap().push(format!("navigate {url}"));
        Ok(NavigationOutcome::Loaded)
    }

    async fn evaluate(&mut self, _script: &str) -> BrowserResult<serde_json::Value> {
        self.log.lock().unwrap().push("evaluate".to_string());
        Ok(serde_json::Value::Null)
    }

    async fn poll_network_log(&mut self) -> BrowserResult<Vec<NetworkEvent>> {
        let batch = self.timeline.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(batch)
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().push("close".to_string());
    }
}

fn player_page_timeline() -> Vec<Vec<NetworkEvent>> {
    vec![
        vec![
            NetworkEvent::request("https://embed.example.net/e/u0vl5bnc86a6"),
            NetworkEvent::response("https://embed.example.net/static/jwplayer.js"),
        ],
        vec![
            NetworkEvent::request("https://cdn.example.net/hls2/01/master.m3u8?t=abc"),
            NetworkEvent::response("https://cdn.example.net/hls2/01/master.m3u8?t=abc"),
        ],
        vec![
            NetworkEvent::request("https://cdn.example.net/hls2/01/index-v1-a1.m3u8?t=abc"),
            NetworkEvent::request("https://cdn.example.net/hls2/01/seg-1-v1-a1.ts?t=abc"),
            NetworkEvent::request("blob:https://embed.example.net/6c1d2f.m3u8"),
        ],
    ]
}

#[tokio::test(start_paused = true)]
async fn default_policies_pick_longest_manifest() {
    let (mut session, log) = PlaybackSession::new(player_page_timeline());
    let request = DiscoveryRequest::new("https://embed.example.net/e/u0vl5bnc86a6")
        .with_timeout_secs(10);

    let result = discover_manifest(&mut session, &request, &DiscoveryConfig::default())
        .await
        .unwrap();

    assert_eq!(
        result,
        DiscoveryResult::Found {
            selected: "https://cdn.example.net/hls2/01/index-v1-a1.m3u8?t=abc".to_string(),
            alternatives: vec!["https://cdn.example.net/hls2/01/master.m3u8?t=abc".to_string()],
        }
    );
    // discover_manifest borrows the session and leaves it open
    assert!(!log.lock().unwrap().contains(&"close".to_string()));
}

#[tokio::test(start_paused = true)]
async fn prefer_master_with_first_match() {
    let (session, log) = PlaybackSession::new(player_page_timeline());
    let request = DiscoveryRequest::new("https://embed.example.net/e/u0vl5bnc86a6")
        .with_timeout_secs(10);
    let config = DiscoveryConfig {
        early_exit: EarlyExitPolicy::FirstMatch,
        selection: SelectionPolicy::PreferMaster,
        ..DiscoveryConfig::default()
    };

    let report = discover_with_session(session, &request, &config).await.unwrap();

    assert_eq!(
        report.result.selected(),
        Some("https://cdn.example.net/hls2/01/master.m3u8?t=abc")
    );
    assert_eq!(report.polls, 2);
    assert_eq!(report.events_inspected, 4);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "navigate https://embed.example.net/e/u0vl5bnc86a6".to_string(),
            "evaluate".to_string(),
            "close".to_string(),
        ]
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["result"]["status"], "found");
    assert_eq!(json["polls"], 2);
}

#[tokio::test]
async fn invalid_url_is_rejected_before_navigation() {
    let (session, log) = PlaybackSession::new(vec![]);
    let request = DiscoveryRequest::new("not-a-url");

    let err = discover_with_session(session, &request, &DiscoveryConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::InvalidInput(_)));
    assert!(
        !log.lock()
            .unwrap()
            .iter()
            .any(|entry| entry.starts_with("navigate"))
    );
}

#[test]
fn request_from_config_uses_discovery_defaults() {
    let config: Config = serde_yaml::from_str("discovery:\n  timeout_secs: 7\n  poll_interval_secs: 0.5\n").unwrap();
    let request = DiscoveryRequest::from_config("https://example.com/v/1", &config.discovery);

    assert_eq!(request.timeout_seconds, 7);
    assert_eq!(request.poll_interval_seconds, 0.5);
    assert!(request.validate().is_ok());
}
