// Integration tests for Restock Watcher
// These tests drive the scheduler, dispatcher and control surface together

pub mod control_tests;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use restock_watcher::{
    AppConfig, AppError,
    control::ControlSurface,
    dispatcher::AlertDispatcher,
    fetcher::PageFetcher,
    models::{Group, Target},
    plugins::traits::{EventKind, NotificationEvent, NotificationResult, NotifierPlugin},
    scheduler::MonitorScheduler,
    state::{RuntimeFlags, TargetStateStore},
};

/// What the fake fetcher should answer for one request.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Page(String),
    Timeout,
    Down,
}

/// Fetcher answering from a per-URL script. The last scripted response repeats.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn script(&self, url: &str, responses: Vec<FakeResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into_iter().collect());
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn next_response(&self, url: &str) -> FakeResponse {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(FakeResponse::Down),
            None => FakeResponse::Down,
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, AppError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        match self.next_response(url) {
            FakeResponse::Page(html) => Ok(html),
            FakeResponse::Timeout => Err(AppError::FetchTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            FakeResponse::Down => Err(AppError::Fetch {
                url: url.to_string(),
                message: "HTTP 503".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub endpoint: String,
    pub event: NotificationEvent,
    pub at: Instant,
}

/// Notifier that records every delivery attempt.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn count_kind(&self, kind: &EventKind) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|message| &message.event.kind == kind)
            .count()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        "recording"
    }

    async fn notify(
        &self,
        endpoint: &str,
        event: &NotificationEvent,
    ) -> Result<NotificationResult, AppError> {
        self.sent.lock().unwrap().push(SentMessage {
            endpoint: endpoint.to_string(),
            event: event.clone(),
            at: Instant::now(),
        });

        if self.failing.load(Ordering::SeqCst) {
            return Ok(NotificationResult {
                success: false,
                status: Some(500),
                error: Some("internal error".to_string()),
            });
        }

        Ok(NotificationResult {
            success: true,
            status: Some(204),
            error: None,
        })
    }
}

/// Fully wired application with fake collaborators.
pub struct TestApp {
    pub groups: Arc<Vec<Group>>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub flags: Arc<RuntimeFlags>,
    pub states: Arc<TargetStateStore>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub scheduler: Arc<MonitorScheduler>,
    pub control: ControlSurface,
}

impl TestApp {
    pub fn target(&self, group: usize, index: usize) -> Target {
        self.groups[group].targets[index].clone()
    }
}

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scraper.request_timeout = 5;
    config.scraper.retry_attempts = 1;
    config.scraper.retry_delay_ms = 10;
    config.scheduler.check_interval = 60;
    config.notifications.dispatch_delay_ms = 0;
    config
}

pub fn product_url(slug: &str) -> String {
    format!("https://shop.example/product/{}/", slug)
}

/// Build an app watching `groups`, given as (name, product slugs).
pub fn create_test_app(groups: &[(&str, &[&str])]) -> anyhow::Result<TestApp> {
    create_test_app_with_config(groups, get_test_config())
}

pub fn create_test_app_with_config(
    groups: &[(&str, &[&str])],
    config: AppConfig,
) -> anyhow::Result<TestApp> {
    let groups = groups
        .iter()
        .map(|(name, slugs)| -> Result<Group, AppError> {
            let targets = slugs
                .iter()
                .map(|slug| Target::new(&product_url(slug)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Group::new(*name, format!("https://hooks.example/{}", name), targets))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let groups = Arc::new(groups);

    let fetcher = Arc::new(ScriptedFetcher::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let flags = Arc::new(RuntimeFlags::new());
    let states = Arc::new(TargetStateStore::new());

    let dispatcher = Arc::new(AlertDispatcher::new(
        notifier.clone(),
        Arc::clone(&flags),
        config.notifications.dispatch_delay(),
    ));

    let scheduler = Arc::new(MonitorScheduler::new(
        Arc::clone(&groups),
        fetcher.clone(),
        Arc::clone(&dispatcher),
        Arc::clone(&states),
        Arc::clone(&flags),
        &config,
    )?);

    let control = ControlSurface::new(
        Arc::clone(&scheduler),
        Arc::clone(&dispatcher),
        Arc::clone(&states),
        Arc::clone(&flags),
    );

    Ok(TestApp {
        groups,
        fetcher,
        notifier,
        flags,
        states,
        dispatcher,
        scheduler,
        control,
    })
}

pub fn in_stock_page(price: &str) -> FakeResponse {
    FakeResponse::Page(format!(
        r#"<html><body>
        <div class="woocommerce-product-gallery__image">
            <img src="/thumb.jpg" data-large_image="https://shop.example/wp-content/uploads/box.jpg">
        </div>
        <div class="summary entry-summary">
            <h1 class="product_title">Booster Box</h1>
            <p class="price"><span class="woocommerce-Price-amount amount">{}</span></p>
            <form class="cart"><button type="submit" class="single_add_to_cart_button button">Add to cart</button></form>
        </div>
        </body></html>"#,
        price
    ))
}

pub fn out_of_stock_page() -> FakeResponse {
    FakeResponse::Page(
        r#"<html><body><div class="summary entry-summary">
            <h1 class="product_title">Booster Box</h1>
            <p class="stock out-of-stock">Out of stock</p>
        </div></body></html>"#
            .to_string(),
    )
}

/// Page without a product summary, which classifies as unknown.
pub fn unrecognised_page() -> FakeResponse {
    FakeResponse::Page("<html><body><h1>Maintenance</h1></body></html>".to_string())
}
