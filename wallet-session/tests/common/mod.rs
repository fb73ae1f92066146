#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::{json, Value};
use url::Url;

use wallet_session_lib::{
    AccessKeyView, ApprovalConfig, CredentialStore, DelegatedKey, ExecutionOutcome, KeyPair,
    LedgerClient, MemoryStore, NetworkConfig, OpenedSurface, SessionService, SessionState,
    SurfaceEvent, SurfaceFeatures, SurfaceHandle, SurfaceHost, WalletError, WalletResult,
};

pub const PAGE_URL: &str = "https://app.example.org/play";
pub const CONTRACT: &str = "market.testnet";

/// What the scripted wallet does with the next opened surface.
pub enum Script {
    /// The host refuses to open the surface.
    Blocked,
    /// The user closes the surface; only observable by polling.
    ClosedByUser,
    /// The surface stays open and nothing is ever posted.
    Abandon,
    /// The user has closed the surface while another frame keeps posting
    /// foreign messages at the given interval.
    ClosedAmidChatter(Duration),
    /// Events delivered in order as soon as the surface opens.
    Events(Vec<Scripted>),
    /// Replies delivered in order once the delay has passed.
    Delayed(Duration, Vec<Scripted>),
}

pub enum Scripted {
    /// Wallet-origin reply. `type`, the echoed `state` and, for sign-in, the
    /// requested `public_key` are filled in unless present.
    Reply(Value),
    /// Reply carrying the request details of the surface opened at position
    /// `surface`, delivered to this one.
    ReplyTo { surface: usize, data: Value },
    /// Message posted verbatim.
    Raw { origin: String, data: Value },
    Closed,
}

#[derive(Default)]
pub struct SurfaceStats {
    pub detached: Cell<usize>,
    pub closed_by_client: Cell<usize>,
}

struct ScriptedSurface {
    closed: Rc<Cell<bool>>,
    stats: Rc<SurfaceStats>,
}

impl SurfaceHandle for ScriptedSurface {
    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn close(&self) {
        self.closed.set(true);
        self.stats
            .closed_by_client
            .set(self.stats.closed_by_client.get() + 1);
    }

    fn detach(&self) {
        self.stats.detached.set(self.stats.detached.get() + 1);
    }
}

pub struct ScriptedHost {
    scripts: RefCell<VecDeque<Script>>,
    opened: RefCell<Vec<Url>>,
    features: RefCell<Vec<SurfaceFeatures>>,
    // Held so abandoned surfaces keep their event stream open.
    senders: RefCell<Vec<UnboundedSender<SurfaceEvent>>>,
    pub stats: Rc<SurfaceStats>,
}

impl ScriptedHost {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Rc<Self> {
        Rc::new(Self {
            scripts: RefCell::new(scripts.into_iter().collect()),
            opened: RefCell::new(Vec::new()),
            features: RefCell::new(Vec::new()),
            senders: RefCell::new(Vec::new()),
            stats: Rc::new(SurfaceStats::default()),
        })
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.borrow().clone()
    }

    pub fn last_features(&self) -> Option<SurfaceFeatures> {
        self.features.borrow().last().copied()
    }

    pub fn detached(&self) -> usize {
        self.stats.detached.get()
    }

    pub fn closed_by_client(&self) -> usize {
        self.stats.closed_by_client.get()
    }
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn fill_reply(url: &Url, mut data: Value) -> Value {
    if let Value::Object(fields) = &mut data {
        fields
            .entry("type")
            .or_insert_with(|| json!("wallet-response"));
        if let Some(state) = query_param(url, "state") {
            fields.entry("state").or_insert_with(|| json!(state));
        }
        if fields.contains_key("account_id") {
            if let Some(public_key) = query_param(url, "public_key") {
                fields
                    .entry("public_key")
                    .or_insert_with(|| json!(public_key));
            }
        }
    }
    data
}

impl ScriptedHost {
    fn resolve(
        &self,
        url: &Url,
        closed: &Cell<bool>,
        scripted: Vec<Scripted>,
    ) -> Vec<SurfaceEvent> {
        let origin = url.origin().ascii_serialization();
        scripted
            .into_iter()
            .map(|event| match event {
                Scripted::Reply(data) => SurfaceEvent::Message {
                    origin: origin.clone(),
                    data: fill_reply(url, data),
                },
                Scripted::ReplyTo { surface, data } => {
                    let target = self.opened.borrow()[surface].clone();
                    SurfaceEvent::Message {
                        origin: target.origin().ascii_serialization(),
                        data: fill_reply(&target, data),
                    }
                }
                Scripted::Raw { origin, data } => SurfaceEvent::Message { origin, data },
                Scripted::Closed => {
                    closed.set(true);
                    SurfaceEvent::Closed
                }
            })
            .collect()
    }
}

impl SurfaceHost for ScriptedHost {
    fn current_url(&self) -> String {
        PAGE_URL.to_string()
    }

    fn open(&self, url: &Url, features: &SurfaceFeatures) -> WalletResult<OpenedSurface> {
        let script = self.scripts.borrow_mut().pop_front().unwrap_or(Script::Abandon);
        if matches!(script, Script::Blocked) {
            return Err(WalletError::PopupBlocked);
        }

        self.opened.borrow_mut().push(url.clone());
        self.features.borrow_mut().push(*features);

        let (sender, events) = mpsc::unbounded();
        let closed = Rc::new(Cell::new(false));
        match script {
            Script::Blocked | Script::Abandon => {}
            Script::ClosedByUser => closed.set(true),
            Script::ClosedAmidChatter(every) => {
                closed.set(true);
                let chatter = sender.clone();
                tokio::spawn(async move {
                    loop {
                        let ping = SurfaceEvent::Message {
                            origin: "https://ads.example.net".to_string(),
                            data: json!({"type": "ping"}),
                        };
                        if chatter.unbounded_send(ping).is_err() {
                            break;
                        }
                        tokio::time::sleep(every).await;
                    }
                });
            }
            Script::Events(scripted) => {
                for event in self.resolve(url, &closed, scripted) {
                    sender
                        .unbounded_send(event)
                        .expect("receiver is alive while opening");
                }
            }
            Script::Delayed(delay, scripted) => {
                let events = self.resolve(url, &closed, scripted);
                let late = sender.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for event in events {
                        let _ = late.unbounded_send(event);
                    }
                });
            }
        }
        self.senders.borrow_mut().push(sender);

        Ok(OpenedSurface {
            handle: Box::new(ScriptedSurface {
                closed,
                stats: self.stats.clone(),
            }),
            events,
        })
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}

/// Ledger double that records every broadcast payload.
pub struct MockLedger {
    pub nonce: u64,
    pub submitted: RefCell<Vec<String>>,
    pub fail_broadcast: Cell<bool>,
}

impl MockLedger {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            nonce: 7,
            submitted: RefCell::new(Vec::new()),
            fail_broadcast: Cell::new(false),
        })
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.borrow().len()
    }
}

#[async_trait(?Send)]
impl LedgerClient for MockLedger {
    async fn view_access_key(&self, _: &str, _: &str) -> WalletResult<AccessKeyView> {
        Ok(AccessKeyView {
            nonce: self.nonce,
            block_hash: "GJ2rmN7aMTC3FEyvcsD2xrHRbDZRNGrBHwYGPrWAVUfA".to_string(),
            permission: Value::Null,
        })
    }

    async fn broadcast_transaction(&self, signed: &str) -> WalletResult<ExecutionOutcome> {
        if self.fail_broadcast.get() {
            return Err(WalletError::NetworkError("node unavailable".to_string()));
        }
        let mut submitted = self.submitted.borrow_mut();
        submitted.push(signed.to_string());
        Ok(json!({"status": {"SuccessValue": ""}, "index": submitted.len()}))
    }
}

pub fn fast_approval() -> ApprovalConfig {
    ApprovalConfig {
        poll_interval_ms: 5,
        timeout_secs: Some(5),
        ..ApprovalConfig::default()
    }
}

pub fn service_with(
    store: &Rc<MemoryStore>,
    host: &Rc<ScriptedHost>,
    ledger: &Rc<MockLedger>,
) -> SessionService {
    SessionService::new(store.clone(), host.clone())
        .with_ledger(ledger.clone())
        .with_approval_config(fast_approval())
}

/// Persist a signed-in session for `alice.testnet` with a key scoped to
/// [`CONTRACT`] and return the key.
pub fn seed_session(store: &Rc<MemoryStore>, methods: &[&str]) -> KeyPair {
    let key = KeyPair::generate();
    let credentials = CredentialStore::new(store.clone(), "wallet_session", "testnet");
    credentials
        .save(&SessionState::signed_in(
            "alice.testnet",
            Some(DelegatedKey::new(
                key.secret_key().as_str(),
                CONTRACT,
                methods.iter().map(|m| m.to_string()),
            )),
        ))
        .expect("seed session");
    key
}

pub fn testnet() -> NetworkConfig {
    NetworkConfig::testnet()
}
