#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end conversations against the real queue and device channel, with
//! in-memory stand-ins for every external service.

use std::{
    future::Future,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chrono::NaiveTime,
    rstest::rstest,
    secrecy::{ExposeSecret, Secret},
    tempfile::TempDir,
    tokio::sync::{broadcast, mpsc},
    underwood_config::{Preferences, PreferencesStore},
    underwood_cron::{InMemoryStore, NaturalTimeParser, ScheduleStore},
    underwood_device::{
        ControlByte, DeviceChannel, InputFrame, InputQueue, MemoryLink, Pacing,
    },
    underwood_network::{
        Coordinates, Geolocator, NetworkProvisioner, Place, ScannedNetwork,
    },
    underwood_oauth::{
        AuthProvider, AuthorizationRequest, CallbackServer, Credential, CredentialStore,
        PkceChallenge, Profile, TunnelHandle, TunnelLauncher, unix_now,
    },
    underwood_session::{
        AgendaComposer, AgendaRequest, Collaborators, Dispatcher, FlowOutcome, SessionContext,
        Settings,
        flows::{oauth, reset, schedule, wifi},
    },
};

// ── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeAuth {
    refresh_fails: bool,
    revoke_fails: bool,
    refreshes: AtomicUsize,
    revokes: AtomicUsize,
    exchanged: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AuthProvider for FakeAuth {
    fn start(&self) -> underwood_oauth::Result<AuthorizationRequest> {
        Ok(AuthorizationRequest {
            url: "https://accounts.example/consent?client_id=c".into(),
            pkce: PkceChallenge {
                verifier: "the-verifier".into(),
                challenge: "the-challenge".into(),
            },
            state: "st-1".into(),
        })
    }

    async fn exchange(&self, code: &str, verifier: &str) -> underwood_oauth::Result<Credential> {
        self.exchanged
            .lock()
            .unwrap()
            .push((code.to_string(), verifier.to_string()));
        Ok(credential("exchanged-access", Some("exchanged-refresh"), 3600))
    }

    async fn refresh(&self, previous: &Credential) -> underwood_oauth::Result<Credential> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.refresh_fails {
            return Err(underwood_oauth::Error::message("invalid_grant"));
        }
        let mut refreshed = credential("refreshed-access", None, 3600);
        refreshed.refresh_token = previous.refresh_token.clone();
        Ok(refreshed)
    }

    async fn revoke(&self, _credential: &Credential) -> underwood_oauth::Result<()> {
        self.revokes.fetch_add(1, Ordering::SeqCst);
        if self.revoke_fails {
            return Err(underwood_oauth::Error::message("revoke endpoint down"));
        }
        Ok(())
    }

    async fn fetch_profile(&self, _credential: &Credential) -> underwood_oauth::Result<Profile> {
        Ok(Profile {
            given_name: Some("Ada".into()),
            family_name: Some("Lovelace".into()),
        })
    }
}

/// Starts a shell process per tunnel that leaves a marker file when it is
/// asked to terminate.
struct FakeTunnel {
    opened: mpsc::UnboundedSender<u16>,
    count: AtomicUsize,
    dir: PathBuf,
}

impl FakeTunnel {
    fn closed(&self) -> usize {
        (1..=self.count.load(Ordering::SeqCst))
            .filter(|n| self.dir.join(format!("tunnel-{n}.closed")).exists())
            .count()
    }
}

#[async_trait]
impl TunnelLauncher for FakeTunnel {
    async fn open(&self, local_port: u16) -> underwood_oauth::Result<TunnelHandle> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let ready = self.dir.join(format!("tunnel-{n}.ready"));
        let closed = self.dir.join(format!("tunnel-{n}.closed"));
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(r#"trap 'echo closed > "$2"; exit 0' TERM; echo ready > "$1"; while :; do sleep 0.05; done"#)
            .arg("fake-tunnel")
            .arg(&ready)
            .arg(&closed)
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        // Block rather than sleep so a paused clock cannot run ahead of the shell.
        for _ in 0..500 {
            if ready.exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let _ = self.opened.send(local_port);
        Ok(TunnelHandle::from_child(child))
    }
}

#[derive(Default)]
struct NetState {
    next_id: u32,
    joined: Vec<(String, String)>,
    forgotten: Vec<String>,
    active: Option<String>,
    factory_resets: usize,
}

struct FakeNetwork {
    scan: Vec<ScannedNetwork>,
    password: String,
    online: AtomicBool,
    state: Mutex<NetState>,
}

impl FakeNetwork {
    fn new() -> Self {
        let ap = |bssid: &str, ssid: &str| ScannedNetwork {
            bssid: bssid.into(),
            signal: -50,
            ssid: ssid.into(),
        };
        Self {
            scan: vec![ap("aa:bb:cc:dd:ee:01", "home"), ap("aa:bb:cc:dd:ee:02", "Neighbor")],
            password: "correct-pass".into(),
            online: AtomicBool::new(true),
            state: Mutex::new(NetState::default()),
        }
    }

    fn offline(self) -> Self {
        self.online.store(false, Ordering::SeqCst);
        self
    }

    fn joined(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().joined.clone()
    }

    fn forgotten(&self) -> Vec<String> {
        self.state.lock().unwrap().forgotten.clone()
    }

    fn factory_resets(&self) -> usize {
        self.state.lock().unwrap().factory_resets
    }
}

#[async_trait]
impl NetworkProvisioner for FakeNetwork {
    async fn scan(&self) -> underwood_network::Result<Vec<ScannedNetwork>> {
        Ok(self.scan.clone())
    }

    async fn join(&self, ssid: &str, psk: &Secret<String>) -> underwood_network::Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state
            .joined
            .push((ssid.to_string(), psk.expose_secret().clone()));
        if *psk.expose_secret() == self.password {
            state.active = Some(ssid.to_string());
            self.online.store(true, Ordering::SeqCst);
        }
        Ok(state.next_id.to_string())
    }

    async fn forget(&self, network_id: &str) -> underwood_network::Result<()> {
        self.state
            .lock()
            .unwrap()
            .forgotten
            .push(network_id.to_string());
        Ok(())
    }

    async fn active_ssid(&self) -> Option<String> {
        self.state.lock().unwrap().active.clone()
    }

    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn reset_to_factory(&self) -> underwood_network::Result<()> {
        self.state.lock().unwrap().factory_resets += 1;
        Ok(())
    }
}

#[derive(Default)]
struct FakeGeolocator {
    fails: bool,
}

#[async_trait]
impl Geolocator for FakeGeolocator {
    async fn locate(&self, networks: &[ScannedNetwork]) -> underwood_network::Result<Coordinates> {
        if self.fails || networks.is_empty() {
            return Err(underwood_network::Error::message("no location"));
        }
        Ok(Coordinates {
            latitude: 39.78,
            longitude: -89.65,
        })
    }

    async fn reverse_geocode(&self, _at: Coordinates) -> underwood_network::Result<Place> {
        Ok(Place {
            city: Some("Springfield".into()),
            state: Some("Illinois".into()),
        })
    }
}

#[derive(Default)]
struct FakeComposer {
    fails: bool,
    panics: bool,
    requests: Mutex<Vec<AgendaRequest>>,
}

#[async_trait]
impl AgendaComposer for FakeComposer {
    async fn compose(&self, request: &AgendaRequest) -> underwood_session::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        assert!(!self.panics, "composer crashed");
        if self.fails {
            return Err(underwood_session::Error::message("model unavailable"));
        }
        Ok("Today [Tuesday]: dentist at 3pm.".into())
    }
}

fn credential(access: &str, refresh: Option<&str>, ttl_secs: i64) -> Credential {
    Credential {
        access_token: Secret::new(access.into()),
        refresh_token: refresh.map(|r| Secret::new(r.to_string())),
        expires_at: Some((unix_now() as i64 + ttl_secs).max(1) as u64),
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Options {
    offline: bool,
    refresh_fails: bool,
    revoke_fails: bool,
    geolocation_fails: bool,
    composer_fails: bool,
    composer_panics: bool,
}

struct Harness {
    ctx: Arc<SessionContext>,
    link: MemoryLink,
    output: broadcast::Receiver<String>,
    auth: Arc<FakeAuth>,
    tunnel: Arc<FakeTunnel>,
    tunnel_ports: mpsc::UnboundedReceiver<u16>,
    network: Arc<FakeNetwork>,
    schedule: Arc<InMemoryStore>,
    composer: Arc<FakeComposer>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with(Options::default())
    }

    fn with(options: Options) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let link = MemoryLink::new();
        let output = link.subscribe();
        let device = Arc::new(DeviceChannel::new(link.clone(), Pacing::NONE));
        let queue = Arc::new(InputQueue::new());

        let auth = Arc::new(FakeAuth {
            refresh_fails: options.refresh_fails,
            revoke_fails: options.revoke_fails,
            ..FakeAuth::default()
        });
        let (opened, tunnel_ports) = mpsc::unbounded_channel();
        let tunnel = Arc::new(FakeTunnel {
            opened,
            count: AtomicUsize::new(0),
            dir: dir.path().to_path_buf(),
        });
        let network = FakeNetwork::new();
        let network = Arc::new(if options.offline {
            network.offline()
        } else {
            network
        });
        let schedule = Arc::new(InMemoryStore::default());
        let composer = Arc::new(FakeComposer {
            fails: options.composer_fails,
            panics: options.composer_panics,
            ..FakeComposer::default()
        });

        let settings = Settings {
            settle_delay: Duration::ZERO,
            callback_port: 0,
            ..Settings::default()
        };
        let ctx = SessionContext::new(
            queue,
            device,
            PreferencesStore::new(dir.path().join("prefs.json")),
            CredentialStore::new(dir.path().join("token.json")),
            Collaborators {
                auth: auth.clone(),
                tunnel: tunnel.clone(),
                network: network.clone(),
                geolocator: Arc::new(FakeGeolocator {
                    fails: options.geolocation_fails,
                }),
                schedule: schedule.clone(),
                time_parser: Arc::new(NaturalTimeParser),
                composer: composer.clone(),
            },
            settings,
        );

        Self {
            ctx: Arc::new(ctx),
            link,
            output,
            auth,
            tunnel,
            tunnel_ports,
            network,
            schedule,
            composer,
            _dir: dir,
        }
    }

    fn type_text(&self, text: &str) {
        self.ctx.queue.put(InputFrame::from(text));
    }

    fn press(&self, control: ControlByte) {
        self.ctx.queue.put(InputFrame::control(control));
    }

    /// Wait until a printed message contains `needle`; returns it flattened.
    async fn expect(&mut self, needle: &str) -> String {
        let output = &mut self.output;
        let wait = async {
            loop {
                match output.recv().await {
                    Ok(message) => {
                        let flat = flatten(&message);
                        if flat.contains(needle) {
                            return flat;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => panic!("device closed"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(600), wait)
            .await
            .unwrap_or_else(|_| panic!("never printed {needle:?}"))
    }

    /// How many printed messages so far contain `needle`.
    fn printed(&self, needle: &str) -> usize {
        self.link
            .messages()
            .iter()
            .filter(|m| flatten(m).contains(needle))
            .count()
    }

    fn prefs(&self) -> Preferences {
        self.ctx.preferences.load().unwrap()
    }

    fn store_credential(&self, credential: &Credential) {
        self.ctx.credentials.save(credential).unwrap();
    }

    fn spawn<F, Fut>(&self, flow: F) -> tokio::task::JoinHandle<underwood_session::Result<FlowOutcome>>
    where
        F: FnOnce(Arc<SessionContext>) -> Fut,
        Fut: Future<Output = underwood_session::Result<FlowOutcome>> + Send + 'static,
    {
        tokio::spawn(flow(self.ctx.clone()))
    }
}

fn flatten(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

const ASK_SSID: &str = "network name (and then hit the RETURN key)";
const ASK_PASSWORD: &str = "what's the password for 'home'?";

// ── Wi-Fi ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wifi_known_network_connects_locates_and_starts_consent() {
    let mut h = Harness::new();
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect("I'll be your new personal assistant").await;
    h.expect(ASK_SSID).await;
    h.type_text("home");
    h.expect(ASK_PASSWORD).await;
    h.type_text("correct-pass");
    h.expect("I've successfully connected to home.").await;

    // Chained into account authorization: the tunnel comes up.
    let port = h.tunnel_ports.recv().await.unwrap();
    assert_ne!(port, 0);
    h.expect("visit this link on your phone").await;
    h.press(ControlByte::Cancel);

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Cancelled);
    assert_eq!(h.printed(ASK_SSID), 1);
    assert_eq!(h.network.joined(), vec![("home".to_string(), "correct-pass".to_string())]);
    assert!(h.network.forgotten().is_empty());

    let prefs = h.prefs();
    assert_eq!(prefs.city.as_deref(), Some("Springfield"));
    assert_eq!(prefs.state.as_deref(), Some("Illinois"));
    assert_eq!(prefs.latitude, Some(39.78));
    // Consent never finished, so this is still the first boot.
    assert!(prefs.first_boot);
    assert!(h.ctx.credentials.load().is_none());
}

#[tokio::test]
async fn wifi_with_connected_account_completes_and_ends_first_boot() {
    let mut h = Harness::new();
    h.store_credential(&credential("fresh", Some("r"), 3600));
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect(ASK_SSID).await;
    h.type_text("home");
    h.expect(ASK_PASSWORD).await;
    h.type_text("correct-pass");

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert_eq!(h.tunnel.count.load(Ordering::SeqCst), 0);
    assert!(!h.prefs().first_boot);
}

#[tokio::test]
async fn wifi_unknown_network_asks_for_the_name_again() {
    let mut h = Harness::new();
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect(ASK_SSID).await;
    h.type_text("nope");
    h.expect("couldn't find a network named 'nope'").await;
    h.expect(ASK_SSID).await;
    h.press(ControlByte::Cancel);
    h.expect("stopped setting up").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Cancelled);
    assert_eq!(h.printed("what's the password"), 0);
    assert!(h.network.joined().is_empty());
}

#[tokio::test]
async fn wifi_wrong_password_retries_password_after_removing_entry() {
    let mut h = Harness::new();
    h.store_credential(&credential("fresh", Some("r"), 3600));
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect(ASK_SSID).await;
    h.type_text("home");
    h.expect(ASK_PASSWORD).await;
    h.type_text("wrong-pass");
    h.expect("wasn't able to connect to 'home'").await;
    assert_eq!(h.network.forgotten(), vec!["1".to_string()]);

    h.type_text("correct-pass");
    h.expect("I've successfully connected to home.").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert_eq!(h.printed(ASK_SSID), 1);
    assert_eq!(h.printed(ASK_PASSWORD), 1);
    assert_eq!(h.network.joined().len(), 2);
    assert_eq!(h.network.forgotten(), vec!["1".to_string()]);
}

#[tokio::test]
async fn wifi_input_typed_during_a_join_is_kept() {
    let mut h = Harness::new();
    h.store_credential(&credential("fresh", Some("r"), 3600));
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect(ASK_SSID).await;
    h.type_text("home");
    h.expect(ASK_PASSWORD).await;
    // Both answers arrive before the first attempt has been checked.
    h.type_text("wrong-pass");
    h.type_text("correct-pass");

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert_eq!(h.network.joined(), vec![
        ("home".to_string(), "wrong-pass".to_string()),
        ("home".to_string(), "correct-pass".to_string()),
    ]);
}

#[tokio::test]
async fn wifi_geolocation_failure_uses_fallback_city() {
    let mut h = Harness::with(Options {
        geolocation_fails: true,
        ..Options::default()
    });
    h.store_credential(&credential("fresh", Some("r"), 3600));
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect(ASK_SSID).await;
    h.type_text("home");
    h.expect(ASK_PASSWORD).await;
    h.type_text("correct-pass");

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    let prefs = h.prefs();
    assert_eq!(prefs.city.as_deref(), Some("Chicago"));
    assert_eq!(prefs.state.as_deref(), Some("Illinois"));
    assert_eq!(prefs.latitude, None);
}

#[tokio::test(start_paused = true)]
async fn wifi_silence_times_out_to_idle() {
    let mut h = Harness::new();
    let started = tokio::time::Instant::now();
    let task = h.spawn(|ctx| async move { wifi::run(&ctx).await });

    h.expect(ASK_SSID).await;
    h.expect("If you want to try connecting").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(h.network.joined().is_empty());
}

// ── Account ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn oauth_fresh_credential_short_circuits() {
    let h = Harness::new();
    h.store_credential(&credential("fresh", None, 3600));

    let outcome = oauth::run(&h.ctx).await.unwrap();

    assert_eq!(outcome, FlowOutcome::Completed);
    assert_eq!(h.tunnel.count.load(Ordering::SeqCst), 0);
    assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oauth_expired_credential_refreshes_exactly_once() {
    let h = Harness::new();
    h.store_credential(&credential("stale", Some("keep-me"), -600));

    let outcome = oauth::run(&h.ctx).await.unwrap();

    assert_eq!(outcome, FlowOutcome::Completed);
    assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.tunnel.count.load(Ordering::SeqCst), 0);
    let stored = h.ctx.credentials.load().unwrap();
    assert_eq!(stored.access_token.expose_secret(), "refreshed-access");
    assert_eq!(
        stored.refresh_token.as_ref().map(|t| t.expose_secret().as_str()),
        Some("keep-me")
    );
}

#[tokio::test]
async fn oauth_failed_refresh_falls_back_to_consent() {
    let mut h = Harness::with(Options {
        refresh_fails: true,
        ..Options::default()
    });
    h.store_credential(&credential("stale", Some("revoked"), -600));
    let task = h.spawn(|ctx| async move { oauth::run(&ctx).await });

    let port = h.tunnel_ports.recv().await.unwrap();
    h.expect("visit this link on your phone").await;
    h.press(ControlByte::Cancel);
    h.expect("stopped waiting for your Google account").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Cancelled);
    assert_eq!(h.auth.refreshes.load(Ordering::SeqCst), 1);
    assert!(h.auth.exchanged.lock().unwrap().is_empty());
    assert_eq!(h.tunnel.closed(), 1);
    CallbackServer::bind(port).await.unwrap().shutdown().await;
}

#[tokio::test]
async fn oauth_consent_exchanges_code_and_offers_schedule() {
    let mut h = Harness::new();
    let task = h.spawn(|ctx| async move { oauth::run(&ctx).await });

    let port = h.tunnel_ports.recv().await.unwrap();
    let narration = h.expect("visit this link on your phone").await;
    assert!(narration.contains("in order for me to provide your agenda"));
    assert!(narration.contains("https://login.underwood.today"));
    h.expect("Google hasn't verified this app").await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let base = format!("http://127.0.0.1:{port}");

    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FOUND);
    assert_eq!(
        resp.headers()[reqwest::header::LOCATION],
        "https://accounts.example/consent?client_id=c"
    );

    let resp = client
        .get(format!("{base}/oauth2callback?state=st-1&code=the-code"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    h.expect("Hooray! You've successfully connected your Google account.")
        .await;
    h.expect("Type 'set' and then hit the RETURN key").await;
    h.type_text("set");
    h.expect("What time would you like").await;
    h.type_text("7:30 am");
    h.expect("Scheduled! You'll receive your daily agenda at 7:30 AM.")
        .await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert_eq!(*h.auth.exchanged.lock().unwrap(), vec![(
        "the-code".to_string(),
        "the-verifier".to_string()
    )]);
    let stored = h.ctx.credentials.load().unwrap();
    assert_eq!(stored.access_token.expose_secret(), "exchanged-access");

    let prefs = h.prefs();
    assert_eq!(prefs.given_name.as_deref(), Some("Ada"));
    assert_eq!(prefs.family_name.as_deref(), Some("Lovelace"));
    assert!(!prefs.first_boot);
    assert_eq!(h.schedule.find().await.unwrap().unwrap().time, at(7, 30));

    // The callback listener and the tunnel are gone.
    assert_eq!(h.tunnel.closed(), 1);
    CallbackServer::bind(port).await.unwrap().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn oauth_consent_keeps_listening_after_the_budget_runs_out() {
    let mut h = Harness::new();
    let task = h.spawn(|ctx| async move { oauth::run(&ctx).await });

    let port = h.tunnel_ports.recv().await.unwrap();
    h.expect("visit this link on your phone").await;
    h.expect("our session has timed out").await;
    assert!(!task.is_finished());

    let resp = reqwest::get(format!(
        "http://127.0.0.1:{port}/oauth2callback?state=st-1&code=late-code"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    h.expect("Hooray! You've successfully connected your Google account.")
        .await;
    h.expect("Would you like me to print your agenda").await;
    h.press(ControlByte::Cancel);

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Cancelled);
    assert_eq!(*h.auth.exchanged.lock().unwrap(), vec![(
        "late-code".to_string(),
        "the-verifier".to_string()
    )]);
    assert!(h.ctx.credentials.load().is_some());
}

#[tokio::test]
async fn oauth_returning_user_gets_reconnect_wording() {
    let mut h = Harness::new();
    h.ctx
        .preferences
        .update(|p| p.given_name = Some("Ada".into()))
        .unwrap();
    let task = h.spawn(|ctx| async move { oauth::run(&ctx).await });

    let port = h.tunnel_ports.recv().await.unwrap();
    h.expect("I need to get re-connected").await;
    h.press(ControlByte::OpenMenu);

    assert_eq!(
        task.await.unwrap().unwrap(),
        FlowOutcome::Preempted(ControlByte::OpenMenu)
    );
    assert_eq!(h.printed("Google hasn't verified this app"), 0);
    assert_eq!(h.tunnel.closed(), 1);
    CallbackServer::bind(port).await.unwrap().shutdown().await;
}

// ── Schedule ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schedule_set_change_and_delete_keep_a_single_job() {
    let mut h = Harness::new();

    let task = h.spawn(|ctx| async move { schedule::run(&ctx).await });
    h.expect("Would you like me to print your agenda").await;
    h.type_text("set");
    h.expect("What time would you like").await;
    h.type_text("4:35 pm");
    h.expect("at 4:35 PM.").await;
    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);

    let task = h.spawn(|ctx| async move { schedule::run(&ctx).await });
    h.expect("You're currently set up to receive your agenda at 4:35 pm.")
        .await;
    h.type_text("Change");
    h.type_text("7 in the morning");
    h.expect("at 7:00 AM.").await;
    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert_eq!(h.schedule.contents().lines().count(), 1);
    assert_eq!(h.schedule.find().await.unwrap().unwrap().time, at(7, 0));

    let task = h.spawn(|ctx| async move { schedule::run(&ctx).await });
    h.expect("at 7:00 am.").await;
    h.type_text("delete");
    h.expect("I've deleted your schedule!").await;
    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert!(h.schedule.find().await.unwrap().is_none());
}

#[tokio::test]
async fn schedule_rejects_unknown_choices_and_times() {
    let mut h = Harness::new();
    let task = h.spawn(|ctx| async move { schedule::run(&ctx).await });

    h.expect("Would you like me to print your agenda").await;
    // Nothing to delete yet.
    h.type_text("delete");
    h.expect("Please type 'delete', 'change', or 'set'").await;
    h.type_text("set");
    h.expect("What time would you like").await;
    h.type_text("whenever");
    h.expect("Please try again with a format like").await;
    h.expect("What time would you like").await;
    h.type_text("noon");
    h.expect("at 12:00 PM.").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn schedule_deadline_is_shared_across_prompts() {
    let mut h = Harness::new();
    let started = tokio::time::Instant::now();
    let task = h.spawn(|ctx| async move { schedule::run(&ctx).await });

    h.expect("Would you like me to print your agenda").await;
    tokio::time::sleep(Duration::from_secs(40)).await;
    h.type_text("set");
    h.expect("What time would you like").await;
    h.expect("Please try scheduling your agenda again").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::TimedOut);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(61), "{elapsed:?}");
    assert!(h.schedule.find().await.unwrap().is_none());
}

#[tokio::test]
async fn schedule_cancel_leaves_job_alone() {
    let mut h = Harness::new();
    h.schedule.upsert(at(9, 0)).await.unwrap();
    let task = h.spawn(|ctx| async move { schedule::run(&ctx).await });

    h.expect("at 9:00 am.").await;
    h.press(ControlByte::Cancel);
    h.expect("Your request to adjust your schedule has been canceled.")
        .await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Cancelled);
    assert_eq!(h.schedule.find().await.unwrap().unwrap().time, at(9, 0));
}

// ── Reset ───────────────────────────────────────────────────────────────────

fn seed_everything(h: &Harness) {
    h.ctx
        .preferences
        .save(&Preferences {
            first_boot: false,
            given_name: Some("Ada".into()),
            city: Some("Springfield".into()),
            ..Preferences::default()
        })
        .unwrap();
    h.store_credential(&credential("fresh", Some("r"), 3600));
}

#[rstest]
#[case::upper_case("RESET")]
#[case::padded("  reset ")]
#[tokio::test]
async fn reset_confirmed_wipes_everything(#[case] confirmation: &str) {
    let mut h = Harness::new();
    seed_everything(&h);
    h.schedule.upsert(at(8, 0)).await.unwrap();
    let task = h.spawn(|ctx| async move { reset::run(&ctx).await });

    h.expect("Type 'reset' and hit the RETURN key to confirm").await;
    h.type_text(confirmation);
    h.expect("The system has been reset").await;

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert_eq!(h.prefs(), Preferences::default());
    assert!(h.ctx.credentials.load().is_none());
    assert!(h.schedule.find().await.unwrap().is_none());
    assert_eq!(h.auth.revokes.load(Ordering::SeqCst), 1);
    assert_eq!(h.network.factory_resets(), 1);
}

#[tokio::test]
async fn reset_survives_a_failed_revoke() {
    let mut h = Harness::with(Options {
        revoke_fails: true,
        ..Options::default()
    });
    seed_everything(&h);
    let task = h.spawn(|ctx| async move { reset::run(&ctx).await });

    h.expect("Type 'reset'").await;
    h.type_text("reset");

    assert_eq!(task.await.unwrap().unwrap(), FlowOutcome::Completed);
    assert!(h.ctx.credentials.load().is_none());
    assert_eq!(h.network.factory_resets(), 1);
}

enum Answer {
    Text(&'static str),
    Cancel,
    Silence,
}

#[rstest]
#[case::other_text(Answer::Text("resets"), FlowOutcome::Cancelled, "I'll go ahead and cancel")]
#[case::cancel(Answer::Cancel, FlowOutcome::Cancelled, "reset the system has been canceled")]
#[case::silence(Answer::Silence, FlowOutcome::TimedOut, "I'll go ahead and cancel")]
#[tokio::test(start_paused = true)]
async fn reset_without_confirmation_touches_nothing(
    #[case] answer: Answer,
    #[case] expected: FlowOutcome,
    #[case] notice: &str,
) {
    let mut h = Harness::new();
    seed_everything(&h);
    h.schedule.upsert(at(8, 0)).await.unwrap();
    let before = h.prefs();
    let task = h.spawn(|ctx| async move { reset::run(&ctx).await });

    h.expect("Type 'reset'").await;
    match answer {
        Answer::Text(text) => h.type_text(text),
        Answer::Cancel => h.press(ControlByte::Cancel),
        Answer::Silence => {},
    }
    h.expect(notice).await;

    assert_eq!(task.await.unwrap().unwrap(), expected);
    assert_eq!(h.prefs(), before);
    assert!(h.ctx.credentials.load().is_some());
    assert!(h.schedule.find().await.unwrap().is_some());
    assert_eq!(h.auth.revokes.load(Ordering::SeqCst), 0);
    assert_eq!(h.network.factory_resets(), 0);
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

fn start_dispatcher(h: &Harness) -> tokio::task::JoinHandle<()> {
    let dispatcher = Dispatcher::new(h.ctx.clone());
    tokio::spawn(async move { dispatcher.run().await })
}

#[tokio::test]
async fn control_byte_preempts_the_active_flow() {
    let mut h = Harness::new();
    h.store_credential(&credential("fresh-access", None, 3600));
    h.ctx
        .preferences
        .update(|p| {
            p.given_name = Some("Ada".into());
            p.city = Some("Springfield".into());
        })
        .unwrap();
    let processor = start_dispatcher(&h);

    h.press(ControlByte::OpenMenu);
    h.expect("Here are some options").await;
    h.type_text("2");
    h.expect("Would you like me to print your agenda").await;
    h.press(ControlByte::GenerateAgenda);
    h.expect("I'm preparing your agenda. Please hold!").await;
    let agenda = h.expect("dentist at 3pm").await;
    assert!(agenda.contains("Today (Tuesday)"));

    let requests = h.composer.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].access_token.expose_secret(), "fresh-access");
    assert_eq!(requests[0].given_name.as_deref(), Some("Ada"));
    assert_eq!(requests[0].city.as_deref(), Some("Springfield"));
    assert_eq!(h.printed("Your request to adjust your schedule"), 0);

    processor.abort();
}

#[tokio::test(start_paused = true)]
async fn menu_reprompts_then_closes_on_silence() {
    let mut h = Harness::new();
    let processor = start_dispatcher(&h);

    h.press(ControlByte::OpenMenu);
    h.expect("5. Disconnect & reset the system").await;
    h.type_text("9");
    h.expect("I'm sorry, I didn't catch that. Please try again!").await;
    h.expect("I'll go ahead and close the menu").await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.ctx.state().is_idle());
    processor.abort();
}

#[tokio::test]
async fn menu_cancel_and_about() {
    let mut h = Harness::new();
    let processor = start_dispatcher(&h);

    h.press(ControlByte::OpenMenu);
    h.expect("Here are some options").await;
    h.press(ControlByte::Cancel);
    h.expect("Your last action has been canceled!").await;

    h.press(ControlByte::OpenMenu);
    h.expect("Here are some options").await;
    h.type_text("4");
    h.expect("daily agenda printed right here on the typewriter").await;

    processor.abort();
}

#[tokio::test]
async fn text_at_idle_is_ignored() {
    let mut h = Harness::new();
    let processor = start_dispatcher(&h);

    h.type_text("hello there");
    h.press(ControlByte::Cancel);
    h.press(ControlByte::ResetNetwork);
    h.expect("I'm resetting Wi-Fi to default. Please hold!").await;
    h.expect("Wi-Fi has been reset to default.").await;

    assert_eq!(h.network.factory_resets(), 1);
    assert_eq!(h.link.messages().len(), 2);
    processor.abort();
}

#[tokio::test]
async fn startup_online_greets() {
    let mut h = Harness::new();
    Dispatcher::new(h.ctx.clone()).startup().await;

    h.expect("All set! You can hit the EXPR key").await;
    assert!(h.ctx.state().is_idle());
}

#[tokio::test]
async fn startup_offline_runs_wifi_setup() {
    let mut h = Harness::with(Options {
        offline: true,
        ..Options::default()
    });
    let dispatcher = Dispatcher::new(h.ctx.clone());
    let startup = tokio::spawn(async move { dispatcher.startup().await });

    h.expect(ASK_SSID).await;
    h.press(ControlByte::Cancel);
    startup.await.unwrap();

    assert_eq!(h.printed("All set!"), 0);
    assert!(h.ctx.state().is_idle());
}

#[tokio::test]
async fn agenda_while_offline_sets_up_wifi_first() {
    let mut h = Harness::with(Options {
        offline: true,
        ..Options::default()
    });
    let processor = start_dispatcher(&h);

    h.press(ControlByte::GenerateAgenda);
    h.expect("Please hold!").await;
    h.expect(ASK_SSID).await;
    h.press(ControlByte::Cancel);
    h.expect("stopped setting up").await;

    assert!(h.composer.requests.lock().unwrap().is_empty());
    processor.abort();
}

#[tokio::test]
async fn panicking_flow_apologizes_and_processor_keeps_going() {
    let mut h = Harness::with(Options {
        composer_panics: true,
        ..Options::default()
    });
    h.store_credential(&credential("fresh", None, 3600));
    let processor = start_dispatcher(&h);

    h.press(ControlByte::GenerateAgenda);
    h.expect("something went wrong on my end").await;
    assert!(h.ctx.state().is_idle());

    h.press(ControlByte::ResetNetwork);
    h.expect("Wi-Fi has been reset to default.").await;

    assert!(!processor.is_finished());
    assert_eq!(h.network.factory_resets(), 1);
    processor.abort();
}

#[tokio::test]
async fn agenda_composer_failure_apologizes() {
    let mut h = Harness::with(Options {
        composer_fails: true,
        ..Options::default()
    });
    h.store_credential(&credential("fresh", None, 3600));
    let processor = start_dispatcher(&h);

    h.press(ControlByte::GenerateAgenda);
    h.expect("wasn't able to put your agenda together").await;

    assert_eq!(h.composer.requests.lock().unwrap().len(), 1);
    processor.abort();
}
