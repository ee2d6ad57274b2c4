use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex as StdMutex, RwLock},
    time::Duration,
};

use {
    axum::{
        Router,
        extract::State,
        http::{StatusCode, Uri, header},
        response::{Html, IntoResponse, Response},
    },
    tokio::{
        net::TcpListener,
        sync::{Mutex, oneshot},
        task::JoinHandle,
    },
    tracing::{debug, info, warn},
};

use crate::{Error, Result};

const SUCCESS_PAGE: &str = r#"<html>
<head><title>Authorization Successful</title><meta name="viewport" content="width=device-width, initial-scale=1"></head>
<body style="font-family: Courier, monospace; padding: 20px">
<h1>Authorization confirmed!<br><br>You can now close this window.</h1>
<p>If you change your mind later, visit your <a href="https://myaccount.google.com/connections">Google Account</a> and look for 'Underwood' to revoke access.</p>
</body>
</html>"#;

const FAILURE_PAGE: &str = r#"<html>
<head><title>Authorization Failed</title><meta name="viewport" content="width=device-width, initial-scale=1"></head>
<body style="font-family: Courier, monospace; padding: 20px">
<h1>I'm sorry, but you'll need to authorize access in order to continue.<br><br><a href="/">Please try the process again.</a></h1>
</body>
</html>"#;

const NOT_READY_PAGE: &str = "<html><body><h1>Service Unavailable</h1><p>The sign-in link is not ready yet.</p></body></html>";

struct Shared {
    consent: RwLock<Option<Consent>>,
    code_tx: StdMutex<Option<oneshot::Sender<String>>>,
    /// Held for the duration of each request so requests are served one at a time.
    turn: Mutex<()>,
}

#[derive(Clone)]
struct Consent {
    url: String,
    state: Option<String>,
}

impl Shared {
    fn consent(&self) -> Option<Consent> {
        self.consent
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Local HTTP listener receiving the provider's redirect.
///
/// `GET /` redirects to the consent URL once it is set (503 before then).
/// Any request carrying a query, or on any other path, is a callback: with a
/// `code` it records the code and answers 200, without one it answers 400.
/// The server stops on [`shutdown`](Self::shutdown) or when dropped.
pub struct CallbackServer {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    code_rx: Option<oneshot::Receiver<String>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind `127.0.0.1:{port}` and start serving. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        let local_addr = listener.local_addr()?;

        let (code_tx, code_rx) = oneshot::channel();
        let shared = Arc::new(Shared {
            consent: RwLock::new(None),
            code_tx: StdMutex::new(Some(code_tx)),
            turn: Mutex::new(()),
        });

        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&shared));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                warn!(error = %e, "callback listener failed");
            }
        });

        info!(addr = %local_addr, "callback listener started");
        Ok(Self {
            local_addr,
            shared,
            code_rx: Some(code_rx),
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Publish the consent URL served from `/`. Callbacks carrying a `state`
    /// other than `state` are rejected.
    pub fn set_consent_url(&self, url: impl Into<String>, state: Option<String>) {
        let mut consent = self
            .shared
            .consent
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *consent = Some(Consent {
            url: url.into(),
            state,
        });
    }

    /// Wait up to `budget` for a callback with a code.
    ///
    /// Returns `Ok(None)` when the budget elapses; waiting may then resume.
    pub async fn wait_for_code(&mut self, budget: Duration) -> Result<Option<String>> {
        let Some(rx) = self.code_rx.as_mut() else {
            return Err(Error::message("authorization code already received"));
        };
        match tokio::time::timeout(budget, rx).await {
            Ok(Ok(code)) => {
                self.code_rx = None;
                Ok(Some(code))
            },
            Ok(Err(_)) => {
                self.code_rx = None;
                Err(Error::message("callback listener stopped"))
            },
            Err(_) => Ok(None),
        }
    }

    /// Stop accepting requests and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(Duration::from_secs(5), &mut task)
                .await
                .is_err()
        {
            warn!("callback listener did not drain in time, aborting");
            task.abort();
        }
        info!(addr = %self.local_addr, "callback listener stopped");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle(State(shared): State<Arc<Shared>>, uri: Uri) -> Response {
    let _turn = shared.turn.lock().await;

    let query = uri.query().filter(|q| !q.is_empty());
    if uri.path() == "/" && query.is_none() {
        return match shared.consent() {
            Some(consent) => {
                debug!("redirecting to consent page");
                (StatusCode::FOUND, [(header::LOCATION, consent.url)]).into_response()
            },
            None => (StatusCode::SERVICE_UNAVAILABLE, Html(NOT_READY_PAGE)).into_response(),
        };
    }

    let params: HashMap<String, String> =
        url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        let reason = params.get("error").map(String::as_str).unwrap_or("missing code");
        warn!(path = uri.path(), reason, "callback without authorization code");
        return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response();
    };

    let expected = shared.consent().and_then(|c| c.state);
    if let Some(expected) = expected
        && params.get("state") != Some(&expected)
    {
        warn!(present = params.contains_key("state"), "callback state mismatch");
        return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response();
    }

    if let Some(tx) = shared
        .code_tx
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
    {
        let _ = tx.send(code.clone());
        info!("authorization code received");
    }
    (StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
}
