use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use orgbatch::executor::{ConnectFuture, DisposeFuture};
use orgbatch::service::AuthMode;
use orgbatch::{ConnectionError, ConnectionFactory, ServiceConfig};
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub const USERNAME: &str = "svc-batch";
pub const PASSWORD: &str = "batch-secret";
/// `Authorization` header produced for [`USERNAME`]/[`PASSWORD`].
pub const BASIC_AUTHORIZATION: &str = "Basic c3ZjLWJhdGNoOmJhdGNoLXNlY3JldA==";

pub fn credentials() -> AuthMode {
    AuthMode::Credentials {
        username: USERNAME.into(),
        password: PASSWORD.into(),
    }
}

pub fn service_config(url: &str, parallelism: i32) -> anyhow::Result<ServiceConfig> {
    ServiceConfig::builder()
        .endpoint(url)
        .auth(credentials())
        .degree_of_parallelism(parallelism)
        .request_timeout(Duration::from_secs(5))
        .build()
}

/// Connection handed out by [`CountingFactory`].
#[derive(Debug)]
pub struct CountedConnection {
    pub id: usize,
    pub served: Vec<u64>,
}

/// Factory that counts every connection it creates and disposes, tracking how
/// many are alive at once.
#[derive(Default)]
pub struct CountingFactory {
    created: AtomicUsize,
    disposed: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    refuse: bool,
    served_log: Mutex<Vec<(usize, Vec<u64>)>>,
    connect_delay: Option<Duration>,
}

impl CountingFactory {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn with_connect_delay(delay: Duration) -> Self {
        Self {
            connect_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn peak_live(&self) -> usize {
        self.peak_live.load(Ordering::SeqCst)
    }

    /// Requests each disposed connection served, in the order it served them.
    pub fn served_log(&self) -> Vec<(usize, Vec<u64>)> {
        let mut log = self.served_log.lock().expect("served log poisoned").clone();
        log.sort_by_key(|(id, _)| *id);
        log
    }
}

impl ConnectionFactory for CountingFactory {
    type Connection = CountedConnection;

    fn connect(&self) -> ConnectFuture<'_, CountedConnection> {
        Box::pin(async move {
            if let Some(delay) = self.connect_delay {
                tokio::time::sleep(delay).await;
            }
            if self.refuse {
                return Err(ConnectionError::with_endpoint(
                    "counting://refused",
                    anyhow!("connection refused"),
                ));
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst);
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_live.fetch_max(live, Ordering::SeqCst);
            Ok(CountedConnection {
                id,
                served: Vec::new(),
            })
        })
    }

    fn dispose(&self, connection: CountedConnection) -> DisposeFuture<'_> {
        Box::pin(async move {
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.disposed.fetch_add(1, Ordering::SeqCst);
            self.served_log
                .lock()
                .expect("served log poisoned")
                .push((connection.id, connection.served));
        })
    }
}

pub fn shared<F: ConnectionFactory>(factory: F) -> Arc<F> {
    Arc::new(factory)
}
