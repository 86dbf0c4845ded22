//! Client and per-document configuration (spec.md §6, SPEC_FULL §2),
//! following the `Default` + builder-method shape of
//! `braid-http::client::ClientConfig`.

use std::time::Duration;

/// Authentication is injected by the caller; the wire format and the
/// actual HTTP/gRPC transport are out of scope (§1 Non-goals) — this is
/// the seam a real transport implementation would read.
pub trait AuthTokenInjector: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// `ClientOptions` (spec.md §6): defaults realtime sync with a 50ms loop
/// and a 1000ms stream-reconnect backoff.
///
/// `sync_loop_duration` and `reconnect_stream_delay` drive the client's own
/// opportunistic-sync scheduling and watch-stream reconnect backoff (see
/// `client::run_watch_loop`/`schedule_realtime_sync`). `api_key` and
/// `auth_token_injector` carry no meaning inside this crate, since wire
/// encoding and authentication are out of scope (§1 Non-goals) — they are
/// surfaced here so a concrete `Coordinator` transport, constructed with
/// access to `Client::options()`, can read them when building requests.
pub struct ClientOptions {
    pub key: Option<String>,
    pub api_key: Option<String>,
    pub sync_loop_duration: Duration,
    pub reconnect_stream_delay: Duration,
    pub auth_token_injector: Option<Box<dyn AuthTokenInjector>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            key: None,
            api_key: None,
            sync_loop_duration: Duration::from_millis(50),
            reconnect_stream_delay: Duration::from_millis(1000),
            auth_token_injector: None,
        }
    }
}

impl ClientOptions {
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }
}

#[derive(Default)]
pub struct ClientOptionsBuilder {
    inner: PartialOptions,
}

#[derive(Default)]
struct PartialOptions {
    key: Option<String>,
    api_key: Option<String>,
    sync_loop_duration: Option<Duration>,
    reconnect_stream_delay: Option<Duration>,
    auth_token_injector: Option<Box<dyn AuthTokenInjector>>,
}

impl ClientOptionsBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.inner.key = Some(key.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.inner.api_key = Some(api_key.into());
        self
    }

    pub fn sync_loop_duration(mut self, duration: Duration) -> Self {
        self.inner.sync_loop_duration = Some(duration);
        self
    }

    pub fn reconnect_stream_delay(mut self, duration: Duration) -> Self {
        self.inner.reconnect_stream_delay = Some(duration);
        self
    }

    pub fn auth_token_injector(mut self, injector: Box<dyn AuthTokenInjector>) -> Self {
        self.inner.auth_token_injector = Some(injector);
        self
    }

    pub fn build(self) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            key: self.inner.key.or(defaults.key),
            api_key: self.inner.api_key.or(defaults.api_key),
            sync_loop_duration: self.inner.sync_loop_duration.unwrap_or(defaults.sync_loop_duration),
            reconnect_stream_delay: self
                .inner
                .reconnect_stream_delay
                .unwrap_or(defaults.reconnect_stream_delay),
            auth_token_injector: self.inner.auth_token_injector.or(defaults.auth_token_injector),
        }
    }
}

/// Per-project admission-control knob (§4.7, S6): the size limit a local
/// `update` is checked against before it commits.
#[derive(Clone, Copy, Debug)]
pub struct DocumentOptions {
    pub max_size_per_document: Option<u64>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            max_size_per_document: None,
        }
    }
}

impl DocumentOptions {
    pub fn with_max_size(max_size_per_document: u64) -> Self {
        Self {
            max_size_per_document: Some(max_size_per_document),
        }
    }
}
