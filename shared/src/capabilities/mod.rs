//! Effect capabilities.
//!
//! `App::update` never performs I/O. It asks crux's HTTP, key-value and render
//! capabilities for work, and the shell performs it. The domain request types
//! in `http` and `kv` are validated here before anything reaches a capability.

mod http;
mod kv;

pub use self::http::{
    HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResult, ValidatedUrl,
    DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS,
};
pub use self::kv::{
    KeyNamespace, KvError, KvKey, KvOperation, KvOutput, KvResult, TypedKvStore,
};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use tracing::debug;

use crate::app::App;
use crate::event::Event;

/// Header the shell can use to correlate its logs with the core's.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
}

impl Capabilities {
    /// Hands `request` to the HTTP capability; `make_event` receives the outcome
    /// with every status code as a response.
    pub fn send_http<F>(&self, request: HttpRequest, make_event: F)
    where
        F: FnOnce(HttpResult) -> Event + Send + 'static,
    {
        debug!(
            method = %request.method(),
            url = %request.url(),
            request_id = request.request_id(),
            "http request queued"
        );
        let in_flight = request.in_flight();
        let mut builder = self
            .http
            .request(request.method().to_wire(), request.url().as_url().clone())
            .header(REQUEST_ID_HEADER, request.request_id());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body_bytes(body);
        }
        builder.send(move |result| make_event(in_flight.settle(result)));
    }

    pub fn run_kv<F>(&self, operation: KvOperation, make_event: F)
    where
        F: FnOnce(KvResult) -> Event + Send + Sync + 'static,
    {
        debug!(key = %operation.key(), "kv operation queued");
        match operation {
            KvOperation::Get { key } => self.kv.get(key.raw(), move |result| {
                make_event(result.map(KvOutput::Value).map_err(KvError::from))
            }),
            KvOperation::Set { key, value } => self.kv.set(key.raw(), value, move |result| {
                make_event(result.map(|_| KvOutput::Written).map_err(KvError::from))
            }),
            KvOperation::Delete { key } => self.kv.delete(key.raw(), move |result| {
                make_event(
                    result
                        .map(|previous| KvOutput::Deleted {
                            existed: previous.is_some(),
                        })
                        .map_err(KvError::from),
                )
            }),
        }
    }
}
