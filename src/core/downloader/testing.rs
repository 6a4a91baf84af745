// Canned transport for unit tests. Never talks to the network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};

use crate::core::http::{Transport, TransportError, TransportResponse};

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    /// 200 with the whole body in one chunk.
    Body(Vec<u8>),
    /// Given status with an empty body.
    Status(u16),
    /// Transport error before any status is seen.
    Fail(TransportError),
    /// 200 that yields one chunk and then never completes.
    Stall(Vec<u8>),
    /// 200 that yields `count` copies of `chunk`, one every `every`.
    Trickle {
        chunk: Vec<u8>,
        count: usize,
        every: Duration,
    },
}

/// Replays scripted responses per URL and counts requests.
///
/// Responses for a URL are consumed in order; the last one repeats.
/// Unrouted URLs answer 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, responses: Vec<Scripted>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    pub fn serve(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.route(url, vec![Scripted::Body(body.into())])
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    fn next_for(&self, url: &str) -> Scripted {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Scripted::Status(404)),
            None => Scripted::Status(404),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        match self.next_for(url) {
            Scripted::Body(body) => Ok(TransportResponse {
                status: 200,
                content_length: Some(body.len() as u64),
                body: stream::once(async move { Ok(Bytes::from(body)) }).boxed(),
            }),
            Scripted::Status(status) => Ok(TransportResponse {
                status,
                content_length: Some(0),
                body: stream::empty().boxed(),
            }),
            Scripted::Fail(error) => Err(error),
            Scripted::Stall(first) => Ok(TransportResponse {
                status: 200,
                content_length: None,
                body: stream::once(async move { Ok(Bytes::from(first)) })
                    .chain(stream::pending())
                    .boxed(),
            }),
            Scripted::Trickle { chunk, count, every } => Ok(TransportResponse {
                status: 200,
                content_length: Some((chunk.len() * count) as u64),
                body: stream::iter(0..count)
                    .then(move |_| {
                        let chunk = Bytes::from(chunk.clone());
                        async move {
                            tokio::time::sleep(every).await;
                            Ok(chunk)
                        }
                    })
                    .boxed(),
            }),
        }
    }
}
