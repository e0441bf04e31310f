use super::Adapter;
use crate::error::ActionClientError;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type Responder = dyn Fn(&Request) -> Result<Response, ActionClientError> + Send + Sync;

/// In-memory transport that never touches the network.
///
/// Answers every request with a fixed response (or a responder function) and
/// records the requests it receives. Response header names are returned in
/// canonical form like any other transport.
#[derive(Clone)]
pub struct NullAdapter {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl fmt::Debug for NullAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NullAdapter")
            .field("requests", &self.requests.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for NullAdapter {
    /// Answers `200 OK` with no headers and an empty body.
    fn default() -> Self {
        Self::new(Response::empty())
    }
}

impl NullAdapter {
    /// Answer every request with a clone of `response`.
    #[must_use]
    pub fn new(response: Response) -> Self {
        Self::from_fn(move |_request| Ok(response.clone()))
    }

    /// Answer each request with the result of `responder`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&Request) -> Result<Response, ActionClientError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Most recent request, if any.
    #[must_use]
    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Adapter for NullAdapter {
    async fn call(&self, request: Request) -> Result<Response, ActionClientError> {
        let result = (self.responder)(&request);
        self.requests.lock().push(request);
        let response = result?;
        let headers = response.headers().canonicalized();
        Ok(response.with_headers(headers))
    }
}
