use crate::error::ActionClientError;
use crate::request::Request;
use http::HeaderValue;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that adds a `User-Agent` header to requests
#[derive(Clone, Debug)]
pub struct UserAgentLayer {
    user_agent: String,
}

impl UserAgentLayer {
    /// Create a new `UserAgentLayer` with the specified user agent string
    ///
    /// # Errors
    /// Returns `ActionClientError::InvalidHeaderValue` if the user agent string is not valid
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, ActionClientError> {
        let user_agent = user_agent.as_ref();
        HeaderValue::from_str(user_agent)?;
        Ok(Self {
            user_agent: user_agent.to_owned(),
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Service that adds a `User-Agent` header to requests
#[derive(Clone, Debug)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: String,
}

impl<S> Service<Request> for UserAgentService<S>
where
    S: Service<Request>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Only add User-Agent if not already present
        req.headers_mut()
            .insert_if_absent("User-Agent", self.user_agent.as_str());
        self.inner.call(req)
    }
}
