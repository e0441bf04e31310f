use super::{Next, Stage, UserAgentLayer};
use crate::error::ActionClientError;
use crate::headers::Headers;
use crate::parser::ContentNegotiator;
use crate::request::Request;
use crate::response::Response;
use std::sync::Arc;

/// Sets `Content-Length` from the body when the body is non-empty and neither
/// `Content-Length` nor `Transfer-Encoding` is already declared.
#[must_use]
pub fn content_length() -> Stage<Request> {
    Stage::from_fn(
        "content_length",
        |request: Request, next: Next<Request>| async move {
            let request = if request.body().is_empty()
                || request.headers().contains("content-length")
                || request.headers().contains("transfer-encoding")
            {
                request
            } else {
                let length = request.body().len().to_string();
                request.with_header("Content-Length", length)
            };
            next.run(request).await
        },
    )
}

/// Fills in `headers` the request does not already declare.
#[must_use]
pub fn default_headers(headers: Headers) -> Stage<Request> {
    let headers = Arc::new(headers);
    Stage::from_fn(
        "default_headers",
        move |mut request: Request, next: Next<Request>| {
            request.headers_mut().with_defaults(&headers);
            next.run(request)
        },
    )
}

/// Logs one line per outgoing request: `ActionClient - METHOD - url`.
#[must_use]
pub fn request_logger() -> Stage<Request> {
    Stage::from_fn("request_logger", |request: Request, next: Next<Request>| {
        tracing::info!(
            target: "action_client::request",
            "ActionClient - {} - {}",
            request.method(),
            request.url()
        );
        next.run(request)
    })
}

/// Adds a `User-Agent` header unless the request already carries one.
///
/// # Errors
/// Returns `InvalidHeaderValue` if `agent` is not a legal header value.
pub fn user_agent(agent: &str) -> Result<Stage<Request>, ActionClientError> {
    Ok(Stage::from_layer(
        "user_agent",
        UserAgentLayer::try_new(agent)?,
    ))
}

/// Decodes response bodies with `negotiator`.
///
/// Installed outermost on the response side so that it runs after every
/// other response stage has seen the raw body.
#[must_use]
pub fn parse_body(negotiator: ContentNegotiator) -> Stage<Response> {
    let negotiator = Arc::new(negotiator);
    Stage::from_fn(
        "parse_body",
        move |request: Request, next: Next<Response>| {
            let negotiator = Arc::clone(&negotiator);
            async move {
                let response = next.run(request).await?;
                negotiator.decode(response)
            }
        },
    )
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::middleware::{BoxedService, RequestStack, ResponseStack};
    use crate::parser::{ErrorHandlerRegistry, ParserRegistry};
    use crate::request::Method;
    use crate::response::Body;
    use http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;
    use tower::util::BoxCloneSyncService;
    use tracing_test::traced_test;

    async fn run_request_stage(stage: Stage<Request>, request: Request) -> Request {
        RequestStack::new()
            .with(stage)
            .build(RequestStack::identity())
            .oneshot(request)
            .await
            .unwrap()
    }

    fn post(body: &'static str) -> Request {
        Request::new(Method::Post, "https://example.com/articles")
            .unwrap()
            .with_body(body)
    }

    #[tokio::test]
    async fn test_content_length_counts_bytes() {
        let request =
            run_request_stage(content_length(), post(r#"{"title":"Hello, World"}"#)).await;
        assert_eq!(request.headers().get("Content-Length"), Some("24"));

        let request = run_request_stage(content_length(), post("Art\u{ed}culo")).await;
        assert_eq!(request.headers().get("Content-Length"), Some("9"));
    }

    #[tokio::test]
    async fn test_content_length_skips_empty_and_declared() {
        let request = run_request_stage(content_length(), post("")).await;
        assert!(!request.headers().contains("Content-Length"));

        let request = run_request_stage(
            content_length(),
            post("abc").with_header("content-length", "3"),
        )
        .await;
        assert_eq!(request.headers().len(), 1);

        let request = run_request_stage(
            content_length(),
            post("abc").with_header("Transfer-Encoding", "chunked"),
        )
        .await;
        assert!(!request.headers().contains("Content-Length"));
    }

    #[tokio::test]
    async fn test_default_headers_do_not_override() {
        let stage = default_headers(Headers::from([
            ("Accept", "application/json"),
            ("Authorization", "Bearer default"),
        ]));
        let request = run_request_stage(stage, post("").with_header("accept", "text/xml")).await;
        assert_eq!(request.headers().get("Accept"), Some("text/xml"));
        assert_eq!(
            request.headers().get("Authorization"),
            Some("Bearer default")
        );
    }

    #[tokio::test]
    async fn test_user_agent_stage() {
        let request = run_request_stage(user_agent("articles/1.0").unwrap(), post("")).await;
        assert_eq!(request.headers().get("User-Agent"), Some("articles/1.0"));

        let request = run_request_stage(
            user_agent("articles/1.0").unwrap(),
            post("").with_header("user-agent", "custom"),
        )
        .await;
        assert_eq!(request.headers().get("User-Agent"), Some("custom"));

        assert!(user_agent("bad\nagent").is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_request_logger_line() {
        run_request_stage(request_logger(), post("")).await;
        assert!(logs_contain(
            "ActionClient - POST - https://example.com/articles"
        ));
    }

    #[tokio::test]
    async fn test_parse_body_decodes_after_inner_stages() {
        let endpoint: BoxedService<Response> =
            BoxCloneSyncService::new(tower::service_fn(|_request: Request| {
                std::future::ready(Ok::<_, ActionClientError>(Response::new(
                    StatusCode::OK,
                    Headers::from([("Content-Type", "application/json")]),
                    r#"{"id": 1}"#,
                )))
            }));
        let saw_raw = Stage::from_fn(
            "inspect",
            |request: Request, next: Next<Response>| async move {
                let response = next.run(request).await?;
                assert!(matches!(response.body(), Body::Raw(_)));
                Ok(response)
            },
        );
        let negotiator =
            ContentNegotiator::new(ParserRegistry::defaults(), ErrorHandlerRegistry::defaults());

        let response = ResponseStack::new()
            .with(parse_body(negotiator))
            .with(saw_raw)
            .build(endpoint)
            .oneshot(post(""))
            .await
            .unwrap();
        assert_eq!(response.body(), &Body::Json(json!({"id": 1})));
    }
}
