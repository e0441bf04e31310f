#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Declarative clients: request building and submission.

use action_client::{
    ActionClient, ActionClientError, AdapterRegistry, Body, ClientConfig, ConfigError, Headers,
    Method, NullAdapter, Response, StatusCode, TemplateSet,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn config(headers: &[(&str, &str)]) -> ClientConfig {
    ClientConfig {
        url: Some("https://example.com".to_owned()),
        adapter: "stub".to_owned(),
        headers: headers
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect::<BTreeMap<_, _>>(),
        ..ClientConfig::default()
    }
}

fn templates() -> TemplateSet {
    TemplateSet::new()
        .json(
            "articles/create",
            |locals| json!({"title": locals["article"]["title"]}),
        )
        .json("articles/destroy", |_| json!({"confirm": true}))
        .xml("articles/update", |locals| {
            format!(
                "<xml>{}</xml>",
                locals["article"]["title"].as_str().unwrap_or_default()
            )
        })
}

fn client(adapter: NullAdapter, headers: &[(&str, &str)]) -> ActionClient {
    ActionClient::builder("articles")
        .config(&config(headers))
        .adapters(AdapterRegistry::new().with("stub", adapter))
        .renderer(templates())
        .action("create", |ctx, _args| ctx.post().path("/articles").build())
        .action("all", |ctx, _args| ctx.get().path("/articles").build())
        .action("destroy", |ctx, args| {
            ctx.delete()
                .path(format!("/articles/{}", args["article"]["id"]))
                .build()
        })
        .action("update", |ctx, args| {
            ctx.patch()
                .path(format!("/articles/{}", args["article"]["id"]))
                .locals(json!({"article": args["article"]}))
                .build()
        })
        .build()
        .unwrap()
}

fn article() -> Value {
    json!({"article": {"id": 1, "title": "Article Title"}})
}

#[test]
fn test_post_with_json_template() {
    let request = client(NullAdapter::default(), &[])
        .request("create", &article())
        .unwrap();

    assert_eq!(request.method(), Method::Post);
    assert_eq!(request.url(), "https://example.com/articles");
    assert_eq!(
        serde_json::from_slice::<Value>(request.body()).unwrap(),
        json!({"title": "Article Title"})
    );
    assert_eq!(
        request.headers().get("Content-Type"),
        Some("application/json")
    );
}

#[test]
fn test_get_without_template_uses_declared_content_type() {
    let request = client(
        NullAdapter::default(),
        &[("Content-Type", "application/json")],
    )
    .request("all", &Value::Null)
    .unwrap();

    assert_eq!(request.method(), Method::Get);
    assert!(request.body().is_empty());
    assert_eq!(
        request.headers().get("Content-Type"),
        Some("application/json")
    );
}

#[test]
fn test_delete_with_json_template() {
    let request = client(NullAdapter::default(), &[])
        .request("destroy", &article())
        .unwrap();

    assert_eq!(request.method(), Method::Delete);
    assert_eq!(request.url(), "https://example.com/articles/1");
    assert_eq!(
        serde_json::from_slice::<Value>(request.body()).unwrap(),
        json!({"confirm": true})
    );
}

#[test]
fn test_patch_with_xml_template() {
    let request = client(NullAdapter::default(), &[])
        .request("update", &article())
        .unwrap();

    assert_eq!(request.method(), Method::Patch);
    assert_eq!(request.body().as_ref(), b"<xml>Article Title</xml>");
    assert_eq!(
        request.headers().get("Content-Type"),
        Some("application/xml")
    );
}

#[tokio::test]
async fn test_submit_returns_decoded_triple() {
    let adapter = NullAdapter::new(Response::new(
        StatusCode::CREATED,
        Headers::from([("content-type", "application/json")]),
        r#"{"responded": true}"#,
    ));
    let client = client(adapter.clone(), &[]);

    let (status, headers, body) = client
        .submit("create", &article())
        .await
        .unwrap()
        .into_parts();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers.get("Content-Type"), Some("application/json"));
    assert_eq!(body, Body::Json(json!({"responded": true})));

    let sent = adapter.last_request().unwrap();
    assert_eq!(sent.url(), "https://example.com/articles");
    assert!(sent.headers().contains("User-Agent"));
}

#[tokio::test]
async fn test_submit_surfaces_decode_error() {
    let adapter = NullAdapter::new(Response::new(
        StatusCode::OK,
        Headers::from([("Content-Type", "application/json")]),
        "junk",
    ));

    let err = client(adapter, &[])
        .submit("all", &Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.as_decode().unwrap().raw_body_lossy(), "junk");
}

#[tokio::test]
async fn test_unknown_action_never_reaches_adapter() {
    let adapter = NullAdapter::default();
    let err = client(adapter.clone(), &[])
        .submit("archive", &Value::Null)
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert!(matches!(
        err,
        ActionClientError::Config(ConfigError::UnknownAction(ref name)) if name == "archive"
    ));
    assert_eq!(adapter.call_count(), 0);
}

#[test]
fn test_invalid_default_url_fails_at_build() {
    let err = ActionClient::builder("articles")
        .config(&ClientConfig {
            url: Some("ftp://example.com".to_owned()),
            adapter: "null".to_owned(),
            ..ClientConfig::default()
        })
        .adapters(AdapterRegistry::new().with("null", NullAdapter::default()))
        .build()
        .unwrap_err();

    assert!(matches!(err, ActionClientError::InvalidScheme { ref scheme, .. } if scheme == "ftp"));
}
