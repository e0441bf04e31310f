use action_client::middleware::{default_headers, request_logger, user_agent};
use action_client::{
    AdapterRegistry, Body, ClientConfig, Headers, Method, Pipeline, Request, Response, XmlElement,
    XmlNode, parse_url,
};
use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Send one request through an action-client pipeline and print the result
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(name = "action-client")]
struct Cli {
    /// YAML configuration file (`ACTION_CLIENT_*` variables override it)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// HTTP method, e.g. GET or post
    method: String,

    /// Absolute URL, or a path joined onto the configured default URL
    target: String,

    /// Extra header, `Name: value`; may be repeated
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header '{raw}' is not in 'Name: value' form");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header '{raw}' has an empty name");
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

fn is_absolute(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

fn build_request(cli: &Cli, config: &ClientConfig) -> anyhow::Result<Request> {
    let method: Method = cli.method.parse()?;
    let defaults = config.resolve()?;
    let url = if is_absolute(&cli.target) {
        parse_url(&cli.target)?
    } else {
        defaults
            .join_path(&cli.target)
            .with_context(|| format!("cannot resolve path '{}'", cli.target))?
    };

    let headers = cli
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<anyhow::Result<Headers>>()?;

    let mut builder = Request::builder(method, url.to_string()).headers(&headers);
    if let Some(data) = &cli.data {
        builder = builder.body(data.clone());
    }
    Ok(builder.build()?)
}

fn build_pipeline(config: &ClientConfig) -> anyhow::Result<Pipeline> {
    let defaults = config.resolve()?;
    let adapter = AdapterRegistry::from_config(config)?.get(&config.adapter)?;
    Ok(Pipeline::builder()
        .shared_adapter(adapter)
        .request_stage(default_headers(defaults.headers().clone()))
        .request_stage(user_agent(&config.user_agent)?)
        .request_stage(request_logger())
        .trace(config.trace)
        .build()?)
}

fn escape_xml(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn render_xml(element: &XmlElement, out: &mut String) -> std::fmt::Result {
    write!(out, "<{}", element.name())?;
    for (name, value) in element.attributes() {
        write!(out, " {name}=\"")?;
        escape_xml(value, out);
        out.push('"');
    }
    out.push('>');
    for child in element.children() {
        match child {
            XmlNode::Element(child) => render_xml(child, out)?,
            XmlNode::Text(text) => escape_xml(text, out),
        }
    }
    write!(out, "</{}>", element.name())
}

fn render_body(body: &Body) -> anyhow::Result<String> {
    Ok(match body {
        Body::Json(value) => serde_json::to_string_pretty(value)?,
        Body::Text(text) => text.clone(),
        Body::Xml(document) => {
            let mut out = String::new();
            render_xml(document.root(), &mut out)?;
            out
        }
        Body::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => String::new(),
    })
}

fn render_response(response: &Response) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "{}", response.status())?;
    for (name, value) in response.headers().iter() {
        writeln!(out, "{name}: {value}")?;
    }
    out.push('\n');
    out.push_str(&render_body(response.body())?);
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClientConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(adapter = %config.adapter, url = ?config.url, "configuration loaded");

    let request = build_request(&cli, &config)?;
    let pipeline = build_pipeline(&config)?;
    let response = pipeline.submit(request).await?;

    println!("{}", render_response(&response)?);
    Ok(())
}
