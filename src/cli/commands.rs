use anyhow::Context;
use clap::{Parser, Subcommand};
use http::Method;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::StrestConfig;
use crate::connection::MemoryTransport;
use crate::controllers;
use crate::dispatcher::Dispatcher;
use crate::packet::{HeaderName, StrestRequest, StrestResponse};

/// Command-line interface for the STREST dispatcher
///
/// Runs requests through the built-in controllers over an in-memory
/// transport, without a network listener.
#[derive(Parser)]
#[command(name = "strest")]
#[command(about = "STREST dispatcher CLI", long_about = None)]
pub struct Cli {
    /// YAML configuration file (stack size, namespace default filters)
    #[arg(short, long, global = true, env = "STREST_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch one request and print every response written for it
    Request {
        /// HTTP verb (GET, POST, PUT, DELETE)
        method: String,

        /// Request target, e.g. /hello/world?x=1
        uri: String,

        /// Send as a plain HTTP/1.1 request instead of native STREST
        #[arg(long, default_value_t = false)]
        http: bool,

        /// Extra header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Content type of the body
        #[arg(long, default_value = "application/json")]
        content_type: String,

        /// Transaction id for STREST requests
        #[arg(long, default_value = "1")]
        txn_id: String,
    },
    /// List registered routes in match order
    Routes,
}

/// Execute a parsed command line.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StrestConfig::load_with_env(path)?,
        None => StrestConfig::from_env(),
    };
    let dispatcher = Dispatcher::with_config(&config);
    controllers::register_builtin(&dispatcher);

    match cli.command {
        Commands::Request {
            method,
            uri,
            http,
            headers,
            data,
            content_type,
            txn_id,
        } => {
            let request = build_request(&method, &uri, http, &headers, data, &content_type, &txn_id)?;
            for response in dispatch(&dispatcher, request) {
                print!("{}", format_response(&response));
            }
            Ok(())
        }
        Commands::Routes => {
            for pattern in dispatcher.routes().patterns() {
                println!("{pattern}");
            }
            Ok(())
        }
    }
}

/// Build a request from command-line pieces.
pub fn build_request(
    method: &str,
    uri: &str,
    http: bool,
    headers: &[String],
    data: Option<String>,
    content_type: &str,
    txn_id: &str,
) -> anyhow::Result<StrestRequest> {
    let method: Method = method
        .to_ascii_uppercase()
        .parse()
        .with_context(|| format!("Invalid method: {method}"))?;

    let mut request = if http {
        StrestRequest::http(method, uri)
    } else {
        StrestRequest::strest(method, uri).with_header(HeaderName::TxnId, txn_id)
    };

    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Header must be `Name: value`, got {header:?}"))?;
        request.add_header(name.trim(), value.trim());
    }
    if let Some(data) = data {
        request.set_content(content_type, data.into_bytes());
    }
    Ok(request)
}

/// Dispatch over a fresh in-memory connection and collect what was sent.
pub fn dispatch(dispatcher: &Dispatcher, request: StrestRequest) -> Vec<StrestResponse> {
    let transport = Arc::new(MemoryTransport::new());
    dispatcher.incoming(transport.clone(), request);
    transport.sent()
}

/// Render a response as a status line, headers, a blank line and the body.
#[must_use]
pub fn format_response(response: &StrestResponse) -> String {
    let protocol = response
        .protocol()
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("{}/{}", response.protocol_name(), response.protocol_version()));

    let mut out = format!("{protocol} {} {}\n", response.status(), response.status_message());
    for (name, value) in response.headers() {
        out.push_str(&format!("{name}: {value}\n"));
    }
    out.push('\n');
    if let Some(body) = response.content_as_string() {
        out.push_str(&body);
        out.push('\n');
    }
    out
}
