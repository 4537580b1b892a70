//! Purpose: `algolia` CLI entry point: search, browse, and fetch records from an index.
//! Role: Binary crate root; parses args, runs one command, emits JSON lines on stdout.
//! Invariants: Errors are emitted as JSON on stderr (text when stderr is a TTY).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Ctrl-C cancels the in-flight request instead of killing the process mid-write.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};

use algolia_client::api::{
    API_KEY_ENV, APP_ID_ENV, BrowseQuery, CancellationToken, Error, ErrorKind, Host, SearchClient,
    SearchConfig, SearchQuery, to_exit_code,
};
use clap::{Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "algolia",
    version,
    about = "Query a hosted search index from the command line",
    after_help = r#"EXAMPLES
  $ export ALGOLIA_APP_ID=MYAPP ALGOLIA_API_KEY=...
  $ algolia search products shoe --hits-per-page 5
  $ algolia browse products --filters 'brand:acme' --limit 100
  $ algolia get products sku-1 sku-2
  $ algolia indices

Output is one JSON value per line on stdout. Set RUST_LOG=debug to trace requests."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, help = "Application id (default: $ALGOLIA_APP_ID)")]
    app_id: Option<String>,
    #[arg(long, help = "API key (default: $ALGOLIA_API_KEY)")]
    api_key: Option<String>,
    #[arg(
        long = "host",
        value_name = "URL",
        help = "Override the host list, e.g. http://localhost:8080 (repeatable)"
    )]
    hosts: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one search and print the response
    Search {
        index: String,
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        hits_per_page: Option<u32>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        filters: Option<String>,
    },
    /// Stream every matching record, one per line
    Browse {
        index: String,
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        filters: Option<String>,
        #[arg(long, help = "Stop after this many records")]
        limit: Option<usize>,
    },
    /// Fetch records by objectID; missing records print as null
    Get {
        index: String,
        #[arg(required = true)]
        object_ids: Vec<String>,
    },
    /// List the application's indices
    Indices,
}

fn main() {
    let exit_code = match run(std::env::args_os()) {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run<I>(args: I) -> Result<(), Error>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(());
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `algolia --help`."));
            }
        },
    };

    init_tracing();
    let config = resolve_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start async runtime")
                .with_source(err)
        })?;
    runtime.block_on(dispatch(cli.command, config))
}

async fn dispatch(command: Command, config: SearchConfig) -> Result<(), Error> {
    let client = SearchClient::with_config(config);
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received; cancelling");
            on_interrupt.cancel();
        }
    });

    let mut out = io::stdout().lock();
    match command {
        Command::Search {
            index,
            query,
            hits_per_page,
            page,
            filters,
        } => {
            let index = client.init_index(index)?;
            let query = SearchQuery {
                hits_per_page,
                page,
                filters,
                ..SearchQuery::new(query)
            };
            let response = index.search::<Value>(&query, None, Some(&cancel)).await?;
            let value = json!({
                "hits": response.hits,
                "nbHits": response.nb_hits,
                "page": response.page,
                "nbPages": response.nb_pages,
                "processingTimeMS": response.processing_time_ms,
            });
            emit_line(&mut out, &value)
        }
        Command::Browse {
            index,
            query,
            filters,
            limit,
        } => {
            let index = client.init_index(index)?;
            let params = SearchQuery {
                filters,
                ..SearchQuery::new(query)
            };
            let mut hits = index.browse_with_cancel::<Value>(BrowseQuery::new(params), cancel)?;
            let mut emitted = 0usize;
            while limit.is_none_or(|limit| emitted < limit) {
                let Some(hit) = hits.next_hit().await? else {
                    break;
                };
                emit_line(&mut out, &hit)?;
                emitted += 1;
            }
            tracing::debug!(records = emitted, pages = hits.page_fetches(), "browse finished");
            Ok(())
        }
        Command::Get { index, object_ids } => {
            let index = client.init_index(index)?;
            let records = index
                .get_objects::<Value>(&object_ids, None, None, Some(&cancel))
                .await?;
            for record in records {
                emit_line(&mut out, &record)?;
            }
            Ok(())
        }
        Command::Indices => {
            let response = client.list_indices(None, Some(&cancel)).await?;
            for info in response.items {
                emit_line(&mut out, &info)?;
            }
            Ok(())
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<SearchConfig, Error> {
    let app_id = cli
        .app_id
        .clone()
        .or_else(|| std::env::var(APP_ID_ENV).ok())
        .unwrap_or_default();
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .unwrap_or_default();
    let config = SearchConfig::new(app_id, api_key)?;
    if cli.hosts.is_empty() {
        return Ok(config);
    }
    let hosts = cli
        .hosts
        .iter()
        .map(|raw| parse_host(raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(config.with_hosts(hosts))
}

fn parse_host(raw: &str) -> Result<Host, Error> {
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("https", raw),
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() || rest.contains('/') || !matches!(scheme, "http" | "https") {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid host: {raw}"))
            .with_hint("use host[:port] or http(s)://host[:port]"));
    }
    Ok(Host::new(rest).with_scheme(scheme))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_line<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), Error> {
    let line = serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode json")
            .with_source(err)
    })?;
    writeln!(out, "{line}").map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to write output")
            .with_source(err)
    })
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::Unsupported => "unsupported operation",
        ErrorKind::Transport => "network error",
        ErrorKind::Timeout => "request timed out",
        ErrorKind::Permission => "permission denied",
        ErrorKind::NotFound => "not found",
        ErrorKind::Remote => "remote error",
        ErrorKind::Cancelled => "cancelled",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(index) = err.index() {
        inner.insert("index".to_string(), json!(index));
    }
    if let Some(object_id) = err.object_id() {
        inner.insert("objectID".to_string(), json!(object_id));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(index) = err.index() {
        lines.push(format!("index: {index}"));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
