//! `inocore` - call the InoCore REST API from the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inocore_connect::{
    ApiClient, ApiResult, AuthScheme, ClientConfig, Filter, QueryParams, Sort, SortDirection,
};
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "inocore")]
#[command(about = "Send requests to an InoCore instance")]
#[command(version)]
struct Cli {
    /// Base URL of the InoCore instance
    #[arg(long, env = "INOCORE_URL")]
    url: String,

    /// Username or email address
    #[arg(long, env = "INOCORE_USERNAME")]
    username: String,

    #[arg(long, env = "INOCORE_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, env = "INOCORE_PROJECT_ID")]
    project_id: String,

    /// Skip TLS certificate verification (self-signed certificates)
    #[arg(long, global = true)]
    insecure: bool,

    /// Send basic auth on every request instead of fetching a token
    #[arg(long, global = true)]
    basic_auth: bool,

    /// Print status, headers and body instead of the decoded JSON
    #[arg(long, global = true)]
    raw: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// GET an endpoint
    Get(QueryArgs),
    /// POST to an endpoint
    Post(BodyArgs),
    /// PUT to an endpoint
    Put(BodyArgs),
    /// DELETE an endpoint
    Delete(BodyArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Endpoint path, e.g. v1/ping
    endpoint: String,

    #[arg(long = "filter", value_name = "PROPERTY:EXPRESSION:VALUE", value_parser = parse_filter)]
    filters: Vec<Filter>,

    #[arg(long = "sort", value_name = "PROPERTY[:asc|desc]", value_parser = parse_sort)]
    sorts: Vec<Sort>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    offset: Option<u64>,

    /// Extra query parameter; repeat a key to send a list
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[derive(Args)]
struct BodyArgs {
    #[command(flatten)]
    query: QueryArgs,

    /// JSON request body
    #[arg(long, value_parser = parse_json)]
    data: Option<Value>,
}

impl QueryArgs {
    fn to_params(&self) -> QueryParams {
        let mut params = QueryParams {
            filters: self.filters.clone(),
            sorts: self.sorts.clone(),
            limit: self.limit,
            offset: self.offset,
            ..QueryParams::default()
        };
        for (key, value) in &self.params {
            let value = Value::String(value.clone());
            match params.extra.get_mut(key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => *existing = Value::Array(vec![existing.take(), value]),
                None => {
                    params.extra.insert(key.clone(), value);
                }
            }
        }
        params
    }
}

fn parse_filter(s: &str) -> Result<Filter, String> {
    let mut parts = s.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(property), Some(expression), Some(value)) if !property.is_empty() && !expression.is_empty() => {
            Ok(Filter {
                property: property.to_string(),
                expression: expression.to_string(),
                value: Value::String(value.to_string()),
            })
        }
        _ => Err(format!("expected PROPERTY:EXPRESSION:VALUE, got {s:?}")),
    }
}

fn parse_sort(s: &str) -> Result<Sort, String> {
    let (property, direction) = match s.split_once(':') {
        Some((property, "asc")) => (property, SortDirection::Asc),
        Some((property, "desc")) => (property, SortDirection::Desc),
        Some((_, other)) => return Err(format!("sort direction must be asc or desc, got {other:?}")),
        None => (s, SortDirection::Asc),
    };
    if property.is_empty() {
        return Err("sort property must not be empty".to_string());
    }
    Ok(Sort {
        property: property.to_string(),
        direction,
    })
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_result(result: ApiResult) -> Result<()> {
    match result {
        ApiResult::Json(body) => println!("{}", serde_json::to_string_pretty(&body)?),
        ApiResult::Response(response) => {
            println!("HTTP {} {}", response.status, response.reason.as_deref().unwrap_or(""));
            for (name, value) in &response.headers {
                println!("{name}: {value}");
            }
            println!();
            println!("{}", response.body);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let scheme = if cli.basic_auth {
        AuthScheme::Basic
    } else {
        AuthScheme::Token
    };
    let config = ClientConfig::new(&cli.url, cli.username, cli.password, cli.project_id)?
        .verify_peer(!cli.insecure)
        .return_object(cli.raw)
        .auth_scheme(scheme);
    tracing::debug!(?config, "client configured");
    let client = ApiClient::new(config);

    let result = match &cli.command {
        Command::Get(args) => client.get(&args.endpoint, Some(&args.to_params())),
        Command::Post(args) => client.post(&args.query.endpoint, args.data.as_ref(), Some(&args.query.to_params())),
        Command::Put(args) => client.put(&args.query.endpoint, args.data.as_ref(), Some(&args.query.to_params())),
        Command::Delete(args) => {
            client.delete(&args.query.endpoint, args.data.as_ref(), Some(&args.query.to_params()))
        }
    }
    .context("request failed")?;

    print_result(result)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    const BASE: [&str; 9] = [
        "inocore",
        "--url",
        "http://localhost:8080",
        "--username",
        "daemon@localhost",
        "--password",
        "daemon2k22",
        "--project-id",
        "tEsT@ino",
    ];

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(BASE.iter().chain(args)).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_splits_on_first_two_colons() {
        let filter = parse_filter("created:gte:2024-01-01 12:00:00").unwrap();
        assert_eq!(filter.property, "created");
        assert_eq!(filter.expression, "gte");
        assert_eq!(filter.value, Value::String("2024-01-01 12:00:00".to_string()));
        assert!(parse_filter("id:eq").is_err());
        assert!(parse_filter(":eq:1").is_err());
    }

    #[test]
    fn sort_defaults_to_ascending() {
        assert_eq!(parse_sort("name").unwrap().direction, SortDirection::Asc);
        assert_eq!(parse_sort("id:desc").unwrap().direction, SortDirection::Desc);
        assert!(parse_sort("id:up").is_err());
    }

    #[test]
    fn param_requires_key() {
        assert_eq!(parse_param("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
        assert!(parse_param("=x").is_err());
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn get_arguments_become_query_params() {
        let cli = parse(&[
            "get", "v1/daemons", "--filter", "id:eq:1", "--filter", "id:neq:2", "--sort", "name:desc", "--limit",
            "10", "--param", "fields=id", "--param", "fields=name", "--param", "search=boiler",
        ]);
        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        let params = args.to_params();
        assert_eq!(args.endpoint, "v1/daemons");
        assert_eq!(params.filters.len(), 2);
        assert_eq!(params.sorts[0].property, "name");
        assert_eq!(params.limit, Some(10));
        assert_eq!(params.extra["fields"], serde_json::json!(["id", "name"]));
        assert_eq!(params.extra["search"], "boiler");
    }

    #[test]
    fn post_accepts_json_body_and_global_flags() {
        let cli = parse(&["post", "v1/bus_config", "--data", r#"{"port":502}"#, "--insecure", "--raw"]);
        assert!(cli.insecure);
        assert!(cli.raw);
        let Command::Post(args) = cli.command else {
            panic!("expected post");
        };
        assert_eq!(args.data.unwrap()["port"], 502);
    }

    #[test]
    fn post_rejects_invalid_json_body() {
        let result = Cli::try_parse_from(BASE.iter().chain(&["post", "v1/x", "--data", "{"]));
        assert!(result.is_err());
    }
}
