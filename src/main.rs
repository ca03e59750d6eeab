use anyhow::Result;
use clap::Parser;
use pco::commands::{self, Action, Settings, parse_json, parse_query_param};
use pco::iterate::{DEFAULT_PER_PAGE, Paging};
use serde_json::Value;
use std::path::PathBuf;

/// pco - managed client for the Planning Center Online API
///
/// Requests are retried on timeouts, wait out rate limits, and resolve
/// relative URLs against the API base.
///
/// Credentials come from PCO_TOKEN, or PCO_APPLICATION_ID and PCO_SECRET.
///
/// Examples:
///   pco get /people/v2/me
///   pco iterate /people/v2/people -q include=emails --per-page 100
#[derive(Parser, Debug)]
#[command(author, about, version = env!("PCO_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL
    #[arg(long, env = "PCO_API_BASE", value_name = "URL", global = true)]
    api_base: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "PCO_TIMEOUT", value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// File upload endpoint
    #[arg(long, env = "PCO_UPLOAD_URL", value_name = "URL", global = true)]
    upload_url: Option<String>,

    /// Upload timeout in seconds
    #[arg(long, env = "PCO_UPLOAD_TIMEOUT", value_name = "SECS", global = true)]
    upload_timeout: Option<u64>,

    /// Attempts before a timing-out request fails
    #[arg(long, env = "PCO_TIMEOUT_RETRIES", value_name = "N", global = true)]
    timeout_retries: Option<u32>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// GET a resource and print its JSON
    Get(UrlArgs),

    /// POST a JSON payload
    Post(PayloadArgs),

    /// PATCH a resource with a JSON payload
    Patch(PayloadArgs),

    /// PUT a JSON payload
    Put(PayloadArgs),

    /// DELETE a resource and print the status code
    Delete(UrlArgs),

    /// Walk every page of a listing, one JSON record per line
    Iterate(IterateArgs),

    /// Upload a file to the upload endpoint
    Upload(UploadArgs),

    /// Print a payload skeleton for creating an object
    Template(TemplateArgs),
}

#[derive(clap::Args, Debug)]
struct UrlArgs {
    /// Absolute URL or path relative to the API base
    #[arg(value_name = "URL")]
    url: String,

    /// Query parameter, repeatable
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE", value_parser = parse_query_param)]
    params: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
struct PayloadArgs {
    #[command(flatten)]
    target: UrlArgs,

    /// JSON payload
    #[arg(short, long, value_name = "JSON", value_parser = parse_json)]
    data: Option<Value>,
}

#[derive(clap::Args, Debug)]
struct IterateArgs {
    #[command(flatten)]
    target: UrlArgs,

    /// Offset of the first item
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Items per page (1-100)
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: usize,
}

#[derive(clap::Args, Debug)]
struct UploadArgs {
    /// File to upload
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Query parameter, repeatable
    #[arg(short = 'q', long = "query", value_name = "KEY=VALUE", value_parser = parse_query_param)]
    params: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
struct TemplateArgs {
    /// Object type, e.g. Person
    #[arg(value_name = "TYPE")]
    object_type: String,

    /// Initial attributes as JSON
    #[arg(short, long, value_name = "JSON", value_parser = parse_json)]
    attributes: Option<Value>,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            api_base: self.api_base.clone(),
            timeout_secs: self.timeout,
            upload_url: self.upload_url.clone(),
            upload_timeout_secs: self.upload_timeout,
            timeout_retries: self.timeout_retries,
        }
    }
}

impl Commands {
    fn into_action(self) -> Action {
        match self {
            Commands::Get(args) => Action::Get {
                url: args.url,
                params: args.params,
            },
            Commands::Post(args) => Action::Post {
                url: args.target.url,
                data: args.data,
                params: args.target.params,
            },
            Commands::Patch(args) => Action::Patch {
                url: args.target.url,
                data: args.data,
                params: args.target.params,
            },
            Commands::Put(args) => Action::Put {
                url: args.target.url,
                data: args.data,
                params: args.target.params,
            },
            Commands::Delete(args) => Action::Delete {
                url: args.url,
                params: args.params,
            },
            Commands::Iterate(args) => Action::Iterate {
                url: args.target.url,
                paging: Paging {
                    offset: args.offset,
                    per_page: args.per_page,
                },
                params: args.target.params,
            },
            Commands::Upload(args) => Action::Upload {
                path: args.path,
                params: args.params,
            },
            Commands::Template(args) => Action::Template {
                object_type: args.object_type,
                attributes: args.attributes,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let settings = cli.settings();
    let mut stdout = std::io::stdout().lock();

    // template works offline, without credentials
    let action = match cli.command.into_action() {
        Action::Template {
            object_type,
            attributes,
        } => return commands::template(&object_type, attributes, &mut stdout),
        action => action,
    };

    let runtime = pco::runtime::RealRuntime;
    let client = settings.build(&runtime)?;
    commands::run(&client, action, &mut stdout).await?;
    client.close();
    Ok(())
}
