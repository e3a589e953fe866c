//! A3S Browser Search CLI - local browser-driven search command line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use a3s_browser_search::{
    browser::finder, BrowserController, BrowserSearch, EngineKind, LocalBrowser, RemoteBrowser,
    RemoteOptions, SearchOptions, SearchResult, Settings,
};

/// A3S Browser Search - search the web through a real browser
#[derive(Parser)]
#[command(name = "a3s-browser-search")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search one or more queries
    Search(SearchArgs),

    /// Extract the main content of a page as Markdown
    Extract(ExtractArgs),

    /// List available search engines and detected browsers
    Engines,
}

#[derive(Parser)]
struct BrowserArgs {
    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Browser executable to launch
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// DevTools endpoint of a running browser (ws:// or http://host:port)
    #[arg(long)]
    ws_endpoint: Option<String>,

    /// Proxy URL (e.g., http://127.0.0.1:8080 or socks5://127.0.0.1:1080)
    #[arg(short, long)]
    proxy: Option<String>,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search queries, run concurrently
    #[arg(required = true)]
    queries: Vec<String>,

    /// Search engine: bing, google, baidu, sogou
    #[arg(short, long)]
    engine: Option<EngineKind>,

    /// Maximum number of results
    #[arg(short, long)]
    limit: Option<usize>,

    /// Visit each result and extract its content
    #[arg(long)]
    visit: bool,

    /// Maximum characters of content per result
    #[arg(short, long)]
    truncate: Option<usize>,

    /// Domains to exclude (comma-separated)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Concurrent page visits
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    browser: BrowserArgs,
}

#[derive(Parser)]
struct ExtractArgs {
    /// Page URL
    url: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    browser: BrowserArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search(args) => run_search(args).await,
        Commands::Extract(args) => run_extract(args).await,
        Commands::Engines => list_engines(),
    }
}

fn list_engines() -> Result<()> {
    println!("Available search engines:\n");
    println!("  International:");
    println!("    bing     - Bing");
    println!("    google   - Google");
    println!();
    println!("  Chinese (中国搜索引擎):");
    println!("    baidu    - Baidu (百度)");
    println!("    sogou    - Sogou (搜狗)");
    println!();

    println!("Browsers:");
    for name in finder::known_browser_names() {
        match finder::find_browser(Some(name)) {
            Ok(found) => println!("    {:<22} {}", name, found.executable.display()),
            Err(_) => println!("    {:<22} not installed", name),
        }
    }
    println!();
    println!("Usage: a3s-browser-search search \"query\" -e bing --visit");
    Ok(())
}

fn build_search(settings: &Settings, args: &BrowserArgs) -> BrowserSearch {
    let mut settings = settings.clone();
    if args.headed {
        settings.headless = false;
    }
    if let Some(chrome) = &args.chrome {
        settings.chrome = Some(chrome.clone());
    }
    if let Some(endpoint) = &args.ws_endpoint {
        settings.ws_endpoint = Some(endpoint.clone());
    }
    if let Some(proxy) = &args.proxy {
        settings.proxy = Some(proxy.clone());
    }

    let browser: Arc<dyn BrowserController> = match &settings.ws_endpoint {
        Some(endpoint) => Arc::new(RemoteBrowser::new(RemoteOptions::with_ws_endpoint(
            endpoint.clone(),
        ))),
        None => Arc::new(LocalBrowser::new()),
    };
    BrowserSearch::with_config(browser, settings.browser_config())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let settings = Settings::from_env();
    let search = build_search(&settings, &args.browser);

    let limit = args.limit.unwrap_or(settings.limit);
    let mut options = SearchOptions::with_queries(args.queries.clone())
        .with_count(limit)
        .with_visit(args.visit)
        .with_exclude_domains(args.exclude.clone());
    if let Some(engine) = args.engine {
        options = options.with_engine(engine);
    }
    if let Some(concurrency) = args.concurrency {
        options = options.with_concurrency(concurrency);
    }
    if let Some(max_chars) = args.truncate {
        options = options.with_truncate(max_chars);
    }

    let engine = options.engine.unwrap_or(search.config().engine);
    let mut results = search.try_perform(options).await?;
    results.truncate(limit);

    match args.format {
        OutputFormat::Text => {
            println!(
                "\nSearch results for \"{}\" on {} ({} results):\n",
                args.queries.join("\", \""),
                engine,
                results.len()
            );
            for (i, result) in results.iter().enumerate() {
                print_result(i + 1, result);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Compact => {
            for result in &results {
                println!("{}\t{}", result.title, result.url);
            }
        }
    }

    Ok(())
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let settings = Settings::from_env();
    let search = build_search(&settings, &args.browser);

    let outcome = search.visit_url(&args.url).await;
    if let Err(e) = search.close_browser().await {
        tracing::warn!("Failed to close browser: {}", e);
    }
    let result = outcome?;

    match args.format {
        OutputFormat::Text => {
            println!("# {}\n", result.title);
            println!("{}", result.content);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Compact => {
            println!("{}\t{}\t{}", result.title, result.url, result.content.chars().count());
        }
    }

    Ok(())
}

fn print_result(index: usize, result: &SearchResult) {
    println!("{}. {}", index, result.title);
    println!("   URL: {}", result.url);
    if !result.snippet.is_empty() {
        println!("   {}", preview(&result.snippet, 150));
    }
    if result.is_visited() {
        println!(
            "   Content: {} chars | {}",
            result.content.chars().count(),
            preview(&result.content.replace('\n', " "), 150)
        );
    }
    if let Some(engine) = &result.engine {
        println!("   Engine: {}", engine);
    }
    println!();
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
