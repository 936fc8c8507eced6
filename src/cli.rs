use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sqli-probe")]
#[command(version)]
#[command(about = "An asynchronous, parameter-level SQL injection probing engine.", long_about = None)]
pub struct Args {
    /// Target URL with query parameters (e.g. http://example.com/page?id=1).
    pub url: String,

    /// Request timeout in seconds.
    #[arg(short, long, default_value_t = 10)]
    pub timeout: u64,

    /// Max parallel probe workers.
    #[arg(short, long, default_value_t = 5)]
    pub workers: usize,

    /// Send the destructive catalog entry verbatim instead of the
    /// neutralized probe. Off by default.
    #[arg(long)]
    pub destructive: bool,

    /// Save the full report to a JSON file at the end.
    #[arg(short, long)]
    pub output: Option<String>,
}
