use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::error;

use sqli_probe::cli::Args;
use sqli_probe::models::Target;
use sqli_probe::scanner::{ScanConfig, Scanner};
use sqli_probe::transport::HttpTransport;

const EXIT_CLEAN: i32 = 0;
const EXIT_VULNERABLE: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let target = match Target::parse(&args.url) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} {}", "ERROR:".red().bold(), e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let config = ScanConfig {
        timeout: Duration::from_secs(args.timeout),
        workers: args.workers,
        allow_destructive: args.destructive,
        ..ScanConfig::default()
    };

    if args.destructive {
        println!(
            "{}",
            "Destructive payloads enabled. Only scan targets you are authorized to test."
                .yellow()
                .bold()
        );
    }

    let transport = match HttpTransport::new() {
        Ok(t) => Arc::new(t),
        Err(e) => {
            error!("failed to build HTTP client: {}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let scanner = Scanner::new(transport, config);

    let combinations = target.param_count() * scanner.catalog().len();
    println!("[*] Scanning: {}", args.url);
    println!(
        "[*] Testing {} combinations across {} parameters",
        combinations,
        target.param_count()
    );

    let pb = Arc::new(ProgressBar::new(combinations as u64));
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("#>-"),
    );

    let report = match scanner.scan(&target, Some(pb.clone())).await {
        Ok(r) => r,
        Err(e) => {
            pb.finish_and_clear();
            eprintln!("{} {}", "ERROR:".red().bold(), e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    pb.finish_and_clear();

    for finding in report.vulnerabilities() {
        println!(
            "{} Parameter: {}, Payload: '{}', DB Type: {}",
            "VULNERABLE".red().bold(),
            finding.parameter,
            finding.payload,
            finding
                .engine
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        );
    }

    let vuln_count = report.vulnerability_count();

    println!("\n{}", "Scan Summary".bold().underline());

    if vuln_count == 0 {
        println!("{}", "No vulnerabilities detected".green());
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Parameter", "Intent", "Payload", "DB", "Elapsed (ms)"]);
        for f in report.vulnerabilities() {
            table.add_row(vec![
                f.parameter.clone(),
                f.intent.to_string(),
                f.payload.clone(),
                f.engine.map(|e| e.to_string()).unwrap_or_default(),
                f.elapsed_ms.to_string(),
            ]);
        }
        println!("{table}");
        println!(
            "{}",
            format!(
                "Found {} potential vulnerabilities across {} parameters",
                vuln_count, report.vulnerable_params
            )
            .red()
        );
    }

    println!(
        "Probes: {} issued, {} completed, {} failed",
        report.tasks_issued, report.tasks_completed, report.probe_failures
    );
    println!("Scan completed in {:.2}s", report.elapsed_ms as f64 / 1000.0);

    if let Some(path) = args.output {
        match File::create(&path) {
            Ok(mut file) => {
                let json = serde_json::to_string_pretty(&report)?;
                file.write_all(json.as_bytes())?;
                println!("Report saved to {}", path.green());
            }
            Err(e) => error!("failed to create output file {}: {}", path, e),
        }
    }

    if vuln_count > 0 {
        std::process::exit(EXIT_VULNERABLE);
    }
    std::process::exit(EXIT_CLEAN);
}
