use anyhow::{Context, Result};
use colored::*;
use filing_metrics::{
    core::config::ExtractionConfig,
    edgar::report::ReportType,
    metrics::{company_facts, money, HealthStatus},
    pipeline::{FilingAnalysis, FilingAnalyzer},
};
use std::{io, path::PathBuf};
use strum::EnumString;
use structopt::StructOpt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum OutputFormat {
    Json,
    Csv,
    Table,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "filing-metrics",
    about = "Extract financial metrics and ratios from an SEC filing"
)]
struct Opt {
    /// Filing to analyze (HTML, inline XBRL or plain text)
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Form type of the filing, e.g. 10-Q
    #[structopt(long)]
    form: Option<ReportType>,

    /// Output format: json, csv or table
    #[structopt(long, default_value = "table")]
    format: OutputFormat,

    /// Company facts JSON whose latest values join the candidates
    #[structopt(long, parse(from_os_str))]
    company_facts: Option<PathBuf>,
}

fn health_label(status: HealthStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        HealthStatus::Excellent => label.green().bold(),
        HealthStatus::Good => label.green(),
        HealthStatus::Neutral => label.normal(),
        HealthStatus::Caution => label.yellow(),
        HealthStatus::Warning => label.red().bold(),
    }
}

fn print_table(analysis: &FilingAnalysis) {
    let period = analysis
        .period
        .as_ref()
        .map(|p| p.label.clone())
        .unwrap_or_else(|| "unknown period".to_string());
    println!("{} ({}, {})", "Metrics".bold(), period, analysis.unit);
    for metric in &analysis.metrics {
        let yoy = metric
            .yoy_change
            .map(|c| {
                let sign = if c.is_sign_positive() { "+" } else { "" };
                format!(" ({}{}% YoY)", sign, c)
            })
            .unwrap_or_default();
        println!(
            "  {:<40} {:>16}{}  {}",
            metric.name,
            metric.display_value,
            yoy,
            format!("{} {:.2}", metric.source, metric.confidence).dimmed()
        );
    }

    if !analysis.ratios.is_empty() {
        println!("\n{}", "Ratios".bold());
        for ratio in &analysis.ratios {
            println!(
                "  {:<28} {:>10}  {}",
                ratio.name,
                ratio.formatted_value,
                health_label(ratio.health_status)
            );
        }
    }

    if !analysis.warnings.is_empty() {
        println!("\n{}", "Warnings".yellow().bold());
        for warning in &analysis.warnings {
            println!("  {}", warning.to_string().yellow());
        }
    }
}

fn write_csv(analysis: &FilingAnalysis) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "category", "name", "value", "display", "unit", "period", "source", "confidence", "yoy_change",
    ])?;
    for metric in &analysis.metrics {
        writer.write_record([
            metric.category.to_string(),
            metric.name.clone(),
            money::round_half_up(metric.raw_value, money::CURRENCY_DP).to_string(),
            metric.display_value.clone(),
            metric.unit.to_string(),
            metric.period.clone().unwrap_or_default(),
            metric.source.to_string(),
            format!("{:.2}", metric.confidence),
            metric.yoy_change.map(|c| c.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let opt = Opt::from_args();

    if !opt.input.exists() {
        eprintln!("Input file does not exist: {:?}", opt.input);
        std::process::exit(1);
    }

    let config = ExtractionConfig::from_env()?;
    let mut analyzer = FilingAnalyzer::new(config);
    if let Some(form) = opt.form.clone() {
        analyzer = analyzer.with_form(form);
    }
    if let Some(path) = &opt.company_facts {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read company facts {}", path.display()))?;
        let facts = company_facts::parse_company_facts(&json)
            .with_context(|| format!("Invalid company facts in {}", path.display()))?;
        analyzer = analyzer.with_company_facts(&facts);
    }

    let analysis = match analyzer.analyze_file(&opt.input) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("{} {:#}", "Error analyzing filing:".red(), e);
            std::process::exit(1);
        }
    };

    match opt.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
        OutputFormat::Csv => write_csv(&analysis)?,
        OutputFormat::Table => print_table(&analysis),
    }
    Ok(())
}
