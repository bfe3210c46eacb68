use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;

use meetup_digest_lib::{
    config,
    deploy::{GitHost, GitHubApi},
    schedule,
    scraping::HttpSource,
    DeployOutcome,
};

#[derive(Parser)]
#[command(
    name = "meetup-digest",
    about = "Collect upcoming Meetup events into a markdown digest"
)]
struct Cli {
    /// JSON config file (default: meetup-digest.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Only keep events in this month: YYYY-MM, or MM for the current year
    #[arg(short, long)]
    month: Option<String>,
    /// Where to write the rendered digest
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Template file name inside the template directory
    #[arg(short, long)]
    template: Option<String>,
    /// Publish the month's post to the site repository as a pull request
    #[arg(long)]
    deploy: bool,
    /// With --deploy: render and plan, but leave the repository alone
    #[arg(short, long, requires = "deploy")]
    dry_run: bool,
    /// With --deploy: repository path of the post (default: dated .mdx name)
    #[arg(short, long, requires = "deploy")]
    file: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = config::load(cli.config.as_deref())?;
    if let Some(month) = cli.month {
        config.month = Some(month);
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    if let Some(template) = cli.template {
        config.template = template;
    }

    let today = schedule::site_date(Utc::now());
    if !cli.deploy {
        meetup_digest_lib::run(&config, &HttpSource, today)?;
        return Ok(());
    }

    let api = if cli.dry_run {
        None
    } else {
        Some(GitHubApi::from_env(&config.deploy)?)
    };
    let host = api.as_ref().map(|api| api as &dyn GitHost);
    match meetup_digest_lib::deploy(&config, &HttpSource, host, today, cli.file.as_deref())? {
        DeployOutcome::NoEvents => {}
        DeployOutcome::DryRun { plan, document } => {
            println!("{document}");
            eprintln!("dry run: would write {} on branch {}", plan.path, plan.branch);
        }
        DeployOutcome::Published { pull, .. } => println!("{}", pull.html_url),
    }
    Ok(())
}
