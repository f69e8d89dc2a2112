//! Posts a thread url to a running server and prints the result.

use adapter::AnalysisOutcome;
use anyhow::{bail, Context};
use clap::Parser;
use domain::{AnalysisParams, SummaryLength, Tone, DEFAULT_SUMMARY_FOCUS};

#[derive(Parser, Debug)]
#[command(name = "threadlens-client", version, about = "Analyse a reddit thread through a running threadlens server")]
struct Args {
    /// Reddit thread url
    url: String,
    /// What the summary should focus on (max 50 characters)
    #[arg(long, default_value = DEFAULT_SUMMARY_FOCUS)]
    focus: String,
    /// short, medium or long
    #[arg(long, default_value_t = SummaryLength::default())]
    length: SummaryLength,
    /// teacher, pompous, foulmouthed or clickbaiter_youtuber
    #[arg(long, default_value_t = Tone::default())]
    tone: Tone,
    /// Skip the ELI5 summary
    #[arg(long)]
    no_eli5: bool,
    /// Skip image analysis of the post
    #[arg(long)]
    no_images: bool,
    /// Also summarise pages linked from the post
    #[arg(long)]
    external: bool,
    #[arg(long, env = "THREADLENS_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    server: String,
}

impl Args {
    fn into_params(self) -> anyhow::Result<AnalysisParams> {
        let params = AnalysisParams {
            url: self.url,
            summary_focus: self.focus,
            summary_length: self.length,
            tone: self.tone,
            include_eli5: !self.no_eli5,
            analyze_image: !self.no_images,
            search_external: self.external,
        };
        params.validate()?;
        Ok(params)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let base_url = args.server.trim_end_matches('/').to_string();
    let params = args.into_params()?;

    println!("Analysing {} ...", params.url);
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/analyses", base_url))
        .json(&params)
        .send()
        .await
        .context("server unreachable")?;

    if !resp.status().is_success() {
        let status = resp.status();
        bail!("server answered {}: {}", status, resp.text().await?);
    }
    let outcome: AnalysisOutcome = resp.json().await?;

    let origin = if outcome.from_cache { "cached" } else { "fresh" };
    println!("\n== Summary ({}, {}) ==\n{}", origin, outcome.created_at, outcome.analysis);
    if let Some(eli5) = &outcome.eli5 {
        println!("\n== ELI5 ==\n{}", eli5);
    }

    println!("\n== Notable comments ==");
    let notable = &outcome.notable;
    for (label, item) in [
        ("Highest score", &notable.highest_score),
        ("Highest scoring root", &notable.highest_score_root),
        ("Most replies overall", &notable.most_subcomments),
        ("Most direct replies", &notable.most_direct_subcomments),
    ] {
        match &item.comment {
            Some(c) => println!("{:<22} {} ({}): {}", label, c.author, item.value, first_line(&c.body)),
            None => println!("{:<22} -", label),
        }
    }
    for pair in &notable.important_pairs {
        println!(
            "Reply by {} outscored {} by {}: {}",
            pair.child.author,
            pair.parent.comment.author,
            pair.gain,
            first_line(&pair.child.body)
        );
    }

    Ok(())
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or("")
}
