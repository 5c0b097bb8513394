use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "planner-ml-cli")]
#[command(about = "Planner ML service CLI", version, long_about = None)]
struct Cli {
    #[arg(short, long, env = "PLANNER_ML_ENDPOINT", default_value = "http://localhost:8000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect blockers in a piece of text
    Detect {
        #[arg(value_name = "TEXT")]
        text: String,

        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Analyze comments, given oldest first
    Comments {
        #[arg(short, long = "comment", required = true)]
        comments: Vec<String>,

        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Analyze a task's text and comments
    Task {
        #[arg(short = 'i', long)]
        task_id: i64,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long = "comment")]
        comments: Vec<String>,

        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Predict a task's timeline from a JSON file
    Predict {
        #[arg(value_name = "TASK_FILE")]
        task: PathBuf,

        /// JSON array of completed tasks to train on first
        #[arg(short = 'H', long)]
        history: Option<PathBuf>,
    },

    /// Predict timelines for a JSON array of tasks
    Bulk {
        #[arg(value_name = "TASKS_FILE")]
        tasks: PathBuf,
    },

    /// List detector keywords
    Keywords,

    /// Check server health
    Health,
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Comments stamped in argument order so the last one is the most recent
fn stamped_comments(comments: Vec<String>) -> Vec<Value> {
    comments
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            json!({
                "content": content,
                "createdAt": format!("{:06}", i),
            })
        })
        .collect()
}

async fn print_response(response: reqwest::Response) -> anyhow::Result<()> {
    let status = response.status();
    let body: Value = response.json().await.context("response is not JSON")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("request failed with status {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    let response = match cli.command {
        Commands::Detect { text, threshold } => {
            client
                .post(format!("{}/detect-blockers", cli.endpoint))
                .json(&json!({ "text": text, "threshold": threshold }))
                .send()
                .await?
        }

        Commands::Comments {
            comments,
            threshold,
        } => {
            client
                .post(format!("{}/analyze-comments", cli.endpoint))
                .json(&json!({
                    "comments": stamped_comments(comments),
                    "threshold": threshold,
                }))
                .send()
                .await?
        }

        Commands::Task {
            task_id,
            name,
            description,
            comments,
            threshold,
        } => {
            client
                .post(format!("{}/analyze-task", cli.endpoint))
                .json(&json!({
                    "task_id": task_id,
                    "name": name,
                    "description": description,
                    "comments": stamped_comments(comments),
                    "threshold": threshold,
                }))
                .send()
                .await?
        }

        Commands::Predict { task, history } => {
            let task = read_json(&task)?;
            let historical_tasks = match history {
                Some(path) => read_json(&path)?,
                None => json!([]),
            };
            if !historical_tasks.is_array() {
                bail!("history file must contain a JSON array");
            }

            client
                .post(format!("{}/predict-timeline", cli.endpoint))
                .json(&json!({ "task": task, "historical_tasks": historical_tasks }))
                .send()
                .await?
        }

        Commands::Bulk { tasks } => {
            let tasks = read_json(&tasks)?;
            if !tasks.is_array() {
                bail!("tasks file must contain a JSON array");
            }

            client
                .post(format!("{}/predict-bulk", cli.endpoint))
                .json(&tasks)
                .send()
                .await?
        }

        Commands::Keywords => {
            client
                .get(format!("{}/keywords", cli.endpoint))
                .send()
                .await?
        }

        Commands::Health => {
            client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?
        }
    };

    print_response(response).await
}
