use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(
    name = "docuquery-cli",
    about = "Command-line client for a running DocuQuery server"
)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the server is running.
    Health,
    /// Print the API version.
    Version,
    /// Upload a PDF, replacing the indexed document.
    Upload {
        #[arg(long)]
        file: PathBuf,
    },
    /// Ask a question about the indexed document.
    Ask { question: String },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');
    let client = Client::new();

    let response = match cli.command {
        Command::Health => client.get(format!("{base}/health")).send().await,
        Command::Version => client.get(format!("{base}/version")).send().await,
        Command::Upload { file } => {
            let form = upload_form(&file).await?;
            client
                .post(format!("{base}/upload"))
                .multipart(form)
                .send()
                .await
        }
        Command::Ask { question } => {
            client
                .post(format!("{base}/ask"))
                .json(&json!({ "question": question }))
                .send()
                .await
        }
    }
    .with_context(|| format!("request to {base} failed"))?;

    print_response(response).await
}

async fn upload_form(path: &Path) -> Result<Form> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("application/pdf")?;
    Ok(Form::new().part("file", part))
}

async fn print_response(response: Response) -> Result<()> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("server returned {status} with a non-JSON body"))?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if let Some(error) = body.get("error").and_then(Value::as_str) {
        bail!("{error}");
    }
    if !status.is_success() {
        bail!("server returned {status}");
    }
    Ok(())
}
