use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use quizmark::api::{ExportTaskRequest, NotionItemRequest, NotionTaskRequest};
use quizmark::tasks::{notion_items, run_export, run_notion_upload, TaskProgress};

#[derive(Parser, Debug)]
#[command(
    name = "quizmark",
    version,
    about = "Annotate photographed math problems and drive export / Notion upload tasks"
)]
struct Cli {
    /// Server base URL (overrides config.json and QUIZMARK_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the server's AI backend
    Health,
    /// Upload images and print the new session
    Upload(UploadArgs),
    /// Run an export task from a JSON request body
    Export(ExportArgs),
    /// Upload exported Markdown files to Notion
    Notion(NotionArgs),
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Image files (jpg, jpeg, png, webp, gif)
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// JSON file holding the export request body
    request: PathBuf,
    /// Upload every exported Markdown file to Notion afterwards
    #[arg(long)]
    notion: bool,
}

#[derive(Args, Debug)]
struct NotionArgs {
    /// Session that owns the exported Markdown files
    #[arg(long)]
    session: String,
    /// Items as `title=markdown_name`
    #[arg(required = true)]
    items: Vec<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let workspace = quizmark::bootstrap(cli.server).context("failed to start")?;

    match cli.command {
        Commands::Health => command_health(&workspace),
        Commands::Upload(args) => command_upload(workspace, args),
        Commands::Export(args) => command_export(&workspace, args),
        Commands::Notion(args) => command_notion(&workspace, args),
    }
}

type HttpWorkspace = quizmark::Workspace<quizmark::api::HttpTransport>;

fn print_progress(progress: &TaskProgress) {
    eprintln!("{}", progress.status_line());
}

fn command_health(workspace: &HttpWorkspace) -> Result<()> {
    let report = workspace.check_ai_health()?;
    println!("{}", report.status_line());
    if !report.ok {
        bail!("AI backend unavailable");
    }
    Ok(())
}

fn command_upload(mut workspace: HttpWorkspace, args: UploadArgs) -> Result<()> {
    workspace.upload_paths(&args.images)?;
    let editor = workspace.editor();
    let session = editor
        .session()
        .context("server returned no session")?;
    let slides: Vec<_> = editor
        .document()
        .slides()
        .iter()
        .map(|slide| {
            json!({
                "image_id": slide.image_id,
                "name": slide.name,
                "url": slide.url,
                "size": slide.image_size(),
            })
        })
        .collect();
    let summary = json!({
        "session_id": session.session_id,
        "notion_enabled": session.notion_enabled,
        "slides": slides,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    eprintln!("{}", editor.status().message);
    Ok(())
}

fn command_export(workspace: &HttpWorkspace, args: ExportArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("failed to read {}", args.request.display()))?;
    let request: ExportTaskRequest =
        serde_json::from_str(&raw).context("invalid export request JSON")?;

    let outcome = run_export(
        workspace.api(),
        &request,
        workspace.config().export_poll_interval(),
        print_progress,
    )?;
    println!("{}", outcome.message());
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    for link in &outcome.markdown_urls {
        println!("{}\t{}", link.title, link.url);
    }

    if args.notion {
        let upload = NotionTaskRequest {
            session_id: request.session_id.clone(),
            items: notion_items(&outcome),
        };
        upload_to_notion(workspace, &upload)?;
    }
    Ok(())
}

fn command_notion(workspace: &HttpWorkspace, args: NotionArgs) -> Result<()> {
    let items = args
        .items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>>>()?;
    upload_to_notion(
        workspace,
        &NotionTaskRequest {
            session_id: args.session,
            items,
        },
    )
}

fn upload_to_notion(workspace: &HttpWorkspace, request: &NotionTaskRequest) -> Result<()> {
    let outcome = run_notion_upload(
        workspace.api(),
        request,
        workspace.config().notion_poll_interval(),
        print_progress,
    )?;
    println!("{}", outcome.message());
    for url in outcome.page_urls() {
        println!("{url}");
    }
    for error in &outcome.errors {
        println!("error: {error}");
    }
    Ok(())
}

fn parse_item(raw: &str) -> Result<NotionItemRequest> {
    let Some((title, markdown_name)) = raw.split_once('=') else {
        bail!("expected `title=markdown_name`, got `{raw}`");
    };
    let markdown_name = markdown_name.trim();
    if markdown_name.is_empty() {
        bail!("missing markdown file name in `{raw}`");
    }
    Ok(NotionItemRequest {
        title: title.trim().to_string(),
        markdown_name: markdown_name.to_string(),
    })
}
