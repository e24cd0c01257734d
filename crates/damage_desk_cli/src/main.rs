//! damage-desk CLI: list, show, render, view, review.

mod console;

use clap::{Args, Parser, Subcommand};
use console::{format_delay, help_text, parse_command, ConsoleCommand};
use damage_desk::api::DEFAULT_BACKEND_URL;
use damage_desk::review::{ACCEPT_DELAY_MS, NOTICE_TTL_MS};
use damage_desk::{
    ApiConfig, DirectorySink, DocumentRenderer, EmailStatus, ReportSource, ReportsClient,
    ReviewConfig, ReviewScreen,
};
use damage_desk_pdf::{save_pdf, write_pdf, PdfRenderer};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

type Screen = ReviewScreen<ReportsClient, PdfRenderer, ReportsClient, DirectorySink>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    let mut screen = build_screen(&cli.global)?;
    match cli.command {
        Command::List => rt.block_on(run_list(&mut screen)),
        Command::Show(args) => rt.block_on(run_show(&mut screen, args)),
        Command::Render(args) => rt.block_on(run_render(&mut screen, args, &cli.global)),
        Command::View(args) => rt.block_on(run_view(&mut screen, args)),
        Command::Review => rt.block_on(run_review(&mut screen)),
    }
}

#[derive(Parser)]
#[command(name = "damage-desk")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Review, accept and mail crowd-sourced damage reports")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Backend base URL.
    #[arg(long, global = true, default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,
    /// Directory rendered reports are saved to.
    #[arg(long, global = true, default_value = ".")]
    out_dir: PathBuf,
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,
    /// Grace period before an accepted report is processed.
    #[arg(long, global = true, default_value_t = ACCEPT_DELAY_MS)]
    accept_delay_ms: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch reports and print the table.
    List,
    /// Print one report's fields.
    Show(RowArgs),
    /// Render a report to PDF without emailing it.
    Render(RenderArgs),
    /// Render, email and save a report immediately.
    View(RowArgs),
    /// Interactive review session (accept / cancel / reject).
    Review,
}

#[derive(Args)]
struct RowArgs {
    /// 1-based row number as shown by `list`.
    #[arg(long)]
    index: usize,
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    index: usize,
    /// Output file; defaults to <out-dir>/Damage_Report_<id>.pdf.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn build_screen(args: &GlobalArgs) -> Result<Screen, Box<dyn std::error::Error>> {
    let client = ReportsClient::new(&ApiConfig {
        base_url: args.backend_url.clone(),
        timeout_secs: args.timeout_secs,
    })?;
    let config = ReviewConfig {
        accept_delay_ms: args.accept_delay_ms,
        notice_ttl_ms: NOTICE_TTL_MS,
    };
    Ok(ReviewScreen::new(
        client.clone(),
        PdfRenderer,
        client,
        DirectorySink::new(&args.out_dir),
        &config,
    ))
}

/// Load with the loading banner shown while the request is in flight.
async fn load(screen: &mut Screen) -> Result<usize, damage_desk::ApiError> {
    screen.begin_load();
    print!("{}", screen.render_table());
    let result = screen.source().list_reports().await;
    screen.finish_load(result)
}

async fn run_list(screen: &mut Screen) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load(screen).await;
    print!("{}", screen.render_table());
    loaded?;
    Ok(())
}

async fn run_show(screen: &mut Screen, args: RowArgs) -> Result<(), Box<dyn std::error::Error>> {
    load(screen).await?;
    let report = screen.report(args.index)?;
    let image = report
        .resolved_image_url(screen.source().base_url())
        .unwrap_or_else(|| "-".to_string());
    println!("ID:       {}", report.id);
    println!("Location: {}", report.location);
    println!("Summary:  {}", report.summary);
    println!("Status:   {}", report.status);
    println!("Date:     {}", report.formatted_date());
    println!("Image:    {}", image);
    Ok(())
}

async fn run_render(
    screen: &mut Screen,
    args: RenderArgs,
    global: &GlobalArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    load(screen).await?;
    let report = screen.report(args.index)?;
    let document = PdfRenderer.render(report);
    let path = match args.out {
        Some(out) => {
            write_pdf(&document, &out)?;
            out
        }
        None => save_pdf(&document, &global.out_dir)?,
    };
    let digest = document.digest();
    info!(report_id = %report.id, path = %path.display(), %digest, "render complete");
    println!("{}\t{}", digest, path.display());
    Ok(())
}

async fn run_view(screen: &mut Screen, args: RowArgs) -> Result<(), Box<dyn std::error::Error>> {
    load(screen).await?;
    println!("Viewing report ID: {}", screen.report(args.index)?.id);
    let outcome = screen.view_now(args.index).await?;
    println!(">> {}", outcome.notice());
    if let EmailStatus::Failed(reason) = &outcome.email {
        eprintln!("email failed: {}", reason);
    }
    match &outcome.saved_to {
        Some(path) => println!("saved {}", path.display()),
        None => eprintln!("document was not saved"),
    }
    // Keep the banner up for its full lifetime, as the console would.
    let mut notices = screen.subscribe_notifications();
    while notices.borrow_and_update().is_some() {
        notices.changed().await?;
    }
    println!(">> (notification cleared)");
    Ok(())
}

async fn run_review(screen: &mut Screen) -> Result<(), Box<dyn std::error::Error>> {
    let _ = load(screen).await;
    print!("{}", screen.render_table());
    println!("{}", help_text(screen.accept_delay()));

    let mut notices = screen.subscribe_notifications();
    let mut views = screen.subscribe_views();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = notices.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = notices.borrow_and_update().clone().map(|n| n.text);
                match text {
                    Some(text) => println!(">> {}", text),
                    None => println!(">> (notification cleared)"),
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(id) = views.borrow_and_update().clone() {
                    println!("Viewing report ID: {}", id);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_command(screen, parse_command(&line)).await {
                    break;
                }
            }
        }
    }
    if let Some(id) = screen.cancel() {
        println!("Cancelled pending accept for report {}", id);
    }
    finish_in_flight(screen).await;
    Ok(())
}

/// Let accepted reports that already fired finish emailing and saving, so
/// leaving the session does not cut them off.
async fn finish_in_flight(screen: &Screen) {
    let running = screen.in_flight();
    if running == 0 {
        return;
    }
    println!("Waiting for {} accepted report(s) to finish...", running);
    let finished = screen.wait_in_flight().await;
    info!(finished, "in-flight views finished");
    if let Some(text) = screen.notification() {
        println!(">> {}", text);
    }
}

/// Returns false when the session should end.
async fn handle_command(screen: &mut Screen, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::List => print!("{}", screen.render_table()),
        ConsoleCommand::Refresh => {
            let _ = load(screen).await;
            print!("{}", screen.render_table());
        }
        ConsoleCommand::Accept(row) => match screen.accept(row) {
            Ok(report) => println!(
                "Accepting report {}: View Report to confirm ({}, `cancel` to undo)",
                report.id,
                format_delay(screen.accept_delay())
            ),
            Err(e) => println!("! {}", e),
        },
        ConsoleCommand::Cancel => match screen.cancel() {
            Some(id) => println!("Cancelled accept for report {}", id),
            None => println!("! nothing to cancel"),
        },
        ConsoleCommand::Reject(row) => match screen.reject(row) {
            Ok(report) => println!("Rejected report ID: {}", report.id),
            Err(e) => println!("! {}", e),
        },
        ConsoleCommand::Help => println!("{}", help_text(screen.accept_delay())),
        ConsoleCommand::Empty => {}
        ConsoleCommand::Invalid(msg) => println!("! {}", msg),
        ConsoleCommand::Quit => return false,
    }
    true
}
