use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ssv_app::{AppConfig, AppError, AppResult, StateService, StateUpdate, load_config};
use ssv_client::{DataSource, HttpSource, MemorySource};
use ssv_core::{JobId, ScoreType, SpreadsheetId};
use ssv_state::{MainSpreadsheetRequest, RowRef, StateRequest, StateSnapshot, SurvivalRequest};

#[derive(Parser)]
#[command(name = "ssv-cli")]
#[command(about = "Spreadsheet visualizer CLI - resolve heatmap state for a job", long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Serve data from a fixture file instead of the server
    #[arg(long, global = true, conflicts_with = "base_url")]
    fixture: Option<PathBuf>,
    /// Data server base URL (overrides the configuration file)
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the spreadsheets of a job
    Sheets {
        /// Job ID
        #[arg(long)]
        job: u64,
    },
    /// Resolve a visualization request and print the resulting state
    View {
        /// Job ID
        #[arg(long)]
        job: u64,
        /// Request file (YAML); flags below are applied on top of it
        #[arg(long)]
        request: Option<PathBuf>,
        /// Grouping row as SHEET:ROW (row name or index)
        #[arg(long)]
        group_by: Option<String>,
        /// Sorting row as SHEET:ROW (row name or index)
        #[arg(long)]
        sort_by: Option<String>,
        /// Heatmap settings as SHEET:FILTER:LIMIT:SORT, e.g. 1:variance:50:correlation
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Extra row to display as SHEET:ROW (repeatable)
        #[arg(long = "row")]
        rows: Vec<String>,
        /// Seconds to wait for the snapshot
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Print an example request file
    RequestTemplate,
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Sheets { job } => cmd_sheets(&cli, JobId(*job)),
        Commands::View {
            job,
            request,
            group_by,
            sort_by,
            filters,
            rows,
            timeout,
        } => {
            let overrides = ViewOverrides {
                group_by: group_by.as_deref(),
                sort_by: sort_by.as_deref(),
                filters,
                rows,
            };
            cmd_view(
                &cli,
                JobId(*job),
                request.as_deref(),
                &overrides,
                Duration::from_secs(*timeout),
            )
        }
        Commands::RequestTemplate => cmd_request_template(),
    }
}

fn open_service(cli: &Cli) -> AppResult<StateService> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(url) = &cli.base_url {
        config.client.base_url = url.clone();
    }

    let source: Arc<dyn DataSource> = match &cli.fixture {
        Some(path) => {
            tracing::info!(fixture = %path.display(), "serving data from fixture");
            Arc::new(MemorySource::load(path)?)
        }
        None => {
            tracing::info!(base_url = %config.client.base_url, "connecting to data server");
            Arc::new(HttpSource::new(&config.client)?)
        }
    };
    StateService::new(source, config.service)
}

fn cmd_sheets(cli: &Cli, job: JobId) -> AppResult<()> {
    let service = open_service(cli)?;
    service.initialize(job)?;
    let snapshot = service
        .latest_snapshot()
        .ok_or_else(|| AppError::Timeout("bootstrap snapshot".to_string()))?;

    if snapshot.spreadsheets().is_empty() {
        println!("No spreadsheets in job {}", job);
        return Ok(());
    }
    println!("Spreadsheets in job {}:", job);
    for sheet in snapshot.spreadsheets() {
        println!(
            "  {} - {} rows x {} samples{}{}",
            sheet.id(),
            sheet.row_count(),
            sheet.sample_count(),
            if sheet.is_heatmap_eligible() {
                ", heatmap eligible"
            } else {
                ""
            },
            if sheet.is_transposed() { ", transposed" } else { "" },
        );
    }
    Ok(())
}

struct ViewOverrides<'a> {
    group_by: Option<&'a str>,
    sort_by: Option<&'a str>,
    filters: &'a [String],
    rows: &'a [String],
}

fn cmd_view(
    cli: &Cli,
    job: JobId,
    request_path: Option<&Path>,
    overrides: &ViewOverrides<'_>,
    timeout: Duration,
) -> AppResult<()> {
    let mut request = match request_path {
        Some(path) => load_request(path)?,
        None => StateRequest::new(),
    };

    let service = open_service(cli)?;
    let stream = service.initialize(job)?;
    let bootstrap = match stream.recv_timeout(timeout) {
        Some(StateUpdate::Snapshot(snapshot)) => snapshot,
        _ => return Err(AppError::Timeout("bootstrap snapshot".to_string())),
    };

    if let Some(arg) = overrides.group_by {
        request = request.with_grouping(Some(resolve_row(&bootstrap, arg)?));
    }
    if let Some(arg) = overrides.sort_by {
        request = request.with_sorting(Some(resolve_row(&bootstrap, arg)?));
    }
    for arg in overrides.filters {
        request = request.with_main(parse_filter(arg)?);
    }
    for arg in overrides.rows {
        request = request.with_other_row(resolve_row(&bootstrap, arg)?);
    }

    service.submit(request);
    match stream.recv_timeout(timeout) {
        Some(StateUpdate::Snapshot(snapshot)) => {
            print_snapshot(&snapshot);
            Ok(())
        }
        Some(StateUpdate::Failed(notice)) => {
            if notice.unauthorized {
                eprintln!("Not authenticated; check the token in the configuration file");
            }
            Err(AppError::RequestFailed(notice.message))
        }
        Some(StateUpdate::Ended) => Err(AppError::SessionEnded),
        None => Err(AppError::Timeout("snapshot".to_string())),
    }
}

fn cmd_request_template() -> AppResult<()> {
    let expression = SpreadsheetId(1);
    let clinical = SpreadsheetId(2);
    let request = StateRequest::new()
        .with_grouping(Some(RowRef::new(clinical, 0)))
        .with_sorting(Some(RowRef::new(clinical, 3)))
        .with_main(MainSpreadsheetRequest {
            spreadsheet_id: expression,
            filter_type: ScoreType::Variance,
            filter_limit: 50,
            sort_type: ScoreType::Correlation,
        })
        .with_other_row(RowRef::new(clinical, 3))
        .with_survival(Some(SurvivalRequest {
            time_row: RowRef::new(clinical, 1),
            event_row: RowRef::new(clinical, 2),
            event_value: "dead".to_string(),
        }))
        .with_pvalue_row(RowRef::new(expression, 1));

    let yaml = serde_yaml::to_string(&request)
        .map_err(|e| AppError::InvalidInput(format!("Failed to serialize request: {}", e)))?;
    print!("{}", yaml);
    Ok(())
}

fn load_request(path: &Path) -> AppResult<StateRequest> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        AppError::InvalidInput(format!("Failed to parse request {}: {}", path.display(), e))
    })
}

/// `SHEET:ROW`, where ROW is a row name or, failing that, an index.
fn resolve_row(snapshot: &StateSnapshot, arg: &str) -> AppResult<RowRef> {
    let (sheet, row) = arg
        .split_once(':')
        .ok_or_else(|| AppError::InvalidInput(format!("expected SHEET:ROW, got '{}'", arg)))?;
    let sheet_id = parse_sheet(sheet)?;
    let sheet = snapshot.spreadsheet(sheet_id).ok_or_else(|| {
        AppError::InvalidInput(format!("spreadsheet {} is not part of this job", sheet_id))
    })?;

    let idx = match sheet.find_row(row) {
        Some(idx) => idx,
        None => row
            .parse::<usize>()
            .ok()
            .filter(|idx| *idx < sheet.row_count())
            .ok_or_else(|| {
                AppError::InvalidInput(format!("no row '{}' in spreadsheet {}", row, sheet_id))
            })?,
    };
    Ok(RowRef::new(sheet_id, idx))
}

/// `SHEET:FILTER:LIMIT:SORT`
fn parse_filter(arg: &str) -> AppResult<MainSpreadsheetRequest> {
    let parts: Vec<&str> = arg.split(':').collect();
    let [sheet, filter, limit, sort] = parts.as_slice() else {
        return Err(AppError::InvalidInput(format!(
            "expected SHEET:FILTER:LIMIT:SORT, got '{}'",
            arg
        )));
    };
    let score = |s: &str| {
        s.parse::<ScoreType>()
            .map_err(|e| AppError::InvalidInput(format!("'{}': {}", s, e)))
    };
    Ok(MainSpreadsheetRequest {
        spreadsheet_id: parse_sheet(sheet)?,
        filter_type: score(*filter)?,
        filter_limit: limit
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("invalid row limit '{}'", limit)))?,
        sort_type: score(*sort)?,
    })
}

fn parse_sheet(s: &str) -> AppResult<SpreadsheetId> {
    s.trim()
        .parse::<u64>()
        .map(SpreadsheetId)
        .map_err(|_| AppError::InvalidInput(format!("invalid spreadsheet id '{}'", s)))
}

fn snapshot_header(snapshot: &StateSnapshot) -> String {
    format!(
        "Snapshot of {} spreadsheet(s), generated {}",
        snapshot.spreadsheets().len(),
        snapshot.generated_at().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn print_snapshot(snapshot: &StateSnapshot) {
    println!("{}", snapshot_header(snapshot));
    let samples = snapshot.ordered_sample_names();
    println!("Samples ({}): {}", samples.len(), samples.join(" "));

    if snapshot.grouping_row().is_some() {
        println!("Groups:");
        for span in snapshot.group_boundaries() {
            println!(
                "  {:<12} {} samples from position {}",
                span.label.as_deref().unwrap_or("(missing)"),
                span.len,
                span.start
            );
        }
    }

    for sheet in snapshot.spreadsheets() {
        let rows = snapshot.heatmap_rows(sheet.id());
        if rows.is_empty() {
            continue;
        }
        println!("Heatmap rows of spreadsheet {}:", sheet.id());
        for row in rows {
            let fmt_score = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{:.3}", v));
            println!(
                "  {:<20} variance={:<10} correlation={}",
                row.name(sheet).unwrap_or("?"),
                fmt_score(row.variance(sheet)),
                fmt_score(row.correlation(sheet))
            );
        }
    }

    if !snapshot.other_rows().is_empty() {
        println!("Other rows:");
        for row in snapshot.other_rows() {
            let name = snapshot
                .sheet_of(row)
                .and_then(|sheet| row.name(sheet))
                .unwrap_or("?");
            println!("  {} {}", RowRef::from(row.as_ref()), name);
        }
    }

    if !snapshot.pvalues().is_empty() {
        println!("Survival p-values:");
        for result in snapshot.pvalues() {
            let name = snapshot
                .row(result.row)
                .and_then(|row| snapshot.sheet_of(row).and_then(|sheet| row.name(sheet)))
                .unwrap_or("?");
            println!("  {} {:<20} p={:.4}", result.row, name, result.pvalue);
        }
    }
}
