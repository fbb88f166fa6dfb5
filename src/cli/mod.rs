pub mod daemon_path;
pub mod dates;
pub mod output;
pub mod process;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use dates::{parse_day, parse_moment, validation_error, DateStyle, DATE_HELP, MOMENT_HELP};
use output::{
    print_activities, print_blocks, print_calendar, print_daily, print_hourly, print_json,
    print_manual_tags, print_projects, print_timeline, print_weekly,
};
use process::{kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    analysis::{blocks::BlockWidth, Reports, DEFAULT_TREND_WEEKS},
    config::{locate_config, read_config, LiveConfig, TagKind},
    daemon::{
        start_daemon,
        storage::{
            entities::{ActivityFilter, ManualTag, TagUpdate, DEFAULT_ACTIVITY_LIMIT},
            record_storage::SqliteStore,
        },
    },
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "timetracker", version, long_about = None)]
#[command(about = "Tracks focused windows and reports where the working time went", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Configuration file. Defaults to ./timetracker.yaml, then ~/.config/timetracker/timetracker.yaml"
    )]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Day and month order for dates like 01/02/2025")]
    date_style: DateStyle,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct OutputArgs {
    #[arg(long, help = "Print JSON instead of tab separated rows")]
    json: bool,
}

#[derive(clap::Args, Debug, Clone)]
struct TagArgs {
    #[arg(long, help = "New task category")]
    task: Option<String>,
    #[arg(long, help = "New cost category")]
    cost: Option<String>,
}

impl From<TagArgs> for TagUpdate {
    fn from(value: TagArgs) -> Self {
        TagUpdate {
            task_category: value.task,
            cost_category: value.cost,
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(
        about = "Run a daemon directly in current console. Used for debugging and for running under a service manager"
    )]
    Serve {},
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Add a value to the task or cost category list")]
    AddTag {
        kind: TagKind,
        value: String,
    },
    #[command(about = "Load the configuration and compile every rule")]
    ValidateConfig {},
    #[command(flatten)]
    Report(ReportCommands),
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    #[command(visible_alias = "today", about = "Time per app and category for one day")]
    Daily {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Every record of a day in order")]
    Timeline {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Time per hour, app and task category")]
    Hourly {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Time per cost and task category over a range of days")]
    Projects {
        #[arg(long, help = format!("First day, a week ago by default. {DATE_HELP}"))]
        start: Option<String>,
        #[arg(long, help = format!("Last day, today by default. {DATE_HELP}"))]
        end: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Time per week and task category")]
    Weekly {
        #[arg(long, default_value_t = DEFAULT_TREND_WEEKS, help = "How many weeks to look back")]
        weeks: u32,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Fixed width blocks with suggested tags")]
    Blocks {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[arg(long, default_value_t = BlockWidth::DEFAULT, help = "Block width in minutes")]
        width: BlockWidth,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Raw activity records, newest first")]
    Activities {
        #[arg(long, help = MOMENT_HELP)]
        start: Option<String>,
        #[arg(long, help = MOMENT_HELP)]
        end: Option<String>,
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        cost: Option<String>,
        #[arg(long, default_value_t = DEFAULT_ACTIVITY_LIMIT)]
        limit: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Calendar events stored for a day")]
    Calendar {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    #[command(about = "Overwrite tags of recorded activity")]
    Retag {
        #[command(subcommand)]
        scope: RetagScope,
    },
    #[command(about = "Tags attached to a time range by hand")]
    ManualTag {
        #[command(subcommand)]
        action: ManualTagAction,
    },
}

#[derive(Subcommand, Debug)]
enum RetagScope {
    #[command(about = "Every record from start (inclusive) to end (exclusive), for example one block")]
    Range {
        #[arg(help = MOMENT_HELP)]
        start: String,
        #[arg(help = MOMENT_HELP)]
        end: String,
        #[command(flatten)]
        tags: TagArgs,
    },
    #[command(about = "Records of one app between start and end, both inclusive")]
    App {
        app: String,
        #[arg(help = MOMENT_HELP)]
        start: String,
        #[arg(help = MOMENT_HELP)]
        end: String,
        #[command(flatten)]
        tags: TagArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ManualTagAction {
    Add {
        #[arg(help = MOMENT_HELP)]
        start: String,
        #[arg(help = MOMENT_HELP)]
        end: String,
        #[command(flatten)]
        tags: TagArgs,
        #[arg(long)]
        notes: Option<String>,
    },
    List {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

type CliReports = Reports<Arc<SqliteStore>, Local>;

/// What report commands need from the global flags.
struct Session {
    app_dir: PathBuf,
    config: Option<PathBuf>,
    style: DateStyle,
}

impl Session {
    fn reports(&self) -> Result<CliReports> {
        let (path, exists) = locate_config(self.config.as_deref())?;
        let config = if exists {
            read_config(&path)?
        } else {
            Default::default()
        };
        let store = SqliteStore::open(&config.database_path(&self.app_dir))?;
        Ok(Reports::new(Arc::new(store), Local, Box::new(DefaultClock)))
    }

    fn moment(&self, input: &str) -> Result<DateTime<Utc>> {
        parse_moment(input, self.style)
    }

    fn moment_opt(&self, input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        input.map(|v| self.moment(v)).transpose()
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    let session = Session {
        app_dir,
        config: args.config,
        style: args.date_style,
    };

    match args.commands {
        Commands::Init {} => restart_server(&session.app_dir, session.config.as_deref()),
        Commands::Stop {} => kill_previous_servers(),
        Commands::Serve {} => start_daemon(session.app_dir, session.config).await,
        Commands::ValidateConfig {} => {
            let config = LiveConfig::load(session.config.as_deref())?;
            println!("Configuration {:?} is valid", config.path());
            Ok(())
        }
        Commands::AddTag { kind, value } => {
            let config = LiveConfig::load(session.config.as_deref())?;
            if config.add_tag_value(kind, &value)? {
                println!("Added {value:?} to {kind} in {:?}", config.path());
            } else {
                println!("{value:?} is already in {kind}");
            }
            Ok(())
        }
        Commands::Report(command) => run_report(&session, command)
            .await
            .context("unavailable"),
    }
}

async fn run_report(session: &Session, command: ReportCommands) -> Result<()> {
    let reports = session.reports()?;
    let today = reports.today();
    let day = |date: Option<String>| parse_day(date.as_deref(), session.style, today);

    match command {
        ReportCommands::Daily { date, output } => {
            let overview = reports.get_day_overview(day(date)?).await?;
            if output.json {
                print_json(&overview)
            } else {
                print_daily(&overview);
                Ok(())
            }
        }
        ReportCommands::Timeline { date, output } => {
            let records = reports.get_timeline(day(date)?).await?;
            if output.json {
                print_json(&records)
            } else {
                print_timeline(&records, reports.tz());
                Ok(())
            }
        }
        ReportCommands::Hourly { date, output } => {
            let rows = reports.get_hourly_breakdown(day(date)?).await?;
            if output.json {
                print_json(&rows)
            } else {
                print_hourly(&rows);
                Ok(())
            }
        }
        ReportCommands::Projects { start, end, output } => {
            let start = start.map(|v| day(Some(v))).transpose()?;
            let end = end.map(|v| day(Some(v))).transpose()?;
            let rows = reports.get_project_summary(start, end).await?;
            if output.json {
                print_json(&rows)
            } else {
                print_projects(&rows);
                Ok(())
            }
        }
        ReportCommands::Weekly { weeks, output } => {
            let rows = reports.get_weekly_trend(weeks).await?;
            if output.json {
                print_json(&rows)
            } else {
                print_weekly(&rows);
                Ok(())
            }
        }
        ReportCommands::Blocks {
            date,
            width,
            output,
        } => {
            let blocks = reports.get_time_blocks(day(date)?, width).await?;
            if output.json {
                print_json(&blocks)
            } else {
                print_blocks(&blocks, reports.tz());
                Ok(())
            }
        }
        ReportCommands::Activities {
            start,
            end,
            app,
            cost,
            limit,
            output,
        } => {
            let filter = ActivityFilter {
                start: session.moment_opt(start.as_deref())?,
                end: session.moment_opt(end.as_deref())?,
                app_name: app,
                cost_category: cost,
                limit,
            };
            let records = reports.get_activities(filter).await?;
            if output.json {
                print_json(&records)
            } else {
                print_activities(&records, reports.tz());
                Ok(())
            }
        }
        ReportCommands::Calendar { date, output } => {
            let events = reports.get_calendar_events(day(date)?).await?;
            if output.json {
                print_json(&events)
            } else {
                print_calendar(&events, reports.tz());
                Ok(())
            }
        }
        ReportCommands::Retag { scope } => {
            let changed = match scope {
                RetagScope::Range { start, end, tags } => {
                    let update = TagUpdate::from(tags);
                    reports
                        .retag_range(session.moment(&start)?, session.moment(&end)?, &update)
                        .await?
                }
                RetagScope::App {
                    app,
                    start,
                    end,
                    tags,
                } => {
                    let update = TagUpdate::from(tags);
                    reports
                        .retag_app(session.moment(&start)?, session.moment(&end)?, &app, &update)
                        .await?
                }
            };
            println!("Updated {changed} records");
            Ok(())
        }
        ReportCommands::ManualTag { action } => match action {
            ManualTagAction::Add {
                start,
                end,
                tags,
                notes,
            } => {
                let start_time = session.moment(&start)?;
                let end_time = session.moment(&end)?;
                if end_time < start_time {
                    return Err(validation_error(
                        "End of a manual tag can't be before its start".into(),
                    ));
                }
                let id = reports
                    .add_manual_tag(ManualTag {
                        id: None,
                        start_time,
                        end_time,
                        cost_category: tags.cost,
                        task_category: tags.task,
                        notes,
                    })
                    .await?;
                println!("Saved manual tag {id}");
                Ok(())
            }
            ManualTagAction::List { date, output } => {
                let tags = reports.get_manual_tags(day(date)?).await?;
                if output.json {
                    print_json(&tags)
                } else {
                    print_manual_tags(&tags, reports.tz());
                    Ok(())
                }
            }
        },
    }
}
