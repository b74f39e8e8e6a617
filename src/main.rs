use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use seatsniper::config::SniperConfig;
use seatsniper::page::annotate;
use seatsniper::scheduler::TargetSchedule;
use seatsniper::status::StatusLog;
use seatsniper::storage::ledger::AttemptLedger;
use seatsniper::storage::store::ConfigStore;

#[derive(Parser)]
#[command(
    name = "seatsniper",
    about = "Time-triggered auto-registration for time-gated course sign-up pages",
    version,
    long_about = None
)]
struct Cli {
    /// Config file path (falls back to SEATSNIPER_CONFIG, then ./seatsniper.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watch daemon against a course page
    Watch {
        /// Course page URL
        #[arg(long)]
        url: String,

        /// Override the course key scraped from the page
        #[arg(long)]
        course: Option<String>,

        /// Bind address for the read-only status API (off when omitted)
        #[arg(long)]
        status_bind: Option<String>,
    },

    /// Manage the target schedule for a course
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Edit the ordered priority list for a course
    Priority {
        #[command(subcommand)]
        action: PriorityAction,
    },

    /// List session identifiers scraped from the course page
    Sessions {
        /// Course key
        #[arg(long)]
        course: String,
    },

    /// Inspect or adjust the attempt budget
    Attempts {
        #[command(subcommand)]
        action: AttemptsAction,
    },

    /// Show recent status-log entries
    Status {
        /// Course key (all courses when omitted)
        #[arg(long)]
        course: Option<String>,

        /// Number of entries
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// One-shot scrape: print the sessions found on a page
    Scrape {
        /// Course page URL
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// Saved page HTML file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Override the course key scraped from the page
        #[arg(long)]
        course: Option<String>,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Save the target instant; resets the attempt counter
    Set {
        /// Course key
        #[arg(long)]
        course: String,

        /// Target date, YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Target time of day: HH:MM, HH:MM:SS or HH:MM:SS.fff
        #[arg(long)]
        time: String,

        /// Sub-second precision in milliseconds (overrides a .fff part)
        #[arg(long)]
        millis: Option<u32>,
    },

    /// Show the stored schedule and its resolved instant
    Show {
        /// Course key
        #[arg(long)]
        course: String,
    },

    /// Remove the stored schedule
    Clear {
        /// Course key
        #[arg(long)]
        course: String,
    },
}

#[derive(Subcommand)]
enum PriorityAction {
    /// Append a session to the priority list
    Add {
        #[arg(long)]
        course: String,

        /// Session identifier
        session: String,

        /// Accept an identifier never seen on the page
        #[arg(long)]
        force: bool,
    },

    /// Remove a session from the priority list
    Remove {
        #[arg(long)]
        course: String,

        /// Session identifier
        session: String,
    },

    /// Move a session one rank up
    Up {
        #[arg(long)]
        course: String,

        /// Session identifier
        session: String,
    },

    /// Move a session one rank down
    Down {
        #[arg(long)]
        course: String,

        /// Session identifier
        session: String,
    },

    /// Print the list in rank order
    List {
        #[arg(long)]
        course: String,
    },
}

#[derive(Subcommand)]
enum AttemptsAction {
    /// Show the attempt counter and budget
    Show {
        #[arg(long)]
        course: String,
    },

    /// Override the attempt budget for a course
    SetMax {
        #[arg(long)]
        course: String,

        #[arg(long)]
        max: u32,
    },

    /// Zero the attempt counter
    Reset {
        #[arg(long)]
        course: String,
    },
}

fn open_store(cfg: &SniperConfig) -> Result<ConfigStore> {
    let pool = seatsniper::storage::open_pool(&cfg.storage.db_path)?;
    Ok(ConfigStore::new(pool))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = SniperConfig::resolve(cli.config.as_deref())?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.logging.level.clone())),
        )
        .init();

    match cli.command {
        Commands::Watch {
            url,
            course,
            status_bind,
        } => {
            tracing::info!(%url, "starting watch daemon");
            seatsniper::watch(&url, course, status_bind, &cfg).await?;
        }

        Commands::Schedule { action } => {
            let store = open_store(&cfg)?;
            match action {
                ScheduleAction::Set {
                    course,
                    date,
                    time,
                    millis,
                } => {
                    let schedule = TargetSchedule { date, time, millis };
                    // Refuse triples that could never fire.
                    let target = schedule
                        .resolve()
                        .map_err(|e| anyhow::anyhow!("invalid schedule: {e}"))?;
                    store.set_schedule(&course, &schedule)?;
                    println!(
                        "Schedule for '{}' set to {} (attempt counter reset).",
                        course,
                        target.to_rfc3339()
                    );
                }
                ScheduleAction::Show { course } => match store.schedule(&course)? {
                    Some(schedule) => {
                        println!("Date:   {}", schedule.date);
                        println!("Time:   {}", schedule.time);
                        if let Some(ms) = schedule.millis {
                            println!("Millis: {ms}");
                        }
                        match schedule.resolve() {
                            Ok(t) => println!("Fires:  {}", t.to_rfc3339()),
                            Err(e) => println!("Fires:  never ({e})"),
                        }
                    }
                    None => println!("No schedule stored for '{course}'."),
                },
                ScheduleAction::Clear { course } => {
                    if store.clear_schedule(&course)? {
                        println!("Schedule for '{course}' removed.");
                    } else {
                        println!("No schedule stored for '{course}'.");
                    }
                }
            }
        }

        Commands::Priority { action } => {
            let store = open_store(&cfg)?;
            match action {
                PriorityAction::Add {
                    course,
                    session,
                    force,
                } => {
                    if !force && !store.sessions(&course)?.contains(&session) {
                        anyhow::bail!(
                            "session '{session}' has never been seen on the page for '{course}' \
                             (use --force to add it anyway)"
                        );
                    }
                    if store.priority_add(&course, &session)? {
                        println!("Added '{session}'.");
                    } else {
                        println!("'{session}' is already on the list.");
                    }
                }
                PriorityAction::Remove { course, session } => {
                    if store.priority_remove(&course, &session)? {
                        println!("Removed '{session}'.");
                    } else {
                        println!("'{session}' is not on the list.");
                    }
                }
                PriorityAction::Up { course, session } => {
                    if store.priority_shift(&course, &session, true)? {
                        println!("Moved '{session}' up.");
                    } else {
                        println!("'{session}' cannot move up.");
                    }
                }
                PriorityAction::Down { course, session } => {
                    if store.priority_shift(&course, &session, false)? {
                        println!("Moved '{session}' down.");
                    } else {
                        println!("'{session}' cannot move down.");
                    }
                }
                PriorityAction::List { course } => {
                    let list = store.priority_list(&course)?;
                    if list.is_empty() {
                        println!("Priority list for '{course}' is empty.");
                    } else {
                        for (rank, session) in list.iter().enumerate() {
                            println!("#{:<3} {}", rank + 1, session);
                        }
                    }
                }
            }
        }

        Commands::Sessions { course } => {
            let store = open_store(&cfg)?;
            let sessions = store.sessions(&course)?;
            if sessions.is_empty() {
                println!("No sessions scraped yet for '{course}'. Run 'scrape' or 'watch' first.");
            } else {
                let priority = store.priority_list(&course)?;
                for (session, rank) in annotate::rank_labels(&sessions, &priority) {
                    println!("{:<12} {}", session, annotate::badge(rank));
                }
            }
        }

        Commands::Attempts { action } => {
            let store = open_store(&cfg)?;
            match action {
                AttemptsAction::Show { course } => {
                    let ledger = AttemptLedger::new(store.pool().clone(), course.clone());
                    println!(
                        "{} of {} attempts used.",
                        ledger.get()?,
                        store.max_attempts(&course)?
                    );
                }
                AttemptsAction::SetMax { course, max } => {
                    store.set_max_attempts(&course, max)?;
                    println!("Attempt budget for '{course}' set to {max}.");
                }
                AttemptsAction::Reset { course } => {
                    AttemptLedger::new(store.pool().clone(), course.clone()).reset()?;
                    println!("Attempt counter for '{course}' reset.");
                }
            }
        }

        Commands::Status { course, limit } => {
            let store = open_store(&cfg)?;
            let log = StatusLog::new(store.pool().clone());
            let entries = log.recent(course.as_deref(), limit)?;
            if entries.is_empty() {
                println!("No status entries.");
            } else {
                println!("{:<20} | {:<14} | {:<17} | Message", "Time", "Course", "State");
                println!("{:-<20}-|-{:-<14}-|-{:-<17}-|-{:-<40}", "", "", "", "");
                for e in entries {
                    println!(
                        "{:<20} | {:<14} | {:<17} | {}",
                        e.created_at, e.course, e.state, e.message
                    );
                }
            }
        }

        Commands::Scrape { url, file, course } => {
            let store = open_store(&cfg)?;
            let snapshot = match (url, file) {
                (Some(url), None) => {
                    let port = seatsniper::page::http::HttpPage::new(
                        &url,
                        &cfg.page.user_agent,
                        cfg.page.timeout_secs,
                        course,
                    )?;
                    use seatsniper::page::PagePort;
                    port.load().await?
                }
                (None, Some(path)) => {
                    let html = std::fs::read_to_string(&path)?;
                    let fallback = course.unwrap_or_else(|| path.display().to_string());
                    seatsniper::page::parse::parse_page(&html, &fallback)?
                }
                _ => anyhow::bail!("pass exactly one of --url or --file"),
            };

            store.merge_sessions(&snapshot.course, &snapshot.session_ids())?;
            let priority = store.priority_list(&snapshot.course)?;

            println!("Course: {}", snapshot.course);
            if snapshot.is_already_registered() {
                println!("Already registered (unregister control present).");
            }
            println!("{:<12} | {:<8} | {:<8} | Rank", "Session", "Primary", "Waitlist");
            println!("{:-<12}-|-{:-<8}-|-{:-<8}-|-{:-<5}", "", "", "", "");
            for (session, rank) in
                annotate::rank_labels(&snapshot.session_ids(), &priority)
            {
                let primary = if snapshot.primary_action(&session).is_some() {
                    "open"
                } else {
                    "-"
                };
                let waitlist = if snapshot.waitlist_action(&session).is_some() {
                    "open"
                } else {
                    "-"
                };
                println!(
                    "{:<12} | {:<8} | {:<8} | {}",
                    session,
                    primary,
                    waitlist,
                    annotate::badge(rank)
                );
            }
        }
    }

    Ok(())
}
