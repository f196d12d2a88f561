use std::error::Error;
use std::time::Duration;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::catalog::PartitionKey;
use crate::io::config_io::{self, load_config};
use crate::io::ledger::tracked_ids;
use crate::io::remote::{LEADERBOARD_LIMIT, LeaderboardState};
use crate::io::session::{Session, open_session};
use crate::logging;
use crate::model::filter::{FilterState, SortDirection, SortField, SortState};
use crate::ops::identity::identity_key;
use crate::ops::query::{Limit, query};
use crate::ops::stats::{DashboardMetrics, ProgressStage};
use crate::util::collate::same_name;

type CmdResult = Result<(), Box<dyn Error>>;

/// How long `prep leaderboard` waits for the first snapshot
const LEADERBOARD_WAIT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    logging::init_stderr();
    let json = cli.json;
    let Some(command) = cli.command else {
        return Ok(());
    };

    let loaded = load_config(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let session = open_session(loaded)?;
        match command {
            // Catalog
            Commands::Companies => cmd_companies(&session, json),
            Commands::Timeframes(args) => cmd_timeframes(&session, args, json),
            Commands::Topics(args) => cmd_topics(&session, args, json).await,
            Commands::List(args) => cmd_list(&session, args, json).await,
            Commands::Stats(args) => cmd_stats(&session, args, json).await,

            // Progress
            Commands::Track(args) => cmd_set_tracked(&session, args, Some(true), json).await,
            Commands::Untrack(args) => cmd_set_tracked(&session, args, Some(false), json).await,
            Commands::Toggle(args) => cmd_set_tracked(&session, args, None, json).await,
            Commands::Tracked => cmd_tracked(&session, json).await,
            Commands::ClearTracked => cmd_clear_tracked(&session, json).await,

            // Account
            Commands::SignIn => cmd_sign_in(&session, json).await,
            Commands::SignOut => cmd_sign_out(&session, json).await,
            Commands::Sync => cmd_sync(&session, json).await,
            Commands::Leaderboard => cmd_leaderboard(&session, json).await,

            // Config
            Commands::Use(args) => cmd_use(&session, args, json),
        }
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolve the partition a command reads: `--all`, the named pair, or the
/// configured default. Names given explicitly must exist.
fn resolve_selection(session: &Session, args: &SelectionArgs) -> Result<(PartitionKey, String), Box<dyn Error>> {
    if args.all {
        return Ok((PartitionKey::All, "All companies".to_string()));
    }
    let catalog = &session.catalog;
    if let Some(company) = &args.company
        && !catalog
            .companies()
            .iter()
            .any(|known| same_name(known, company))
    {
        return Err(format!("unknown company '{}'", company).into());
    }
    let company = args
        .company
        .as_deref()
        .or(session.config.data.default_company.as_deref());
    let timeframe = args
        .timeframe
        .as_deref()
        .or(session.config.data.default_timeframe.as_deref());
    let (company, resolved_timeframe) = catalog
        .default_selection(company, timeframe)
        .ok_or("no problem data found")?;
    if let Some(timeframe) = &args.timeframe
        && catalog.resolve(&company, timeframe).is_none()
    {
        return Err(format!("unknown timeframe '{}' for {}", timeframe, company).into());
    }
    let label = format!("{} / {}", company, resolved_timeframe);
    Ok((PartitionKey::company(&company, &resolved_timeframe), label))
}

fn build_filters(args: &FilterArgs) -> Result<FilterState, Box<dyn Error>> {
    let mut filters = FilterState {
        search: args.search.clone().unwrap_or_default(),
        ..FilterState::default()
    };
    for level in &args.difficulties {
        filters.difficulties.insert(parse_difficulty(level)?);
    }
    for topic in &args.topics {
        filters.topics.insert(topic.trim().to_string());
    }
    Ok(filters)
}

/// Tracking ids are stored lowercased; accept any casing on the command line.
fn normalize_id(id: &str) -> Result<String, Box<dyn Error>> {
    let id = id.trim().to_lowercase();
    if id.is_empty() {
        return Err("problem id must not be empty".into());
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// Catalog commands
// ---------------------------------------------------------------------------

fn cmd_companies(session: &Session, json: bool) -> CmdResult {
    let companies = session.catalog.companies();
    if json {
        return print_json(&companies);
    }
    for company in &companies {
        println!("{}", company);
    }
    Ok(())
}

fn cmd_timeframes(session: &Session, args: TimeframesArgs, json: bool) -> CmdResult {
    let timeframes = match &args.company {
        Some(company) => {
            let timeframes = session.catalog.timeframes_for(company);
            if timeframes.is_empty() {
                return Err(format!("unknown company '{}'", company).into());
            }
            timeframes
        }
        None => session.catalog.all_timeframes(),
    };
    if json {
        return print_json(&timeframes);
    }
    for timeframe in &timeframes {
        println!("{}", timeframe);
    }
    Ok(())
}

async fn cmd_topics(session: &Session, args: SelectionArgs, json: bool) -> CmdResult {
    let (key, _) = resolve_selection(session, &args)?;
    let partition = session.catalog.load_partition(&key).await?;
    if json {
        return print_json(&partition.topics);
    }
    for topic in &partition.topics {
        println!("{}", topic);
    }
    Ok(())
}

async fn cmd_list(session: &Session, args: ListArgs, json: bool) -> CmdResult {
    let (key, label) = resolve_selection(session, &args.selection)?;
    let filters = build_filters(&args.filters)?;
    let sort = SortState::new(
        match args.sort {
            SortKey::Title => SortField::Title,
            SortKey::Difficulty => SortField::Difficulty,
        },
        if args.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        },
    );

    let partition = session.catalog.load_partition(&key).await?;
    session.reconcile().await;
    let tracked = session.ledger.snapshot();
    let result = query(&partition.records, &filters, &sort, Limit::from(args.limit));

    if json {
        return print_json(&ListJson {
            selection: label,
            total_matches: result.total_matches,
            truncated: result.truncated,
            problems: result
                .results
                .iter()
                .map(|r| problem_to_json(r, &tracked))
                .collect(),
        });
    }

    println!("{} ({} matches)", label, result.total_matches);
    println!();
    for record in &result.results {
        let done = tracked.get(&identity_key(record)).copied().unwrap_or(false);
        println!("{}", format_problem_line(record, done));
    }
    if result.truncated {
        println!();
        println!(
            "showing {} of {} (use --limit 0 for all)",
            result.results.len(),
            result.total_matches
        );
    }
    Ok(())
}

async fn cmd_stats(session: &Session, args: StatsArgs, json: bool) -> CmdResult {
    let (key, label) = resolve_selection(session, &args.selection)?;
    let filters = build_filters(&args.filters)?;
    let partition = session.catalog.load_partition(&key).await?;
    session.reconcile().await;

    let result = query(&partition.records, &filters, &SortState::default(), Limit::Unbounded);
    let metrics = DashboardMetrics::compute(&result.results, &session.ledger.snapshot());
    let stage = ProgressStage::from_total(session.ledger.count());

    if json {
        return print_json(&StatsJson {
            selection: label,
            metrics: &metrics,
            stage,
        });
    }
    println!("{}", label);
    println!();
    for line in format_metrics(&metrics, &stage) {
        println!("{}", line);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress commands
// ---------------------------------------------------------------------------

/// Set (`Some`) or flip (`None`) one problem's done flag, then wait for the
/// write to land.
async fn cmd_set_tracked(session: &Session, args: IdArgs, done: Option<bool>, json: bool) -> CmdResult {
    let id = normalize_id(&args.id)?;
    session.reconcile().await;
    let tracked = match done {
        Some(done) => {
            session.ledger.set(&id, done);
            done
        }
        None => session.ledger.toggle(&id),
    };
    session.ledger.flush().await;

    if json {
        return print_json(&ToggleJson {
            id,
            tracked,
            mode: session.ledger.mode(),
        });
    }
    let verb = if tracked { "Tracked" } else { "Untracked" };
    println!("{} {}", verb, id);
    Ok(())
}

async fn cmd_tracked(session: &Session, json: bool) -> CmdResult {
    session.reconcile().await;
    let ids = tracked_ids(&session.ledger.snapshot());
    if json {
        return print_json(&TrackedJson {
            mode: session.ledger.mode(),
            count: ids.len(),
            ids,
        });
    }
    for id in &ids {
        println!("{}", id);
    }
    Ok(())
}

async fn cmd_clear_tracked(session: &Session, json: bool) -> CmdResult {
    session.reconcile().await;
    let cleared = session.ledger.count();
    session.ledger.clear();
    session.ledger.flush().await;
    if json {
        return print_json(&serde_json::json!({ "cleared": cleared }));
    }
    println!("Cleared {} tracked problems", cleared);
    Ok(())
}

// ---------------------------------------------------------------------------
// Account commands
// ---------------------------------------------------------------------------

async fn cmd_sign_in(session: &Session, json: bool) -> CmdResult {
    let identity = session.identity.sign_in().await?;
    let outcome = session.sync.on_identity_change(Some(&identity)).await;
    session.ledger.flush().await;
    let name = identity.normalized_name();
    if json {
        return print_json(&SyncJson {
            user: Some(name),
            outcome,
        });
    }
    println!("Signed in as {}", name);
    println!("{}", format_outcome(&outcome));
    Ok(())
}

async fn cmd_sign_out(session: &Session, json: bool) -> CmdResult {
    session.identity.sign_out().await?;
    let outcome = session.sync.on_identity_change(None).await;
    if json {
        return print_json(&SyncJson { user: None, outcome });
    }
    println!("Signed out");
    println!("{}", format_outcome(&outcome));
    Ok(())
}

async fn cmd_sync(session: &Session, json: bool) -> CmdResult {
    let outcome = session.reconcile().await;
    session.ledger.flush().await;
    let user = session.identity.current().map(|i| i.normalized_name());
    if json {
        return print_json(&SyncJson { user, outcome });
    }
    println!("{}", format_outcome(&outcome));
    Ok(())
}

async fn cmd_leaderboard(session: &Session, json: bool) -> CmdResult {
    let remote = session
        .remote
        .as_ref()
        .ok_or("no remote store configured (set [storage] remote_dir)")?;
    let mut feed = remote.watch_leaderboard(LEADERBOARD_LIMIT)?;
    let state = loop {
        let state = feed.rx.borrow_and_update().clone();
        if state != LeaderboardState::Loading {
            break state;
        }
        match tokio::time::timeout(LEADERBOARD_WAIT, feed.rx.changed()).await {
            Ok(Ok(())) => continue,
            _ => break state,
        }
    };
    let entries = match state {
        LeaderboardState::Ready(entries) => entries,
        LeaderboardState::Loading => return Err("leaderboard did not load in time".into()),
        LeaderboardState::Failed(message) => {
            return Err(format!("could not load leaderboard: {}", message).into());
        }
    };

    let me = session.identity.current().map(|i| i.id);
    let is_you = |user_id: &str| me.as_deref() == Some(user_id);
    if json {
        let rows: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| LeaderboardRowJson {
                rank: i + 1,
                entry,
                is_you: is_you(&entry.user_id),
            })
            .collect();
        return print_json(&rows);
    }
    if entries.is_empty() {
        println!("No one has tracked a problem yet");
    }
    for (i, entry) in entries.iter().enumerate() {
        println!("{}", format_leaderboard_row(i + 1, entry, is_you(&entry.user_id)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_use(session: &Session, args: UseArgs, json: bool) -> CmdResult {
    let catalog = &session.catalog;
    let company = catalog
        .companies()
        .into_iter()
        .find(|known| same_name(known, &args.company))
        .ok_or_else(|| format!("unknown company '{}'", args.company))?;
    let timeframe = match &args.timeframe {
        Some(timeframe) => Some(
            catalog
                .resolve(&company, timeframe)
                .ok_or_else(|| format!("unknown timeframe '{}' for {}", timeframe, company))?
                .timeframe
                .clone(),
        ),
        None => None,
    };

    let mut doc = config_io::read_config_doc(&session.config_path)?;
    config_io::set_default_selection(&mut doc, &company, timeframe.as_deref());
    config_io::write_config_doc(&session.config_path, &doc)?;

    if json {
        return print_json(&SelectionJson { company, timeframe });
    }
    match timeframe {
        Some(timeframe) => println!("Default set to {} / {}", company, timeframe),
        None => println!("Default set to {}", company),
    }
    Ok(())
}
