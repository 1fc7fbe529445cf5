use std::io::Read;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::counts::count_by_category;
use crate::datetime::parse_date_expr;
use crate::error::StoreError;
use crate::filter::{Criteria, ViewMode, filter_and_sort};
use crate::render::{Renderer, short_id};
use crate::stats::compute_stats;
use crate::store::{CategoryStore, TaskStore};
use crate::task::{Priority, Task, TaskDraft, TaskPatch};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "info", "modify", "done", "delete", "search", "category", "stats",
        "export", "import", "help", "version",
    ]
}

#[instrument(skip(tasks, categories, cfg, renderer, inv))]
pub fn dispatch(
    tasks: &mut TaskStore,
    categories: &mut CategoryStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();

    debug!(
        command = %inv.command,
        args = ?inv.args,
        "dispatching command"
    );

    match inv.command.as_str() {
        "add" => cmd_add(tasks, categories, &inv.args, now),
        "list" => cmd_list(tasks, categories, renderer, &inv.args, now),
        "info" => cmd_info(tasks, categories, renderer, &inv.args),
        "modify" => cmd_modify(tasks, categories, &inv.args, now),
        "done" => cmd_done(tasks, &inv.args, now),
        "delete" => cmd_delete(tasks, &inv.args),
        "search" => cmd_search(tasks, categories, renderer, &inv.args, now),
        "category" => cmd_category(tasks, categories, cfg, renderer, &inv.args),
        "stats" => cmd_stats(tasks, renderer, now),
        "export" => cmd_export(tasks),
        "import" => cmd_import(tasks),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[derive(Debug, Clone)]
enum Mod {
    Priority(Priority),
    Due(Option<DateTime<Utc>>),
    Category(Option<String>),
    Notes(Option<String>),
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "pri" | "priority" => {
            let priority = Priority::parse(value)
                .ok_or_else(|| anyhow!("invalid priority: {value} (use high/medium/low)"))?;
            Ok(Some(Mod::Priority(priority)))
        }
        "due" => {
            if value.is_empty() {
                Ok(Some(Mod::Due(None)))
            } else {
                Ok(Some(Mod::Due(Some(parse_date_expr(value, now)?))))
            }
        }
        "cat" | "category" => {
            if value.is_empty() {
                Ok(Some(Mod::Category(None)))
            } else {
                Ok(Some(Mod::Category(Some(value.to_string()))))
            }
        }
        "notes" => {
            if value.is_empty() {
                Ok(Some(Mod::Notes(None)))
            } else {
                Ok(Some(Mod::Notes(Some(value.to_string()))))
            }
        }
        _ => Ok(None),
    }
}

fn parse_words_and_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<String>, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal
            && let Some(one_mod) = parse_one_mod(arg, now)?
        {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    Ok((words, mods))
}

fn resolve_category_name(categories: &CategoryStore, name: &str) -> anyhow::Result<Uuid> {
    match categories.find_by_name(name)? {
        Some(category) => Ok(category.id),
        None => Err(anyhow!("unknown category: {name}")),
    }
}

/// Resolve a task by full uuid or unambiguous id prefix.
fn resolve_task_id(tasks: &TaskStore, token: &str) -> anyhow::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(token) {
        return Ok(id);
    }

    let needle = token.to_ascii_lowercase();
    let all = tasks.all()?;
    let matches: Vec<&Task> = all
        .iter()
        .filter(|task| task.id.simple().to_string().starts_with(&needle))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("no task matches id: {token}")),
        1 => Ok(matches[0].id),
        n => Err(anyhow!("id prefix {token} is ambiguous ({n} matches)")),
    }
}

#[instrument(skip(tasks, categories, args, now))]
fn cmd_add(
    tasks: &mut TaskStore,
    categories: &CategoryStore,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let (words, mods) = parse_words_and_mods(args, now)?;
    if words.is_empty() {
        return Err(anyhow!("add: title is required"));
    }

    let mut draft = TaskDraft::new(words.join(" "));
    for one_mod in mods {
        match one_mod {
            Mod::Priority(priority) => draft.priority = Some(priority),
            Mod::Due(due) => draft.due = due,
            Mod::Category(Some(name)) => {
                draft.category = Some(resolve_category_name(categories, &name)?);
            }
            Mod::Category(None) => draft.category = None,
            Mod::Notes(notes) => draft.notes = notes,
        }
    }

    let task = tasks.create(draft, now)?;
    println!("Created task {}.", short_id(task.id));
    Ok(())
}

#[instrument(skip(tasks, categories, renderer, args, now))]
fn cmd_list(
    tasks: &TaskStore,
    categories: &CategoryStore,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let mut criteria = Criteria::default();
    let mut view = ViewMode::All;
    let mut search_words = Vec::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once(':') {
            match key.to_ascii_lowercase().as_str() {
                "view" => {
                    view = ViewMode::parse(value)
                        .ok_or_else(|| anyhow!("invalid view: {value}"))?;
                    continue;
                }
                "cat" | "category" => {
                    criteria.category = Some(resolve_category_name(categories, value)?);
                    continue;
                }
                "pri" | "priority" => {
                    criteria.priority = Some(
                        Priority::parse(value)
                            .ok_or_else(|| anyhow!("invalid priority: {value}"))?,
                    );
                    continue;
                }
                _ => {}
            }
        }
        search_words.push(arg.clone());
    }

    if !search_words.is_empty() {
        criteria.search = Some(search_words.join(" "));
    }

    let all = tasks.all()?;
    let rows = filter_and_sort(&all, &criteria, view, now);
    renderer.print_task_table(&rows, &categories.all()?, now)?;

    debug!(
        shown = rows.len(),
        total = all.len(),
        view = view.as_str(),
        "listed tasks"
    );
    Ok(())
}

#[instrument(skip(tasks, categories, renderer, args))]
fn cmd_info(
    tasks: &TaskStore,
    categories: &CategoryStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command info");

    let token = args.first().ok_or_else(|| anyhow!("info: task id required"))?;
    let id = resolve_task_id(tasks, token)?;
    let task = tasks.get(id)?;
    renderer.print_task_info(&task, &categories.all()?)?;
    Ok(())
}

#[instrument(skip(tasks, categories, args, now))]
fn cmd_modify(
    tasks: &mut TaskStore,
    categories: &CategoryStore,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let token = args
        .first()
        .ok_or_else(|| anyhow!("modify: task id required"))?;
    let id = resolve_task_id(tasks, token)?;

    let (words, mods) = parse_words_and_mods(&args[1..], now)?;

    let mut patch = TaskPatch::default();
    if !words.is_empty() {
        patch.title = Some(words.join(" "));
    }
    for one_mod in mods {
        match one_mod {
            Mod::Priority(priority) => patch.priority = Some(priority),
            Mod::Due(due) => patch.due = Some(due),
            Mod::Category(Some(name)) => {
                patch.category = Some(Some(resolve_category_name(categories, &name)?));
            }
            Mod::Category(None) => patch.category = Some(None),
            Mod::Notes(notes) => patch.notes = Some(notes),
        }
    }

    if patch.is_empty() {
        return Err(anyhow!("modify: nothing to change"));
    }

    let task = tasks.update(id, patch, now)?;
    println!("Modified task {}.", short_id(task.id));
    Ok(())
}

#[instrument(skip(tasks, args, now))]
fn cmd_done(tasks: &mut TaskStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command done");

    if args.is_empty() {
        return Err(anyhow!("done: task id required"));
    }

    for token in args {
        let id = resolve_task_id(tasks, token)?;
        let task = tasks.toggle_complete(id, now)?;
        if task.completed {
            println!("Completed '{}'.", task.title);
        } else {
            println!("Reopened '{}'.", task.title);
        }
    }

    Ok(())
}

#[instrument(skip(tasks, args))]
fn cmd_delete(tasks: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    if args.is_empty() {
        return Err(anyhow!("delete: task id required"));
    }

    if args.len() == 1 {
        let id = resolve_task_id(tasks, &args[0])?;
        let removed = tasks.delete(id)?;
        println!("Deleted '{}'.", removed.title);
        return Ok(());
    }

    // Best-effort sweep: tokens that resolve to nothing are reported and
    // skipped, matching the store's bulk contract.
    let mut ids = Vec::new();
    let mut skipped = 0usize;
    for token in args {
        match resolve_task_id(tasks, token) {
            Ok(id) => ids.push(id),
            Err(err) => {
                warn!(token = %token, error = %err, "skipping unresolvable id");
                skipped += 1;
            }
        }
    }

    let removed = tasks.bulk_delete(&ids)?;
    for task in &removed {
        println!("Deleted '{}'.", task.title);
    }
    println!(
        "Deleted {} of {} task(s).",
        removed.len(),
        removed.len() + skipped
    );
    Ok(())
}

#[instrument(skip(tasks, categories, renderer, args, now))]
fn cmd_search(
    tasks: &TaskStore,
    categories: &CategoryStore,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command search");

    if args.is_empty() {
        return Err(anyhow!("search: query is required"));
    }
    let query = args.join(" ");

    let hits = tasks.search(&query)?;
    let rows = filter_and_sort(&hits, &Criteria::default(), ViewMode::All, now);
    renderer.print_task_table(&rows, &categories.all()?, now)?;
    Ok(())
}

#[instrument(skip(tasks, categories, cfg, renderer, args))]
fn cmd_category(
    tasks: &mut TaskStore,
    categories: &mut CategoryStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command category");

    match args.first().map(String::as_str) {
        None | Some("list") => {
            let all_tasks = tasks.all()?;
            let counts = count_by_category(&all_tasks);
            renderer.print_category_table(&categories.all()?, &counts, all_tasks.len() as u64)?;
            Ok(())
        }
        Some("add") => {
            let name = args
                .get(1)
                .ok_or_else(|| anyhow!("category add: name is required"))?;
            let color = args
                .get(2)
                .cloned()
                .or_else(|| cfg.get("category.color"))
                .unwrap_or_else(|| "#5b21b6".to_string());

            let category = categories.create(name, &color)?;
            println!("Created category '{}'.", category.name);
            Ok(())
        }
        Some("delete") => {
            let token = args
                .get(1)
                .ok_or_else(|| anyhow!("category delete: name or id required"))?;
            let id = resolve_category(categories, token)?;

            let referencing = count_by_category(&tasks.all()?)
                .get(&id)
                .copied()
                .unwrap_or(0);
            let removed = categories.delete(id, tasks)?;
            println!(
                "Deleted category '{}'; {} task(s) now uncategorized.",
                removed.name, referencing
            );
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown category subcommand: {other}")),
    }
}

fn resolve_category(categories: &CategoryStore, token: &str) -> anyhow::Result<Uuid> {
    if let Some(category) = categories.find_by_name(token)? {
        return Ok(category.id);
    }
    if let Ok(id) = Uuid::parse_str(token) {
        return Ok(id);
    }

    let needle = token.to_ascii_lowercase();
    let all = categories.all()?;
    let matches: Vec<Uuid> = all
        .iter()
        .filter(|c| c.id.simple().to_string().starts_with(&needle))
        .map(|c| c.id)
        .collect();

    match matches.len() {
        0 => Err(anyhow!("no category matches: {token}")),
        1 => Ok(matches[0]),
        n => Err(anyhow!("category {token} is ambiguous ({n} matches)")),
    }
}

#[instrument(skip(tasks, renderer, now))]
fn cmd_stats(tasks: &TaskStore, renderer: &mut Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command stats");

    let stats = compute_stats(&tasks.all()?, now);
    renderer.print_stats(&stats)?;
    Ok(())
}

#[instrument(skip(tasks))]
fn cmd_export(tasks: &TaskStore) -> anyhow::Result<()> {
    info!("command export");

    let all = tasks.all()?;
    let out = serde_json::to_string(&all)?;
    println!("{out}");
    Ok(())
}

#[instrument(skip(tasks))]
fn cmd_import(tasks: &mut TaskStore) -> anyhow::Result<()> {
    info!("command import");

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed reading stdin")?;

    let incoming: Vec<Task> =
        serde_json::from_str(&input).context("import expects a JSON array of tasks")?;

    let (added, updated) = match tasks.import(incoming) {
        Ok(counts) => counts,
        Err(StoreError::Validation(msg)) => return Err(anyhow!("import rejected: {msg}")),
        Err(err) => return Err(err.into()),
    };

    println!("Imported {added} task(s), updated {updated}.");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("taskdeck commands:");
    println!("  add <title> [priority:p] [due:expr] [category:name] [notes:text]");
    println!("  list [view:all|today|upcoming|completed] [category:name] [priority:p] [words]");
    println!("  info <id>");
    println!("  modify <id> [new title] [priority:p] [due:expr|due:] [category:name|category:]");
    println!("  done <id>...       toggle completion");
    println!("  delete <id>...     delete task(s); several ids are best-effort");
    println!("  search <words>");
    println!("  category [list] | add <name> [color] | delete <name-or-id>");
    println!("  stats");
    println!("  export | import");
    println!("  help | version");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Mod, parse_words_and_mods};
    use crate::task::Priority;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn words_and_mods_separate_cleanly() {
        let args = strings(&["Buy", "milk", "priority:high", "due:2024-07-01", "notes:2%"]);
        let (words, mods) = parse_words_and_mods(&args, now()).expect("parse");

        assert_eq!(words, vec!["Buy", "milk"]);
        assert_eq!(mods.len(), 3);
        assert!(matches!(mods[0], Mod::Priority(Priority::High)));
        assert!(matches!(mods[1], Mod::Due(Some(_))));
        assert!(matches!(mods[2], Mod::Notes(Some(ref n)) if n == "2%"));
    }

    #[test]
    fn empty_values_clear_and_literal_marker_escapes() {
        let args = strings(&["due:", "--", "priority:high"]);
        let (words, mods) = parse_words_and_mods(&args, now()).expect("parse");

        assert_eq!(words, vec!["priority:high"]);
        assert!(matches!(mods[0], Mod::Due(None)));
    }

    #[test]
    fn unknown_keys_stay_in_the_title() {
        let args = strings(&["Call", "Bob:", "urgent"]);
        let (words, mods) = parse_words_and_mods(&args, now()).expect("parse");

        assert_eq!(words, vec!["Call", "Bob:", "urgent"]);
        assert!(mods.is_empty());
    }

    #[test]
    fn bad_priority_is_an_error() {
        let args = strings(&["x", "priority:urgent"]);
        assert!(parse_words_and_mods(&args, now()).is_err());
    }
}
