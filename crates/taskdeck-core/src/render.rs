use std::collections::{BTreeMap, HashMap};
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::category::Category;
use crate::config::Config;
use crate::datetime::{format_project_date, to_project_date};
use crate::stats::Stats;
use crate::task::Task;

/// Abbreviated id shown in tables; any unambiguous prefix selects a task.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, categories, now))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        categories: &[Category],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let names: HashMap<Uuid, &str> = categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Category".to_string(),
            "Title".to_string(),
        ];

        let today = to_project_date(now);
        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = self.paint(&short_id(task.id), "33");
            let done = if task.completed { "x" } else { "" }.to_string();
            let pri = task.priority.as_str().to_string();

            let due = task.due.map(format_project_date).unwrap_or_default();
            let due = if let Some(task_due) = task.due {
                if !task.completed && to_project_date(task_due) < today {
                    self.paint(&due, "31")
                } else {
                    due
                }
            } else {
                due
            };

            let category = task
                .category
                .and_then(|id| names.get(&id).copied())
                .unwrap_or_default()
                .to_string();

            rows.push(vec![id, done, pri, due, category, task.title.clone()]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, categories, counts, total_tasks))]
    pub fn print_category_table(
        &mut self,
        categories: &[Category],
        counts: &BTreeMap<Uuid, u64>,
        total_tasks: u64,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Color".to_string(),
            "Tasks".to_string(),
        ];

        let mut rows = Vec::with_capacity(categories.len());
        for category in categories {
            let count = counts.get(&category.id).copied().unwrap_or(0);
            rows.push(vec![
                self.paint(&short_id(category.id), "33"),
                category.name.clone(),
                category.color.clone(),
                count.to_string(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;

        let categorized: u64 = counts.values().sum();
        writeln!(out, "All tasks: {total_tasks}")?;
        writeln!(
            out,
            "Uncategorized: {}",
            total_tasks.saturating_sub(categorized)
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&mut self, stats: &Stats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "total       {}", stats.total)?;
        writeln!(out, "completed   {}", stats.completed)?;
        writeln!(out, "due today   {}", stats.due_today)?;
        let overdue = stats.overdue.to_string();
        let overdue = if stats.overdue > 0 {
            self.paint(&overdue, "31")
        } else {
            overdue
        };
        writeln!(out, "overdue     {}", overdue)?;
        writeln!(out, "completion  {}%", stats.completion_rate())?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, categories))]
    pub fn print_task_info(&mut self, task: &Task, categories: &[Category]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id         {}", task.id)?;
        writeln!(out, "title      {}", task.title)?;
        writeln!(out, "completed  {}", task.completed)?;
        writeln!(out, "priority   {}", task.priority.as_str())?;

        let category = task.category.and_then(|id| {
            categories
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.name.clone())
        });
        writeln!(out, "category   {}", category.unwrap_or_default())?;

        if let Some(due) = task.due {
            writeln!(out, "due        {}", due.to_rfc3339())?;
        }
        writeln!(out, "created    {}", task.created_at.to_rfc3339())?;
        if let Some(completed_at) = task.completed_at {
            writeln!(out, "completed  {}", completed_at.to_rfc3339())?;
        }
        if let Some(notes) = &task.notes {
            writeln!(out, "notes      {notes}")?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
