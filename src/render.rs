use std::{
    io::{self, Write},
    time::Duration,
};

use indicatif::ProgressBar;
use owo_colors::{OwoColorize, Stream};

use crate::{
    blog::{BlogPost, PostStatus},
    pipeline::LoadStatus,
    publication::{Publication, non_blank},
    review::{ReviewState, Tally},
    source::{PublicationSource, SourceError},
    view::View,
};

/// Shows a spinner on stderr while the wrapped source is fetching.
pub struct Spinning<'a>(pub &'a dyn PublicationSource);

impl PublicationSource for Spinning<'_> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn fetch(&self) -> Result<Vec<Publication>, SourceError> {
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("Querying {}", self.0.name()));
        pb.enable_steady_tick(Duration::from_millis(100));
        let res = self.0.fetch();
        pb.finish_and_clear();
        res
    }
}

fn mark(state: ReviewState) -> &'static str {
    match state {
        ReviewState::Accepted => "✓",
        ReviewState::Rejected => "✗",
        ReviewState::Unreviewed => "·",
    }
}

fn details(p: &Publication) -> String {
    let mut parts = Vec::new();
    if let Some(j) = non_blank(&p.journal) {
        parts.push(j.to_string());
    }
    if let Some(y) = p.year {
        parts.push(y.to_string());
    }
    parts.join(", ")
}

pub fn write_publications(out: &mut impl Write, view: &View<'_>) -> io::Result<()> {
    for item in &view.items {
        let p = item.publication;
        let m = mark(item.state);
        let m = match item.state {
            ReviewState::Accepted => m
                .if_supports_color(Stream::Stdout, |t| t.green())
                .to_string(),
            ReviewState::Rejected => m.if_supports_color(Stream::Stdout, |t| t.red()).to_string(),
            ReviewState::Unreviewed => m.to_string(),
        };
        writeln!(
            out,
            "{m} {}",
            p.display_title()
                .if_supports_color(Stream::Stdout, |t| t.bold())
        )?;
        if let Some(a) = non_blank(&p.authors) {
            writeln!(out, "  {a}")?;
        }
        let d = details(p);
        if !d.is_empty() {
            writeln!(out, "  {}", d.if_supports_color(Stream::Stdout, |t| t.italic()))?;
        }
        if let Some(u) = non_blank(&p.url) {
            writeln!(out, "  {}", u.if_supports_color(Stream::Stdout, |t| t.cyan()))?;
        }
        writeln!(
            out,
            "  {}",
            item.key.if_supports_color(Stream::Stdout, |t| t.dimmed())
        )?;
    }
    Ok(())
}

/// Load status plus visible count and review totals.
pub fn status_line(status: Option<&LoadStatus>, shown: usize, tally: &Tally) -> String {
    let counts = format!(
        "Showing {shown} · ✓ {} accepted · ? {} unreviewed · ✗ {} rejected",
        tally.accepted, tally.unreviewed, tally.rejected
    );
    match status {
        Some(s) => format!("{s}\n{counts}"),
        None => counts,
    }
}

pub fn print_status(status: Option<&LoadStatus>, shown: usize, tally: &Tally) {
    let line = status_line(status, shown, tally);
    if status.is_some_and(LoadStatus::is_fallback) {
        eprintln!("{}", line.if_supports_color(Stream::Stderr, |t| t.yellow()));
    } else {
        eprintln!("{line}");
    }
}

pub fn write_posts(out: &mut impl Write, posts: &[&BlogPost], admin: bool) -> io::Result<()> {
    for post in posts {
        let date = post
            .published_at
            .unwrap_or_else(|| post.touched_at())
            .date_naive();
        write!(
            out,
            "{} {}",
            date,
            post.title.if_supports_color(Stream::Stdout, |t| t.bold())
        )?;
        if !post.author.trim().is_empty() {
            write!(out, " by {}", post.author.trim())?;
        }
        if admin {
            let badge = match post.status {
                PostStatus::Published => "[published]"
                    .if_supports_color(Stream::Stdout, |t| t.green())
                    .to_string(),
                PostStatus::Draft => "[draft]"
                    .if_supports_color(Stream::Stdout, |t| t.yellow())
                    .to_string(),
            };
            write!(out, " {badge} {}", post.id.if_supports_color(Stream::Stdout, |t| t.dimmed()))?;
        }
        writeln!(out)?;
        for line in post.content.lines() {
            writeln!(out, "    {line}")?;
        }
    }
    Ok(())
}
