use std::io::{self, Write};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{BlogCommand, Cli, Command, PubsCommand, ThemeAction};
use folio::{
    blog::{self, BlogError, BlogPost, BlogStore, Editor, PostDraft},
    config::Config,
    pipeline::{self, Controller, LoadOutcome},
    render::{self, Spinning},
    review::{ReviewLedger, ReviewState},
    source::{PublicationSource, local, pubmed::PubMed},
    store::{FileStore, KvStore},
    theme,
    view::ViewQuery,
};

mod cli;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = Config::load(args.config.as_deref())?;
    let state_dir = config.state_dir(args.state_dir.as_deref())?;
    let store = FileStore::open(&state_dir)?;

    match args.command {
        Command::Pubs(cmd) => run_pubs(cmd, &config, &store),
        Command::Blog(cmd) => run_blog(cmd, &config, &store),
        Command::Theme { action } => run_theme(action.unwrap_or_default(), &store),
    }
}

fn init_tracing(verbose: u8) {
    // Failures are reported through status lines; logs stay quiet unless asked for.
    let default = match verbose {
        0 => "error",
        1 => "folio=debug,warn",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load(config: &Config, offline: bool) -> LoadOutcome {
    let pubmed = PubMed::new(&config.pubmed);
    let spinning = Spinning(&pubmed);
    let remote: Option<&dyn PublicationSource> = if offline { None } else { Some(&spinning) };
    pipeline::load_publications(
        config.publications.source().as_ref(),
        config.publications.timeout(),
        remote,
    )
}

fn run_pubs(cmd: PubsCommand, config: &Config, store: &dyn KvStore) -> anyhow::Result<()> {
    let mut controller = Controller::new(ReviewLedger::load(store)?);

    match cmd {
        PubsCommand::List {
            search,
            sort,
            filter,
            year,
            offline,
        } => {
            let ticket = controller.begin_load();
            controller.complete_load(ticket, load(config, offline));

            let query = ViewQuery {
                search,
                year,
                sort,
                filter,
            };
            let view = controller.view(&query);
            let mut out = io::stdout().lock();
            render::write_publications(&mut out, &view)?;
            out.flush()?;
            render::print_status(controller.status(), view.items.len(), &view.tally);
        }
        PubsCommand::Accept { key, offline } => {
            review(&mut controller, config, &key, ReviewState::Accepted, offline)?
        }
        PubsCommand::Reject { key, offline } => {
            review(&mut controller, config, &key, ReviewState::Rejected, offline)?
        }
        PubsCommand::Undo { key, offline } => {
            review(&mut controller, config, &key, ReviewState::Unreviewed, offline)?
        }
        PubsCommand::ClearReviews { yes } => {
            let n = controller.ledger().len();
            if n == 0 {
                eprintln!("No review decisions to clear.");
                return Ok(());
            }
            if !yes && !cli::confirm(&format!("Clear all {n} review decisions?"))? {
                eprintln!("Aborted.");
                return Ok(());
            }
            controller.clear_reviews()?;
            eprintln!("Cleared {n} review decisions.");
        }
    }
    Ok(())
}

fn review(
    controller: &mut Controller<'_>,
    config: &Config,
    key: &str,
    state: ReviewState,
    offline: bool,
) -> anyhow::Result<()> {
    let ticket = controller.begin_load();
    controller.complete_load(ticket, load(config, offline));
    controller.review(key, state)?;
    match controller.find(key) {
        Some(p) => eprintln!("{}: {state} ({})", key.trim(), p.display_title()),
        None => eprintln!("{}: {state}", key.trim()),
    }
    Ok(())
}

fn open_blog<'s>(
    config: &Config,
    store: &'s dyn KvStore,
    admin_flag: bool,
) -> anyhow::Result<BlogStore<'s>> {
    let admin = blog::admin_session(store, admin_flag)?;
    let public: Vec<BlogPost> = config
        .blog
        .source()
        .map(|src| local::load_array(&src, config.publications.timeout()))
        .unwrap_or_default();
    BlogStore::open(store, public, admin)
}

fn run_blog(cmd: BlogCommand, config: &Config, store: &dyn KvStore) -> anyhow::Result<()> {
    match cmd {
        BlogCommand::List { admin } => {
            let blog = open_blog(config, store, admin)?;
            let posts = blog.visible();
            let mut out = io::stdout().lock();
            render::write_posts(&mut out, &posts, blog.is_admin())?;
            out.flush()?;
            eprintln!("{} posts", posts.len());
        }
        BlogCommand::Save {
            edit,
            title,
            author,
            content,
            status,
            admin,
        } => {
            let mut blog = open_blog(config, store, admin)?;
            let editor = match edit {
                Some(id) => {
                    let existing = blog
                        .get(&id)
                        .ok_or_else(|| BlogError::NotFound(id.clone()))?;
                    let mut draft = PostDraft::from_post(existing);
                    if let Some(t) = title {
                        draft.title = t;
                    }
                    if let Some(a) = author {
                        draft.author = a;
                    }
                    if let Some(c) = content {
                        draft.content = c;
                    }
                    if let Some(s) = status {
                        draft.status = s;
                    }
                    Editor::edit(id, draft)
                }
                None => Editor::create(PostDraft {
                    title: title.unwrap_or_default(),
                    author: author.unwrap_or_else(|| config.blog.default_author.clone()),
                    content: content.unwrap_or_default(),
                    status: status.unwrap_or_default(),
                }),
            };
            let post = blog.submit(&editor, Utc::now())?;
            println!("{}", post.id);
            eprintln!("Saved {} post \"{}\".", post.status, post.title);
        }
        BlogCommand::Delete { id, yes, admin } => {
            let mut blog = open_blog(config, store, admin)?;
            if !blog.is_admin() {
                return Err(BlogError::AdminRequired.into());
            }
            let title = blog
                .get(&id)
                .map(|p| p.title.clone())
                .ok_or_else(|| BlogError::NotFound(id.clone()))?;
            if !yes && !cli::confirm(&format!("Delete \"{title}\"?"))? {
                eprintln!("Aborted.");
                return Ok(());
            }
            blog.delete(&id)
                .with_context(|| format!("could not delete post {id}"))?;
            eprintln!("Deleted \"{title}\".");
        }
        BlogCommand::Logout => {
            blog::logout(store)?;
            eprintln!("Admin mode off.");
        }
    }
    Ok(())
}

fn run_theme(action: ThemeAction, store: &dyn KvStore) -> anyhow::Result<()> {
    let theme = match action {
        ThemeAction::Show => theme::current(store)?,
        ThemeAction::Toggle => theme::toggle(store)?,
    };
    println!("{theme}");
    Ok(())
}
