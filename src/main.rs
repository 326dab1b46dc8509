use clap::Parser;
use tracing_subscriber::EnvFilter;

use tagmark::{
    BookmarkService,
    BookmarkStore,
    DataDir,
    SearchIndex,
    cli::{self, Cli, Command, ConfigAction},
    error::{self, Error},
    models::{Bookmark, BookmarkUpdate, NewBookmark},
    search,
    service::{DEFAULT_PAGE_SIZE, PAGE_SIZE_SETTING},
    text_util::{slugify, split_tag_list},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("TAGMARK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let store = BookmarkStore::open(&data_dir.bookmarks_db())?;
    let index = SearchIndex::open(&data_dir.tantivy_dir()?)?;
    let service = BookmarkService::new(&store, &index);

    match cli.command {
        Command::Add(args) => cmd_add(&service, args)?,
        Command::Edit(args) => cmd_edit(&service, args)?,
        Command::Delete { id } => {
            if !service.delete(id)? {
                return Err(Error::NotFound {
                    kind: "bookmark",
                    name: id.to_string(),
                });
            }
            println!("Deleted bookmark {id}");
        }
        Command::Get { id, json } => {
            let bookmark = service.get(id)?;
            if json {
                println!("{}", search::format_json(&bookmark)?);
            } else {
                print_bookmark(&bookmark);
            }
        }
        Command::List(args) => cmd_list(&service, &args)?,
        Command::Search(args) => cmd_search(&service, &args)?,
        Command::Reindex => {
            let count = service.indexer().reindex_all()?;
            println!("Reindexed {count} bookmark(s)");
        }
        Command::Status { json } => cmd_status(&service, &data_dir, json)?,
        Command::Reset => {
            service.reset()?;
            println!("Removed all bookmarks and tags");
        }
        Command::Config { action } => cmd_config(&service, &store, action)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_add(service: &BookmarkService<'_>, args: cli::AddArgs) -> error::Result<()> {
    let title = args.title.unwrap_or_else(|| args.url.clone());
    let bookmark = service.add(NewBookmark {
        url: args.url,
        title,
        tags: split_tag_list(&args.tags),
        created_at: None,
    })?;
    println!("Added bookmark {}", bookmark.id);
    Ok(())
}

fn cmd_edit(service: &BookmarkService<'_>, args: cli::EditArgs) -> error::Result<()> {
    let current = service.get(args.id)?;
    let tags = match args.tags {
        Some(list) => split_tag_list(&list),
        None => current.tags.iter().map(|t| t.title.clone()).collect(),
    };
    let bookmark = service.edit(
        args.id,
        BookmarkUpdate {
            url: args.url.unwrap_or(current.url),
            title: args.title.unwrap_or(current.title),
            tags,
        },
    )?;
    println!("Updated bookmark {}", bookmark.id);
    Ok(())
}

fn cmd_list(service: &BookmarkService<'_>, args: &cli::ListArgs) -> error::Result<()> {
    let page_size = resolve_page_size(service, args.count)?;
    let slug = args.tag.as_deref().map(slugify);
    let page = service.engine().list(args.page, page_size, slug.as_deref())?;

    if args.json {
        println!("{}", search::format_json(&page)?);
    } else {
        print!(
            "{}",
            search::format_human(&page.bookmarks, page.total, args.page, page_size)
        );
    }
    Ok(())
}

fn cmd_search(
    service: &BookmarkService<'_>,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let page_size = resolve_page_size(service, args.count)?;
    let page = service.engine().search(&args.query, args.page, page_size)?;

    if args.json {
        println!("{}", search::format_json(&page)?);
    } else {
        print!(
            "{}",
            search::format_human(&page.bookmarks, page.total, args.page, page_size)
        );
        if !page.stale_hits.is_empty() {
            eprintln!(
                "Warning: {} result(s) point at deleted bookmarks; run `tagmark reindex`",
                page.stale_hits.len()
            );
        }
    }
    Ok(())
}

fn cmd_status(
    service: &BookmarkService<'_>,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let status = service.status()?;

    if json {
        let value = serde_json::json!({
            "data_dir": data_dir.root(),
            "status": status,
        });
        println!("{}", search::format_json(&value)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Bookmarks: {}", status.bookmarks);
        println!("Tags: {}", status.tags);
        println!("Indexed documents: {}", status.indexed_documents);
        if status.in_sync {
            println!("Index: in sync");
        } else {
            println!(
                "Index: out of sync ({} missing, {} stale); run `tagmark reindex`",
                status.missing_from_index.len(),
                status.stale_in_index.len()
            );
        }
    }
    Ok(())
}

fn cmd_config(
    service: &BookmarkService<'_>,
    store: &BookmarkStore,
    action: ConfigAction,
) -> error::Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let page_size = service.default_page_size()?;
            let stored = store.get_setting(PAGE_SIZE_SETTING)?;
            if json {
                let value = serde_json::json!({
                    "page_size": page_size,
                    "source": if stored.is_some() { "config" } else { "default" },
                });
                println!("{}", search::format_json(&value)?);
            } else if stored.is_some() {
                println!("page_size: {page_size}");
            } else {
                println!("page_size: {page_size} (default)");
            }
        }
        ConfigAction::SetPageSize { size } => {
            service.set_default_page_size(size)?;
            println!("Set page_size to {size}");
        }
        ConfigAction::Clear => {
            if service.clear_default_page_size()? {
                println!("Cleared page_size (default: {DEFAULT_PAGE_SIZE})");
            } else {
                println!("No page_size set (default: {DEFAULT_PAGE_SIZE})");
            }
        }
    }
    Ok(())
}

fn resolve_page_size(
    service: &BookmarkService<'_>,
    explicit: Option<usize>,
) -> error::Result<usize> {
    match explicit {
        Some(size) => Ok(size),
        None => service.default_page_size(),
    }
}

fn print_bookmark(bookmark: &Bookmark) {
    println!("id: {}", bookmark.id);
    println!("title: {}", bookmark.title);
    println!("url: {}", bookmark.url);
    println!("created: {}", bookmark.created_at.to_rfc3339());
    let tags: Vec<&str> = bookmark.tags.iter().map(|t| t.title.as_str()).collect();
    println!("tags: {}", tags.join(", "));
}
