use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "tagmark",
    about = "Bookmark manager with tag-aware full-text search"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Save a new bookmark
    Add(AddArgs),
    /// Change the URL, title or tags of a bookmark
    Edit(EditArgs),
    /// Delete a bookmark
    Delete {
        /// Bookmark id
        id: u64,
    },
    /// Show a single bookmark
    Get {
        /// Bookmark id
        id: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List bookmarks, newest first
    List(ListArgs),
    /// Search bookmarks; `[tag]` segments filter by tag
    Search(SearchArgs),
    /// Rebuild the search index from the bookmark store
    Reindex,
    /// Show store and index statistics
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every bookmark, tag and index document
    Reset,
    /// Manage persistent settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Add / Edit --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Bookmark URL; `http://` is prepended when no scheme is given
    pub url: String,

    /// Bookmark title (defaults to the URL)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Comma-separated tag titles
    #[arg(short = 'T', long, default_value = "")]
    pub tags: String,
}

#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Bookmark id
    pub id: u64,

    /// New URL
    #[arg(long)]
    pub url: Option<String>,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Comma-separated tag titles replacing the current ones
    #[arg(short = 'T', long)]
    pub tags: Option<String>,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist the default page size for list and search
    SetPageSize {
        /// Results per page
        size: usize,
    },
    /// Clear the stored page size (revert to default)
    Clear,
}

// -- List / Search --

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Results per page (defaults to the configured page size)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Only bookmarks carrying this tag slug
    #[arg(long)]
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query, e.g. "[rust][web] async"
    pub query: String,

    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Results per page (defaults to the configured page size)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "tagmark",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["tagmark", "search", "[rust] async"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "[rust] async");
                assert_eq!(args.page, 1);
                assert_eq!(args.count, None);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn parse_add_with_tags() {
        let cli = Cli::parse_from([
            "tagmark",
            "add",
            "example.com",
            "--title",
            "Example",
            "--tags",
            "a, b",
        ]);
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.url, "example.com");
                assert_eq!(args.title.as_deref(), Some("Example"));
                assert_eq!(args.tags, "a, b");
            }
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn parse_list_with_global_flags() {
        let cli = Cli::parse_from([
            "tagmark", "list", "--tag", "python", "-p", "2", "-n", "5", "-vv",
            "--data-dir", "/tmp/tm",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/tm")));
        match cli.command {
            Command::List(args) => {
                assert_eq!(args.tag.as_deref(), Some("python"));
                assert_eq!(args.page, 2);
                assert_eq!(args.count, Some(5));
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
