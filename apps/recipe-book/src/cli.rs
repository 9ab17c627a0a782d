//! Command-line arguments

use std::path::PathBuf;

use catalog::{CategoryFilter, SortKey};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List recipes
    List(ListArgs),

    /// Add a recipe
    Add(AddArgs),

    /// Show one recipe with its cooking logs
    Show {
        /// Recipe id
        id: String,
    },

    /// Rate a recipe from 1 to 5 stars
    Rate {
        /// Recipe id
        id: String,
        /// Stars (1-5)
        stars: u8,
    },

    /// Mark a recipe as cooked (or not)
    Cooked {
        /// Recipe id
        id: String,
        /// Clear the cooked flag instead
        #[arg(long)]
        unset: bool,
    },

    /// Edit a recipe's name, URL or category
    Edit(EditArgs),

    /// Record that a recipe was cooked
    Log(LogArgs),

    /// Delete one cooking log entry
    DeleteLog {
        /// Recipe id
        id: String,
        /// Log entry id
        log_id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete a recipe and all its logs
    Delete {
        /// Recipe id
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List known categories
    Categories,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Sort order (newest, oldest, name, rating-high, rating-low, cooked,
    /// not-cooked, category)
    #[arg(short, long)]
    pub sort: Option<SortKey>,

    /// Only show this category ("all" for everything)
    #[arg(short, long, default_value = CategoryFilter::ALL_VALUE)]
    pub category: CategoryFilter,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Recipe name
    pub name: String,

    /// Link to the recipe
    pub url: String,

    /// Category
    #[arg(short, long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Recipe id
    pub id: String,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New URL
    #[arg(long)]
    pub url: Option<String>,

    /// New category, existing or new
    #[arg(short, long, conflicts_with = "clear_category")]
    pub category: Option<String>,

    /// Remove the category
    #[arg(long)]
    pub clear_category: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Recipe id
    pub id: String,

    /// Date cooked (YYYY-MM-DD), today by default
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Note
    #[arg(short, long)]
    pub note: Option<String>,

    /// Photo to attach
    #[arg(short, long, value_name = "FILE")]
    pub photo: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::parse_from(["recipe-book", "list", "--sort", "rating-high", "-c", "Dinner"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.sort, Some(SortKey::RatingHigh));
        assert_eq!(args.category, CategoryFilter::Category("Dinner".into()));
    }

    #[test]
    fn test_parse_list_defaults() {
        let cli = Cli::parse_from(["recipe-book", "list"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.sort, None);
        assert_eq!(args.category, CategoryFilter::All);
    }

    #[test]
    fn test_parse_log() {
        let cli = Cli::parse_from([
            "recipe-book",
            "--json",
            "log",
            "r1",
            "--date",
            "2024-01-05",
            "--note",
            "Good",
        ]);
        assert!(cli.json);
        let Command::Log(args) = cli.command else {
            panic!("expected log");
        };
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(args.note.as_deref(), Some("Good"));
    }

    #[test]
    fn test_parse_delete_confirmation_flag() {
        let cli = Cli::parse_from(["recipe-book", "delete", "r1"]);
        assert!(matches!(cli.command, Command::Delete { yes: false, .. }));

        let cli = Cli::parse_from(["recipe-book", "delete-log", "r1", "42", "-y"]);
        assert!(matches!(
            cli.command,
            Command::DeleteLog { log_id: 42, yes: true, .. }
        ));
    }

    #[test]
    fn test_edit_category_flags_conflict() {
        let result = Cli::try_parse_from([
            "recipe-book",
            "edit",
            "r1",
            "--category",
            "Soup",
            "--clear-category",
        ]);
        assert!(result.is_err());
    }
}
