use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "workon-issue",
    about = "Work on a GitLab issue by editing its description in your editor.",
    long_about = "workon-issue fetches an issue's description into a local mirror file, opens your editor on it, and pushes the file back to the tracker every time you save. A per-issue lock prevents two concurrent sessions on the same ticket.",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Load configuration from PATH instead of ~/.config/workon-issue/config.yml.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Load configuration from PATH instead of ~/.config/workon-issue/config.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    /// User-facing ticket number of the issue to work on.
    #[arg(value_name = "ISSUE")]
    pub(crate) issue: String,
}

pub(crate) fn parse_issue_number(raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("Bad issue number: {:?}. Expected an integer ticket number.", raw))
}
