use clap::{Parser, Subcommand, ValueEnum};

use crate::highlight::PolicyKind;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Never contact the remote backend
    #[clap(long, global = true, default_value = "false")]
    pub local: bool,

    /// Debug logging
    #[clap(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[clap(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum PolicyArg {
    /// Regions containing enough of the query's words
    #[default]
    Coverage,
    /// Regions containing most of a snippet's words
    Ratio,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Coverage => PolicyKind::Coverage,
            PolicyArg::Ratio => PolicyKind::Ratio,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the daemon
    Serve {
        /// Listen address, overrides config
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Capture a page
    Capture {
        /// Page url
        url: String,

        /// HTML file to extract text from
        #[clap(long, conflicts_with = "content")]
        html: Option<String>,

        /// Plain text file with the page content
        #[clap(long)]
        content: Option<String>,

        /// Page title. Taken from the HTML when omitted
        #[clap(short, long)]
        title: Option<String>,

        /// Favicon url
        #[clap(long)]
        favicon: Option<String>,
    },

    /// Search captured pages
    Search {
        query: String,

        /// Restrict to a category (ecommerce, social, news, documentation, video, general)
        #[clap(short, long)]
        category: Option<String>,
    },

    /// Compare products across captured shop pages
    Compare { query: String },

    /// Show capture statistics
    Stats,

    /// Check the remote backend
    Health,

    /// Highlight an HTML file and print the marked regions
    Highlight {
        /// HTML file
        #[clap(short, long)]
        file: String,

        /// Query or snippet
        query: String,

        #[clap(short, long, value_enum, default_value_t = PolicyArg::Coverage)]
        policy: PolicyArg,
    },
}
