// skiff top-level command-line arguments
// (c) 2024 Ross Younger

use std::path::PathBuf;

use clap::Parser;

use crate::copy::{OnEmpty, RemoteSpec};

#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version,
    about,
    before_help = "e.g.   skiff build/out deploy@my-server:/srv/app -g '**' -g '!**/*.map'",
    infer_long_args(true)
)]
#[command(help_template(
    "\
{name} version {version}
{about-with-newline}
{usage-heading} {usage}
{before-help}
{all-args}{after-help}
"
))]
#[command(styles=super::styles::CLAP_STYLES)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CliArgs {
    // SELECTION ===========================================================================
    /// Selects which files to copy. May be repeated; a leading `!`
    /// excludes. [default: everything under SOURCE]
    ///
    /// Patterns are glob expressions evaluated against SOURCE. A pattern
    /// with no path separator matches by file name anywhere in the tree.
    #[arg(short = 'g', long = "glob", value_name("PATTERN"), help_heading("Selection"))]
    pub globs: Vec<String>,

    /// Copies every selected file directly into the target folder,
    /// discarding its directory structure
    #[arg(long, action, help_heading("Selection"))]
    pub flatten: bool,

    /// Controls what happens when no file matches the patterns
    #[arg(long, value_enum, default_value_t, value_name("POLICY"), help_heading("Selection"))]
    pub on_empty: OnEmpty,

    // TARGET ==============================================================================
    /// Never replaces a file that already exists on the remote;
    /// an existing destination fails that file's transfer instead
    #[arg(short = 'n', long, action, help_heading("Target"))]
    pub no_clobber: bool,

    /// Empties the target folder before copying anything into it
    #[arg(long, action, help_heading("Target"))]
    pub clean_target: bool,

    // CONNECTION ==========================================================================
    /// The remote SSH port
    #[arg(short = 'p', long, value_name("PORT"), help_heading("Connection"))]
    pub port: Option<u16>,

    /// Authenticates with the given private key file.
    ///
    /// By default the ssh agent is consulted, then the usual key files in
    /// `~/.ssh`. To authenticate with a password instead, put it in the
    /// `SKIFF_PASSWORD` environment variable.
    #[arg(short = 'i', long, value_name("FILE"), help_heading("Connection"))]
    pub identity: Option<PathBuf>,

    /// Socket timeout for the SSH connection, in seconds
    #[arg(short = 't', long, value_name("sec"), help_heading("Connection"))]
    pub timeout: Option<u16>,

    // OUTPUT & DEBUG ======================================================================
    /// Quiet mode
    ///
    /// Switches off progress display and the summary; reports only errors
    #[arg(short, long, action, conflicts_with("debug"), help_heading("Output"))]
    pub quiet: bool,

    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=skiff=debug` in the
    /// environment. If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"))]
    pub debug: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    #[arg(short('l'), long, action, value_name("FILE"), help_heading("Debug"))]
    pub log_file: Option<String>,

    // POSITIONAL ARGUMENTS ================================================================
    /// The local directory to copy from
    #[arg(required = true, value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Where to copy to: HOST, USER@HOST:FOLDER or similar.
    ///
    /// When FOLDER is omitted, files land in the remote user's home
    /// directory. A `~/`-rooted folder is treated the same way.
    #[arg(required = true, value_name = "DESTINATION")]
    pub destination: Option<RemoteSpec>,
}

#[cfg(test)]
mod test {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn minimal_invocation_parses() {
        let args = CliArgs::parse_from(["skiff", "out", "web1:/srv/app"]);
        assert!(args.globs.is_empty());
        assert!(!args.no_clobber);
        let dest = args.destination.unwrap();
        assert_eq!(dest.host, "web1");
        assert_eq!(dest.folder, "/srv/app");
    }

    #[test]
    fn repeated_globs_accumulate() {
        let args = CliArgs::parse_from(["skiff", "-g", "**", "-g", "!**/*.log", "out", "web1:"]);
        assert_eq!(args.globs, ["**", "!**/*.log"]);
    }

    #[test]
    fn bad_destination_is_rejected() {
        assert!(CliArgs::try_parse_from(["skiff", "out", ":nohost"]).is_err());
    }
}
