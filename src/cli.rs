use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// fanhatd — temperature-driven fan and RGB control for the I2C cooling hat
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: searched in standard locations)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log to syslog instead of stderr
    #[arg(long = "syslog")]
    pub syslog: bool,

    /// Raise log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Validate the configuration, print the resolved policy and exit
    #[arg(long = "check")]
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["fanhatd", "-c", "/tmp/x.yml", "-vv", "--syslog"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.yml")));
        assert_eq!(cli.verbose, 2);
        assert!(cli.syslog);
        assert!(!cli.check);
    }
}
