use clap::{Parser, Subcommand};

/// connect-auth: run a query against a remote session with a bearer token attached
#[derive(Parser)]
#[command(name = "connect-auth", version, about)]
pub struct Cli {
    /// Connection string, overrides CONNECT_AUTH_REMOTE
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Bearer secret, overrides CONNECT_AUTH_TOKEN
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run `range(start, end, step).show()` and stop the session
    Range {
        #[arg(long, default_value = "0")]
        start: i64,
        #[arg(long, default_value = "5")]
        end: i64,
        #[arg(long, default_value = "1")]
        step: i64,
    },

    /// Print the parsed connection string as JSON without connecting
    Inspect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["connect-auth"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.remote.is_none());
    }

    #[test]
    fn test_range_defaults() {
        let cli = Cli::try_parse_from(["connect-auth", "range"]).unwrap();
        match cli.command {
            Some(Commands::Range { start, end, step }) => assert_eq!((start, end, step), (0, 5, 1)),
            _ => panic!("expected range"),
        }
    }

    #[test]
    fn test_global_remote_after_subcommand() {
        let cli = Cli::try_parse_from(["connect-auth", "inspect", "--remote", "sc://h:1/"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Inspect)));
        assert_eq!(cli.remote.as_deref(), Some("sc://h:1/"));
    }
}
