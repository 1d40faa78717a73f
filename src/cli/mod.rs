//! CLI argument parsing module
//!
//! Handles command-line interface using clap, including:
//! - The watched mount point and mark scope
//! - Event selection
//! - Output format selection (human/JSON) and quiet mode
//! - Path exclusion and process filtering
//! - Help and version commands

use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::Overrides;

/// Parsed command line
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Values that override the configuration file and environment
    pub overrides: Overrides,
    /// Number of `-v` flags
    pub verbosity: u8,
}

fn version() -> &'static str {
    concat!(env!("FANMON_VERSION"), " (", env!("GIT_HASH"), ")")
}

fn build_command() -> Command {
    Command::new("fanmon")
        .version(version())
        .about("Report file modifications on a Linux mount")
        .long_about(
            "Watches a mount (or filesystem, or single inode) through fanotify and prints \
             one line per modified file: the id of the writing process and the file path.\n\n\
             The mount point defaults to the MOUNT_POINT environment variable, then to /. \
             Requires CAP_SYS_ADMIN.",
        )
        .arg(
            Arg::new("mount_point")
                .value_name("MOUNT_POINT")
                .help("Path whose mount is watched")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Read settings from this TOML file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("event")
                .short('e')
                .long("event")
                .value_name("EVENT")
                .help("Event to report (modify, close_write, open, access, create, ...)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("scope")
                .short('s')
                .long("scope")
                .value_name("SCOPE")
                .help("Mark scope: inode, mount or filesystem"),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .help("Output one JSON object per event")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress the startup banner and shutdown summary")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("exclude")
                .short('x')
                .long("exclude")
                .value_name("GLOB")
                .help("Do not report paths matching this pattern")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("skip_pid")
                .long("skip-pid")
                .value_name("PID")
                .help("Ignore events caused by this process id")
                .value_parser(value_parser!(i32))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("include_self")
                .long("include-self")
                .help("Also report events caused by fanmon itself")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show_process")
                .long("show-process")
                .help("Show the name of the process that caused each event")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("MS")
                .help("Polling interval in milliseconds (10-60000)")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeatable)")
                .action(ArgAction::Count),
        )
}

/// Parse the process arguments; exits on `--help`, `--version` and usage errors
pub fn parse_args() -> Result<CliArgs> {
    let matches = build_command().get_matches();
    from_matches(&matches)
}

/// Parse an explicit argument list; the first item is the program name
pub fn parse_from<I, T>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    from_matches(&matches)
}

fn from_matches(matches: &ArgMatches) -> Result<CliArgs> {
    let strings = |id: &str| -> Vec<String> {
        matches
            .get_many::<String>(id)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    let mount_point = matches.get_one::<PathBuf>("mount_point").cloned();
    if let Some(ref path) = mount_point {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("Mount point must not be empty"));
        }
    }

    let overrides = Overrides {
        mount_point,
        scope: matches.get_one::<String>("scope").cloned(),
        events: strings("event"),
        json: matches.get_flag("json"),
        quiet: matches.get_flag("quiet"),
        exclude: strings("exclude"),
        skip_pids: matches
            .get_many::<i32>("skip_pid")
            .map(|values| values.copied().collect())
            .unwrap_or_default(),
        include_self: matches.get_flag("include_self"),
        show_process: matches.get_flag("show_process"),
        poll_interval_ms: matches.get_one::<u64>("interval").copied(),
    };

    Ok(CliArgs {
        config_path: matches.get_one::<PathBuf>("config").cloned(),
        overrides,
        verbosity: matches.get_count("verbose"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        build_command().debug_assert();
    }

    #[test]
    fn test_defaults_leave_everything_unset() {
        let args = parse_from(["fanmon"]).unwrap();
        assert_eq!(args.overrides, Overrides::default());
        assert_eq!(args.config_path, None);
        assert_eq!(args.verbosity, 0);
    }

    #[test]
    fn test_all_flags() {
        let args = parse_from([
            "fanmon", "/data", "-c", "/etc/fanmon.toml", "-e", "modify", "--event", "create",
            "-s", "filesystem", "-j", "-q", "-x", "/data/tmp/*", "--skip-pid", "42",
            "--include-self", "--show-process", "--interval", "500", "-vv",
        ])
        .unwrap();

        let o = &args.overrides;
        assert_eq!(o.mount_point, Some(PathBuf::from("/data")));
        assert_eq!(o.events, vec!["modify", "create"]);
        assert_eq!(o.scope.as_deref(), Some("filesystem"));
        assert!(o.json && o.quiet && o.include_self && o.show_process);
        assert_eq!(o.exclude, vec!["/data/tmp/*"]);
        assert_eq!(o.skip_pids, vec![42]);
        assert_eq!(o.poll_interval_ms, Some(500));
        assert_eq!(args.config_path, Some(PathBuf::from("/etc/fanmon.toml")));
        assert_eq!(args.verbosity, 2);
    }

    #[test]
    fn test_rejects_non_numeric_pid() {
        assert!(parse_from(["fanmon", "--skip-pid", "abc"]).is_err());
    }
}
