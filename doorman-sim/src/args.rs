//! Command-line parsing.

use std::time::Duration;

use doorman::SimConfig;

pub const USAGE: &str = "\
Usage: doorman-sim [--goths N] [--hipsters N] [--capacity N] [--max-dwell-ms N]
                   [--iterations N] [--duration-secs N]

Options:
  --goths <n>          Goth occupants [default: 3]
  --hipsters <n>       Hipster occupants [default: 3]
  --capacity <n>       Room capacity per role [default: goths + hipsters]
  --max-dwell-ms <ms>  Longest random stay inside [default: 2000]
  --iterations <n>     Visits per occupant [default: unbounded]
  --duration-secs <s>  Stop after this long [default: until done or Ctrl-C]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: SimConfig,
    pub duration: Option<Duration>,
    /// Harness entry point: force a mixed room and let the monitor abort.
    pub force_violation: bool,
}

/// Parse `args` (including argv[0]). `Err("")` means help was requested.
pub fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut config = SimConfig::default();
    let mut capacity: Option<usize> = None;
    let mut duration = None;
    let mut force_violation = false;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--goths" => {
                i += 1;
                config.goths = parse_value(flag, args.get(i))?;
            }
            "--hipsters" => {
                i += 1;
                config.hipsters = parse_value(flag, args.get(i))?;
            }
            "--capacity" => {
                i += 1;
                capacity = Some(parse_value(flag, args.get(i))?);
            }
            "--max-dwell-ms" => {
                i += 1;
                config.max_dwell = Duration::from_millis(parse_value(flag, args.get(i))?);
            }
            "--iterations" => {
                i += 1;
                config.iterations = Some(parse_value(flag, args.get(i))?);
            }
            "--duration-secs" => {
                i += 1;
                duration = Some(Duration::from_secs(parse_value(flag, args.get(i))?));
            }
            "--force-violation" => force_violation = true,
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    config.capacity = capacity.unwrap_or(config.goths + config.hipsters);
    Ok(Args {
        config,
        duration,
        force_violation,
    })
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("invalid value for {flag}: '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("doorman-sim")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_reproduce_reference_scenario() {
        let args = parse_args(&argv(&[])).unwrap();
        assert_eq!(args.config, SimConfig::default());
        assert_eq!(args.duration, None);
        assert!(!args.force_violation);
    }

    #[test]
    fn capacity_follows_occupant_counts() {
        let args = parse_args(&argv(&["--goths", "4", "--hipsters", "1"])).unwrap();
        assert_eq!(args.config.capacity, 5);

        let args = parse_args(&argv(&["--capacity", "2", "--goths", "4"])).unwrap();
        assert_eq!(args.config.capacity, 2);
    }

    #[test]
    fn no_occupants_is_reported_before_capacity() {
        let args = parse_args(&argv(&["--goths", "0", "--hipsters", "0"])).unwrap();
        assert_eq!(args.config.capacity, 0);
        assert_eq!(args.config.validate(), Err(doorman::ConfigError::NoOccupants));
    }

    #[test]
    fn all_flags() {
        let args = parse_args(&argv(&[
            "--max-dwell-ms",
            "15",
            "--iterations",
            "100",
            "--duration-secs",
            "3",
            "--force-violation",
        ]))
        .unwrap();
        assert_eq!(args.config.max_dwell, Duration::from_millis(15));
        assert_eq!(args.config.iterations, Some(100));
        assert_eq!(args.duration, Some(Duration::from_secs(3)));
        assert!(args.force_violation);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse_args(&argv(&["--goths"])).unwrap_err(),
            "--goths requires a value"
        );
        assert_eq!(
            parse_args(&argv(&["--capacity", "many"])).unwrap_err(),
            "invalid value for --capacity: 'many'"
        );
        assert_eq!(
            parse_args(&argv(&["--verbose"])).unwrap_err(),
            "unknown flag: --verbose"
        );
        assert_eq!(
            parse_args(&argv(&["club"])).unwrap_err(),
            "unexpected argument: club"
        );
    }

    #[test]
    fn help_is_empty_error() {
        assert_eq!(parse_args(&argv(&["-h"])).unwrap_err(), "");
    }
}
