//! Expands the requested target specification into interface names.

use std::io::{self, BufRead, Write};

use macshift_link::LinkControl;

use crate::errors::AppError;

/// Sentinel accepted at the interactive prompt in place of a list.
pub(crate) const ALL_UP_SENTINEL: &str = "all_up";

const PROMPT: &str = "Interfaces to manage (comma-separated, or all_up): ";

/// Where the target interfaces come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TargetSpec {
    /// Names given explicitly.
    Explicit(Vec<String>),
    /// Every interface that is up, loopback excluded.
    AllUp,
    /// Nothing given; ask the operator.
    Unspecified,
}

impl TargetSpec {
    /// Builds the specification from the `--iface` and `--all-up` flags.
    pub(crate) fn from_flags(iface: Option<&str>, all_up: bool) -> Self {
        if all_up {
            return Self::AllUp;
        }
        iface.map_or(Self::Unspecified, Self::parse)
    }

    /// Parses a comma-separated list or the `all_up` sentinel.
    pub(crate) fn parse(text: &str) -> Self {
        let text = text.trim();
        if text == ALL_UP_SENTINEL {
            return Self::AllUp;
        }
        let names: Vec<String> = text
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        if names.is_empty() {
            Self::Unspecified
        } else {
            Self::Explicit(names)
        }
    }
}

/// Asks the operator for targets when none were given.
pub(crate) trait Prompter {
    /// Shows `message` and returns one line of input; end of input is empty.
    fn prompt(&mut self, message: &str) -> io::Result<String>;
}

/// Prompts on stderr and reads from stdin.
pub(crate) struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&mut self, message: &str) -> io::Result<String> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(message.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Resolves `spec` into unique names in order of first appearance.
///
/// An empty result is not an error here; the caller decides how to report
/// it.
pub(crate) fn resolve<L: LinkControl + ?Sized>(
    spec: &TargetSpec,
    link: &L,
    prompter: &mut dyn Prompter,
) -> Result<Vec<String>, AppError> {
    let names = match spec {
        TargetSpec::Explicit(names) => names.clone(),
        TargetSpec::AllUp => link
            .list_up_interfaces()
            .map_err(AppError::ListInterfaces)?,
        TargetSpec::Unspecified => {
            let answer = prompter.prompt(PROMPT).map_err(AppError::Prompt)?;
            match TargetSpec::parse(&answer) {
                TargetSpec::Unspecified => Vec::new(),
                answered => return resolve(&answered, link, prompter),
            }
        }
    };
    Ok(dedupe(names))
}

fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{FakeLink, ScriptedPrompter};
    use rstest::rstest;

    #[rstest]
    #[case("eth0", TargetSpec::Explicit(vec![String::from("eth0")]))]
    #[case(" eth0 , wlan0,, ", TargetSpec::Explicit(vec![String::from("eth0"), String::from("wlan0")]))]
    #[case("all_up", TargetSpec::AllUp)]
    #[case("  ", TargetSpec::Unspecified)]
    #[case(",", TargetSpec::Unspecified)]
    fn parses_target_lists(#[case] text: &str, #[case] expected: TargetSpec) {
        assert_eq!(TargetSpec::parse(text), expected);
    }

    #[test]
    fn all_up_flag_wins() {
        assert_eq!(TargetSpec::from_flags(None, true), TargetSpec::AllUp);
        assert_eq!(TargetSpec::from_flags(None, false), TargetSpec::Unspecified);
    }

    #[test]
    fn explicit_names_are_deduplicated_in_order() {
        let link = FakeLink::default();
        let mut prompter = ScriptedPrompter::answering("");
        let spec = TargetSpec::parse("wlan0,eth0,wlan0");

        let names = resolve(&spec, &link, &mut prompter).expect("resolves");

        assert_eq!(names, vec!["wlan0", "eth0"]);
        assert!(prompter.prompts().is_empty());
    }

    #[test]
    fn all_up_excludes_loopback() {
        let link = FakeLink::default()
            .with_loopback("lo")
            .with_interface("eth0", "aa:bb:cc:dd:ee:01")
            .with_interface("wlan0", "aa:bb:cc:dd:ee:02");
        let mut prompter = ScriptedPrompter::answering("");

        let names = resolve(&TargetSpec::AllUp, &link, &mut prompter).expect("resolves");

        assert_eq!(names, vec!["eth0", "wlan0"]);
    }

    #[test]
    fn prompt_accepts_sentinel() {
        let link = FakeLink::default().with_interface("eth0", "aa:bb:cc:dd:ee:01");
        let mut prompter = ScriptedPrompter::answering("all_up\n");

        let names = resolve(&TargetSpec::Unspecified, &link, &mut prompter).expect("resolves");

        assert_eq!(names, vec!["eth0"]);
        assert_eq!(prompter.prompts().len(), 1);
    }

    #[test]
    fn empty_prompt_answer_resolves_to_nothing() {
        let link = FakeLink::default();
        let mut prompter = ScriptedPrompter::answering("\n");

        let names = resolve(&TargetSpec::Unspecified, &link, &mut prompter).expect("resolves");

        assert!(names.is_empty());
    }
}
