//! Command-line argument splicing.
//!
//! Hosts hand each embedded daemon a single override string such as
//! `"--network=testnet --profile=5050"`. The daemons consume ordinary
//! argument lists, so the override is cut back into separate flags and
//! appended to a copy of the base arguments. Each daemon gets its own
//! copy; the splices never see each other.

/// Split an override string into separate `--`-prefixed flags.
///
/// Fragments come from splitting on `--`; empty fragments are dropped,
/// each remaining fragment is re-prefixed and trimmed. Flag semantics are
/// not validated here; the daemon's own argument parser owns that.
pub fn split_override(overrides: &str) -> Vec<String> {
    overrides
        .split("--")
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| format!("--{fragment}").trim().to_string())
        .collect()
}

/// Append the override flags to a copy of `base`.
pub fn splice(base: &[String], overrides: &str) -> Vec<String> {
    let mut argv = base.to_vec();
    argv.extend(split_override(overrides));
    argv
}
