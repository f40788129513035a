//! Localized string resolution.
//!
//! User-visible text is never hardcoded in the orchestrator; every notice
//! goes through a [`Localizer`] so deployments can swap languages and so
//! internal diagnostics never leak to players.

/// Resolves message keys to rendered, player-facing strings.
pub trait Localizer: Send + Sync {
    /// Resolves `key`, substituting `args` positionally.
    fn resolve(&self, key: &str, args: &[&str]) -> String;
}

/// Fallback localizer that echoes the key and its arguments.
///
/// Used in tests and as a last resort when no message catalog is configured;
/// output stays greppable by key.
#[derive(Debug, Default, Clone)]
pub struct KeyEcho;

impl Localizer for KeyEcho {
    fn resolve(&self, key: &str, args: &[&str]) -> String {
        if args.is_empty() {
            key.to_string()
        } else {
            format!("{} [{}]", key, args.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_echo_renders_key_and_args() {
        let l = KeyEcho;
        assert_eq!(l.resolve("GROUP_CLOSED", &[]), "GROUP_CLOSED");
        assert_eq!(l.resolve("LEAVE_GROUP", &["Ada"]), "LEAVE_GROUP [Ada]");
    }
}
