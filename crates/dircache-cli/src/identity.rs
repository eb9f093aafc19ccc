//! Committer identity discovery for `commit-tree`: thin glue living outside
//! the core crates, since none of the object store or index needs an
//! identity of any kind.

use chrono::Local;

/// Resolved author and committer identity lines for one commit.
///
/// Mirrors `commit-tree.c`'s quirky asymmetry exactly: the `COMMITTER_*`
/// environment overrides replace the **author** line (`gecos`/`email`/`date`
/// in the original fall back to the real OS-derived values only when unset),
/// while the **committer** line always uses the real, un-overridable
/// OS-derived identity (`realgecos`/`realemail`/`realdate`). This is
/// deliberate, not a typo: the override is meant to let a replayed or
/// imported commit claim its original author without letting it forge who
/// actually ran the commit on this machine.
pub struct Identity {
    /// `author` line name.
    pub author_name: String,
    /// `author` line email.
    pub author_email: String,
    /// `author` line date.
    pub author_date: String,
    /// `committer` line name.
    pub committer_name: String,
    /// `committer` line email.
    pub committer_email: String,
    /// `committer` line date.
    pub committer_date: String,
}

/// Resolve identity from the OS (username, hostname, current local time)
/// and the `COMMITTER_NAME`/`COMMITTER_EMAIL`/`COMMITTER_DATE` overrides.
#[must_use]
pub fn resolve() -> Identity {
    let real_name = real_name();
    let real_email = real_email();
    let real_date = real_date();

    let author_name = std::env::var("COMMITTER_NAME").unwrap_or_else(|_| real_name.clone());
    let author_email = std::env::var("COMMITTER_EMAIL").unwrap_or_else(|_| real_email.clone());
    let author_date = std::env::var("COMMITTER_DATE").unwrap_or_else(|_| real_date.clone());

    Identity {
        author_name,
        author_email,
        author_date,
        committer_name: real_name,
        committer_email: real_email,
        committer_date: real_date,
    }
}

fn real_name() -> String {
    whoami::realname()
}

fn real_email() -> String {
    format!("{}@{}", whoami::username(), whoami::fallible::hostname().unwrap_or_else(|_| whoami::devicename()))
}

fn real_date() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share one test function: mutating `COMMITTER_*` env vars
    // races with any other test in this file that reads them concurrently.
    #[test]
    fn committer_env_overrides_author_only() {
        std::env::remove_var("COMMITTER_NAME");
        std::env::remove_var("COMMITTER_EMAIL");
        std::env::remove_var("COMMITTER_DATE");
        let bare = resolve();
        assert_eq!(bare.author_name, bare.committer_name);
        assert_eq!(bare.author_email, bare.committer_email);

        std::env::set_var("COMMITTER_NAME", "Override Name");
        std::env::set_var("COMMITTER_EMAIL", "override@example.com");
        std::env::set_var("COMMITTER_DATE", "some date");

        let overridden = resolve();

        std::env::remove_var("COMMITTER_NAME");
        std::env::remove_var("COMMITTER_EMAIL");
        std::env::remove_var("COMMITTER_DATE");

        assert_eq!(overridden.author_name, "Override Name");
        assert_eq!(overridden.author_email, "override@example.com");
        assert_eq!(overridden.author_date, "some date");
        assert_eq!(overridden.committer_name, bare.committer_name);
    }
}
