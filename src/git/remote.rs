//! Push URL derivation
//!
//! Components are usually declared with an anonymous HTTPS URL, which is fine
//! for fetching but useless for pushing. [`push_url`] maps such URLs to the
//! SSH endpoint of the same repository so that a developer can push fixes
//! from a component checkout without reconfiguring the remote.

use url::Url;

/// Derives the push URL for a repository from its pull URL.
///
/// `http://` and `https://` URLs become `ssh://git@<host><path>`. Userinfo,
/// port, query and fragment are dropped and the path (including any `.git`
/// suffix) is kept as is. Everything else is returned unchanged: `ssh://`,
/// scp-style `user@host:path`, `file://`, local paths and any scheme git may
/// understand that this function does not.
///
/// # Examples
///
/// ```rust
/// use commodore::git::remote::push_url;
///
/// assert_eq!(
///     push_url("https://github.com/projectsyn/component-argocd.git"),
///     "ssh://git@github.com/projectsyn/component-argocd.git"
/// );
/// assert_eq!(
///     push_url("git@github.com:projectsyn/component-argocd.git"),
///     "git@github.com:projectsyn/component-argocd.git"
/// );
/// ```
#[must_use]
pub fn push_url(pull_url: &str) -> String {
    let Ok(url) = Url::parse(pull_url) else {
        // scp-style shorthand and plain paths are not URLs
        return pull_url.to_string();
    };

    match (url.scheme(), url.host_str()) {
        ("http" | "https", Some(host)) => format!("ssh://git@{host}{}", url.path()),
        _ => pull_url.to_string(),
    }
}
