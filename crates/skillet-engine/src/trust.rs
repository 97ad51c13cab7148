use skillet_source::SourceSpecifier;

/// Yes/no decision on whether a source may be fetched at all. Consulted for
/// every dependency before anything is resolved.
pub trait TrustGate: Send + Sync {
    fn is_trusted(&self, source: &SourceSpecifier) -> bool;
}

/// Trusts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl TrustGate for AllowAll {
    fn is_trusted(&self, _source: &SourceSpecifier) -> bool {
        true
    }
}

/// Trusts local sources plus remote sources whose canonical identity starts
/// with one of the allowed prefixes at a `/` boundary: `anthropics` allows
/// `anthropics/skills`, `gitlab.com/team` allows `gitlab.com/team/x`.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().trim_end_matches('/').to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl TrustGate for AllowList {
    fn is_trusted(&self, source: &SourceSpecifier) -> bool {
        if source.is_local() {
            return true;
        }
        let canonical = source.canonical().to_lowercase();
        self.prefixes.iter().any(|p| {
            canonical == *p
                || canonical
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> SourceSpecifier {
        SourceSpecifier::parse(s).unwrap()
    }

    #[test]
    fn allow_list_matches_on_segments() {
        let gate = AllowList::new(["anthropics", "gitlab.com/team/"]);
        assert!(gate.is_trusted(&spec("anthropics/skills")));
        assert!(gate.is_trusted(&spec("https://github.com/Anthropics/skills.git")));
        assert!(gate.is_trusted(&spec("git:https://gitlab.com/team/tools.git")));
        assert!(!gate.is_trusted(&spec("anthropics-fork/skills")));
        assert!(!gate.is_trusted(&spec("git:https://gitlab.com/other/tools")));
    }

    #[test]
    fn local_always_trusted() {
        assert!(AllowList::new(Vec::<String>::new()).is_trusted(&spec("./vendor/x")));
    }

    #[test]
    fn allow_all() {
        assert!(AllowAll.is_trusted(&spec("someone/anything")));
    }
}
