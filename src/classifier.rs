/// Profile types the store knows how to index.
///
/// `Unknown` exists so that [`classify`] is total; profiles carrying it are
/// dropped before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalProfileKind {
    Cpu,
    Heap,
    Allocs,
    Block,
    Mutex,
    Goroutine,
    ThreadCreate,
    Unknown,
}

impl CanonicalProfileKind {
    /// Every kind the store accepts, in the order profiles are usually listed.
    pub const KNOWN: [Self; 7] = [
        Self::Cpu,
        Self::Heap,
        Self::Allocs,
        Self::Block,
        Self::Mutex,
        Self::Goroutine,
        Self::ThreadCreate,
    ];

    /// Name used for the store's `type` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Heap => "heap",
            Self::Allocs => "allocs",
            Self::Block => "block",
            Self::Mutex => "mutex",
            Self::Goroutine => "goroutine",
            Self::ThreadCreate => "threadcreate",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for CanonicalProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the kind a profile was fetched under to the store's taxonomy.
///
/// `"profile"` is the path `net/http/pprof` serves CPU profiles on, so it is
/// accepted as a synonym for `"cpu"`.
pub fn classify(kind: &str) -> CanonicalProfileKind {
    let kind = kind.trim();
    if kind.eq_ignore_ascii_case("profile") {
        return CanonicalProfileKind::Cpu;
    }

    CanonicalProfileKind::KNOWN
        .into_iter()
        .find(|known| known.as_str().eq_ignore_ascii_case(kind))
        .unwrap_or(CanonicalProfileKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_kinds_round_trip() {
        for kind in CanonicalProfileKind::KNOWN {
            assert_eq!(classify(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_aliases_and_case() {
        assert_eq!(classify("profile"), CanonicalProfileKind::Cpu);
        assert_eq!(classify(" Heap "), CanonicalProfileKind::Heap);
        assert_eq!(classify("THREADCREATE"), CanonicalProfileKind::ThreadCreate);
    }

    #[test]
    fn test_unrecognized_is_unknown() {
        for input in ["", "trace", "fgprof", "cpu2", "heap\u{0}", "🔥"] {
            let kind = classify(input);
            assert_eq!(kind, CanonicalProfileKind::Unknown, "input {:?}", input);
            assert!(!kind.is_known());
        }
    }
}
