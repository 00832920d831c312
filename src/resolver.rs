use tracing::debug;

use crate::{
    candidates::{ImageCandidateSet, accept},
    preference::ImagePreference,
};

/// Picks the first well-formed candidate in preference order.
///
/// Local first when `prefer_local`, external first otherwise. Placeholder is always last.
/// Returns an empty string when nothing usable is left.
pub fn resolve(candidates: &ImageCandidateSet, preference: ImagePreference) -> String {
    let (first, second) = if preference.prefer_local {
        (
            ("local", candidates.local.as_deref()),
            ("external", candidates.external.as_deref()),
        )
    } else {
        (
            ("external", candidates.external.as_deref()),
            ("local", candidates.local.as_deref()),
        )
    };

    let order = [
        first,
        second,
        ("placeholder", candidates.placeholder.as_deref()),
    ];

    for (branch, candidate) in order {
        if let Some(url) = accept(candidate) {
            debug!(branch, url, "Resolved image candidate");
            return url.to_string();
        }
    }

    debug!("No usable image candidate");
    String::new()
}

#[cfg(test)]
mod tests {
    use super::resolve;
    use crate::{candidates::ImageCandidateSet, preference::ImagePreference};

    const LOCAL: ImagePreference = ImagePreference { prefer_local: true };
    const EXTERNAL: ImagePreference = ImagePreference {
        prefer_local: false,
    };

    fn set(local: &str, external: &str, placeholder: &str) -> ImageCandidateSet {
        ImageCandidateSet::new(Some(local), Some(external), Some(placeholder))
    }

    #[test]
    fn test_prefer_local_wins() {
        let candidates = set("/img/a.jpg", "https://x.com/b.jpg", "/placeholder.svg");

        assert_eq!(resolve(&candidates, LOCAL), "/img/a.jpg");
    }

    #[test]
    fn test_prefer_external() {
        let candidates = set("/img/a.jpg", "https://x.com/b.jpg", "");

        assert_eq!(resolve(&candidates, EXTERNAL), "https://x.com/b.jpg");
    }

    #[test]
    fn test_fallback_to_external() {
        let candidates = ImageCandidateSet::new(Some(""), Some("https://x.com/b.jpg"), None::<&str>);

        assert_eq!(resolve(&candidates, LOCAL), "https://x.com/b.jpg");
    }

    #[test]
    fn test_fallback_to_local() {
        let candidates = set("/img/a.jpg", "not a url", "/placeholder.svg");

        assert_eq!(resolve(&candidates, EXTERNAL), "/img/a.jpg");
    }

    #[test]
    fn test_fallback_to_placeholder() {
        let candidates = set("  ", "not a url", "/placeholder.svg");

        assert_eq!(resolve(&candidates, LOCAL), "/placeholder.svg");
        assert_eq!(resolve(&candidates, EXTERNAL), "/placeholder.svg");
    }

    #[test]
    fn test_data_url_beats_placeholder() {
        let candidates =
            ImageCandidateSet::new(None::<&str>, Some("data:image/png;base64,AAAA"), Some("/p.svg"));

        assert_eq!(resolve(&candidates, LOCAL), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_trimmed() {
        let candidates = set(" /img/a.jpg ", "", "");

        assert_eq!(resolve(&candidates, LOCAL), "/img/a.jpg");
    }

    #[test]
    fn test_nothing_usable() {
        assert_eq!(resolve(&ImageCandidateSet::default(), LOCAL), "");
        assert_eq!(resolve(&ImageCandidateSet::default(), EXTERNAL), "");
        assert_eq!(resolve(&set("not a url", "also bad", "x"), LOCAL), "");
        assert_eq!(resolve(&set("", " ", "not a url"), EXTERNAL), "");
    }

    #[test]
    fn test_local_always_wins_when_well_formed() {
        let locals = ["/a.jpg", "https://cdn.example.com/a.jpg", " /b.png"];
        let others = ["", "not a url", "https://x.com/b.jpg", "/c.jpg"];

        for local in locals {
            for external in others {
                for placeholder in others {
                    let candidates = set(local, external, placeholder);
                    assert_eq!(resolve(&candidates, LOCAL), local.trim());
                }
            }
        }
    }
}
