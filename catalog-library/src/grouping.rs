//! Title-prefix clustering for display
//!
//! Groups an ordered list of entities into display clusters. Entities
//! carrying an explicit group title only ever join a group whose title
//! matches it exactly; everything else merges greedily by shared title
//! prefix, scanning groups in creation order so the first satisfying group
//! wins. The pass is pure and synchronous: same ordered input and threshold,
//! same output.

use crate::models::{peer_group_locator, MediaEntity};

/// Characters skipped when a folded title starts with `"the "`.
const THE_PREFIX_LEN: usize = 4;

/// A display-time cluster of catalog entries.
///
/// Not persisted; rebuilt from listings on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGroup {
    title: String,
    items: Vec<MediaEntity>,
    explicit: bool,
}

impl MediaGroup {
    fn seed(title: String, entity: MediaEntity, explicit: bool) -> Self {
        Self {
            title,
            items: vec![entity],
            explicit,
        }
    }

    /// Current effective title of the group.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Members in first-seen order.
    pub fn items(&self) -> &[MediaEntity] {
        &self.items
    }

    /// Representative first member.
    pub fn first(&self) -> &MediaEntity {
        &self.items[0]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when the group was seeded by an explicit group title.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Display-identity locator when the representative is hash-addressed.
    pub fn display_locator(&self) -> Option<String> {
        self.first()
            .source
            .content_hash()
            .map(peer_group_locator)
    }

    /// Consumes the group, yielding its members.
    pub fn into_items(self) -> Vec<MediaEntity> {
        self.items
    }
}

/// Case-folds a title one char at a time so folded and original strings
/// stay aligned char for char.
fn fold(title: &str) -> Vec<char> {
    title
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Offset to skip a leading `"the "` in a folded title.
fn article_offset(folded: &[char]) -> usize {
    if folded.len() > THE_PREFIX_LEN && folded[..THE_PREFIX_LEN] == ['t', 'h', 'e', ' '] {
        THE_PREFIX_LEN
    } else {
        0
    }
}

/// Length in chars of the longest shared prefix of two titles, compared
/// case-insensitively with a leading `"the "` stripped from each side.
fn shared_prefix_len(a: &str, b: &str) -> usize {
    let a = fold(a);
    let b = fold(b);
    let a = &a[article_offset(&a)..];
    let b = &b[article_offset(&b)..];
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Length in chars of a title with its leading `"the "` stripped.
fn stripped_len(title: &str) -> usize {
    let folded = fold(title);
    folded.len() - article_offset(&folded)
}

/// Shortens a title to `shared` chars past its `"the "` offset, keeping the
/// original casing.
fn shorten(title: &str, shared: usize) -> String {
    let folded = fold(title);
    let keep = article_offset(&folded) + shared;
    title.chars().take(keep).collect()
}

/// Clusters `entries` into display groups.
///
/// `min_prefix_len` is the minimum shared-prefix length before two titles
/// merge; `0` disables prefix merging entirely, so every entity without an
/// explicit group title becomes a singleton group.
pub fn group_media(entries: &[MediaEntity], min_prefix_len: usize) -> Vec<MediaGroup> {
    let mut groups: Vec<MediaGroup> = Vec::new();

    'entries: for entity in entries {
        // Rule 1: an explicit group title joins only an exact-title group,
        // case-sensitively, and never participates in prefix merging.
        if let Some(explicit) = entity.group_title() {
            if let Some(group) = groups.iter_mut().find(|g| g.title == explicit) {
                group.items.push(entity.clone());
            } else {
                groups.push(MediaGroup::seed(explicit.to_string(), entity.clone(), true));
            }
            continue;
        }

        let title = entity.display_title();

        // Rule 2: greedy prefix matching against groups in creation order.
        if min_prefix_len > 0 {
            for group in groups.iter_mut() {
                let shared = shared_prefix_len(&group.title, &title);
                if shared < min_prefix_len {
                    continue;
                }
                if shared == stripped_len(&group.title) {
                    // The whole group title is shared: join unchanged.
                    group.items.push(entity.clone());
                    continue 'entries;
                }
                if group.explicit {
                    // Explicitly titled groups are never narrowed.
                    continue;
                }
                group.title = shorten(&group.title, shared);
                group.items.push(entity.clone());
                continue 'entries;
            }
        }

        // Rule 3: no group matched; seed a new one.
        groups.push(MediaGroup::seed(title, entity.clone(), false));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaEntity;

    fn media(title: &str) -> MediaEntity {
        let mut entity = MediaEntity::from_locator(&format!(
            "file:///library/{}.mp4",
            title.replace(' ', "_")
        ));
        entity.set_title(title);
        entity
    }

    fn grouped(title: &str, group: &str) -> MediaEntity {
        let mut entity = media(title);
        entity.set_group_title(group);
        entity
    }

    fn titles(groups: &[MediaGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.title()).collect()
    }

    #[test]
    fn test_threshold_zero_yields_singletons() {
        let entries = vec![media("Alpha One"), media("Alpha Two"), media("Alpha Three")];
        let groups = group_media(&entries, 0);

        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_prefix_merge_shortens_group_title() {
        let entries = vec![media("Alpha One"), media("Alpha Two")];
        let groups = group_media(&entries, 5);

        assert_eq!(groups.len(), 1);
        // "Alpha One" vs "Alpha Two" share "alpha " (6 chars).
        assert_eq!(groups[0].title(), "Alpha ");
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].first().title(), Some("Alpha One"));
    }

    #[test]
    fn test_full_group_title_match_joins_unchanged() {
        let entries = vec![media("Alpha"), media("Alpha Two")];
        let groups = group_media(&entries, 5);

        assert_eq!(groups.len(), 1);
        // The entire group title "Alpha" is shared, so it stays intact.
        assert_eq!(groups[0].title(), "Alpha");
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_threshold_boundary_is_exact() {
        // Exactly 6 shared chars merge at threshold 6...
        let six = vec![media("abcdefgh"), media("abcdefxy")];
        assert_eq!(group_media(&six, 6).len(), 1);

        // ...but 5 shared chars do not.
        let five = vec![media("abcdezgh"), media("abcdexyq")];
        assert_eq!(group_media(&five, 6).len(), 2);
    }

    #[test]
    fn test_leading_the_is_skipped() {
        let entries = vec![media("The Office"), media("Office Specials")];
        let groups = group_media(&entries, 6);

        // "office" (after stripping "The ") shares all 6 chars, which is
        // the group's entire stripped title, so it joins unchanged.
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title(), "The Office");
    }

    #[test]
    fn test_the_stripping_does_not_fabricate_matches() {
        let entries = vec![media("The Office"), media("Good Office")];
        for threshold in 1..12 {
            let groups = group_media(&entries, threshold);
            assert_eq!(groups.len(), 2, "threshold {threshold} must not merge");
        }
    }

    #[test]
    fn test_case_insensitive_comparison() {
        let entries = vec![media("ALPHA one"), media("alpha TWO")];
        let groups = group_media(&entries, 6);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_explicit_title_exact_match_only() {
        let entries = vec![
            grouped("S01E01", "My Show"),
            grouped("S01E02", "My Show"),
            grouped("S01E03", "my show"),
        ];
        let groups = group_media(&entries, 6);

        // Case differs, so the third seeds its own group.
        assert_eq!(titles(&groups), vec!["My Show", "my show"]);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].is_explicit());
    }

    #[test]
    fn test_explicit_entities_skip_prefix_merging() {
        // Despite a long shared prefix, the explicit entity starts its own
        // group rather than merging.
        let entries = vec![media("Alpha One"), grouped("Alpha Two", "Elsewhere")];
        let groups = group_media(&entries, 5);

        assert_eq!(titles(&groups), vec!["Alpha One", "Elsewhere"]);
    }

    #[test]
    fn test_explicit_groups_are_never_narrowed() {
        let entries = vec![
            grouped("S01E01", "Alpha Collection"),
            media("Alpha One"),
        ];
        let groups = group_media(&entries, 5);

        // "Alpha One" shares "alpha " with the pinned group but may not
        // shorten it, so it seeds a second group.
        assert_eq!(titles(&groups), vec!["Alpha Collection", "Alpha One"]);
    }

    #[test]
    fn test_first_matching_group_wins() {
        let entries = vec![media("Alpha One"), media("Beta One"), media("Alpha Two")];
        let groups = group_media(&entries, 5);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title(), "Alpha ");
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].title(), "Beta One");
    }

    #[test]
    fn test_clustering_is_idempotent() {
        let entries = vec![
            media("The Office"),
            media("Office Specials"),
            grouped("S01E01", "My Show"),
            media("Alpha One"),
            media("Alpha Two"),
            media("Standalone Film"),
        ];

        let first = group_media(&entries, 6);
        let second = group_media(&entries, 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_display_locator_for_hash_groups() {
        let mut entity = MediaEntity::from_locator("peer://?infohash=abc123&file_index=0");
        entity.set_title("ep1.mp4");
        let groups = group_media(&[entity], 6);

        assert_eq!(
            groups[0].display_locator(),
            Some("peer://?infohash=abc123".to_string())
        );

        let plain = group_media(&[media("Plain File")], 6);
        assert_eq!(plain[0].display_locator(), None);
    }
}
