use super::domain::{
    DirectoryEntry, LevelMapping, MatchTier, NameMatchResult, NameResolution, ResolutionMap,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Minimum similarity for an approximate match to be accepted.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.80;

pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;
pub const NORMALIZED_MATCH_CONFIDENCE: f64 = 0.95;

/// Academic degrees and honorifics dropped from names before comparison,
/// written the way they look once punctuation has been stripped
/// (`S.Sos` becomes `ssos`).
pub const HONORIFIC_TOKENS: &[&str] = &[
    "st", "sh", "se", "mm", "dr", "drs", "dra", "ir", "amd", "ama", "prof", "hj", "h", "ssos",
    "skom", "mkom", "spd", "mpd", "spdi", "si", "ssi", "msi", "sip", "map", "sap", "sak", "mak",
    "me", "mh", "mt", "ssit", "skm", "mkm", "spsi", "mpsi", "sfarm", "apt", "ked", "sked",
    "mba", "msc", "phd", "stp", "sp", "mp", "ssn", "sstp", "mtp", "ak",
];

/// Lowercase, drop `.`, `,`, `-` and `_`, remove honorific tokens and
/// collapse whitespace.
pub fn normalize_person_name(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '-' | '_'))
        .collect();

    stripped
        .split_whitespace()
        .filter(|token| !HONORIFIC_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(max_len - edit_distance) / max_len` over characters; zero when either
/// side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let distance = strsim::levenshtein(a, b);
    max_len.saturating_sub(distance) as f64 / max_len as f64
}

/// Matches header names against a directory snapshot.
#[derive(Debug, Clone)]
pub struct NameReconciler<'a> {
    directory: &'a [DirectoryEntry],
    normalized: Vec<String>,
    threshold: f64,
    accept_unmatched_as_new: bool,
}

impl<'a> NameReconciler<'a> {
    pub fn new(directory: &'a [DirectoryEntry]) -> Self {
        let normalized = directory
            .iter()
            .map(|entry| normalize_person_name(&entry.name))
            .collect();

        Self {
            directory,
            normalized,
            threshold: FUZZY_MATCH_THRESHOLD,
            accept_unmatched_as_new: false,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Caller opt-in: names no tier matched and no resolution covers are
    /// taken as new employees instead of being reported unresolved.
    pub fn accept_unmatched_as_new(mut self, accept: bool) -> Self {
        self.accept_unmatched_as_new = accept;
        self
    }

    /// `Existing` resolutions must name a directory entry.
    fn accepts(&self, resolution: &NameResolution) -> bool {
        match resolution {
            NameResolution::Existing { directory_name, .. } => self
                .directory
                .iter()
                .any(|entry| entry.name.trim() == directory_name.trim()),
            NameResolution::NewEmployee { .. } => true,
        }
    }

    /// Try the exact, normalized and approximate tiers in order.
    pub fn match_name(&self, source: &str) -> (NameMatchResult, Option<&'a DirectoryEntry>) {
        let directory = self.directory;
        let trimmed = source.trim();

        if let Some(entry) = directory.iter().find(|entry| entry.name.trim() == trimmed) {
            return matched(source, entry, EXACT_MATCH_CONFIDENCE, MatchTier::Exact);
        }

        let normalized = normalize_person_name(source);
        if normalized.is_empty() {
            return (unmatched(source), None);
        }

        if let Some(index) = self
            .normalized
            .iter()
            .position(|candidate| *candidate == normalized)
        {
            return matched(
                source,
                &directory[index],
                NORMALIZED_MATCH_CONFIDENCE,
                MatchTier::Normalized,
            );
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in self.normalized.iter().enumerate() {
            let ratio = similarity(&normalized, candidate);
            if best.map_or(true, |(_, top)| ratio > top) {
                best = Some((index, ratio));
            }
        }

        match best {
            Some((index, ratio)) if ratio >= self.threshold => {
                debug!(source, candidate = %directory[index].name, ratio, "approximate name match");
                matched(source, &directory[index], ratio, MatchTier::Fuzzy)
            }
            _ => (unmatched(source), None),
        }
    }

    /// Reconcile every distinct header name. Caller resolutions are applied
    /// only to names none of the matching tiers could place; one naming an
    /// employee missing from the directory leaves the name unresolved.
    pub fn reconcile(&self, names: &[String], resolutions: &ResolutionMap) -> Reconciliation {
        let mut matches = Vec::with_capacity(names.len());
        let mut directory_levels = LevelMapping::new();
        let mut resolved_levels = LevelMapping::new();

        for name in names {
            let (result, entry) = self.match_name(name);
            if let Some(entry) = entry {
                if !entry.organizational_level.trim().is_empty() {
                    directory_levels.insert(name.clone(), entry.organizational_level.clone());
                }
                matches.push(result);
                continue;
            }

            match resolutions.get(name) {
                Some(resolution) if self.accepts(resolution) => {
                    resolved_levels.insert(
                        name.clone(),
                        resolution.organizational_level().to_string(),
                    );
                    matches.push(resolved(name, resolution));
                }
                Some(_) => {
                    warn!(source = %name, "resolution names an employee missing from the directory");
                    matches.push(result);
                }
                None if self.accept_unmatched_as_new => matches.push(accepted_as_new(name)),
                None => matches.push(result),
            }
        }

        Reconciliation {
            matches,
            directory_levels,
            resolved_levels,
        }
    }
}

fn matched<'a>(
    source: &str,
    entry: &'a DirectoryEntry,
    confidence: f64,
    tier: MatchTier,
) -> (NameMatchResult, Option<&'a DirectoryEntry>) {
    let result = NameMatchResult {
        source_name: source.to_string(),
        matched_directory_name: Some(entry.name.clone()),
        confidence,
        is_new_employee: false,
        tier: Some(tier),
    };
    (result, Some(entry))
}

fn unmatched(source: &str) -> NameMatchResult {
    NameMatchResult {
        source_name: source.to_string(),
        matched_directory_name: None,
        confidence: 0.0,
        is_new_employee: false,
        tier: None,
    }
}

fn accepted_as_new(source: &str) -> NameMatchResult {
    NameMatchResult {
        is_new_employee: true,
        ..unmatched(source)
    }
}

fn resolved(source: &str, resolution: &NameResolution) -> NameMatchResult {
    let (matched_directory_name, is_new_employee) = match resolution {
        NameResolution::Existing { directory_name, .. } => (Some(directory_name.clone()), false),
        NameResolution::NewEmployee { .. } => (None, true),
    };

    NameMatchResult {
        source_name: source.to_string(),
        matched_directory_name,
        confidence: EXACT_MATCH_CONFIDENCE,
        is_new_employee,
        tier: Some(MatchTier::Resolved),
    }
}

/// Per-name match results plus the levels they imply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    matches: Vec<NameMatchResult>,
    directory_levels: LevelMapping,
    resolved_levels: LevelMapping,
}

impl Reconciliation {
    pub fn matches(&self) -> &[NameMatchResult] {
        &self.matches
    }

    pub fn unresolved_names(&self) -> Vec<String> {
        self.matches
            .iter()
            .filter(|result| !result.is_matched())
            .map(|result| result.source_name.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.matches.iter().all(NameMatchResult::is_matched)
    }

    /// Source name to canonical name for every placed name.
    pub fn aliases(&self) -> BTreeMap<String, String> {
        self.matches
            .iter()
            .filter(|result| result.is_matched())
            .map(|result| {
                (
                    result.source_name.clone(),
                    result.canonical_name().to_string(),
                )
            })
            .collect()
    }

    /// Levels of directory entries matched by one of the tiers.
    pub fn directory_levels(&self) -> &LevelMapping {
        &self.directory_levels
    }

    /// Levels chosen by the caller for resolved names.
    pub fn resolved_levels(&self) -> &LevelMapping {
        &self.resolved_levels
    }

    /// Source name to level for every name matched or resolved so far.
    pub fn partial_directory_mapping(&self) -> LevelMapping {
        let mut mapping = self.directory_levels.clone();
        mapping.extend(
            self.resolved_levels
                .iter()
                .map(|(name, level)| (name.clone(), level.clone())),
        );
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Vec<DirectoryEntry> {
        vec![
            DirectoryEntry::new("1", "SITI AMINAH, S.SOS", "Eselon IV"),
            DirectoryEntry::new("2", "Budi Santoso", "Eselon III"),
            DirectoryEntry::new("3", "Ir. Rina Wulandari, M.M.", "Staff"),
        ]
    }

    #[test]
    fn normalization_strips_punctuation_and_honorifics() {
        assert_eq!(normalize_person_name("Dr. Siti Aminah, S.Sos"), "siti aminah");
        assert_eq!(normalize_person_name("  BUDI   santoso "), "budi santoso");
        assert_eq!(normalize_person_name("Ir. Rina Wulandari, M.M."), "rina wulandari");
        assert_eq!(normalize_person_name("Dr."), "");
    }

    #[test]
    fn similarity_uses_longest_length() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", "abc"), 0.0);
        let ratio = similarity("siti amina", "siti aminah");
        assert!((ratio - 10.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn exact_match_is_first_tier() {
        let directory = directory();
        let reconciler = NameReconciler::new(&directory);
        let (result, entry) = reconciler.match_name("Budi Santoso");
        assert_eq!(result.tier, Some(MatchTier::Exact));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(entry.map(|entry| entry.id.as_str()), Some("2"));
    }

    #[test]
    fn normalized_match_ignores_titles() {
        let directory = directory();
        let reconciler = NameReconciler::new(&directory);
        let (result, _) = reconciler.match_name("Dr. Siti Aminah, S.Sos");
        assert_eq!(result.tier, Some(MatchTier::Normalized));
        assert_eq!(
            result.matched_directory_name.as_deref(),
            Some("SITI AMINAH, S.SOS")
        );
    }

    #[test]
    fn single_typo_is_accepted_as_fuzzy_match() {
        let directory = vec![DirectoryEntry::new("9", "Siti Aminah", "Staff")];
        let reconciler = NameReconciler::new(&directory);
        let (result, _) = reconciler.match_name("Siti Amina");
        assert_eq!(result.tier, Some(MatchTier::Fuzzy));
        assert!(result.confidence >= FUZZY_MATCH_THRESHOLD);
        assert_eq!(result.matched_directory_name.as_deref(), Some("Siti Aminah"));
    }

    #[test]
    fn different_name_stays_unresolved() {
        let directory = directory();
        let reconciler = NameReconciler::new(&directory);
        let reconciliation =
            reconciler.reconcile(&["Agus Salim".to_string()], &ResolutionMap::new());
        assert!(!reconciliation.is_complete());
        assert_eq!(reconciliation.unresolved_names(), vec!["Agus Salim"]);
        assert!(reconciliation.partial_directory_mapping().is_empty());
    }

    #[test]
    fn empty_directory_still_asks_for_a_decision() {
        let names = ["Agus Salim".to_string()];
        let reconciliation = NameReconciler::new(&[]).reconcile(&names, &ResolutionMap::new());
        assert!(!reconciliation.is_complete());
        assert_eq!(reconciliation.unresolved_names(), vec!["Agus Salim"]);
    }

    #[test]
    fn unmatched_names_become_new_employees_only_on_request() {
        let names = ["Agus Salim".to_string()];
        let reconciliation = NameReconciler::new(&[])
            .accept_unmatched_as_new(true)
            .reconcile(&names, &ResolutionMap::new());
        assert!(reconciliation.is_complete());
        assert!(reconciliation.matches()[0].is_new_employee);
        assert_eq!(reconciliation.matches()[0].tier, None);
        assert_eq!(reconciliation.aliases()["Agus Salim"], "Agus Salim");
    }

    #[test]
    fn fuzzy_threshold_is_inclusive() {
        let directory = vec![DirectoryEntry::new("1", "abcdx", "Staff")];
        let reconciler = NameReconciler::new(&directory);
        assert_eq!(similarity("abcde", "abcdx"), 0.8);

        let (result, entry) = reconciler.match_name("abcde");
        assert_eq!(result.tier, Some(MatchTier::Fuzzy));
        assert_eq!(result.confidence, 0.8);
        assert!(entry.is_some());
    }

    #[test]
    fn ratio_just_below_threshold_stays_unmatched() {
        let directory = vec![DirectoryEntry::new("1", "abcdx", "Staff")];
        let (result, entry) = NameReconciler::new(&directory)
            .with_threshold(0.81)
            .match_name("abcde");
        assert!(entry.is_none());
        assert!(!result.is_matched());

        let directory = vec![DirectoryEntry::new("1", "abcdefgxy", "Staff")];
        let (result, _) = NameReconciler::new(&directory).match_name("abcdefghi");
        assert!(similarity("abcdefghi", "abcdefgxy") < FUZZY_MATCH_THRESHOLD);
        assert!(result.tier.is_none());
    }

    #[test]
    fn equally_similar_entries_keep_the_first() {
        let directory = vec![
            DirectoryEntry::new("1", "abcdx", "Eselon IV"),
            DirectoryEntry::new("2", "abcdy", "Staff"),
        ];
        let (result, entry) = NameReconciler::new(&directory).match_name("abcdz");
        assert_eq!(result.tier, Some(MatchTier::Fuzzy));
        assert_eq!(result.matched_directory_name.as_deref(), Some("abcdx"));
        assert_eq!(entry.map(|entry| entry.id.as_str()), Some("1"));
    }

    #[test]
    fn resolution_to_unknown_directory_name_is_ignored() {
        let directory = directory();
        let mut resolutions = ResolutionMap::new();
        resolutions.insert(
            "B. Santosa".to_string(),
            NameResolution::Existing {
                directory_name: "Budi Santosa".to_string(),
                organizational_level: "Eselon III".to_string(),
            },
        );

        let reconciliation =
            NameReconciler::new(&directory).reconcile(&["B. Santosa".to_string()], &resolutions);
        assert!(!reconciliation.is_complete());
        assert_eq!(reconciliation.unresolved_names(), vec!["B. Santosa"]);
        assert!(reconciliation.resolved_levels().is_empty());
    }

    #[test]
    fn threshold_can_be_raised() {
        let directory = vec![DirectoryEntry::new("9", "Siti Aminah", "Staff")];
        let reconciler = NameReconciler::new(&directory).with_threshold(0.95);
        let (result, entry) = reconciler.match_name("Siti Amina");
        assert!(entry.is_none());
        assert!(result.tier.is_none());
    }

    #[test]
    fn resolutions_place_unmatched_names() {
        let directory = directory();
        let reconciler = NameReconciler::new(&directory);
        let mut resolutions = ResolutionMap::new();
        resolutions.insert(
            "Agus Salim".to_string(),
            NameResolution::NewEmployee {
                organizational_level: "Staff".to_string(),
            },
        );
        resolutions.insert(
            "B. Santosa".to_string(),
            NameResolution::Existing {
                directory_name: "Budi Santoso".to_string(),
                organizational_level: "Eselon III".to_string(),
            },
        );

        let names = vec![
            "Agus Salim".to_string(),
            "B. Santosa".to_string(),
            "Budi Santoso".to_string(),
        ];
        let reconciliation = reconciler.reconcile(&names, &resolutions);

        assert!(reconciliation.is_complete());
        let aliases = reconciliation.aliases();
        assert_eq!(aliases["Agus Salim"], "Agus Salim");
        assert_eq!(aliases["B. Santosa"], "Budi Santoso");
        assert!(reconciliation.matches()[0].is_new_employee);
        assert_eq!(reconciliation.matches()[1].tier, Some(MatchTier::Resolved));
        assert_eq!(
            reconciliation.partial_directory_mapping()["Budi Santoso"],
            "Eselon III"
        );
    }
}
