use crate::core::search_name::NameParts;
use crate::domain::model::{
    MatchDecision, MatchOutcome, MatchReason, PublicationRecord, RawAuthor, RawRecord,
    TrackedAuthor,
};
use crate::utils::error::Result;

/// 比對用的作者資料，全部預先轉成小寫
#[derive(Debug, Clone)]
pub struct AuthorProfile {
    pub full_name: String,
    pub last_name: String,
    pub first_given: String,
    pub initials: String,
    pub affiliation_keywords: Vec<String>,
}

impl AuthorProfile {
    pub fn from_author(author: &TrackedAuthor) -> Result<Self> {
        let parts = NameParts::parse(&author.full_name)?;
        Ok(Self {
            full_name: author.full_name.clone(),
            last_name: parts.last_name.to_lowercase(),
            first_given: parts.first_given.to_lowercase(),
            initials: parts.initials.to_lowercase(),
            affiliation_keywords: author
                .affiliation_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pass(Option<MatchReason>),
    Reject(MatchReason),
}

type Stage = fn(&RawRecord, &AuthorProfile) -> Verdict;

/// 依序執行，遇到 Reject 立即停止
const STAGES: [(&str, Stage); 2] = [
    ("affiliation", affiliation_stage),
    ("author_name", author_name_stage),
];

fn affiliation_stage(record: &RawRecord, profile: &AuthorProfile) -> Verdict {
    if profile.affiliation_keywords.is_empty() {
        return Verdict::Pass(Some(MatchReason::NoAffiliationKeywords));
    }

    let mut saw_any = false;
    for affiliation in record.affiliations() {
        saw_any = true;
        let lowered = affiliation.to_lowercase();
        if profile
            .affiliation_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()))
        {
            return Verdict::Pass(Some(MatchReason::AffiliationMatched));
        }
    }

    if saw_any {
        Verdict::Reject(MatchReason::AffiliationMismatch)
    } else {
        // 沒有機構資料不算否決，交給姓名判斷
        Verdict::Pass(Some(MatchReason::AffiliationInconclusive))
    }
}

fn author_name_stage(record: &RawRecord, profile: &AuthorProfile) -> Verdict {
    let found = record
        .authors
        .iter()
        .filter(|a| a.last_name.trim().to_lowercase() == profile.last_name)
        .any(|a| entry_matches(a, profile));

    if found {
        Verdict::Pass(None)
    } else {
        Verdict::Reject(MatchReason::AuthorMismatch)
    }
}

fn entry_matches(entry: &RawAuthor, profile: &AuthorProfile) -> bool {
    let initials: String = entry
        .initials
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    if !initials.is_empty() {
        return profile.initials.starts_with(&initials);
    }

    // 沒有縮寫時，改用名字的第一段比對
    let fore = entry
        .fore_name
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches('.')
        .to_lowercase();
    !fore.is_empty() && profile.first_given.starts_with(&fore)
}

pub fn evaluate(record: &RawRecord, profile: &AuthorProfile) -> MatchDecision {
    let mut reason = None;

    for (stage, check) in STAGES.iter() {
        match check(record, profile) {
            Verdict::Pass(r) => {
                if reason.is_none() {
                    reason = r;
                }
            }
            Verdict::Reject(r) => {
                tracing::debug!(id = %record.id, stage = *stage, "rejected: {}", r);
                return MatchDecision {
                    id: record.id.clone(),
                    outcome: MatchOutcome::Rejected,
                    reason: r,
                };
            }
        }
    }

    MatchDecision {
        id: record.id.clone(),
        outcome: MatchOutcome::Accepted,
        reason: reason.unwrap_or(MatchReason::AffiliationMatched),
    }
}

/// 篩選候選記錄：接受的轉成 PublicationRecord，其餘只留下診斷結果
pub fn filter_candidates(
    records: Vec<RawRecord>,
    profile: &AuthorProfile,
) -> (Vec<PublicationRecord>, Vec<MatchDecision>) {
    let mut accepted = Vec::new();
    let mut decisions = Vec::with_capacity(records.len());

    for record in records {
        let decision = evaluate(&record, profile);
        match (decision.outcome, decision.reason) {
            (MatchOutcome::Accepted, MatchReason::AffiliationInconclusive) => {
                tracing::info!(
                    id = %decision.id,
                    author = %profile.full_name,
                    "🟡 Accepted on name only (record carries no affiliation data)"
                );
            }
            (MatchOutcome::Accepted, reason) => {
                tracing::info!(
                    id = %decision.id,
                    author = %profile.full_name,
                    reason = %reason,
                    "✅ Accepted"
                );
            }
            (MatchOutcome::Rejected, reason) => {
                tracing::info!(
                    id = %decision.id,
                    author = %profile.full_name,
                    reason = %reason,
                    "⏭️ Rejected"
                );
            }
        }

        if decision.is_accepted() {
            accepted.push(PublicationRecord::from_raw(record, &profile.full_name));
        }
        decisions.push(decision);
    }

    (accepted, decisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, keywords: &[&str]) -> AuthorProfile {
        AuthorProfile::from_author(&TrackedAuthor::new(
            name,
            keywords.iter().map(|k| k.to_string()).collect(),
        ))
        .unwrap()
    }

    fn author(last: &str, fore: &str, initials: &str, affiliations: &[&str]) -> RawAuthor {
        RawAuthor {
            last_name: last.to_string(),
            fore_name: fore.to_string(),
            initials: initials.to_string(),
            affiliations: affiliations.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn record(id: &str, authors: Vec<RawAuthor>) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            title: format!("Title {}", id),
            authors,
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_affiliation_and_initials_match() {
        let p = profile("Jane A Smith", &["General Hospital"]);
        let r = record(
            "101",
            vec![author("Smith", "Jane A", "JA", &["General Hospital Dept."])],
        );
        let decision = evaluate(&r, &p);
        assert_eq!(decision.outcome, MatchOutcome::Accepted);
        assert_eq!(decision.reason, MatchReason::AffiliationMatched);
    }

    #[test]
    fn test_affiliation_mismatch_rejects_before_name_check() {
        let p = profile("Jane A Smith", &["General Hospital"]);
        let r = record("102", vec![author("Smith", "", "J", &["Other Clinic"])]);
        let decision = evaluate(&r, &p);
        assert_eq!(decision.outcome, MatchOutcome::Rejected);
        assert_eq!(decision.reason, MatchReason::AffiliationMismatch);
    }

    #[test]
    fn test_missing_affiliation_is_inconclusive_pass() {
        let p = profile("Jane A Smith", &["General Hospital"]);
        let without = record("1", vec![author("Smith", "Jane", "JA", &[])]);
        let decision = evaluate(&without, &p);
        assert_eq!(decision.outcome, MatchOutcome::Accepted);
        assert_eq!(decision.reason, MatchReason::AffiliationInconclusive);

        // 同一筆記錄加上不相符的機構就會被否決
        let with_other = record("1", vec![author("Smith", "Jane", "JA", &["Elsewhere Univ"])]);
        assert_eq!(evaluate(&with_other, &p).outcome, MatchOutcome::Rejected);
    }

    #[test]
    fn test_affiliation_match_is_case_insensitive_and_any_author() {
        let p = profile("Jane A Smith", &["general hospital"]);
        let r = record(
            "3",
            vec![
                author("Doe", "John", "J", &["Unrelated Lab"]),
                author("Smith", "Jane", "J", &[]),
                author("Roe", "Ann", "A", &["GENERAL HOSPITAL, Boston"]),
            ],
        );
        assert!(evaluate(&r, &p).is_accepted());
    }

    #[test]
    fn test_initials_must_be_prefix_of_tracked_initials() {
        let p = profile("Jane A Smith", &[]);
        assert!(evaluate(&record("a", vec![author("smith", "", "J", &[])]), &p).is_accepted());
        assert!(evaluate(&record("b", vec![author("SMITH", "", "J.A.", &[])]), &p).is_accepted());

        let wrong = evaluate(&record("c", vec![author("Smith", "", "JB", &[])]), &p);
        assert_eq!(wrong.reason, MatchReason::AuthorMismatch);

        let too_long = profile("Jane Smith", &[]);
        assert!(!evaluate(&record("d", vec![author("Smith", "", "JA", &[])]), &too_long).is_accepted());
    }

    #[test]
    fn test_fore_name_used_when_initials_absent() {
        let p = profile("Rachel L Leon", &[]);
        assert!(evaluate(&record("1", vec![author("Leon", "Rachel", "", &[])]), &p).is_accepted());
        assert!(evaluate(&record("2", vec![author("Leon", "R.", "", &[])]), &p).is_accepted());
        assert!(!evaluate(&record("3", vec![author("Leon", "Robert", "", &[])]), &p).is_accepted());
        assert!(!evaluate(&record("4", vec![author("Leon", "", "", &[])]), &p).is_accepted());
    }

    #[test]
    fn test_no_matching_last_name() {
        let p = profile("Jane A Smith", &[]);
        let decision = evaluate(&record("5", vec![author("Smythe", "Jane", "JA", &[])]), &p);
        assert_eq!(decision.outcome, MatchOutcome::Rejected);
        assert_eq!(decision.reason, MatchReason::AuthorMismatch);
    }

    #[test]
    fn test_no_keywords_skips_affiliation_stage() {
        let p = profile("Jane A Smith", &[]);
        let decision = evaluate(&record("6", vec![author("Smith", "", "JA", &["Anywhere"])]), &p);
        assert!(decision.is_accepted());
        assert_eq!(decision.reason, MatchReason::NoAffiliationKeywords);
    }

    #[test]
    fn test_filter_candidates_materializes_accepted_records() {
        let p = profile("Jane A Smith", &["General Hospital"]);
        let records = vec![
            record("101", vec![author("Smith", "Jane A", "JA", &["General Hospital Dept."])]),
            record("102", vec![author("Smith", "", "J", &["Other Clinic"])]),
        ];

        let (accepted, decisions) = filter_candidates(records, &p);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, "101");
        assert_eq!(accepted[0].tracked_author, "Jane A Smith");
        assert_eq!(accepted[0].author_list, vec!["Smith JA"]);
        assert_eq!(accepted[0].source_url, "https://pubmed.ncbi.nlm.nih.gov/101/");
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[1].reason, MatchReason::AffiliationMismatch);
    }
}
