//! Ranked-choice scoring.

use crate::types::*;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Points earned by a nomination ranked at 0-based `position`.
///
/// `((votes_per_voter - 0.5 * n) / votes_per_voter) ^ (n + 1)`, so first place
/// is always worth 1.0 and later places decay quickly.
pub fn vote_weight(position: usize, votes_per_voter: u32) -> f64 {
    let votes = f64::from(votes_per_voter);
    let n = position as f64;
    ((votes - 0.5 * n) / votes).powi(position as i32 + 1)
}

/// Compute the final standings from every participant's ranking.
///
/// Only nominations that appear in at least one ranking get an entry. Entries
/// are ordered by score, highest first; equal scores are ordered by ascending
/// nomination ID. Ranked IDs with no matching nomination are ignored.
pub fn get_results(rankings: &Rankings, nominations: &Nominations, votes_per_voter: u32) -> Results {
    let mut scores: HashMap<&str, f64> = HashMap::new();

    for ranking in rankings.values() {
        for (position, nomination_id) in ranking.iter().enumerate() {
            *scores.entry(nomination_id.as_str()).or_insert(0.0) +=
                vote_weight(position, votes_per_voter);
        }
    }

    let mut results: Results = scores
        .into_iter()
        .filter_map(|(nomination_id, score)| {
            nominations.get(nomination_id).map(|nomination| ResultEntry {
                nomination_id: nomination_id.to_string(),
                nomination_text: nomination.text.clone(),
                score,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.nomination_id.cmp(&b.nomination_id))
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-3;

    fn nominations(ids: &[&str]) -> Nominations {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                (
                    id.to_string(),
                    Nomination {
                        user_id: format!("user{}", i + 1),
                        text: format!("nomination{}", i + 1),
                    },
                )
            })
            .collect()
    }

    fn rankings(entries: &[(&str, &[&str])]) -> Rankings {
        entries
            .iter()
            .map(|(participant, ids)| {
                (
                    participant.to_string(),
                    ids.iter().map(|id| id.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_vote_weight() {
        assert!((vote_weight(0, 3) - 1.0).abs() < EPSILON);
        assert!((vote_weight(1, 3) - 0.6944).abs() < EPSILON);
        assert!((vote_weight(2, 3) - 0.2963).abs() < EPSILON);
        assert!((vote_weight(0, 1) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_computes_and_sorts_results() {
        let nominations = nominations(&["01", "02", "03", "04"]);
        let rankings = rankings(&[
            ("participant1", &["02", "01", "03"]),
            ("participant2", &["04", "01", "02"]),
            ("participant3", &["03", "02", "01"]),
            ("participant4", &["02", "04", "01"]),
        ]);

        let results = get_results(&rankings, &nominations, 3);

        let expected = [
            ("02", "nomination2", 2.991),
            ("01", "nomination1", 1.981),
            ("04", "nomination4", 1.694),
            ("03", "nomination3", 1.296),
        ];
        assert_eq!(results.len(), expected.len());
        for (entry, (id, text, score)) in results.iter().zip(expected) {
            assert_eq!(entry.nomination_id, id);
            assert_eq!(entry.nomination_text, text);
            assert!(
                (entry.score - score).abs() < EPSILON,
                "{} scored {}, expected {}",
                id,
                entry.score,
                score
            );
        }
    }

    #[test]
    fn test_unranked_nominations_are_absent() {
        let nominations = nominations(&["01", "02", "03"]);
        let rankings = rankings(&[("p1", &["01"]), ("p2", &["01", "02"])]);

        let results = get_results(&rankings, &nominations, 2);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.nomination_id != "03"));
    }

    #[test]
    fn test_no_rankings_gives_empty_results() {
        let nominations = nominations(&["01", "02"]);
        let results = get_results(&Rankings::new(), &nominations, 3);
        assert!(results.is_empty());
    }

    #[test]
    fn test_ties_break_by_nomination_id() {
        let nominations = nominations(&["01", "02", "03"]);
        let rankings = rankings(&[("p1", &["03"]), ("p2", &["01"]), ("p3", &["02"])]);

        let results = get_results(&rankings, &nominations, 1);

        let order: Vec<_> = results.iter().map(|r| r.nomination_id.as_str()).collect();
        assert_eq!(order, vec!["01", "02", "03"]);
    }

    #[test]
    fn test_unknown_ranked_id_is_ignored() {
        let nominations = nominations(&["01"]);
        let rankings = rankings(&[("p1", &["ghost", "01"])]);

        let results = get_results(&rankings, &nominations, 2);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].nomination_id, "01");
    }
}
