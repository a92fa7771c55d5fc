//! Registry reconciliation
//!
//! Resolves each resident against an [`AssignmentMap`] and derives the
//! reference-person mutations that bring the registry in line with the grid.
//!
//! **Algorithm (per resident):**
//! 1. Skip residents with an empty first or last name
//! 2. Direct key hit on `"first last"`, then `"last first"`
//! 3. Otherwise scan every entry with the name matcher against both
//!    orderings; highest score wins, ties go to the entry seen first
//! 4. Resolved and different from the current field: `Assign`
//! 5. Unresolved and the field is set: `Clear`
//! 6. Anything else: no mutation
//!
//! Planning is pure; [`apply`] and [`reconcile`] never fail.

use crate::extractor::AssignmentMap;
use crate::matcher::{match_names, MatchKind, NameMatch};
use ibsync_common::{Resident, ResidentId};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// A single registry field change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Assign {
        resident_id: ResidentId,
        staff: String,
    },
    Clear {
        resident_id: ResidentId,
    },
}

impl Mutation {
    pub fn resident_id(&self) -> ResidentId {
        match self {
            Mutation::Assign { resident_id, .. } | Mutation::Clear { resident_id } => *resident_id,
        }
    }
}

/// How a resident was resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    /// Grid text that matched
    pub assignee_text: &'a str,
    pub staff: &'a str,
    /// None for a direct key hit
    pub matched: Option<NameMatch>,
}

/// Resolve one resident's assignee
///
/// Returns None for residents with an incomplete name or no acceptable match.
pub fn resolve<'a>(resident: &Resident, assignments: &'a AssignmentMap) -> Option<Resolution<'a>> {
    let candidates = resident.name_candidates()?;

    // Step 2: exact key hit
    for candidate in &candidates {
        if let Some((text, staff)) = assignments.entry(candidate) {
            return Some(Resolution {
                assignee_text: text,
                staff,
                matched: None,
            });
        }
    }

    // Step 3: approximate scan
    let mut best: Option<(Resolution<'a>, NameMatch)> = None;
    let mut accepted = 0usize;
    for (text, staff) in assignments.iter() {
        let hit = candidates
            .iter()
            .map(|c| match_names(c, text))
            .filter(NameMatch::is_match)
            .fold(None::<NameMatch>, |acc, m| match acc {
                Some(a) if a.score >= m.score => Some(a),
                _ => Some(m),
            });
        let Some(hit) = hit else { continue };
        accepted += 1;

        // Strictly greater: ties keep the first-seen entry
        let better = best.as_ref().map_or(true, |(_, b)| hit.score > b.score);
        if better {
            best = Some((
                Resolution {
                    assignee_text: text,
                    staff,
                    matched: Some(hit),
                },
                hit,
            ));
        }
    }

    if accepted > 1 {
        if let Some((chosen, _)) = &best {
            debug!(
                resident = %resident.display_name(),
                candidates = accepted,
                chosen = %chosen.assignee_text,
                staff = %chosen.staff,
                "Ambiguous grid match, keeping best score in first-seen order"
            );
        }
    }

    best.map(|(resolution, _)| resolution)
}

/// Compute the mutations needed to reconcile `residents` with `assignments`
pub fn plan(residents: &[Resident], assignments: &AssignmentMap) -> Vec<Mutation> {
    let mut mutations = Vec::new();

    for resident in residents {
        if resident.name_candidates().is_none() {
            continue;
        }
        match resolve(resident, assignments) {
            Some(resolution) => {
                if resident.reference_person != resolution.staff {
                    debug!(
                        resident = %resident.display_name(),
                        staff = %resolution.staff,
                        kind = %resolution.matched.map_or(MatchKind::Exact, |m| m.kind),
                        "Assign reference person"
                    );
                    mutations.push(Mutation::Assign {
                        resident_id: resident.id,
                        staff: resolution.staff.to_string(),
                    });
                }
            }
            None if !resident.reference_person.is_empty() => {
                debug!(
                    resident = %resident.display_name(),
                    previous = %resident.reference_person,
                    "Clear reference person, no longer on grid"
                );
                mutations.push(Mutation::Clear {
                    resident_id: resident.id,
                });
            }
            None => {}
        }
    }

    mutations
}

/// Apply mutations in place; unknown ids are ignored
pub fn apply(residents: &mut [Resident], mutations: &[Mutation]) {
    let index: HashMap<ResidentId, usize> = residents
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id, i))
        .collect();

    for mutation in mutations {
        let Some(&i) = index.get(&mutation.resident_id()) else {
            continue;
        };
        match mutation {
            Mutation::Assign { staff, .. } => residents[i].reference_person = staff.clone(),
            Mutation::Clear { .. } => residents[i].reference_person.clear(),
        }
    }
}

/// Pure reconciliation: returns the reconciled copy of `residents`
pub fn reconcile(residents: &[Resident], assignments: &AssignmentMap) -> Vec<Resident> {
    let mutations = plan(residents, assignments);
    let mut out = residents.to_vec();
    apply(&mut out, &mutations);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> AssignmentMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_direct_hit_either_order() {
        let amina = Resident::new("Amina", "Yusuf");
        let by_last = map(&[("Yusuf Amina", "Dorien")]);
        let resolution = resolve(&amina, &by_last).unwrap();
        assert_eq!(resolution.staff, "Dorien");
        assert!(resolution.matched.is_none());
    }

    #[test]
    fn test_assign_when_different() {
        let amina = Resident::new("Amina", "Yusuf").with_reference_person("Torben");
        let mutations = plan(&[amina.clone()], &map(&[("Amina Yusuf", "Dorien")]));
        assert_eq!(
            mutations,
            vec![Mutation::Assign {
                resident_id: amina.id,
                staff: "Dorien".into()
            }]
        );
    }

    #[test]
    fn test_clear_when_absent_from_grid() {
        let jan = Resident::new("Jan", "Peeters").with_reference_person("Kris B");
        let mutations = plan(&[jan.clone()], &map(&[("Amina Yusuf", "Dorien")]));
        assert_eq!(mutations, vec![Mutation::Clear { resident_id: jan.id }]);
    }

    #[test]
    fn test_no_mutation_when_already_in_sync() {
        let amina = Resident::new("Amina", "Yusuf").with_reference_person("Dorien");
        let unassigned = Resident::new("Jan", "Peeters");
        let mutations = plan(&[amina, unassigned], &map(&[("Amina Yusuf", "Dorien")]));
        assert!(mutations.is_empty());
    }

    #[test]
    fn test_incomplete_name_is_left_alone() {
        let nameless = Resident::new("", "Yusuf").with_reference_person("Kris B");
        assert!(plan(&[nameless], &AssignmentMap::new()).is_empty());
    }

    #[test]
    fn test_fuzzy_scan_resolves_spelling_variant() {
        let r = Resident::new("Mohamed", "Al Rashid");
        let mutations = plan(&[r.clone()], &map(&[("Mohammed Al-Rashid", "Imane")]));
        assert_eq!(
            mutations,
            vec![Mutation::Assign {
                resident_id: r.id,
                staff: "Imane".into()
            }]
        );
    }

    #[test]
    fn test_highest_score_wins_over_first_seen() {
        let r = Resident::new("Mohamed", "Al Rashid");
        // First entry is fuzzy, second is a word-set match
        let m = map(&[("Mohammed Al-Rashid", "Imane"), ("Al Mohamed Rashid", "Didar")]);
        assert_eq!(resolve(&r, &m).unwrap().staff, "Didar");
    }

    #[test]
    fn test_equal_scores_tie_break_on_first_seen() {
        let r = Resident::new("Mohamed", "Al Rashid");
        let m = map(&[("Rashid Al Mohamed", "Torben"), ("Al Mohamed Rashid", "Didar")]);
        assert_eq!(resolve(&r, &m).unwrap().staff, "Torben");
    }

    #[test]
    fn test_single_token_cell_does_not_match() {
        let amina = Resident::new("Amina", "Yusuf").with_reference_person("Dorien");
        let mutations = plan(&[amina.clone()], &map(&[("Amina", "Dorien")]));
        assert_eq!(mutations, vec![Mutation::Clear { resident_id: amina.id }]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let residents = vec![
            Resident::new("Amina", "Yusuf"),
            Resident::new("Jan", "Peeters").with_reference_person("Kris B"),
            Resident::new("Mohamed", "Al Rashid").with_reference_person("Torben"),
            Resident::new("", "Nobody").with_reference_person("Monica"),
        ];
        let m = map(&[("Amina Yusuf", "Dorien"), ("Mohammed Al-Rashid", "Imane")]);

        let once = reconcile(&residents, &m);
        let twice = reconcile(&once, &m);
        assert_eq!(once, twice);
        assert!(plan(&once, &m).is_empty());
        assert_eq!(once[0].reference_person, "Dorien");
        assert_eq!(once[1].reference_person, "");
        assert_eq!(once[2].reference_person, "Imane");
        assert_eq!(once[3].reference_person, "Monica");
    }

    #[test]
    fn test_apply_ignores_unknown_ids() {
        let mut residents = vec![Resident::new("Amina", "Yusuf")];
        let before = residents.clone();
        apply(
            &mut residents,
            &[Mutation::Clear {
                resident_id: uuid::Uuid::new_v4(),
            }],
        );
        assert_eq!(residents, before);
    }
}
