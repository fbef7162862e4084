//! Response validation and sanitization.
//!
//! The transport-level JSON schema guarantees structure, never content. Every
//! filename the model returns is resolved against the input set here; what
//! cannot be repaired becomes a warning, not a failure. Omissions are always
//! recoverable -- the caller accepts partial organization.

use shelver_types::error::SanitizeError;
use shelver_types::organize::{is_filesystem_safe, Group, LlmGrouping, OrganizePlan};

use super::matcher::{MatchConfidence, NameMatcher};

/// The sanitized plan plus everything worth telling the caller about.
#[derive(Debug, Clone)]
pub struct SanitizeOutcome {
    pub plan: OrganizePlan,
    pub warnings: Vec<String>,
}

/// Validate structure and reconcile every returned name with `input_names`.
///
/// Guarantees on success: every name in the plan is an input name, every
/// input name appears at least once (groups or `ungrouped`), no group is
/// empty, and every group name is filesystem-safe.
pub fn sanitize(input_names: &[String], raw: LlmGrouping) -> Result<SanitizeOutcome, SanitizeError> {
    // Structural checks are fatal; a schema-conforming response should never
    // trip them, which is exactly why we do not trust it.
    for group in &raw.groups {
        if !is_filesystem_safe(&group.group_name) {
            return Err(SanitizeError::UnsafeGroupName(group.group_name.clone()));
        }
        if group.files.is_empty() {
            return Err(SanitizeError::EmptyGroup(group.group_name.clone()));
        }
    }

    let matcher = NameMatcher::new(input_names);
    let mut warnings = Vec::new();
    let mut dropped_extras: Vec<String> = Vec::new();
    let mut accounted: Vec<String> = Vec::new();

    let mut groups: Vec<Group> = Vec::with_capacity(raw.groups.len());
    for group in &raw.groups {
        let files = resolve_names(
            &matcher,
            &group.files,
            &format!("group '{}'", group.group_name),
            &mut warnings,
            &mut dropped_extras,
        );
        accounted.extend(files.iter().cloned());
        if files.is_empty() {
            warnings.push(format!(
                "dropped group '{}': no files remained after reconciliation",
                group.group_name
            ));
            continue;
        }
        groups.push(Group {
            group_name: group.group_name.clone(),
            description: group.description.clone(),
            files,
        });
    }

    let mut ungrouped = resolve_names(
        &matcher,
        &raw.ungrouped_files,
        "ungrouped_files",
        &mut warnings,
        &mut dropped_extras,
    );
    accounted.extend(ungrouped.iter().cloned());

    if !dropped_extras.is_empty() {
        dropped_extras.sort();
        dropped_extras.dedup();
        warnings.push(format!(
            "dropped {} name(s) not present in the input: {}",
            dropped_extras.len(),
            dropped_extras.join(", ")
        ));
    }

    let missing: Vec<&String> = input_names
        .iter()
        .filter(|n| !accounted.contains(n))
        .collect();
    if !missing.is_empty() {
        warnings.push(format!(
            "model omitted {} input file(s); appended to ungrouped: {}",
            missing.len(),
            missing
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        ungrouped.extend(missing.into_iter().cloned());
    }

    Ok(SanitizeOutcome {
        plan: OrganizePlan {
            groups,
            ungrouped,
            description: raw.reorganization_description,
            truncation: None,
            warnings: Vec::new(),
        },
        warnings,
    })
}

/// Resolve one list of model-returned names, deduplicating mentions so a
/// file appears at most once per assignment.
fn resolve_names(
    matcher: &NameMatcher,
    names: &[String],
    context: &str,
    warnings: &mut Vec<String>,
    dropped_extras: &mut Vec<String>,
) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for name in names {
        if name.ends_with('/') {
            warnings.push(format!(
                "dropped directory path '{name}' from {context}: only file names are allowed"
            ));
            continue;
        }
        match matcher.resolve(name) {
            Some((input_name, MatchConfidence::Exact)) => {
                if !resolved.iter().any(|r| r == input_name) {
                    resolved.push(input_name.to_string());
                }
            }
            Some((input_name, confidence)) => {
                warnings.push(format!(
                    "resolved '{name}' to input file '{input_name}' ({} match) in {context}",
                    confidence.as_str()
                ));
                if !resolved.iter().any(|r| r == input_name) {
                    resolved.push(input_name.to_string());
                }
            }
            None => {
                dropped_extras.push(name.clone());
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn grouping(groups: Vec<(&str, Vec<&str>)>, ungrouped: Vec<&str>) -> LlmGrouping {
        LlmGrouping {
            groups: groups
                .into_iter()
                .map(|(name, files)| Group {
                    group_name: name.to_string(),
                    description: format!("{name} files"),
                    files: files.into_iter().map(|f| f.to_string()).collect(),
                })
                .collect(),
            ungrouped_files: ungrouped.into_iter().map(|s| s.to_string()).collect(),
            reorganization_description: "test run".to_string(),
        }
    }

    fn all_plan_names(plan: &OrganizePlan) -> Vec<String> {
        let mut names: Vec<String> = plan
            .groups
            .iter()
            .flat_map(|g| g.files.iter().cloned())
            .chain(plan.ungrouped.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    #[test]
    fn clean_response_passes_without_warnings() {
        let names = inputs(&["a.txt", "b.txt", "c.txt"]);
        let raw = grouping(vec![("Letters", vec!["a.txt", "b.txt"])], vec!["c.txt"]);

        let outcome = sanitize(&names, raw).unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.plan.groups.len(), 1);
        assert_eq!(outcome.plan.ungrouped, vec!["c.txt"]);
    }

    #[test]
    fn unsafe_group_name_is_fatal() {
        let names = inputs(&["a.txt"]);
        let raw = grouping(vec![("bad/name", vec!["a.txt"])], vec![]);
        assert!(matches!(
            sanitize(&names, raw),
            Err(SanitizeError::UnsafeGroupName(_))
        ));
    }

    #[test]
    fn empty_group_as_returned_is_fatal() {
        let names = inputs(&["a.txt"]);
        let raw = grouping(vec![("Empty", vec![])], vec!["a.txt"]);
        assert!(matches!(
            sanitize(&names, raw),
            Err(SanitizeError::EmptyGroup(_))
        ));
    }

    #[test]
    fn directory_paths_are_dropped_with_warning() {
        let names = inputs(&["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"]);
        // The model omits e.txt and sneaks in a directory path.
        let raw = grouping(
            vec![("Posts", vec!["posts/", "a.txt", "b.txt"])],
            vec!["c.txt", "d.txt"],
        );

        let outcome = sanitize(&names, raw).unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("posts/") && w.contains("directory path")));
        // The omitted file lands in ungrouped with its own warning.
        assert!(outcome.plan.ungrouped.contains(&"e.txt".to_string()));
        assert!(outcome.warnings.iter().any(|w| w.contains("omitted")));
        // No trace of the directory path anywhere.
        assert!(all_plan_names(&outcome.plan)
            .iter()
            .all(|n| !n.ends_with('/')));
    }

    #[test]
    fn hallucinated_names_are_dropped_and_listed() {
        let names = inputs(&["real.txt"]);
        let raw = grouping(
            vec![("Stuff", vec!["real.txt", "imaginary.txt"])],
            vec![],
        );

        let outcome = sanitize(&names, raw).unwrap();
        assert_eq!(outcome.plan.groups[0].files, vec!["real.txt"]);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("imaginary.txt") && w.contains("not present")));
    }

    #[test]
    fn fuzzy_resolution_emits_warning_naming_both_forms() {
        let names = inputs(&["Report Final.TXT"]);
        let raw = grouping(vec![("Docs", vec!["report final.txt"])], vec![]);

        let outcome = sanitize(&names, raw).unwrap();
        assert_eq!(outcome.plan.groups[0].files, vec!["Report Final.TXT"]);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("report final.txt") && w.contains("Report Final.TXT")));
    }

    #[test]
    fn ref_sidecar_names_resolve_without_missing_file_warnings() {
        let names = inputs(&[
            "1895_1-14-Jan 2001-Martin copy.jpg.ref.json",
            "1895_1-14-Jan 2002-Martin copy.jpg.ref.json",
        ]);
        let raw = grouping(
            vec![(
                "Martin letters",
                vec![
                    "1895_1-14-Jan 2001-Martin copy",
                    "1895_1-14-Jan 2002-Martin copy",
                ],
            )],
            vec![],
        );

        let outcome = sanitize(&names, raw).unwrap();
        assert_eq!(outcome.plan.groups[0].files.len(), 2);
        assert!(!outcome.warnings.iter().any(|w| w.contains("omitted")));
        // Both resolutions are normalized matches and warn as such.
        assert_eq!(
            outcome
                .warnings
                .iter()
                .filter(|w| w.contains("normalized match"))
                .count(),
            2
        );
    }

    #[test]
    fn group_emptied_by_reconciliation_is_dropped() {
        let names = inputs(&["a.txt"]);
        let raw = grouping(
            vec![("Ghosts", vec!["phantom.txt"]), ("Real", vec!["a.txt"])],
            vec![],
        );

        let outcome = sanitize(&names, raw).unwrap();
        assert_eq!(outcome.plan.groups.len(), 1);
        assert_eq!(outcome.plan.groups[0].group_name, "Real");
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("Ghosts") && w.contains("no files remained")));
    }

    #[test]
    fn every_input_appears_and_nothing_else() {
        let names = inputs(&["a.txt", "b.txt", "c.txt", "d.txt"]);
        let raw = grouping(
            vec![
                ("One", vec!["a.txt", "fake.txt", "b.txt"]),
                ("Two", vec!["b.txt"]), // overlap is legitimate
            ],
            vec![],
        );

        let outcome = sanitize(&names, raw).unwrap();
        let plan_names = all_plan_names(&outcome.plan);
        for name in &names {
            assert!(plan_names.contains(name), "{name} missing from plan");
        }
        for name in &plan_names {
            assert!(names.contains(name), "{name} is not an input");
        }
    }

    #[test]
    fn duplicate_mentions_within_a_group_collapse() {
        let names = inputs(&["a.txt"]);
        let raw = grouping(vec![("Dup", vec!["a.txt", "a.txt"])], vec![]);

        let outcome = sanitize(&names, raw).unwrap();
        assert_eq!(outcome.plan.groups[0].files, vec!["a.txt"]);
    }

    #[test]
    fn overlap_across_groups_is_preserved() {
        let names = inputs(&["a.txt", "b.txt"]);
        let raw = grouping(
            vec![("One", vec!["a.txt"]), ("Two", vec!["a.txt", "b.txt"])],
            vec![],
        );

        let outcome = sanitize(&names, raw).unwrap();
        assert_eq!(outcome.plan.groups.len(), 2);
        assert!(outcome.plan.groups[1].files.contains(&"a.txt".to_string()));
    }
}
