//! Step-list validation — run once per workflow type, before the first
//! execution.
//!
//! Rules enforced:
//! 1. Step ids must be unique within the workflow.
//! 2. Every `depends_on` entry must name a step declared *earlier* in the
//!    list.
//!
//! Dependencies are not used to compute an execution order.  Steps always
//! run in declaration order; this check only proves that order already
//! satisfies every declared dependency.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::models::StepDefinition;

/// Validate a declared step list.
///
/// # Errors
/// - [`ConfigError::DuplicateStepId`] if two steps share an id.
/// - [`ConfigError::UnknownDependency`] if a dependency is missing or is
///   declared after the step that needs it.
pub fn validate_steps<P, S>(steps: &[StepDefinition<P, S>]) -> Result<(), ConfigError>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    let mut seen: HashSet<&str> = HashSet::with_capacity(steps.len());

    for step in steps {
        if seen.contains(step.id()) {
            return Err(ConfigError::DuplicateStepId(step.id().to_owned()));
        }

        if let Some(missing) = step
            .dependencies()
            .iter()
            .find(|dep| !seen.contains(dep.as_str()))
        {
            return Err(ConfigError::UnknownDependency {
                step_id: step.id().to_owned(),
                dependency: missing.clone(),
            });
        }

        seen.insert(step.id());
    }

    Ok(())
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use steps::mock::MockStep;

    fn make_step(id: &str, deps: &[&str]) -> StepDefinition<Value, Value> {
        StepDefinition::new(id, MockStep::returning(id, json!({}))).depends_on(deps.iter().copied())
    }

    #[test]
    fn valid_linear_chain_passes() {
        // a ← b ← c
        let steps = vec![make_step("a", &[]), make_step("b", &["a"]), make_step("c", &["b"])];
        assert_eq!(validate_steps(&steps), Ok(()));
    }

    #[test]
    fn multiple_dependencies_on_earlier_steps_pass() {
        let steps = vec![
            make_step("a", &[]),
            make_step("b", &[]),
            make_step("c", &["a", "b"]),
        ];
        assert_eq!(validate_steps(&steps), Ok(()));
    }

    #[test]
    fn empty_step_list_is_valid() {
        let steps: Vec<StepDefinition<Value, Value>> = Vec::new();
        assert_eq!(validate_steps(&steps), Ok(()));
    }

    #[test]
    fn duplicate_step_id_is_rejected() {
        let steps = vec![make_step("a", &[]), make_step("b", &["a"]), make_step("a", &[])];
        assert_eq!(
            validate_steps(&steps),
            Err(ConfigError::DuplicateStepId("a".into()))
        );
    }

    #[test]
    fn dependency_on_undeclared_step_is_rejected() {
        let steps = vec![make_step("a", &[]), make_step("b", &["ghost"])];
        assert_eq!(
            validate_steps(&steps),
            Err(ConfigError::UnknownDependency {
                step_id: "b".into(),
                dependency: "ghost".into(),
            })
        );
    }

    #[test]
    fn dependency_on_later_step_is_rejected_not_reordered() {
        // b is declared after a, so a cannot depend on it even though the
        // graph itself is acyclic.
        let steps = vec![make_step("a", &["b"]), make_step("b", &[])];
        assert!(matches!(
            validate_steps(&steps),
            Err(ConfigError::UnknownDependency { step_id, dependency })
                if step_id == "a" && dependency == "b"
        ));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let steps = vec![make_step("a", &["a"])];
        assert!(matches!(
            validate_steps(&steps),
            Err(ConfigError::UnknownDependency { .. })
        ));
    }
}
