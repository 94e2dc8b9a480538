//! Read-only projection of the latest query response into an ordered,
//! collapsible reasoning trace.

use std::collections::HashMap;

use uuid::Uuid;

use crate::api::QueryResponse;

/// Client-side identity of one accepted query result.
///
/// Expand/collapse state is keyed by this id plus the step number, so
/// toggle state from a previous result can never bleed into a new result
/// that happens to place a step at the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId(Uuid);

impl ResultId {
    /// Mint a fresh identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

/// The latest successful query response together with its client-side id.
#[derive(Debug, Clone)]
pub struct LatestResult {
    id: ResultId,
    response: QueryResponse,
}

impl LatestResult {
    /// Wrap a freshly accepted response.
    pub fn new(response: QueryResponse) -> Self {
        Self {
            id: ResultId::new(),
            response,
        }
    }

    /// The result identity.
    pub fn id(&self) -> ResultId {
        self.id
    }

    /// The underlying response.
    pub fn response(&self) -> &QueryResponse {
        &self.response
    }
}

/// Per-step expand/collapse state, keyed by `(result id, step number)`.
#[derive(Debug, Default)]
pub struct TraceToggles {
    expanded: HashMap<(ResultId, u32), bool>,
}

impl TraceToggles {
    /// Create an empty toggle map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the expand state of one step of one result.
    pub fn toggle(&mut self, result: ResultId, step_number: u32, default_expanded: bool) {
        let entry = self
            .expanded
            .entry((result, step_number))
            .or_insert(default_expanded);
        *entry = !*entry;
    }

    /// Expand state for a step, or `None` when never toggled.
    pub fn get(&self, result: ResultId, step_number: u32) -> Option<bool> {
        self.expanded.get(&(result, step_number)).copied()
    }

    /// Drop state belonging to other results. Optional housekeeping; the
    /// identity keying already prevents cross-result bleed.
    pub fn retain_result(&mut self, result: ResultId) {
        self.expanded.retain(|(id, _), _| *id == result);
    }
}

/// One step as the UI should draw it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub step_number: u32,
    /// Header text: description when present, step type otherwise.
    pub title: String,
    pub expanded: bool,
    pub reasoning: Option<String>,
    pub result: Option<String>,
    pub patterns_used: Vec<String>,
    pub quality_score: Option<f64>,
}

/// The full trace as the UI should draw it.
#[derive(Debug, Clone)]
pub struct TraceView {
    pub result_id: ResultId,
    pub response: String,
    /// Overall quality from response metadata.
    pub quality_score: f64,
    /// Absent when the backend omitted the count; render a placeholder.
    pub patterns_retrieved_count: Option<u64>,
    /// Steps in ascending step-number order.
    pub steps: Vec<StepView>,
}

/// Project the latest result into a renderable trace.
///
/// Steps are sorted by ascending `step_number`. The backend already
/// guarantees this order; sorting defensively here is an implementation
/// choice so a violated invariant degrades to correct display rather than
/// a scrambled trace. On a result with no toggle history, the first step
/// is expanded and the rest are collapsed.
pub fn render(result: &LatestResult, toggles: &TraceToggles) -> TraceView {
    let response = result.response();

    let mut ordered: Vec<_> = response.reasoning_steps.iter().collect();
    ordered.sort_by_key(|step| step.step_number);

    let steps = ordered
        .iter()
        .enumerate()
        .map(|(position, step)| {
            let default_expanded = position == 0;
            let expanded = toggles
                .get(result.id(), step.step_number)
                .unwrap_or(default_expanded);

            StepView {
                step_number: step.step_number,
                title: step
                    .description
                    .clone()
                    .unwrap_or_else(|| step.step_type.clone()),
                expanded,
                reasoning: step.reasoning.clone(),
                result: step.result.clone(),
                patterns_used: step.patterns_used.clone(),
                quality_score: step.quality_score,
            }
        })
        .collect();

    TraceView {
        result_id: result.id(),
        response: response.response.clone(),
        quality_score: response.metadata.quality_score,
        patterns_retrieved_count: response.metadata.patterns_retrieved_count,
        steps,
    }
}

/// Whether a step at this position starts expanded on a fresh result.
pub fn default_expanded(position: usize) -> bool {
    position == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{QueryResponse, ReasoningStep, ResponseMetadata};

    fn result_with_steps(steps: Vec<ReasoningStep>) -> LatestResult {
        LatestResult::new(QueryResponse {
            response: "answer".to_string(),
            session_id: "s1".to_string(),
            reasoning_steps: steps,
            metadata: ResponseMetadata {
                quality_score: 0.9,
                patterns_retrieved_count: Some(2),
            },
        })
    }

    #[test]
    fn test_first_step_expanded_by_default() {
        let result = result_with_steps(vec![
            ReasoningStep::new(1, "analyze"),
            ReasoningStep::new(2, "compute"),
            ReasoningStep::new(3, "verify"),
        ]);
        let view = render(&result, &TraceToggles::new());

        assert_eq!(view.steps.len(), 3);
        assert!(view.steps[0].expanded);
        assert!(!view.steps[1].expanded);
        assert!(!view.steps[2].expanded);
    }

    #[test]
    fn test_steps_sorted_by_step_number() {
        // Input deliberately shuffled; the renderer must restore order.
        let result = result_with_steps(vec![
            ReasoningStep::new(3, "verify"),
            ReasoningStep::new(1, "analyze"),
            ReasoningStep::new(2, "compute"),
        ]);
        let view = render(&result, &TraceToggles::new());

        let numbers: Vec<u32> = view.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        // First in *sorted* order is the expanded one
        assert!(view.steps[0].expanded);
        assert_eq!(view.steps[0].title, "analyze");
    }

    #[test]
    fn test_title_prefers_description() {
        let result = result_with_steps(vec![
            ReasoningStep::new(1, "compute").with_description("Work out the product"),
            ReasoningStep::new(2, "verify"),
        ]);
        let view = render(&result, &TraceToggles::new());

        assert_eq!(view.steps[0].title, "Work out the product");
        assert_eq!(view.steps[1].title, "verify");
    }

    #[test]
    fn test_toggle_flips_state() {
        let result = result_with_steps(vec![
            ReasoningStep::new(1, "analyze"),
            ReasoningStep::new(2, "compute"),
        ]);
        let mut toggles = TraceToggles::new();

        // Collapse the default-expanded first step, expand the second
        toggles.toggle(result.id(), 1, true);
        toggles.toggle(result.id(), 2, false);

        let view = render(&result, &toggles);
        assert!(!view.steps[0].expanded);
        assert!(view.steps[1].expanded);
    }

    #[test]
    fn test_toggle_state_never_bleeds_across_results() {
        let first = result_with_steps(vec![
            ReasoningStep::new(1, "analyze"),
            ReasoningStep::new(2, "compute"),
        ]);
        let mut toggles = TraceToggles::new();
        toggles.toggle(first.id(), 2, false); // expand step 2 of the first result

        // A new, unrelated result reusing the same step numbers
        let second = result_with_steps(vec![
            ReasoningStep::new(1, "retrieve"),
            ReasoningStep::new(2, "synthesize"),
        ]);
        let view = render(&second, &toggles);

        // Fresh defaults: first expanded, second collapsed
        assert!(view.steps[0].expanded);
        assert!(!view.steps[1].expanded);
    }

    #[test]
    fn test_missing_metadata_count_renders_placeholder() {
        let result = LatestResult::new(QueryResponse {
            response: "ok".to_string(),
            session_id: "s1".to_string(),
            reasoning_steps: vec![ReasoningStep::new(1, "compute")],
            metadata: ResponseMetadata {
                quality_score: 0.5,
                patterns_retrieved_count: None,
            },
        });
        let view = render(&result, &TraceToggles::new());
        assert!(view.patterns_retrieved_count.is_none());
    }

    #[test]
    fn test_empty_step_list_renders_empty_view() {
        let result = result_with_steps(Vec::new());
        let view = render(&result, &TraceToggles::new());
        assert!(view.steps.is_empty());
        assert_eq!(view.response, "answer");
    }

    #[test]
    fn test_retain_result_prunes_other_entries() {
        let first = result_with_steps(vec![ReasoningStep::new(1, "a")]);
        let second = result_with_steps(vec![ReasoningStep::new(1, "b")]);

        let mut toggles = TraceToggles::new();
        toggles.toggle(first.id(), 1, true);
        toggles.toggle(second.id(), 1, true);

        toggles.retain_result(second.id());
        assert!(toggles.get(first.id(), 1).is_none());
        assert_eq!(toggles.get(second.id(), 1), Some(false));
    }
}
