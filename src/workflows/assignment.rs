use super::scan_query;
use crate::error::CrmError;
use crate::gateway::{Criteria, Gateway, EMPTY_VALUE};
use crate::pipeline::PipelineStateMachine;
use crate::resources::{Module, ResourceClient};
use crate::shared::batch::{BatchItem, BatchStatus};
use serde_json::{json, Map};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentMode {
    #[default]
    RoundRobin,
    Random,
}

/// Picks owners for successive records.
pub trait OwnerPicker {
    fn pick(&mut self, owner_count: usize) -> usize;
}

#[derive(Debug, Default)]
pub struct RoundRobin {
    next: usize,
}

impl OwnerPicker for RoundRobin {
    fn pick(&mut self, owner_count: usize) -> usize {
        let index = self.next % owner_count;
        self.next += 1;
        index
    }
}

/// Uniform pick from OS randomness. Falls back to round-robin order if the
/// OS source is unavailable.
#[derive(Debug, Default)]
pub struct RandomPick {
    fallback: RoundRobin,
}

impl OwnerPicker for RandomPick {
    fn pick(&mut self, owner_count: usize) -> usize {
        let mut bytes = [0u8; 8];
        match getrandom::getrandom(&mut bytes) {
            Ok(()) => (u64::from_le_bytes(bytes) % owner_count as u64) as usize,
            Err(err) => {
                tracing::warn!(error = %err, "os randomness unavailable; using round-robin");
                self.fallback.pick(owner_count)
            }
        }
    }
}

pub fn unassigned_criteria() -> Criteria {
    Criteria::new().equals("Owner", EMPTY_VALUE)
}

/// Assigns every unassigned pipeline to one of `owners`.
pub fn assign_unassigned(
    gateway: &Gateway,
    owners: &[String],
    mode: AssignmentMode,
) -> Result<Vec<BatchItem>, CrmError> {
    match mode {
        AssignmentMode::RoundRobin => {
            assign_with(gateway, owners, &mut RoundRobin::default())
        }
        AssignmentMode::Random => assign_with(gateway, owners, &mut RandomPick::default()),
    }
}

pub fn assign_with(
    gateway: &Gateway,
    owners: &[String],
    picker: &mut dyn OwnerPicker,
) -> Result<Vec<BatchItem>, CrmError> {
    let owners: Vec<&str> = owners
        .iter()
        .map(|owner| owner.trim())
        .filter(|owner| !owner.is_empty())
        .collect();
    if owners.is_empty() {
        return Err(CrmError::InvalidArgument(
            "at least one owner email is required".to_string(),
        ));
    }

    let pipelines = PipelineStateMachine::new(gateway)
        .list_pipelines(&scan_query().criteria(unassigned_criteria()))?;
    let records = ResourceClient::new(gateway, Module::Pipelines);
    let items = pipelines
        .into_iter()
        .map(|pipeline| {
            let id = pipeline.id;
            let owner = owners[picker.pick(owners.len())];
            let mut fields = Map::new();
            fields.insert("Owner".to_string(), json!({ "email": owner }));
            let outcome = records.update(&id, fields);
            if let Err(err) = &outcome {
                tracing::warn!(pipeline_id = %id, owner, error = %err, "assignment failed");
            }
            BatchItem::from_outcome(id, BatchStatus::Success, outcome).with_detail("assigned_to", owner)
        })
        .collect::<Vec<_>>();
    tracing::info!(
        assigned = items.iter().filter(|item| !item.is_error()).count(),
        failed = items.iter().filter(|item| item.is_error()).count(),
        "assignment finished"
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles_through_owners() {
        let mut picker = RoundRobin::default();
        let picks: Vec<_> = (0..5).map(|_| picker.pick(2)).collect();
        assert_eq!(picks, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn random_pick_stays_in_range() {
        let mut picker = RandomPick::default();
        for _ in 0..50 {
            assert!(picker.pick(3) < 3);
        }
    }

    #[test]
    fn unassigned_criteria_matches_empty_owner() {
        assert_eq!(
            unassigned_criteria().to_wire().as_deref(),
            Some("(Owner:equals:${EMPTY})")
        );
    }
}
