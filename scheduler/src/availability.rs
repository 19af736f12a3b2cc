//! Teacher and room availability.
//!
//! A resource is unavailable at (day, slot) when any stored row, in any
//! section, uses it there. Rows the request under evaluation would replace
//! are left out, so a request never conflicts with what it displaces.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::error::StoreError;
use crate::model::{
    AssignmentId, CellKey, ClassAssignment, ClassType, Day, ElectiveGroupId, LabGroup, Resource,
    SectionKey, SlotId, SubjectId,
};
use crate::store::AssignmentStore;

/// What is sitting in a cell or holding a resource.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Occupant {
    pub assignment_id: Option<AssignmentId>,
    pub section: SectionKey,
    pub class_type: ClassType,
    pub subject_id: Option<SubjectId>,
    pub lab_group: Option<LabGroup>,
    pub elective_group: Option<ElectiveGroupId>,
}

impl From<&ClassAssignment> for Occupant {
    fn from(row: &ClassAssignment) -> Self {
        Self {
            assignment_id: row.id,
            section: row.section.clone(),
            class_type: row.class_type,
            subject_id: row.subject_id,
            lab_group: row.lab_group(),
            elective_group: row.elective_group(),
        }
    }
}

impl Display for Occupant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.subject_id {
            Some(subject) => write!(f, "{} of subject {} for {}", self.class_type, subject.0, self.section),
            None => write!(f, "{} for {}", self.class_type, self.section),
        }
    }
}

/// Answer to an availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Availability {
    pub resource: Resource,
    pub day: Day,
    pub slot_id: SlotId,
    pub available: bool,
    /// Rows holding the resource. Empty when available.
    pub occupants: Vec<Occupant>,
}

/// Rows an availability query must not count against the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub assignment_ids: HashSet<AssignmentId>,
}

impl Exclusions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn excludes(&self, row: &ClassAssignment) -> bool {
        row.id.is_some_and(|id| self.assignment_ids.contains(&id))
    }
}

/// Advisory payload: the request may still be committed with an override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// A teacher or room of the request is already used at that day and slot.
    ResourceBusy {
        target: CellKey,
        resource: Resource,
        occupants: Vec<Occupant>,
    },
    /// The target cell already holds rows; committing replaces them.
    CellOccupied {
        target: CellKey,
        occupants: Vec<Occupant>,
    },
}

impl Conflict {
    pub fn target(&self) -> &CellKey {
        match self {
            Conflict::ResourceBusy { target, .. } | Conflict::CellOccupied { target, .. } => target,
        }
    }

    pub fn occupants(&self) -> &[Occupant] {
        match self {
            Conflict::ResourceBusy { occupants, .. } | Conflict::CellOccupied { occupants, .. } => {
                occupants
            }
        }
    }
}

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let holders = self
            .occupants()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match self {
            Conflict::ResourceBusy { target, resource, .. } => write!(
                f,
                "{resource} is busy on {} slot {} with {holders} (requested for {})",
                target.day, target.slot_id, target.section
            ),
            Conflict::CellOccupied { target, .. } => {
                write!(f, "{target} already holds {holders}")
            }
        }
    }
}

/// Read-only view over stored rows answering availability queries.
pub struct AvailabilityIndex<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AvailabilityIndex<'a, S>
where
    S: AssignmentStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn is_available(
        &self,
        resource: Resource,
        day: Day,
        slot_id: SlotId,
        exclusions: &Exclusions,
    ) -> Result<Availability, StoreError> {
        let mut occupants: Vec<Occupant> = self
            .store
            .using_resource_at(resource, day, slot_id)
            .await?
            .iter()
            .filter(|row| !exclusions.excludes(row))
            .map(Occupant::from)
            .collect();
        occupants.sort_by_key(|occupant| occupant.assignment_id);

        Ok(Availability {
            resource,
            day,
            slot_id,
            available: occupants.is_empty(),
            occupants,
        })
    }

    /// Runs a batch of queries concurrently; results come back in query order.
    pub async fn check_many(
        &self,
        queries: &[(Resource, Day, SlotId)],
        exclusions: &Exclusions,
    ) -> Result<Vec<Availability>, StoreError> {
        try_join_all(
            queries
                .iter()
                .map(|&(resource, day, slot_id)| self.is_available(resource, day, slot_id, exclusions)),
        )
        .await
    }
}
