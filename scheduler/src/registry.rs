//! Program/section and subject/teacher/room catalogs the engine validates against.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use crate::error::StoreError;
use crate::model::{RoomId, SectionKey, SubjectId, TeacherId};

#[async_trait]
pub trait Registry: Send + Sync {
    /// Section names of a program's semester, in canonical order.
    async fn sections(&self, program_code: &str, semester: u8) -> Result<Vec<String>, StoreError>;

    async fn has_subject(&self, id: SubjectId) -> Result<bool, StoreError>;

    async fn has_teacher(&self, id: TeacherId) -> Result<bool, StoreError>;

    async fn has_room(&self, id: RoomId) -> Result<bool, StoreError>;

    async fn has_section(&self, section: &SectionKey) -> Result<bool, StoreError> {
        Ok(self
            .sections(&section.program_code, section.semester)
            .await?
            .contains(&section.section))
    }
}

/// Fixed catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    sections: BTreeMap<(String, u8), Vec<String>>,
    subjects: HashSet<SubjectId>,
    teachers: HashSet<TeacherId>,
    rooms: HashSet<RoomId>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(mut self, program_code: impl Into<String>, semester: u8, sections: &[&str]) -> Self {
        self.sections.insert(
            (program_code.into(), semester),
            sections.iter().map(|section| section.to_string()).collect(),
        );
        self
    }

    pub fn with_subjects(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.subjects.extend(ids.into_iter().map(SubjectId));
        self
    }

    pub fn with_teachers(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.teachers.extend(ids.into_iter().map(TeacherId));
        self
    }

    pub fn with_rooms(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.rooms.extend(ids.into_iter().map(RoomId));
        self
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn sections(&self, program_code: &str, semester: u8) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sections
            .get(&(program_code.to_string(), semester))
            .cloned()
            .unwrap_or_default())
    }

    async fn has_subject(&self, id: SubjectId) -> Result<bool, StoreError> {
        Ok(self.subjects.contains(&id))
    }

    async fn has_teacher(&self, id: TeacherId) -> Result<bool, StoreError> {
        Ok(self.teachers.contains(&id))
    }

    async fn has_room(&self, id: RoomId) -> Result<bool, StoreError> {
        Ok(self.rooms.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_registry_lookups() {
        let registry = StaticRegistry::new()
            .with_sections("BCT", 7, &["AB", "CD"])
            .with_teachers([1, 2]);

        assert_eq!(registry.sections("BCT", 7).await.unwrap(), vec!["AB", "CD"]);
        assert!(registry.sections("BCT", 8).await.unwrap().is_empty());
        assert!(registry.has_section(&SectionKey::new("BCT", 7, "CD")).await.unwrap());
        assert!(!registry.has_section(&SectionKey::new("BCT", 7, "EF")).await.unwrap());
        assert!(registry.has_teacher(TeacherId(2)).await.unwrap());
        assert!(!registry.has_room(RoomId(2)).await.unwrap());
    }
}
