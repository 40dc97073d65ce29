use crate::id::ResourceId;
use crate::model::{Model, Record};
use crate::resource::{ResourceRef, ResourceType};

/// A target record together with its validated ancestors.
///
/// Each node's foreign key to the next node's type equals that node's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChain {
    target: Record,
    /// Nearest ancestor first.
    ancestors: Vec<Record>,
}

impl ResolvedChain {
    pub fn new(target: Record, ancestors: Vec<Record>) -> Self {
        Self { target, ancestors }
    }

    pub fn target(&self) -> &Record {
        &self.target
    }

    pub fn target_ref(&self) -> ResourceRef {
        ResourceRef::new(self.target.resource_type(), self.target.id())
    }

    pub fn ancestors(&self) -> &[Record] {
        &self.ancestors
    }

    /// Target first, then ancestors up to the root.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        std::iter::once(&self.target).chain(self.ancestors.iter())
    }

    pub fn get(&self, ty: ResourceType) -> Option<&Record> {
        self.iter().find(|record| record.resource_type() == ty)
    }

    pub fn id_of(&self, ty: ResourceType) -> Option<ResourceId> {
        self.get(ty).map(Record::id)
    }

    /// Typed view of the node of type `M`, if the chain contains one.
    pub fn find<M: Model>(&self) -> Option<&M> {
        self.get(M::RESOURCE_TYPE).and_then(M::from_record_ref)
    }

    /// Typed view of the target.
    pub fn target_as<M: Model>(&self) -> Option<&M> {
        M::from_record_ref(&self.target)
    }

    /// Tenant owning this chain: the id of its institution node.
    pub fn institution_id(&self) -> Option<ResourceId> {
        self.id_of(ResourceType::Institution)
    }

    pub fn len(&self) -> usize {
        self.ancestors.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Evaluation, Institution, NewEvaluation, NewInstitution, NewRecord};
    use time::OffsetDateTime;

    fn chain() -> ResolvedChain {
        let now = OffsetDateTime::now_utc();
        let institution = NewRecord::from(NewInstitution {
            name: "Acme".into(),
            description: None,
        })
        .into_record(ResourceId::new(3), now);
        let evaluation = NewRecord::from(NewEvaluation {
            institution_id: ResourceId::new(3),
            name: "Midterm".into(),
            description: None,
            is_active: true,
            access_code: Some("ABCD1234".into()),
        })
        .into_record(ResourceId::new(8), now);
        ResolvedChain::new(evaluation, vec![institution])
    }

    #[test]
    fn exposes_target_and_ancestors() {
        let chain = chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.target().resource_type(), ResourceType::Evaluation);
        assert_eq!(chain.institution_id(), Some(ResourceId::new(3)));
        assert_eq!(chain.target_ref().to_string(), "Evaluation/8");
    }

    #[test]
    fn typed_lookup() {
        let chain = chain();
        assert_eq!(chain.find::<Institution>().map(|i| i.name.as_str()), Some("Acme"));
        assert_eq!(chain.target_as::<Evaluation>().map(|e| e.id), Some(ResourceId::new(8)));
        assert!(chain.find::<crate::model::Answer>().is_none());
    }
}
