// ── Redundant stream classification ──
//
// Derived once per configuration from the completed static model. A
// stream declaring a redundant association must be declared back by
// every stream it names, and every member must sit on a distinct AVB
// interface. Members are ordered by AVB interface index: the first is
// the primary, the others are secondaries. Associations failing any rule
// are reported and left out of every set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::model::{
    AvbInterfaceIndex, DescriptorType, StreamIndex, StreamStaticModel, UniqueIdentifier,
    VirtualIndex,
};

/// Why a declared redundant association was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RedundancyIssue {
    #[error("stream {stream} references itself in its redundant association")]
    SelfReference { stream: StreamIndex },

    #[error("stream {stream} references stream {referenced} which does not exist")]
    UnknownStream {
        stream: StreamIndex,
        referenced: StreamIndex,
    },

    #[error("stream {referenced} does not reference stream {stream} back")]
    NotReciprocal {
        stream: StreamIndex,
        referenced: StreamIndex,
    },

    #[error(
        "stream {referenced} uses AVB_INTERFACE {avb_interface_index} already used by another member of stream {stream}'s association"
    )]
    SharedAvbInterface {
        stream: StreamIndex,
        referenced: StreamIndex,
        avb_interface_index: AvbInterfaceIndex,
    },

    #[error("stream {stream} belongs to more than one redundant association")]
    MultipleAssociations { stream: StreamIndex },
}

/// A validated association, addressed by a virtual index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedundantStreamNode {
    pub virtual_index: VirtualIndex,
    pub primary_stream: StreamIndex,
    pub redundant_streams: BTreeSet<StreamIndex>,
}

/// Classification of one stream direction of one configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedundancyClassification {
    pub primary: BTreeSet<StreamIndex>,
    pub secondary: BTreeSet<StreamIndex>,
    pub nodes: BTreeMap<VirtualIndex, RedundantStreamNode>,
    pub issues: Vec<RedundancyIssue>,
}

impl RedundancyClassification {
    pub fn is_primary(&self, stream: StreamIndex) -> bool {
        self.primary.contains(&stream)
    }

    pub fn is_secondary(&self, stream: StreamIndex) -> bool {
        self.secondary.contains(&stream)
    }

    /// Member of any valid association.
    pub fn is_redundant(&self, stream: StreamIndex) -> bool {
        self.is_primary(stream) || self.is_secondary(stream)
    }
}

/// Classify the streams of one direction.
pub fn classify<'a>(
    entity_id: UniqueIdentifier,
    direction: DescriptorType,
    streams: impl IntoIterator<Item = (StreamIndex, &'a StreamStaticModel)>,
) -> RedundancyClassification {
    let streams: BTreeMap<StreamIndex, &StreamStaticModel> = streams.into_iter().collect();
    let mut result = RedundancyClassification::default();

    for (&index, model) in &streams {
        if model.redundant_streams.is_empty() {
            continue;
        }

        let members = match validate_association(index, model, &streams) {
            Ok(members) => members,
            Err(issue) => {
                error!(
                    entity_id = %entity_id,
                    %direction,
                    %issue,
                    "invalid redundant stream association"
                );
                result.issues.push(issue);
                continue;
            }
        };

        // Already classified while visiting another member.
        if result
            .nodes
            .values()
            .any(|node| node.redundant_streams.contains(&index))
        {
            continue;
        }

        if let Some(&conflict) = members.values().find(|member| {
            result
                .nodes
                .values()
                .any(|node| node.redundant_streams.contains(member))
        }) {
            let issue = RedundancyIssue::MultipleAssociations { stream: conflict };
            error!(
                entity_id = %entity_id,
                %direction,
                %issue,
                "invalid redundant stream association"
            );
            result.issues.push(issue);
            continue;
        }

        let mut ordered = members.values().copied();
        let Some(primary_stream) = ordered.next() else {
            continue;
        };
        result.primary.insert(primary_stream);
        result.secondary.extend(ordered);

        let virtual_index = next_virtual_index(&result.nodes);
        result.nodes.insert(
            virtual_index,
            RedundantStreamNode {
                virtual_index,
                primary_stream,
                redundant_streams: members.values().copied().collect(),
            },
        );
    }

    debug!(
        entity_id = %entity_id,
        %direction,
        associations = result.nodes.len(),
        rejected = result.issues.len(),
        "classified redundant streams"
    );
    result
}

/// Members of `index`'s association keyed by AVB interface index.
fn validate_association(
    index: StreamIndex,
    model: &StreamStaticModel,
    streams: &BTreeMap<StreamIndex, &StreamStaticModel>,
) -> Result<BTreeMap<AvbInterfaceIndex, StreamIndex>, RedundancyIssue> {
    let mut members = BTreeMap::from([(model.avb_interface_index, index)]);

    for &referenced in &model.redundant_streams {
        if referenced == index {
            return Err(RedundancyIssue::SelfReference { stream: index });
        }
        let Some(other) = streams.get(&referenced) else {
            return Err(RedundancyIssue::UnknownStream {
                stream: index,
                referenced,
            });
        };
        if !other.redundant_streams.contains(&index) {
            return Err(RedundancyIssue::NotReciprocal {
                stream: index,
                referenced,
            });
        }
        if members.contains_key(&other.avb_interface_index) {
            return Err(RedundancyIssue::SharedAvbInterface {
                stream: index,
                referenced,
                avb_interface_index: other.avb_interface_index,
            });
        }
        members.insert(other.avb_interface_index, referenced);
    }

    Ok(members)
}

fn next_virtual_index(nodes: &BTreeMap<VirtualIndex, RedundantStreamNode>) -> VirtualIndex {
    nodes
        .keys()
        .next_back()
        .map_or(0, |last| last.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const ENTITY: UniqueIdentifier = UniqueIdentifier(0x0001_0002_0003_0004);

    fn stream(
        avb_interface_index: AvbInterfaceIndex,
        redundant: &[StreamIndex],
    ) -> StreamStaticModel {
        StreamStaticModel {
            avb_interface_index,
            redundant_streams: redundant.iter().copied().collect(),
            ..StreamStaticModel::default()
        }
    }

    fn run(streams: &[(StreamIndex, StreamStaticModel)]) -> RedundancyClassification {
        classify(
            ENTITY,
            DescriptorType::StreamInput,
            streams.iter().map(|(index, model)| (*index, model)),
        )
    }

    #[test]
    fn mutual_pair_splits_into_primary_and_secondary() {
        let result = run(&[(0, stream(0, &[1])), (1, stream(1, &[0]))]);

        assert_eq!(result.primary, BTreeSet::from([0]));
        assert_eq!(result.secondary, BTreeSet::from([1]));
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[&0].primary_stream, 0);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn primary_follows_avb_interface_order_not_stream_index() {
        let result = run(&[(0, stream(1, &[1])), (1, stream(0, &[0]))]);

        assert_eq!(result.primary, BTreeSet::from([1]));
        assert_eq!(result.secondary, BTreeSet::from([0]));
    }

    #[test]
    fn unassociated_stream_is_in_neither_set() {
        let result = run(&[(0, stream(0, &[1])), (1, stream(1, &[0])), (2, stream(0, &[]))]);

        assert!(!result.is_redundant(2));
        assert!(result.issues.is_empty());
    }

    #[test]
    fn self_reference_is_rejected() {
        let result = run(&[(0, stream(0, &[0]))]);

        assert!(result.primary.is_empty());
        assert!(result.secondary.is_empty());
        assert_eq!(result.issues, vec![RedundancyIssue::SelfReference { stream: 0 }]);
    }

    #[test]
    fn one_sided_association_is_rejected() {
        let result = run(&[(0, stream(0, &[1])), (1, stream(1, &[]))]);

        assert!(!result.is_redundant(0));
        assert_eq!(
            result.issues,
            vec![RedundancyIssue::NotReciprocal {
                stream: 0,
                referenced: 1
            }]
        );
    }

    #[test]
    fn missing_stream_is_rejected() {
        let result = run(&[(0, stream(0, &[5]))]);

        assert_eq!(
            result.issues,
            vec![RedundancyIssue::UnknownStream {
                stream: 0,
                referenced: 5
            }]
        );
    }

    #[test]
    fn members_on_the_same_interface_are_flagged_not_resolved() {
        let result = run(&[(0, stream(0, &[1])), (1, stream(0, &[0]))]);

        assert!(result.nodes.is_empty());
        assert_eq!(result.issues.len(), 2);
        assert!(matches!(
            result.issues[0],
            RedundancyIssue::SharedAvbInterface { stream: 0, .. }
        ));
    }

    #[test]
    fn stream_shared_by_two_associations_is_flagged() {
        let result = run(&[
            (0, stream(0, &[1])),
            (1, stream(1, &[0, 2])),
            (2, stream(2, &[1])),
        ]);

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.primary, BTreeSet::from([0]));
        assert_eq!(result.secondary, BTreeSet::from([1]));
        assert_eq!(
            result.issues,
            vec![RedundancyIssue::MultipleAssociations { stream: 1 }]
        );
    }

    #[test]
    fn each_pair_gets_its_own_virtual_index() {
        let result = run(&[
            (0, stream(0, &[1])),
            (1, stream(1, &[0])),
            (2, stream(0, &[3])),
            (3, stream(1, &[2])),
        ]);

        assert_eq!(result.nodes.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(result.primary, BTreeSet::from([0, 2]));
        assert_eq!(result.secondary, BTreeSet::from([1, 3]));
    }
}
