//! Sink-aware translation between caller labels and server indices
//!
//! The [`LabelDirectory`] mirrors the server's vertex population. Every
//! server index `0..N` has a slot holding either a concrete label or the
//! sink marker; every concrete label maps back to exactly one index. The
//! sink label is never resolvable to a single index, and bulk translations
//! out of index space drop sink entries.
//!
//! The directory must only be mutated after the server has acknowledged
//! the corresponding change, in the same order the server assigns indices.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::{DirectoryError, DirectoryResult};
use crate::graph::{LabelledEdge, LabelledVertex};
use crate::label::VertexLabel;
use crate::types::{Position, Sand, VertexIndex, WeightedEdge};

/// A labelled sand configuration; never contains the sink label
pub type Configuration<L> = HashMap<L, Sand>;

/// What a server index resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot<L> {
    Vertex(L),
    Sink,
}

/// Bidirectional label/index map with a designated sink label
#[derive(Debug, Clone)]
pub struct LabelDirectory<L: VertexLabel> {
    sink: L,
    label_to_index: HashMap<L, VertexIndex>,
    index_to_label: Vec<Slot<L>>,
}

impl<L: VertexLabel> LabelDirectory<L> {
    /// Create an empty directory with the given sink label
    pub fn new(sink: L) -> Self {
        Self {
            sink,
            label_to_index: HashMap::new(),
            index_to_label: Vec::new(),
        }
    }

    /// Rebuild a directory for a graph observed on the server
    ///
    /// Indices contained in `sinks` become sink slots; every other index
    /// gets the label produced by `naming`, which must differ from the sink
    /// label.
    pub fn observed(
        sink: L,
        vertex_count: usize,
        sinks: &HashSet<VertexIndex>,
        mut naming: impl FnMut(VertexIndex) -> L,
    ) -> DirectoryResult<Self> {
        let mut directory = Self::new(sink);
        for index in 0..vertex_count {
            if sinks.contains(&index) {
                directory.register_sink();
            } else {
                let label = naming(index);
                if label == directory.sink {
                    return Err(DirectoryError::ReservedLabel { index });
                }
                directory.register(label)?;
            }
        }
        Ok(directory)
    }

    /// The label standing for every server sink
    pub fn sink_label(&self) -> &L {
        &self.sink
    }

    /// Number of server indices covered (sinks included)
    pub fn len(&self) -> usize {
        self.index_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_label.is_empty()
    }

    /// Clear both maps; the sink label is kept
    pub fn reset(&mut self) {
        self.label_to_index.clear();
        self.index_to_label.clear();
    }

    /// Whether `label` is a registered concrete (non-sink) label
    pub fn contains(&self, label: &L) -> bool {
        self.label_to_index.contains_key(label)
    }

    /// Assign the next index to `label`
    ///
    /// Registering the sink label appends a sink slot and never touches the
    /// reverse map. A concrete label may only be registered once.
    pub fn register(&mut self, label: L) -> DirectoryResult<VertexIndex> {
        if label == self.sink {
            return Ok(self.register_sink());
        }
        if self.label_to_index.contains_key(&label) {
            return Err(DirectoryError::DuplicateLabel(label.describe()));
        }

        let index = self.index_to_label.len();
        trace!(index, label = %label.describe(), "Registered vertex label");
        self.label_to_index.insert(label.clone(), index);
        self.index_to_label.push(Slot::Vertex(label));
        Ok(index)
    }

    fn register_sink(&mut self) -> VertexIndex {
        let index = self.index_to_label.len();
        trace!(index, "Registered sink slot");
        self.index_to_label.push(Slot::Sink);
        index
    }

    /// Resolve a concrete label to its server index
    ///
    /// # Errors
    ///
    /// `UnknownLabel` if the label was never registered or is the sink label.
    pub fn to_index(&self, label: &L) -> DirectoryResult<VertexIndex> {
        self.label_to_index
            .get(label)
            .copied()
            .ok_or_else(|| DirectoryError::UnknownLabel(label.describe()))
    }

    /// Resolve a server index to its label (the sink label for sink slots)
    pub fn to_label(&self, index: VertexIndex) -> DirectoryResult<&L> {
        match self.slot(index)? {
            Slot::Vertex(label) => Ok(label),
            Slot::Sink => Ok(&self.sink),
        }
    }

    /// Whether the given index is one of the sink slots
    pub fn is_sink_index(&self, index: VertexIndex) -> DirectoryResult<bool> {
        Ok(matches!(self.slot(index)?, Slot::Sink))
    }

    /// The designated index sink-destined edges are redirected to
    ///
    /// This is the lowest sink slot.
    pub fn sink_index(&self) -> Option<VertexIndex> {
        self.index_to_label
            .iter()
            .position(|slot| matches!(slot, Slot::Sink))
    }

    /// Number of sink slots
    pub fn sink_count(&self) -> usize {
        self.index_to_label
            .iter()
            .filter(|slot| matches!(slot, Slot::Sink))
            .count()
    }

    fn slot(&self, index: VertexIndex) -> DirectoryResult<&Slot<L>> {
        self.index_to_label
            .get(index)
            .ok_or(DirectoryError::IndexOutOfRange {
                index,
                len: self.index_to_label.len(),
            })
    }

    /// Translate an index collection to labels, dropping sinks
    pub fn labels_for(&self, indices: &[VertexIndex]) -> DirectoryResult<Vec<L>> {
        let mut labels = Vec::with_capacity(indices.len());
        for &index in indices {
            if let Slot::Vertex(label) = self.slot(index)? {
                labels.push(label.clone());
            }
        }
        Ok(labels)
    }

    /// Translate a server sink list: the sink label once, or nothing
    ///
    /// The sink is the thing being asked for, so it is returned rather than
    /// dropped. Raw indices never reach the caller.
    pub fn sink_labels_for(&self, indices: &[VertexIndex]) -> DirectoryResult<Vec<L>> {
        for &index in indices {
            self.slot(index)?;
        }
        if indices.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![self.sink.clone()])
        }
    }

    /// Translate a dense index-space configuration to a labelled one
    ///
    /// Sink positions are dropped.
    pub fn labelled_config(&self, config: &[Sand]) -> DirectoryResult<Configuration<L>> {
        let mut labelled = Configuration::with_capacity(config.len());
        for (index, &amount) in config.iter().enumerate() {
            if let Slot::Vertex(label) = self.slot(index)? {
                labelled.insert(label.clone(), amount);
            }
        }
        Ok(labelled)
    }

    /// Translate a labelled configuration to a dense vector of length `len()`
    ///
    /// Unmentioned positions, sinks included, are zero. Mentioning the sink
    /// label or an unregistered label is an error.
    pub fn indexed_config(&self, config: &Configuration<L>) -> DirectoryResult<Vec<Sand>> {
        let mut dense = vec![0; self.index_to_label.len()];
        for (label, &amount) in config {
            let index = self.to_index(label)?;
            dense[index] = amount;
        }
        Ok(dense)
    }

    /// Encode a label-space edge for transmission
    ///
    /// Returns `None` for sink-sourced edges, which are never sent. A
    /// sink-destined edge is redirected to [`Self::sink_index`].
    pub fn encode_edge(&self, edge: &LabelledEdge<L>) -> DirectoryResult<Option<WeightedEdge>> {
        if edge.source == self.sink {
            return Ok(None);
        }
        let source = self.to_index(&edge.source)?;
        let target = if edge.target == self.sink {
            self.sink_index().ok_or(DirectoryError::NoSinkVertex)?
        } else {
            self.to_index(&edge.target)?
        };
        Ok(Some(WeightedEdge::new(source, target, edge.weight)))
    }

    /// Translate server edges to label space
    ///
    /// Sink-sourced edges are dropped. Edges from one source into any sink
    /// slot collapse into a single edge to the sink label whose weight is
    /// the sum. Order of first appearance is preserved.
    pub fn fold_edges(&self, edges: &[WeightedEdge]) -> DirectoryResult<Vec<LabelledEdge<L>>> {
        let mut folded: Vec<LabelledEdge<L>> = Vec::with_capacity(edges.len());
        let mut sink_edge_for: HashMap<VertexIndex, usize> = HashMap::new();

        for edge in edges {
            let source = match self.slot(edge.source)? {
                Slot::Vertex(label) => label.clone(),
                Slot::Sink => continue,
            };
            match self.slot(edge.target)? {
                Slot::Vertex(target) => {
                    folded.push(LabelledEdge::new(source, target.clone(), edge.weight));
                }
                Slot::Sink => match sink_edge_for.get(&edge.source) {
                    Some(&position) => folded[position].weight += edge.weight,
                    None => {
                        sink_edge_for.insert(edge.source, folded.len());
                        folded.push(LabelledEdge::new(source, self.sink.clone(), edge.weight));
                    }
                },
            }
        }
        Ok(folded)
    }

    /// Pair server positions with labels, splitting sinks out
    ///
    /// Returns the non-sink vertices and the sink positions, both in index
    /// order.
    pub fn split_positions(
        &self,
        positions: &[Position],
    ) -> DirectoryResult<(Vec<LabelledVertex<L>>, Vec<Position>)> {
        let mut vertices = Vec::with_capacity(positions.len());
        let mut sinks = Vec::new();
        for (index, &position) in positions.iter().enumerate() {
            match self.slot(index)? {
                Slot::Vertex(label) => vertices.push(LabelledVertex::new(label.clone(), position)),
                Slot::Sink => sinks.push(position),
            }
        }
        Ok((vertices, sinks))
    }
}
