//! Tensor descriptors and the arena that owns them during assembly.
//!
//! Every tensor participating in a graph lives in the graph's
//! [`TensorArena`] and is referred to by a [`TensorId`] handle. Nodes never
//! hold descriptor references directly; each phase call receives the arena
//! explicitly, so all shared mutable state is visible in the signatures.
//! Deduplication falls out of identity: two slots holding the same
//! `TensorId` resolve to one descriptor and, after materialization, one uid.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Ordered dimension or stride extents. Tensor ranks are small in practice,
/// so extents are stored inline up to rank 8.
pub type Dimensions = SmallVec<[i64; 8]>;

/// Process-unique tensor identifier within one graph's registry. Assigned
/// by the assembler during materialization, never by a node.
pub type Uid = i64;

/// Arena handle for a tensor descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Metadata record for one tensor: dimensions, strides, element type, and
/// registry identity.
///
/// Empty dims or strides mean "not yet resolved"; the expansion phase is
/// the single point where unset properties are filled, and they are never
/// recomputed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorDescriptor {
    name: String,
    dims: Dimensions,
    strides: Dimensions,
    data_type: Option<crate::datatype::DataType>,
    uid: Option<Uid>,
    is_virtual: bool,
}

impl TensorDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        TensorDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_dims(mut self, dims: impl AsRef<[i64]>) -> Self {
        self.dims = Dimensions::from_slice(dims.as_ref());
        self
    }

    pub fn with_strides(mut self, strides: impl AsRef<[i64]>) -> Self {
        self.strides = Dimensions::from_slice(strides.as_ref());
        self
    }

    pub fn with_data_type(mut self, data_type: crate::datatype::DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Marks the tensor as a purely intermediate operand. Virtual tensors
    /// are materialized like any other but excluded from the set of uids
    /// involved in real operations.
    pub fn with_virtual(mut self, is_virtual: bool) -> Self {
        self.is_virtual = is_virtual;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    pub fn data_type(&self) -> Option<crate::datatype::DataType> {
        self.data_type
    }

    pub fn uid(&self) -> Option<Uid> {
        self.uid
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn has_dims(&self) -> bool {
        !self.dims.is_empty()
    }

    pub fn has_strides(&self) -> bool {
        !self.strides.is_empty()
    }

    pub(crate) fn set_dims(&mut self, dims: impl AsRef<[i64]>) {
        self.dims = Dimensions::from_slice(dims.as_ref());
    }

    pub(crate) fn set_strides(&mut self, strides: Dimensions) {
        self.strides = strides;
    }

    pub(crate) fn set_data_type(&mut self, data_type: crate::datatype::DataType) {
        self.data_type = Some(data_type);
    }

    pub(crate) fn assign_uid(&mut self, uid: Uid) {
        debug_assert!(self.uid.is_none(), "uid assigned twice");
        self.uid = Some(uid);
    }

    /// Caller-side mutators, available until the descriptor is resolved.
    /// The conv backward-data output is the main user: its dims cannot be
    /// inferred and must be supplied on the created descriptor.
    pub fn set_output_dims(&mut self, dims: impl AsRef<[i64]>) {
        self.set_dims(dims);
    }

    pub fn set_output_strides(&mut self, strides: impl AsRef<[i64]>) {
        self.strides = Dimensions::from_slice(strides.as_ref());
    }
}

/// Owns every [`TensorDescriptor`] of one graph, indexed by [`TensorId`].
#[derive(Debug, Default, Serialize)]
pub struct TensorArena {
    entries: Vec<TensorDescriptor>,
}

impl TensorArena {
    pub fn new() -> Self {
        TensorArena::default()
    }

    pub fn insert(&mut self, descriptor: TensorDescriptor) -> TensorId {
        let id = TensorId(self.entries.len());
        self.entries.push(descriptor);
        id
    }

    pub fn get(&self, id: TensorId) -> &TensorDescriptor {
        &self.entries[id.0]
    }

    pub fn get_mut(&mut self, id: TensorId) -> &mut TensorDescriptor {
        &mut self.entries[id.0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TensorId, &TensorDescriptor)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (TensorId(index), entry))
    }
}

/// Monotonic uid source owned by the assembler. First registration of a
/// descriptor wins; the uid is thereafter read-only.
#[derive(Debug, Default)]
pub struct UidAllocator {
    next: Uid,
}

impl UidAllocator {
    pub fn new() -> Self {
        UidAllocator::default()
    }

    pub fn allocate(&mut self) -> Uid {
        let uid = self.next;
        self.next += 1;
        uid
    }
}
