//! Graph-wide default settings consumed during property expansion.

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;

/// Immutable per-graph defaults. Nodes read the context while expanding
/// (unset attribute compute types and unset tensor element types are
/// filled from here) but never mutate it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    compute_data_type: Option<DataType>,
    intermediate_data_type: Option<DataType>,
    io_data_type: Option<DataType>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn with_compute_data_type(mut self, data_type: DataType) -> Self {
        self.compute_data_type = Some(data_type);
        self
    }

    pub fn with_intermediate_data_type(mut self, data_type: DataType) -> Self {
        self.intermediate_data_type = Some(data_type);
        self
    }

    pub fn with_io_data_type(mut self, data_type: DataType) -> Self {
        self.io_data_type = Some(data_type);
        self
    }

    pub fn compute_data_type(&self) -> Option<DataType> {
        self.compute_data_type
    }

    pub fn intermediate_data_type(&self) -> Option<DataType> {
        self.intermediate_data_type
    }

    pub fn io_data_type(&self) -> Option<DataType> {
        self.io_data_type
    }
}
