pub mod error;
pub mod operation;
pub mod transform;

pub use error::{Incident, IncidentKind, Severity};
pub use operation::{
    Fragment, InterpolationKind, InterpolationSite, Operation, OperationKind, SourceMapping,
    VariableSpec,
};
pub use transform::{
    Category, Change, ChangeKind, FilePatch, Transformation, TransformWarning, WarnSeverity,
};
