pub mod backend;
pub mod controller;
pub mod focus;
pub mod session;

pub use backend::{GridBackend, MoveRequest};
pub use controller::{DragGesture, DropOutcome, Grid};
pub use focus::{FocusAcquirer, FocusHost, FocusStatus};
pub use session::{
    CellId, ClickTarget, EditHooks, EditSession, FieldErrors, GridKey, Resolved, SaveRequest,
    SaveStart, SessionState, Step,
};
