//! Session lifecycle: controller, capture worker and the presentation boundary.

mod controller;
mod presenter;
mod worker;

pub use controller::{
    SessionCommand, SessionController, SessionParts, SessionState, OPEN_ERROR_MESSAGE,
    OPEN_ERROR_TITLE,
};
pub use presenter::{Controls, LatestFrame, Presenter, PublishedFrame};
pub use worker::{CaptureWorker, WorkerExit, WorkerReport, WorkerState, WorkerStatus};
