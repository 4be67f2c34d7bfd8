#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod app;
pub mod candidate;
pub mod config;
pub mod css;
pub mod error;
pub mod extract;
pub mod html;
pub mod image_probe;
pub mod logging;
pub mod pipeline;
pub mod routes;
pub mod score_config;
pub mod scoring;
pub mod url_resolve;
pub mod validate;

pub use app::{AppState, build_app};
pub use candidate::{CandidateSource, Dimensions, ImageCandidate};
pub use error::{PickError, StylesheetError, ValidationError};
pub use pipeline::{DebugReport, ImagePicker, PickerOptions};
pub use score_config::{ScoreConfig, ScoreConfigOverrides};
pub use scoring::{HookDeps, ScoreHook, Scorer};
pub use validate::ImageValidator;
