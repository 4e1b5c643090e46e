//! Strata Validation - Severity-graded checks on resolved configuration
//!
//! The engine applies a fixed, ordered list of independent rules:
//! 1. required fields are present
//! 2. URL fields are well formed
//! 3. port fields are in range
//! 4. production hardening (debug, CORS, data-store encryption)
//! 5. weak or placeholder secrets
//! 6. placeholders left unexpanded by resolution
//!
//! Only `ERROR` messages block by default; strict mode also blocks on
//! `WARNING`.

pub mod engine;
pub mod error;
pub mod rules;
pub mod settings;

pub use engine::{FailOn, ValidationReport, Validator};
pub use error::{Result, ValidationError};
pub use rules::{is_production, ValidationRule};
pub use settings::ValidationSettings;
