//! Image Upload Module
//!
//! Implements the single-request upload with preview:
//! - Multipart intake streamed to a staging file under a size cap
//! - Ordered validation of the file and the preview parameters
//! - Best-effort preview rendering next to the original
//!
//! Request Flow:
//! 1. Fields are read; the file body lands under a hidden staging name
//! 2. The collected form is validated, first failure wins
//! 3. The staged file is renamed onto its sanitized name
//! 4. A preview is rendered; failure only drops the preview fields

pub mod intake;
pub mod preview;
pub mod types;
pub mod validation;

pub use intake::{discard_staged, read_form};
pub use preview::{generate_preview, preview_edge, render_preview, PreviewError, PreviewOutcome};
pub use types::*;
pub use validation::{is_allowed_image, validate_form};
