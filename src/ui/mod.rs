//! Terminal output helpers
//!
//! Glyphs and spinners in an interactive terminal, plain `[OK]`/`[WARN]`
//! prefixes in CI and when output is piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    format_bytes, key_value, key_value_status, section, step_error_detail, step_ok,
    step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
