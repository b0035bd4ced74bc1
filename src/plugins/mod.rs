//! Plugin implementations. Each plugin is shipped as its own executable under
//! `src/bin/`.

pub mod report;
pub mod runkeys;
