/*!

Environment-driven settings and per-suite working state for the scenario tests: which cluster a
suite creates, where its Terraform modules are staged, where their state is kept, and whether the
infrastructure is torn down at the end.

!*/

mod error;
mod settings;
mod suite;

pub use error::{Error, Result};
pub use settings::TestSettings;
pub use suite::Suite;
