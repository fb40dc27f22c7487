mod inspect;
mod run;

pub use inspect::run_inspect;
pub use run::run_startup;
