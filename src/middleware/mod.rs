pub mod instrumentation;
pub mod timing;

pub use instrumentation::instrumentation_middleware;
pub use timing::Timing;
