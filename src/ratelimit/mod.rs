//! Sliding-window rate limiting logic and state management.

mod backend;
mod clock;
mod key;
mod limiter;
mod policy;
mod store;
mod sweeper;
mod window;

pub use backend::AdmissionControl;
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::ClientKey;
pub use limiter::RateLimiter;
pub use policy::{Decision, Policy, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
pub use store::{WindowHandle, WindowStore};
pub use sweeper::Sweeper;
pub use window::Window;
