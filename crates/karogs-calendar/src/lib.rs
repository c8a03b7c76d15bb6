//! # Karogs Calendar
//!
//! Flag-day date engine.
//!
//! ```text
//! FlagDayRegistry
//!   ├── STATIC_FLAG_DAYS (10 fixed dates)
//!   ├── DynamicDateCalculator
//!   │     ├── Good Friday  (Easter − 2)
//!   │     ├── Easter       (Butcher–Meeus)
//!   │     └── 1st Sunday of December
//!   └── Clock + timezone → today / next
//! ```

pub mod clock;
pub mod dynamic;
pub mod local;
pub mod registry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dynamic::{DynamicDateCalculator, easter_sunday, first_sunday_of_december};
pub use local::local_instant;
pub use registry::{FlagDayRegistry, STATIC_FLAG_DAYS, UpcomingFlagDay};
