//! Rule resolution and fixed-window counting.

mod backend;
mod clock;
mod counter;
mod memory;
mod resolver;
mod rules;
mod strategy;

pub use backend::{BackendError, CounterBackend};
pub use clock::{Clock, MockClock, SystemClock};
pub use counter::{TimeUnit, WindowCount, WindowCounter};
pub use memory::InMemoryBackend;
pub use resolver::{RuleResolver, KEY_SEPARATOR};
pub use rules::{RawRuleSpec, Rule, RuleDefaults};
pub use strategy::{CountingStrategy, Decision, FixedWindow};
