//! # Rosebus
//!
//! A tick-driven robot control core: topics publish messages to subscribers
//! in dependency order, a nonblocking command chain sequences behavior, and
//! every live run is logged so it can be replayed tick for tick offline.
//!
//! ## Features
//!
//! - **Topic network**: named periodic producers, published in dependency order
//! - **Cycle detection**: circular topic subscriptions are rejected at init
//! - **Command chains**: sequential, parallel, conditional and timed steps
//! - **Live logging**: one flushed line per tick, mirrored over UDP if configured
//! - **Replay**: flagged topics re-published from a recorded log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rosebus::{Command, DelayCommand, Scheduler, SchedulerConfig};
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::live());
//! let timer = scheduler.system_time();
//! scheduler.set_command_group(
//!     Command::from(DelayCommand::new(1.0, &timer)).then(Command::instant("done")),
//! );
//!
//! scheduler.initialize().expect("valid topic network");
//! for _ in 0..10 {
//!     let record = scheduler.periodic().expect("tick");
//!     println!("{} topics at {}", record.topics.len(), record.time);
//! }
//! scheduler.shutdown().expect("log closed");
//! ```
//!
//! ## Architecture
//!
//! - [`message`] - Messages and subscriber inboxes
//! - [`topic`] - Topics and the system time source
//! - [`subscriber`] - Pure consumers of topic data
//! - [`command`] - Command chains and the built-in command kinds
//! - [`graph`] - Dependency ordering and cycle detection
//! - [`scheduler`] - Tick orchestration in live and simulation mode
//! - [`topic_log`] - Log writing, loading and indexing
//! - [`robot`] - A small differential-drive robot built on the above

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::uninlined_format_args)]

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod graph;
pub mod message;
pub mod robot;
pub mod scheduler;
pub mod subscriber;
pub mod topic;
pub mod topic_log;
pub mod transport;

// Re-export main public types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, CommandBehavior, DelayCommand, DynamicCommand, ParallelCommand};
pub use config::{ExecutionMode, SchedulerConfig};
pub use error::{ConfigError, SchedulerError};
pub use message::{Inbox, Message, MessageMap, Payload};
pub use scheduler::{Scheduler, SchedulerState, SchedulerStats};
pub use subscriber::{Subscriber, SubscriberNode};
pub use topic::{SystemTimeHandle, SystemTimeTopic, TickContext, Topic, TopicNode};
pub use topic_log::{LogError, TickRecord};
