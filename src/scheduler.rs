use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::command::Command;
use crate::config::SchedulerConfig;
use crate::error::{ConfigError, SchedulerError};
use crate::graph;
use crate::message::Message;
use crate::subscriber::SubscriberNode;
use crate::topic::{SystemTimeHandle, SystemTimeTopic, TopicNode};
use crate::topic_log::{self, LoggedEntry, TickRecord, TopicEntries, TopicLogWriter};
use crate::transport::DatagramMirror;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Uninitialized,
    Initialized,
    Running,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub commands_completed: u32,
    pub topics_published: u64,
    pub topics_replayed: u64,
    pub log_records_written: u64,
}

/// Logged ticks not yet replayed, in recorded order.
#[derive(Debug)]
struct ReplaySource {
    records: VecDeque<TickRecord>,
}

/// Owns the topic network and the active command chain and advances both
/// one discrete tick at a time.
///
/// Each [`periodic`](Scheduler::periodic) call runs, in order: the command
/// chain, every topic publish in dependency order, the live log append,
/// every subscriber step, and finally every topic's own subscriber step.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    topics: Vec<TopicNode>,
    subscribers: Vec<SubscriberNode>,
    root_command: Option<Command>,
    clock: Box<dyn Clock>,
    system_time: SystemTimeHandle,
    log_writer: Option<TopicLogWriter>,
    replay: Option<ReplaySource>,
    mirror: Option<DatagramMirror>,
    chain_exhausted_reported: bool,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Build a scheduler whose live tick times come from `clock`.
    pub fn with_clock(config: SchedulerConfig, clock: impl Clock + 'static) -> Self {
        let mut time_topic = TopicNode::new(SystemTimeTopic::new(config.system_time_topic.clone()));
        let system_time = SystemTimeHandle::attach(&mut time_topic);

        Self {
            config,
            state: SchedulerState::Uninitialized,
            topics: vec![time_topic],
            subscribers: Vec::new(),
            root_command: None,
            clock: Box::new(clock),
            system_time,
            log_writer: None,
            replay: None,
            mirror: None,
            chain_exhausted_reported: false,
            stats: SchedulerStats::default(),
        }
    }

    pub fn add_topic(&mut self, topic: TopicNode) {
        self.topics.push(topic);
    }

    pub fn add_topics(&mut self, topics: impl IntoIterator<Item = TopicNode>) {
        self.topics.extend(topics);
    }

    pub fn add_subscriber(&mut self, subscriber: SubscriberNode) {
        self.subscribers.push(subscriber);
    }

    pub fn add_subscribers(&mut self, subscribers: impl IntoIterator<Item = SubscriberNode>) {
        self.subscribers.extend(subscribers);
    }

    /// Install `head` as the root of the command chain.
    pub fn set_command_group(&mut self, head: Command) {
        self.root_command = Some(head);
        self.chain_exhausted_reported = false;
    }

    /// Shared time source for [`DelayCommand`](crate::DelayCommand).
    pub fn system_time(&self) -> SystemTimeHandle {
        self.system_time.clone()
    }

    /// The built-in system time topic, for subscribing other nodes to it.
    pub fn system_time_topic(&mut self) -> Option<&mut TopicNode> {
        let name = self.config.system_time_topic.as_str();
        self.topics.iter_mut().find(|topic| topic.name() == name)
    }

    /// Validate and order the network, then open the log source or sink.
    /// No log is written if any check fails.
    pub fn initialize(&mut self) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Uninitialized {
            return Err(SchedulerError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }

        if graph::has_cycle(&self.topics) {
            return Err(ConfigError::CircularDependency.into());
        }
        self.order_topics();
        for topic in &self.topics {
            info!("Topic name: {}", topic.name());
        }

        self.check_topic_name_collision()?;

        let is_sim = self.config.is_simulation();
        if is_sim {
            self.load_replay()?;
        }
        if let Err(e) = self.init_hardware() {
            self.abort_initialize();
            return Err(e.into());
        }

        if !is_sim {
            if let Err(e) = self.open_live_log() {
                self.abort_initialize();
                return Err(e);
            }
        }

        info!(
            "Scheduler initialized in {:?} mode with {} topics and {} subscribers",
            self.config.mode,
            self.topics.len(),
            self.subscribers.len()
        );
        self.state = SchedulerState::Initialized;
        Ok(())
    }

    fn order_topics(&mut self) {
        let order = graph::dependency_sort(&self.topics);
        let mut slots: Vec<Option<TopicNode>> = self.topics.drain(..).map(Some).collect();
        self.topics = order.into_iter().filter_map(|index| slots[index].take()).collect();

        debug_assert!(
            slots.iter().all(Option::is_none),
            "Dependency order dropped {} topics",
            slots.iter().filter(|slot| slot.is_some()).count()
        );
    }

    fn check_topic_name_collision(&self) -> Result<(), ConfigError> {
        let mut visited: HashSet<&str> = HashSet::with_capacity(self.topics.len());
        for topic in &self.topics {
            if !visited.insert(topic.name()) {
                return Err(ConfigError::DuplicateTopicName(topic.name().to_string()));
            }
        }
        for subscriber in &self.subscribers {
            if visited.contains(subscriber.name()) {
                return Err(ConfigError::TopicSubscriberNameCollision(
                    subscriber.name().to_string(),
                ));
            }
        }
        Ok(())
    }

    fn open_live_log(&mut self) -> Result<(), SchedulerError> {
        let path = self.config.live_log_path(self.clock.now());
        let writer = TopicLogWriter::create(&path)?;
        info!("Recording topic log to {}", path.display());
        self.log_writer = Some(writer);

        if let Some(address) = self.config.mirror_address {
            match DatagramMirror::connect(address) {
                Ok(mirror) => self.mirror = Some(mirror),
                Err(e) => warn!("Tick mirror to {} disabled: {}", address, e),
            }
        }
        Ok(())
    }

    /// Undo a failed `initialize` so it can be retried from scratch.
    fn abort_initialize(&mut self) {
        self.shutdown_hardware();
        self.replay = None;
        self.log_writer = None;
        self.mirror = None;
    }

    fn load_replay(&mut self) -> Result<(), SchedulerError> {
        let path = self
            .config
            .replay_log
            .as_ref()
            .ok_or(ConfigError::MissingReplayLog)?;
        let (time_stamps, contents) = topic_log::load(path)?;
        let index = topic_log::index(&time_stamps, &contents)?;
        info!("Replaying {} ticks from {}", index.len(), path.display());

        self.replay = Some(ReplaySource {
            records: index.into_records().into(),
        });
        Ok(())
    }

    fn init_hardware(&mut self) -> Result<(), ConfigError> {
        let is_sim = self.config.is_simulation();
        let strict = self.config.strict_hardware_init;

        for subscriber in &mut self.subscribers {
            let success = subscriber.initialize_hardware();
            if !success {
                if strict {
                    return Err(ConfigError::HardwareInitFailed(subscriber.name().to_string()));
                }
                warn!("Hardware for Subscriber '{}' failed to initialize", subscriber.name());
            }
            subscriber.set_simulation(is_sim);
        }
        for topic in &mut self.topics {
            let success = topic.initialize_hardware();
            if !success {
                if strict {
                    return Err(ConfigError::HardwareInitFailed(topic.name().to_string()));
                }
                warn!("Hardware for Topic '{}' failed to initialize", topic.name());
            }
            topic.set_simulation(is_sim);
        }
        Ok(())
    }

    /// Hardware is released in the same order it was brought up.
    fn shutdown_hardware(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber.shutdown_hardware();
        }
        for topic in &mut self.topics {
            topic.shutdown_hardware();
        }
    }

    /// Move past the current command if it reports complete. Returns true
    /// when the chain advanced.
    pub fn advance_command(&mut self) -> bool {
        let Some(current) = self.root_command.as_mut() else {
            return false;
        };
        if !current.is_complete() {
            return false;
        }

        let next = current.take_next();
        debug!(
            "Command '{}' complete, advancing to {}",
            current.name(),
            next.as_ref().map_or("<end of chain>", Command::name)
        );
        self.root_command = next;
        self.stats.commands_completed += 1;
        true
    }

    fn run_commands(&mut self) {
        let Some(root) = self.root_command.as_mut() else {
            self.report_chain_exhausted();
            return;
        };
        root.first_run();

        self.advance_command();

        match self.root_command.as_mut() {
            Some(current) => {
                // a freshly advanced command sets up before its first step
                current.first_run();
                current.periodic();
            }
            None => self.report_chain_exhausted(),
        }
    }

    fn report_chain_exhausted(&mut self) {
        if self.chain_exhausted_reported {
            debug!("No further command to execute");
        } else {
            info!("No further command to execute");
            self.chain_exhausted_reported = true;
        }
    }

    /// The time of the next tick and, when replaying, the entries logged
    /// for it. Ticks sharing a time stamp are replayed one by one.
    fn next_tick(&mut self) -> Result<(f64, Option<TopicEntries>), SchedulerError> {
        match self.replay.as_mut() {
            Some(replay) => replay
                .records
                .pop_front()
                .map(|record| (record.time, Some(record.topics)))
                .ok_or(SchedulerError::ReplayExhausted {
                    ticks: self.stats.ticks,
                }),
            None => Ok((self.clock.now(), None)),
        }
    }

    fn publish_topics(
        &mut self,
        present_time: f64,
        logged: Option<&TopicEntries>,
    ) -> Result<TickRecord, SchedulerError> {
        let mut record = TickRecord::new(present_time);

        for topic in &mut self.topics {
            let (message, time, delta) = match logged {
                Some(entries) if topic.replace_message_with_log() => {
                    let entry = entries.get(topic.name()).ok_or_else(|| {
                        SchedulerError::MissingLoggedTopic {
                            topic: topic.name().to_string(),
                            time: present_time,
                        }
                    })?;
                    self.stats.topics_replayed += 1;
                    let message = Message::from_payload(entry.message.clone(), entry.time);
                    topic.publish_periodic_from_log(message, entry.time, entry.delta)
                }
                _ => {
                    self.stats.topics_published += 1;
                    topic.publish_periodic(present_time)?
                }
            };

            record.topics.insert(
                topic.name().to_string(),
                LoggedEntry {
                    message: message.payload().clone(),
                    time,
                    delta,
                },
            );
        }
        Ok(record)
    }

    fn write_log(&mut self, record: &TickRecord) -> Result<(), SchedulerError> {
        if record.topics.is_empty() {
            return Ok(());
        }
        let Some(writer) = self.log_writer.as_mut() else {
            return Ok(());
        };

        let line = record.to_line()?;
        writer.append_line(&line)?;
        self.stats.log_records_written += 1;

        if let Some(mirror) = self.mirror.as_mut() {
            mirror.send(&line);
        }
        Ok(())
    }

    /// Run one tick and return what every topic published during it.
    pub fn periodic(&mut self) -> Result<TickRecord, SchedulerError> {
        match self.state {
            SchedulerState::Initialized | SchedulerState::Running => {}
            state => {
                return Err(SchedulerError::InvalidState {
                    operation: "tick",
                    state,
                })
            }
        }

        let (present_time, logged) = self.next_tick()?;
        self.state = SchedulerState::Running;

        self.run_commands();

        let record = self.publish_topics(present_time, logged.as_ref())?;

        if !self.config.is_simulation() {
            self.write_log(&record)?;
        }

        for subscriber in &mut self.subscribers {
            subscriber.periodic();
        }

        // topics are subscribers too, and see this tick's data last
        for topic in &mut self.topics {
            topic.periodic();
        }

        self.stats.ticks += 1;
        debug!("Tick {} at {} complete", self.stats.ticks, present_time);
        Ok(record)
    }

    /// Release the log and hardware. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if self.state == SchedulerState::Shutdown {
            return Ok(());
        }

        self.shutdown_hardware();
        self.mirror = None;
        self.replay = None;
        self.state = SchedulerState::Shutdown;

        if let Some(writer) = self.log_writer.take() {
            info!(
                "Closing topic log {} after {} records",
                writer.path().display(),
                writer.records_written()
            );
            writer.close()?;
        }
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn topics(&self) -> &[TopicNode] {
        &self.topics
    }

    pub fn subscribers(&self) -> &[SubscriberNode] {
        &self.subscribers
    }

    /// Topic names in publish order (declaration order before `initialize`).
    pub fn topic_order(&self) -> Vec<&str> {
        self.topics.iter().map(TopicNode::name).collect()
    }

    pub fn root_command(&self) -> Option<&Command> {
        self.root_command.as_ref()
    }

    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.log_writer.as_ref().map(TopicLogWriter::path)
    }

    /// Ticks left in the replay log; `None` in live mode.
    pub fn remaining_replay_ticks(&self) -> Option<usize> {
        self.replay.as_ref().map(|replay| replay.records.len())
    }

    pub fn network_graph_dot(&self) -> String {
        graph::to_dot(&self.topics, &self.subscribers)
    }
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("mode", &self.config.mode)
            .field("topics", &self.topic_order())
            .field("subscribers", &self.subscribers.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::command::tests::{scripted, EventLog};
    use tempfile::tempdir;

    fn live_scheduler(dir: &std::path::Path) -> Scheduler {
        let mut config = SchedulerConfig::live();
        config.log_dir = dir.to_path_buf();
        Scheduler::with_clock(config, ManualClock::new(100.0))
    }

    #[test]
    fn test_scheduler_initialization() {
        let dir = tempdir().unwrap();
        let mut scheduler = live_scheduler(dir.path());
        assert_eq!(scheduler.state(), SchedulerState::Uninitialized);

        scheduler.initialize().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Initialized);
        assert_eq!(scheduler.topic_order(), vec!["SystemTime"]);
        assert_eq!(scheduler.log_path(), Some(dir.path().join("log_100.csv").as_path()));
    }

    #[test]
    fn test_scheduler_set_command_group() {
        let mut scheduler = Scheduler::new(SchedulerConfig::live());
        scheduler.set_command_group(Command::instant("root"));
        assert_eq!(scheduler.root_command().map(Command::name), Some("root"));
    }

    #[test]
    fn test_scheduler_advance_command() {
        let mut scheduler = Scheduler::new(SchedulerConfig::live());
        scheduler.set_command_group(Command::instant("one").then(Command::instant("two")));

        assert!(scheduler.advance_command());
        assert_eq!(scheduler.root_command().map(Command::name), Some("two"));
        assert!(scheduler.advance_command());
        assert!(scheduler.root_command().is_none());
        assert!(!scheduler.advance_command());
        assert_eq!(scheduler.stats().commands_completed, 2);
    }

    #[test]
    fn test_periodic_requires_initialize() {
        let mut scheduler = Scheduler::new(SchedulerConfig::live());
        let err = scheduler.periodic().unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidState {
                state: SchedulerState::Uninitialized,
                ..
            }
        ));
        assert!(!err.is_misconfiguration());
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let dir = tempdir().unwrap();
        let mut scheduler = live_scheduler(dir.path());
        scheduler.initialize().unwrap();
        assert!(matches!(
            scheduler.initialize(),
            Err(SchedulerError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_command_runs_setup_before_periodic() {
        let dir = tempdir().unwrap();
        let events = EventLog::default();
        let (a, a_done) = scripted("a", &events);
        let (b, _) = scripted("b", &events);

        let mut scheduler = live_scheduler(dir.path());
        scheduler.set_command_group(a.then(b));
        scheduler.initialize().unwrap();

        scheduler.periodic().unwrap();
        a_done.set(true);
        scheduler.periodic().unwrap();
        scheduler.periodic().unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                "a:first_run",
                "a:periodic",
                "b:first_run",
                "b:periodic",
                "b:periodic",
            ]
        );
    }

    #[test]
    fn test_shutdown_closes_log_and_blocks_ticks() {
        let dir = tempdir().unwrap();
        let mut scheduler = live_scheduler(dir.path());
        scheduler.initialize().unwrap();
        scheduler.periodic().unwrap();

        scheduler.shutdown().unwrap();
        scheduler.shutdown().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Shutdown);
        assert!(scheduler.log_path().is_none());
        assert!(matches!(
            scheduler.periodic(),
            Err(SchedulerError::InvalidState {
                state: SchedulerState::Shutdown,
                ..
            })
        ));
    }
}
